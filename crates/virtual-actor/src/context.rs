//! # Context Propagation
//!
//! An [`AmbientContext`] is a small key/value map that follows one logical call chain.
//! Inside a process it lives in a tokio task-local ([`ContextStore`]), so it survives
//! every `.await` of the chain without leaking into unrelated tasks. Across actor hops
//! it travels inside the invocation payload as a trailing element tagged
//! `{"$t": "ctx"}` (see [`crate::envelope`]).
//!
//! The task-local is sugar. Everything that crosses an actor boundary also accepts
//! an explicit context, so callers that spawn their own tasks can still thread it by
//! hand with [`crate::ActorProxy::call_with_context`].
use crate::error::{ActorError, Result};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::future::Future;
use uuid::Uuid;

/// Discriminator key marking a payload element as a propagated context.
pub const CONTEXT_TAG_KEY: &str = "$t";
/// Value stored under [`CONTEXT_TAG_KEY`].
pub const CONTEXT_TAG_VALUE: &str = "ctx";
/// Reserved key holding the correlation id.
pub const CORRELATION_ID_KEY: &str = "correlationId";

/// Chain-scoped key/value data such as correlation or tenant ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbientContext {
    values: Map<String, Value>,
}

impl AmbientContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(id: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.set_correlation_id(id);
        ctx
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        // The tag is a wire detail, never a user value.
        if key == CONTEXT_TAG_KEY {
            return;
        }
        self.values.insert(key, value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.values.get(CORRELATION_ID_KEY).and_then(Value::as_str)
    }

    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        self.values
            .insert(CORRELATION_ID_KEY.to_string(), Value::String(id.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The context as it appears on the wire: `{"$t": "ctx", ...fields}`.
    pub fn to_tagged_value(&self) -> Value {
        let mut object = Map::with_capacity(self.values.len() + 1);
        object.insert(
            CONTEXT_TAG_KEY.to_string(),
            Value::String(CONTEXT_TAG_VALUE.to_string()),
        );
        for (key, value) in &self.values {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    pub fn is_tagged(value: &Value) -> bool {
        value
            .as_object()
            .and_then(|o| o.get(CONTEXT_TAG_KEY))
            .and_then(Value::as_str)
            == Some(CONTEXT_TAG_VALUE)
    }

    /// Reads a tagged payload element back into a context. Untagged values yield `None`.
    pub fn from_tagged_value(value: &Value) -> Option<Self> {
        if !Self::is_tagged(value) {
            return None;
        }
        let mut values = value.as_object()?.clone();
        values.remove(CONTEXT_TAG_KEY);
        Some(Self { values })
    }
}

#[derive(Debug, Default)]
struct CallScope {
    context: Option<AmbientContext>,
    reentrancy_id: Option<String>,
}

tokio::task_local! {
    static CALL_SCOPE: RefCell<CallScope>;
}

/// Access point for the ambient context of the current call chain.
///
/// Reads never fail: outside of a scope they return `None`. Writes outside of a scope
/// return [`ActorError::NoActiveScope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextStore;

impl ContextStore {
    /// Runs `f` inside a fresh, empty scope.
    pub async fn scope<F: Future>(f: F) -> F::Output {
        CALL_SCOPE.scope(RefCell::new(CallScope::default()), f).await
    }

    /// Runs `f` inside a fresh scope seeded with `context`.
    pub async fn scope_with<F: Future>(context: AmbientContext, f: F) -> F::Output {
        let scope = CallScope {
            context: Some(context),
            reentrancy_id: None,
        };
        CALL_SCOPE.scope(RefCell::new(scope), f).await
    }

    /// Runs `f` in the current scope, or in a fresh one if none is active.
    pub async fn ensure_scope<F: Future>(f: F) -> F::Output {
        if Self::is_active() {
            f.await
        } else {
            Self::scope(f).await
        }
    }

    pub fn is_active() -> bool {
        CALL_SCOPE.try_with(|_| ()).is_ok()
    }

    pub fn get() -> Option<AmbientContext> {
        CALL_SCOPE
            .try_with(|scope| scope.borrow().context.clone())
            .ok()
            .flatten()
    }

    pub fn set(context: AmbientContext) -> Result<()> {
        CALL_SCOPE
            .try_with(|scope| scope.borrow_mut().context = Some(context))
            .map_err(|_| ActorError::NoActiveScope)
    }

    /// Sets a single key on the active context, creating the context if needed.
    pub fn insert(key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        CALL_SCOPE
            .try_with(|scope| {
                scope
                    .borrow_mut()
                    .context
                    .get_or_insert_with(AmbientContext::default)
                    .insert(key, value)
            })
            .map_err(|_| ActorError::NoActiveScope)
    }

    pub fn set_correlation_id(id: impl Into<String>) -> Result<()> {
        let id = id.into();
        CALL_SCOPE
            .try_with(|scope| {
                scope
                    .borrow_mut()
                    .context
                    .get_or_insert_with(AmbientContext::default)
                    .set_correlation_id(id)
            })
            .map_err(|_| ActorError::NoActiveScope)
    }

    /// Returns the active correlation id.
    ///
    /// With `create_if_absent` a new id is generated when none exists. It is stored in the
    /// active scope when there is one, so later reads in the same chain agree.
    pub fn get_correlation_id(create_if_absent: bool) -> Option<String> {
        let existing = CALL_SCOPE
            .try_with(|scope| {
                scope
                    .borrow()
                    .context
                    .as_ref()
                    .and_then(|c| c.correlation_id().map(str::to_owned))
            })
            .ok()
            .flatten();
        if existing.is_some() || !create_if_absent {
            return existing;
        }
        let id = Uuid::new_v4().to_string();
        let _ = Self::set_correlation_id(id.clone());
        Some(id)
    }

    pub(crate) fn reentrancy_id(create_if_absent: bool) -> Option<String> {
        let existing = CALL_SCOPE
            .try_with(|scope| scope.borrow().reentrancy_id.clone())
            .ok()
            .flatten();
        if existing.is_some() || !create_if_absent {
            return existing;
        }
        let id = Uuid::new_v4().to_string();
        let _ = Self::set_reentrancy_id(id.clone());
        Some(id)
    }

    pub(crate) fn set_reentrancy_id(id: String) -> Result<()> {
        CALL_SCOPE
            .try_with(|scope| scope.borrow_mut().reentrancy_id = Some(id))
            .map_err(|_| ActorError::NoActiveScope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_outside_scope_are_empty() {
        assert!(!ContextStore::is_active());
        assert_eq!(ContextStore::get(), None);
        assert_eq!(ContextStore::get_correlation_id(false), None);
        assert!(matches!(
            ContextStore::set(AmbientContext::new()),
            Err(ActorError::NoActiveScope)
        ));
    }

    #[test]
    fn create_outside_scope_still_returns_an_id() {
        let id = ContextStore::get_correlation_id(true);
        assert!(id.is_some());
        assert_eq!(ContextStore::get_correlation_id(false), None);
    }

    #[tokio::test]
    async fn correlation_id_is_stable_within_scope() {
        ContextStore::scope(async {
            let first = ContextStore::get_correlation_id(true).unwrap();
            tokio::task::yield_now().await;
            assert_eq!(ContextStore::get_correlation_id(false), Some(first.clone()));
            assert_eq!(ContextStore::get_correlation_id(true), Some(first));
        })
        .await;
    }

    #[tokio::test]
    async fn concurrent_scopes_do_not_leak() {
        let a = tokio::spawn(ContextStore::scope_with(
            AmbientContext::with_correlation_id("a"),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                ContextStore::get_correlation_id(false)
            },
        ));
        let b = tokio::spawn(ContextStore::scope_with(
            AmbientContext::with_correlation_id("b"),
            async {
                ContextStore::insert("tenantId", "t-2").unwrap();
                tokio::task::yield_now().await;
                ContextStore::get()
            },
        ));

        assert_eq!(a.await.unwrap(), Some("a".to_string()));
        let ctx_b = b.await.unwrap().unwrap();
        assert_eq!(ctx_b.correlation_id(), Some("b"));
        assert_eq!(ctx_b.get("tenantId"), Some(&json!("t-2")));
    }

    #[tokio::test]
    async fn ensure_scope_reuses_active_scope() {
        ContextStore::scope(async {
            ContextStore::set_correlation_id("outer").unwrap();
            ContextStore::ensure_scope(async {
                ContextStore::set_correlation_id("inner").unwrap();
            })
            .await;
            assert_eq!(ContextStore::get_correlation_id(false).as_deref(), Some("inner"));
        })
        .await;
    }

    #[test]
    fn tagged_round_trip_strips_tag() {
        let mut ctx = AmbientContext::with_correlation_id("X");
        ctx.insert("tenantId", "acme");
        ctx.insert(CONTEXT_TAG_KEY, "ignored");

        let tagged = ctx.to_tagged_value();
        assert_eq!(
            tagged,
            json!({"$t": "ctx", "correlationId": "X", "tenantId": "acme"})
        );
        assert!(AmbientContext::is_tagged(&tagged));
        assert_eq!(AmbientContext::from_tagged_value(&tagged), Some(ctx));
        assert_eq!(AmbientContext::from_tagged_value(&json!({"correlationId": "X"})), None);
    }
}
