//! # In-Process Events
//!
//! [`EventEmitter`] delivers named events to listeners inside this process. Listeners
//! subscribe with a pattern of `.`-separated segments:
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `com.example.event` | exactly that name |
//! | `com.example.*` | one segment in place of `*` (`com.example.event`, not `com.example.a.b`) |
//! | `com.**` | any number of trailing segments, including none |
//!
//! [`ActorEventRoute`] is the listener that forwards an event to a method of the actor
//! whose id it reads from the payload.
//!
//! ```rust,ignore
//! host.events().on(
//!     "com.example.*",
//!     Arc::new(ActorEventRoute::new(registry, "PubSubActor", "handleEvent", producer_id)),
//! );
//! let results = host.events().emit_async("com.example.event", json!({"producerId": "p1"})).await?;
//! ```
use crate::context::ContextStore;
use crate::error::{ActorError, Result};
use crate::registry::ActorClientRegistry;
use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

const SEGMENT_DELIMITER: char = '.';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`
    One,
    /// `**`
    Any,
}

/// A compiled event name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl EventPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split(SEGMENT_DELIMITER)
            .map(|s| match s {
                "*" => Segment::One,
                "**" => Segment::Any,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, event: &str) -> bool {
        let parts: Vec<&str> = event.split(SEGMENT_DELIMITER).collect();
        matches_from(&self.segments, &parts)
    }
}

fn matches_from(segments: &[Segment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((Segment::Any, rest)) => {
            (0..=parts.len()).any(|skip| matches_from(rest, &parts[skip..]))
        }
        Some((segment, rest)) => match parts.split_first() {
            None => false,
            Some((part, remaining)) => {
                let head = match segment {
                    Segment::Literal(literal) => literal.as_str() == *part,
                    _ => true,
                };
                head && matches_from(rest, remaining)
            }
        },
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for EventPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &str, data: Value) -> Result<Value>;
}

struct FnListener<F>(F);

#[async_trait]
impl<F, Fut> EventListener for FnListener<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn on_event(&self, _event: &str, data: Value) -> Result<Value> {
        (self.0)(data).await
    }
}

type Listener = (EventPattern, Arc<dyn EventListener>);

/// Named-event bus for this process. Emitting an event nobody listens to is not an error.
#[derive(Default)]
pub struct EventEmitter {
    listeners: RwLock<Vec<Listener>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, pattern: impl Into<EventPattern>, listener: Arc<dyn EventListener>) {
        let pattern = pattern.into();
        info!(%pattern, "Listening for events");
        self.listeners.write().push((pattern, listener));
    }

    pub fn on_fn<F, Fut>(&self, pattern: impl Into<EventPattern>, listener: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.on(pattern, Arc::new(FnListener(listener)));
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners.read().iter().any(|(p, _)| p.matches(event))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn remove_all_listeners(&self) {
        self.listeners.write().clear();
    }

    fn matching(&self, event: &str) -> Vec<Arc<dyn EventListener>> {
        self.listeners
            .read()
            .iter()
            .filter(|(pattern, _)| pattern.matches(event))
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    /// Runs every matching listener concurrently in the caller's call chain and waits for
    /// all of them. Results come back in subscription order; the first failure is returned.
    pub async fn emit_async(&self, event: &str, data: Value) -> Result<Vec<Value>> {
        let listeners = self.matching(event);
        debug!(event, listeners = listeners.len(), "Emitting event");
        ContextStore::ensure_scope(try_join_all(
            listeners
                .iter()
                .map(|listener| listener.on_event(event, data.clone())),
        ))
        .await
    }

    /// Fire-and-forget. Listeners run on a spawned task that carries the caller's
    /// ambient context; failures are only logged.
    pub fn emit(self: &Arc<Self>, event: &str, data: Value) {
        let emitter = self.clone();
        let event = event.to_string();
        let context = ContextStore::get().unwrap_or_default();
        tokio::spawn(ContextStore::scope_with(context, async move {
            if let Err(e) = emitter.emit_async(&event, data).await {
                error!(%event, error = %e, "Event listener failed");
            }
        }));
    }
}

/// Forwards events to one method of an actor picked from the payload.
///
/// By default a failing call fails the emit. With [`ignore_errors`](Self::ignore_errors)
/// the failure is logged and the listener yields `null` instead.
pub struct ActorEventRoute {
    registry: Arc<ActorClientRegistry>,
    actor_type: String,
    method: String,
    actor_id: fn(&Value) -> Option<String>,
    ignore_errors: bool,
}

impl ActorEventRoute {
    pub fn new(
        registry: Arc<ActorClientRegistry>,
        actor_type: impl Into<String>,
        method: impl Into<String>,
        actor_id: fn(&Value) -> Option<String>,
    ) -> Self {
        Self {
            registry,
            actor_type: actor_type.into(),
            method: method.into(),
            actor_id,
            ignore_errors: false,
        }
    }

    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    async fn forward(&self, data: Value) -> Result<Value> {
        let id = (self.actor_id)(&data).ok_or_else(|| {
            ActorError::NotFound(format!("no actor id in event for {}", self.actor_type))
        })?;
        let proxy = self.registry.get_actor_by_type_name(&self.actor_type, &id)?;
        proxy.call(&self.method, vec![data]).await
    }
}

#[async_trait]
impl EventListener for ActorEventRoute {
    async fn on_event(&self, event: &str, data: Value) -> Result<Value> {
        match self.forward(data).await {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(
                    event,
                    actor_type = %self.actor_type,
                    method = %self.method,
                    error = %e,
                    "Actor event listener failed"
                );
                if self.ignore_errors {
                    Ok(Value::Null)
                } else {
                    Err(e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_wildcard_matches_one_segment() {
        let pattern = EventPattern::new("com.example.*");
        assert!(pattern.matches("com.example.event"));
        assert!(!pattern.matches("com.example"));
        assert!(!pattern.matches("com.example.event.created"));
        assert!(!pattern.matches("org.example.event"));
    }

    #[test]
    fn double_wildcard_matches_any_tail() {
        let pattern = EventPattern::new("com.**");
        assert!(pattern.matches("com"));
        assert!(pattern.matches("com.example"));
        assert!(pattern.matches("com.example.event.created"));
        assert!(!pattern.matches("org.example"));

        let middle = EventPattern::new("com.**.created");
        assert!(middle.matches("com.created"));
        assert!(middle.matches("com.a.b.created"));
        assert!(!middle.matches("com.a.b.deleted"));
    }

    #[tokio::test]
    async fn emit_without_listeners_is_empty() {
        let emitter = EventEmitter::new();
        assert!(!emitter.has_listeners("com.example.event"));
        let results = emitter.emit_async("com.example.event", json!(1)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn results_follow_subscription_order() {
        let emitter = EventEmitter::new();
        emitter.on_fn("com.example.event", |data: Value| async move {
            Ok::<_, ActorError>(json!({"exact": data}))
        });
        emitter.on_fn("com.example.*", |_: Value| async { Ok::<_, ActorError>(json!("wildcard")) });
        emitter.on_fn("org.*", |_: Value| async { Ok::<_, ActorError>(json!("never")) });

        let results = emitter.emit_async("com.example.event", json!(7)).await.unwrap();
        assert_eq!(results, vec![json!({"exact": 7}), json!("wildcard")]);
    }

    #[tokio::test]
    async fn failing_listener_fails_the_emit() {
        let emitter = EventEmitter::new();
        emitter.on_fn("a.b", |_: Value| async { Ok::<_, ActorError>(Value::Null) });
        emitter.on_fn("a.*", |_: Value| async {
            Err::<Value, _>(ActorError::Unexpected("listener broke".into()))
        });

        let err = emitter.emit_async("a.b", Value::Null).await.unwrap_err();
        assert!(matches!(err, ActorError::Unexpected(_)));

        emitter.remove_all_listeners();
        assert_eq!(emitter.listener_count(), 0);
    }

    #[tokio::test]
    async fn spawned_emit_keeps_the_callers_correlation_id() {
        let emitter = Arc::new(EventEmitter::new());
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(parking_lot::Mutex::new(Some(tx)));
        emitter.on_fn("ping", move |_: Value| {
            let tx = tx.clone();
            async move {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(ContextStore::get_correlation_id(false));
                }
                Ok::<_, ActorError>(Value::Null)
            }
        });

        ContextStore::scope_with(crate::context::AmbientContext::with_correlation_id("c-9"), async {
            emitter.emit("ping", Value::Null);
        })
        .await;
        assert_eq!(rx.await.unwrap().as_deref(), Some("c-9"));
    }
}
