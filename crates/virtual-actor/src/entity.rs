//! # VirtualActor Trait
//!
//! The contract every actor type implements. The runtime owns instances; application
//! code only ever holds proxies to them.
//!
//! ## Lifecycle
//!
//! 1. **Create**: the runtime resolves `Dependencies` and calls [`VirtualActor::create`].
//! 2. **Load**: every declared [`StateProperty`] is loaded from the store or defaulted.
//! 3. **Activate**: [`VirtualActor::on_activate`] runs.
//! 4. **Invoke**: [`VirtualActor::invoke`] runs once per call, one turn at a time.
//! 5. **Deactivate**: [`VirtualActor::on_deactivate`] runs and the instance is dropped.
//!
//! Methods take `&self`. State that changes between calls lives in
//! [`StateField`](crate::StateField)s or other interior-mutable cells, which keeps
//! reentrant turns sound.
use crate::dependencies::Resolve;
use crate::error::{ActorError, Result};
use crate::identity::ActorIdentity;
use crate::stateful::{ActorContext, StateProperty};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[async_trait]
pub trait VirtualActor: Send + Sync + Sized + 'static {
    /// Type name the actor is registered under (before any type-name prefix).
    const TYPE_NAME: &'static str;

    /// Collaborators injected at activation, e.g. `Arc<CacheService>` or `()`.
    type Dependencies: Resolve;

    fn create(identity: &ActorIdentity, dependencies: Self::Dependencies) -> Self;

    /// Declared state, evaluated once when the type is registered.
    fn state_properties() -> Vec<StateProperty<Self>> {
        Vec::new()
    }

    async fn on_activate(&self, _ctx: &ActorContext<Self>) -> Result<()> {
        Ok(())
    }

    async fn on_deactivate(&self, _ctx: &ActorContext<Self>) -> Result<()> {
        Ok(())
    }

    async fn invoke(&self, ctx: &ActorContext<Self>, method: &str, args: MethodArgs)
        -> Result<Value>;
}

/// Positional arguments of one method call, with the propagated context removed.
#[derive(Debug, Clone, Default)]
pub struct MethodArgs {
    method: String,
    values: Vec<Value>,
}

impl MethodArgs {
    pub fn new(method: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Decodes argument `index`. A missing argument decodes from `null`, so
    /// `Option<T>` parameters are optional.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| ActorError::InvalidArgument {
            method: self.method.clone(),
            index,
            reason: e.to_string(),
        })
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Serializes a method result.
pub fn reply<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Error for a method name the actor does not handle.
pub fn unknown_method(actor_type: &str, method: &str) -> ActorError {
    ActorError::UnknownMethod {
        actor_type: actor_type.to_string(),
        method: method.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_arguments_decode_as_none() {
        let args = MethodArgs::new("add", vec![json!(3)]);
        assert_eq!(args.get::<i64>(0).unwrap(), 3);
        assert_eq!(args.get::<Option<i64>>(1).unwrap(), None);
    }

    #[test]
    fn wrong_type_reports_method_and_index() {
        let args = MethodArgs::new("add", vec![json!("three")]);
        let err = args.get::<i64>(0).unwrap_err();
        assert!(matches!(
            err,
            ActorError::InvalidArgument { ref method, index: 0, .. } if method == "add"
        ));
    }
}
