//! # ActorInterface Trait
//!
//! Typed adapters over an [`ActorProxy`]. Each actor interface gets one small struct
//! whose methods pack arguments, forward through the proxy and decode the result.
use crate::error::Result;
use crate::identity::ActorIdentity;
use crate::proxy::ActorProxy;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A typed client for one actor interface.
///
/// # Example
///
/// ```rust
/// use virtual_actor::{ActorInterface, ActorProxy, Result};
/// use serde_json::json;
///
/// #[derive(Clone)]
/// struct CounterClient {
///     inner: ActorProxy,
/// }
///
/// impl ActorInterface for CounterClient {
///     const INTERFACE_NAME: &'static str = "CounterActorInterface";
///
///     fn from_proxy(proxy: ActorProxy) -> Self {
///         Self { inner: proxy }
///     }
///
///     fn inner(&self) -> &ActorProxy {
///         &self.inner
///     }
/// }
///
/// impl CounterClient {
///     async fn add(&self, amount: i64) -> Result<i64> {
///         self.call("add", vec![json!(amount)]).await
///     }
/// }
/// ```
#[async_trait]
pub trait ActorInterface: Sized + Send + Sync {
    /// Name the interface is registered under in the client registry.
    const INTERFACE_NAME: &'static str;

    fn from_proxy(proxy: ActorProxy) -> Self;

    fn inner(&self) -> &ActorProxy;

    fn identity(&self) -> &ActorIdentity {
        self.inner().identity()
    }

    /// Forwards one method call and decodes its result.
    #[tracing::instrument(skip(self, args), fields(actor = %self.identity()))]
    async fn call<R: DeserializeOwned + Send>(&self, method: &str, args: Vec<Value>) -> Result<R> {
        tracing::debug!("Sending request");
        self.inner().call_as(method, args).await
    }
}
