//! # Counter Client
//!
//! Typed access to [`CounterActor`](crate::counter_actor::CounterActor).
use tracing::instrument;
use virtual_actor::{ActorInterface, ActorProxy, Result};

#[derive(Clone)]
pub struct CounterClient {
    inner: ActorProxy,
}

impl ActorInterface for CounterClient {
    const INTERFACE_NAME: &'static str = "CounterActorInterface";

    fn from_proxy(proxy: ActorProxy) -> Self {
        Self { inner: proxy }
    }

    fn inner(&self) -> &ActorProxy {
        &self.inner
    }
}

impl CounterClient {
    #[instrument(skip(self))]
    pub async fn increment(&self) -> Result<()> {
        self.call("increment", Vec::new()).await
    }

    #[instrument(skip(self))]
    pub async fn get_counter(&self) -> Result<i64> {
        self.call("getCounter", Vec::new()).await
    }
}
