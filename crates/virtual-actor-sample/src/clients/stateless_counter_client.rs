use tracing::instrument;
use virtual_actor::{ActorInterface, ActorProxy, Result};

#[derive(Clone)]
pub struct StatelessCounterClient {
    inner: ActorProxy,
}

impl ActorInterface for StatelessCounterClient {
    const INTERFACE_NAME: &'static str = "StatelessCounterActorInterface";

    fn from_proxy(proxy: ActorProxy) -> Self {
        Self { inner: proxy }
    }

    fn inner(&self) -> &ActorProxy {
        &self.inner
    }
}

impl StatelessCounterClient {
    #[instrument(skip(self))]
    pub async fn increment(&self) -> Result<()> {
        self.call("increment", Vec::new()).await
    }

    #[instrument(skip(self))]
    pub async fn get_counter(&self) -> Result<i64> {
        self.call("getCounter", Vec::new()).await
    }

    /// Always fails with a 400 the caller can inspect.
    #[instrument(skip(self))]
    pub async fn throw_serializable_error(&self) -> Result<()> {
        self.call("throwSerializableError", Vec::new()).await
    }

    /// Always fails; the caller only learns the status.
    #[instrument(skip(self))]
    pub async fn throw_error(&self) -> Result<()> {
        self.call("throwError", Vec::new()).await
    }
}
