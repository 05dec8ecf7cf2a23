use tracing::instrument;
use virtual_actor::{ActorInterface, ActorProxy, Result};

#[derive(Clone)]
pub struct ContextAwareClient {
    inner: ActorProxy,
}

impl ActorInterface for ContextAwareClient {
    const INTERFACE_NAME: &'static str = "ContextAwareActorInterface";

    fn from_proxy(proxy: ActorProxy) -> Self {
        Self { inner: proxy }
    }

    fn inner(&self) -> &ActorProxy {
        &self.inner
    }
}

impl ContextAwareClient {
    /// Runs the nested call chain and returns the correlation id the actor observed.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<Option<String>> {
        self.call("run", Vec::new()).await
    }

    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<Option<String>> {
        self.call("ping", Vec::new()).await
    }
}
