use serde_json::Value;
use tracing::instrument;
use virtual_actor::{ActorInterface, ActorProxy, Result};

#[derive(Clone)]
pub struct PubSubActorClient {
    inner: ActorProxy,
}

impl ActorInterface for PubSubActorClient {
    const INTERFACE_NAME: &'static str = "StatelessPubSubActorInterface";

    fn from_proxy(proxy: ActorProxy) -> Self {
        Self { inner: proxy }
    }

    fn inner(&self) -> &ActorProxy {
        &self.inner
    }
}

impl PubSubActorClient {
    #[instrument(skip(self, event))]
    pub async fn handle_event(&self, event: Value) -> Result<()> {
        self.call("handleEvent", vec![event]).await
    }

    /// Every event payload received so far, in arrival order.
    #[instrument(skip(self))]
    pub async fn get_messages(&self) -> Result<Vec<Value>> {
        self.call("getMessages", Vec::new()).await
    }
}
