use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use virtual_actor::{ActorError, PubSubStatus, PubSubTransport, Result, Subscriptions};

/// In-process broker: every publish is delivered straight to this process's
/// subscriptions. A delivery asking for a retry surfaces as a publish error.
pub struct LocalBroker {
    subscriptions: Arc<Subscriptions>,
}

impl LocalBroker {
    pub fn new(subscriptions: Arc<Subscriptions>) -> Self {
        Self { subscriptions }
    }

    async fn deliver(&self, name: &str, topic: &str, payload: Value) -> Result<()> {
        match self.subscriptions.dispatch(name, topic, payload).await {
            PubSubStatus::Retry => Err(ActorError::Transport(format!(
                "delivery on {name}/{topic} asked for a retry"
            ))),
            PubSubStatus::Success | PubSubStatus::Drop => Ok(()),
        }
    }
}

#[async_trait]
impl PubSubTransport for LocalBroker {
    async fn publish(
        &self,
        name: &str,
        topic: &str,
        payload: &Value,
        _metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.deliver(name, topic, payload.clone()).await
    }

    async fn publish_bulk(
        &self,
        name: &str,
        topic: &str,
        payloads: &[Value],
        metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        debug!(name, topic, count = payloads.len(), ?metadata, "Delivering bulk publish");
        for payload in payloads {
            self.deliver(name, topic, payload.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[tokio::test]
    async fn bulk_delivers_in_order_and_unknown_topics_are_dropped() {
        let subscriptions = Arc::new(Subscriptions::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        subscriptions.subscribe_fn("pubsub", "numbers", move |data: Value| {
            let sink = sink.clone();
            async move {
                sink.lock().push(data);
                Ok(())
            }
        });
        let broker = LocalBroker::new(subscriptions);

        broker
            .publish_bulk("pubsub", "numbers", &[json!(1), json!(2)], &BTreeMap::new())
            .await
            .unwrap();
        broker
            .publish("pubsub", "elsewhere", &json!(3), &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn failing_handler_surfaces_as_publish_error() {
        let subscriptions = Arc::new(Subscriptions::new());
        subscriptions.subscribe_fn("pubsub", "numbers", |_: Value| async {
            Err::<(), _>(ActorError::Unexpected("nope".into()))
        });
        let broker = LocalBroker::new(subscriptions);

        let result = broker
            .publish("pubsub", "numbers", &json!(1), &BTreeMap::new())
            .await;
        assert!(matches!(result, Err(ActorError::Transport(_))));
    }
}
