//! # Pub/Sub Actor
//!
//! Receives `com.example.event` messages through [`ActorTopicRoute`]s. The producer id
//! in each event picks the actor instance, so all events of one producer land on the
//! same actor in publish order.
//!
//! In-process events matching [`LOCAL_EVENT_PATTERN`] take the same way in through an
//! [`ActorEventRoute`], landing on `handleEvent` without a broker hop.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use virtual_actor::{
    reply, unknown_method, ActorClientRegistry, ActorContext, ActorEventRoute, ActorIdentity,
    ActorTopicRoute, MethodArgs, Result, VirtualActor,
};

pub const EVENT_TOPIC: &str = "com.example.event";
pub const LOCAL_EVENT_PATTERN: &str = "com.example.*";

#[derive(Default)]
pub struct StatelessPubSubActor {
    messages: Mutex<Vec<Value>>,
}

#[async_trait]
impl VirtualActor for StatelessPubSubActor {
    const TYPE_NAME: &'static str = "StatelessPubSubActor";
    type Dependencies = ();

    fn create(_: &ActorIdentity, _: ()) -> Self {
        Self::default()
    }

    async fn invoke(&self, ctx: &ActorContext<Self>, method: &str, args: MethodArgs) -> Result<Value> {
        match method {
            "increment" | "handleEvent" => {
                let payload = args.raw(0).cloned().unwrap_or(Value::Null);
                debug!(actor = %ctx.identity(), correlation_id = ?ctx.correlation_id(), "Event received");
                self.messages.lock().push(payload);
                Ok(Value::Null)
            }
            "getMessages" => reply(self.messages.lock().clone()),
            _ => Err(unknown_method(Self::TYPE_NAME, method)),
        }
    }
}

/// Picks the target actor of an event.
pub fn producer_id(event: &Value) -> Option<String> {
    event.get("producerId")?.as_str().map(str::to_owned)
}

/// Route delivering [`EVENT_TOPIC`] messages to `increment` on the producer's actor.
pub fn event_route(registry: Arc<ActorClientRegistry>) -> ActorTopicRoute {
    ActorTopicRoute::new(
        registry,
        StatelessPubSubActor::TYPE_NAME,
        "increment",
        producer_id,
    )
}

/// Listener delivering local events to `handleEvent`. Failures are logged, not raised.
pub fn local_event_route(registry: Arc<ActorClientRegistry>) -> ActorEventRoute {
    ActorEventRoute::new(
        registry,
        StatelessPubSubActor::TYPE_NAME,
        "handleEvent",
        producer_id,
    )
    .ignore_errors(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn producer_id_reads_camel_case_field() {
        assert_eq!(producer_id(&json!({"producerId": "p-1"})), Some("p-1".into()));
        assert_eq!(producer_id(&json!({"producer_id": "p-1"})), None);
    }
}
