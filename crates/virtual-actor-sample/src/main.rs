//! # Virtual Actor Sample
//!
//! Runs every sample actor through one [`ActorSystem`]:
//!
//! 1. A stateful counter whose count survives deactivation.
//! 2. A context-aware call chain where nested actors see the caller's correlation id.
//! 3. The two kinds of actor errors as a caller sees them.
//! 4. Events published on a topic and routed to actors by producer id.
//! 5. The same kind of event emitted in-process, without the broker.
//!
//! Run with `RUST_LOG=debug` to see every routed call.

use serde_json::json;
use tracing::{error, info, Instrument};
use virtual_actor::tracing::setup_tracing;
use virtual_actor::{AmbientContext, ContextStore};
use virtual_actor_sample::counter_actor::TOTAL_KEY;
use virtual_actor_sample::lifecycle::ActorSystem;
use virtual_actor_sample::model::PubSubEvent;
use virtual_actor_sample::pubsub_actor::EVENT_TOPIC;

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting virtual actor sample");
    let system = ActorSystem::new().map_err(|e| e.to_string())?;

    let span = tracing::info_span!("counter");
    let count = async {
        let counter = system.counter("counter-1")?;
        counter.increment().await?;
        counter.increment().await?;
        counter.get_counter().await
    }
    .instrument(span)
    .await
    .map_err(|e| e.to_string())?;
    let total = system.cache().get(TOTAL_KEY).unwrap_or(json!(0));
    info!(count, %total, "Counter updated");

    let span = tracing::info_span!("context_propagation");
    let seen = ContextStore::scope_with(
        AmbientContext::with_correlation_id("sample-request-1"),
        async {
            info!("Running context-aware actor");
            system.context_aware("nested-context-1")?.run().await
        }
        .instrument(span),
    )
    .await
    .map_err(|e| e.to_string())?;
    info!(correlation_id = ?seen, "Context-aware actor finished");

    let stateless = system
        .stateless_counter("errors-1")
        .map_err(|e| e.to_string())?;
    if let Err(e) = stateless.throw_serializable_error().await {
        info!(status = e.status_code(), error = %e, "Serializable error reached the caller");
    }
    if let Err(e) = stateless.throw_error().await {
        info!(status = e.status_code(), error = %e, "Internal error reached the caller");
    }

    let span = tracing::info_span!("pubsub");
    let delivered = async {
        for (producer, id) in [("producer-a", "1"), ("producer-b", "2"), ("producer-a", "3")] {
            let event = serde_json::to_value(PubSubEvent::new(producer, id))?;
            system
                .publisher()
                .publish(EVENT_TOPIC, event, producer)
                .await?;
        }
        system.publisher().flush().await?;
        system.pubsub_actor("producer-a")?.get_messages().await
    }
    .instrument(span)
    .await;

    match delivered {
        Ok(messages) => {
            let first = messages.first().cloned().unwrap_or(json!(null));
            info!(count = messages.len(), %first, "Events delivered for producer-a")
        }
        Err(e) => error!(error = %e, "Event delivery failed"),
    }

    let local = PubSubEvent::new("producer-local", "4");
    let emitted = match serde_json::to_value(local) {
        Ok(event) => system.host().events().emit_async("com.example.local", event).await,
        Err(e) => Err(e.into()),
    };
    match emitted {
        Ok(results) => info!(listeners = results.len(), "Local event handled"),
        Err(e) => error!(error = %e, "Local event failed"),
    }

    system.shutdown().await;

    info!("Sample completed successfully");
    Ok(())
}
