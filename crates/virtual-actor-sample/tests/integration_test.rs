use serde_json::{json, Value};
use virtual_actor::{AmbientContext, ContextStore, PubSubStatus};
use virtual_actor_sample::context_aware_actor::COUNTER_ACTOR_ID;
use virtual_actor_sample::lifecycle::ActorSystem;
use virtual_actor_sample::model::PubSubEvent;
use virtual_actor_sample::pubsub_actor::EVENT_TOPIC;

/// Full system: the caller's correlation id reaches the nested actors of the chain.
#[test_log::test(tokio::test)]
async fn test_context_flows_through_nested_actors() {
    let system = ActorSystem::new().unwrap();
    let actor = system.context_aware("nested-context-1").unwrap();

    let seen = ContextStore::scope_with(AmbientContext::with_correlation_id("abc-123"), async {
        actor.run().await
    })
    .await
    .unwrap();
    assert_eq!(seen.as_deref(), Some("abc-123"));

    let counter = system.stateless_counter(COUNTER_ACTOR_ID).unwrap();
    assert_eq!(counter.get_counter().await.unwrap(), 3);
    system.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_calls_outside_a_scope_get_fresh_correlation_ids() {
    let system = ActorSystem::new().unwrap();
    let actor = system.context_aware("pinger").unwrap();

    let first = actor.ping().await.unwrap();
    let second = actor.ping().await.unwrap();
    assert!(first.is_some());
    assert!(second.is_some());
    assert_ne!(first, second);
    system.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_published_events_reach_actor_by_producer() {
    let system = ActorSystem::new().unwrap();

    for (producer, id) in [("producer-a", "1"), ("producer-b", "2"), ("producer-a", "3")] {
        let event = serde_json::to_value(PubSubEvent::new(producer, id)).unwrap();
        system
            .publisher()
            .publish(EVENT_TOPIC, event, producer)
            .await
            .unwrap();
    }
    system.publisher().flush().await.unwrap();

    let messages = system
        .pubsub_actor("producer-a")
        .unwrap()
        .get_messages()
        .await
        .unwrap();
    let ids: Vec<&str> = messages.iter().filter_map(|m| m["id"].as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);

    let others = system
        .pubsub_actor("producer-b")
        .unwrap()
        .get_messages()
        .await
        .unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0]["producerId"], json!("producer-b"));
    system.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_event_without_producer_is_retried() {
    let system = ActorSystem::new().unwrap();
    let pubsub_name = system.host().config().pubsub.default_name.clone();

    let status = system
        .host()
        .subscriptions()
        .dispatch(&pubsub_name, EVENT_TOPIC, json!({"id": "orphan"}))
        .await;
    assert_eq!(status, PubSubStatus::Retry);

    let status = system
        .host()
        .subscriptions()
        .dispatch(&pubsub_name, "com.example.unknown", Value::Null)
        .await;
    assert_eq!(status, PubSubStatus::Drop);
    system.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_shutdown_deactivates_everything() {
    let system = ActorSystem::new().unwrap();
    system.counter("c").unwrap().increment().await.unwrap();
    system.stateless_counter("s").unwrap().increment().await.unwrap();
    assert_eq!(system.host().runtime().active_actors().len(), 2);

    system.shutdown().await;
    assert!(system.host().runtime().active_actors().is_empty());
    assert!(system
        .publisher()
        .publish(EVENT_TOPIC, json!({}), "late")
        .await
        .is_err());
}

#[test_log::test(tokio::test)]
async fn test_local_events_reach_the_producers_actor() {
    let system = ActorSystem::new().unwrap();
    let events = system.host().events();

    let results = events
        .emit_async("com.example.created", json!({"producerId": "local-a", "id": 1}))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    // no producer: the route swallows the failure
    let results = events
        .emit_async("com.example.created", json!({"id": 2}))
        .await
        .unwrap();
    assert_eq!(results, vec![Value::Null]);

    let messages = system
        .pubsub_actor("local-a")
        .unwrap()
        .get_messages()
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["id"], json!(1));
    system.shutdown().await;
}
