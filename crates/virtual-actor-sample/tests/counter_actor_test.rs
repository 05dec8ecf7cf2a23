use serde_json::json;
use std::sync::Arc;
use virtual_actor::mock::MockTransport;
use virtual_actor::{ActorClientRegistry, ActorError, ActorIdentity, ActorInterface, StateStore};
use virtual_actor_sample::clients::{CounterClient, StatelessCounterClient};
use virtual_actor_sample::counter_actor::TOTAL_KEY;
use virtual_actor_sample::lifecycle::ActorSystem;
use virtual_actor_sample::stateless_counter_actor::SERIALIZABLE_ERROR_MESSAGE;

/// Pattern 1: Client + Mock
/// - Typed client against a scripted transport
/// - No actor runs; only the request the client produces is checked
#[test_log::test(tokio::test)]
async fn test_counter_client_with_mock_transport() {
    let mock = Arc::new(MockTransport::new());
    mock.expect_invoke("getCounter")
        .on_actor("CounterActor", "c1")
        .return_ok(json!(5));

    let registry = ActorClientRegistry::new(mock.clone());
    registry.register("CounterActor", "CounterActor");
    registry.register_interface("CounterActor", CounterClient::INTERFACE_NAME);

    let counter: CounterClient = registry.get("c1").unwrap();
    assert_eq!(counter.get_counter().await.unwrap(), 5);

    let request = mock.last_request().unwrap();
    assert_eq!(request.method, "getCounter");
    assert!(request.correlation_id.is_some());
    mock.verify();
}

/// Pattern 2: Real actor in a full system
/// - Count and shared cache both move on every increment
/// - The count survives deactivation because it was saved
#[test_log::test(tokio::test)]
async fn test_counter_state_survives_deactivation() {
    let system = ActorSystem::new().unwrap();
    let counter = system.counter("counter-1").unwrap();

    counter.increment().await.unwrap();
    counter.increment().await.unwrap();
    assert_eq!(counter.get_counter().await.unwrap(), 2);

    system
        .host()
        .runtime()
        .deactivate("CounterActor", "counter-1")
        .await;
    assert!(!system.host().runtime().has_actor("CounterActor", "counter-1"));

    assert_eq!(counter.get_counter().await.unwrap(), 2);
    counter.increment().await.unwrap();
    assert_eq!(counter.get_counter().await.unwrap(), 3);
    assert_eq!(system.cache().get(TOTAL_KEY), Some(json!(3)));

    system.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_counter_persists_whole_state_under_state_key() {
    let system = ActorSystem::new().unwrap();
    let counter = system.counter("fresh").unwrap();

    counter.increment().await.unwrap();
    assert_eq!(counter.get_counter().await.unwrap(), 1);
    counter.increment().await.unwrap();

    let stored = system
        .host()
        .state_store()
        .get_state(&ActorIdentity::new("CounterActor", "fresh"), "state")
        .await
        .unwrap();
    assert_eq!(stored, Some(json!({"counter": 2})));
    system.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_counters_with_different_ids_are_isolated() {
    let system = ActorSystem::new().unwrap();
    let a = system.counter("a").unwrap();
    let b = system.counter("b").unwrap();

    a.increment().await.unwrap();
    a.increment().await.unwrap();
    b.increment().await.unwrap();

    assert_eq!(a.get_counter().await.unwrap(), 2);
    assert_eq!(b.get_counter().await.unwrap(), 1);
    // The cache is shared by both
    assert_eq!(system.cache().get(TOTAL_KEY), Some(json!(3)));
    system.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_stateless_counter_restarts_after_deactivation() {
    let system = ActorSystem::new().unwrap();
    let counter: StatelessCounterClient = system.stateless_counter("s1").unwrap();

    counter.increment().await.unwrap();
    assert_eq!(counter.get_counter().await.unwrap(), 1);

    system
        .host()
        .runtime()
        .deactivate("StatelessCounterActor", "s1")
        .await;
    assert_eq!(counter.get_counter().await.unwrap(), 0);
    system.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_serializable_error_reaches_caller_intact() {
    let system = ActorSystem::new().unwrap();
    let counter = system.stateless_counter("errors").unwrap();

    match counter.throw_serializable_error().await {
        Err(ActorError::Serializable(e)) => {
            assert_eq!(e.message, SERIALIZABLE_ERROR_MESSAGE);
            assert_eq!(e.status_code, 400);
        }
        other => panic!("expected a serializable error, got {other:?}"),
    }

    match counter.throw_error().await {
        Err(ActorError::Remote { status }) => assert_eq!(status, 500),
        other => panic!("expected a bare 500, got {other:?}"),
    }
    system.shutdown().await;
}
