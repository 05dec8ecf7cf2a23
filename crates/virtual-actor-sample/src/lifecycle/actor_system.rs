use super::LocalBroker;
use crate::clients::{
    ContextAwareClient, CounterClient, PubSubActorClient, StatelessCounterClient,
};
use crate::context_aware_actor::ContextAwareActor;
use crate::counter_actor::CounterActor;
use crate::pubsub_actor::{
    event_route, local_event_route, StatelessPubSubActor, EVENT_TOPIC, LOCAL_EVENT_PATTERN,
};
use crate::services::CacheService;
use crate::stateless_counter_actor::StatelessCounterActor;
use std::sync::Arc;
use tracing::info;
use virtual_actor::{ActorHost, PubSubClient, Result, VirtualActorConfig};

/// All sample actors wired into one host, with publishing looped back through a
/// [`LocalBroker`].
pub struct ActorSystem {
    host: ActorHost,
    cache: Arc<CacheService>,
    publisher: PubSubClient,
}

impl ActorSystem {
    /// Builds the system with the default configuration. Needs a running tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_config(VirtualActorConfig::default())
    }

    pub fn with_config(config: VirtualActorConfig) -> Result<Self> {
        let cache = Arc::new(CacheService::new());
        let host = ActorHost::builder()
            .config(config)
            .provide(cache.clone())
            .build()?;

        host.register_with_interface::<CounterActor, CounterClient>();
        host.register_with_interface::<StatelessCounterActor, StatelessCounterClient>();
        host.register_with_interface::<ContextAwareActor, ContextAwareClient>();
        host.register_with_interface::<StatelessPubSubActor, PubSubActorClient>();

        let pubsub_name = host.config().pubsub.default_name.clone();
        host.subscriptions().subscribe(
            &pubsub_name,
            EVENT_TOPIC,
            Arc::new(event_route(host.registry().clone())),
        );
        host.events().on(
            LOCAL_EVENT_PATTERN,
            Arc::new(local_event_route(host.registry().clone())),
        );
        let publisher = host.start_pubsub(Arc::new(LocalBroker::new(
            host.subscriptions().clone(),
        )));

        info!(actor_types = ?host.runtime().registered_types(), "Actor system started");
        Ok(Self {
            host,
            cache,
            publisher,
        })
    }

    pub fn host(&self) -> &ActorHost {
        &self.host
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    pub fn publisher(&self) -> &PubSubClient {
        &self.publisher
    }

    pub fn counter(&self, id: &str) -> Result<CounterClient> {
        self.host.registry().get(id)
    }

    pub fn stateless_counter(&self, id: &str) -> Result<StatelessCounterClient> {
        self.host.registry().get(id)
    }

    pub fn context_aware(&self, id: &str) -> Result<ContextAwareClient> {
        self.host.registry().get(id)
    }

    pub fn pubsub_actor(&self, id: &str) -> Result<PubSubActorClient> {
        self.host.registry().get(id)
    }

    /// Deactivates every actor and flushes pending publishes.
    pub async fn shutdown(&self) {
        info!("Shutting down actor system");
        self.host.shutdown().await;
    }
}
