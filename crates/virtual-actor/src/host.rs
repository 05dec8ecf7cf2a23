//! # Actor Host
//!
//! Wires one process worth of framework pieces together from a [`VirtualActorConfig`]:
//!
//! | Piece | Default |
//! |-------|---------|
//! | State store | [`MemoryStateStore`] |
//! | Transport | [`LoopbackTransport`] attached to the host's runtime |
//! | Registry | shared with actors through [`Dependencies`] |
//! | Publishing | off until [`ActorHost::start_pubsub`] is called |
//! | Events | an empty [`EventEmitter`], also injectable |
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::Value;
//! use virtual_actor::{
//!     ActorContext, ActorHost, ActorIdentity, MethodArgs, Result, VirtualActor, unknown_method,
//! };
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl VirtualActor for Echo {
//!     const TYPE_NAME: &'static str = "EchoActor";
//!     type Dependencies = ();
//!
//!     fn create(_: &ActorIdentity, _: ()) -> Self {
//!         Echo
//!     }
//!
//!     async fn invoke(&self, _: &ActorContext<Self>, method: &str, args: MethodArgs) -> Result<Value> {
//!         match method {
//!             "echo" => Ok(args.raw(0).cloned().unwrap_or(Value::Null)),
//!             _ => Err(unknown_method(Self::TYPE_NAME, method)),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = ActorHost::builder().build().unwrap();
//!     host.register::<Echo>();
//!
//!     let echo = host.registry().get_actor("EchoActor", "1").unwrap();
//!     let reply = echo.call("echo", vec![Value::from("hi")]).await.unwrap();
//!     assert_eq!(reply, Value::from("hi"));
//!     host.shutdown().await;
//! }
//! ```
use crate::client_trait::ActorInterface;
use crate::config::VirtualActorConfig;
use crate::dependencies::Dependencies;
use crate::entity::VirtualActor;
use crate::error::Result;
use crate::events::EventEmitter;
use crate::pubsub::{PubSubClient, PubSubTransport, PublishBuffer, Subscriptions};
use crate::registry::ActorClientRegistry;
use crate::runtime::{ActorRuntime, RuntimeOptions};
use crate::state::{MemoryStateStore, StateStore};
use crate::transport::{ActorTransport, LoopbackTransport};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Default)]
pub struct ActorHostBuilder {
    config: VirtualActorConfig,
    store: Option<Arc<dyn StateStore>>,
    transport: Option<Arc<dyn ActorTransport>>,
    dependencies: Dependencies,
}

impl ActorHostBuilder {
    pub fn config(mut self, config: VirtualActorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the loopback with an outbound transport to a real sidecar.
    pub fn transport(mut self, transport: Arc<dyn ActorTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Makes `service` injectable into actors.
    pub fn provide<T: Send + Sync + 'static>(self, service: Arc<T>) -> Self {
        self.dependencies.provide(service);
        self
    }

    pub fn build(self) -> Result<ActorHost> {
        self.config.validate()?;
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStateStore::new()));

        let loopback = Arc::new(LoopbackTransport::new());
        let transport: Arc<dyn ActorTransport> = match self.transport {
            Some(transport) => transport,
            None => loopback.clone(),
        };

        let registry = Arc::new(ActorClientRegistry::new(transport));
        let actor = &config.actor;
        registry.set_prefix(&actor.prefix, Some(&actor.delimiter));
        registry.set_type_name_prefix(&actor.type_name_prefix);
        registry.set_allow_internal_calls(actor.allow_internal_calls);
        registry.set_context_propagation(config.context_propagation);
        registry.set_reentrancy(actor.reentrancy.clone());

        let events = Arc::new(EventEmitter::new());
        let dependencies = self.dependencies;
        dependencies.provide(registry.clone());
        dependencies.provide(events.clone());

        let runtime = Arc::new(ActorRuntime::new(
            store.clone(),
            dependencies,
            RuntimeOptions {
                type_name_prefix: actor.type_name_prefix.clone(),
                reentrancy: actor.reentrancy.clone(),
            },
        ));
        loopback.attach(&runtime);
        registry.attach_runtime(&runtime);

        info!(
            prefix = %actor.prefix,
            type_name_prefix = %actor.type_name_prefix,
            internal_calls = actor.allow_internal_calls,
            reentrancy = actor.reentrancy.enabled,
            "Actor host ready"
        );
        Ok(ActorHost {
            config,
            store,
            registry,
            runtime,
            subscriptions: Arc::new(Subscriptions::new()),
            events,
            publisher: Mutex::new(None),
        })
    }
}

pub struct ActorHost {
    config: VirtualActorConfig,
    store: Arc<dyn StateStore>,
    registry: Arc<ActorClientRegistry>,
    runtime: Arc<ActorRuntime>,
    subscriptions: Arc<Subscriptions>,
    events: Arc<EventEmitter>,
    publisher: Mutex<Option<(PubSubClient, JoinHandle<()>)>>,
}

impl ActorHost {
    pub fn builder() -> ActorHostBuilder {
        ActorHostBuilder::default()
    }

    /// Registers `A` with the runtime and the client registry. Returns the type name
    /// the runtime knows it by.
    pub fn register<A: VirtualActor>(&self) -> String {
        let type_name = self.runtime.register::<A>();
        self.registry.register_actor::<A>();
        type_name
    }

    /// Same as [`register`](Self::register), also resolvable through `I`'s name.
    pub fn register_with_interface<A: VirtualActor, I: ActorInterface>(&self) -> String {
        let type_name = self.runtime.register::<A>();
        self.registry.register_actor_interface::<A, I>();
        type_name
    }

    pub fn config(&self) -> &VirtualActorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ActorClientRegistry> {
        &self.registry
    }

    pub fn runtime(&self) -> &Arc<ActorRuntime> {
        &self.runtime
    }

    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn dependencies(&self) -> &Dependencies {
        self.runtime.dependencies()
    }

    pub fn subscriptions(&self) -> &Arc<Subscriptions> {
        &self.subscriptions
    }

    pub fn events(&self) -> &Arc<EventEmitter> {
        &self.events
    }

    /// Starts the publish buffer and makes a [`PubSubClient`] injectable into actors
    /// activated afterwards. Calling it again returns the running client.
    pub fn start_pubsub(&self, transport: Arc<dyn PubSubTransport>) -> PubSubClient {
        let mut publisher = self.publisher.lock();
        if let Some((client, _)) = publisher.as_ref() {
            return client.clone();
        }
        let (buffer, client) = PublishBuffer::new(self.config.pubsub.clone(), transport);
        let handle = tokio::spawn(buffer.run());
        self.runtime.dependencies().provide(Arc::new(client.clone()));
        *publisher = Some((client.clone(), handle));
        client
    }

    pub fn pubsub(&self) -> Option<PubSubClient> {
        self.publisher.lock().as_ref().map(|(client, _)| client.clone())
    }

    /// Drops every event listener, deactivates every active actor, then flushes and
    /// stops the publish buffer. Publishing through a leftover client afterwards fails
    /// with a transport error.
    pub async fn shutdown(&self) {
        self.events.remove_all_listeners();
        for identity in self.runtime.active_identities() {
            self.runtime
                .deactivate(identity.type_name(), identity.id())
                .await;
        }

        let publisher = self.publisher.lock().take();
        if let Some((client, handle)) = publisher {
            if let Err(e) = client.flush().await {
                warn!(error = %e, "Final publish flush failed");
            }
            handle.abort();
            let _ = handle.await;
        }
        info!("Actor host stopped");
    }
}
