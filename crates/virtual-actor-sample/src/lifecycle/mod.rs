//! # System Lifecycle & Orchestration
//!
//! Individual actors stay small; wiring them into one running process is where the work
//! is. This module is that wiring for the sample actors.
//!
//! **Key Responsibilities:**
//! 1. **Services** - Create the shared services actors depend on ([`CacheService`])
//! 2. **Registration** - Register every actor type and its typed interface with the host
//! 3. **Subscriptions** - Route topic messages to actors by producer id
//! 4. **Publishing** - Start the publish buffer against a broker
//! 5. **Graceful Shutdown** - Deactivate actors and flush pending publishes
//!
//! ## The ActorSystem Pattern
//!
//! ```rust,ignore
//! impl ActorSystem {
//!     pub fn with_config(config: VirtualActorConfig) -> Result<Self> {
//!         // 1. Services go in before the host exists, so every activation can resolve them
//!         let host = ActorHost::builder()
//!             .config(config)
//!             .provide(Arc::new(CacheService::new()))
//!             .build()?;
//!
//!         // 2. Actor types, each reachable by its own name and its interface name
//!         host.register_with_interface::<CounterActor, CounterClient>();
//!
//!         // 3. Deliveries go through the registry, like any other caller
//!         host.subscriptions().subscribe(&name, EVENT_TOPIC, Arc::new(event_route(registry)));
//!
//!         // 4. A broker that loops publishes back into our own subscriptions
//!         host.start_pubsub(Arc::new(LocalBroker::new(host.subscriptions().clone())));
//!         Ok(Self { host })
//!     }
//! }
//! ```
//!
//! ## Dependency Injection
//!
//! Actors never construct their collaborators. Each declares what it needs through
//! `VirtualActor::Dependencies` and the runtime resolves it on activation:
//!
//! ```rust,ignore
//! // No dependencies
//! impl VirtualActor for StatelessCounterActor {
//!     type Dependencies = ();
//! }
//!
//! // A shared service
//! impl VirtualActor for CounterActor {
//!     type Dependencies = Arc<CacheService>;
//! }
//!
//! // Other actors, through the client registry the host always provides
//! impl VirtualActor for ContextAwareActor {
//!     type Dependencies = Arc<ActorClientRegistry>;
//! }
//! ```
//!
//! A dependency missing at activation fails that call with a 500; nothing is checked
//! at registration time.
//!
//! ## Shutdown
//!
//! [`ActorSystem::shutdown`] deactivates every active actor (running its deactivation
//! hook) and then flushes the publish buffer, so nothing queued is lost on a clean stop.
//!
//! [`CacheService`]: crate::services::CacheService
mod actor_system;
mod local_broker;

pub use actor_system::ActorSystem;
pub use local_broker::LocalBroker;
