//! # Typed Actor Clients
//!
//! One [`ActorInterface`](virtual_actor::ActorInterface) adapter per sample actor. Each
//! is resolved through the registry by its interface name, e.g.
//! `registry.get::<CounterClient>("counter-1")`.
pub mod context_aware_client;
pub mod counter_client;
pub mod pubsub_actor_client;
pub mod stateless_counter_client;

pub use context_aware_client::ContextAwareClient;
pub use counter_client::CounterClient;
pub use pubsub_actor_client::PubSubActorClient;
pub use stateless_counter_client::StatelessCounterClient;
