//! # Virtual Actor
//!
//! Building blocks for virtual actors: actors that always exist conceptually, are
//! addressed by `(type, id)` and are activated on first use by the runtime that hosts
//! them. Callers never create or destroy instances. They ask a registry for a proxy and
//! call methods on it.
//!
//! ## Architecture Overview
//!
//! The crate separates concerns into four layers:
//!
//! 1. **Actor Layer** ([`VirtualActor`], [`ActorContext`]) - your business logic and its
//!    declared state
//! 2. **Runtime Layer** ([`ActorRuntime`]) - placement, activation, turns and the
//!    invocation pipeline
//! 3. **Client Layer** ([`ActorClientRegistry`], [`ActorProxy`], [`ActorInterface`]) -
//!    name resolution and outbound calls
//! 4. **Transport Layer** ([`ActorTransport`]) - the hop between the two, either a sidecar
//!    or the in-process [`LoopbackTransport`]
//!
//! [`ActorHost`] wires all of them from a [`VirtualActorConfig`]. Topic messages reach
//! actors through [`ActorTopicRoute`]; in-process named events through [`ActorEventRoute`].
//!
//! ## Ambient Context
//!
//! Every call chain carries an [`AmbientContext`] (with at least a correlation id). The
//! [`ContextStore`] keeps it per task; proxies append it to outgoing payloads and the
//! runtime restores it before the method body runs, so `A → B → C` all see the same
//! correlation id without passing it explicitly.
//!
//! ```rust
//! use virtual_actor::{AmbientContext, ContextStore};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let id = ContextStore::scope_with(AmbientContext::with_correlation_id("req-1"), async {
//!     ContextStore::get_correlation_id(false)
//! })
//! .await;
//! assert_eq!(id.as_deref(), Some("req-1"));
//! # }
//! ```
//!
//! ## Writing an Actor
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde::{Deserialize, Serialize};
//! use serde_json::Value;
//! use virtual_actor::{
//!     reply, unknown_method, ActorContext, ActorHost, ActorIdentity, MethodArgs, Result,
//!     StateField, StateProperty, VirtualActor,
//! };
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Tally {
//!     count: i64,
//! }
//!
//! struct TallyActor {
//!     tally: StateField<Tally>,
//! }
//!
//! #[async_trait]
//! impl VirtualActor for TallyActor {
//!     const TYPE_NAME: &'static str = "TallyActor";
//!     type Dependencies = ();
//!
//!     fn create(_: &ActorIdentity, _: ()) -> Self {
//!         Self { tally: StateField::new() }
//!     }
//!
//!     fn state_properties() -> Vec<StateProperty<Self>> {
//!         vec![StateProperty::plain("tally", |a: &Self| &a.tally)
//!             .default_with(Tally::default)
//!             .build()]
//!     }
//!
//!     async fn invoke(&self, ctx: &ActorContext<Self>, method: &str, args: MethodArgs) -> Result<Value> {
//!         match method {
//!             "add" => {
//!                 let amount: i64 = args.get(0)?;
//!                 let count = self.tally.update(|t| { t.count += amount; t.count });
//!                 ctx.save_state().await?;
//!                 reply(count)
//!             }
//!             _ => Err(unknown_method(Self::TYPE_NAME, method)),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = ActorHost::builder().build().unwrap();
//!     host.register::<TallyActor>();
//!     let tally = host.registry().get_actor("TallyActor", "a").unwrap();
//!     let count: i64 = tally.call_as("add", vec![Value::from(2)]).await.unwrap();
//!     assert_eq!(count, 2);
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - One turn at a time per actor identity; different identities run in parallel
//! - With reentrancy enabled, a call on the chain that already holds the actor enters
//!   immediately (bounded by `max_stack_depth`)
//! - Actor methods take `&self`; mutable state lives in [`StateField`]s
//!
//! ## Errors
//!
//! Everything returns [`Result`] with [`ActorError`]. Only [`SerializableError`] crosses
//! the wire with its own status and message; every other failure reaches the caller as a
//! bare 500.
//!
//! ## Testing
//!
//! [`mock::MockTransport`] answers proxy calls from canned expectations and
//! [`mock::RecordingPubSub`] records publishes. See the [`mock`] module for patterns.

pub mod actor;
pub mod client_trait;
pub mod config;
pub mod context;
pub mod dependencies;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod events;
pub mod host;
pub mod identity;
pub mod mock;
pub mod pipeline;
pub mod proxy;
pub mod pubsub;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod stateful;
pub mod tracing;
pub mod transport;

// Re-export core types for convenience
pub use actor::{ActivationState, ActorManager};
pub use client_trait::ActorInterface;
pub use config::{ActorOptions, PubSubOptions, ReentrancyOptions, VirtualActorConfig};
pub use context::{AmbientContext, ContextStore};
pub use dependencies::{Dependencies, Resolve};
pub use entity::{reply, unknown_method, MethodArgs, VirtualActor};
pub use error::{ActorError, Result, SerializableError};
pub use events::{ActorEventRoute, EventEmitter, EventListener, EventPattern};
pub use host::{ActorHost, ActorHostBuilder};
pub use identity::{ActorIdentity, NamingRules};
pub use pipeline::InvocationInterceptor;
pub use proxy::ActorProxy;
pub use pubsub::{
    ActorTopicRoute, PubSubClient, PubSubStatus, PubSubTransport, PublishMessage, PublishOptions,
    Subscriptions, TopicHandler,
};
pub use registry::ActorClientRegistry;
pub use runtime::ActorRuntime;
pub use state::{MemoryStateStore, StateStore};
pub use stateful::{ActorContext, SerializableState, StateField, StateProperty};
pub use transport::{ActorTransport, InvocationRequest, InvocationResponse, LoopbackTransport};
