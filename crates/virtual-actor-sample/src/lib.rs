//! # Virtual Actor Sample Library
//!
//! Sample actors, typed clients and the [`lifecycle::ActorSystem`] that wires them, exposed
//! for the binary and for integration testing.

pub mod clients;
pub mod context_aware_actor;
pub mod counter_actor;
pub mod lifecycle;
pub mod model;
pub mod pubsub_actor;
pub mod services;
pub mod stateless_counter_actor;
