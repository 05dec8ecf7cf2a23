//! Data carried by the sample actors: persisted state and pub/sub event payloads.

pub mod counter;
pub mod event;

pub use counter::*;
pub use event::*;
