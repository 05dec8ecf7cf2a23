//! # Counter Actor
//!
//! A stateful counter. Each `increment` bumps the persisted [`CounterState`], adds one to
//! the node-wide `"total"` entry of the injected [`CacheService`] and saves before
//! returning, so the count survives deactivation.
//!
//! ## Usage
//!
//! ```rust
//! use virtual_actor_sample::clients::CounterClient;
//! use virtual_actor_sample::lifecycle::ActorSystem;
//!
//! #[tokio::main]
//! async fn main() -> virtual_actor::Result<()> {
//!     let system = ActorSystem::new()?;
//!     let counter = system.counter("counter-1")?;
//!     counter.increment().await?;
//!     assert_eq!(counter.get_counter().await?, 1);
//!     system.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::model::CounterState;
use crate::services::CacheService;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use virtual_actor::{
    reply, unknown_method, ActorContext, ActorIdentity, MethodArgs, Result, StateField,
    StateProperty, VirtualActor,
};

/// Key of the cache entry counting increments across all counters.
pub const TOTAL_KEY: &str = "total";

pub struct CounterActor {
    cache: Arc<CacheService>,
    state: StateField<CounterState>,
}

impl CounterActor {
    fn counter(&self) -> i64 {
        self.state.with(|s| s.map_or(0, |s| s.counter))
    }
}

#[async_trait]
impl VirtualActor for CounterActor {
    const TYPE_NAME: &'static str = "CounterActor";
    type Dependencies = Arc<CacheService>;

    fn create(_: &ActorIdentity, cache: Arc<CacheService>) -> Self {
        Self {
            cache,
            state: StateField::new(),
        }
    }

    fn state_properties() -> Vec<StateProperty<Self>> {
        vec![StateProperty::serializable("state", |a: &Self| &a.state)
            .default_with(CounterState::default)
            .into()]
    }

    async fn invoke(&self, ctx: &ActorContext<Self>, method: &str, _: MethodArgs) -> Result<Value> {
        match method {
            "increment" => {
                let counter = self.state.update(|s| {
                    s.counter += 1;
                    s.counter
                });
                debug!(
                    actor = %ctx.identity(),
                    correlation_id = ?ctx.correlation_id(),
                    ?counter,
                    "Incremented"
                );
                self.cache.increment(TOTAL_KEY);
                ctx.save_state().await?;
                Ok(Value::Null)
            }
            "getCounter" => reply(self.counter()),
            _ => Err(unknown_method(Self::TYPE_NAME, method)),
        }
    }
}
