//! # Context-Aware Actor
//!
//! Shows that the caller's ambient context follows a call chain across actors. `run`
//! pings a nested context-aware actor, increments a stateless counter three times and
//! returns the correlation id it saw, which should be the one the outermost caller set.

use crate::clients::{ContextAwareClient, StatelessCounterClient};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use virtual_actor::{
    reply, unknown_method, ActorClientRegistry, ActorContext, ActorError, ActorIdentity,
    MethodArgs, Result, VirtualActor,
};

pub const NESTED_ACTOR_ID: &str = "nested-context-2";
pub const COUNTER_ACTOR_ID: &str = "counter-1";

pub struct ContextAwareActor {
    registry: Arc<ActorClientRegistry>,
}

impl ContextAwareActor {
    async fn run(&self, ctx: &ActorContext<Self>) -> Result<Option<String>> {
        let correlation_id = ctx.correlation_id();
        info!(actor = %ctx.identity(), ?correlation_id, "Running");

        let nested: ContextAwareClient = self.registry.get(NESTED_ACTOR_ID)?;
        let nested_id = nested.ping().await?;
        debug!(?nested_id, "Nested actor answered");

        let counter: StatelessCounterClient = self.registry.get(COUNTER_ACTOR_ID)?;
        let previous = counter.get_counter().await?;
        for _ in 0..3 {
            counter.increment().await?;
        }
        let value = counter.get_counter().await?;
        if value != previous + 3 {
            return Err(ActorError::Unexpected(format!(
                "counter moved from {previous} to {value}, expected {}",
                previous + 3
            )));
        }
        Ok(correlation_id)
    }
}

#[async_trait]
impl VirtualActor for ContextAwareActor {
    const TYPE_NAME: &'static str = "ContextAwareActor";
    type Dependencies = Arc<ActorClientRegistry>;

    fn create(_: &ActorIdentity, registry: Arc<ActorClientRegistry>) -> Self {
        Self { registry }
    }

    async fn invoke(&self, ctx: &ActorContext<Self>, method: &str, _: MethodArgs) -> Result<Value> {
        match method {
            "run" => reply(self.run(ctx).await?),
            "ping" => reply(ctx.correlation_id()),
            _ => Err(unknown_method(Self::TYPE_NAME, method)),
        }
    }
}
