//! # Actor Manager
//!
//! One [`ActorManager`] exists per registered actor type. It owns the placement table
//! for that type (identity → activated instance) and drives every instance through its
//! lifecycle.
//!
//! ```text
//! Inactive ──activate──▶ Activating ──ok──▶ Active ──deactivate──▶ Deactivating ──▶ Inactive
//!                            │
//!                            └──error──▶ (discarded, next call retries)
//! ```
//!
//! # Turns
//!
//! Each activated actor runs one invocation at a time. A call that carries the same
//! reentrancy chain id as the invocation currently holding the actor enters
//! immediately, up to `max_stack_depth` nested turns. Calls from any other chain wait.
//!
//! # Operations
//!
//! * **Invoke**:
//!     1. Unpacks the payload and restores the caller's context (within one scope).
//!     2. Looks up the identity in the placement table, activating it on first use.
//!     3. Waits for the actor's turn (or re-enters it on the same chain).
//!     4. Runs the method through the pipeline.
//!
//! * **Deactivate**:
//!     1. Waits for the in-flight turn to finish and holds the turn. Unknown ids are ignored.
//!     2. Calls `on_deactivate` (a failing hook is logged, not returned) and flushes
//!        staged state writes.
//!     3. Removes the identity from the placement table, then releases the turn.
//!
//! Calls queued behind a deactivation find the instance inactive once they get the
//! turn and start over against a fresh activation, which loads the flushed state.
use crate::config::ReentrancyOptions;
use crate::context::ContextStore;
use crate::dependencies::Dependencies;
use crate::entity::{MethodArgs, VirtualActor};
use crate::envelope;
use crate::error::{ActorError, Result};
use crate::identity::ActorIdentity;
use crate::pipeline::{self, InvocationInterceptor};
use crate::state::{StateManager, StateStore};
use crate::stateful::{ActorContext, StateProperty};
use crate::transport::InvocationRequest;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Inactive,
    Activating,
    Active,
    Deactivating,
}

impl ActivationState {
    pub fn can_transition_to(&self, next: ActivationState) -> bool {
        use ActivationState::*;
        matches!(
            (self, next),
            (Inactive, Activating)
                | (Activating, Active)
                | (Activating, Inactive)
                | (Active, Deactivating)
                | (Deactivating, Inactive)
        )
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct TurnHolder {
    chain_id: Option<String>,
    depth: usize,
}

/// Gate that admits one invocation at a time, except for same-chain reentry.
#[derive(Default)]
pub(crate) struct TurnLock {
    gate: tokio::sync::Mutex<()>,
    holder: Mutex<Option<TurnHolder>>,
}

pub(crate) enum TurnGuard<'a> {
    Exclusive {
        lock: &'a TurnLock,
        _permit: tokio::sync::MutexGuard<'a, ()>,
    },
    Reentrant {
        lock: &'a TurnLock,
    },
}

impl TurnLock {
    pub(crate) async fn enter(
        &self,
        chain_id: Option<&str>,
        max_depth: usize,
        actor_id: &str,
    ) -> Result<TurnGuard<'_>> {
        if let Some(chain) = chain_id {
            let mut holder = self.holder.lock();
            if let Some(current) = holder.as_mut() {
                if current.chain_id.as_deref() == Some(chain) {
                    if current.depth >= max_depth {
                        return Err(ActorError::ReentrancyDepthExceeded {
                            actor_id: actor_id.to_string(),
                            depth: current.depth + 1,
                            max: max_depth,
                        });
                    }
                    current.depth += 1;
                    return Ok(TurnGuard::Reentrant { lock: self });
                }
            }
        }

        let permit = self.gate.lock().await;
        *self.holder.lock() = Some(TurnHolder {
            chain_id: chain_id.map(str::to_owned),
            depth: 1,
        });
        Ok(TurnGuard::Exclusive {
            lock: self,
            _permit: permit,
        })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        match self {
            // Runs before the permit field is dropped, so the holder is cleared first.
            TurnGuard::Exclusive { lock, .. } => *lock.holder.lock() = None,
            TurnGuard::Reentrant { lock } => {
                if let Some(holder) = lock.holder.lock().as_mut() {
                    holder.depth = holder.depth.saturating_sub(1);
                }
            }
        }
    }
}

/// A live actor instance plus everything the runtime keeps beside it.
pub struct ActivatedActor<A> {
    identity: ActorIdentity,
    actor: Arc<A>,
    state: Arc<StateManager>,
    properties: Arc<Vec<StateProperty<A>>>,
    turn: TurnLock,
    status: Mutex<ActivationState>,
}

impl<A: VirtualActor> ActivatedActor<A> {
    pub(crate) fn new(
        identity: ActorIdentity,
        actor: Arc<A>,
        state: Arc<StateManager>,
        properties: Arc<Vec<StateProperty<A>>>,
    ) -> Self {
        Self {
            identity,
            actor,
            state,
            properties,
            turn: TurnLock::default(),
            status: Mutex::new(ActivationState::Inactive),
        }
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn actor(&self) -> &Arc<A> {
        &self.actor
    }

    pub fn status(&self) -> ActivationState {
        *self.status.lock()
    }

    pub(crate) fn context(&self) -> ActorContext<A> {
        ActorContext::new(
            self.identity.clone(),
            self.actor.clone(),
            self.state.clone(),
            self.properties.clone(),
        )
    }

    fn transition(&self, next: ActivationState) -> Result<()> {
        let mut status = self.status.lock();
        if !status.can_transition_to(next) {
            return Err(ActorError::InvalidTransition {
                actor_id: self.identity.id().to_string(),
                from: status.to_string(),
                to: next.to_string(),
            });
        }
        *status = next;
        Ok(())
    }

    /// Loads declared state and runs `on_activate`.
    pub(crate) async fn start(&self) -> Result<()> {
        self.transition(ActivationState::Activating)?;
        let ctx = self.context();
        let started = async {
            ctx.load_state().await?;
            self.actor.on_activate(&ctx).await
        }
        .await;
        match started {
            Ok(()) => self.transition(ActivationState::Active),
            Err(e) => {
                self.transition(ActivationState::Inactive)?;
                Err(e)
            }
        }
    }

    /// Runs `on_deactivate` and flushes staged writes. The caller holds the turn gate
    /// for the whole call. Returns false when the instance was not active.
    async fn stop(&self) -> bool {
        if let Err(e) = self.transition(ActivationState::Deactivating) {
            debug!(actor = %self.identity, error = %e, "Skipping deactivation");
            return false;
        }
        let ctx = self.context();
        if let Err(e) = self.actor.on_deactivate(&ctx).await {
            warn!(actor = %self.identity, error = %e, "on_deactivate failed");
        }
        if let Err(e) = self.state.save_state().await {
            warn!(actor = %self.identity, error = %e, "Flushing state on deactivation failed");
        }
        true
    }

    fn finish_stop(&self) {
        let _ = self.transition(ActivationState::Inactive);
    }
}

/// Type-erased view of an [`ActorManager`], as stored by the runtime.
#[async_trait]
pub(crate) trait ManagedActorType: Send + Sync {
    fn type_name(&self) -> &str;
    fn has_actor(&self, id: &str) -> bool;
    fn active_ids(&self) -> Vec<String>;
    async fn activate(&self, id: &str) -> Result<()>;
    async fn invoke(
        &self,
        request: InvocationRequest,
        interceptor: Option<Arc<dyn InvocationInterceptor>>,
    ) -> Result<Value>;
    async fn deactivate(&self, id: &str);
}

type Slot<A> = Arc<OnceCell<Arc<ActivatedActor<A>>>>;

pub struct ActorManager<A: VirtualActor> {
    type_name: String,
    properties: Arc<Vec<StateProperty<A>>>,
    placement: RwLock<HashMap<String, Slot<A>>>,
    store: Arc<dyn StateStore>,
    dependencies: Dependencies,
    reentrancy: ReentrancyOptions,
}

impl<A: VirtualActor> ActorManager<A> {
    pub fn new(
        type_name: impl Into<String>,
        store: Arc<dyn StateStore>,
        dependencies: Dependencies,
        reentrancy: ReentrancyOptions,
    ) -> Self {
        let type_name = type_name.into();
        let properties = Arc::new(A::state_properties());
        debug!(
            actor_type = %type_name,
            properties = properties.len(),
            "Computed state properties"
        );
        Self {
            type_name,
            properties,
            placement: RwLock::new(HashMap::new()),
            store,
            dependencies,
            reentrancy,
        }
    }

    pub fn properties(&self) -> &[StateProperty<A>] {
        &self.properties
    }

    /// Returns the activated instance, activating it first if needed.
    pub async fn get_or_activate(&self, id: &str) -> Result<Arc<ActivatedActor<A>>> {
        let slot = self
            .placement
            .write()
            .entry(id.to_string())
            .or_default()
            .clone();
        let activated = slot
            .get_or_try_init(|| {
                pipeline::activate::<A>(
                    ActorIdentity::new(&self.type_name, id),
                    &self.dependencies,
                    self.store.clone(),
                    self.properties.clone(),
                )
            })
            .await;
        match activated {
            Ok(activated) => Ok(activated.clone()),
            Err(e) => {
                let mut placement = self.placement.write();
                if placement
                    .get(id)
                    .is_some_and(|s| Arc::ptr_eq(s, &slot) && !s.initialized())
                {
                    placement.remove(id);
                }
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.placement
            .read()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<A: VirtualActor> ManagedActorType for ActorManager<A> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn has_actor(&self, id: &str) -> bool {
        self.placement
            .read()
            .get(id)
            .is_some_and(|slot| slot.initialized())
    }

    fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .placement
            .read()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    async fn activate(&self, id: &str) -> Result<()> {
        self.get_or_activate(id).await.map(|_| ())
    }

    async fn invoke(
        &self,
        request: InvocationRequest,
        interceptor: Option<Arc<dyn InvocationInterceptor>>,
    ) -> Result<Value> {
        let InvocationRequest {
            actor_id,
            method,
            payload,
            correlation_id,
            reentrancy_id,
            ..
        } = request;
        let (args, context) = envelope::unpack_payload(payload);

        ContextStore::ensure_scope(async move {
            let chain =
                pipeline::restore_inbound(context, correlation_id, reentrancy_id, &self.reentrancy);
            loop {
                let activated = self.get_or_activate(&actor_id).await?;
                let turn = activated
                    .turn
                    .enter(chain.as_deref(), self.reentrancy.max_stack_depth, &actor_id)
                    .await?;
                if activated.status() != ActivationState::Active {
                    drop(turn);
                    debug!(actor_type = %self.type_name, %actor_id, "Deactivated while waiting, reactivating");
                    continue;
                }
                debug!(actor_type = %self.type_name, %actor_id, %method, "Invoke");
                let result = pipeline::dispatch(
                    &activated,
                    &method,
                    MethodArgs::new(&method, args),
                    interceptor,
                )
                .await;
                drop(turn);
                return result;
            }
        })
        .await
    }

    async fn deactivate(&self, id: &str) {
        let slot = self.placement.read().get(id).cloned();
        let Some((slot, activated)) =
            slot.and_then(|slot| slot.get().cloned().map(|activated| (slot, activated)))
        else {
            debug!(actor_type = %self.type_name, actor_id = id, "Deactivate ignored for unknown actor");
            return;
        };

        let _turn = activated.turn.gate.lock().await;
        if !activated.stop().await {
            return;
        }
        {
            let mut placement = self.placement.write();
            if placement.get(id).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                placement.remove(id);
            }
        }
        activated.finish_stop();
        info!(
            actor_type = %self.type_name,
            actor_id = id,
            size = self.len(),
            "Deactivated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn lifecycle_transitions() {
        use ActivationState::*;
        assert!(Inactive.can_transition_to(Activating));
        assert!(Activating.can_transition_to(Active));
        assert!(Active.can_transition_to(Deactivating));
        assert!(Deactivating.can_transition_to(Inactive));
        assert!(!Inactive.can_transition_to(Active));
        assert!(!Active.can_transition_to(Activating));
    }

    #[tokio::test]
    async fn same_chain_reenters_up_to_max_depth() {
        let lock = TurnLock::default();
        let first = lock.enter(Some("c"), 2, "a").await.unwrap();
        let second = lock.enter(Some("c"), 2, "a").await.unwrap();
        let err = lock.enter(Some("c"), 2, "a").await.err().unwrap();
        assert!(matches!(
            err,
            ActorError::ReentrancyDepthExceeded { depth: 3, max: 2, .. }
        ));
        drop(second);
        drop(first);
        assert!(lock.holder.lock().is_none());
    }

    #[tokio::test]
    async fn other_chains_wait_for_the_turn() {
        let lock = Arc::new(TurnLock::default());
        let guard = lock.enter(Some("c1"), 4, "a").await.unwrap();

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _guard = lock.enter(Some("c2"), 4, "a").await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
