//! The owned virtual-actor runtime: a table of [`ActorManager`]s keyed by effective
//! type name, plus the primitives the sidecar would otherwise provide.
use crate::actor::{ActorManager, ManagedActorType};
use crate::config::ReentrancyOptions;
use crate::dependencies::Dependencies;
use crate::entity::VirtualActor;
use crate::error::{ActorError, Result};
use crate::identity::ActorIdentity;
use crate::pipeline::{self, InvocationInterceptor};
use crate::state::StateStore;
use crate::transport::{InvocationRequest, InvocationResponse};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Prepended to `VirtualActor::TYPE_NAME` when a type is registered.
    pub type_name_prefix: String,
    pub reentrancy: ReentrancyOptions,
}

pub struct ActorRuntime {
    types: RwLock<HashMap<String, Arc<dyn ManagedActorType>>>,
    store: Arc<dyn StateStore>,
    dependencies: Dependencies,
    options: RuntimeOptions,
    interceptor: RwLock<Option<Arc<dyn InvocationInterceptor>>>,
}

impl ActorRuntime {
    pub fn new(store: Arc<dyn StateStore>, dependencies: Dependencies, options: RuntimeOptions) -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            store,
            dependencies,
            options,
            interceptor: RwLock::new(None),
        }
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Registers `A` and returns the type name the runtime knows it by.
    pub fn register<A: VirtualActor>(&self) -> String {
        let type_name = format!("{}{}", self.options.type_name_prefix, A::TYPE_NAME);
        let manager = ActorManager::<A>::new(
            type_name.clone(),
            self.store.clone(),
            self.dependencies.clone(),
            self.options.reentrancy.clone(),
        );
        self.types.write().insert(type_name.clone(), Arc::new(manager));
        info!(actor_type = %type_name, "Registered actor type");
        type_name
    }

    pub fn set_interceptor(&self, interceptor: Arc<dyn InvocationInterceptor>) {
        *self.interceptor.write() = Some(interceptor);
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.types.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn has_actor(&self, type_name: &str, id: &str) -> bool {
        self.manager(type_name)
            .is_some_and(|manager| manager.has_actor(id))
    }

    /// Every active identity, sorted by type then id.
    pub fn active_identities(&self) -> Vec<ActorIdentity> {
        let managers: Vec<Arc<dyn ManagedActorType>> = self.types.read().values().cloned().collect();
        let mut identities: Vec<ActorIdentity> = managers
            .iter()
            .flat_map(|m| {
                m.active_ids()
                    .into_iter()
                    .map(move |id| ActorIdentity::new(m.type_name(), id))
            })
            .collect();
        identities.sort_by(|a, b| (a.type_name(), a.id()).cmp(&(b.type_name(), b.id())));
        identities
    }

    /// Every active identity as `type:id`, for display.
    pub fn active_actors(&self) -> Vec<String> {
        self.active_identities()
            .iter()
            .map(ActorIdentity::qualified)
            .collect()
    }

    pub async fn activate(&self, type_name: &str, id: &str) -> Result<()> {
        self.require(type_name)?.activate(id).await
    }

    pub async fn invoke(&self, request: InvocationRequest) -> Result<Value> {
        let manager = self.require(&request.actor_type)?;
        let interceptor = self.interceptor.read().clone();
        manager.invoke(request, interceptor).await
    }

    /// Deactivating an identity this process never activated is a no-op.
    pub async fn deactivate(&self, type_name: &str, id: &str) {
        match self.manager(type_name) {
            Some(manager) => manager.deactivate(id).await,
            None => debug!(actor_type = type_name, actor_id = id, "Deactivate ignored for unknown type"),
        }
    }

    pub async fn remove_instance(&self, type_name: &str, id: &str) {
        self.deactivate(type_name, id).await
    }

    /// Entry point for requests arriving from the transport, and for in-process calls
    /// routed by a proxy. Failures are logged here, once.
    pub async fn handle_request(&self, request: InvocationRequest) -> InvocationResponse {
        let identity = ActorIdentity::new(request.actor_type.as_str(), request.actor_id.as_str());
        let method = request.method.clone();
        pipeline::into_response(&identity, &method, self.invoke(request).await)
    }

    fn manager(&self, type_name: &str) -> Option<Arc<dyn ManagedActorType>> {
        self.types.read().get(type_name).cloned()
    }

    fn require(&self, type_name: &str) -> Result<Arc<dyn ManagedActorType>> {
        self.manager(type_name)
            .ok_or_else(|| ActorError::NotFound(format!("actor type {type_name} is not registered")))
    }
}
