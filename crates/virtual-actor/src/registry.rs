//! # Actor Client Registry
//!
//! Maps actor type names and interface names to proxy factories. Lookups are
//! case-insensitive; the registered spelling is what goes over the wire.
//!
//! Naming rules (id prefix, delimiter and type-name prefix) are set once at startup and
//! applied to every identity the registry resolves afterwards.
use crate::client_trait::ActorInterface;
use crate::config::ReentrancyOptions;
use crate::entity::VirtualActor;
use crate::error::{ActorError, Result};
use crate::identity::NamingRules;
use crate::proxy::{ActorProxy, ProxyLink};
use crate::runtime::ActorRuntime;
use crate::transport::ActorTransport;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds proxies for one concrete actor type.
#[derive(Debug)]
pub struct ProxyFactory {
    actor_type: String,
}

impl ProxyFactory {
    pub fn actor_type(&self) -> &str {
        &self.actor_type
    }
}

pub struct ActorClientRegistry {
    factories: RwLock<HashMap<String, Arc<ProxyFactory>>>,
    interfaces: RwLock<HashMap<String, String>>,
    naming: RwLock<NamingRules>,
    link: Arc<ProxyLink>,
}

impl ActorClientRegistry {
    pub fn new(transport: Arc<dyn ActorTransport>) -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            interfaces: RwLock::new(HashMap::new()),
            naming: RwLock::new(NamingRules::default()),
            link: Arc::new(ProxyLink::new(transport)),
        }
    }

    /// Lets proxies route to actors already active in `runtime`.
    pub fn attach_runtime(&self, runtime: &Arc<ActorRuntime>) {
        self.link.attach_runtime(runtime);
    }

    pub fn register(&self, type_name: &str, concrete_type: &str) {
        let factory = self.factory_for(concrete_type);
        self.factories
            .write()
            .insert(type_name.to_lowercase(), factory);
        info!(type_name, concrete_type, "Registered actor client");
    }

    /// Makes `interface_type` resolve to the same factory as `concrete_type`.
    pub fn register_interface(&self, concrete_type: &str, interface_type: &str) {
        let factory = self.factory_for(concrete_type);
        let key = interface_type.to_lowercase();
        self.factories.write().insert(key.clone(), factory);
        self.interfaces
            .write()
            .insert(key, concrete_type.to_string());
        info!(concrete_type, interface_type, "Registered actor interface");
    }

    pub fn register_actor<A: VirtualActor>(&self) {
        self.register(A::TYPE_NAME, A::TYPE_NAME);
    }

    pub fn register_actor_interface<A: VirtualActor, I: ActorInterface>(&self) {
        self.register_actor::<A>();
        self.register_interface(A::TYPE_NAME, I::INTERFACE_NAME);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(&name.to_lowercase())
    }

    /// Concrete type name behind an interface or type name.
    pub fn get_actor_type_name(&self, name: &str) -> Option<String> {
        let key = name.to_lowercase();
        if let Some(concrete) = self.interfaces.read().get(&key) {
            return Some(concrete.clone());
        }
        self.factories
            .read()
            .get(&key)
            .map(|factory| factory.actor_type.clone())
    }

    pub fn get_actor(&self, type_or_interface: &str, id: &str) -> Result<ActorProxy> {
        if id.is_empty() {
            return Err(ActorError::NotFound(format!(
                "an actor id is required to resolve {type_or_interface}"
            )));
        }
        let factory = self
            .factories
            .read()
            .get(&type_or_interface.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                ActorError::NotFound(format!("no actor registered for {type_or_interface}"))
            })?;

        let identity = self.naming.read().resolve(&factory.actor_type, id);
        debug!(requested = type_or_interface, actor = %identity, "Resolved actor");
        Ok(ActorProxy::new(identity, self.link.clone()))
    }

    /// Same as [`get_actor`](Self::get_actor). Accepts either a type or an interface name.
    pub fn get_actor_by_type_name(&self, type_name: &str, id: &str) -> Result<ActorProxy> {
        self.get_actor(type_name, id)
    }

    pub fn get<I: ActorInterface>(&self, id: &str) -> Result<I> {
        self.get_actor(I::INTERFACE_NAME, id).map(I::from_proxy)
    }

    pub fn set_prefix(&self, prefix: &str, delimiter: Option<&str>) {
        self.naming.write().set_prefix(prefix, delimiter);
    }

    pub fn set_type_name_prefix(&self, prefix: &str) {
        self.naming.write().set_type_name_prefix(prefix);
    }

    pub fn set_allow_internal_calls(&self, allow: bool) {
        self.link.set_allow_internal_calls(allow);
    }

    pub fn set_context_propagation(&self, enabled: bool) {
        self.link.set_propagate_context(enabled);
    }

    pub fn set_reentrancy(&self, options: ReentrancyOptions) {
        self.link.set_reentrancy(options);
    }

    pub fn naming(&self) -> NamingRules {
        self.naming.read().clone()
    }

    /// One factory per concrete type, shared by every name pointing at it.
    fn factory_for(&self, concrete_type: &str) -> Arc<ProxyFactory> {
        let key = concrete_type.to_lowercase();
        let mut factories = self.factories.write();
        factories
            .entry(key)
            .or_insert_with(|| {
                Arc::new(ProxyFactory {
                    actor_type: concrete_type.to_string(),
                })
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn registry() -> ActorClientRegistry {
        let registry = ActorClientRegistry::new(Arc::new(MockTransport::new()));
        registry.register("CounterActor", "CounterActor");
        registry.register_interface("CounterActor", "CounterActorInterface");
        registry
    }

    #[test]
    fn unknown_type_and_empty_id_are_not_found() {
        let registry = registry();
        assert!(registry.get_actor("MissingActor", "1").unwrap_err().is_not_found());
        assert!(registry.get_actor("CounterActor", "").unwrap_err().is_not_found());
    }

    #[test]
    fn lookup_ignores_case_but_keeps_registered_spelling() {
        let registry = registry();
        let proxy = registry.get_actor("counteractor", "1").unwrap();
        assert_eq!(proxy.identity().type_name(), "CounterActor");
        let proxy = registry.get_actor("COUNTERACTORINTERFACE", "1").unwrap();
        assert_eq!(proxy.identity().type_name(), "CounterActor");
        assert!(registry.contains("counterActorInterface"));
    }

    #[test]
    fn interface_maps_back_to_concrete_type() {
        let registry = registry();
        assert_eq!(
            registry.get_actor_type_name("CounterActorInterface").as_deref(),
            Some("CounterActor")
        );
        assert_eq!(
            registry.get_actor_type_name("CounterActor").as_deref(),
            Some("CounterActor")
        );
        assert_eq!(registry.get_actor_type_name("Other"), None);
    }

    #[test]
    fn type_and_interface_share_one_factory() {
        let registry = registry();
        let factories = registry.factories.read();
        let by_type = factories.get("counteractor").unwrap();
        let by_interface = factories.get("counteractorinterface").unwrap();
        assert!(Arc::ptr_eq(by_type, by_interface));
    }

    #[test]
    fn prefixes_apply_to_resolved_identities() {
        let registry = registry();
        registry.set_prefix("tenant-a", None);
        registry.set_type_name_prefix("Staging");

        let proxy = registry.get_actor("CounterActorInterface", "42").unwrap();
        assert_eq!(proxy.identity().type_name(), "StagingCounterActor");
        assert_eq!(proxy.identity().id(), "tenant-a-42");

        registry.set_prefix("tenant-b", Some("/"));
        let proxy = registry.get_actor("CounterActor", "42").unwrap();
        assert_eq!(proxy.identity().id(), "tenant-b/42");
    }
}
