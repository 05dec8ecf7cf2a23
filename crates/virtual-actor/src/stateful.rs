//! # Stateful Actor Base
//!
//! Declared state properties and the per-call [`ActorContext`] that exposes the
//! state contract (`get_state`, `set_state`, `save_state`, `clear_state`) to actor code.
//!
//! A property is declared once per actor type in [`VirtualActor::state_properties`]:
//!
//! ```rust,ignore
//! fn state_properties() -> Vec<StateProperty<Self>> {
//!     vec![StateProperty::serializable("state", |a: &Self| &a.state)
//!         .default_with(CounterState::default)
//!         .into()]
//! }
//! ```
//!
//! On activation each property is loaded in this order of preference:
//!
//! 1. the persisted value, decoded through the property's codec;
//! 2. the default factory;
//! 3. the static default value;
//! 4. an empty instance of the type, if one can be built;
//! 5. nothing (the field stays unset).
use crate::context::ContextStore;
use crate::entity::VirtualActor;
use crate::error::{ActorError, Result};
use crate::identity::ActorIdentity;
use crate::state::StateManager;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persisted name used by the whole-state helpers.
pub const STATE_OBJECT_KEY: &str = "state";

/// Interior-mutable holder for one declared property. Unset until loaded.
#[derive(Debug)]
pub struct StateField<T> {
    value: RwLock<Option<T>>,
}

impl<T> Default for StateField<T> {
    fn default() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }
}

impl<T> StateField<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.value.read().is_some()
    }

    pub fn set(&self, value: T) {
        *self.value.write() = Some(value);
    }

    pub fn replace(&self, value: Option<T>) -> Option<T> {
        std::mem::replace(&mut *self.value.write(), value)
    }

    pub fn take(&self) -> Option<T> {
        self.value.write().take()
    }

    /// Mutates the value in place. Returns `None` when the field is unset.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.value.write().as_mut().map(f)
    }

    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.value.read().as_ref())
    }
}

impl<T: Clone> StateField<T> {
    pub fn get(&self) -> Option<T> {
        self.value.read().clone()
    }
}

/// Custom raw encoding for a state type.
///
/// Types implementing this are "serializable" properties: on load a default instance
/// is built and the raw value applied to it; on save `to_raw` produces what is stored.
pub trait SerializableState: Default + Send + Sync + 'static {
    fn from_raw(&mut self, raw: &Value) -> Result<()>;
    fn to_raw(&self) -> Result<Value>;
}

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

struct Codec<T> {
    decode: fn(&Value) -> Result<T>,
    encode: fn(&T) -> Result<Value>,
    empty: fn() -> Option<T>,
}

fn decode_serializable<T: SerializableState>(raw: &Value) -> Result<T> {
    let mut instance = T::default();
    instance.from_raw(raw)?;
    Ok(instance)
}

fn encode_serializable<T: SerializableState>(value: &T) -> Result<Value> {
    value.to_raw()
}

fn empty_serializable<T: SerializableState>() -> Option<T> {
    Some(T::default())
}

fn empty_plain<T: DeserializeOwned>() -> Option<T> {
    serde_json::from_value(Value::Object(Map::new())).ok()
}

fn encode_plain<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Takes the raw value as-is; when that fails, copies the matching fields onto an
/// empty instance instead.
fn decode_plain<T: Serialize + DeserializeOwned>(raw: &Value) -> Result<T> {
    let direct = match serde_json::from_value::<T>(raw.clone()) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    let Some(base) = empty_plain::<T>().map(|e| serde_json::to_value(&e)) else {
        return Err(direct.into());
    };
    match (base?, raw) {
        (Value::Object(mut base), Value::Object(raw)) => {
            for (key, slot) in base.iter_mut() {
                if let Some(value) = raw.get(key) {
                    *slot = value.clone();
                }
            }
            serde_json::from_value(Value::Object(base)).map_err(|_| direct.into())
        }
        _ => Err(direct.into()),
    }
}

trait StateBinding<A>: Send + Sync {
    fn load(&self, actor: &A, raw: Option<Value>) -> Result<()>;
    fn dump(&self, actor: &A) -> Result<Option<Value>>;
}

struct FieldBinding<A, T> {
    field: fn(&A) -> &StateField<T>,
    factory: Option<Factory<T>>,
    static_default: Option<Factory<T>>,
    codec: Codec<T>,
}

impl<A, T: Send + Sync + 'static> StateBinding<A> for FieldBinding<A, T> {
    fn load(&self, actor: &A, raw: Option<Value>) -> Result<()> {
        let value = match raw {
            Some(raw) => Some((self.codec.decode)(&raw)?),
            None => match (&self.factory, &self.static_default) {
                (Some(factory), _) => Some(factory()),
                (None, Some(default)) => Some(default()),
                (None, None) => (self.codec.empty)(),
            },
        };
        (self.field)(actor).replace(value);
        Ok(())
    }

    fn dump(&self, actor: &A) -> Result<Option<Value>> {
        (self.field)(actor).with(|value| value.map(self.codec.encode).transpose())
    }
}

/// Declarative metadata for one persisted field of an actor type.
pub struct StateProperty<A> {
    key: &'static str,
    persisted_name: String,
    type_name: &'static str,
    serializable: bool,
    has_default: bool,
    binding: Box<dyn StateBinding<A>>,
}

impl<A> std::fmt::Debug for StateProperty<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProperty")
            .field("key", &self.key)
            .field("persisted_name", &self.persisted_name)
            .field("type_name", &self.type_name)
            .field("serializable", &self.serializable)
            .field("has_default", &self.has_default)
            .finish()
    }
}

impl<A: 'static> StateProperty<A> {
    /// A property whose type implements [`SerializableState`].
    pub fn serializable<T: SerializableState>(
        key: &'static str,
        field: fn(&A) -> &StateField<T>,
    ) -> StatePropertyBuilder<A, T> {
        StatePropertyBuilder::new(
            key,
            field,
            true,
            Codec {
                decode: decode_serializable::<T>,
                encode: encode_serializable::<T>,
                empty: empty_serializable::<T>,
            },
        )
    }

    /// A property stored through its serde representation.
    pub fn plain<T>(key: &'static str, field: fn(&A) -> &StateField<T>) -> StatePropertyBuilder<A, T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        StatePropertyBuilder::new(
            key,
            field,
            false,
            Codec {
                decode: decode_plain::<T>,
                encode: encode_plain::<T>,
                empty: empty_plain::<T>,
            },
        )
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn persisted_name(&self) -> &str {
        &self.persisted_name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    pub(crate) fn load(&self, actor: &A, raw: Option<Value>) -> Result<()> {
        self.binding.load(actor, raw).map_err(|e| ActorError::State {
            key: self.persisted_name.clone(),
            reason: e.to_string(),
        })
    }

    pub(crate) fn dump(&self, actor: &A) -> Result<Option<Value>> {
        self.binding.dump(actor)
    }
}

pub struct StatePropertyBuilder<A, T> {
    key: &'static str,
    persisted_name: Option<String>,
    field: fn(&A) -> &StateField<T>,
    factory: Option<Factory<T>>,
    static_default: Option<Factory<T>>,
    serializable: bool,
    codec: Codec<T>,
}

impl<A: 'static, T: Send + Sync + 'static> StatePropertyBuilder<A, T> {
    fn new(
        key: &'static str,
        field: fn(&A) -> &StateField<T>,
        serializable: bool,
        codec: Codec<T>,
    ) -> Self {
        Self {
            key,
            persisted_name: None,
            field,
            factory: None,
            static_default: None,
            serializable,
            codec,
        }
    }

    /// Stores the property under `name` instead of its key.
    pub fn persisted_as(mut self, name: impl Into<String>) -> Self {
        self.persisted_name = Some(name.into());
        self
    }

    /// Called once per activation that finds nothing persisted.
    pub fn default_with(mut self, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn default_value(mut self, value: T) -> Self
    where
        T: Clone,
    {
        self.static_default = Some(Arc::new(move || value.clone()));
        self
    }

    pub fn build(self) -> StateProperty<A> {
        let has_default = self.factory.is_some() || self.static_default.is_some();
        StateProperty {
            key: self.key,
            persisted_name: self.persisted_name.unwrap_or_else(|| self.key.to_string()),
            type_name: std::any::type_name::<T>(),
            serializable: self.serializable,
            has_default,
            binding: Box::new(FieldBinding {
                field: self.field,
                factory: self.factory,
                static_default: self.static_default,
                codec: self.codec,
            }),
        }
    }
}

impl<A: 'static, T: Send + Sync + 'static> From<StatePropertyBuilder<A, T>> for StateProperty<A> {
    fn from(builder: StatePropertyBuilder<A, T>) -> Self {
        builder.build()
    }
}

/// Handle passed to every hook and method of one activated actor.
pub struct ActorContext<A> {
    identity: ActorIdentity,
    actor: Arc<A>,
    state: Arc<StateManager>,
    properties: Arc<Vec<StateProperty<A>>>,
}

impl<A: VirtualActor> ActorContext<A> {
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
        }
    }

    /// Identity as the runtime sees it, prefixes included.
    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn actor(&self) -> &Arc<A> {
        &self.actor
    }

    pub fn correlation_id(&self) -> Option<String> {
        ContextStore::get_correlation_id(false)
    }

    pub fn properties(&self) -> &[StateProperty<A>] {
        &self.properties
    }

    /// Raw read with store failures narrowed down.
    ///
    /// A failing read is suppressed only when the store confirms the key does not exist.
    /// Otherwise the original error is returned.
    pub async fn get_state_value(&self, name: &str) -> Result<Option<Value>> {
        match self.state.get_state(name).await {
            Ok(value) => Ok(value),
            Err(e) => match self.state.contains_state(name).await {
                Ok(false) => {
                    debug!(actor = %self.identity, key = name, error = %e, "State read failed for absent key");
                    Ok(None)
                }
                _ => {
                    warn!(actor = %self.identity, key = name, error = %e, "State read failed");
                    Err(e)
                }
            },
        }
    }

    pub async fn get_state<T: DeserializeOwned>(
        &self,
        name: &str,
        default: Option<T>,
    ) -> Result<Option<T>> {
        match self.get_state_value(name).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ActorError::State {
                    key: name.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(default),
        }
    }

    pub async fn get_state_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.get_state(name, None).await?.unwrap_or(default))
    }

    /// Stages a write. Nothing reaches the store until [`save_state`](Self::save_state).
    pub fn set_state<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        self.state.set_state(name, serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove_state(&self, name: &str) {
        self.state.remove_state(name);
    }

    /// Writes every declared property plus any staged writes in one batch.
    pub async fn save_state(&self) -> Result<()> {
        for property in self.properties.iter() {
            match property.dump(&self.actor)? {
                Some(value) => self.state.set_state(property.persisted_name(), value),
                None => debug!(actor = %self.identity, key = property.key(), "Skipping unset property"),
            }
        }
        self.state.save_state().await
    }

    /// Deletes the persisted entries of all currently declared properties.
    pub async fn clear_state(&self) -> Result<()> {
        for property in self.properties.iter() {
            self.state.remove_state(property.persisted_name());
        }
        self.state.save_state().await
    }

    /// Stores `value` as the actor's whole state under [`STATE_OBJECT_KEY`] and commits.
    pub async fn save_state_object<T: Serialize>(&self, value: &T) -> Result<()> {
        self.set_state(STATE_OBJECT_KEY, value)?;
        self.state.save_state().await
    }

    pub async fn get_state_object<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.get_state(STATE_OBJECT_KEY, None).await
    }

    pub(crate) async fn load_state(&self) -> Result<()> {
        for property in self.properties.iter() {
            let raw = self.get_state_value(property.persisted_name()).await?;
            let found = raw.is_some();
            property.load(&self.actor, raw)?;
            debug!(actor = %self.identity, key = property.key(), found, "Loaded state property");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FailingReadStore, MemoryStateStore, StateStore};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    /// Tolerates missing fields but rejects unknown ones.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    struct Settings {
        theme: String,
        size: u32,
    }

    /// Has no empty form: both fields are required.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Owner {
        name: String,
        since: u32,
    }

    #[derive(Default)]
    struct SettingsActor {
        settings: StateField<Settings>,
        owner: StateField<Owner>,
    }

    #[async_trait]
    impl VirtualActor for SettingsActor {
        const TYPE_NAME: &'static str = "SettingsActor";
        type Dependencies = ();

        fn create(_: &ActorIdentity, _: ()) -> Self {
            Self::default()
        }

        fn state_properties() -> Vec<StateProperty<Self>> {
            vec![
                StateProperty::plain("settings", |a: &Self| &a.settings).build(),
                StateProperty::plain("owner", |a: &Self| &a.owner).build(),
            ]
        }

        async fn invoke(
            &self,
            _: &ActorContext<Self>,
            method: &str,
            _: crate::entity::MethodArgs,
        ) -> Result<Value> {
            Err(crate::entity::unknown_method(Self::TYPE_NAME, method))
        }
    }

    fn identity() -> ActorIdentity {
        ActorIdentity::new("SettingsActor", "1")
    }

    fn context(store: Arc<dyn StateStore>) -> ActorContext<SettingsActor> {
        ActorContext::new(
            identity(),
            Arc::new(SettingsActor::default()),
            Arc::new(StateManager::new(identity(), store)),
            Arc::new(SettingsActor::state_properties()),
        )
    }

    #[tokio::test]
    async fn absent_state_falls_back_to_empty_instance_or_unset() {
        let ctx = context(Arc::new(MemoryStateStore::new()));
        ctx.load_state().await.unwrap();

        assert_eq!(ctx.actor().settings.get(), Some(Settings::default()));
        assert!(!ctx.actor().owner.is_set());
    }

    #[tokio::test]
    async fn plain_state_keeps_only_matching_fields() {
        let store = MemoryStateStore::new();
        store
            .insert(&identity(), "settings", &json!({"theme": "dark", "legacy": true}))
            .await
            .unwrap();
        let ctx = context(Arc::new(store));
        ctx.load_state().await.unwrap();

        assert_eq!(
            ctx.actor().settings.get(),
            Some(Settings {
                theme: "dark".into(),
                size: 0,
            })
        );
    }

    #[tokio::test]
    async fn corrupt_persisted_state_fails_the_load() {
        let store = MemoryStateStore::new();
        store
            .insert_raw(&identity(), "settings", b"{not json".to_vec())
            .await;
        let ctx = context(Arc::new(store));

        let err = ctx.load_state().await.unwrap_err();
        assert!(matches!(err, ActorError::State { ref key, .. } if key == "settings"));
    }

    #[tokio::test]
    async fn read_error_on_absent_key_yields_default() {
        let store = FailingReadStore::new(MemoryStateStore::new());
        store.fail_reads("visits");
        let ctx = context(Arc::new(store));

        let visits: Option<i64> = ctx.get_state("visits", Some(5)).await.unwrap();
        assert_eq!(visits, Some(5));
    }

    #[tokio::test]
    async fn read_error_on_existing_key_is_returned() {
        let inner = MemoryStateStore::new();
        inner.insert(&identity(), "visits", &json!(3)).await.unwrap();
        let store = FailingReadStore::new(inner);
        store.fail_reads("visits");
        let ctx = context(Arc::new(store));

        let err = ctx.get_state_value("visits").await.unwrap_err();
        assert!(matches!(err, ActorError::Transport(_)));
    }

    #[tokio::test]
    async fn clear_state_removes_only_declared_entries() {
        let store = MemoryStateStore::new();
        store
            .insert(&identity(), "settings", &json!({"theme": "light"}))
            .await
            .unwrap();
        store
            .insert(&identity(), "owner", &json!({"name": "ada", "since": 1}))
            .await
            .unwrap();
        store.insert(&identity(), "notes", &json!([])).await.unwrap();
        let ctx = context(Arc::new(store.clone()));
        ctx.load_state().await.unwrap();

        ctx.clear_state().await.unwrap();

        assert_eq!(store.keys(&identity()).await, vec!["notes"]);
        assert_eq!(store.commit_count(), 1);
    }
}
