//! # State Store
//!
//! [`StateStore`] is the persistence surface of the actor runtime: per-identity
//! key/value reads plus a transactional batch write. [`MemoryStateStore`] is the
//! in-process implementation used by the loopback host and tests.
//!
//! [`StateManager`] sits between one activated actor and the store. Writes are staged
//! locally and reach the store in a single [`StateStore::save_state`] batch when the
//! actor saves.
use crate::error::{ActorError, Result};
use crate::identity::ActorIdentity;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// One write inside a transactional batch.
#[derive(Debug, Clone, PartialEq)]
pub enum StateOperation {
    Upsert { key: String, value: Value },
    Delete { key: String },
}

impl StateOperation {
    pub fn key(&self) -> &str {
        match self {
            StateOperation::Upsert { key, .. } | StateOperation::Delete { key } => key,
        }
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(None)` means the key is genuinely absent.
    async fn get_state(&self, identity: &ActorIdentity, key: &str) -> Result<Option<Value>>;

    async fn contains_state(&self, identity: &ActorIdentity, key: &str) -> Result<bool>;

    /// Applies every operation atomically.
    async fn save_state(&self, identity: &ActorIdentity, operations: Vec<StateOperation>)
        -> Result<()>;
}

type ActorData = HashMap<String, Vec<u8>>;

/// In-memory store. Values are kept as JSON bytes, the same form a sidecar would hold.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    data: Arc<RwLock<HashMap<String, ActorData>>>,
    commits: Arc<AtomicUsize>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw bytes without validation, for seeding or corrupting test data.
    pub async fn insert_raw(&self, identity: &ActorIdentity, key: &str, bytes: Vec<u8>) {
        let mut data = self.data.write().await;
        data.entry(identity.qualified())
            .or_default()
            .insert(key.to_string(), bytes);
    }

    pub async fn insert(&self, identity: &ActorIdentity, key: &str, value: &Value) -> Result<()> {
        self.insert_raw(identity, key, serde_json::to_vec(value)?)
            .await;
        Ok(())
    }

    /// Number of batches committed so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn keys(&self, identity: &ActorIdentity) -> Vec<String> {
        let data = self.data.read().await;
        let mut keys: Vec<String> = data
            .get(&identity.qualified())
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    #[instrument(skip(self), fields(actor = %identity))]
    async fn get_state(&self, identity: &ActorIdentity, key: &str) -> Result<Option<Value>> {
        let data = self.data.read().await;
        let Some(bytes) = data.get(&identity.qualified()).and_then(|d| d.get(key)) else {
            return Ok(None);
        };
        serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|e| ActorError::State {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn contains_state(&self, identity: &ActorIdentity, key: &str) -> Result<bool> {
        let data = self.data.read().await;
        Ok(data
            .get(&identity.qualified())
            .is_some_and(|d| d.contains_key(key)))
    }

    #[instrument(skip(self, operations), fields(actor = %identity, ops = operations.len()))]
    async fn save_state(
        &self,
        identity: &ActorIdentity,
        operations: Vec<StateOperation>,
    ) -> Result<()> {
        // Encode everything before taking the lock so a bad value aborts the whole batch.
        let mut encoded = Vec::with_capacity(operations.len());
        for op in operations {
            match op {
                StateOperation::Upsert { key, value } => {
                    let bytes = serde_json::to_vec(&value)?;
                    encoded.push((key, Some(bytes)));
                }
                StateOperation::Delete { key } => encoded.push((key, None)),
            }
        }

        let mut data = self.data.write().await;
        let actor_data = data.entry(identity.qualified()).or_default();
        for (key, bytes) in encoded {
            match bytes {
                Some(bytes) => {
                    actor_data.insert(key, bytes);
                }
                None => {
                    actor_data.remove(&key);
                }
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Wraps a [`MemoryStateStore`] and fails reads of chosen keys, so read-through error
/// handling can be exercised against keys that do or do not exist.
#[cfg(test)]
pub(crate) struct FailingReadStore {
    inner: MemoryStateStore,
    failing: Mutex<std::collections::HashSet<String>>,
}

#[cfg(test)]
impl FailingReadStore {
    pub(crate) fn new(inner: MemoryStateStore) -> Self {
        Self {
            inner,
            failing: Mutex::new(Default::default()),
        }
    }

    pub(crate) fn fail_reads(&self, key: &str) {
        self.failing.lock().insert(key.to_string());
    }
}

#[cfg(test)]
#[async_trait]
impl StateStore for FailingReadStore {
    async fn get_state(&self, identity: &ActorIdentity, key: &str) -> Result<Option<Value>> {
        if self.failing.lock().contains(key) {
            return Err(ActorError::Transport(format!("read of {key} failed")));
        }
        self.inner.get_state(identity, key).await
    }

    async fn contains_state(&self, identity: &ActorIdentity, key: &str) -> Result<bool> {
        self.inner.contains_state(identity, key).await
    }

    async fn save_state(
        &self,
        identity: &ActorIdentity,
        operations: Vec<StateOperation>,
    ) -> Result<()> {
        self.inner.save_state(identity, operations).await
    }
}

#[derive(Debug, Clone)]
enum PendingChange {
    Upsert(Value),
    Remove,
}

/// Per-activation view of the store with staged writes.
pub struct StateManager {
    identity: ActorIdentity,
    store: Arc<dyn StateStore>,
    pending: Mutex<BTreeMap<String, PendingChange>>,
}

impl StateManager {
    pub fn new(identity: ActorIdentity, store: Arc<dyn StateStore>) -> Self {
        Self {
            identity,
            store,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub async fn get_state(&self, key: &str) -> Result<Option<Value>> {
        if let Some(change) = self.pending.lock().get(key).cloned() {
            return Ok(match change {
                PendingChange::Upsert(value) => Some(value),
                PendingChange::Remove => None,
            });
        }
        self.store.get_state(&self.identity, key).await
    }

    pub async fn contains_state(&self, key: &str) -> Result<bool> {
        if let Some(change) = self.pending.lock().get(key) {
            return Ok(matches!(change, PendingChange::Upsert(_)));
        }
        self.store.contains_state(&self.identity, key).await
    }

    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        self.pending
            .lock()
            .insert(key.into(), PendingChange::Upsert(value));
    }

    pub fn remove_state(&self, key: impl Into<String>) {
        self.pending.lock().insert(key.into(), PendingChange::Remove);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Commits every staged write as one batch. Nothing is sent when nothing is staged.
    ///
    /// On failure the staged writes are put back so a later save can retry them.
    pub async fn save_state(&self) -> Result<()> {
        let staged = std::mem::take(&mut *self.pending.lock());
        if staged.is_empty() {
            return Ok(());
        }
        let operations: Vec<StateOperation> = staged
            .iter()
            .map(|(key, change)| match change {
                PendingChange::Upsert(value) => StateOperation::Upsert {
                    key: key.clone(),
                    value: value.clone(),
                },
                PendingChange::Remove => StateOperation::Delete { key: key.clone() },
            })
            .collect();
        debug!(actor = %self.identity, ops = operations.len(), "Committing state");

        if let Err(e) = self.store.save_state(&self.identity, operations).await {
            let mut pending = self.pending.lock();
            for (key, change) in staged {
                pending.entry(key).or_insert(change);
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> ActorIdentity {
        ActorIdentity::new("CounterActor", "1")
    }

    #[tokio::test]
    async fn staged_writes_are_visible_before_commit() {
        let store = MemoryStateStore::new();
        let manager = StateManager::new(identity(), Arc::new(store.clone()));

        manager.set_state("a", json!(1));
        assert_eq!(manager.get_state("a").await.unwrap(), Some(json!(1)));
        assert!(manager.contains_state("a").await.unwrap());
        assert_eq!(store.get_state(&identity(), "a").await.unwrap(), None);

        manager.save_state().await.unwrap();
        assert_eq!(store.get_state(&identity(), "a").await.unwrap(), Some(json!(1)));
        assert!(!manager.has_pending());
    }

    #[tokio::test]
    async fn many_writes_commit_as_one_batch() {
        let store = MemoryStateStore::new();
        store.insert(&identity(), "old", &json!("x")).await.unwrap();
        let manager = StateManager::new(identity(), Arc::new(store.clone()));

        manager.set_state("a", json!(1));
        manager.set_state("b", json!({"counter": 2}));
        manager.remove_state("old");
        manager.save_state().await.unwrap();

        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.keys(&identity()).await, vec!["a", "b"]);
        assert!(!manager.contains_state("old").await.unwrap());
    }

    #[tokio::test]
    async fn empty_save_does_not_commit() {
        let store = MemoryStateStore::new();
        let manager = StateManager::new(identity(), Arc::new(store.clone()));
        manager.save_state().await.unwrap();
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn corrupt_bytes_surface_as_state_error() {
        let store = MemoryStateStore::new();
        store.insert_raw(&identity(), "state", b"{not json".to_vec()).await;
        let err = store.get_state(&identity(), "state").await.unwrap_err();
        assert!(matches!(err, ActorError::State { ref key, .. } if key == "state"));
        assert!(store.contains_state(&identity(), "state").await.unwrap());
    }
}
