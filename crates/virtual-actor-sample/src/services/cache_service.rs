use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// Process-wide cache shared by every actor activated on this node.
#[derive(Debug, Default)]
pub struct CacheService {
    entries: RwLock<HashMap<String, Value>>,
}

impl CacheService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.entries.write().insert(key.to_string(), value);
    }

    /// Adds one to a numeric entry, treating a missing or non-numeric one as zero.
    pub fn increment(&self, key: &str) -> i64 {
        let mut entries = self.entries.write();
        let next = entries.get(key).and_then(Value::as_i64).unwrap_or(0) + 1;
        entries.insert(key.to_string(), Value::from(next));
        trace!(key, value = next, "Cache incremented");
        next
    }

    pub fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn increment_starts_from_zero() {
        let cache = CacheService::new();
        assert_eq!(cache.increment("total"), 1);
        assert_eq!(cache.increment("total"), 2);
        assert_eq!(cache.get("total"), Some(json!(2)));

        cache.delete("total");
        assert_eq!(cache.get("total"), None);
    }
}
