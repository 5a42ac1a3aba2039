//! Key-value store abstraction.
//!
//! ## Implementations
//!
//! - [`MemoryStore`]: in-memory storage for tests and ephemeral sessions
//! - [`crate::SledStore`]: durable on-disk storage

use std::collections::HashMap;
use std::sync::RwLock;

use crate::{Result, StoreError};

/// Minimal key-value interface required by the verification engine.
///
/// Keys are UTF-8 strings, values are opaque bytes.
///
/// ## Security
///
/// Implementations MUST:
/// - Never panic on missing keys or corrupted data
/// - Make `set` visible to a subsequent `get` from the same process
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove every key in `keys`. Missing keys are ignored.
    fn multi_remove(&self, keys: &[String]) -> Result<()>;

    /// List every key currently stored.
    fn get_all_keys(&self) -> Result<Vec<String>>;
}

/// In-memory store backed by a `HashMap`.
///
/// Does not persist data across restarts.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.len())
            .finish()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn get_all_keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemoryStore::new();
        store.set("k", b"one").unwrap();
        store.set("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_multi_remove_ignores_missing() {
        let store = MemoryStore::new();
        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();
        store
            .multi_remove(&["a".to_string(), "zzz".to_string()])
            .unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_get_all_keys() {
        let store = MemoryStore::new();
        store.set("x", b"1").unwrap();
        store.set("y", b"2").unwrap();
        let mut keys = store.get_all_keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["x".to_string(), "y".to_string()]);
    }
}
