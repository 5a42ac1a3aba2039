//! Sled-backed persistent key-value store.
//!
//! All entries live in a single sled tree. Writes are flushed on every
//! `set` and `multi_remove` so a crash right after an allow decision never
//! loses the counter increment that accompanied it.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::kv::KeyValueStore;
use crate::{Result, StoreError};

/// Tree name for guard state.
const GUARD_TREE: &str = "rewardgate_state";

/// Persistent store backed by sled.
///
/// ## Thread Safety
///
/// `SledStore` is thread-safe. All sled operations are internally synchronized.
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("path", &self.path)
            .field("len", &self.tree.len())
            .finish()
    }
}

impl SledStore {
    /// Open or create a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(GUARD_TREE)?;
        debug!(path = %path.display(), entries = tree.len(), "Opened sled store");
        Ok(Self {
            db,
            tree,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a temporary store that is deleted when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let tree = db.open_tree(GUARD_TREE)?;
        Ok(Self {
            db,
            tree,
            path: None,
        })
    }

    /// Flush pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.tree.insert(key.as_bytes(), value)?;
        self.tree.flush()?;
        Ok(())
    }

    fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for key in keys {
            batch.remove(key.as_bytes());
        }
        self.tree.apply_batch(batch)?;
        self.tree.flush()?;
        Ok(())
    }

    fn get_all_keys(&self) -> Result<Vec<String>> {
        self.tree
            .iter()
            .keys()
            .map(|key| {
                let key = key?;
                String::from_utf8(key.to_vec()).map_err(|e| StoreError::Corruption(e.to_string()))
            })
            .collect()
    }
}
