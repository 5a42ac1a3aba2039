//! Bounded append-only log of suspicious events.
//!
//! Appending never fails the caller: storage errors are reported through
//! `tracing` and otherwise dropped. Verification failures, by contrast, are
//! always returned to the caller as verdicts.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use rewardgate_identity::FingerprintId;
use rewardgate_store::KeyValueStore;

use crate::error::{GuardError, Result};
use crate::storage::{self, ACTIVITY_LOG_KEY};

/// One suspicious event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousActivityRecord {
    /// When the event happened, in Unix milliseconds.
    pub timestamp: i64,
    /// Device that triggered it.
    pub device_fingerprint: FingerprintId,
    /// Short event kind, e.g. `insufficient_view_time`.
    pub activity_type: String,
    /// Structured context.
    pub details: Value,
}

/// Capacity-bounded activity log; the oldest entries are evicted first.
pub struct ActivityLog {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
    guard: Mutex<()>,
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl ActivityLog {
    /// Create a log keeping at most `capacity` entries.
    pub fn new(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            guard: Mutex::new(()),
        }
    }

    /// Append a record. Failures are logged and swallowed.
    pub fn append(&self, record: SuspiciousActivityRecord) {
        warn!(
            target: "rewardgate::suspicious",
            activity = %record.activity_type,
            device = %record.device_fingerprint,
            details = %record.details,
            "Suspicious activity"
        );
        if let Err(e) = self.try_append(record) {
            warn!(error = %e, "Failed to persist suspicious activity record");
        }
    }

    fn try_append(&self, record: SuspiciousActivityRecord) -> Result<()> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| GuardError::LockPoisoned("activity log"))?;
        let mut entries = self.entries()?;
        entries.push(record);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }
        storage::save(self.store.as_ref(), ACTIVITY_LOG_KEY, &entries)
    }

    /// All retained records, oldest first.
    pub fn entries(&self) -> Result<Vec<SuspiciousActivityRecord>> {
        Ok(storage::load(self.store.as_ref(), ACTIVITY_LOG_KEY)?.unwrap_or_default())
    }
}
