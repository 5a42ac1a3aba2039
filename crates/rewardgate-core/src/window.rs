//! Sliding time-window history per task type.
//!
//! Bounds same-task bursts independently of the coarser daily quota. The
//! history for a task is a short ordered list of timestamps; entries that
//! have left the window are pruned on every call.

use std::sync::{Arc, Mutex};

use tracing::debug;

use rewardgate_store::KeyValueStore;

use crate::error::{GuardError, Result};
use crate::storage::{self, TASK_HISTORY_PREFIX};
use crate::verdict::{Admission, DenialReason};

/// Per-task sliding window.
pub struct BehaviorWindow {
    store: Arc<dyn KeyValueStore>,
    window_ms: i64,
    max_in_window: u32,
    guard: Mutex<()>,
}

impl std::fmt::Debug for BehaviorWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorWindow")
            .field("window_ms", &self.window_ms)
            .field("max_in_window", &self.max_in_window)
            .finish_non_exhaustive()
    }
}

impl BehaviorWindow {
    /// Create a window of `window_ms` allowing `max_in_window` occurrences.
    pub fn new(store: Arc<dyn KeyValueStore>, window_ms: i64, max_in_window: u32) -> Self {
        Self {
            store,
            window_ms,
            max_in_window,
            guard: Mutex::new(()),
        }
    }

    /// Store key for a task type.
    pub fn task_key(task_type: &str) -> String {
        format!("{}{}", TASK_HISTORY_PREFIX, task_type)
    }

    /// Record an occurrence of `task_type` at `now` if the window has room.
    ///
    /// When the window is already full the occurrence is not appended.
    pub fn record_and_check(&self, task_type: &str, now: i64) -> Result<Admission> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| GuardError::LockPoisoned("behavior window"))?;

        let key = Self::task_key(task_type);
        let mut history = self.pruned(&key, now)?;

        if history.len() >= self.max_in_window as usize {
            debug!(task_type, occupancy = history.len(), "Sliding window saturated");
            return Ok(Admission::Denied(DenialReason::TooManyRequests));
        }

        history.push(now);
        storage::save(self.store.as_ref(), &key, &history)?;
        Ok(Admission::Allowed)
    }

    /// Occurrences of `task_type` still inside the window at `now`.
    pub fn occupancy(&self, task_type: &str, now: i64) -> Result<usize> {
        Ok(self.pruned(&Self::task_key(task_type), now)?.len())
    }

    fn pruned(&self, key: &str, now: i64) -> Result<Vec<i64>> {
        let cutoff = now.saturating_sub(self.window_ms);
        let mut history: Vec<i64> = storage::load(self.store.as_ref(), key)?.unwrap_or_default();
        history.retain(|&t| t > cutoff);
        Ok(history)
    }
}
