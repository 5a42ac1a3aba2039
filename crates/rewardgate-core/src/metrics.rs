//! Accumulated ad metrics.
//!
//! The mean view time is maintained incrementally because individual
//! samples are not retained:
//!
//! `new_mean = (old_mean * (n - 1) + sample) / n`
//!
//! where `n` counts credited completions, the only events that produce a
//! view-time sample.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use rewardgate_store::KeyValueStore;

use crate::error::{GuardError, Result};
use crate::storage::{self, METRICS_KEY};

/// Counters and running statistics over all sessions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdMetrics {
    /// Sessions that reached completion verification.
    pub total_shown: u64,
    /// Sessions that were credited.
    pub total_rewarded: u64,
    /// Running mean of credited view times, in milliseconds.
    pub average_view_time_ms: f64,
    /// Entries written to the suspicious activity log.
    pub suspicious_attempts: u64,
    /// Time of the last credited completion.
    pub last_ad_time_ms: Option<i64>,
}

impl AdMetrics {
    /// Account for a credited completion.
    pub fn record_completion(&mut self, view_time_ms: i64, now: i64) {
        self.total_shown += 1;
        self.total_rewarded += 1;
        let n = self.total_rewarded as f64;
        self.average_view_time_ms =
            (self.average_view_time_ms * (n - 1.0) + view_time_ms as f64) / n;
        self.last_ad_time_ms = Some(now);
    }

    /// Account for a completion that was rejected.
    pub fn record_rejection(&mut self) {
        self.total_shown += 1;
    }

    /// Rewarded over shown, or zero when nothing was shown.
    pub fn success_rate(&self) -> f64 {
        if self.total_shown == 0 {
            0.0
        } else {
            self.total_rewarded as f64 / self.total_shown as f64
        }
    }
}

/// Store-backed holder for [`AdMetrics`].
pub struct MetricsLedger {
    store: Arc<dyn KeyValueStore>,
    guard: Mutex<()>,
}

impl std::fmt::Debug for MetricsLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsLedger").finish_non_exhaustive()
    }
}

impl MetricsLedger {
    /// Create a ledger over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    /// Read the current metrics.
    pub fn load(&self) -> Result<AdMetrics> {
        Ok(storage::load(self.store.as_ref(), METRICS_KEY)?.unwrap_or_default())
    }

    /// Apply `f` to the stored metrics and persist the result.
    pub fn update(&self, f: impl FnOnce(&mut AdMetrics)) -> Result<AdMetrics> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| GuardError::LockPoisoned("metrics ledger"))?;
        let mut metrics = self.load()?;
        f(&mut metrics);
        storage::save(self.store.as_ref(), METRICS_KEY, &metrics)?;
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewardgate_store::MemoryStore;

    #[test]
    fn test_running_mean_constant_samples() {
        let mut m = AdMetrics::default();
        for t in [20_000, 20_000, 20_000] {
            m.record_completion(t, 0);
        }
        assert!((m.average_view_time_ms - 20_000.0).abs() < 1e-9);
        assert_eq!(m.total_shown, 3);
        assert_eq!(m.total_rewarded, 3);
    }

    #[test]
    fn test_running_mean_matches_arithmetic_mean() {
        let samples = [16_000i64, 25_000, 31_500, 18_250];
        let mut m = AdMetrics::default();
        for (i, t) in samples.iter().enumerate() {
            m.record_completion(*t, i as i64);
        }
        let expected = samples.iter().sum::<i64>() as f64 / samples.len() as f64;
        assert!((m.average_view_time_ms - expected).abs() < 1e-6);
        assert_eq!(m.last_ad_time_ms, Some(3));
    }

    #[test]
    fn test_rejection_lowers_success_rate_not_mean() {
        let mut m = AdMetrics::default();
        m.record_completion(20_000, 0);
        m.record_rejection();
        assert_eq!(m.total_shown, 2);
        assert!((m.success_rate() - 0.5).abs() < 1e-9);
        assert!((m.average_view_time_ms - 20_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_empty() {
        assert_eq!(AdMetrics::default().success_rate(), 0.0);
    }

    #[test]
    fn test_ledger_persists_updates() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = MetricsLedger::new(store.clone());
        ledger.update(|m| m.record_completion(15_000, 99)).unwrap();
        ledger.update(|m| m.suspicious_attempts += 1).unwrap();

        let reopened = MetricsLedger::new(store);
        let m = reopened.load().unwrap();
        assert_eq!(m.total_rewarded, 1);
        assert_eq!(m.suspicious_attempts, 1);
        assert_eq!(m.last_ad_time_ms, Some(99));
    }
}
