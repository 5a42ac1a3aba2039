//! Per-calendar-day attempt counters.
//!
//! Each day has its own counter key. There is no midnight reset job: the
//! first call on a new day reads a fresh key and starts from zero. Old day
//! keys are left in place until a security-data reset.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::debug;

use rewardgate_store::KeyValueStore;

use crate::error::{GuardError, Result};
use crate::storage::{self, DAILY_ATTEMPTS_PREFIX};
use crate::verdict::{Admission, DenialReason};

/// Daily reservation ledger.
pub struct QuotaLedger {
    store: Arc<dyn KeyValueStore>,
    max_daily: u32,
    /// Serializes the read-increment-write sequence.
    guard: Mutex<()>,
}

impl std::fmt::Debug for QuotaLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaLedger")
            .field("max_daily", &self.max_daily)
            .finish_non_exhaustive()
    }
}

impl QuotaLedger {
    /// Create a ledger allowing `max_daily` reservations per day.
    pub fn new(store: Arc<dyn KeyValueStore>, max_daily: u32) -> Self {
        Self {
            store,
            max_daily,
            guard: Mutex::new(()),
        }
    }

    /// Store key for a calendar day.
    pub fn day_key(day: NaiveDate) -> String {
        format!("{}{}", DAILY_ATTEMPTS_PREFIX, day.format("%Y-%m-%d"))
    }

    /// Reserve one attempt on `day` if the quota allows it.
    ///
    /// A denial leaves the counter untouched, so repeated calls past the
    /// limit are idempotent.
    pub fn check_and_reserve(&self, day: NaiveDate) -> Result<Admission> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| GuardError::LockPoisoned("quota ledger"))?;

        let key = Self::day_key(day);
        let count: u32 = storage::load(self.store.as_ref(), &key)?.unwrap_or(0);
        if count >= self.max_daily {
            debug!(%day, count, max = self.max_daily, "Daily quota exhausted");
            return Ok(Admission::Denied(DenialReason::DailyLimitExceeded));
        }

        storage::save(self.store.as_ref(), &key, &(count + 1))?;
        Ok(Admission::Allowed)
    }

    /// Reservations made on `day`.
    pub fn count(&self, day: NaiveDate) -> Result<u32> {
        Ok(storage::load(self.store.as_ref(), &Self::day_key(day))?.unwrap_or(0))
    }

    /// Reservations still available on `day`.
    pub fn remaining(&self, day: NaiveDate) -> Result<u32> {
        Ok(self.max_daily.saturating_sub(self.count(day)?))
    }

    /// Configured daily limit.
    pub fn max_daily(&self) -> u32 {
        self.max_daily
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewardgate_store::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn ledger(max: u32) -> QuotaLedger {
        QuotaLedger::new(Arc::new(MemoryStore::new()), max)
    }

    #[test]
    fn test_reserves_until_limit() {
        let ledger = ledger(3);
        for _ in 0..3 {
            assert!(ledger.check_and_reserve(day(1)).unwrap().is_allowed());
        }
        assert_eq!(
            ledger.check_and_reserve(day(1)).unwrap(),
            Admission::Denied(DenialReason::DailyLimitExceeded)
        );
        assert_eq!(ledger.count(day(1)).unwrap(), 3);
        assert_eq!(ledger.remaining(day(1)).unwrap(), 0);
    }

    #[test]
    fn test_denial_does_not_mutate() {
        let ledger = ledger(1);
        ledger.check_and_reserve(day(1)).unwrap();
        for _ in 0..5 {
            assert!(!ledger.check_and_reserve(day(1)).unwrap().is_allowed());
        }
        assert_eq!(ledger.count(day(1)).unwrap(), 1);
    }

    #[test]
    fn test_new_day_rolls_over() {
        let ledger = ledger(1);
        assert!(ledger.check_and_reserve(day(1)).unwrap().is_allowed());
        assert!(!ledger.check_and_reserve(day(1)).unwrap().is_allowed());
        assert!(ledger.check_and_reserve(day(2)).unwrap().is_allowed());
        assert_eq!(ledger.remaining(day(3)).unwrap(), 1);
    }

    #[test]
    fn test_day_key_format() {
        assert_eq!(
            QuotaLedger::day_key(day(7)),
            "@rewardgate/daily_attempts/2024-05-07"
        );
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_limit() {
        let ledger = Arc::new(ledger(10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    (0..5)
                        .filter(|_| ledger.check_and_reserve(day(1)).unwrap().is_allowed())
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 10);
        assert_eq!(ledger.count(day(1)).unwrap(), 10);
    }
}
