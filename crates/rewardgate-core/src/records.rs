//! Signed records of credited completions, kept per calendar day.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use rewardgate_store::KeyValueStore;

use crate::error::{GuardError, Result};
use crate::signer::SignedRequest;
use crate::storage::{self, COMPLETION_RECORDS_PREFIX};

/// Evidence of one credited completion.
///
/// The embedded request's `amount` is the credited amount, not the value the
/// ad SDK reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Signed request tuple.
    pub request: SignedRequest,
    /// Session the completion belongs to.
    pub session_id: String,
    /// Ad unit reported by the SDK.
    pub ad_unit_id: String,
    /// Measured dwell time in milliseconds.
    pub view_time_ms: i64,
    /// When the record was written, in Unix milliseconds.
    pub recorded_at: i64,
}

/// Per-day bounded journal of completion records.
pub struct CompletionJournal {
    store: Arc<dyn KeyValueStore>,
    per_day: usize,
    guard: Mutex<()>,
}

impl std::fmt::Debug for CompletionJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionJournal")
            .field("per_day", &self.per_day)
            .finish_non_exhaustive()
    }
}

impl CompletionJournal {
    /// Create a journal keeping at most `per_day` records per day.
    pub fn new(store: Arc<dyn KeyValueStore>, per_day: usize) -> Self {
        Self {
            store,
            per_day,
            guard: Mutex::new(()),
        }
    }

    /// Store key for a calendar day.
    pub fn day_key(day: NaiveDate) -> String {
        format!("{}{}", COMPLETION_RECORDS_PREFIX, day.format("%Y-%m-%d"))
    }

    /// Append a record under `day`.
    pub fn append(&self, day: NaiveDate, record: CompletionRecord) -> Result<()> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| GuardError::LockPoisoned("completion journal"))?;
        let key = Self::day_key(day);
        let mut records = self.records(day)?;
        records.push(record);
        if records.len() > self.per_day {
            let excess = records.len() - self.per_day;
            records.drain(..excess);
        }
        storage::save(self.store.as_ref(), &key, &records)
    }

    /// Records for `day`, oldest first.
    pub fn records(&self, day: NaiveDate) -> Result<Vec<CompletionRecord>> {
        Ok(storage::load(self.store.as_ref(), &Self::day_key(day))?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::RequestSigner;
    use rewardgate_crypto::Digest256;
    use rewardgate_identity::FingerprintId;
    use rewardgate_store::MemoryStore;

    fn record(i: i64) -> CompletionRecord {
        let fp = FingerprintId::parse(&Digest256::hash(b"d").to_hex()).unwrap();
        let signer = RequestSigner::new(b"k").unwrap();
        CompletionRecord {
            request: signer.sign_request("watch_ad", i, 1, &fp),
            session_id: format!("s{}", i),
            ad_unit_id: "rewarded_ad".into(),
            view_time_ms: 20_000,
            recorded_at: i,
        }
    }

    #[test]
    fn test_bounded_per_day() {
        let journal = CompletionJournal::new(Arc::new(MemoryStore::new()), 3);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for i in 0..5 {
            journal.append(day, record(i)).unwrap();
        }
        let records = journal.records(day).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].recorded_at, 2);
    }

    #[test]
    fn test_days_are_separate() {
        let journal = CompletionJournal::new(Arc::new(MemoryStore::new()), 3);
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        journal.append(d1, record(1)).unwrap();
        assert!(journal.records(d2).unwrap().is_empty());
    }
}
