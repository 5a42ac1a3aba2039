//! Store key layout and JSON value codec.
//!
//! Everything the engine persists lives under [`KEY_PREFIX`]. The prefixes
//! in [`RESET_PREFIXES`] are cleared by a security-data reset; the device
//! fallback id is not among them.

use serde::de::DeserializeOwned;
use serde::Serialize;

use rewardgate_store::KeyValueStore;

use crate::error::{GuardError, Result};

/// Common prefix for all engine keys.
pub const KEY_PREFIX: &str = "@rewardgate/";

/// Daily attempt counters, suffixed with `YYYY-MM-DD`.
pub const DAILY_ATTEMPTS_PREFIX: &str = "@rewardgate/daily_attempts/";

/// Per-task timestamp history, suffixed with the task type.
pub const TASK_HISTORY_PREFIX: &str = "@rewardgate/task_history/";

/// Completion records, suffixed with `YYYY-MM-DD`.
pub const COMPLETION_RECORDS_PREFIX: &str = "@rewardgate/ad_records/";

/// Accumulated ad metrics.
pub const METRICS_KEY: &str = "@rewardgate/ad_metrics";

/// Suspicious activity log.
pub const ACTIVITY_LOG_KEY: &str = "@rewardgate/suspicious_activities";

/// Prefixes and exact keys removed by a security-data reset.
pub const RESET_PREFIXES: &[&str] = &[
    DAILY_ATTEMPTS_PREFIX,
    TASK_HISTORY_PREFIX,
    COMPLETION_RECORDS_PREFIX,
    METRICS_KEY,
    ACTIVITY_LOG_KEY,
];

/// Read and decode a JSON value.
pub(crate) fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key)? {
        None => Ok(None),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| GuardError::Encoding {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Encode and write a JSON value.
pub(crate) fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| GuardError::Encoding {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.set(key, &bytes)?;
    Ok(())
}

/// Whether `key` is cleared by a security-data reset.
pub fn is_reset_key(key: &str) -> bool {
    RESET_PREFIXES.iter().any(|p| key.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewardgate_identity::FALLBACK_ID_KEY;
    use rewardgate_store::MemoryStore;

    #[test]
    fn test_load_missing_is_none() {
        let store = MemoryStore::new();
        let value: Option<u32> = load(&store, METRICS_KEY).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        save(&store, "@rewardgate/x", &vec![1i64, 2, 3]).unwrap();
        let value: Option<Vec<i64>> = load(&store, "@rewardgate/x").unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_corrupt_value_is_encoding_error() {
        let store = MemoryStore::new();
        store.set(METRICS_KEY, b"{not json").unwrap();
        let result: Result<Option<u32>> = load(&store, METRICS_KEY);
        assert!(matches!(result, Err(GuardError::Encoding { .. })));
    }

    #[test]
    fn test_reset_keys() {
        assert!(is_reset_key("@rewardgate/daily_attempts/2024-01-01"));
        assert!(is_reset_key("@rewardgate/task_history/watch_ad"));
        assert!(is_reset_key(METRICS_KEY));
        assert!(is_reset_key(ACTIVITY_LOG_KEY));
        assert!(!is_reset_key(FALLBACK_ID_KEY));
        assert!(!is_reset_key("unrelated"));
    }
}
