//! Device fingerprint derivation and persistence.
//!
//! The fingerprint is SHA-256 over the length-prefixed descriptors followed
//! by a static salt, hex encoded. It is computed once per [`DeviceIdentity`]
//! and cached for the process lifetime.
//!
//! # Fallback
//!
//! When the descriptor source yields nothing, a random 128-bit identifier is
//! generated on first use and persisted under [`FALLBACK_ID_KEY`]. Later
//! processes read it back and derive the same fingerprint. This has lower
//! uniqueness guarantees than hardware descriptors: clearing app storage
//! produces a new identity.
//!
//! If the store cannot be written, the fallback stays in memory only and is
//! valid until the process exits. That degradation is logged, never fatal.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rewardgate_crypto::{random_bytes, Digest256};
use rewardgate_store::KeyValueStore;

use crate::descriptors::DescriptorSource;
use crate::error::{IdentityError, Result};

/// Store key for the persisted fallback identifier.
///
/// Deliberately outside the prefixes cleared by a security-data reset.
pub const FALLBACK_ID_KEY: &str = "@rewardgate/device/fallback_id";

/// Default static salt mixed into every fingerprint.
pub const DEFAULT_SALT: &str = "rewardgate.device.v1";

/// Length of a fingerprint in hex characters.
const FINGERPRINT_HEX_LEN: usize = Digest256::SIZE * 2;

/// Hex-encoded device fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FingerprintId(String);

impl FingerprintId {
    /// Parse a fingerprint from its hex form.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidFingerprint` unless the input is 64
    /// lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != FINGERPRINT_HEX_LEN {
            return Err(IdentityError::InvalidFingerprint {
                reason: format!("expected {} hex chars, got {}", FINGERPRINT_HEX_LEN, s.len()),
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(IdentityError::InvalidFingerprint {
                reason: "not lowercase hex".into(),
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Borrow the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_digest(digest: &Digest256) -> Self {
        Self(digest.to_hex())
    }
}

impl TryFrom<String> for FingerprintId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<FingerprintId> for String {
    fn from(value: FingerprintId) -> Self {
        value.0
    }
}

impl std::fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a fingerprint was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FingerprintOrigin {
    /// Derived from device descriptors.
    Descriptors,
    /// Derived from a fallback id read from or written to the store.
    PersistedFallback,
    /// Derived from a fallback id that could not be persisted.
    EphemeralFallback,
}

/// Derives and caches the device fingerprint.
pub struct DeviceIdentity {
    store: Arc<dyn KeyValueStore>,
    source: Box<dyn DescriptorSource>,
    salt: String,
    cached: OnceLock<(FingerprintId, FingerprintOrigin)>,
}

impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("cached", &self.cached.get())
            .finish_non_exhaustive()
    }
}

impl DeviceIdentity {
    /// Create an identity with the default salt.
    pub fn new(store: Arc<dyn KeyValueStore>, source: Box<dyn DescriptorSource>) -> Self {
        Self::with_salt(store, source, DEFAULT_SALT)
    }

    /// Create an identity with a custom salt.
    pub fn with_salt(
        store: Arc<dyn KeyValueStore>,
        source: Box<dyn DescriptorSource>,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            source,
            salt: salt.into(),
            cached: OnceLock::new(),
        }
    }

    /// Return the device fingerprint, deriving it on first call.
    ///
    /// Never fails. Repeated calls on the same instance return the same value.
    pub fn fingerprint(&self) -> FingerprintId {
        self.resolve().0.clone()
    }

    /// Return how the cached fingerprint was obtained.
    pub fn origin(&self) -> FingerprintOrigin {
        self.resolve().1
    }

    fn resolve(&self) -> &(FingerprintId, FingerprintOrigin) {
        self.cached.get_or_init(|| self.derive())
    }

    fn derive(&self) -> (FingerprintId, FingerprintOrigin) {
        let descriptors = self.source.descriptors();
        if !descriptors.is_empty() {
            let digest = self.digest(descriptors.iter().map(String::as_str));
            debug!(count = descriptors.len(), "Derived fingerprint from descriptors");
            return (FingerprintId::from_digest(&digest), FingerprintOrigin::Descriptors);
        }

        let (fallback, origin) = self.fallback_id();
        let digest = self.digest(std::iter::once(fallback.as_str()));
        (FingerprintId::from_digest(&digest), origin)
    }

    fn digest<'a>(&self, parts: impl Iterator<Item = &'a str>) -> Digest256 {
        let mut inputs: Vec<&[u8]> = parts.map(str::as_bytes).collect();
        inputs.push(self.salt.as_bytes());
        Digest256::hash_many(&inputs)
    }

    fn fallback_id(&self) -> (String, FingerprintOrigin) {
        match self.store.get(FALLBACK_ID_KEY) {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(id) if !id.is_empty() => return (id, FingerprintOrigin::PersistedFallback),
                _ => warn!("Stored fallback id is corrupt, generating a new one"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read fallback id"),
        }

        let id = format!("fallback_{}", hex::encode(random_bytes::<16>()));
        match self.store.set(FALLBACK_ID_KEY, id.as_bytes()) {
            Ok(()) => {
                debug!("Persisted new fallback device id");
                (id, FingerprintOrigin::PersistedFallback)
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist fallback id, using in-memory value");
                (id, FingerprintOrigin::EphemeralFallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::StaticDescriptors;
    use rewardgate_store::{MemoryStore, SledStore, StoreError};
    use tempfile::TempDir;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> rewardgate_store::Result<Option<Vec<u8>>> {
            Err(StoreError::Database("offline".into()))
        }
        fn set(&self, _key: &str, _value: &[u8]) -> rewardgate_store::Result<()> {
            Err(StoreError::Database("offline".into()))
        }
        fn multi_remove(&self, _keys: &[String]) -> rewardgate_store::Result<()> {
            Err(StoreError::Database("offline".into()))
        }
        fn get_all_keys(&self) -> rewardgate_store::Result<Vec<String>> {
            Err(StoreError::Database("offline".into()))
        }
    }

    fn descriptors(values: &[&str]) -> Box<dyn DescriptorSource> {
        Box::new(StaticDescriptors(
            values.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn test_fingerprint_is_idempotent() {
        let identity = DeviceIdentity::new(Arc::new(MemoryStore::new()), descriptors(&["a", "b"]));
        let first = identity.fingerprint();
        assert_eq!(identity.fingerprint(), first);
        assert_eq!(identity.origin(), FingerprintOrigin::Descriptors);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn test_descriptors_determine_fingerprint() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let a = DeviceIdentity::new(store.clone(), descriptors(&["pixel", "14"]));
        let b = DeviceIdentity::new(store.clone(), descriptors(&["pixel", "14"]));
        let c = DeviceIdentity::new(store, descriptors(&["pixel", "15"]));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_delimiter_in_descriptor_does_not_collide() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let a = DeviceIdentity::new(store.clone(), descriptors(&["a-b", "c"]));
        let b = DeviceIdentity::new(store, descriptors(&["a", "b-c"]));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_salt_changes_fingerprint() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let a = DeviceIdentity::with_salt(store.clone(), descriptors(&["x"]), "salt-a");
        let b = DeviceIdentity::with_salt(store, descriptors(&["x"]), "salt-b");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fallback_is_persisted() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = DeviceIdentity::new(store.clone(), descriptors(&[]));
        let fp = first.fingerprint();
        assert_eq!(first.origin(), FingerprintOrigin::PersistedFallback);
        assert!(store.get(FALLBACK_ID_KEY).unwrap().is_some());

        let second = DeviceIdentity::new(store, descriptors(&[]));
        assert_eq!(second.fingerprint(), fp);
    }

    #[test]
    fn test_fallback_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let fp = {
            let store: Arc<dyn KeyValueStore> = Arc::new(SledStore::open(dir.path()).unwrap());
            DeviceIdentity::new(store, descriptors(&[])).fingerprint()
        };
        let store: Arc<dyn KeyValueStore> = Arc::new(SledStore::open(dir.path()).unwrap());
        assert_eq!(DeviceIdentity::new(store, descriptors(&[])).fingerprint(), fp);
    }

    #[test]
    fn test_broken_store_degrades_to_ephemeral() {
        let identity = DeviceIdentity::new(Arc::new(BrokenStore), descriptors(&[]));
        let fp = identity.fingerprint();
        assert_eq!(identity.origin(), FingerprintOrigin::EphemeralFallback);
        assert_eq!(identity.fingerprint(), fp);
    }

    #[test]
    fn test_parse_fingerprint() {
        let identity = DeviceIdentity::new(Arc::new(MemoryStore::new()), descriptors(&["a"]));
        let fp = identity.fingerprint();
        assert_eq!(FingerprintId::parse(fp.as_str()).unwrap(), fp);
        assert!(FingerprintId::parse("short").is_err());
        assert!(FingerprintId::parse(&"G".repeat(64)).is_err());
    }

    #[test]
    fn test_fingerprint_serde_validates() {
        let identity = DeviceIdentity::new(Arc::new(MemoryStore::new()), descriptors(&["a"]));
        let fp = identity.fingerprint();
        let json = serde_json::to_string(&fp).unwrap();
        let back: FingerprintId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
        assert!(serde_json::from_str::<FingerprintId>("\"nothex\"").is_err());
    }
}
