//! HMAC-SHA256 message authentication.
//!
//! [`MacKey`] holds a keyed HMAC state that is cloned per computation, so
//! key setup happens once and computing a tag cannot fail.
//!
//! # Security
//!
//! A key compiled into a client binary is recoverable by anyone holding the
//! binary. Tags produced here are tamper-evidence against casual edits of a
//! request in transit or at rest, nothing more.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{CryptoError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Size of an HMAC-SHA256 tag in bytes.
pub const TAG_SIZE: usize = 32;

/// A keyed HMAC-SHA256 instance.
#[derive(Clone)]
pub struct MacKey {
    prototype: HmacSha256,
}

impl MacKey {
    /// Create a MAC key from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the secret is empty.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(CryptoError::InvalidKey("secret must not be empty".into()));
        }
        let prototype = <HmacSha256 as Mac>::new_from_slice(secret)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { prototype })
    }

    /// Compute the tag over `data`.
    pub fn compute(&self, data: &[u8]) -> MacTag {
        let mut mac = self.prototype.clone();
        mac.update(data);
        MacTag(mac.finalize().into_bytes().into())
    }

    /// Recompute the tag over `data` and compare it with `tag`.
    ///
    /// The comparison is constant-time; there is no early exit that depends
    /// on the secret or on how many leading bytes match.
    pub fn verify(&self, data: &[u8], tag: &MacTag) -> bool {
        let mut mac = self.prototype.clone();
        mac.update(data);
        mac.verify_slice(&tag.0).is_ok()
    }
}

impl std::fmt::Debug for MacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MacKey([REDACTED])")
    }
}

/// An HMAC-SHA256 tag.
///
/// Serialized as a lowercase hex string.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacTag([u8; TAG_SIZE]);

impl MacTag {
    /// Create a tag from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TAG_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: TAG_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; TAG_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Get the tag bytes.
    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }

    /// Format as lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHexFormat(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl TryFrom<String> for MacTag {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<MacTag> for String {
    fn from(value: MacTag) -> Self {
        value.to_hex()
    }
}

impl ConstantTimeEq for MacTag {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for MacTag {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for MacTag {}

impl std::fmt::Debug for MacTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MacTag({})", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for MacTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
