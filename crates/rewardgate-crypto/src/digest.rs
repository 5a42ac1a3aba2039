//! SHA-256 digest primitives.
//!
//! Provides a 256-bit digest type with hex encoding and serialization support.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A 256-bit (32-byte) SHA-256 digest.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Digest256([u8; 32]);

impl Digest256 {
    /// Digest size in bytes.
    pub const SIZE: usize = 32;

    /// Create a digest from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(crate::CryptoError::InvalidLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Get the digest as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest a single input.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Digest multiple inputs.
    ///
    /// Each input is length-prefixed so that `["ab", "c"]` and `["a", "bc"]`
    /// never collide.
    pub fn hash_many(inputs: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for input in inputs {
            hasher.update((input.len() as u64).to_le_bytes());
            hasher.update(input);
        }
        Self(hasher.finalize().into())
    }

    /// Format as lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has the wrong length or is not hex.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != Self::SIZE * 2 {
            return Err(crate::CryptoError::InvalidLength {
                expected: Self::SIZE * 2,
                actual: s.len(),
            });
        }
        let bytes =
            hex::decode(s).map_err(|e| crate::CryptoError::InvalidHexFormat(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl ConstantTimeEq for Digest256 {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for Digest256 {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for Digest256 {}

impl std::fmt::Debug for Digest256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest256({})", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for Digest256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Digest256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let h1 = Digest256::hash(b"hello world");
        let h2 = Digest256::hash(b"hello world");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_known_vector() {
        // SHA-256("abc")
        let h = Digest256::hash(b"abc");
        assert_eq!(
            h.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_many_is_length_prefixed() {
        let h1 = Digest256::hash_many(&[b"hello", b"world"]);
        let h2 = Digest256::hash_many(&[b"helloworld"]);
        assert_ne!(h1, h2);

        let h3 = Digest256::hash_many(&[b"ab", b"c"]);
        let h4 = Digest256::hash_many(&[b"a", b"bc"]);
        assert_ne!(h3, h4);
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = Digest256::hash(b"test");
        let parsed = Digest256::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(Digest256::from_hex("zz").is_err());
        let bad = "g".repeat(64);
        assert!(matches!(
            Digest256::from_hex(&bad),
            Err(crate::CryptoError::InvalidHexFormat(_))
        ));
    }

    #[test]
    fn test_from_bytes_invalid_length() {
        assert!(Digest256::from_bytes(&[0u8; 16]).is_err());
    }
}
