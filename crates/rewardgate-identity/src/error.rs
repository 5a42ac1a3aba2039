//! Error types for identity operations.

use thiserror::Error;

/// Errors that can occur during identity operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] rewardgate_crypto::CryptoError),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Store(#[from] rewardgate_store::StoreError),

    /// Malformed fingerprint string.
    #[error("Invalid fingerprint: {reason}")]
    InvalidFingerprint {
        /// Reason for invalidity.
        reason: String,
    },
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
