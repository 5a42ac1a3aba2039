//! Error types for the verification engine.
//!
//! Policy denials are not errors; they are [`crate::Verdict`] values.
//! [`GuardError`] covers infrastructure failures only, and every crediting
//! path converts it into a denial before it reaches the caller.

use thiserror::Error;

use crate::config::ConfigError;

/// Infrastructure errors raised inside the verification engine.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cryptographic error.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] rewardgate_crypto::CryptoError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Store(#[from] rewardgate_store::StoreError),

    /// Identity error.
    #[error("Identity error: {0}")]
    Identity(#[from] rewardgate_identity::IdentityError),

    /// A stored value could not be decoded or encoded.
    #[error("Encoding error for {key}: {reason}")]
    Encoding {
        /// Store key of the value.
        key: String,
        /// Decoder message.
        reason: String,
    },

    /// An in-process lock was poisoned by a panicking holder.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// `start()` called without an armed session.
    #[error("No armed session to start")]
    NoArmedSession,
}

/// Result type for verification engine operations.
pub type Result<T> = std::result::Result<T, GuardError>;
