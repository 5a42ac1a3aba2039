//! # rewardgate-crypto
//!
//! Cryptographic primitives for the rewardgate verification engine.
//!
//! This crate provides:
//! - **SHA-256** digests for device fingerprints and session identifiers
//! - **HMAC-SHA256** tags for request tamper-evidence
//! - OS-backed random bytes for fallback identifiers
//!
//! ## Trust Boundary
//!
//! MAC keys used by a client build are embedded in the client. A tag only
//! shows that a request was not casually edited after signing; it is not a
//! root of trust. Final authority belongs to a server-side re-validator.
//!
//! All tag and digest comparisons are constant-time via `subtle`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod digest;
pub mod error;
pub mod mac;
pub mod random;

#[cfg(test)]
mod proptests;

pub use digest::Digest256;
pub use error::{CryptoError, Result};
pub use mac::{MacKey, MacTag};
pub use random::random_bytes;
