//! # rewardgate-identity
//!
//! Pseudonymous device identity for the rewardgate verification engine.
//!
//! Provides:
//! - Host descriptor collection ([`DescriptorSource`])
//! - Salted SHA-256 device fingerprints ([`FingerprintId`])
//! - A durable random fallback when no descriptors are available
//!
//! A fingerprint is a correlation handle, not a credential. It can be reset
//! by reinstalling or spoofed by anyone who controls the descriptors.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod descriptors;
pub mod device;
pub mod error;

pub use descriptors::{DescriptorSource, HostDescriptors, StaticDescriptors};
pub use device::{DeviceIdentity, FingerprintId, FingerprintOrigin, FALLBACK_ID_KEY};
pub use error::{IdentityError, Result};
