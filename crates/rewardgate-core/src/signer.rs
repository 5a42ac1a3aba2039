//! Request signing.
//!
//! A [`SignedRequest`] binds a task type, timestamp, amount and device
//! fingerprint under an HMAC-SHA256 tag. The tag is computed over a
//! canonical encoding in which every field is length-prefixed, so a value
//! containing the separator cannot shift bytes into a neighbouring field.
//!
//! # Trust Boundary
//!
//! The secret ships inside the client. Signatures detect casual tampering
//! with stored or in-flight requests; they do not prove the request came
//! from an honest client. An authoritative server must re-validate.

use serde::{Deserialize, Serialize};

use rewardgate_crypto::{MacKey, MacTag};
use rewardgate_identity::FingerprintId;

use crate::error::Result;

/// Domain separation tag prepended to every canonical encoding.
const CANONICAL_DOMAIN: &str = "rewardgate.request.v1";

/// Field separator in the canonical encoding.
const SEPARATOR: u8 = b'|';

/// A request tuple with its MAC.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    /// Task type, e.g. `watch_ad`.
    pub task_type: String,
    /// Creation time in Unix milliseconds.
    pub timestamp: i64,
    /// Amount the request claims.
    pub amount: u64,
    /// Fingerprint of the signing device.
    pub device_fingerprint: FingerprintId,
    /// HMAC-SHA256 over the canonical encoding of the fields above.
    pub signature: MacTag,
}

/// Produce the canonical byte encoding of a request tuple.
///
/// Fields appear in the fixed order task type, timestamp, amount,
/// fingerprint, each as `<decimal length>:<bytes>` followed by `|`.
pub fn canonical_bytes(
    task_type: &str,
    timestamp: i64,
    amount: u64,
    fingerprint: &FingerprintId,
) -> Vec<u8> {
    let timestamp = timestamp.to_string();
    let amount = amount.to_string();
    let fields: [&str; 5] = [
        CANONICAL_DOMAIN,
        task_type,
        &timestamp,
        &amount,
        fingerprint.as_str(),
    ];

    let mut out = Vec::with_capacity(fields.iter().map(|f| f.len() + 8).sum());
    for field in fields {
        out.extend_from_slice(field.len().to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(field.as_bytes());
        out.push(SEPARATOR);
    }
    out
}

/// Signs and verifies request tuples.
#[derive(Clone, Debug)]
pub struct RequestSigner {
    key: MacKey,
}

impl RequestSigner {
    /// Create a signer from a secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty.
    pub fn new(secret: &[u8]) -> Result<Self> {
        Ok(Self {
            key: MacKey::new(secret)?,
        })
    }

    /// Compute the signature over a request tuple.
    pub fn sign(
        &self,
        task_type: &str,
        timestamp: i64,
        amount: u64,
        fingerprint: &FingerprintId,
    ) -> MacTag {
        self.key
            .compute(&canonical_bytes(task_type, timestamp, amount, fingerprint))
    }

    /// Build a complete signed request.
    pub fn sign_request(
        &self,
        task_type: &str,
        timestamp: i64,
        amount: u64,
        fingerprint: &FingerprintId,
    ) -> SignedRequest {
        SignedRequest {
            task_type: task_type.to_string(),
            timestamp,
            amount,
            device_fingerprint: fingerprint.clone(),
            signature: self.sign(task_type, timestamp, amount, fingerprint),
        }
    }

    /// Recompute the signature over the request fields and compare.
    pub fn verify(&self, request: &SignedRequest) -> bool {
        self.verify_fields(
            &request.task_type,
            request.timestamp,
            request.amount,
            &request.device_fingerprint,
            &request.signature,
        )
    }

    /// Verify a signature over loose fields.
    pub fn verify_fields(
        &self,
        task_type: &str,
        timestamp: i64,
        amount: u64,
        fingerprint: &FingerprintId,
        signature: &MacTag,
    ) -> bool {
        self.key.verify(
            &canonical_bytes(task_type, timestamp, amount, fingerprint),
            signature,
        )
    }
}
