//! Fuzz target for signed-request decoding and verification.
//!
//! Arbitrary bytes are decoded as a JSON `SignedRequest` and verified.
//! Neither step may panic, and a forged request must not verify.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewardgate_core::{RequestSigner, SignedRequest};

fuzz_target!(|data: &[u8]| {
    let Ok(request) = serde_json::from_slice::<SignedRequest>(data) else {
        return;
    };

    let signer = RequestSigner::new(b"fuzz-secret").unwrap();
    let resigned = signer.sign_request(
        &request.task_type,
        request.timestamp,
        request.amount,
        &request.device_fingerprint,
    );
    assert!(signer.verify(&resigned));

    if request.signature != resigned.signature {
        assert!(!signer.verify(&request));
    }
});
