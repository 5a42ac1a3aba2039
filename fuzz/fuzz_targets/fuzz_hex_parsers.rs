//! Fuzz target for hex parsing of digests, MAC tags and fingerprints.
//!
//! Parsing arbitrary strings must never panic, and anything accepted must
//! encode back to the same value.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewardgate_crypto::{Digest256, MacTag};
use rewardgate_identity::FingerprintId;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(digest) = Digest256::from_hex(s) {
        assert_eq!(Digest256::from_hex(&digest.to_hex()).unwrap(), digest);
    }

    if let Ok(tag) = MacTag::from_hex(s) {
        assert_eq!(MacTag::from_hex(&tag.to_hex()).unwrap(), tag);
    }

    if let Ok(fp) = FingerprintId::parse(s) {
        assert_eq!(fp.as_str(), s);
    }
});
