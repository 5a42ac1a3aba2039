//! Property-based tests for digest and MAC primitives.

use proptest::prelude::*;

use crate::{Digest256, MacKey, MacTag};

proptest! {
    /// The same input always produces the same digest.
    #[test]
    fn digest_deterministic(data: Vec<u8>) {
        prop_assert_eq!(Digest256::hash(&data), Digest256::hash(&data));
    }

    /// Hex encoding of a digest parses back to the same digest.
    #[test]
    fn digest_hex_parses_back(data: Vec<u8>) {
        let h = Digest256::hash(&data);
        prop_assert_eq!(Digest256::from_hex(&h.to_hex()).unwrap(), h);
    }

    /// A tag verifies against the data it was computed over.
    #[test]
    fn mac_verifies_own_data(
        secret in prop::collection::vec(any::<u8>(), 1..64),
        data: Vec<u8>,
    ) {
        let key = MacKey::new(&secret).unwrap();
        let tag = key.compute(&data);
        prop_assert!(key.verify(&data, &tag));
    }

    /// Flipping any bit of the data breaks verification.
    #[test]
    fn mac_detects_bit_flip(
        data in prop::collection::vec(any::<u8>(), 1..128),
        index: prop::sample::Index,
        bit in 0u8..8,
    ) {
        let key = MacKey::new(b"property-key").unwrap();
        let tag = key.compute(&data);
        let mut tampered = data.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 1 << bit;
        prop_assert!(!key.verify(&tampered, &tag));
    }

    /// Parsing arbitrary strings as tags never panics.
    #[test]
    fn tag_from_hex_never_panics(s in ".{0,80}") {
        let _ = MacTag::from_hex(&s);
    }
}
