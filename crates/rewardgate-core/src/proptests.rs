//! Property-based tests for quota, window, signing and completion bounds.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;

use rewardgate_crypto::Digest256;
use rewardgate_identity::{FingerprintId, StaticDescriptors};
use rewardgate_store::MemoryStore;

use crate::{
    Admission, BehaviorWindow, DenialReason, GuardConfig, ManualClock, QuotaLedger, RequestSigner,
    VerificationFacade,
};

fn fingerprint(seed: u64) -> FingerprintId {
    FingerprintId::parse(&Digest256::hash(&seed.to_le_bytes()).to_hex()).unwrap()
}

/// A facade with one armed and started session at `t = 0`.
fn started_facade() -> (VerificationFacade, ManualClock) {
    let clock = ManualClock::new(0);
    let facade = VerificationFacade::new(
        GuardConfig::production(),
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
        Box::new(StaticDescriptors(vec!["prop-device".into()])),
    )
    .unwrap();
    assert!(facade.preflight("watch_ad").is_valid);
    facade.start().unwrap();
    (facade, clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// At most `max` reservations succeed per day, and denials do not mutate.
    #[test]
    fn quota_never_exceeds_max(max in 1u32..20, calls in 0usize..40) {
        let ledger = QuotaLedger::new(Arc::new(MemoryStore::new()), max);
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let allowed = (0..calls)
            .filter(|_| ledger.check_and_reserve(day).unwrap().is_allowed())
            .count();
        prop_assert_eq!(allowed, calls.min(max as usize));
        prop_assert_eq!(ledger.count(day).unwrap() as usize, calls.min(max as usize));
    }

    /// Within one window span at most five calls pass.
    #[test]
    fn window_bounds_bursts(offsets in prop::collection::vec(0i64..600_000, 6..30)) {
        let mut offsets = offsets;
        offsets.sort_unstable();
        let window = BehaviorWindow::new(Arc::new(MemoryStore::new()), 600_000, 5);
        let start = 1_000_000;
        let allowed = offsets
            .iter()
            .filter(|off| {
                window.record_and_check("watch_ad", start + **off).unwrap() == Admission::Allowed
            })
            .count();
        prop_assert!(allowed <= 5);
    }

    /// A signature verifies for identical fields and fails when any field changes.
    #[test]
    fn sign_verify_detects_tampering(
        task in "[a-z_]{1,16}",
        timestamp in 0i64..4_000_000_000_000,
        amount in 0u64..1_000,
        seed: u64,
        field in 0usize..4,
    ) {
        let signer = RequestSigner::new(b"property-secret").unwrap();
        let request = signer.sign_request(&task, timestamp, amount, &fingerprint(seed));
        prop_assert!(signer.verify(&request));

        let mut tampered = request.clone();
        match field {
            0 => tampered.task_type.push('x'),
            1 => tampered.timestamp += 1,
            2 => tampered.amount += 1,
            _ => tampered.device_fingerprint = fingerprint(seed.wrapping_add(1)),
        }
        prop_assert!(!signer.verify(&tampered));
    }

    /// A dwell time below the minimum is rejected whatever the reward.
    #[test]
    fn short_dwell_always_rejected(view_time in 0i64..15_000, reward in -100i64..200) {
        let (facade, clock) = started_facade();
        clock.advance(view_time);
        let v = facade.verify_completion(reward);
        prop_assert!(!v.is_valid);
        prop_assert_eq!(v.reward, 0);
        prop_assert_eq!(v.reason, Some(DenialReason::InsufficientViewTime));
    }

    /// A reward outside `[1, max]` is rejected.
    #[test]
    fn out_of_bounds_reward_rejected(
        reward in prop_oneof![i64::MIN..=0, 11i64..=i64::MAX],
        view_time in 15_000i64..120_000,
    ) {
        let (facade, clock) = started_facade();
        clock.advance(view_time);
        let v = facade.verify_completion(reward);
        prop_assert!(!v.is_valid);
        prop_assert_eq!(v.reason, Some(DenialReason::InvalidRewardAmount));
    }

    /// An accepted completion credits the constant, never the reported value.
    #[test]
    fn credited_amount_is_constant(reward in 1i64..=10, view_time in 15_000i64..120_000) {
        let (facade, clock) = started_facade();
        clock.advance(view_time);
        let v = facade.verify_completion(reward);
        prop_assert!(v.is_valid);
        prop_assert_eq!(v.reward, 1);
        prop_assert_eq!(v.receipt.map(|r| r.request.amount), Some(1));
    }
}
