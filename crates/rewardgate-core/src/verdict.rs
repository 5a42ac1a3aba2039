//! Structured results returned to callers.
//!
//! Every check returns data rather than raising: a denied request is a
//! [`Verdict`] with `is_valid == false`, a zero reward, and a
//! [`DenialReason`] whose token is stable and locale-agnostic.

use serde::{Deserialize, Serialize};

use crate::records::CompletionRecord;

/// Why a request or completion was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Daily quota exhausted.
    DailyLimitExceeded,
    /// Not enough time since the last credited completion.
    TooSoon,
    /// Interval matches a fixed-delay automation signature.
    SuspiciousTiming,
    /// Reward ratio is implausibly high.
    AbnormalSuccessRate,
    /// Mean dwell time is implausibly constant.
    ConsistentViewTime,
    /// Same task repeated too often inside the sliding window.
    TooManyRequests,
    /// Circuit breaker tripped by consecutive rejected completions.
    ExcessiveFailures,
    /// Completion arrived before the minimum dwell time.
    InsufficientViewTime,
    /// Reported reward outside the plausible range.
    InvalidRewardAmount,
    /// Completion without an armed and started session.
    NoActiveSession,
    /// Request MAC does not match its fields.
    InvalidSignature,
    /// Request timestamp older than the freshness window.
    StaleTimestamp,
    /// Request timestamp too far in the future.
    FutureTimestamp,
    /// The authoritative server refused the request.
    ServerRejected,
    /// The authoritative server could not be reached in time.
    ServerUnavailable,
    /// Storage, hashing or locking failure.
    #[serde(rename = "internal_error")]
    Internal,
}

impl DenialReason {
    /// Stable machine-readable token.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::DailyLimitExceeded => "daily_limit_exceeded",
            DenialReason::TooSoon => "too_soon",
            DenialReason::SuspiciousTiming => "suspicious_timing",
            DenialReason::AbnormalSuccessRate => "abnormal_success_rate",
            DenialReason::ConsistentViewTime => "consistent_view_time",
            DenialReason::TooManyRequests => "too_many_requests",
            DenialReason::ExcessiveFailures => "excessive_failures",
            DenialReason::InsufficientViewTime => "insufficient_view_time",
            DenialReason::InvalidRewardAmount => "invalid_reward_amount",
            DenialReason::NoActiveSession => "no_active_session",
            DenialReason::InvalidSignature => "invalid_signature",
            DenialReason::StaleTimestamp => "stale_timestamp",
            DenialReason::FutureTimestamp => "future_timestamp",
            DenialReason::ServerRejected => "server_rejected",
            DenialReason::ServerUnavailable => "server_unavailable",
            DenialReason::Internal => "internal_error",
        }
    }

    /// Short human-readable description suitable for direct display.
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::DailyLimitExceeded => "daily limit reached",
            DenialReason::TooSoon => "too soon",
            DenialReason::SuspiciousTiming => "suspicious timing",
            DenialReason::AbnormalSuccessRate => "abnormal success rate",
            DenialReason::ConsistentViewTime => "automated viewing suspected",
            DenialReason::TooManyRequests => "too many requests",
            DenialReason::ExcessiveFailures => "excessive failures",
            DenialReason::InsufficientViewTime => "insufficient view time",
            DenialReason::InvalidRewardAmount => "invalid reward amount",
            DenialReason::NoActiveSession => "no active session",
            DenialReason::InvalidSignature => "invalid signature",
            DenialReason::StaleTimestamp => "request too old",
            DenialReason::FutureTimestamp => "request in the future",
            DenialReason::ServerRejected => "rejected by server",
            DenialReason::ServerUnavailable => "server unavailable",
            DenialReason::Internal => "internal error",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of a single-component check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The check passed and any reservation was recorded.
    Allowed,
    /// The check failed; no state was changed.
    Denied(DenialReason),
}

impl Admission {
    /// Check if the admission passed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Outcome of a preflight, completion or request validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the action is allowed or the completion credited.
    pub is_valid: bool,
    /// Credited amount; zero unless a completion was accepted.
    pub reward: u32,
    /// Denial reason, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    /// Set when a heuristic flagged the attempt for offline review.
    pub suspicious: bool,
    /// Signed record of an accepted completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<CompletionRecord>,
}

impl Verdict {
    /// An allowed preflight or request.
    pub fn allowed() -> Self {
        Self {
            is_valid: true,
            reward: 0,
            reason: None,
            suspicious: false,
            receipt: None,
        }
    }

    /// An accepted completion crediting `reward`.
    pub fn completed(reward: u32, receipt: CompletionRecord) -> Self {
        Self {
            is_valid: true,
            reward,
            reason: None,
            suspicious: false,
            receipt: Some(receipt),
        }
    }

    /// A plain policy denial.
    pub fn denied(reason: DenialReason) -> Self {
        Self {
            is_valid: false,
            reward: 0,
            reason: Some(reason),
            suspicious: false,
            receipt: None,
        }
    }

    /// A denial flagged for review.
    pub fn suspicious(reason: DenialReason) -> Self {
        Self {
            suspicious: true,
            ..Self::denied(reason)
        }
    }

    /// Mark this verdict as flagged without changing its outcome.
    #[must_use]
    pub fn flagged(mut self) -> Self {
        self.suspicious = true;
        self
    }
}

impl From<Admission> for Verdict {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Allowed => Verdict::allowed(),
            Admission::Denied(reason) => Verdict::denied(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_tokens_match_serde() {
        for reason in [
            DenialReason::TooSoon,
            DenialReason::ExcessiveFailures,
            DenialReason::Internal,
            DenialReason::InvalidRewardAmount,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn test_denied_has_zero_reward() {
        let v = Verdict::suspicious(DenialReason::InsufficientViewTime);
        assert!(!v.is_valid);
        assert_eq!(v.reward, 0);
        assert!(v.suspicious);
        assert_eq!(v.reason, Some(DenialReason::InsufficientViewTime));
    }

    #[test]
    fn test_display_is_short_message() {
        assert_eq!(DenialReason::TooSoon.to_string(), "too soon");
        assert_eq!(DenialReason::ExcessiveFailures.to_string(), "excessive failures");
    }

    #[test]
    fn test_admission_into_verdict() {
        assert!(Verdict::from(Admission::Allowed).is_valid);
        let denied = Verdict::from(Admission::Denied(DenialReason::DailyLimitExceeded));
        assert_eq!(denied.reason, Some(DenialReason::DailyLimitExceeded));
        assert!(!denied.suspicious);
    }
}
