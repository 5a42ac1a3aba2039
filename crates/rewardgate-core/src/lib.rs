//! # rewardgate-core
//!
//! Layered anti-fraud verification for reward-granting actions.
//!
//! A reward flow calls [`VerificationFacade::preflight`] before showing the
//! activity, [`VerificationFacade::start`] when it begins, and
//! [`VerificationFacade::verify_completion`] when it ends. Between them the
//! facade consults:
//!
//! - **QuotaLedger**: per-day attempt counters
//! - **BehaviorWindow**: per-task sliding-window burst limit
//! - **AnomalyClassifier**: interval and pattern heuristics
//! - **ViewSession**: the armed/started/consumed session and failure breaker
//! - **RequestSigner**: HMAC tamper-evidence over completion records
//! - **ActivityLog**: bounded record of suspicious events
//!
//! ## Trust model
//!
//! Everything here runs on the client. The signing secret is embedded and
//! the clock is device-local, so results are tamper-evident, not
//! tamper-proof. The [`remote`] module defines the hand-off to a server that
//! holds final authority.
//!
//! ## Failure model
//!
//! Denials are [`Verdict`] values, never errors. Storage or locking failures
//! on a crediting path deny with reason `internal_error`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activity;
pub mod anomaly;
pub mod clock;
pub mod config;
pub mod error;
pub mod facade;
pub mod metrics;
pub mod quota;
pub mod records;
pub mod remote;
pub mod session;
pub mod signer;
pub mod storage;
pub mod verdict;
pub mod window;

#[cfg(test)]
mod proptests;

pub use activity::{ActivityLog, SuspiciousActivityRecord};
pub use anomaly::{AnomalyClassifier, Finding};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AnomalyConfig, ConfigError, GuardConfig, GuardConfigBuilder, LimitsConfig, LogConfig, Profile,
    RemoteConfig, SigningConfig, TimingConfig,
};
pub use error::{GuardError, Result};
pub use facade::{Statistics, VerificationFacade, DEFAULT_AD_UNIT};
pub use metrics::{AdMetrics, MetricsLedger};
pub use quota::QuotaLedger;
pub use records::{CompletionJournal, CompletionRecord};
pub use remote::{
    AuthoritativeValidator, CompletionReport, RemoteError, RemoteGate, ServerVerdict,
    ThreatReport, VALIDATE_TOKEN_PATH, VERIFY_COMPLETION_PATH,
};
pub use session::{AdSession, FailureBreaker, SessionState, ViewSession};
pub use signer::{RequestSigner, SignedRequest};
pub use verdict::{Admission, DenialReason, Verdict};
pub use window::BehaviorWindow;
