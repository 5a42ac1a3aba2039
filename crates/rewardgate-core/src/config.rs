//! Configuration for the verification engine.
//!
//! Every threshold the engine applies is a field here. The anomaly bands in
//! particular were chosen empirically and should be tuned against real
//! traffic rather than treated as fixed.
//!
//! # Example
//!
//! ```
//! use rewardgate_core::config::{GuardConfig, GuardConfigBuilder};
//!
//! // Production defaults
//! let config = GuardConfig::default();
//! assert_eq!(config.timing.min_view_time_ms, 15_000);
//!
//! // Or customize
//! let config = GuardConfigBuilder::debug()
//!     .with_max_daily_attempts(20)
//!     .with_signing_secret("per-build-secret")
//!     .build_validated()
//!     .unwrap();
//! assert_eq!(config.timing.min_view_time_ms, 5_000);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum preflight reservations per calendar day.
const DEFAULT_MAX_DAILY_ATTEMPTS: u32 = 10;

/// Default sliding window length (10 minutes).
const DEFAULT_WINDOW_MS: i64 = 10 * 60 * 1000;

/// Default maximum same-task occurrences inside the window.
const DEFAULT_MAX_IN_WINDOW: u32 = 5;

/// Default consecutive rejected completions before preflight is refused.
const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Amount credited for every accepted completion.
const DEFAULT_CREDITED_REWARD: u32 = 1;

/// Default server validator timeout (10 seconds).
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;

/// Placeholder signing secret.
///
/// A client-embedded secret only provides tamper-evidence. Builds should
/// inject their own value and a server must re-validate.
pub const PLACEHOLDER_SECRET: &str = "rewardgate-client-tamper-evidence-v1";

/// Errors raised by configuration validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A field holds an unusable value.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Build profile selecting the timing and reward constants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Strict production thresholds.
    #[default]
    Production,
    /// Relaxed thresholds for development builds.
    Debug,
}

/// Main engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Profile the values were derived from.
    pub profile: Profile,
    /// Quota, window, failure and reward limits.
    pub limits: LimitsConfig,
    /// Interval, dwell and freshness timings.
    pub timing: TimingConfig,
    /// Anomaly heuristic thresholds.
    pub anomaly: AnomalyConfig,
    /// Bounded log capacities.
    pub log: LogConfig,
    /// Signing and fingerprint secrets.
    pub signing: SigningConfig,
    /// Authoritative server boundary.
    pub remote: RemoteConfig,
}

impl GuardConfig {
    /// Production configuration.
    pub fn production() -> Self {
        Self::default()
    }

    /// Development configuration with shorter timings and a looser reward bound.
    pub fn debug() -> Self {
        Self {
            profile: Profile::Debug,
            limits: LimitsConfig {
                max_reward: 100,
                ..LimitsConfig::default()
            },
            timing: TimingConfig {
                min_ad_interval_ms: 10_000,
                min_view_time_ms: 5_000,
                ..TimingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Configuration for a named profile.
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Production => Self::production(),
            Profile::Debug => Self::debug(),
        }
    }

    /// Create a configuration builder.
    pub fn builder() -> GuardConfigBuilder {
        GuardConfigBuilder::new()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &str, reason: &str) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.into(),
                reason: reason.into(),
            }
        }

        if self.limits.max_daily_attempts == 0 {
            return Err(invalid("limits.max_daily_attempts", "must be greater than zero"));
        }
        if self.limits.max_in_window == 0 {
            return Err(invalid("limits.max_in_window", "must be greater than zero"));
        }
        if self.limits.window_ms <= 0 {
            return Err(invalid("limits.window_ms", "must be greater than zero"));
        }
        if self.limits.max_consecutive_failures == 0 {
            return Err(invalid(
                "limits.max_consecutive_failures",
                "must be greater than zero",
            ));
        }
        if self.limits.max_reward < 1 {
            return Err(invalid("limits.max_reward", "must be at least 1"));
        }
        if self.limits.credited_reward == 0 {
            return Err(invalid("limits.credited_reward", "must be greater than zero"));
        }

        if self.timing.min_ad_interval_ms < 0 {
            return Err(invalid("timing.min_ad_interval_ms", "must not be negative"));
        }
        if self.timing.min_view_time_ms < 0 {
            return Err(invalid("timing.min_view_time_ms", "must not be negative"));
        }
        if self.timing.max_request_age_ms <= 0 || self.timing.max_request_skew_ms < 0 {
            return Err(invalid(
                "timing.max_request_age_ms",
                "freshness window must be positive",
            ));
        }

        let ratio = self.anomaly.success_ratio_threshold;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(invalid(
                "anomaly.success_ratio_threshold",
                "must be in (0.0, 1.0]",
            ));
        }
        if self.anomaly.exact_interval_granularity_ms <= 0 {
            return Err(invalid(
                "anomaly.exact_interval_granularity_ms",
                "must be greater than zero",
            ));
        }
        if self.anomaly.view_time_band_ms < 0.0 || self.anomaly.exact_interval_band_ms < 0 {
            return Err(invalid("anomaly", "bands must not be negative"));
        }

        if self.log.activity_capacity == 0 {
            return Err(invalid("log.activity_capacity", "must be greater than zero"));
        }
        if self.log.completion_records_per_day == 0 {
            return Err(invalid(
                "log.completion_records_per_day",
                "must be greater than zero",
            ));
        }

        if self.signing.secret.is_empty() {
            return Err(invalid("signing.secret", "must not be empty"));
        }

        if self.remote.timeout_ms == 0 {
            return Err(invalid("remote.timeout_ms", "must be greater than zero"));
        }

        Ok(())
    }
}

/// Quota, window, failure and reward limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Preflight reservations allowed per calendar day.
    pub max_daily_attempts: u32,
    /// Same-task occurrences allowed inside the sliding window.
    pub max_in_window: u32,
    /// Sliding window length in milliseconds.
    pub window_ms: i64,
    /// Consecutive rejected completions that trip the circuit breaker.
    pub max_consecutive_failures: u32,
    /// Upper plausibility bound on the SDK-reported reward.
    pub max_reward: i64,
    /// Amount credited per accepted completion, independent of the report.
    pub credited_reward: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_daily_attempts: DEFAULT_MAX_DAILY_ATTEMPTS,
            max_in_window: DEFAULT_MAX_IN_WINDOW,
            window_ms: DEFAULT_WINDOW_MS,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            max_reward: 10,
            credited_reward: DEFAULT_CREDITED_REWARD,
        }
    }
}

/// Interval, dwell and freshness timings, all in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Minimum time between the last credited completion and a new preflight.
    pub min_ad_interval_ms: i64,
    /// Minimum dwell time between `start()` and completion.
    pub min_view_time_ms: i64,
    /// Oldest acceptable signed-request timestamp, relative to now.
    pub max_request_age_ms: i64,
    /// Furthest acceptable signed-request timestamp into the future.
    pub max_request_skew_ms: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_ad_interval_ms: 60_000,
            min_view_time_ms: 15_000,
            max_request_age_ms: 5 * 60 * 1000,
            max_request_skew_ms: 60 * 1000,
        }
    }
}

/// Anomaly heuristic thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Width of the band above the minimum interval in which round intervals are suspicious.
    pub exact_interval_band_ms: i64,
    /// Divisor that marks an interval as "round".
    pub exact_interval_granularity_ms: i64,
    /// Rewarded/shown ratio above which the success rate is abnormal.
    pub success_ratio_threshold: f64,
    /// The ratio check applies only once more than this many were shown.
    pub success_ratio_min_samples: u64,
    /// Dwell time that scripted viewers tend to converge on.
    pub reference_view_time_ms: f64,
    /// Half-width of the band around the reference dwell time.
    pub view_time_band_ms: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            exact_interval_band_ms: 5_000,
            exact_interval_granularity_ms: 1_000,
            success_ratio_threshold: 0.95,
            success_ratio_min_samples: 10,
            reference_view_time_ms: 30_000.0,
            view_time_band_ms: 100.0,
        }
    }
}

/// Bounded log capacities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Suspicious activity records kept, oldest evicted first.
    pub activity_capacity: usize,
    /// Completion records kept per calendar day.
    pub completion_records_per_day: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            activity_capacity: 100,
            completion_records_per_day: 50,
        }
    }
}

/// Signing and fingerprint secrets.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// HMAC secret for signed requests.
    pub secret: String,
    /// Salt mixed into the device fingerprint.
    pub fingerprint_salt: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: PLACEHOLDER_SECRET.into(),
            fingerprint_salt: rewardgate_identity::device::DEFAULT_SALT.into(),
        }
    }
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("secret", &"[REDACTED]")
            .field("fingerprint_salt", &self.fingerprint_salt)
            .finish()
    }
}

/// Authoritative server boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
        }
    }
}

/// Builder for constructing `GuardConfig` with custom values.
#[derive(Clone, Debug, Default)]
pub struct GuardConfigBuilder {
    config: GuardConfig,
}

impl GuardConfigBuilder {
    /// Start from production defaults.
    pub fn new() -> Self {
        Self {
            config: GuardConfig::production(),
        }
    }

    /// Start from debug defaults.
    pub fn debug() -> Self {
        Self {
            config: GuardConfig::debug(),
        }
    }

    /// Build the final configuration.
    pub fn build(self) -> GuardConfig {
        self.config
    }

    /// Build and validate the configuration.
    pub fn build_validated(self) -> Result<GuardConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }

    // ===== Limits =====

    /// Set the daily reservation limit.
    pub fn with_max_daily_attempts(mut self, max: u32) -> Self {
        self.config.limits.max_daily_attempts = max;
        self
    }

    /// Set the sliding window length and occupancy.
    pub fn with_window(mut self, window_ms: i64, max_in_window: u32) -> Self {
        self.config.limits.window_ms = window_ms;
        self.config.limits.max_in_window = max_in_window;
        self
    }

    /// Set the circuit breaker threshold.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.config.limits.max_consecutive_failures = max;
        self
    }

    /// Set the upper bound on reported rewards.
    pub fn with_max_reward(mut self, max: i64) -> Self {
        self.config.limits.max_reward = max;
        self
    }

    // ===== Timing =====

    /// Set the minimum interval between credited completions.
    pub fn with_min_ad_interval_ms(mut self, ms: i64) -> Self {
        self.config.timing.min_ad_interval_ms = ms;
        self
    }

    /// Set the minimum dwell time.
    pub fn with_min_view_time_ms(mut self, ms: i64) -> Self {
        self.config.timing.min_view_time_ms = ms;
        self
    }

    // ===== Anomaly =====

    /// Replace the anomaly thresholds.
    pub fn with_anomaly(mut self, anomaly: AnomalyConfig) -> Self {
        self.config.anomaly = anomaly;
        self
    }

    // ===== Logs =====

    /// Set the suspicious activity log capacity.
    pub fn with_activity_capacity(mut self, capacity: usize) -> Self {
        self.config.log.activity_capacity = capacity;
        self
    }

    // ===== Signing =====

    /// Set the HMAC signing secret.
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.signing.secret = secret.into();
        self
    }

    /// Set the fingerprint salt.
    pub fn with_fingerprint_salt(mut self, salt: impl Into<String>) -> Self {
        self.config.signing.fingerprint_salt = salt.into();
        self
    }

    // ===== Remote =====

    /// Set the server validator timeout.
    pub fn with_remote_timeout_ms(mut self, ms: u64) -> Self {
        self.config.remote.timeout_ms = ms;
        self
    }
}
