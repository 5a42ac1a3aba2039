//! Statistical heuristics over accumulated metrics.
//!
//! Interval checks run during preflight against the time of the last
//! credited completion. Pattern checks run against [`AdMetrics`], both in
//! preflight and right after a completion updates them. Any single finding
//! is enough to deny; each one is written to the suspicious activity log.

use serde_json::{json, Value};

use crate::config::{AnomalyConfig, TimingConfig};
use crate::metrics::AdMetrics;
use crate::verdict::DenialReason;

/// A heuristic that fired.
#[derive(Clone, Debug, PartialEq)]
pub struct Finding {
    /// Reason reported to the caller.
    pub reason: DenialReason,
    /// Activity type written to the log.
    pub activity: &'static str,
    /// Structured details for offline review.
    pub details: Value,
}

/// Applies the interval and pattern heuristics.
#[derive(Clone, Debug)]
pub struct AnomalyClassifier {
    min_interval_ms: i64,
    config: AnomalyConfig,
}

impl AnomalyClassifier {
    /// Create a classifier from timing and anomaly thresholds.
    pub fn new(timing: &TimingConfig, config: AnomalyConfig) -> Self {
        Self {
            min_interval_ms: timing.min_ad_interval_ms,
            config,
        }
    }

    /// Check the time since the last credited completion.
    pub fn check_interval(&self, now: i64, last_ad_time: Option<i64>) -> Option<Finding> {
        let last = last_ad_time?;
        let elapsed = now.saturating_sub(last);

        if elapsed < self.min_interval_ms {
            return Some(Finding {
                reason: DenialReason::TooSoon,
                activity: "interval_too_short",
                details: json!({
                    "interval_ms": elapsed,
                    "required_ms": self.min_interval_ms,
                }),
            });
        }

        // Fixed-delay scripts land just past the minimum on a round number.
        let band_end = self.min_interval_ms + self.config.exact_interval_band_ms;
        if elapsed > self.min_interval_ms
            && elapsed < band_end
            && elapsed % self.config.exact_interval_granularity_ms == 0
        {
            return Some(Finding {
                reason: DenialReason::SuspiciousTiming,
                activity: "suspicious_timing",
                details: json!({ "interval_ms": elapsed }),
            });
        }

        None
    }

    /// Check success ratio and view-time consistency.
    pub fn check_patterns(&self, metrics: &AdMetrics) -> Option<Finding> {
        if metrics.total_shown > self.config.success_ratio_min_samples {
            let rate = metrics.success_rate();
            if rate > self.config.success_ratio_threshold {
                return Some(Finding {
                    reason: DenialReason::AbnormalSuccessRate,
                    activity: "abnormal_success_rate",
                    details: json!({
                        "rate": rate,
                        "total_shown": metrics.total_shown,
                    }),
                });
            }
        }

        let avg = metrics.average_view_time_ms;
        if avg > 0.0
            && (avg - self.config.reference_view_time_ms).abs() < self.config.view_time_band_ms
        {
            return Some(Finding {
                reason: DenialReason::ConsistentViewTime,
                activity: "consistent_view_time",
                details: json!({ "average_view_time_ms": avg }),
            });
        }

        None
    }
}
