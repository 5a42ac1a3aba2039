//! The verification facade.
//!
//! [`VerificationFacade`] owns every component and exposes the two calls a
//! reward flow needs:
//!
//! 1. [`preflight`](VerificationFacade::preflight) before the activity is
//!    shown. Checks run in this order and the first denial wins:
//!    circuit breaker, minimum interval, exact interval, success ratio,
//!    consistent view time, daily quota, sliding window. The non-mutating
//!    checks come first so their denials reserve nothing.
//! 2. [`verify_completion`](VerificationFacade::verify_completion) after it
//!    ends. Dwell time and reward bounds are checked, a signed completion
//!    record is written, metrics are updated, and pattern checks run again.
//!
//! Neither call returns an error. Infrastructure failures become a denial
//! with reason `internal_error`.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use rewardgate_identity::{DescriptorSource, DeviceIdentity, FingerprintId, FingerprintOrigin};
use rewardgate_store::KeyValueStore;

use crate::activity::{ActivityLog, SuspiciousActivityRecord};
use crate::anomaly::{AnomalyClassifier, Finding};
use crate::clock::Clock;
use crate::config::GuardConfig;
use crate::error::{GuardError, Result};
use crate::metrics::MetricsLedger;
use crate::quota::QuotaLedger;
use crate::records::{CompletionJournal, CompletionRecord};
use crate::remote::{CompletionReport, RemoteGate, ThreatReport};
use crate::session::{AdSession, FailureBreaker, SessionState, ViewSession};
use crate::signer::{RequestSigner, SignedRequest};
use crate::storage;
use crate::verdict::{Admission, DenialReason, Verdict};
use crate::window::BehaviorWindow;

/// Ad unit recorded when the caller does not name one.
pub const DEFAULT_AD_UNIT: &str = "rewarded_ad";

/// Snapshot for the admin surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Preflight reservations made today.
    pub daily_count: u32,
    /// Reservations left today.
    pub remaining_today: u32,
    /// Sessions that reached completion verification.
    pub total_shown: u64,
    /// Sessions that were credited.
    pub total_rewarded: u64,
    /// `total_rewarded / total_shown`, zero when nothing was shown.
    pub success_rate: f64,
    /// Mean credited dwell time, rounded to whole seconds.
    pub average_view_time_seconds: u64,
    /// Entries written to the suspicious activity log.
    pub suspicious_attempts: u64,
}

/// A completion that passed the local checks but is not yet credited.
#[derive(Debug)]
struct PendingCompletion {
    credited: u32,
    record: CompletionRecord,
}

#[derive(Debug)]
enum Evaluation {
    Passed(PendingCompletion),
    Rejected(Verdict),
}

#[derive(Debug)]
struct SessionSlot {
    view: ViewSession,
    breaker: FailureBreaker,
}

/// Orchestrates identity, signing, quotas, windows, sessions and heuristics.
///
/// One instance per process is expected; share it by `Arc`. Calls are
/// serialized internally, so overlapping flows cannot both pass a quota.
pub struct VerificationFacade {
    config: GuardConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    identity: DeviceIdentity,
    signer: RequestSigner,
    quota: QuotaLedger,
    window: BehaviorWindow,
    metrics: MetricsLedger,
    classifier: AnomalyClassifier,
    activity: ActivityLog,
    journal: CompletionJournal,
    remote: Option<RemoteGate>,
    slot: Mutex<SessionSlot>,
}

impl std::fmt::Debug for VerificationFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationFacade")
            .field("profile", &self.config.profile)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl VerificationFacade {
    /// Build a facade over `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: GuardConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        descriptors: Box<dyn DescriptorSource>,
    ) -> Result<Self> {
        config.validate()?;

        let identity = DeviceIdentity::with_salt(
            Arc::clone(&store),
            descriptors,
            config.signing.fingerprint_salt.clone(),
        );
        let signer = RequestSigner::new(config.signing.secret.as_bytes())?;
        let limits = &config.limits;

        Ok(Self {
            quota: QuotaLedger::new(Arc::clone(&store), limits.max_daily_attempts),
            window: BehaviorWindow::new(Arc::clone(&store), limits.window_ms, limits.max_in_window),
            metrics: MetricsLedger::new(Arc::clone(&store)),
            classifier: AnomalyClassifier::new(&config.timing, config.anomaly.clone()),
            activity: ActivityLog::new(Arc::clone(&store), config.log.activity_capacity),
            journal: CompletionJournal::new(
                Arc::clone(&store),
                config.log.completion_records_per_day,
            ),
            slot: Mutex::new(SessionSlot {
                view: ViewSession::new(),
                breaker: FailureBreaker::new(limits.max_consecutive_failures),
            }),
            remote: None,
            identity,
            signer,
            store,
            clock,
            config,
        })
    }

    /// Attach an authoritative server boundary.
    #[must_use]
    pub fn with_remote(mut self, gate: RemoteGate) -> Self {
        self.remote = Some(gate);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// This device's fingerprint.
    pub fn fingerprint(&self) -> FingerprintId {
        self.identity.fingerprint()
    }

    /// How the fingerprint was obtained.
    pub fn fingerprint_origin(&self) -> FingerprintOrigin {
        self.identity.origin()
    }

    /// State of the current session.
    pub fn session_state(&self) -> SessionState {
        self.lock_slot()
            .map(|slot| slot.view.state())
            .unwrap_or(SessionState::Idle)
    }

    /// Id of the armed session, if any.
    pub fn active_session_id(&self) -> Option<String> {
        self.lock_slot()
            .ok()
            .and_then(|slot| slot.view.current().map(|s| s.session_id.clone()))
    }

    /// Decide whether a reward-granting activity may start.
    ///
    /// On success the session is armed and any unconsumed session is
    /// discarded.
    pub fn preflight(&self, task_type: &str) -> Verdict {
        match self.try_preflight(task_type) {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(task_type, error = %e, "Preflight failed, denying");
                Verdict::denied(DenialReason::Internal)
            }
        }
    }

    fn try_preflight(&self, task_type: &str) -> Result<Verdict> {
        let now = self.clock.now_millis();
        let today = self.clock.today();
        let mut slot = self.lock_slot()?;

        if slot.breaker.is_tripped() {
            self.flag(
                now,
                "excessive_failures",
                json!({ "failures": slot.breaker.count() }),
            );
            return Ok(Verdict::suspicious(DenialReason::ExcessiveFailures));
        }

        let metrics = self.metrics.load()?;
        let finding = self
            .classifier
            .check_interval(now, metrics.last_ad_time_ms)
            .or_else(|| self.classifier.check_patterns(&metrics));
        if let Some(finding) = finding {
            let reason = finding.reason;
            self.flag_finding(now, finding);
            return Ok(Verdict::suspicious(reason));
        }

        if let Admission::Denied(reason) = self.quota.check_and_reserve(today)? {
            info!(task_type, %reason, "Preflight denied");
            return Ok(Verdict::denied(reason));
        }
        if let Admission::Denied(reason) = self.window.record_and_check(task_type, now)? {
            let occupancy = self.window.occupancy(task_type, now).ok();
            self.flag(
                now,
                "suspicious_pattern",
                json!({
                    "task_type": task_type,
                    "reason": reason,
                    "occupancy": occupancy,
                    "window_ms": self.config.limits.window_ms,
                }),
            );
            return Ok(Verdict::suspicious(reason));
        }

        let session = AdSession::new(task_type, now, &self.identity.fingerprint());
        let session_id = session.session_id.clone();
        if let Some(stale) = slot.view.arm(session) {
            debug!(session_id = %stale.session_id, "Unconsumed session superseded");
        }
        info!(task_type, %session_id, "Preflight allowed");
        Ok(Verdict::allowed())
    }

    /// Mark the armed session as started.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::NoArmedSession`] if no preflight succeeded.
    pub fn start(&self) -> Result<()> {
        let now = self.clock.now_millis();
        let mut slot = self.lock_slot()?;
        let session = slot.view.start(now)?;
        debug!(session_id = %session.session_id, "Session started");
        Ok(())
    }

    /// Verify a completion with the default ad unit.
    pub fn verify_completion(&self, reward: i64) -> Verdict {
        self.verify_completion_report(reward, DEFAULT_AD_UNIT)
    }

    /// Verify a completion reported by the ad SDK.
    ///
    /// `reward` is only bounds-checked; an accepted completion always
    /// credits the configured constant.
    pub fn verify_completion_report(&self, reward: i64, ad_unit_id: &str) -> Verdict {
        match self.begin_completion(reward, ad_unit_id) {
            Ok(pending) => self.commit_completion(pending, None),
            Err(rejection) => rejection,
        }
    }

    /// Consume the started session and run the local completion checks.
    ///
    /// A rejection is settled here. A pass is returned unsettled: nothing is
    /// credited until [`commit_completion`](Self::commit_completion) runs.
    fn begin_completion(
        &self,
        reward: i64,
        ad_unit_id: &str,
    ) -> std::result::Result<PendingCompletion, Verdict> {
        let now = self.clock.now_millis();
        let mut slot = self.lock_slot().map_err(|e| {
            error!(error = %e, "Completion verification failed, denying");
            Verdict::denied(DenialReason::Internal)
        })?;

        let Some(session) = slot.view.take_started() else {
            self.flag(
                now,
                "no_active_session",
                json!({ "reported_reward": reward, "ad_unit_id": ad_unit_id }),
            );
            return Err(Verdict::suspicious(DenialReason::NoActiveSession));
        };

        let rejection = match self.check_completion(&session, reward, ad_unit_id, now) {
            Ok(Evaluation::Passed(pending)) => return Ok(pending),
            Ok(Evaluation::Rejected(verdict)) => verdict,
            Err(e) => {
                error!(session_id = %session.session_id, error = %e, "Completion verification failed, denying");
                Verdict::denied(DenialReason::Internal)
            }
        };
        slot.breaker.record_failure();
        slot.view.finish(false);
        Err(rejection)
    }

    fn check_completion(
        &self,
        session: &AdSession,
        reward: i64,
        ad_unit_id: &str,
        now: i64,
    ) -> Result<Evaluation> {
        let started = session.start_time.unwrap_or(session.armed_at);
        let view_time_ms = now.saturating_sub(started);
        let min_view_time_ms = self.config.timing.min_view_time_ms;

        if view_time_ms < min_view_time_ms {
            self.metrics.update(|m| m.record_rejection())?;
            self.flag(
                now,
                "insufficient_view_time",
                json!({ "view_time_ms": view_time_ms, "required_ms": min_view_time_ms }),
            );
            return Ok(Evaluation::Rejected(Verdict::suspicious(
                DenialReason::InsufficientViewTime,
            )));
        }

        let limits = &self.config.limits;
        if reward < 1 || reward > limits.max_reward {
            self.metrics.update(|m| m.record_rejection())?;
            self.flag(
                now,
                "invalid_reward_amount",
                json!({
                    "expected": limits.credited_reward,
                    "received": reward,
                    "max": limits.max_reward,
                }),
            );
            return Ok(Evaluation::Rejected(Verdict::suspicious(
                DenialReason::InvalidRewardAmount,
            )));
        }

        let credited = limits.credited_reward;
        let request = self.signer.sign_request(
            &session.task_type,
            now,
            u64::from(credited),
            &self.identity.fingerprint(),
        );
        Ok(Evaluation::Passed(PendingCompletion {
            credited,
            record: CompletionRecord {
                request,
                session_id: session.session_id.clone(),
                ad_unit_id: ad_unit_id.to_string(),
                view_time_ms,
                recorded_at: now,
            },
        }))
    }

    /// Settle a completion that passed the local checks.
    ///
    /// `server` is the authoritative answer, if one was asked. A server
    /// denial is settled as a rejection: shown but not rewarded, counted by
    /// the breaker, and nothing journaled.
    fn commit_completion(&self, pending: PendingCompletion, server: Option<Verdict>) -> Verdict {
        let mut slot = match self.lock_slot() {
            Ok(slot) => slot,
            Err(e) => {
                error!(error = %e, "Completion commit failed, denying");
                return Verdict::denied(DenialReason::Internal);
            }
        };
        let session_id = pending.record.session_id.clone();
        let now = pending.record.recorded_at;

        let verdict = match server {
            Some(denied) if !denied.is_valid => {
                if let Err(e) = self.metrics.update(|m| m.record_rejection()) {
                    warn!(%session_id, error = %e, "Failed to count rejected completion");
                }
                if denied.suspicious {
                    self.flag(
                        now,
                        "server_rejected",
                        json!({ "session_id": session_id, "reason": denied.reason }),
                    );
                }
                denied
            }
            server => {
                let server_flagged = server.is_some_and(|v| v.suspicious);
                match self.credit(pending) {
                    Ok(verdict) if server_flagged => verdict.flagged(),
                    Ok(verdict) => verdict,
                    Err(e) => {
                        error!(%session_id, error = %e, "Completion commit failed, denying");
                        Verdict::denied(DenialReason::Internal)
                    }
                }
            }
        };

        if verdict.is_valid {
            slot.breaker.record_success();
        } else {
            slot.breaker.record_failure();
        }
        slot.view.finish(verdict.is_valid);
        verdict
    }

    fn credit(&self, pending: PendingCompletion) -> Result<Verdict> {
        let PendingCompletion { credited, record } = pending;
        let now = record.recorded_at;
        let view_time_ms = record.view_time_ms;

        self.journal.append(self.clock.today(), record.clone())?;
        let metrics = self
            .metrics
            .update(|m| m.record_completion(view_time_ms, now))?;

        info!(
            session_id = %record.session_id,
            view_time_ms,
            credited,
            "Completion credited"
        );

        let mut verdict = Verdict::completed(credited, record);
        if let Some(finding) = self.classifier.check_patterns(&metrics) {
            self.flag_finding(now, finding);
            verdict = verdict.flagged();
        }
        Ok(verdict)
    }

    /// Check a signed request for freshness and authenticity.
    pub fn validate_signed_request(&self, request: &SignedRequest) -> Verdict {
        let now = self.clock.now_millis();
        let timing = &self.config.timing;

        let stale = request.timestamp < now - timing.max_request_age_ms;
        let future = request.timestamp > now + timing.max_request_skew_ms;
        if stale || future {
            let reason = if stale {
                DenialReason::StaleTimestamp
            } else {
                DenialReason::FutureTimestamp
            };
            self.flag(
                now,
                "invalid_timestamp",
                json!({
                    "task_type": request.task_type,
                    "timestamp": request.timestamp,
                    "reason": reason.as_str(),
                }),
            );
            return Verdict::suspicious(reason);
        }

        if !self.signer.verify(request) {
            self.flag(
                now,
                "invalid_signature",
                json!({
                    "task_type": request.task_type,
                    "amount": request.amount,
                    "signature": request.signature.to_hex(),
                }),
            );
            return Verdict::suspicious(DenialReason::InvalidSignature);
        }

        Verdict::allowed()
    }

    /// Sign a request for `task_type` stamped with the current time.
    pub fn sign_request(&self, task_type: &str, amount: u64) -> SignedRequest {
        self.signer.sign_request(
            task_type,
            self.clock.now_millis(),
            amount,
            &self.identity.fingerprint(),
        )
    }

    /// Verify a completion locally, then confirm it with the attached server.
    ///
    /// Local state is only credited once the server accepts. Without a
    /// server this is [`verify_completion_report`](Self::verify_completion_report).
    pub async fn verify_completion_confirmed(&self, reward: i64, ad_unit_id: &str) -> Verdict {
        let pending = match self.begin_completion(reward, ad_unit_id) {
            Ok(pending) => pending,
            Err(rejection) => return rejection,
        };
        let Some(gate) = &self.remote else {
            return self.commit_completion(pending, None);
        };

        let report = CompletionReport::from_receipt(&pending.record, reward);
        let local = Verdict::completed(pending.credited, pending.record.clone());
        let server = gate.confirm_completion(local, &report).await;
        self.commit_completion(pending, Some(server))
    }

    /// Validate a signed request locally, then with the attached server.
    pub async fn validate_signed_request_confirmed(&self, request: &SignedRequest) -> Verdict {
        let local = self.validate_signed_request(request);
        match &self.remote {
            Some(gate) => gate.confirm_token_request(local, request).await,
            None => local,
        }
    }

    /// Counters for the admin surface.
    pub fn statistics(&self) -> Result<Statistics> {
        let today = self.clock.today();
        let metrics = self.metrics.load()?;
        Ok(Statistics {
            daily_count: self.quota.count(today)?,
            remaining_today: self.quota.remaining(today)?,
            total_shown: metrics.total_shown,
            total_rewarded: metrics.total_rewarded,
            success_rate: metrics.success_rate(),
            average_view_time_seconds: (metrics.average_view_time_ms / 1000.0).round() as u64,
            suspicious_attempts: metrics.suspicious_attempts,
        })
    }

    /// Retained suspicious activity, oldest first.
    pub fn suspicious_activities(&self) -> Result<Vec<SuspiciousActivityRecord>> {
        self.activity.entries()
    }

    /// Completion records written today.
    pub fn completion_records(&self) -> Result<Vec<CompletionRecord>> {
        self.journal.records(self.clock.today())
    }

    /// Remove all quotas, histories, metrics, records and logs.
    ///
    /// The device fingerprint fallback id is kept. The breaker and any armed
    /// session are cleared.
    pub fn reset_security_data(&self) -> Result<()> {
        let keys: Vec<String> = self
            .store
            .get_all_keys()?
            .into_iter()
            .filter(|key| storage::is_reset_key(key))
            .collect();
        if !keys.is_empty() {
            self.store.multi_remove(&keys)?;
        }

        let mut slot = self.lock_slot()?;
        slot.breaker.reset();
        slot.view.reset();

        info!(removed = keys.len(), "Security data reset");
        Ok(())
    }

    fn lock_slot(&self) -> Result<MutexGuard<'_, SessionSlot>> {
        self.slot
            .lock()
            .map_err(|_| GuardError::LockPoisoned("view session"))
    }

    fn flag_finding(&self, now: i64, finding: Finding) {
        self.flag(now, finding.activity, finding.details);
    }

    /// Log a suspicious event and count it. Never fails.
    fn flag(&self, now: i64, activity: &str, details: Value) {
        let record = SuspiciousActivityRecord {
            timestamp: now,
            device_fingerprint: self.identity.fingerprint(),
            activity_type: activity.to_string(),
            details,
        };
        if let Some(gate) = &self.remote {
            gate.report_threat(ThreatReport::from(&record));
        }
        self.activity.append(record);

        if let Err(e) = self.metrics.update(|m| m.suspicious_attempts += 1) {
            warn!(error = %e, "Failed to count suspicious attempt");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rewardgate_identity::StaticDescriptors;
    use rewardgate_store::MemoryStore;

    fn facade() -> (VerificationFacade, ManualClock) {
        let clock = ManualClock::new(0);
        let facade = VerificationFacade::new(
            GuardConfig::production(),
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
            Box::new(StaticDescriptors(vec!["unit-test-device".into()])),
        )
        .unwrap();
        (facade, clock)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GuardConfig::builder().with_max_daily_attempts(0).build();
        let result = VerificationFacade::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
            Box::new(StaticDescriptors(vec![])),
        );
        assert!(matches!(result, Err(GuardError::Config(_))));
    }

    #[test]
    fn test_start_without_preflight() {
        let (facade, _) = facade();
        assert!(matches!(facade.start(), Err(GuardError::NoArmedSession)));
    }

    #[test]
    fn test_preflight_arms_session() {
        let (facade, _) = facade();
        assert!(facade.preflight("watch_ad").is_valid);
        assert_eq!(facade.session_state(), SessionState::Armed);
        assert_eq!(facade.active_session_id().map(|id| id.len()), Some(16));
    }

    #[test]
    fn test_unstarted_session_is_not_consumed() {
        let (facade, clock) = facade();
        assert!(facade.preflight("watch_ad").is_valid);
        clock.advance(20_000);
        let v = facade.verify_completion(1);
        assert_eq!(v.reason, Some(DenialReason::NoActiveSession));
        assert_eq!(facade.session_state(), SessionState::Armed);

        facade.start().unwrap();
        clock.advance(20_000);
        assert!(facade.verify_completion(1).is_valid);
        assert_eq!(facade.session_state(), SessionState::Completed);
    }

    #[test]
    fn test_receipt_carries_credited_amount() {
        let (facade, clock) = facade();
        facade.preflight("watch_ad");
        facade.start().unwrap();
        clock.advance(16_000);
        let v = facade.verify_completion_report(7, "banner_test");
        let receipt = v.receipt.unwrap();
        assert_eq!(receipt.request.amount, 1);
        assert_eq!(receipt.ad_unit_id, "banner_test");
        assert_eq!(receipt.view_time_ms, 16_000);
        assert!(facade.validate_signed_request(&receipt.request).is_valid);
        assert_eq!(facade.completion_records().unwrap().len(), 1);
    }

    #[test]
    fn test_suspicious_events_are_counted() {
        let (facade, _) = facade();
        facade.verify_completion(1);
        facade.verify_completion(1);
        let stats = facade.statistics().unwrap();
        assert_eq!(stats.suspicious_attempts, 2);
        assert_eq!(facade.suspicious_activities().unwrap().len(), 2);
    }
}
