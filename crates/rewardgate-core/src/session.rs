//! The per-activity state machine and the consecutive-failure breaker.
//!
//! ```text
//!   Idle --arm--> Armed --start--> Armed(started) --finish--> Completed | Rejected
//!                  ^                                               |
//!                  +---------------------- arm --------------------+
//! ```
//!
//! At most one session is open per [`ViewSession`]. Arming again discards an
//! unconsumed session.

use serde::{Deserialize, Serialize};

use rewardgate_crypto::{random_bytes, Digest256};
use rewardgate_identity::FingerprintId;

use crate::error::{GuardError, Result};

/// Length of a session id in hex characters.
pub const SESSION_ID_LEN: usize = 16;

/// Lifecycle state of the current reward-granting activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been armed.
    #[default]
    Idle,
    /// A preflight succeeded; the session may be started and completed.
    Armed,
    /// The last session was credited.
    Completed,
    /// The last session was refused.
    Rejected,
}

/// One armed activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdSession {
    /// Random identifier bound into the completion signature.
    pub session_id: String,
    /// Task type the preflight was issued for.
    pub task_type: String,
    /// When the preflight succeeded.
    pub armed_at: i64,
    /// When the activity started, if it has.
    pub start_time: Option<i64>,
}

impl AdSession {
    /// Arm a new session for `task_type` at `now`.
    pub fn new(task_type: &str, now: i64, fingerprint: &FingerprintId) -> Self {
        Self {
            session_id: new_session_id(now, fingerprint),
            task_type: task_type.to_string(),
            armed_at: now,
            start_time: None,
        }
    }
}

/// Generate a session id from the time, fresh randomness and the device.
pub fn new_session_id(now: i64, fingerprint: &FingerprintId) -> String {
    let nonce: [u8; 16] = random_bytes();
    let digest = Digest256::hash_many(&[
        &now.to_le_bytes()[..],
        &nonce[..],
        fingerprint.as_str().as_bytes(),
    ]);
    let mut id = digest.to_hex();
    id.truncate(SESSION_ID_LEN);
    id
}

/// Counts consecutive rejected completions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailureBreaker {
    consecutive: u32,
    threshold: u32,
}

impl FailureBreaker {
    /// Create a breaker that trips at `threshold` consecutive failures.
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    /// Record a rejected completion.
    pub fn record_failure(&mut self) {
        self.consecutive = self.consecutive.saturating_add(1);
    }

    /// Record a credited completion, closing the breaker.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Whether preflight must be denied.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.consecutive >= self.threshold
    }

    /// Current run of failures.
    pub fn count(&self) -> u32 {
        self.consecutive
    }

    /// Clear the failure run.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Holder of the single open session.
#[derive(Clone, Debug, Default)]
pub struct ViewSession {
    state: SessionState,
    current: Option<AdSession>,
}

impl ViewSession {
    /// An idle session holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The open session, if any.
    pub fn current(&self) -> Option<&AdSession> {
        self.current.as_ref()
    }

    /// Open `session`, returning any unconsumed session it replaces.
    pub fn arm(&mut self, session: AdSession) -> Option<AdSession> {
        self.state = SessionState::Armed;
        self.current.replace(session)
    }

    /// Mark the open session as started. Repeated calls keep the first start.
    pub fn start(&mut self, now: i64) -> Result<&AdSession> {
        match (self.state, self.current.as_mut()) {
            (SessionState::Armed, Some(session)) => {
                session.start_time.get_or_insert(now);
                Ok(session)
            }
            _ => Err(GuardError::NoArmedSession),
        }
    }

    /// Consume the open session if it is armed and started.
    ///
    /// An armed but unstarted session is left in place.
    pub fn take_started(&mut self) -> Option<AdSession> {
        let started = self.state == SessionState::Armed
            && self
                .current
                .as_ref()
                .is_some_and(|s| s.start_time.is_some());
        if started {
            self.current.take()
        } else {
            None
        }
    }

    /// Record the outcome of a consumed session.
    ///
    /// A session armed after the consumed one keeps its state.
    pub fn finish(&mut self, completed: bool) {
        if self.current.is_some() {
            return;
        }
        self.state = if completed {
            SessionState::Completed
        } else {
            SessionState::Rejected
        };
    }

    /// Return to idle, discarding any open session.
    pub fn reset(&mut self) {
        self.current = None;
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> FingerprintId {
        FingerprintId::parse(&Digest256::hash(b"device").to_hex()).unwrap()
    }

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id(1_000, &fp());
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_session_id(1_000, &fp()));
    }

    #[test]
    fn test_lifecycle() {
        let mut vs = ViewSession::new();
        assert_eq!(vs.state(), SessionState::Idle);
        assert!(vs.start(0).is_err());

        vs.arm(AdSession::new("watch_ad", 0, &fp()));
        assert_eq!(vs.state(), SessionState::Armed);
        assert!(vs.take_started().is_none());
        assert!(vs.current().is_some());

        vs.start(10).unwrap();
        vs.start(50).unwrap();
        let session = vs.take_started().unwrap();
        assert_eq!(session.start_time, Some(10));

        vs.finish(true);
        assert_eq!(vs.state(), SessionState::Completed);
        assert!(vs.take_started().is_none());
        assert!(vs.start(60).is_err());
    }

    #[test]
    fn test_rearm_supersedes() {
        let mut vs = ViewSession::new();
        let first = AdSession::new("watch_ad", 0, &fp());
        let first_id = first.session_id.clone();
        assert!(vs.arm(first).is_none());
        let replaced = vs.arm(AdSession::new("watch_ad", 5, &fp())).unwrap();
        assert_eq!(replaced.session_id, first_id);
        assert_eq!(vs.current().unwrap().armed_at, 5);
    }

    #[test]
    fn test_rejected_can_rearm() {
        let mut vs = ViewSession::new();
        vs.arm(AdSession::new("watch_ad", 0, &fp()));
        vs.start(0).unwrap();
        vs.take_started().unwrap();
        vs.finish(false);
        assert_eq!(vs.state(), SessionState::Rejected);
        vs.arm(AdSession::new("watch_ad", 1, &fp()));
        assert_eq!(vs.state(), SessionState::Armed);
    }

    #[test]
    fn test_finish_leaves_newer_session_armed() {
        let mut vs = ViewSession::new();
        vs.arm(AdSession::new("watch_ad", 0, &fp()));
        vs.start(0).unwrap();
        vs.take_started().unwrap();

        vs.arm(AdSession::new("watch_ad", 5, &fp()));
        vs.finish(false);
        assert_eq!(vs.state(), SessionState::Armed);
        assert!(vs.current().is_some());
    }

    #[test]
    fn test_breaker_trips_and_resets() {
        let mut breaker = FailureBreaker::new(5);
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(!breaker.is_tripped());
        breaker.record_failure();
        assert!(breaker.is_tripped());
        assert_eq!(breaker.count(), 5);

        breaker.record_success();
        assert!(!breaker.is_tripped());
        assert_eq!(breaker.count(), 0);
    }
}
