//! Boundary to an authoritative server-side re-validator.
//!
//! The local engine only provides tamper-evidence. Final trust belongs to a
//! server reachable through [`AuthoritativeValidator`]; this crate ships no
//! HTTP client, only the contract and the timeout policy around it.
//!
//! - Reward-granting paths fail closed: if the server cannot be reached in
//!   time, the completion is denied with `server_unavailable`.
//! - Token-request validation falls back to the local verdict.
//! - Threat reports are fire-and-forget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use rewardgate_identity::FingerprintId;

use crate::activity::SuspiciousActivityRecord;
use crate::config::RemoteConfig;
use crate::records::CompletionRecord;
use crate::signer::SignedRequest;
use crate::verdict::{DenialReason, Verdict};

/// Server path for token-request validation.
pub const VALIDATE_TOKEN_PATH: &str = "/validate-token-request";

/// Server path for completion verification.
pub const VERIFY_COMPLETION_PATH: &str = "/verify-ad-completion";

/// Errors from a validator transport.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The call did not finish in time.
    #[error("Server call timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or protocol failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with something unparseable.
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),
}

/// Server response body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerVerdict {
    /// Whether the server accepted the request.
    pub success: bool,
    /// Amount the server is willing to credit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<u32>,
    /// Free-form refusal reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether the server flagged the request.
    #[serde(default)]
    pub suspicious: bool,
}

/// Payload sent to [`VERIFY_COMPLETION_PATH`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    /// Signed request with the locally credited amount.
    pub request: SignedRequest,
    /// Session the completion belongs to.
    pub session_id: String,
    /// Ad unit reported by the SDK.
    pub ad_unit_id: String,
    /// Reward value the SDK reported.
    pub reported_reward: i64,
    /// Measured dwell time in milliseconds.
    pub view_time_ms: i64,
}

impl CompletionReport {
    /// Build a report from a local completion receipt.
    pub fn from_receipt(receipt: &CompletionRecord, reported_reward: i64) -> Self {
        Self {
            request: receipt.request.clone(),
            session_id: receipt.session_id.clone(),
            ad_unit_id: receipt.ad_unit_id.clone(),
            reported_reward,
            view_time_ms: receipt.view_time_ms,
        }
    }
}

/// Telemetry about a suspicious event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreatReport {
    /// Device that triggered the event.
    pub device_fingerprint: FingerprintId,
    /// Event kind.
    pub activity_type: String,
    /// Structured context.
    pub details: Value,
    /// When the event happened, in Unix milliseconds.
    pub timestamp: i64,
}

impl From<&SuspiciousActivityRecord> for ThreatReport {
    fn from(record: &SuspiciousActivityRecord) -> Self {
        Self {
            device_fingerprint: record.device_fingerprint.clone(),
            activity_type: record.activity_type.clone(),
            details: record.details.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// An authoritative server that re-validates client decisions.
#[async_trait]
pub trait AuthoritativeValidator: Send + Sync {
    /// Re-validate a signed token request.
    async fn validate_token_request(
        &self,
        request: &SignedRequest,
    ) -> Result<ServerVerdict, RemoteError>;

    /// Re-validate a credited completion.
    async fn verify_ad_completion(
        &self,
        report: &CompletionReport,
    ) -> Result<ServerVerdict, RemoteError>;

    /// Submit a threat report.
    async fn report_threat(&self, report: &ThreatReport) -> Result<(), RemoteError>;
}

/// Applies timeout and fallback policy to an [`AuthoritativeValidator`].
#[derive(Clone)]
pub struct RemoteGate {
    validator: Arc<dyn AuthoritativeValidator>,
    timeout: Duration,
}

impl std::fmt::Debug for RemoteGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGate")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteGate {
    /// Wrap `validator` using the configured timeout.
    pub fn new(validator: Arc<dyn AuthoritativeValidator>, config: &RemoteConfig) -> Self {
        Self {
            validator,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Confirm a locally credited completion with the server.
    ///
    /// A local rejection is returned unchanged without contacting the
    /// server. Any server failure denies with `server_unavailable`.
    pub async fn confirm_completion(&self, local: Verdict, report: &CompletionReport) -> Verdict {
        if !local.is_valid {
            return local;
        }

        match self
            .call(self.validator.verify_ad_completion(report))
            .await
        {
            Ok(server) if server.success => {
                debug!(session_id = %report.session_id, "Server confirmed completion");
                if server.suspicious {
                    local.flagged()
                } else {
                    local
                }
            }
            Ok(server) => {
                warn!(
                    session_id = %report.session_id,
                    reason = server.reason.as_deref().unwrap_or("unspecified"),
                    "Server rejected completion"
                );
                Verdict {
                    suspicious: server.suspicious,
                    ..Verdict::denied(DenialReason::ServerRejected)
                }
            }
            Err(e) => {
                warn!(
                    session_id = %report.session_id,
                    error = %e,
                    "Server unavailable, denying completion"
                );
                Verdict::denied(DenialReason::ServerUnavailable)
            }
        }
    }

    /// Confirm a locally validated token request with the server.
    ///
    /// Falls back to the local verdict when the server is unreachable.
    pub async fn confirm_token_request(&self, local: Verdict, request: &SignedRequest) -> Verdict {
        if !local.is_valid {
            return local;
        }

        match self
            .call(self.validator.validate_token_request(request))
            .await
        {
            Ok(server) if server.success => local,
            Ok(server) => {
                warn!(
                    task_type = %request.task_type,
                    reason = server.reason.as_deref().unwrap_or("unspecified"),
                    "Server rejected token request"
                );
                Verdict {
                    suspicious: server.suspicious,
                    ..Verdict::denied(DenialReason::ServerRejected)
                }
            }
            Err(e) => {
                warn!(
                    task_type = %request.task_type,
                    error = %e,
                    "Server unavailable, using local verdict (degraded mode)"
                );
                local
            }
        }
    }

    /// Send a threat report in the background.
    ///
    /// Never blocks the caller. Outside a tokio runtime the report is dropped.
    pub fn report_threat(&self, report: ThreatReport) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(activity = %report.activity_type, "No runtime, threat report dropped");
                return;
            }
        };

        let validator = Arc::clone(&self.validator);
        let timeout = self.timeout;
        handle.spawn(async move {
            match tokio::time::timeout(timeout, validator.report_threat(&report)).await {
                Ok(Ok(())) => debug!(activity = %report.activity_type, "Threat reported"),
                Ok(Err(e)) => warn!(error = %e, "Threat report failed"),
                Err(_) => warn!(?timeout, "Threat report timed out"),
            }
        });
    }

    async fn call<F>(&self, fut: F) -> Result<ServerVerdict, RemoteError>
    where
        F: std::future::Future<Output = Result<ServerVerdict, RemoteError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout))?
    }
}
