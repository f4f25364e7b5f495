//! The safety confirmation gate.
//!
//! The decision service flags risky proposals by attaching a
//! `safety_decision` entry to the action's arguments. The gate validates the
//! payload, asks a pluggable [`ConfirmationPolicy`] for approval, and bounds
//! the wait: an expired or declined confirmation terminates the whole loop.

use async_trait::async_trait;
use browserpilot_core::AgentError;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The only decision literal the service is known to emit.
const REQUIRE_CONFIRMATION: &str = "require_confirmation";

/// Default bound on how long the gate waits for a policy answer.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Terminal decisions of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// The action may proceed; its result carries an acknowledgment flag.
    Continue,
    /// The whole loop ends, before remaining proposals in the step run.
    Terminate,
}

/// The safety payload attached to a flagged proposal.
#[derive(Debug, Clone, Deserialize)]
pub struct SafetyDecision {
    pub decision: String,

    #[serde(default)]
    pub explanation: Option<String>,
}

/// How a front end answers a confirmation request: blocking terminal prompt,
/// modal dialog, auto-approve policy. Must answer `true` to proceed.
#[async_trait]
pub trait ConfirmationPolicy: Send + Sync {
    async fn confirm(&self, explanation: &str) -> bool;
}

/// Approves everything. For unattended runs that accept the risk.
pub struct AutoApprove;

#[async_trait]
impl ConfirmationPolicy for AutoApprove {
    async fn confirm(&self, _explanation: &str) -> bool {
        true
    }
}

/// Declines everything. The safe default for headless environments.
pub struct AutoDeny;

#[async_trait]
impl ConfirmationPolicy for AutoDeny {
    async fn confirm(&self, _explanation: &str) -> bool {
        false
    }
}

/// The approval checkpoint in front of the dispatcher.
pub struct SafetyGate {
    policy: Arc<dyn ConfirmationPolicy>,
    timeout: Duration,
}

impl SafetyGate {
    pub fn new(policy: Arc<dyn ConfirmationPolicy>) -> Self {
        Self {
            policy,
            timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the payload and obtain a verdict.
    ///
    /// Fails with [`AgentError::InvalidSafetyDecision`] when the decision
    /// literal is unrecognized. A policy that does not answer within the
    /// bound defaults to [`SafetyVerdict::Terminate`].
    pub async fn confirm(&self, payload: &serde_json::Value) -> Result<SafetyVerdict, AgentError> {
        let safety: SafetyDecision = serde_json::from_value(payload.clone())
            .map_err(|e| AgentError::MalformedSafetyPayload(e.to_string()))?;

        if safety.decision != REQUIRE_CONFIRMATION {
            return Err(AgentError::InvalidSafetyDecision(safety.decision));
        }

        let explanation = safety.explanation.unwrap_or_default();
        warn!(%explanation, "Safety service requires explicit confirmation");

        let verdict = match tokio::time::timeout(self.timeout, self.policy.confirm(&explanation))
            .await
        {
            Ok(true) => SafetyVerdict::Continue,
            Ok(false) => SafetyVerdict::Terminate,
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Confirmation timed out, terminating"
                );
                SafetyVerdict::Terminate
            }
        };

        info!(?verdict, "Safety confirmation resolved");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn approval_continues() {
        let gate = SafetyGate::new(Arc::new(AutoApprove));
        let verdict = gate
            .confirm(&json!({
                "decision": "require_confirmation",
                "explanation": "This will submit a form"
            }))
            .await
            .unwrap();
        assert_eq!(verdict, SafetyVerdict::Continue);
    }

    #[tokio::test]
    async fn decline_terminates() {
        let gate = SafetyGate::new(Arc::new(AutoDeny));
        let verdict = gate
            .confirm(&json!({"decision": "require_confirmation"}))
            .await
            .unwrap();
        assert_eq!(verdict, SafetyVerdict::Terminate);
    }

    #[tokio::test]
    async fn unknown_decision_literal_is_fatal() {
        let gate = SafetyGate::new(Arc::new(AutoApprove));
        let err = gate
            .confirm(&json!({"decision": "ask_nicely"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidSafetyDecision(d) if d == "ask_nicely"));
    }

    #[tokio::test]
    async fn malformed_payload_is_fatal() {
        let gate = SafetyGate::new(Arc::new(AutoApprove));
        let err = gate.confirm(&json!("not an object")).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedSafetyPayload(_)));
    }

    /// A policy that never answers.
    struct NeverAnswers;

    #[async_trait]
    impl ConfirmationPolicy for NeverAnswers {
        async fn confirm(&self, _explanation: &str) -> bool {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_defaults_to_terminate() {
        let gate = SafetyGate::new(Arc::new(NeverAnswers));
        let verdict = gate
            .confirm(&json!({"decision": "require_confirmation"}))
            .await
            .unwrap();
        assert_eq!(verdict, SafetyVerdict::Terminate);
    }
}
