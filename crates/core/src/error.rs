//! Error types for the browserpilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum, aggregated at the top level.

use thiserror::Error;

/// The top-level error type for all browserpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Decision service gateway ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Action dispatch ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Agent loop / safety gate ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Configuration ---
    // Constructed via `From<ConfigError>` in browserpilot-config.
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the decision service.
///
/// Everything here is retryable with backoff except
/// [`GatewayError::AuthenticationFailed`], which the retry layer re-raises
/// immediately.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by decision service: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The response carried no candidates and no block reason.
    #[error("Empty response: {0}")]
    EmptyResponse(String),
}

impl GatewayError {
    /// Fatal errors are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::AuthenticationFailed(_))
    }
}

/// Failures while dispatching one action proposal.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// The proposal names neither a predefined browser action nor a
    /// registered custom action.
    #[error("Unsupported action: {0}")]
    Unsupported(String),

    #[error("Invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("Unknown scroll direction: {0}")]
    UnknownDirection(String),

    /// The capability failed mid-action. Not retried — actions are not
    /// assumed idempotent.
    #[error("Action execution failed: {action} — {reason}")]
    ExecutionFailed { action: String, reason: String },
}

/// Failures inside the agent loop proper.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The safety payload carried a decision literal other than
    /// `require_confirmation`.
    #[error("Unknown safety decision: {0}")]
    InvalidSafetyDecision(String),

    #[error("Malformed safety payload: {0}")]
    MalformedSafetyPayload(String),
}
