//! Decision service contract.
//!
//! A [`DecisionClient`] sends the accumulated conversation plus tool
//! declarations to the decision service and returns candidates carrying
//! reasoning text and action proposals. The concrete HTTP client and the
//! retry decorator live in `browserpilot-gateway`; the agent loop only sees
//! this trait.

use crate::content::Turn;
use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Generation parameters sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_temperature() -> f32 {
    1.0
}
fn default_top_p() -> f32 {
    0.95
}
fn default_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    8192
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// A custom (non-browser) action declared to the decision service, alongside
/// the built-in computer-use toolset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON Schema for the action's arguments.
    pub parameters: serde_json::Value,
}

/// One request to the decision service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub model: String,

    /// The ordered conversation so far.
    pub turns: Vec<Turn>,

    #[serde(default)]
    pub generation: GenerationConfig,

    /// Declarations for registered custom actions. The predefined browser
    /// toolset is always declared by the client implementation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_actions: Vec<ActionDeclaration>,
}

/// Why a candidate stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    /// The service emitted a function call it could not serialize; the caller
    /// should re-issue the same request.
    MalformedFunctionCall,
    Safety,
    Other(String),
}

impl FinishReason {
    /// Parse the wire literal, keeping unknown values intact.
    pub fn parse(s: &str) -> Self {
        match s {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::MaxTokens,
            "MALFORMED_FUNCTION_CALL" => FinishReason::MalformedFunctionCall,
            "SAFETY" => FinishReason::Safety,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One candidate answer from the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// The model's turn, absent when generation produced nothing usable.
    pub turn: Option<Turn>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Response-level feedback, carrying content-policy blocks that arrive
/// without any candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason_message: Option<String>,
}

impl PromptFeedback {
    pub fn is_blocked(&self) -> bool {
        self.block_reason.is_some()
    }
}

/// Token usage reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub candidate_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response: zero or more candidates plus response-level feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<PromptFeedback>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl DecisionResponse {
    /// Whether this response is a terminal content-policy rejection.
    pub fn is_safety_blocked(&self) -> bool {
        self.candidates.is_empty()
            && self.feedback.as_ref().is_some_and(|f| f.is_blocked())
    }
}

/// The decision service seam.
#[async_trait]
pub trait DecisionClient: Send + Sync {
    /// A human-readable name for this client (e.g. "gemini", "mock").
    fn name(&self) -> &str;

    /// Send a request and get the full response.
    async fn generate(&self, request: DecisionRequest) -> Result<DecisionResponse, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_defaults_match_protocol() {
        let cfg = GenerationConfig::default();
        assert!((cfg.temperature - 1.0).abs() < f32::EPSILON);
        assert!((cfg.top_p - 0.95).abs() < f32::EPSILON);
        assert_eq!(cfg.top_k, 40);
        assert_eq!(cfg.max_output_tokens, 8192);
    }

    #[test]
    fn finish_reason_parsing() {
        assert_eq!(FinishReason::parse("STOP"), FinishReason::Stop);
        assert_eq!(
            FinishReason::parse("MALFORMED_FUNCTION_CALL"),
            FinishReason::MalformedFunctionCall
        );
        assert_eq!(
            FinishReason::parse("RECITATION"),
            FinishReason::Other("RECITATION".into())
        );
    }

    #[test]
    fn safety_block_requires_empty_candidates_and_reason() {
        let blocked = DecisionResponse {
            candidates: vec![],
            feedback: Some(PromptFeedback {
                block_reason: Some("PROHIBITED_CONTENT".into()),
                block_reason_message: None,
            }),
            usage: None,
        };
        assert!(blocked.is_safety_blocked());

        let empty_no_reason = DecisionResponse {
            candidates: vec![],
            feedback: Some(PromptFeedback::default()),
            usage: None,
        };
        assert!(!empty_no_reason.is_safety_blocked());

        let with_candidate = DecisionResponse {
            candidates: vec![Candidate {
                turn: None,
                finish_reason: Some(FinishReason::Stop),
            }],
            feedback: Some(PromptFeedback {
                block_reason: Some("PROHIBITED_CONTENT".into()),
                block_reason_message: None,
            }),
            usage: None,
        };
        assert!(!with_candidate.is_safety_blocked());
    }
}
