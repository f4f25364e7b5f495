//! Gemini GenerateContent client.
//!
//! Speaks the computer-use wire protocol: ordered conversation contents with
//! `text` / `functionCall` / `functionResponse` parts (screenshots as inline
//! base64 PNG blobs), a computer-use tool block naming the browser
//! environment, function declarations for registered custom actions, and
//! generation parameters. Finish reasons, prompt feedback and usage metadata
//! come back on the response.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use browserpilot_core::content::{ActionProposal, OutcomePayload, Part, Role, Turn};
use browserpilot_core::decision::{
    Candidate, DecisionClient, DecisionRequest, DecisionResponse, FinishReason, PromptFeedback,
    Usage,
};
use browserpilot_core::GatewayError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const BROWSER_ENVIRONMENT: &str = "ENVIRONMENT_BROWSER";

/// HTTP client for the GenerateContent decision service.
pub struct GeminiClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| GatewayError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert conversation turns to wire contents.
    fn to_api_contents(turns: &[Turn]) -> Vec<ApiContent> {
        turns
            .iter()
            .map(|turn| ApiContent {
                role: match turn.role {
                    Role::Model => "model".into(),
                    Role::User => "user".into(),
                },
                parts: turn.parts.iter().map(Self::to_api_part).collect(),
            })
            .collect()
    }

    fn to_api_part(part: &Part) -> ApiPart {
        match part {
            Part::Text(text) => ApiPart {
                text: Some(text.clone()),
                ..ApiPart::default()
            },
            Part::Proposal(fc) => ApiPart {
                function_call: Some(ApiFunctionCall {
                    name: fc.name.clone(),
                    args: fc.args.clone(),
                }),
                ..ApiPart::default()
            },
            Part::Outcome(outcome) => {
                let (response, blobs) = match &outcome.payload {
                    OutcomePayload::Browser { url, screenshot } => {
                        let mut response = serde_json::Map::new();
                        response.insert("url".into(), serde_json::Value::String(url.clone()));
                        if outcome.safety_acknowledged {
                            response.insert(
                                "safety_acknowledgement".into(),
                                serde_json::Value::String("true".into()),
                            );
                        }
                        let blobs = screenshot.as_ref().map(|png| {
                            vec![ApiFunctionResponsePart {
                                inline_data: ApiBlob {
                                    mime_type: "image/png".into(),
                                    data: BASE64.encode(png),
                                },
                            }]
                        });
                        (serde_json::Value::Object(response), blobs)
                    }
                    OutcomePayload::Custom(value) => (value.clone(), None),
                };
                ApiPart {
                    function_response: Some(ApiFunctionResponse {
                        name: outcome.action.clone(),
                        response,
                        parts: blobs,
                    }),
                    ..ApiPart::default()
                }
            }
        }
    }

    /// Rebuild a model turn from wire content.
    fn from_api_content(content: ApiContent) -> Turn {
        let parts = content
            .parts
            .into_iter()
            .filter_map(|part| {
                if let Some(text) = part.text {
                    Some(Part::Text(text))
                } else {
                    part.function_call
                        .map(|fc| Part::Proposal(ActionProposal::new(fc.name, fc.args)))
                }
            })
            .collect();
        Turn {
            role: Role::Model,
            parts,
        }
    }
}

#[async_trait]
impl DecisionClient for GeminiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: DecisionRequest) -> Result<DecisionResponse, GatewayError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let mut tools = vec![ApiTool {
            computer_use: Some(ApiComputerUse {
                environment: BROWSER_ENVIRONMENT.into(),
            }),
            function_declarations: None,
        }];
        if !request.custom_actions.is_empty() {
            tools.push(ApiTool {
                computer_use: None,
                function_declarations: Some(
                    request
                        .custom_actions
                        .iter()
                        .map(|a| ApiFunctionDeclaration {
                            name: a.name.clone(),
                            description: a.description.clone(),
                            parameters: a.parameters.clone(),
                        })
                        .collect(),
                ),
            });
        }

        let body = ApiRequest {
            contents: Self::to_api_contents(&request.turns),
            tools,
            generation_config: ApiGenerationConfig {
                temperature: request.generation.temperature,
                top_p: request.generation.top_p,
                top_k: request.generation.top_k,
                max_output_tokens: request.generation.max_output_tokens,
            },
        };

        debug!(model = %request.model, turns = request.turns.len(), "Sending generate request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(e.to_string())
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GatewayError::RateLimited(
                "Decision service rate limit or quota exhausted".into(),
            ));
        }
        if status == 401 || status == 403 {
            return Err(GatewayError::AuthenticationFailed(
                "Invalid or missing API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Decision service error");
            return Err(GatewayError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: ApiResponse = response.json().await.map_err(|e| GatewayError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        if let Some(usage) = &api_resp.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                candidate_tokens = usage.candidates_token_count,
                "Usage metadata"
            );
        }

        Ok(DecisionResponse {
            candidates: api_resp
                .candidates
                .into_iter()
                .map(|c| Candidate {
                    turn: c.content.map(Self::from_api_content),
                    finish_reason: c.finish_reason.as_deref().map(FinishReason::parse),
                })
                .collect(),
            feedback: api_resp.prompt_feedback.map(|f| PromptFeedback {
                block_reason: f.block_reason,
                block_reason_message: f.block_reason_message,
            }),
            usage: api_resp.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                candidate_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }
}

// --- Wire format ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    tools: Vec<ApiTool>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    role: String,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parts: Option<Vec<ApiFunctionResponsePart>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFunctionResponsePart {
    inline_data: ApiBlob,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    computer_use: Option<ApiComputerUse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    function_declarations: Option<Vec<ApiFunctionDeclaration>>,
}

#[derive(Debug, Serialize)]
struct ApiComputerUse {
    environment: String,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,

    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,

    #[serde(default)]
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,

    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,

    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,

    #[serde(default)]
    candidates_token_count: u32,

    #[serde(default)]
    total_token_count: u32,
}
