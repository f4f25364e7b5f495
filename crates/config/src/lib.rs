//! Configuration loading and validation for browserpilot.
//!
//! Loads configuration from a TOML file with environment variable overrides
//! (`GEMINI_API_KEY` for the decision-service key). Validates all settings
//! before the agent loop starts.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for browserpilot_core::Error {
    fn from(e: ConfigError) -> Self {
        browserpilot_core::Error::Config {
            message: e.to_string(),
        }
    }
}

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Decision service API key. Overridden by `GEMINI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Decision service model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Custom decision service endpoint (proxies, test servers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Generation parameters.
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Retry behavior for the decision service gateway.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Agent loop behavior.
    #[serde(default)]
    pub agent: AgentSettings,
}

fn default_model() -> String {
    "gemini-2.5-computer-use-preview-10-2025".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
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

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts before giving up on the decision service.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay; attempt `n` waits `base_delay_secs * 2^n`.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_base_delay_secs() -> u64 {
    1
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Hard iteration ceiling, the safety net against runaway loops.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// How long the safety gate waits for confirmation before defaulting to
    /// terminate.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// How many recent user turns keep their screenshot bytes.
    #[serde(default = "default_recent_screenshot_turns")]
    pub recent_screenshot_turns: usize,
}

fn default_max_iterations() -> u32 {
    50
}
fn default_confirmation_timeout_secs() -> u64 {
    300
}
fn default_recent_screenshot_turns() -> usize {
    3
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            recent_screenshot_turns: default_recent_screenshot_turns(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: None,
            generation: GenerationSettings::default(),
            retry: RetrySettings::default(),
            agent: AgentSettings::default(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .field("retry", &self.retry)
            .field("agent", &self.agent)
            .finish()
    }
}

impl AppConfig {
    /// Load from a TOML file, apply env overrides, and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(model = %config.model, "Configuration loaded");
        Ok(config)
    }

    /// Defaults plus env overrides, for front ends that ship no config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("BROWSERPILOT_MODEL") {
            if !model.is_empty() {
                self.model = model;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.agent.recent_screenshot_turns == 0 {
            return Err(ConfigError::Invalid(
                "agent.recent_screenshot_turns must be at least 1".into(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_retries must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Invalid(format!(
                "generation.temperature must be in [0, 2], got {}",
                self.generation.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = AppConfig::default();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_secs, 1);
        assert_eq!(config.agent.max_iterations, 50);
        assert_eq!(config.agent.confirmation_timeout_secs, 300);
        assert_eq!(config.agent.recent_screenshot_turns, 3);
        assert_eq!(config.generation.max_output_tokens, 8192);
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
model = "test-model"

[agent]
max_iterations = 10
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.model, "test-model");
        assert_eq!(config.agent.max_iterations, 10);
        // Untouched sections keep defaults
        assert_eq!(config.agent.recent_screenshot_turns, 3);
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.generation.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.recent_screenshot_turns = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_error_aggregates_into_top_level_error() {
        let mut config = AppConfig::default();
        config.model = String::new();
        let err: browserpilot_core::Error = config.validate().unwrap_err().into();
        assert!(matches!(err, browserpilot_core::Error::Config { .. }));
        assert!(err.to_string().contains("model must not be empty"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("super-secret-key".into()),
            ..AppConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-key"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
