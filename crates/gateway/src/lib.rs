//! Decision service gateway.
//!
//! [`GeminiClient`] speaks the GenerateContent-style wire protocol over HTTP;
//! [`RetryingClient`] wraps any [`DecisionClient`] with exponential backoff
//! and failure classification. [`build_from_config`] assembles the standard
//! stacked pair from configuration.
//!
//! [`DecisionClient`]: browserpilot_core::DecisionClient

use browserpilot_config::AppConfig;
use browserpilot_core::GatewayError;
use std::sync::Arc;

pub mod gemini;
pub mod retry;

pub use gemini::GeminiClient;
pub use retry::{RetryPolicy, RetryingClient};

/// Build the client stack from configuration: a [`GeminiClient`] pointed at
/// the configured endpoint, wrapped in a [`RetryingClient`] carrying the
/// `[retry]` section's backoff policy.
pub fn build_from_config(config: &AppConfig) -> Result<RetryingClient, GatewayError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| GatewayError::AuthenticationFailed("No API key configured".into()))?;

    let mut client = GeminiClient::new(api_key)?;
    if let Some(base_url) = &config.base_url {
        client = client.with_base_url(base_url);
    }

    Ok(RetryingClient::new(Arc::new(client)).with_policy(RetryPolicy::from(&config.retry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn build_requires_api_key() {
        let config = AppConfig::default();
        let err = build_from_config(&config).unwrap_err();
        assert!(matches!(err, GatewayError::AuthenticationFailed(_)));
    }

    #[test]
    fn build_carries_retry_section_into_policy() {
        let mut config = AppConfig {
            api_key: Some("test-key".into()),
            ..AppConfig::default()
        };
        config.retry.max_retries = 2;
        config.retry.base_delay_secs = 4;

        let client = build_from_config(&config).unwrap();
        assert_eq!(client.policy().max_retries, 2);
        assert_eq!(client.policy().base_delay, Duration::from_secs(4));
    }
}
