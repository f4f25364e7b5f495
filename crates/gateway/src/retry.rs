//! Retry decorator for the decision service.
//!
//! Retries any failure with exponential backoff, classifying first:
//! authentication failures are fatal and re-raised immediately, rate limits
//! get a warning but still back off and retry, and the last failure is
//! re-raised to the caller once attempts are exhausted.

use async_trait::async_trait;
use browserpilot_core::decision::{DecisionClient, DecisionRequest, DecisionResponse};
use browserpilot_core::GatewayError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Backoff parameters. Attempt `n` (0-based) sleeps `base_delay * 2^n` before
/// the next try.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl From<&browserpilot_config::RetrySettings> for RetryPolicy {
    fn from(settings: &browserpilot_config::RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_secs(settings.base_delay_secs),
        }
    }
}

/// A [`DecisionClient`] decorator adding retry with backoff.
pub struct RetryingClient {
    inner: Arc<dyn DecisionClient>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn DecisionClient>) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl DecisionClient for RetryingClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: DecisionRequest) -> Result<DecisionResponse, GatewayError> {
        let mut last_error = GatewayError::Network("no attempts made".into());

        for attempt in 0..self.policy.max_retries {
            debug!(
                client = %self.inner.name(),
                attempt = attempt + 1,
                total = self.policy.max_retries,
                "Requesting decision"
            );
            let start = Instant::now();

            match self.inner.generate(request.clone()).await {
                Ok(response) => {
                    info!(
                        client = %self.inner.name(),
                        attempt = attempt + 1,
                        latency_ms = start.elapsed().as_millis() as u64,
                        candidates = response.candidates.len(),
                        "Decision received"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    // Classify before deciding whether to retry.
                    if e.is_fatal() {
                        error!(client = %self.inner.name(), error = %e, "Fatal gateway error, not retrying");
                        return Err(e);
                    }
                    if matches!(e, GatewayError::RateLimited(_)) {
                        warn!(client = %self.inner.name(), error = %e, "Rate limited, backing off");
                    }

                    warn!(
                        client = %self.inner.name(),
                        attempt = attempt + 1,
                        total = self.policy.max_retries,
                        error = %e,
                        "Decision request failed"
                    );
                    last_error = e;

                    if attempt + 1 < self.policy.max_retries {
                        let delay = self.policy.delay_for(attempt);
                        info!(delay_secs = delay.as_secs(), "Retrying after backoff");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!(
            client = %self.inner.name(),
            attempts = self.policy.max_retries,
            error = %last_error,
            "Decision request failed after all attempts"
        );
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browserpilot_core::decision::GenerationConfig;
    use std::sync::Mutex;
    use tokio::time::Instant as TokioInstant;

    /// Fails a fixed number of times, then succeeds.
    struct FlakyClient {
        failures: u32,
        error: GatewayError,
        calls: Mutex<u32>,
    }

    impl FlakyClient {
        fn new(failures: u32, error: GatewayError) -> Self {
            Self {
                failures,
                error,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DecisionClient for FlakyClient {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(
            &self,
            _request: DecisionRequest,
        ) -> Result<DecisionResponse, GatewayError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.failures {
                Err(self.error.clone())
            } else {
                Ok(DecisionResponse {
                    candidates: vec![],
                    feedback: None,
                    usage: None,
                })
            }
        }
    }

    fn request() -> DecisionRequest {
        DecisionRequest {
            model: "test-model".into(),
            turns: vec![],
            generation: GenerationConfig::default(),
            custom_actions: vec![],
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt_makes_one_call() {
        let inner = Arc::new(FlakyClient::new(0, GatewayError::Network("x".into())));
        let client = RetryingClient::new(inner.clone());

        client.generate(request()).await.unwrap();
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sequence_doubles() {
        // 4 failures then success: waits of 1, 2, 4, 8 seconds before the 5th attempt.
        let inner = Arc::new(FlakyClient::new(
            4,
            GatewayError::ApiError {
                status_code: 500,
                message: "overloaded".into(),
            },
        ));
        let client = RetryingClient::new(inner.clone());

        let start = TokioInstant::now();
        client.generate(request()).await.unwrap();

        assert_eq!(inner.calls(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 4 + 8));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_reraise_last_error() {
        let inner = Arc::new(FlakyClient::new(
            u32::MAX,
            GatewayError::Network("refused".into()),
        ));
        let client = RetryingClient::new(inner.clone());

        let err = client.generate(request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)));
        assert_eq!(inner.calls(), 5);
    }

    #[tokio::test]
    async fn authentication_failure_short_circuits() {
        let inner = Arc::new(FlakyClient::new(
            u32::MAX,
            GatewayError::AuthenticationFailed("bad key".into()),
        ));
        let client = RetryingClient::new(inner.clone());

        let err = client.generate(request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::AuthenticationFailed(_)));
        // No second attempt, no backoff
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_still_retries() {
        let inner = Arc::new(FlakyClient::new(
            2,
            GatewayError::RateLimited("quota exceeded".into()),
        ));
        let client = RetryingClient::new(inner.clone());

        client.generate(request()).await.unwrap();
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_respected() {
        let inner = Arc::new(FlakyClient::new(
            u32::MAX,
            GatewayError::Network("down".into()),
        ));
        let client = RetryingClient::new(inner.clone()).with_policy(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
        });

        let start = TokioInstant::now();
        let _ = client.generate(request()).await;

        assert_eq!(inner.calls(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn delay_sequence() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..4).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 8]);
    }

    #[test]
    fn policy_built_from_config_settings() {
        let settings = browserpilot_config::RetrySettings {
            max_retries: 3,
            base_delay_secs: 7,
        };
        let policy = RetryPolicy::from(&settings);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn config_derived_policy_governs_attempts() {
        let inner = Arc::new(FlakyClient::new(
            u32::MAX,
            GatewayError::Network("down".into()),
        ));
        let settings = browserpilot_config::RetrySettings {
            max_retries: 2,
            base_delay_secs: 1,
        };
        let client = RetryingClient::new(inner.clone()).with_policy((&settings).into());

        let _ = client.generate(request()).await;
        assert_eq!(inner.calls(), 2);
    }
}
