//! LLM client configuration.

use std::time::Duration;

/// Default model for chat completion requests.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for [`LlmClient`](crate::LlmClient).
///
/// # Example
///
/// ```
/// use openbook_core::LlmConfig;
/// use std::time::Duration;
///
/// let config = LlmConfig::default()
///     .with_model("gpt-4o")
///     .with_timeout(Duration::from_secs(60))
///     .with_max_retries(3);
///
/// assert_eq!(config.model, "gpt-4o");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Model identifier sent with every request.
    pub model: String,

    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,

    /// Maximum tokens the model may generate per request.
    pub max_tokens: u32,

    /// Timeout for a single request attempt.
    pub timeout: Duration,

    /// Sampling temperature. Zero keeps replies as deterministic as the
    /// provider allows.
    pub temperature: f32,

    /// Number of retries after a retryable failure.
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries.
    pub retry_base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 2048,
            timeout: Duration::from_secs(30),
            temperature: 0.0,
            max_retries: 2,
            retry_base_delay_ms: 1000,
        }
    }
}

impl LlmConfig {
    /// Set the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the maximum generated tokens per request.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the per-attempt request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the number of retries after a retryable failure.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff.
    #[must_use]
    pub fn with_retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }

    /// Delay before the next attempt, doubling per attempt and capped at
    /// one minute.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        const MAX_DELAY_MS: u64 = 60_000;

        let delay_ms = self
            .retry_base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(MAX_DELAY_MS);
        Duration::from_millis(delay_ms)
    }
}
