//! LLM client for OpenAI-compatible chat completion APIs.
//!
//! [`LlmClient`] owns the HTTP transport, retry policy, and per-attempt
//! timeout. Agents never talk to the network directly; they build an
//! [`LlmRequest`] and call [`LlmClient::generate`] or
//! [`LlmClient::generate_with_cancellation`].

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::mock_llm::MockTransport;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// A single-turn generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// The user prompt.
    pub prompt: String,

    /// Optional system prompt, sent as the first message.
    pub system: Option<String>,

    /// Optional sampling seed, forwarded to providers that support it.
    pub seed: Option<u64>,
}

impl LlmRequest {
    /// Create a request with just a user prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            seed: None,
        }
    }

    /// Create a request with a user prompt and a system prompt.
    pub fn with_system(prompt: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: Some(system.into()),
            seed: None,
        }
    }

    /// Attach a sampling seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Token counts reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,

    /// Token usage, when the API reported it.
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// Total tokens consumed by the request, when reported.
    pub fn total_tokens(&self) -> Option<u32> {
        self.usage.map(|usage| usage.total_tokens)
    }
}

// Wire format for the chat completions endpoint.

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

enum Transport {
    Http {
        http: reqwest::Client,
        api_key: String,
    },
    Mock(MockTransport),
}

/// Client for an OpenAI-compatible chat completion API.
///
/// Wraps request construction, retries with exponential backoff, a
/// per-attempt timeout, and cooperative cancellation.
///
/// # Example
///
/// ```no_run
/// use openbook_core::{LlmClient, LlmConfig, LlmRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = LlmClient::new("api-key", LlmConfig::default())?;
/// let response = client.generate(LlmRequest::new("What is Rust?")).await?;
/// println!("{}", response.text);
/// # Ok(())
/// # }
/// ```
pub struct LlmClient {
    transport: Transport,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a client that talks to the API at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] if the key is empty.
    pub fn new(api_key: impl Into<String>, config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self {
            transport: Transport::Http {
                http: reqwest::Client::new(),
                api_key,
            },
            config,
        })
    }

    pub(crate) fn from_mock(mock: MockTransport, config: LlmConfig) -> Self {
        Self {
            transport: Transport::Mock(mock),
            config,
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Generate a response, retrying retryable failures with backoff.
    pub async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        Self::validate_request(&request)?;

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            match self.generate_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    log::warn!(
                        "LLM request failed (attempt {}/{}): {}, retrying...",
                        attempt + 1,
                        self.config.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                    tokio::time::sleep(self.config.retry_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::ResponseProcessing("Retry loop exited unexpectedly".to_string())
        }))
    }

    /// Generate a response, aborting as soon as the token is cancelled.
    ///
    /// Cancellation is checked before each attempt and raced against both
    /// the request itself and the backoff sleeps.
    pub async fn generate_with_cancellation(
        &self,
        request: LlmRequest,
        cancellation_token: &CancellationToken,
    ) -> Result<LlmResponse, LlmError> {
        Self::validate_request(&request)?;

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if cancellation_token.is_cancelled() {
                return Err(LlmError::Cancelled);
            }

            let result = tokio::select! {
                result = self.generate_once(&request) => result,
                _ = cancellation_token.cancelled() => return Err(LlmError::Cancelled),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    log::warn!(
                        "LLM request failed (attempt {}/{}): {}, retrying...",
                        attempt + 1,
                        self.config.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.retry_delay(attempt)) => {}
                        _ = cancellation_token.cancelled() => return Err(LlmError::Cancelled),
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::ResponseProcessing("Retry loop exited unexpectedly".to_string())
        }))
    }

    /// One attempt, bounded by the configured timeout.
    async fn generate_once(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let timeout = self.config.timeout;
        match tokio::time::timeout(timeout, self.dispatch(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn dispatch(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.transport {
            Transport::Http { http, api_key } => self.generate_http(http, api_key, request).await,
            Transport::Mock(mock) => mock.generate(request).await,
        }
    }

    async fn generate_http(
        &self,
        http: &reqwest::Client,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = build_chat_request(&self.config, request);

        let response = http
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited(message));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseProcessing(e.to_string()))?;

        extract_response(parsed)
    }

    fn validate_request(request: &LlmRequest) -> Result<(), LlmError> {
        if request.prompt.trim().is_empty() {
            return Err(LlmError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transport = match &self.transport {
            Transport::Http { .. } => "Http { api_key: [REDACTED] }",
            Transport::Mock(_) => "Mock",
        };
        f.debug_struct("LlmClient")
            .field("transport", &transport)
            .field("config", &self.config)
            .finish()
    }
}

fn build_chat_request<'a>(config: &'a LlmConfig, request: &'a LlmRequest) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: &request.prompt,
    });

    ChatRequest {
        model: &config.model,
        messages,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        seed: request.seed,
    }
}

fn extract_response(response: ChatResponse) -> Result<LlmResponse, LlmError> {
    let ChatResponse { choices, usage } = response;
    let text = choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::NoContent);
    }

    Ok(LlmResponse { text, usage })
}
