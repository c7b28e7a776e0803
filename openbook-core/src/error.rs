//! Error types for agents and LLM calls.

use thiserror::Error;

/// Errors from the LLM client.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LlmError {
    /// No API key was provided.
    #[error("API key is missing or empty")]
    MissingApiKey,

    /// The request was rejected before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP transport failed (connection, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The API returned 429.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The request exceeded the configured timeout.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// The response carried no usable text.
    #[error("Response contained no content")]
    NoContent,

    /// The response could not be decoded.
    #[error("Failed to process response: {0}")]
    ResponseProcessing(String),

    /// The request was cancelled.
    #[error("LLM request was cancelled")]
    Cancelled,
}

impl LlmError {
    /// Whether a retry might succeed.
    ///
    /// Timeouts, rate limits, transport failures, and server errors (5xx)
    /// are transient; everything else fails the same way on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::RateLimited(_) | LlmError::Http(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors from agent execution.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AgentError {
    /// The underlying LLM call failed.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The per-example deadline elapsed before the agent answered.
    #[error("Agent timed out after {elapsed_ms}ms (limit {timeout_ms}ms)")]
    Timeout { elapsed_ms: u64, timeout_ms: u64 },

    /// The run was cancelled before this example completed.
    #[error("Agent execution was cancelled")]
    Cancelled,

    /// The model replied but no option letter could be extracted.
    #[error("No option letter found in model output")]
    MalformedOutput { raw: String },

    /// Agent configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Anything that doesn't fit the other variants.
    #[error("Agent error: {0}")]
    Other(String),
}

impl AgentError {
    /// Whether this error was caused by a timeout at any layer.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AgentError::Timeout { .. } | AgentError::Llm(LlmError::Timeout(_))
        )
    }

    /// Whether this error was caused by cancellation at any layer.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            AgentError::Cancelled | AgentError::Llm(LlmError::Cancelled)
        )
    }

    /// The raw model output, when the failure was an unparseable reply.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            AgentError::MalformedOutput { raw } => Some(raw),
            _ => None,
        }
    }
}
