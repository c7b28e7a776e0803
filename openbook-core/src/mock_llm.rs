//! Scripted LLM client for tests.
//!
//! [`MockLlm`] builds an [`LlmClient`] that replays a fixed sequence of
//! replies instead of calling the network. Each `generate` call consumes
//! the next scripted reply; once the script is exhausted, further calls
//! fail with [`LlmError::NoContent`].
//!
//! # Example
//!
//! ```
//! use openbook_core::{LlmConfig, MockLlm};
//!
//! let client = MockLlm::new()
//!     .reply("B")
//!     .fail_with_status(503)
//!     .into_client(LlmConfig::default());
//! ```

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::{LlmClient, LlmRequest, LlmResponse, TokenUsage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Status(u16),
    Delayed { text: String, delay: Duration },
}

/// Builder for a scripted [`LlmClient`].
#[derive(Debug, Default)]
pub struct MockLlm {
    replies: Vec<MockReply>,
}

impl MockLlm {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful text reply.
    #[must_use]
    pub fn reply(mut self, text: impl Into<String>) -> Self {
        self.replies.push(MockReply::Text(text.into()));
        self
    }

    /// Script a reply that arrives after `delay`. Useful for exercising
    /// timeouts and cancellation.
    #[must_use]
    pub fn reply_after(mut self, text: impl Into<String>, delay: Duration) -> Self {
        self.replies.push(MockReply::Delayed {
            text: text.into(),
            delay,
        });
        self
    }

    /// Script an API failure with the given HTTP status.
    #[must_use]
    pub fn fail_with_status(mut self, status: u16) -> Self {
        self.replies.push(MockReply::Status(status));
        self
    }

    /// Finish the script and wrap it in a client.
    pub fn into_client(self, config: LlmConfig) -> LlmClient {
        LlmClient::from_mock(
            MockTransport {
                replies: self.replies,
                cursor: AtomicUsize::new(0),
            },
            config,
        )
    }
}

pub(crate) struct MockTransport {
    replies: Vec<MockReply>,
    cursor: AtomicUsize,
}

impl MockTransport {
    pub(crate) async fn generate(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(index) {
            Some(MockReply::Text(text)) => Ok(mock_response(text)),
            Some(MockReply::Delayed { text, delay }) => {
                tokio::time::sleep(*delay).await;
                Ok(mock_response(text))
            }
            Some(MockReply::Status(429)) => {
                Err(LlmError::RateLimited("mock rate limit".to_string()))
            }
            Some(MockReply::Status(status)) => Err(LlmError::Api {
                status: *status,
                message: "mock API error".to_string(),
            }),
            None => Err(LlmError::NoContent),
        }
    }
}

fn mock_response(text: &str) -> LlmResponse {
    LlmResponse {
        text: text.to_string(),
        usage: Some(TokenUsage {
            prompt_tokens: 12,
            completion_tokens: 4,
            total_tokens: 16,
        }),
    }
}
