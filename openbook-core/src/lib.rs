//! # OpenBook Core
//!
//! Core types for building and evaluating multiple-choice QA agents.
//!
//! This crate defines the shared vocabulary of the workspace: the example
//! data model, the agent contract, and the LLM client agents answer through.
//!
//! ## Architecture
//!
//! - **Examples**: [`Example`] and [`Label`] model OpenBookQA-style questions with lettered options
//! - **Agents**: the [`Agent`] trait plus [`AgentContext`] carry the LLM client, seed, and cancellation token into a strategy
//! - **LLM client**: [`LlmClient`] speaks the OpenAI-compatible chat completions protocol with retries, timeouts, and cancellation
//! - **Mocking**: [`MockLlm`] scripts client replies for tests
//!
//! ## Example
//!
//! ```no_run
//! use openbook_core::{AgentContext, LlmClient, LlmConfig, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LlmClient::new("api-key", LlmConfig::default())?;
//! let response = client.generate(LlmRequest::new("What is Rust?")).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod example;
pub mod llm;
pub mod mock_llm;

// Re-export public API
pub use agent::{Agent, AgentContext, AgentReply, AnswerFuture};
pub use config::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{AgentError, LlmError};
pub use example::{
    answer_line_letter, leading_letter, scan_letter, Example, Label, ParseLabelError,
};
pub use llm::{LlmClient, LlmRequest, LlmResponse, TokenUsage};
pub use mock_llm::MockLlm;
