//! The agent abstraction.
//!
//! An agent turns one [`Example`] into an answer label. Strategies differ
//! in how they prompt the model and parse its reply, but they all share
//! this interface so the evaluation harness can drive any of them.

use crate::error::AgentError;
use crate::example::{Example, Label};
use crate::llm::LlmClient;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`Agent::answer`].
pub type AnswerFuture<'a> = Pin<Box<dyn Future<Output = Result<AgentReply, AgentError>> + Send + 'a>>;

/// An answering strategy for multiple-choice questions.
///
/// Implementations must be `Send + Sync` so the harness can evaluate
/// examples concurrently.
pub trait Agent: Send + Sync {
    /// Short identifier used in reports and logs.
    fn name(&self) -> &str;

    /// Human-readable description of the strategy.
    fn description(&self) -> &str;

    /// Answer a single example.
    ///
    /// The future borrows only the agent; implementations should extract
    /// what they need from `example` before going async.
    fn answer(&self, example: &Example, context: AgentContext) -> AnswerFuture<'_>;
}

/// A single answer from an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    /// The chosen option.
    pub label: Label,

    /// The verbatim model output the label was extracted from.
    pub raw_output: String,

    /// Tokens consumed producing this answer, when reported.
    pub tokens_used: Option<u32>,
}

/// Shared resources handed to an agent for one example.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// Client for LLM calls.
    pub llm: Arc<LlmClient>,

    /// Seed for this example. Forwarded to the provider so reruns with the
    /// same seed see the same sampling.
    pub seed: u64,

    /// Token the harness cancels to stop in-flight work.
    pub cancellation_token: CancellationToken,
}

impl AgentContext {
    /// Create a context owning the client, with seed 0 and a fresh token.
    pub fn new(llm: LlmClient) -> Self {
        Self::from_arc(Arc::new(llm))
    }

    /// Create a context from an already shared client.
    pub fn from_arc(llm: Arc<LlmClient>) -> Self {
        Self {
            llm,
            seed: 0,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Set the seed for this example.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::mock_llm::MockLlm;

    struct FixedAgent;

    impl Agent for FixedAgent {
        fn name(&self) -> &str {
            "fixed"
        }

        fn description(&self) -> &str {
            "Always answers A"
        }

        fn answer(&self, _example: &Example, _context: AgentContext) -> AnswerFuture<'_> {
            Box::pin(async {
                Ok(AgentReply {
                    label: Label::A,
                    raw_output: "A".to_string(),
                    tokens_used: None,
                })
            })
        }
    }

    fn mock_context() -> AgentContext {
        AgentContext::new(MockLlm::new().into_client(LlmConfig::default()))
    }

    #[test]
    fn test_context_defaults() {
        let context = mock_context();
        assert_eq!(context.seed, 0);
        assert!(!context.cancellation_token.is_cancelled());
    }

    #[test]
    fn test_context_builders() {
        let token = CancellationToken::new();
        let context = mock_context().with_seed(7).with_cancellation(token.clone());

        assert_eq!(context.seed, 7);
        token.cancel();
        assert!(context.cancellation_token.is_cancelled());
    }

    #[test]
    fn test_context_clone_shares_client() {
        let context = mock_context();
        let clone = context.clone();
        assert!(Arc::ptr_eq(&context.llm, &clone.llm));
    }

    #[tokio::test]
    async fn test_agent_is_object_safe() {
        let agent: Box<dyn Agent> = Box::new(FixedAgent);
        assert_eq!(agent.name(), "fixed");

        let example = Example::new(
            "q1",
            "Pick one",
            vec!["first".to_string(), "second".to_string()],
            Label::A,
        );
        let reply = agent.answer(&example, mock_context()).await.unwrap();
        assert_eq!(reply.label, Label::A);
    }
}
