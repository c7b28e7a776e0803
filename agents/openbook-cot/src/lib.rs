//! Chain-of-thought multiple-choice agent.
//!
//! Asks the model to reason about the options before committing to a letter,
//! and extracts the letter from the final `Answer:` line. Costs more tokens
//! than the direct agent; the reasoning text is kept in the prediction's raw
//! output so reports show how the model got there.
//!
//! # Example
//!
//! ```no_run
//! use openbook_core::{Agent, AgentContext, Example, Label, LlmClient, LlmConfig};
//! use openbook_cot::CotAgent;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = CotAgent::with_defaults()?;
//! let llm = LlmClient::new("api-key", LlmConfig::default())?;
//!
//! let example = Example::new(
//!     "q1",
//!     "Which surface is best for growing moss?",
//!     vec!["a dry rock".into(), "a damp log".into()],
//!     Label::B,
//! );
//! let reply = agent.answer(&example, AgentContext::new(llm)).await?;
//! println!("{}", reply.raw_output);
//! # Ok(())
//! # }
//! ```

use openbook_core::{
    answer_line_letter, leading_letter, scan_letter, Agent, AgentContext, AgentError, AgentReply,
    AnswerFuture, Example, Label, LlmRequest,
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for [`CotAgent`].
#[derive(Debug, Clone)]
pub struct CotConfig {
    /// System prompt framing the task.
    pub system_prompt: String,
}

impl Default for CotConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a careful multiple-choice solver. \
                            Think through the options step by step, then commit to one letter."
                .to_string(),
        }
    }
}

impl CotConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), AgentError> {
        let mut errors = Vec::new();

        if self.system_prompt.trim().is_empty() {
            errors.push("system_prompt must not be empty");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AgentError::InvalidConfig(errors.join("; ")))
        }
    }
}

// ============================================================================
// Agent Implementation
// ============================================================================

/// Agent that reasons step by step before answering.
pub struct CotAgent {
    config: CotConfig,
}

impl CotAgent {
    /// Create an agent, validating the configuration.
    pub fn new(config: CotConfig) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create an agent with the default configuration.
    pub fn with_defaults() -> Result<Self, AgentError> {
        Self::new(CotConfig::default())
    }

    pub fn config(&self) -> &CotConfig {
        &self.config
    }
}

impl Agent for CotAgent {
    fn name(&self) -> &str {
        "cot"
    }

    fn description(&self) -> &str {
        "Reasons step by step before committing to an answer letter"
    }

    fn answer(&self, example: &Example, context: AgentContext) -> AnswerFuture<'_> {
        let prompt = build_prompt(example);
        let system = self.config.system_prompt.clone();
        let option_count = example.options.len();

        Box::pin(async move {
            let request = LlmRequest::with_system(prompt, system).with_seed(context.seed);
            let response = context
                .llm
                .generate_with_cancellation(request, &context.cancellation_token)
                .await?;

            let tokens_used = response.total_tokens();
            match parse_letter(&response.text, option_count) {
                Some(label) => Ok(AgentReply {
                    label,
                    raw_output: response.text,
                    tokens_used,
                }),
                None => Err(AgentError::MalformedOutput {
                    raw: response.text,
                }),
            }
        })
    }
}

fn build_prompt(example: &Example) -> String {
    format!(
        "Question: {}\nOptions:\n{}\n\nThink step by step, then finish with a line in the form \"Answer: <letter>\".",
        example.question,
        example.options_text(),
    )
}

/// Reasoning output ends with an answer line; the fallbacks cover models
/// that skip the requested format.
fn parse_letter(text: &str, option_count: usize) -> Option<Label> {
    answer_line_letter(text, option_count)
        .or_else(|| leading_letter(text, option_count))
        .or_else(|| scan_letter(text, option_count))
}

// ============================================================================
// Unit Tests
// ============================================================================
