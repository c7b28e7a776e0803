//! Direct multiple-choice agent.
//!
//! Asks the model for the answer letter in a single strict prompt and parses
//! the reply. No reasoning is requested; the model is told to respond with
//! one character only. This is the cheapest agent and the baseline the
//! chain-of-thought agent is compared against.
//!
//! # Example
//!
//! ```no_run
//! use openbook_core::{Agent, AgentContext, Example, Label, LlmClient, LlmConfig};
//! use openbook_direct::DirectAgent;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = DirectAgent::with_defaults()?;
//! let llm = LlmClient::new("api-key", LlmConfig::default())?;
//!
//! let example = Example::new(
//!     "q1",
//!     "Which surface is best for growing moss?",
//!     vec!["a dry rock".into(), "a damp log".into()],
//!     Label::B,
//! );
//! let reply = agent.answer(&example, AgentContext::new(llm)).await?;
//! assert_eq!(reply.label, Label::B);
//! # Ok(())
//! # }
//! ```

use openbook_core::{
    leading_letter, scan_letter, Agent, AgentContext, AgentError, AgentReply, AnswerFuture,
    Example, Label, LlmRequest,
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for [`DirectAgent`].
#[derive(Debug, Clone)]
pub struct DirectConfig {
    /// System prompt framing the task.
    pub system_prompt: String,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a careful multiple-choice solver. \
                            Choose the best single option."
                .to_string(),
        }
    }
}

impl DirectConfig {
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

/// Agent that requests the bare answer letter.
pub struct DirectAgent {
    config: DirectConfig,
}

impl DirectAgent {
    /// Create an agent, validating the configuration.
    pub fn new(config: DirectConfig) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create an agent with the default configuration.
    pub fn with_defaults() -> Result<Self, AgentError> {
        Self::new(DirectConfig::default())
    }

    pub fn config(&self) -> &DirectConfig {
        &self.config
    }
}

impl Agent for DirectAgent {
    fn name(&self) -> &str {
        "direct"
    }

    fn description(&self) -> &str {
        "Asks for the answer letter in a single strict prompt"
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
        "Question: {}\nOptions:\n{}\n\nRespond with ONLY one character: {}. No words.",
        example.question,
        example.options_text(),
        letter_choices(example.options.len()),
    )
}

/// Render the allowed letters, e.g. "A, B, C, or D".
fn letter_choices(option_count: usize) -> String {
    let letters: Vec<String> = Label::ALL
        .iter()
        .take(option_count)
        .map(|label| label.letter().to_string())
        .collect();

    match letters.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{} or {}", first, second),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}

/// The reply should be a bare letter; fall back to scanning for one.
fn parse_letter(text: &str, option_count: usize) -> Option<Label> {
    leading_letter(text, option_count).or_else(|| scan_letter(text, option_count))
}

// ============================================================================
// Unit Tests
// ============================================================================
