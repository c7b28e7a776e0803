//! Run results and per-example prediction records.
//!
//! A [`RunResult`] is the complete, self-describing record of one evaluation
//! run: the configuration it ran with, aggregate scores, and one
//! [`Prediction`] per evaluated example. Results serialize to JSON and
//! deserialize back to an equal value, so stored reports can be re-read and
//! re-displayed later.

use chrono::{DateTime, Utc};
use openbook_core::{AgentError, AgentReply, Label};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of evaluating a single example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Id of the example this prediction answers.
    pub example_id: String,

    /// The chosen option. Absent exactly when `error` is set.
    pub predicted: Option<Label>,

    /// Verbatim model output, when any was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,

    /// Wall-clock time spent on this example.
    #[serde(with = "duration_ms")]
    pub latency: Duration,

    /// Tokens consumed, when the API reported usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,

    /// Error message when the agent failed on this example.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Prediction {
    /// Record a successful answer.
    pub fn success(example_id: impl Into<String>, reply: AgentReply, latency: Duration) -> Self {
        Self {
            example_id: example_id.into(),
            predicted: Some(reply.label),
            raw_output: Some(reply.raw_output),
            latency: truncate_to_millis(latency),
            tokens_used: reply.tokens_used,
            error: None,
        }
    }

    /// Record a failed example. The raw model output is preserved when the
    /// failure was a parse failure, so the report shows what the model said.
    pub fn failure(example_id: impl Into<String>, error: &AgentError, latency: Duration) -> Self {
        Self {
            example_id: example_id.into(),
            predicted: None,
            raw_output: error.raw_output().map(str::to_string),
            latency: truncate_to_millis(latency),
            tokens_used: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether the agent produced an answer for this example.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.predicted.is_some()
    }
}

/// Aggregate tallies for one category of examples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub total: usize,
    pub correct: usize,
    pub error_count: usize,
    pub accuracy: f64,
}

/// The knobs a run executed with, echoed into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Per-example timeout.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,

    /// Maximum number of examples evaluated concurrently.
    pub concurrency: usize,

    /// Metadata key used for the per-category breakdown, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_field: Option<String>,
}

/// Complete record of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique id for this run.
    pub run_id: String,

    /// Master seed the run was keyed on.
    pub seed: u64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Name of the evaluated agent.
    pub agent: String,

    /// Model identifier the agent talked to.
    pub model: String,

    /// Name of the example store.
    pub dataset: String,

    /// Echo of the run configuration.
    pub config: RunParameters,

    /// True when the run was cut short by cancellation.
    pub is_partial: bool,

    /// Number of examples evaluated.
    pub total_examples: usize,

    /// Number of correct answers.
    pub correct: usize,

    /// Number of examples that errored instead of answering.
    pub error_count: usize,

    /// `correct / (total_examples - error_count)`, 0.0 when nothing answered.
    pub accuracy: f64,

    /// Per-category tallies, present when a category field was configured.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_category: BTreeMap<String, CategoryBreakdown>,

    /// Total wall-clock time for the run.
    #[serde(with = "duration_ms")]
    pub total_duration: Duration,

    /// Total tokens consumed across all examples.
    pub total_tokens: u32,

    /// Per-example records, sorted by example id.
    pub predictions: Vec<Prediction>,
}

impl RunResult {
    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!();
        println!("=== Evaluation Summary ===");
        println!("Run: {}", self.run_id);
        println!("Dataset: {}", self.dataset);
        println!("Agent: {}", self.agent);
        println!("Model: {}", self.model);
        println!("Seed: {}", self.seed);
        if self.is_partial {
            println!("Partial run (cancelled before completion)");
        }
        println!();
        println!(
            "Examples: {} total, {} correct, {} errors",
            self.total_examples, self.correct, self.error_count
        );
        println!("Accuracy: {:.1}%", self.accuracy * 100.0);

        if !self.per_category.is_empty() {
            println!();
            println!("Per category:");
            for (category, breakdown) in &self.per_category {
                println!(
                    "  {}: {:.1}% ({}/{}, {} errors)",
                    category,
                    breakdown.accuracy * 100.0,
                    breakdown.correct,
                    breakdown.total - breakdown.error_count,
                    breakdown.error_count
                );
            }
        }

        println!();
        println!("Tokens: {}", self.total_tokens);
        println!("Duration: {:.1}s", self.total_duration.as_secs_f64());
    }

}

/// Drop sub-millisecond precision so persisted durations round-trip exactly.
fn truncate_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

/// Serde adapter storing a [`Duration`] as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
