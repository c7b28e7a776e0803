//! Batch evaluation harness.
//!
//! The harness drives an [`Agent`] over every example in a store with bounded
//! concurrency, converts per-example failures into error records instead of
//! aborting, and assembles a [`RunResult`] that scores the run. Runs are
//! reproducible: the same seed yields the same example selection and the same
//! per-example seeds, and predictions are keyed by example id so concurrent
//! completion order never leaks into the report.

use crate::results::{Prediction, RunParameters, RunResult};
use crate::scorer::{self, AggregationError};
use crate::store::{DataLoadError, ExampleStore};
use chrono::Utc;
use futures_util::{stream, StreamExt};
use openbook_core::{Agent, AgentContext, AgentError, Example, LlmClient};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Configuration for an evaluation run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Master seed for shuffling, sampling, and per-example seeds.
    pub seed: u64,

    /// Per-example timeout.
    pub timeout: Duration,

    /// Maximum number of examples evaluated concurrently.
    pub concurrency: usize,

    /// Metadata key for the per-category breakdown.
    pub category_field: Option<String>,

    /// Evaluate at most this many examples.
    pub sample: Option<usize>,

    /// Shuffle examples (seeded) before sampling.
    pub shuffle: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            timeout: Duration::from_secs(60),
            // Serial evaluation keeps API load predictable; opt in to more.
            concurrency: 1,
            category_field: None,
            sample: None,
            shuffle: false,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the concurrency limit. Clamped to at least 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_category_field(mut self, field: impl Into<String>) -> Self {
        self.category_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_sample(mut self, sample: usize) -> Self {
        self.sample = Some(sample);
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Phase of an evaluation run.
///
/// A run starts `Idle`, walks `Loading` then `Evaluating` then `Aggregating`,
/// and ends in `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Loading,
    Evaluating,
    Aggregating,
    Done,
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Loading => "loading",
            RunPhase::Evaluating => "evaluating",
            RunPhase::Aggregating => "aggregating",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Progress events emitted during a run.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RunProgress {
    /// The run moved to a new phase.
    PhaseChanged { phase: RunPhase },

    /// Evaluation started with the given number of examples.
    Started { total: usize },

    /// One example finished, successfully or not.
    ExampleCompleted {
        completed: usize,
        total: usize,
        success: bool,
    },
}

/// Errors that abort a run.
///
/// Per-example failures never surface here; they become error records in the
/// run result. Only failures to load examples or to aggregate the collected
/// predictions abort the run as a whole.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    #[error("Failed to load examples: {0}")]
    Load(#[from] DataLoadError),

    #[error("Failed to aggregate predictions: {0}")]
    Aggregate(#[from] AggregationError),
}

impl RunError {
    /// The phase the run failed in.
    pub fn stage(&self) -> RunPhase {
        match self {
            RunError::Load(_) => RunPhase::Loading,
            RunError::Aggregate(_) => RunPhase::Aggregating,
        }
    }
}

/// Drives evaluation runs.
pub struct EvalHarness {
    config: RunConfig,
}

impl EvalHarness {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run an agent over a store and score the outcome.
    pub async fn run<S: ExampleStore>(
        &self,
        agent: &dyn Agent,
        store: &S,
        llm: LlmClient,
    ) -> Result<RunResult, RunError> {
        self.run_with_progress(agent, store, llm, |_| {}).await
    }

    /// Run with a progress callback.
    pub async fn run_with_progress<S: ExampleStore>(
        &self,
        agent: &dyn Agent,
        store: &S,
        llm: LlmClient,
        on_progress: impl Fn(RunProgress) + Send + Sync,
    ) -> Result<RunResult, RunError> {
        self.run_with_cancellation(agent, store, llm, CancellationToken::new(), on_progress)
            .await
    }

    /// Run with a progress callback and external cancellation.
    ///
    /// Cancelling the token stops the run cooperatively: in-flight examples
    /// are abandoned, already-collected predictions are kept, and the result
    /// comes back marked partial.
    pub async fn run_with_cancellation<S: ExampleStore>(
        &self,
        agent: &dyn Agent,
        store: &S,
        llm: LlmClient,
        cancellation_token: CancellationToken,
        on_progress: impl Fn(RunProgress) + Send + Sync,
    ) -> Result<RunResult, RunError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let run_start = Instant::now();
        let on_progress = Arc::new(on_progress);

        on_progress(RunProgress::PhaseChanged {
            phase: RunPhase::Loading,
        });
        let mut examples = match store.load().await {
            Ok(examples) => examples,
            Err(e) => {
                on_progress(RunProgress::PhaseChanged {
                    phase: RunPhase::Failed,
                });
                return Err(RunError::Load(e));
            }
        };

        // Selection is keyed on the seed: shuffle first, then truncate, so
        // the same seed always picks the same subset in the same order.
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        if self.config.shuffle {
            examples.shuffle(&mut rng);
        }
        if let Some(sample) = self.config.sample {
            examples.truncate(sample);
        }

        let total = examples.len();
        log::info!(
            "Evaluating {} examples from '{}' with agent '{}' (concurrency {})",
            total,
            store.name(),
            agent.name(),
            self.config.concurrency
        );

        on_progress(RunProgress::PhaseChanged {
            phase: RunPhase::Evaluating,
        });
        on_progress(RunProgress::Started { total });

        let llm = Arc::new(llm);
        let completed = Arc::new(AtomicUsize::new(0));
        let seed = self.config.seed;
        let timeout = self.config.timeout;

        let mut predictions: Vec<Prediction> = stream::iter(examples.iter())
            .map(|example| {
                let llm = llm.clone();
                let token = cancellation_token.clone();
                let on_progress = on_progress.clone();
                let completed = completed.clone();
                async move {
                    let context = AgentContext::from_arc(llm)
                        .with_seed(per_example_seed(seed, &example.id))
                        .with_cancellation(token);
                    let prediction = evaluate_example(agent, example, context, timeout).await;

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    on_progress(RunProgress::ExampleCompleted {
                        completed: done,
                        total,
                        success: prediction.is_success(),
                    });
                    prediction
                }
            })
            .buffer_unordered(self.config.concurrency)
            .take_until(cancellation_token.clone().cancelled_owned())
            .collect()
            .await;

        let is_partial = predictions.len() < total;
        if is_partial {
            log::warn!(
                "Run cancelled after {} of {} examples",
                predictions.len(),
                total
            );
        }

        // Completion order under concurrency is nondeterministic; the report
        // is keyed by example id.
        predictions.sort_by(|a, b| a.example_id.cmp(&b.example_id));

        on_progress(RunProgress::PhaseChanged {
            phase: RunPhase::Aggregating,
        });
        let scorecard = match scorer::score(
            &predictions,
            &examples,
            self.config.category_field.as_deref(),
        ) {
            Ok(scorecard) => scorecard,
            Err(e) => {
                on_progress(RunProgress::PhaseChanged {
                    phase: RunPhase::Failed,
                });
                return Err(RunError::Aggregate(e));
            }
        };

        let total_tokens = predictions.iter().filter_map(|p| p.tokens_used).sum();
        let total_duration = Duration::from_millis(run_start.elapsed().as_millis() as u64);

        on_progress(RunProgress::PhaseChanged {
            phase: RunPhase::Done,
        });

        Ok(RunResult {
            run_id,
            seed: self.config.seed,
            started_at,
            agent: agent.name().to_string(),
            model: llm.config().model.clone(),
            dataset: store.name().to_string(),
            config: RunParameters {
                timeout: Duration::from_millis(timeout.as_millis() as u64),
                concurrency: self.config.concurrency,
                category_field: self.config.category_field.clone(),
            },
            is_partial,
            total_examples: scorecard.total,
            correct: scorecard.correct,
            error_count: scorecard.error_count,
            accuracy: scorecard.accuracy,
            per_category: scorecard.per_category,
            total_duration,
            total_tokens,
            predictions,
        })
    }
}

impl Default for EvalHarness {
    fn default() -> Self {
        Self::new(RunConfig::default())
    }
}

/// Evaluate one example, turning any failure into an error record.
async fn evaluate_example(
    agent: &dyn Agent,
    example: &Example,
    context: AgentContext,
    timeout: Duration,
) -> Prediction {
    let token = context.cancellation_token.clone();
    let start = Instant::now();

    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => Err(AgentError::Cancelled),
        result = tokio::time::timeout(timeout, agent.answer(example, context)) => {
            match result {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        }
    };

    let latency = start.elapsed();
    match outcome {
        Ok(reply) => Prediction::success(&example.id, reply, latency),
        Err(e) => {
            log::debug!("Example '{}' failed: {}", example.id, e);
            Prediction::failure(&example.id, &e, latency)
        }
    }
}

/// Derive a stable per-example seed from the run seed and example id.
///
/// FNV-1a over the id bytes, mixed with the run seed, so the value does not
/// depend on hasher internals that vary between builds.
fn per_example_seed(run_seed: u64, example_id: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ run_seed;
    for byte in example_id.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
