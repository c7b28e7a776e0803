//! # OpenBook Eval
//!
//! Deterministic evaluation harness for multiple-choice QA agents over the
//! OpenBookQA dataset.
//!
//! ## Overview
//!
//! `openbook-eval` provides tools for systematic evaluation of QA agents:
//!
//! - **Stores**: Load examples from the official OpenBookQA release (downloaded and cached) or custom JSON files
//! - **Harness**: Batch execution with bounded concurrency, per-example timeouts, and cooperative cancellation
//! - **Scorer**: Accuracy over the examples that answered, with an optional per-category breakdown
//! - **Reports**: Self-describing JSON files that load back to the exact stored run
//!
//! Runs are reproducible: one seed fixes the example selection, the order
//! predictions are reported in, and the per-example seeds handed to agents.
//! A failing example becomes an error record, never a crashed run.
//!
//! ## Architecture
//!
//! ```text
//! openbook-core (examples, agents, LLM client)
//!     ↓
//! agents/* (answering strategies)
//!     ↓
//! openbook-eval (stores, harness, scorer, reports)  ← this crate
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use openbook_core::{LlmClient, LlmConfig};
//! use openbook_direct::DirectAgent;
//! use openbook_eval::{EvalHarness, JsonReportSink, OpenBookQa, RunConfig, Split};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = OpenBookQa::with_split(Split::Dev)?;
//! let agent = DirectAgent::with_defaults()?;
//! let llm = LlmClient::new("api-key", LlmConfig::default())?;
//!
//! let harness = EvalHarness::new(RunConfig::new().with_seed(42).with_sample(50));
//! let result = harness.run(&agent, &store, llm).await?;
//!
//! result.print_summary();
//! JsonReportSink::new("evaluation_results").persist(&result).await?;
//! # Ok(())
//! # }
//! ```

pub mod harness;
pub mod report;
pub mod results;
pub mod scorer;
pub mod store;

// Re-export public API
pub use harness::{EvalHarness, RunConfig, RunError, RunPhase, RunProgress};
pub use report::{JsonReportSink, PersistenceError};
pub use results::{CategoryBreakdown, Prediction, RunParameters, RunResult};
pub use scorer::{accuracy, score, AggregationError, Scorecard};
pub use store::{DataLoadError, ExampleStore, JsonFileStore, OpenBookQa, Split};
