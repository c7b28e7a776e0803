//! Integration tests for the evaluation harness.
//!
//! A scripted agent and an in-memory store stand in for the real model and
//! dataset, so runs are fast and fully deterministic.

use openbook_core::{
    Agent, AgentContext, AgentError, AgentReply, AnswerFuture, Example, Label, LlmClient,
    LlmConfig, MockLlm,
};
use openbook_eval::{
    DataLoadError, EvalHarness, ExampleStore, JsonReportSink, RunConfig, RunPhase, RunProgress,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Doubles
// ============================================================================

#[derive(Clone)]
enum ScriptedReply {
    Answer(Label),
    Slow(Label, Duration),
    Malformed(String),
    Fail,
}

/// Agent that replays a scripted reply per example id.
struct ScriptedAgent {
    default_reply: ScriptedReply,
    overrides: HashMap<String, ScriptedReply>,
}

impl ScriptedAgent {
    fn always(label: Label) -> Self {
        Self {
            default_reply: ScriptedReply::Answer(label),
            overrides: HashMap::new(),
        }
    }

    fn failing() -> Self {
        Self {
            default_reply: ScriptedReply::Fail,
            overrides: HashMap::new(),
        }
    }

    /// Answers every given example with its gold label.
    fn answering_gold(examples: &[Example]) -> Self {
        let overrides = examples
            .iter()
            .map(|e| (e.id.clone(), ScriptedReply::Answer(e.gold_answer)))
            .collect();
        Self {
            default_reply: ScriptedReply::Fail,
            overrides,
        }
    }

    fn with_reply(mut self, id: &str, reply: ScriptedReply) -> Self {
        self.overrides.insert(id.to_string(), reply);
        self
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    fn description(&self) -> &str {
        "Replays scripted answers for tests"
    }

    fn answer(&self, example: &Example, _context: AgentContext) -> AnswerFuture<'_> {
        let reply = self
            .overrides
            .get(&example.id)
            .cloned()
            .unwrap_or_else(|| self.default_reply.clone());

        Box::pin(async move {
            match reply {
                ScriptedReply::Answer(label) => Ok(reply_with(label)),
                ScriptedReply::Slow(label, delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(reply_with(label))
                }
                ScriptedReply::Malformed(raw) => Err(AgentError::MalformedOutput { raw }),
                ScriptedReply::Fail => Err(AgentError::Other("scripted failure".to_string())),
            }
        })
    }
}

fn reply_with(label: Label) -> AgentReply {
    AgentReply {
        label,
        raw_output: label.to_string(),
        tokens_used: Some(7),
    }
}

/// Store serving a fixed set of examples.
struct MemoryStore {
    examples: Vec<Example>,
}

impl MemoryStore {
    fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }
}

impl ExampleStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<Vec<Example>, DataLoadError> {
        Ok(self.examples.clone())
    }
}

/// Four examples with gold answers A, B, C, D.
fn four_examples() -> Vec<Example> {
    [Label::A, Label::B, Label::C, Label::D]
        .iter()
        .enumerate()
        .map(|(i, &gold)| {
            Example::new(
                format!("q{}", i),
                format!("Question {}?", i),
                vec![
                    "first".to_string(),
                    "second".to_string(),
                    "third".to_string(),
                    "fourth".to_string(),
                ],
                gold,
            )
        })
        .collect()
}

fn many_examples(count: usize) -> Vec<Example> {
    (0..count)
        .map(|i| {
            Example::new(
                format!("q{:02}", i),
                format!("Question {}?", i),
                vec!["first".to_string(), "second".to_string()],
                Label::A,
            )
        })
        .collect()
}

/// The stub agents never call the LLM; the harness still needs a client.
fn mock_llm() -> LlmClient {
    MockLlm::new().into_client(LlmConfig::default())
}

// ============================================================================
// Scoring
// ============================================================================

#[tokio::test]
async fn test_accuracy_over_fixed_gold_answers() {
    let store = MemoryStore::new(four_examples());
    let agent = ScriptedAgent::always(Label::A);
    let harness = EvalHarness::new(RunConfig::new());

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    assert_eq!(result.total_examples, 4);
    assert_eq!(result.correct, 1);
    assert_eq!(result.error_count, 0);
    assert!((result.accuracy - 0.25).abs() < 1e-12);
    assert!(!result.is_partial);
    assert_eq!(result.agent, "scripted");
    assert_eq!(result.dataset, "memory");
    assert_eq!(result.total_tokens, 28);
}

#[tokio::test]
async fn test_predictions_sorted_by_example_id() {
    let store = MemoryStore::new(four_examples());
    let agent = ScriptedAgent::always(Label::B);
    let harness = EvalHarness::new(RunConfig::new().with_concurrency(4));

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    let ids: Vec<&str> = result
        .predictions
        .iter()
        .map(|p| p.example_id.as_str())
        .collect();
    assert_eq!(ids, vec!["q0", "q1", "q2", "q3"]);
}

#[tokio::test]
async fn test_empty_store_scores_zero() {
    let store = MemoryStore::new(Vec::new());
    let agent = ScriptedAgent::always(Label::A);
    let harness = EvalHarness::new(RunConfig::new());

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    assert_eq!(result.total_examples, 0);
    assert_eq!(result.accuracy, 0.0);
    assert!(result.predictions.is_empty());
    assert!(!result.is_partial);
}

#[tokio::test]
async fn test_all_failures_scores_zero() {
    let store = MemoryStore::new(four_examples());
    let agent = ScriptedAgent::failing();
    let harness = EvalHarness::new(RunConfig::new());

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    assert_eq!(result.total_examples, 4);
    assert_eq!(result.error_count, 4);
    assert_eq!(result.correct, 0);
    assert_eq!(result.accuracy, 0.0);
}

#[tokio::test]
async fn test_per_category_breakdown_from_metadata() {
    let examples = vec![
        Example::new(
            "q0",
            "Bio one?",
            vec!["x".to_string(), "y".to_string()],
            Label::A,
        )
        .with_metadata("category", "biology"),
        Example::new(
            "q1",
            "Bio two?",
            vec!["x".to_string(), "y".to_string()],
            Label::B,
        )
        .with_metadata("category", "biology"),
        Example::new(
            "q2",
            "Physics one?",
            vec!["x".to_string(), "y".to_string()],
            Label::A,
        )
        .with_metadata("category", "physics"),
    ];
    let store = MemoryStore::new(examples);
    let agent = ScriptedAgent::always(Label::A);
    let harness = EvalHarness::new(RunConfig::new().with_category_field("category"));

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    assert_eq!(result.per_category.len(), 2);
    let biology = &result.per_category["biology"];
    assert_eq!(biology.total, 2);
    assert_eq!(biology.correct, 1);
    let physics = &result.per_category["physics"];
    assert_eq!(physics.total, 1);
    assert_eq!(physics.correct, 1);

    let weighted: f64 = result
        .per_category
        .values()
        .map(|b| b.accuracy * (b.total - b.error_count) as f64)
        .sum();
    let answered = (result.total_examples - result.error_count) as f64;
    assert!((weighted / answered - result.accuracy).abs() < 1e-9);
}

// ============================================================================
// Error Recovery
// ============================================================================

#[tokio::test]
async fn test_timeout_becomes_error_record() {
    let examples = four_examples();
    let agent = ScriptedAgent::answering_gold(&examples)
        .with_reply("q1", ScriptedReply::Slow(Label::B, Duration::from_millis(200)));
    let store = MemoryStore::new(examples);
    let harness = EvalHarness::new(RunConfig::new().with_timeout(Duration::from_millis(20)));

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    assert_eq!(result.total_examples, 4);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.correct, 3);
    // Accuracy is over the three examples that answered.
    assert!((result.accuracy - 1.0).abs() < 1e-12);

    let timed_out = &result.predictions[1];
    assert_eq!(timed_out.example_id, "q1");
    assert_eq!(timed_out.predicted, None);
    assert!(timed_out.error.as_deref().unwrap().contains("timed out"));
    assert!(!result.is_partial);
}

#[tokio::test]
async fn test_malformed_output_keeps_raw_text() {
    let examples = four_examples();
    let agent = ScriptedAgent::answering_gold(&examples).with_reply(
        "q2",
        ScriptedReply::Malformed("I cannot pick just one".to_string()),
    );
    let store = MemoryStore::new(examples);
    let harness = EvalHarness::new(RunConfig::new());

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    let malformed = &result.predictions[2];
    assert_eq!(malformed.example_id, "q2");
    assert_eq!(malformed.predicted, None);
    assert_eq!(
        malformed.raw_output.as_deref(),
        Some("I cannot pick just one")
    );
    assert!(malformed
        .error
        .as_deref()
        .unwrap()
        .contains("No option letter"));
}

#[tokio::test]
async fn test_one_failure_does_not_abort_run() {
    let examples = four_examples();
    let agent =
        ScriptedAgent::answering_gold(&examples).with_reply("q0", ScriptedReply::Fail);
    let store = MemoryStore::new(examples);
    let harness = EvalHarness::new(RunConfig::new());

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    assert_eq!(result.total_examples, 4);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.correct, 3);
}

// ============================================================================
// Determinism
// ============================================================================

#[tokio::test]
async fn test_fixed_seed_reproduces_prediction_sequence() {
    let store = MemoryStore::new(many_examples(8));
    let agent = ScriptedAgent::always(Label::A);
    let config = RunConfig::new()
        .with_seed(42)
        .with_shuffle(true)
        .with_sample(5);

    let first = EvalHarness::new(config.clone())
        .run(&agent, &store, mock_llm())
        .await
        .unwrap();
    let second = EvalHarness::new(config)
        .run(&agent, &store, mock_llm())
        .await
        .unwrap();

    let sequence = |result: &openbook_eval::RunResult| {
        result
            .predictions
            .iter()
            .map(|p| (p.example_id.clone(), p.predicted))
            .collect::<Vec<_>>()
    };

    assert_eq!(first.total_examples, 5);
    assert_eq!(sequence(&first), sequence(&second));
    assert_eq!(first.accuracy, second.accuracy);
    assert_eq!(first.seed, second.seed);
}

#[tokio::test]
async fn test_sample_without_shuffle_takes_prefix() {
    let store = MemoryStore::new(many_examples(6));
    let agent = ScriptedAgent::always(Label::A);
    let harness = EvalHarness::new(RunConfig::new().with_sample(2));

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    let ids: Vec<&str> = result
        .predictions
        .iter()
        .map(|p| p.example_id.as_str())
        .collect();
    assert_eq!(ids, vec!["q00", "q01"]);
}

#[tokio::test]
async fn test_concurrency_does_not_change_results() {
    let examples = many_examples(10);
    let agent = ScriptedAgent::answering_gold(&examples)
        .with_reply("q03", ScriptedReply::Fail)
        .with_reply("q07", ScriptedReply::Answer(Label::B));
    let store = MemoryStore::new(examples);

    let mut outcomes = Vec::new();
    for concurrency in [1, 3, 8] {
        let harness =
            EvalHarness::new(RunConfig::new().with_seed(9).with_concurrency(concurrency));
        let result = harness.run(&agent, &store, mock_llm()).await.unwrap();
        let rows: Vec<(String, Option<Label>, bool)> = result
            .predictions
            .iter()
            .map(|p| (p.example_id.clone(), p.predicted, p.is_success()))
            .collect();
        outcomes.push((result.accuracy, result.correct, result.error_count, rows));
    }

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[1], outcomes[2]);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancellation_yields_partial_result() {
    let store = MemoryStore::new(four_examples());
    let agent = ScriptedAgent::always(Label::A);
    let harness = EvalHarness::new(RunConfig::new().with_concurrency(1));

    let token = CancellationToken::new();
    let cancel_after = 2;
    let completed = AtomicUsize::new(0);

    let result = harness
        .run_with_cancellation(&agent, &store, mock_llm(), token.clone(), |progress| {
            if let RunProgress::ExampleCompleted { .. } = progress {
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if done == cancel_after {
                    token.cancel();
                }
            }
        })
        .await
        .unwrap();

    assert!(result.is_partial);
    assert_eq!(result.predictions.len(), 2);
    assert_eq!(result.total_examples, 2);
    assert_eq!(result.predictions[0].example_id, "q0");
    assert_eq!(result.predictions[1].example_id, "q1");
}

#[tokio::test]
async fn test_pre_cancelled_run_evaluates_nothing() {
    let store = MemoryStore::new(four_examples());
    let agent = ScriptedAgent::always(Label::A);
    let harness = EvalHarness::new(RunConfig::new());

    let token = CancellationToken::new();
    token.cancel();

    let result = harness
        .run_with_cancellation(&agent, &store, mock_llm(), token, |_| {})
        .await
        .unwrap();

    assert!(result.is_partial);
    assert!(result.predictions.is_empty());
    assert_eq!(result.accuracy, 0.0);
}

// ============================================================================
// Progress Events
// ============================================================================

#[tokio::test]
async fn test_progress_events_track_run() {
    let store = MemoryStore::new(four_examples());
    let agent = ScriptedAgent::always(Label::A);
    let harness = EvalHarness::new(RunConfig::new().with_concurrency(1));

    let events = Mutex::new(Vec::new());
    harness
        .run_with_progress(&agent, &store, mock_llm(), |progress| {
            events.lock().unwrap().push(progress);
        })
        .await
        .unwrap();

    let events = events.into_inner().unwrap();

    match &events[0] {
        RunProgress::PhaseChanged { phase } => assert_eq!(*phase, RunPhase::Loading),
        _ => panic!("Expected Loading phase event"),
    }
    match &events[2] {
        RunProgress::Started { total } => assert_eq!(*total, 4),
        _ => panic!("Expected Started event"),
    }

    let completions: Vec<(usize, usize, bool)> = events
        .iter()
        .filter_map(|event| match event {
            RunProgress::ExampleCompleted {
                completed,
                total,
                success,
            } => Some((*completed, *total, *success)),
            _ => None,
        })
        .collect();
    assert_eq!(
        completions,
        vec![(1, 4, true), (2, 4, true), (3, 4, true), (4, 4, true)]
    );

    let phases: Vec<RunPhase> = events
        .iter()
        .filter_map(|event| match event {
            RunProgress::PhaseChanged { phase } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            RunPhase::Loading,
            RunPhase::Evaluating,
            RunPhase::Aggregating,
            RunPhase::Done
        ]
    );
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_run_result_round_trips_through_sink() {
    let examples = four_examples();
    let agent = ScriptedAgent::answering_gold(&examples).with_reply(
        "q3",
        ScriptedReply::Malformed("none of the above".to_string()),
    );
    let store = MemoryStore::new(examples);
    let harness = EvalHarness::new(
        RunConfig::new()
            .with_seed(7)
            .with_category_field("category"),
    );

    let result = harness.run(&agent, &store, mock_llm()).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let sink = JsonReportSink::new(dir.path());
    let path = sink.persist(&result).await.unwrap();
    let loaded = sink.load(&path).await.unwrap();

    assert_eq!(loaded, result);
}
