//! Scoring predictions against gold answers.
//!
//! Scoring is a pure function over the collected predictions and the examples
//! they answer. Errored examples count toward `error_count` and are excluded
//! from the accuracy denominator, so a flaky run reports a meaningful score
//! for the examples that did answer.

use crate::results::{CategoryBreakdown, Prediction};
use openbook_core::Example;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur while aggregating predictions.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AggregationError {
    /// A prediction references an example id the run never loaded.
    #[error("prediction references unknown example id '{0}'")]
    UnknownExample(String),

    /// Two predictions reference the same example.
    #[error("duplicate prediction for example id '{0}'")]
    DuplicatePrediction(String),
}

/// Aggregate tallies for a set of predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub total: usize,
    pub correct: usize,
    pub error_count: usize,
    /// `correct / (total - error_count)`, 0.0 when nothing answered.
    pub accuracy: f64,
    /// Tallies keyed by category, empty when no category field is set.
    pub per_category: BTreeMap<String, CategoryBreakdown>,
}

/// Accuracy over the examples that produced an answer.
///
/// # Example
///
/// ```
/// use openbook_eval::scorer::accuracy;
///
/// assert_eq!(accuracy(1, 4, 0), 0.25);
/// assert_eq!(accuracy(2, 4, 1), 2.0 / 3.0);
/// assert_eq!(accuracy(0, 0, 0), 0.0);
/// ```
pub fn accuracy(correct: usize, total: usize, error_count: usize) -> f64 {
    let answered = total.saturating_sub(error_count);
    if answered == 0 {
        0.0
    } else {
        correct as f64 / answered as f64
    }
}

/// Score a set of predictions against their examples.
///
/// When `category_field` is set, examples carrying that metadata key are also
/// tallied per category; examples without the key only count toward the
/// overall totals.
pub fn score(
    predictions: &[Prediction],
    examples: &[Example],
    category_field: Option<&str>,
) -> Result<Scorecard, AggregationError> {
    let by_id: HashMap<&str, &Example> = examples.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut seen = HashSet::new();
    let mut total = 0usize;
    let mut correct = 0usize;
    let mut error_count = 0usize;
    let mut categories: BTreeMap<String, CategoryTally> = BTreeMap::new();

    for prediction in predictions {
        let example = by_id
            .get(prediction.example_id.as_str())
            .ok_or_else(|| AggregationError::UnknownExample(prediction.example_id.clone()))?;

        if !seen.insert(prediction.example_id.as_str()) {
            return Err(AggregationError::DuplicatePrediction(
                prediction.example_id.clone(),
            ));
        }

        total += 1;
        let is_correct = prediction.predicted == Some(example.gold_answer);
        if is_correct {
            correct += 1;
        }
        if prediction.error.is_some() {
            error_count += 1;
        }

        if let Some(field) = category_field {
            if let Some(category) = example.metadata.get(field) {
                let tally = categories.entry(category.clone()).or_default();
                tally.total += 1;
                if is_correct {
                    tally.correct += 1;
                }
                if prediction.error.is_some() {
                    tally.error_count += 1;
                }
            }
        }
    }

    let per_category = categories
        .into_iter()
        .map(|(category, tally)| (category, tally.into_breakdown()))
        .collect();

    Ok(Scorecard {
        total,
        correct,
        error_count,
        accuracy: accuracy(correct, total, error_count),
        per_category,
    })
}

#[derive(Default)]
struct CategoryTally {
    total: usize,
    correct: usize,
    error_count: usize,
}

impl CategoryTally {
    fn into_breakdown(self) -> CategoryBreakdown {
        CategoryBreakdown {
            total: self.total,
            correct: self.correct,
            error_count: self.error_count,
            accuracy: accuracy(self.correct, self.total, self.error_count),
        }
    }
}
