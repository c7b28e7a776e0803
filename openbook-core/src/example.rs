//! Multiple-choice questions and answer labels.
//!
//! An [`Example`] is one OpenBookQA-style question: a stem, between two and
//! five lettered options, and the gold answer. [`Label`] is the answer letter
//! itself. The free functions at the bottom extract a letter from raw model
//! output at increasing levels of leniency.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An answer option letter.
///
/// Questions carry between two and five options, so `A` and `B` always
/// exist while `C` through `E` depend on the question. Serializes as the
/// bare letter (`"A"`).
///
/// # Example
///
/// ```
/// use openbook_core::Label;
///
/// assert_eq!(Label::B.letter(), 'B');
/// assert_eq!(Label::from_index(2), Some(Label::C));
/// assert_eq!("d".parse::<Label>(), Ok(Label::D));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    A,
    B,
    C,
    D,
    E,
}

impl Label {
    /// All labels in option order.
    pub const ALL: [Label; 5] = [Label::A, Label::B, Label::C, Label::D, Label::E];

    /// Convert a letter to a label. Case-insensitive.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(Label::A),
            'B' => Some(Label::B),
            'C' => Some(Label::C),
            'D' => Some(Label::D),
            'E' => Some(Label::E),
            _ => None,
        }
    }

    /// Convert a zero-based option index to a label.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Zero-based position of this label in the option list.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The uppercase letter for this label.
    pub fn letter(&self) -> char {
        (b'A' + *self as u8) as char
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Error returned when a string is not a single answer letter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid answer label '{0}': expected a single letter A-E")]
pub struct ParseLabelError(pub String);

impl FromStr for Label {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => {
                Label::from_letter(letter).ok_or_else(|| ParseLabelError(s.to_string()))
            }
            _ => Err(ParseLabelError(s.to_string())),
        }
    }
}

/// A single multiple-choice question.
///
/// # Example
///
/// ```
/// use openbook_core::{Example, Label};
///
/// let example = Example::new(
///     "7-980",
///     "The sun is responsible for",
///     vec![
///         "puppies learning new tricks".to_string(),
///         "children growing up and getting old".to_string(),
///         "flowers wilting in a vase".to_string(),
///         "plants sprouting, blooming and wilting".to_string(),
///     ],
///     Label::D,
/// );
///
/// assert!(example.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Unique identifier within the dataset.
    pub id: String,

    /// The question stem.
    pub question: String,

    /// Option texts, in label order starting at `A`.
    pub options: Vec<String>,

    /// The correct answer.
    pub gold_answer: Label,

    /// Free-form annotations, e.g. a category or difficulty tag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Example {
    /// Create a new example with empty metadata.
    pub fn new(
        id: impl Into<String>,
        question: impl Into<String>,
        options: Vec<String>,
        gold_answer: Label,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            options,
            gold_answer,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Validate the example.
    ///
    /// Returns an error if:
    /// - The id or question is empty
    /// - There are fewer than 2 or more than 5 options
    /// - The gold answer does not point at an option
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push("id must not be empty".to_string());
        }

        if self.question.trim().is_empty() {
            errors.push("question must not be empty".to_string());
        }

        if self.options.len() < 2 || self.options.len() > 5 {
            errors.push(format!(
                "expected 2 to 5 options, found {}",
                self.options.len()
            ));
        }

        if self.gold_answer.index() >= self.options.len() {
            errors.push(format!(
                "gold answer {} has no matching option (only {} options)",
                self.gold_answer,
                self.options.len()
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    /// Render the options as lettered lines, one per option.
    ///
    /// ```text
    /// A. first option
    /// B. second option
    /// ```
    pub fn options_text(&self) -> String {
        self.options
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let letter = (b'A' + i as u8) as char;
                format!("{}. {}", letter, text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Letter Extraction
// ============================================================================

/// Extract a label from output that should be a bare letter.
///
/// Accepts the letter alone or followed by a delimiter (`"B"`, `"b."`,
/// `"B) because..."`), but rejects words that merely start with a letter
/// (`"Because"`). Only letters within `option_count` match.
pub fn leading_letter(output: &str, option_count: usize) -> Option<Label> {
    let trimmed = output.trim();
    let mut chars = trimmed.chars();
    let label = letter_label(chars.next()?, option_count)?;
    match chars.next() {
        None => Some(label),
        Some(next) if next.is_whitespace() || matches!(next, '.' | ')' | ':' | ',') => Some(label),
        Some(_) => None,
    }
}

/// Extract a label from the last `Answer:` marker in the output.
///
/// Chain-of-thought prompts ask the model to finish with `Answer: <letter>`;
/// this takes the text after the final occurrence of "answer"
/// (case-insensitive), strips punctuation such as `:`, `(` or `*`, and reads
/// the letter that follows.
pub fn answer_line_letter(output: &str, option_count: usize) -> Option<Label> {
    let lower = output.to_ascii_lowercase();
    let marker = lower.rfind("answer")?;
    let tail = output[marker + "answer".len()..]
        .trim_start()
        .trim_start_matches([':', '-', '*'])
        .trim_start()
        .trim_start_matches(['(', '[', '*']);

    let mut chars = tail.chars();
    let label = letter_label(chars.next()?, option_count)?;
    match chars.next() {
        None => Some(label),
        Some(next) if !next.is_ascii_alphanumeric() => Some(label),
        Some(_) => None,
    }
}

/// Extract the first standalone option letter anywhere in the output.
///
/// A letter counts as standalone when it is not part of a longer word or
/// number, so `"I think B is right"` yields `B` while `"cab"` yields
/// nothing. Case-insensitive, which means a lone `"a"` reads as `A`.
pub fn scan_letter(output: &str, option_count: usize) -> Option<Label> {
    let chars: Vec<char> = output.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        let Some(label) = letter_label(c, option_count) else {
            continue;
        };
        let prev_is_word = i > 0 && is_word_char(chars[i - 1]);
        let next_is_word = chars.get(i + 1).is_some_and(|&next| is_word_char(next));
        if !prev_is_word && !next_is_word {
            return Some(label);
        }
    }
    None
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn letter_label(c: char, option_count: usize) -> Option<Label> {
    let label = Label::from_letter(c)?;
    if label.index() < option_count {
        Some(label)
    } else {
        None
    }
}
