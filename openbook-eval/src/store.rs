//! Example stores for evaluation runs.
//!
//! A store hands the harness an ordered set of [`Example`]s. Two backends are
//! provided: [`OpenBookQa`] (the native OpenBookQA JSONL release, downloaded
//! and cached on first use) and [`JsonFileStore`] (a plain JSON array for
//! custom question sets).
//!
//! Every store returns examples sorted by id, so a run over the same data is
//! reproducible regardless of how the backing file was written.

use openbook_core::{Example, Label};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::fs;

/// Errors that can occur while loading examples.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DataLoadError {
    /// Failed to download the dataset file.
    #[error("Failed to download dataset: {0}")]
    Download(String),

    /// Failed to read the dataset file.
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the dataset content.
    #[error("Failed to parse dataset: {0}")]
    Parse(String),

    /// The content parsed but violates the dataset contract.
    #[error("Dataset schema violation: {0}")]
    Schema(String),

    /// Failed to create the cache directory.
    #[error("Failed to create cache directory: {0}")]
    CacheDir(String),
}

/// A source of evaluation examples.
///
/// Implementations must return the same examples in the same order on every
/// call. Sampling and shuffling are the harness's job, keyed on the run seed,
/// so stores stay deterministic.
pub trait ExampleStore: Send + Sync {
    /// The name of this store (recorded in reports).
    fn name(&self) -> &str;

    /// Load all examples, sorted by id.
    fn load(&self) -> impl std::future::Future<Output = Result<Vec<Example>, DataLoadError>> + Send;
}

/// OpenBookQA dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Split {
    Train,
    /// Development set. The default for everyday runs.
    #[default]
    Dev,
    Test,
}

impl Split {
    fn file_name(&self) -> &'static str {
        match self {
            Split::Train => "train.jsonl",
            Split::Dev => "dev.jsonl",
            Split::Test => "test.jsonl",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Dev => write!(f, "dev"),
            Split::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            // "validation" is what the upstream release calls the dev split.
            "dev" | "validation" => Ok(Split::Dev),
            "test" => Ok(Split::Test),
            other => Err(format!(
                "unknown split '{}', expected train, dev, or test",
                other
            )),
        }
    }
}

/// The OpenBookQA multiple-choice dataset.
///
/// Downloads the requested split from the official release and caches it
/// locally, or reads a local JSONL file directly via [`OpenBookQa::from_file`].
#[derive(Debug, Clone)]
pub struct OpenBookQa {
    /// Cache directory, or the file itself when constructed from a path.
    path: PathBuf,
    url: String,
    split: Split,
    is_direct_path: bool,
}

impl OpenBookQa {
    const BASE_URL: &'static str =
        "https://raw.githubusercontent.com/allenai/OpenBookQA/master/data/OpenBookQA-V1-Sep2018/Data/Main";

    /// Create a store for the default (dev) split with the default cache
    /// location.
    pub fn new() -> Result<Self, DataLoadError> {
        Self::with_split(Split::default())
    }

    /// Create a store for a specific split with the default cache location.
    pub fn with_split(split: Split) -> Result<Self, DataLoadError> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| DataLoadError::CacheDir("Could not find cache directory".to_string()))?
            .join("openbook-eval")
            .join("openbookqa");
        Ok(Self::with_cache_dir(cache_dir, split))
    }

    /// Create a store with a custom cache directory.
    pub fn with_cache_dir(cache_dir: PathBuf, split: Split) -> Self {
        Self {
            path: cache_dir,
            url: format!("{}/{}", Self::BASE_URL, split.file_name()),
            split,
            is_direct_path: false,
        }
    }

    /// Read a local JSONL file in the native OpenBookQA format, skipping the
    /// download step entirely.
    pub fn from_file(path: PathBuf) -> Self {
        Self {
            path,
            url: String::new(),
            split: Split::default(),
            is_direct_path: true,
        }
    }

    /// The split this store serves.
    pub fn split(&self) -> Split {
        self.split
    }

    /// Path to the dataset file on disk.
    fn cache_path(&self) -> PathBuf {
        if self.is_direct_path {
            self.path.clone()
        } else {
            self.path.join(self.split.file_name())
        }
    }

    /// Download the dataset if it isn't already cached.
    async fn ensure_downloaded(&self) -> Result<PathBuf, DataLoadError> {
        let cache_path = self.cache_path();

        if cache_path.exists() {
            log::debug!("Using cached dataset at {:?}", cache_path);
            return Ok(cache_path);
        }

        if self.url.is_empty() {
            return Err(DataLoadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("OpenBookQA file not found: {:?}", cache_path),
            )));
        }

        if let Some(dir) = cache_path.parent() {
            fs::create_dir_all(dir).await.map_err(|e| {
                DataLoadError::CacheDir(format!("Failed to create {:?}: {}", dir, e))
            })?;
        }

        log::info!("Downloading OpenBookQA {} split from {}", self.split, self.url);

        let response = reqwest::get(&self.url)
            .await
            .map_err(|e| DataLoadError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DataLoadError::Download(format!(
                "HTTP {}: {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DataLoadError::Download(e.to_string()))?;

        fs::write(&cache_path, &bytes).await?;
        log::info!("Cached OpenBookQA {} split to {:?}", self.split, cache_path);

        Ok(cache_path)
    }
}

impl ExampleStore for OpenBookQa {
    fn name(&self) -> &str {
        "openbookqa"
    }

    async fn load(&self) -> Result<Vec<Example>, DataLoadError> {
        let path = self.ensure_downloaded().await?;
        let content = fs::read_to_string(&path).await?;
        parse_openbookqa_jsonl(&content)
    }
}

/// Raw JSONL entry in the native OpenBookQA format.
#[derive(Debug, Deserialize)]
struct OpenBookQaEntry {
    id: String,
    question: OpenBookQaQuestion,
    #[serde(rename = "answerKey")]
    answer_key: String,
}

#[derive(Debug, Deserialize)]
struct OpenBookQaQuestion {
    stem: String,
    choices: Vec<OpenBookQaChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenBookQaChoice {
    text: String,
    label: String,
}

fn parse_openbookqa_jsonl(content: &str) -> Result<Vec<Example>, DataLoadError> {
    let mut examples = Vec::new();
    let mut seen_ids = BTreeSet::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: OpenBookQaEntry = serde_json::from_str(line)
            .map_err(|e| DataLoadError::Parse(format!("line {}: {}", idx + 1, e)))?;
        let OpenBookQaEntry {
            id,
            question,
            answer_key,
        } = entry;

        if !seen_ids.insert(id.clone()) {
            return Err(DataLoadError::Schema(format!(
                "duplicate example id '{}'",
                id
            )));
        }

        if question.choices.len() > Label::ALL.len() {
            return Err(DataLoadError::Schema(format!(
                "example '{}' has {} choices, expected at most {}",
                id,
                question.choices.len(),
                Label::ALL.len()
            )));
        }

        // Choice labels must be exactly A, B, C, ... in order, so the choice
        // index and the answer letter agree.
        let mut options = Vec::with_capacity(question.choices.len());
        for (i, choice) in question.choices.into_iter().enumerate() {
            let expected = Label::ALL[i].letter();
            if !(choice.label.len() == 1 && choice.label.starts_with(expected)) {
                return Err(DataLoadError::Schema(format!(
                    "example '{}': choice {} is labelled '{}', expected '{}'",
                    id, i, choice.label, expected
                )));
            }
            options.push(choice.text);
        }

        let gold_answer = answer_key.parse::<Label>().map_err(|_| {
            DataLoadError::Schema(format!(
                "example '{}': answerKey '{}' is not an option letter",
                id, answer_key
            ))
        })?;
        if gold_answer.index() >= options.len() {
            return Err(DataLoadError::Schema(format!(
                "example '{}': answerKey '{}' does not match any choice",
                id, answer_key
            )));
        }

        let example = Example::new(id, question.stem, options, gold_answer);
        if let Err(e) = example.validate() {
            return Err(DataLoadError::Schema(format!(
                "example '{}': {}",
                example.id, e
            )));
        }
        examples.push(example);
    }

    // Sort by id for deterministic ordering
    examples.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(examples)
}

/// A question set stored as a plain JSON array.
///
/// Each entry has the shape
/// `{"id", "question", "options", "answer", "category"?}` where `answer` is
/// the gold option letter and `category`, when present, lands in the
/// example's metadata for per-category breakdowns.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    name: String,
}

impl JsonFileStore {
    /// Create a store from a JSON file path. The store name is derived from
    /// the file stem.
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("json_store")
            .to_string();
        Self { path, name }
    }

    /// Override the store name recorded in reports.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Raw entry in the custom JSON format.
#[derive(Debug, Deserialize)]
struct JsonEntry {
    id: String,
    question: String,
    options: Vec<String>,
    answer: String,
    #[serde(default)]
    category: Option<String>,
}

impl ExampleStore for JsonFileStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Vec<Example>, DataLoadError> {
        let content = fs::read_to_string(&self.path).await?;
        let entries: Vec<JsonEntry> =
            serde_json::from_str(&content).map_err(|e| DataLoadError::Parse(e.to_string()))?;

        let mut examples = Vec::with_capacity(entries.len());
        let mut seen_ids = BTreeSet::new();

        for entry in entries {
            if !seen_ids.insert(entry.id.clone()) {
                return Err(DataLoadError::Schema(format!(
                    "duplicate example id '{}'",
                    entry.id
                )));
            }

            let gold_answer = entry.answer.parse::<Label>().map_err(|e| {
                DataLoadError::Schema(format!("example '{}': {}", entry.id, e))
            })?;

            let mut example = Example::new(entry.id, entry.question, entry.options, gold_answer);
            if let Some(category) = entry.category {
                example = example.with_metadata("category", category);
            }
            if let Err(e) = example.validate() {
                return Err(DataLoadError::Schema(format!(
                    "example '{}': {}",
                    example.id, e
                )));
            }
            examples.push(example);
        }

        examples.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(examples)
    }
}
