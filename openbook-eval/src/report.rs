//! Persisting and browsing run reports.

use crate::results::RunResult;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors that can occur while reading or writing reports.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error("Failed to access report storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stores run reports as pretty-printed JSON files in a directory.
///
/// Filenames embed the start time, agent name, and a run id prefix
/// (`20260821_153000_direct_1a2b3c4d.json`), so a plain lexicographic sort
/// of the directory is also a chronological one.
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    dir: PathBuf,
}

impl JsonReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory reports are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a report, creating the directory on demand. Returns the path
    /// the report was written to.
    pub async fn persist(&self, result: &RunResult) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(report_file_name(result));
        let json = serde_json::to_string_pretty(result)?;
        fs::write(&path, json).await?;

        Ok(path)
    }

    /// Load a stored report.
    pub async fn load(&self, path: &Path) -> Result<RunResult, PersistenceError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// List stored report paths, newest first.
    pub async fn list(&self) -> Result<Vec<PathBuf>, PersistenceError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                paths.push(path);
            }
        }

        paths.sort();
        paths.reverse();
        Ok(paths)
    }
}

fn report_file_name(result: &RunResult) -> String {
    let timestamp = result.started_at.format("%Y%m%d_%H%M%S");
    let run_prefix: String = result.run_id.chars().take(8).collect();
    format!(
        "{}_{}_{}.json",
        timestamp,
        sanitize(&result.agent),
        run_prefix
    )
}

/// Agent names land in filenames; replace the characters that don't belong
/// there.
fn sanitize(name: &str) -> String {
    name.replace(['/', ':', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::RunParameters;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn result_with(run_id: &str, agent: &str, started_at: chrono::DateTime<Utc>) -> RunResult {
        RunResult {
            run_id: run_id.to_string(),
            seed: 0,
            started_at,
            agent: agent.to_string(),
            model: "gpt-4o-mini".to_string(),
            dataset: "openbookqa".to_string(),
            config: RunParameters {
                timeout: Duration::from_secs(60),
                concurrency: 5,
                category_field: None,
            },
            is_partial: false,
            total_examples: 0,
            correct: 0,
            error_count: 0,
            accuracy: 0.0,
            per_category: Default::default(),
            total_duration: Duration::from_millis(100),
            total_tokens: 0,
            predictions: Vec::new(),
        }
    }

    #[test]
    fn test_report_file_name() {
        let result = result_with(
            "1a2b3c4d-9999-8888-7777-666655554444",
            "direct",
            Utc.with_ymd_and_hms(2026, 8, 21, 15, 30, 0).unwrap(),
        );
        assert_eq!(
            report_file_name(&result),
            "20260821_153000_direct_1a2b3c4d.json"
        );
    }

    #[test]
    fn test_sanitize_replaces_path_characters() {
        assert_eq!(sanitize("org/model: v2"), "org_model__v2");
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonReportSink::new(dir.path());
        let result = result_with(
            "aaaa1111-0000-0000-0000-000000000000",
            "direct",
            Utc.with_ymd_and_hms(2026, 8, 21, 10, 0, 0).unwrap(),
        );

        let path = sink.persist(&result).await.unwrap();
        assert!(path.exists());

        let loaded = sink.load(&path).await.unwrap();
        assert_eq!(loaded, result);
    }

    #[tokio::test]
    async fn test_persist_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports").join("deep");
        let sink = JsonReportSink::new(&nested);
        let result = result_with(
            "bbbb2222-0000-0000-0000-000000000000",
            "direct",
            Utc.with_ymd_and_hms(2026, 8, 21, 10, 0, 0).unwrap(),
        );

        let path = sink.persist(&result).await.unwrap();
        assert!(path.starts_with(&nested));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonReportSink::new(dir.path());

        let oldest = result_with(
            "cccc3333-0000-0000-0000-000000000000",
            "direct",
            Utc.with_ymd_and_hms(2026, 8, 19, 9, 0, 0).unwrap(),
        );
        let middle = result_with(
            "dddd4444-0000-0000-0000-000000000000",
            "cot",
            Utc.with_ymd_and_hms(2026, 8, 20, 9, 0, 0).unwrap(),
        );
        let newest = result_with(
            "eeee5555-0000-0000-0000-000000000000",
            "direct",
            Utc.with_ymd_and_hms(2026, 8, 21, 9, 0, 0).unwrap(),
        );

        let oldest_path = sink.persist(&oldest).await.unwrap();
        let newest_path = sink.persist(&newest).await.unwrap();
        let middle_path = sink.persist(&middle).await.unwrap();

        let listed = sink.list().await.unwrap();
        assert_eq!(listed, vec![newest_path, middle_path, oldest_path]);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let sink = JsonReportSink::new("/nonexistent/report-dir");
        let listed = sink.list().await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_non_json_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), "not a report")
            .await
            .unwrap();

        let sink = JsonReportSink::new(dir.path());
        let result = result_with(
            "ffff6666-0000-0000-0000-000000000000",
            "direct",
            Utc.with_ymd_and_hms(2026, 8, 21, 10, 0, 0).unwrap(),
        );
        sink.persist(&result).await.unwrap();

        let listed = sink.list().await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
