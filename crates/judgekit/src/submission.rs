//! Submission records and their persistence

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::types::TestResult;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("submission store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed submission record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Aggregate verdict of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Passed,
    Failed,
    Partial,
}

impl OverallStatus {
    /// Passed needs at least one case and no failures; Failed means nothing passed
    pub fn from_counts(passed: usize, total: usize) -> Self {
        if total > 0 && passed == total {
            Self::Passed
        } else if passed == 0 {
            Self::Failed
        } else {
            Self::Partial
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Partial => "PARTIAL",
        };
        f.write_str(s)
    }
}

/// Persisted record of one full evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub question_id: String,
    pub language: String,
    pub code: String,
    pub test_results: Vec<TestResult>,
    pub passed_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    /// Milliseconds spent executing
    pub execution_time: u64,
    pub overall_status: OverallStatus,
}

impl SubmissionResult {
    /// Build a new record with a fresh id, stamped with the current time
    pub fn from_results(
        question_id: impl Into<String>,
        language: impl Into<String>,
        code: impl Into<String>,
        test_results: Vec<TestResult>,
        execution_time: u64,
    ) -> Self {
        let total_count = test_results.len();
        let passed_count = test_results.iter().filter(|r| r.passed).count();
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: None,
            question_id: question_id.into(),
            language: language.into(),
            code: code.into(),
            test_results,
            passed_count,
            failed_count: total_count - passed_count,
            total_count,
            execution_time,
            overall_status: OverallStatus::from_counts(passed_count, total_count),
        }
    }

    /// Attribute the record to a user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Persistence for finished submissions
#[async_trait]
pub trait SubmissionStore: Send + Sync + std::fmt::Debug {
    async fn save(&self, submission: &SubmissionResult) -> Result<(), SubmissionError>;

    /// Submissions for a question, oldest first
    async fn list(&self, question_id: &str) -> Result<Vec<SubmissionResult>, SubmissionError>;

    async fn get(&self, id: Uuid) -> Result<Option<SubmissionResult>, SubmissionError>;
}

/// Store keeping submissions in process memory
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    submissions: RwLock<HashMap<Uuid, SubmissionResult>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.submissions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.submissions.read().await.is_empty()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn save(&self, submission: &SubmissionResult) -> Result<(), SubmissionError> {
        self.submissions
            .write()
            .await
            .insert(submission.id, submission.clone());
        Ok(())
    }

    async fn list(&self, question_id: &str) -> Result<Vec<SubmissionResult>, SubmissionError> {
        let mut found: Vec<_> = self
            .submissions
            .read()
            .await
            .values()
            .filter(|s| s.question_id == question_id)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.timestamp);
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<Option<SubmissionResult>, SubmissionError> {
        Ok(self.submissions.read().await.get(&id).cloned())
    }
}

/// Store writing one JSON file per submission into a directory
#[derive(Debug, Clone)]
pub struct DirectorySubmissionStore {
    dir: PathBuf,
}

impl DirectorySubmissionStore {
    /// The directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read_record(path: &Path) -> Result<SubmissionResult, SubmissionError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl SubmissionStore for DirectorySubmissionStore {
    #[instrument(skip(self, submission), fields(id = %submission.id))]
    async fn save(&self, submission: &SubmissionResult) -> Result<(), SubmissionError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.record_path(submission.id);
        let content = serde_json::to_string_pretty(submission)?;
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), "saved submission");
        Ok(())
    }

    async fn list(&self, question_id: &str) -> Result<Vec<SubmissionResult>, SubmissionError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let record = Self::read_record(&path).await?;
            if record.question_id == question_id {
                found.push(record);
            }
        }
        found.sort_by_key(|s| s.timestamp);
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<Option<SubmissionResult>, SubmissionError> {
        match Self::read_record(&self.record_path(id)).await {
            Ok(record) => Ok(Some(record)),
            Err(SubmissionError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(description: &str, passed: bool) -> TestResult {
        TestResult {
            test_case: description.to_string(),
            expected: "1".to_string(),
            actual: if passed { "1" } else { "2" }.to_string(),
            passed,
            input: String::new(),
        }
    }

    #[test]
    fn overall_status() {
        assert_eq!(OverallStatus::from_counts(3, 3), OverallStatus::Passed);
        assert_eq!(OverallStatus::from_counts(0, 3), OverallStatus::Failed);
        assert_eq!(OverallStatus::from_counts(1, 3), OverallStatus::Partial);
        assert_eq!(OverallStatus::from_counts(0, 0), OverallStatus::Failed);
    }

    #[test]
    fn counts_follow_results() {
        let submission = SubmissionResult::from_results(
            "q1",
            "python",
            "print(1)",
            vec![result("a", true), result("b", false), result("c", true)],
            42,
        );
        assert_eq!(submission.total_count, 3);
        assert_eq!(submission.passed_count, 2);
        assert_eq!(submission.failed_count, 1);
        assert_eq!(submission.overall_status, OverallStatus::Partial);
        assert_eq!(submission.execution_time, 42);
        assert!(submission.user_id.is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let submission =
            SubmissionResult::from_results("q1", "python", "", vec![result("a", true)], 1)
                .with_user("user-1");
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["questionId"], "q1");
        assert_eq!(json["overallStatus"], "PASSED");
        assert_eq!(json["userId"], "user-1");
    }

    #[tokio::test]
    async fn memory_store() {
        let store = MemorySubmissionStore::new();
        let first = SubmissionResult::from_results("q1", "python", "", vec![], 1);
        let other = SubmissionResult::from_results("q2", "python", "", vec![], 1);
        store.save(&first).await.unwrap();
        store.save(&other).await.unwrap();

        assert_eq!(store.len().await, 2);
        let listed = store.list("q1").await.unwrap();
        assert_eq!(listed, vec![first.clone()]);
        assert_eq!(store.get(first.id).await.unwrap(), Some(first));
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectorySubmissionStore::new(dir.path().join("submissions"));

        assert!(store.list("q1").await.unwrap().is_empty());

        let submission =
            SubmissionResult::from_results("q1", "python", "print(1)", vec![result("a", true)], 7);
        store.save(&submission).await.unwrap();

        let loaded = store.get(submission.id).await.unwrap().unwrap();
        assert_eq!(loaded, submission);
        assert_eq!(store.list("q1").await.unwrap().len(), 1);
        assert!(store.list("q2").await.unwrap().is_empty());
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
