//! Append-only query history.
//!
//! Each answered question is one JSON line. Appends go through a single async
//! mutex and never rewrite earlier lines, so concurrent requests cannot lose
//! each other's entries.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::error::{ConciergeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryEntry {
  pub timestamp: DateTime<Utc>,
  pub question: String,
  /// Whatever was returned to the caller, success or error body
  pub response: serde_json::Value,
}

struct HistoryFile {
  path: PathBuf,
}

impl HistoryFile {
  fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
    let line = serde_json::to_string(entry)?;

    let mut file = OpenOptions::new().create(true).append(true).open(&self.path).map_err(|e| {
      ConciergeError::io_failure(format!("failed to open {}: {e}", self.path.display()))
    })?;
    writeln!(file, "{line}")?;
    file.flush()?;

    Ok(())
  }

  fn read_all(&self) -> Result<Vec<HistoryEntry>> {
    if !self.path.exists() {
      return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(&self.path)?);
    let mut entries = Vec::new();

    for (number, line) in reader.lines().enumerate() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      match serde_json::from_str::<HistoryEntry>(&line) {
        Ok(entry) => entries.push(entry),
        Err(e) => warn!("Skipping malformed history line {}: {e}", number + 1),
      }
    }

    Ok(entries)
  }
}

/// Shared handle to the history log; clones append to the same file
#[derive(Clone)]
pub struct QueryHistory {
  inner: Arc<tokio::sync::Mutex<HistoryFile>>,
}

impl QueryHistory {
  /// Open (creating if needed) the history log at `path`
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref().to_path_buf();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
      File::create(&path)?;
    }

    Ok(Self { inner: Arc::new(tokio::sync::Mutex::new(HistoryFile { path })) })
  }

  pub async fn record<T: Serialize>(&self, question: &str, response: &T) -> Result<()> {
    let entry = HistoryEntry {
      timestamp: Utc::now(),
      question: question.to_string(),
      response: serde_json::to_value(response)?,
    };

    let mut guard = self.inner.lock().await;
    guard.append(&entry)
  }

  /// The newest `limit` entries (all when `None`), oldest first
  pub async fn recent(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
    let guard = self.inner.lock().await;
    let mut entries = guard.read_all()?;

    if let Some(limit) = limit {
      let skip = entries.len().saturating_sub(limit);
      entries.drain(..skip);
    }
    Ok(entries)
  }

  /// Whole history as a pretty JSON array
  pub async fn export_json(&self) -> Result<String> {
    let entries = self.recent(None).await?;
    Ok(serde_json::to_string_pretty(&entries)?)
  }

  pub async fn path(&self) -> PathBuf {
    self.inner.lock().await.path.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tempfile::TempDir;

  #[tokio::test]
  async fn test_record_and_read_back() {
    let temp = TempDir::new().unwrap();
    let history = QueryHistory::open(temp.path().join("history.jsonl")).unwrap();

    history.record("cheapest booking in july", &json!({"hotel": "City Hotel"})).await.unwrap();
    history.record("empty", &json!({"error": "Invalid input"})).await.unwrap();

    let entries = history.recent(None).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].question, "cheapest booking in july");
    assert_eq!(entries[1].response, json!({"error": "Invalid input"}));
  }

  #[tokio::test]
  async fn test_recent_keeps_newest() {
    let temp = TempDir::new().unwrap();
    let history = QueryHistory::open(temp.path().join("history.jsonl")).unwrap();
    for i in 0..5 {
      history.record(&format!("q{i}"), &json!(i)).await.unwrap();
    }

    let questions: Vec<String> =
      history.recent(Some(2)).await.unwrap().into_iter().map(|e| e.question).collect();
    assert_eq!(questions, vec!["q3", "q4"]);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_appends_are_not_lost() {
    let temp = TempDir::new().unwrap();
    let history = QueryHistory::open(temp.path().join("history.jsonl")).unwrap();

    let tasks: Vec<_> = (0..50)
      .map(|i| {
        let history = history.clone();
        tokio::spawn(async move { history.record(&format!("question {i}"), &json!({"i": i})).await })
      })
      .collect();
    for task in tasks {
      task.await.unwrap().unwrap();
    }

    assert_eq!(history.recent(None).await.unwrap().len(), 50);
  }

  #[tokio::test]
  async fn test_malformed_lines_are_skipped() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("history.jsonl");
    let history = QueryHistory::open(&path).unwrap();
    history.record("kept", &json!(null)).await.unwrap();
    std::fs::OpenOptions::new().append(true).open(&path).unwrap().write_all(b"{truncated\n").unwrap();

    assert_eq!(history.recent(None).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_export_json_is_array() {
    let temp = TempDir::new().unwrap();
    let history = QueryHistory::open(temp.path().join("nested").join("history.jsonl")).unwrap();
    history.record("q", &json!({"price": 98.5})).await.unwrap();

    let exported: serde_json::Value = serde_json::from_str(&history.export_json().await.unwrap()).unwrap();
    assert_eq!(exported[0]["question"], "q");
  }
}
