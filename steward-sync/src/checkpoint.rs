//! Durable checkpoint store for batch runs.
//!
//! Layout under `<state_dir>/checkpoints/`:
//! - `<batch>.json` — latest-state index, one entry per item, written
//!   atomically (`.tmp` + rename) after every transition;
//! - `<batch>.log.jsonl` — append-only event log, one JSON record per line,
//!   kept for audit and post-mortems.
//!
//! The index is authoritative for resume decisions. An unreadable index or a
//! corrupt interior log line is [`SyncError::CheckpointCorruption`], which is
//! fatal to the whole run. A torn final log line (crash mid-append) is
//! tolerated and logged.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use steward_core::types::{JobStatus, RepoName};

use crate::error::{io_err, SyncError};

/// Latest recorded state for one batch item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub repository: RepoName,
    pub item_key: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointIndex {
    entries: BTreeMap<String, CheckpointEntry>,
}

/// Per-batch checkpoint store.
#[derive(Debug)]
pub struct CheckpointStore {
    index_path: PathBuf,
    log_path: PathBuf,
    index: CheckpointIndex,
}

impl CheckpointStore {
    /// Open (or create) the store for `batch` under `state_dir`.
    pub fn open_at(state_dir: &Path, batch: &str) -> Result<Self, SyncError> {
        let dir = state_dir.join("checkpoints");
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let index_path = dir.join(format!("{batch}.json"));
        let log_path = dir.join(format!("{batch}.log.jsonl"));

        let index = if index_path.exists() {
            let contents =
                std::fs::read_to_string(&index_path).map_err(|e| io_err(&index_path, e))?;
            serde_json::from_str(&contents).map_err(|e| SyncError::CheckpointCorruption {
                path: index_path.clone(),
                detail: e.to_string(),
            })?
        } else {
            CheckpointIndex::default()
        };

        let store = Self {
            index_path,
            log_path,
            index,
        };
        store.validate_log()?;
        Ok(store)
    }

    fn validate_log(&self) -> Result<(), SyncError> {
        if !self.log_path.exists() {
            return Ok(());
        }
        let contents =
            std::fs::read_to_string(&self.log_path).map_err(|e| io_err(&self.log_path, e))?;
        let lines: Vec<&str> = contents.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if let Err(err) = serde_json::from_str::<CheckpointEntry>(line) {
                // A torn final line means the process died mid-append; the
                // index already holds the last durable state.
                if i + 1 == lines.len() {
                    tracing::warn!(
                        path = %self.log_path.display(),
                        "ignoring torn final checkpoint log line"
                    );
                    return Ok(());
                }
                return Err(SyncError::CheckpointCorruption {
                    path: self.log_path.clone(),
                    detail: format!("undecodable log line {}: {err}", i + 1),
                });
            }
        }
        Ok(())
    }

    pub fn entry(&self, item_key: &str) -> Option<&CheckpointEntry> {
        self.index.entries.get(item_key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CheckpointEntry> {
        self.index.entries.values()
    }

    pub fn is_completed(&self, item_key: &str) -> bool {
        self.entry(item_key)
            .map(|e| e.status == JobStatus::Completed)
            .unwrap_or(false)
    }

    pub fn is_failed(&self, item_key: &str) -> bool {
        self.entry(item_key)
            .map(|e| e.status == JobStatus::Failed)
            .unwrap_or(false)
    }

    pub fn mark_started(&mut self, repository: &RepoName, item_key: &str) -> Result<(), SyncError> {
        let attempts = self.entry(item_key).map(|e| e.attempts).unwrap_or(0) + 1;
        self.record(repository, item_key, JobStatus::InProgress, None, attempts)
    }

    pub fn mark_completed(
        &mut self,
        repository: &RepoName,
        item_key: &str,
    ) -> Result<(), SyncError> {
        let attempts = self.entry(item_key).map(|e| e.attempts).unwrap_or(1);
        self.record(repository, item_key, JobStatus::Completed, None, attempts)
    }

    pub fn mark_failed(
        &mut self,
        repository: &RepoName,
        item_key: &str,
        error: &str,
    ) -> Result<(), SyncError> {
        let attempts = self.entry(item_key).map(|e| e.attempts).unwrap_or(1);
        self.record(
            repository,
            item_key,
            JobStatus::Failed,
            Some(error.to_string()),
            attempts,
        )
    }

    pub fn mark_conflicted(
        &mut self,
        repository: &RepoName,
        item_key: &str,
        detail: &str,
    ) -> Result<(), SyncError> {
        let attempts = self.entry(item_key).map(|e| e.attempts).unwrap_or(1);
        self.record(
            repository,
            item_key,
            JobStatus::Conflicted,
            Some(detail.to_string()),
            attempts,
        )
    }

    fn record(
        &mut self,
        repository: &RepoName,
        item_key: &str,
        status: JobStatus,
        last_error: Option<String>,
        attempts: u32,
    ) -> Result<(), SyncError> {
        let entry = CheckpointEntry {
            repository: repository.clone(),
            item_key: item_key.to_string(),
            status,
            last_error,
            attempts,
            timestamp: Utc::now(),
        };

        let line = serde_json::to_string(&entry)?;
        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| io_err(&self.log_path, e))?;
        writeln!(log, "{line}").map_err(|e| io_err(&self.log_path, e))?;

        self.index.entries.insert(item_key.to_string(), entry);
        self.save_index()
    }

    fn save_index(&self) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(&self.index)?;
        let tmp = self.index_path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.index_path).map_err(|e| io_err(&self.index_path, e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
