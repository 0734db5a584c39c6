//! Age-based pruning of the snapshot directory.
//!
//! Every entry is evaluated on its own task. A failed stat or delete is
//! logged and counted for that entry only; siblings are unaffected and the
//! sweep never fails as a whole.

use crate::error::CleanupError;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinSet;

/// Maximum age a snapshot may reach before it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl RetentionPolicy {
    /// Age strictly greater than the threshold is eligible; equal is retained.
    pub fn is_expired(&self, modified: SystemTime, now: SystemTime) -> bool {
        now.duration_since(modified).unwrap_or_default() > self.max_age
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub deleted: usize,
    pub retained: usize,
    pub failed: usize,
}

enum EntryResult {
    Deleted,
    Retained,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    dir: PathBuf,
    policy: RetentionPolicy,
}

impl RetentionSweeper {
    pub fn new(dir: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete every entry older than the policy allows and wait for all
    /// per-entry work to finish.
    pub async fn sweep(&self) -> SweepReport {
        let now = SystemTime::now();
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(source) => {
                let err = CleanupError::ReadDir {
                    path: self.dir.clone(),
                    source,
                };
                tracing::error!(error = %err, "[Retention] Cleanup skipped");
                return report;
            }
        };

        let mut tasks = JoinSet::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let policy = self.policy;
                    tasks.spawn(sweep_entry(entry.path(), policy, now));
                }
                Ok(None) => break,
                Err(source) => {
                    let err = CleanupError::ReadDir {
                        path: self.dir.clone(),
                        source,
                    };
                    tracing::error!(error = %err, "[Retention] Directory listing interrupted");
                    report.failed += 1;
                    break;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            report.examined += 1;
            match joined {
                Ok(EntryResult::Deleted) => report.deleted += 1,
                Ok(EntryResult::Retained) => report.retained += 1,
                Ok(EntryResult::Failed) => report.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "[Retention] Cleanup task aborted");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            dir = %self.dir.display(),
            examined = report.examined,
            deleted = report.deleted,
            failed = report.failed,
            "[Retention] Sweep finished"
        );
        report
    }
}

async fn sweep_entry(path: PathBuf, policy: RetentionPolicy, now: SystemTime) -> EntryResult {
    let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(source) => {
            let err = CleanupError::Metadata { path, source };
            tracing::error!(error = %err, "[Retention] Cleanup error");
            return EntryResult::Failed;
        }
    };

    if !policy.is_expired(modified, now) {
        return EntryResult::Retained;
    }

    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            tracing::info!(path = %path.display(), "[Retention] Removed old backup");
            EntryResult::Deleted
        }
        Err(source) => {
            let err = CleanupError::Remove { path, source };
            tracing::error!(error = %err, "[Retention] Cleanup error");
            EntryResult::Failed
        }
    }
}
