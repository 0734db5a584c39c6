//! Transient description of one backup attempt.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct BackupAttempt {
    pub id: String,
    pub target: PathBuf,
    pub outcome: AttemptOutcome,
    pub diagnostics: Option<String>,
}

impl BackupAttempt {
    pub fn new(started_at: DateTime<Utc>, dir: &Path, extension: &str) -> Self {
        let id = attempt_id(started_at);
        let target = dir.join(format!("backup-{id}.{extension}"));
        Self {
            id,
            target,
            outcome: AttemptOutcome::Pending,
            diagnostics: None,
        }
    }

    pub fn succeed(&mut self, diagnostics: Option<String>) {
        self.outcome = AttemptOutcome::Succeeded;
        self.diagnostics = diagnostics;
    }

    pub fn fail(&mut self) {
        self.outcome = AttemptOutcome::Failed;
    }
}

/// ISO-8601 timestamp with `:` and `.` replaced so it is safe in file names.
pub fn attempt_id(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}
