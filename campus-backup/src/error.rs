//! Error types for backup attempts and retention sweeps.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single backup attempt. Always terminal for that attempt only.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: cannot prepare {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("A backup attempt is already running")]
    AlreadyRunning,
}

/// Failure of one unit of cleanup work. Logged and counted, never returned
/// from an attempt.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("cannot read backup directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot stat {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot delete {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BackupError>;
