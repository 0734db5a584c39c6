//! Configuration management for the backup service.
//!
//! Loads configuration from an optional TOML file, then applies environment
//! variable overrides (a `.env` file in the working directory is honoured).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backup: BackupConfig,
    pub schedule: ScheduleConfig,
    pub retention: RetentionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory snapshots are written to, created on demand
    pub dir: PathBuf,

    /// Snapshot file extension (without the dot)
    pub extension: String,

    /// Name of the environment variable holding the connection string
    pub database_url_var: String,

    /// Explicit dump program, bypassing platform lookup
    pub dump_program: Option<PathBuf>,

    /// Arguments placed before the generated pg_dump arguments
    pub dump_program_args: Vec<String>,

    /// Kill the dump after this many seconds (unset = wait forever)
    pub dump_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Six-field cron expression, evaluated in local time
    pub cron: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Snapshots strictly older than this are deleted
    pub max_age_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backups"),
            extension: "dump".to_string(),
            database_url_var: "DATABASE_URL".to_string(),
            dump_program: None,
            dump_program_args: Vec::new(),
            dump_timeout_secs: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 0 * * *".to_string(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { max_age_days: 7 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BackupConfig {
    pub fn dump_timeout(&self) -> Option<Duration> {
        self.dump_timeout_secs.map(Duration::from_secs)
    }
}

impl RetentionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days.saturating_mul(24 * 60 * 60))
    }
}

impl Config {
    /// Load configuration from a TOML file, or defaults when no file is given,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("BACKUP_DIR") {
            self.backup.dir = PathBuf::from(dir);
        }
        if let Some(name) = var("BACKUP_DATABASE_URL_VAR") {
            self.backup.database_url_var = name;
        }
        if let Some(program) = var("BACKUP_DUMP_PROGRAM") {
            self.backup.dump_program = Some(PathBuf::from(program));
        }
        if let Some(secs) = var("BACKUP_DUMP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.backup.dump_timeout_secs = Some(secs);
        }
        if let Some(cron) = var("BACKUP_SCHEDULE") {
            self.schedule.cron = cron;
        }
        if let Some(days) = var("BACKUP_RETENTION_DAYS").and_then(|v| v.parse().ok()) {
            self.retention.max_age_days = days;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log.level = level;
        }
    }
}
