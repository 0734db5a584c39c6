use crate::config::BackupConfig;
use crate::error::{BackupError, Result};
use crate::models::backup_attempt::BackupAttempt;
use crate::services::dump_tool::{self, DumpTool};
use crate::services::retention::{RetentionPolicy, RetentionSweeper, SweepReport};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Result of a successful attempt, including the retention sweep it triggered.
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub attempt: BackupAttempt,
    pub sweep: SweepReport,
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Runs one `pg_dump` snapshot at a time into the backup directory.
pub struct BackupRunner {
    config: BackupConfig,
    sweeper: RetentionSweeper,
    env: EnvLookup,
    in_flight: Mutex<()>,
}

impl BackupRunner {
    pub fn new(config: BackupConfig, policy: RetentionPolicy) -> Self {
        let sweeper = RetentionSweeper::new(config.dir.clone(), policy);
        Self {
            config,
            sweeper,
            env: Arc::new(|key: &str| std::env::var(key).ok()),
            in_flight: Mutex::new(()),
        }
    }

    /// Replace the process environment as the source of the connection string.
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Arc::new(lookup);
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.config.dir
    }

    /// Execute one backup attempt. Every outcome is logged here; the returned
    /// value is for on-demand callers.
    pub async fn run(&self) -> Result<BackupReport> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("[DB Backup] Previous attempt still running, skipping");
            return Err(BackupError::AlreadyRunning);
        };

        let mut attempt = BackupAttempt::new(
            chrono::Utc::now(),
            &self.config.dir,
            &self.config.extension,
        );
        tracing::info!(attempt = %attempt.id, "[DB Backup] Starting backup");

        if let Err(source) = tokio::fs::create_dir_all(&self.config.dir).await {
            attempt.fail();
            let err = BackupError::Storage {
                path: self.config.dir.clone(),
                source,
            };
            tracing::error!(attempt = %attempt.id, error = %err, "[DB Backup] Backup failed");
            return Err(err);
        }

        let database_url = match read_database_url(&self.config.database_url_var, &*self.env) {
            Ok(url) => url,
            Err(err) => {
                attempt.fail();
                tracing::error!(attempt = %attempt.id, error = %err, "[DB Backup] Backup aborted");
                return Err(err);
            }
        };

        let program =
            dump_tool::resolve(std::env::consts::OS, self.config.dump_program.as_deref()).await;
        let tool = DumpTool::new(program).with_args(self.config.dump_program_args.clone());

        let mut output = PartialOutput::new(attempt.target.clone());
        match self.dump(&tool, &database_url, &attempt.target).await {
            Ok(diagnostics) => {
                output.keep();
                if let Some(text) = &diagnostics {
                    tracing::info!(
                        attempt = %attempt.id,
                        diagnostics = %text,
                        "[DB Backup] pg_dump reported diagnostics"
                    );
                }
                attempt.succeed(diagnostics);
                tracing::info!(
                    attempt = %attempt.id,
                    path = %attempt.target.display(),
                    "[DB Backup] Created backup"
                );
            }
            Err(err) => {
                attempt.fail();
                tracing::error!(attempt = %attempt.id, error = %err, "[DB Backup] Backup failed");
                return Err(err);
            }
        }

        let sweep = self.sweeper.sweep().await;
        Ok(BackupReport { attempt, sweep })
    }

    /// Run the dump and classify it. `Ok(Some(_))` carries stderr text from a
    /// successful run.
    async fn dump(
        &self,
        tool: &DumpTool,
        database_url: &str,
        target: &Path,
    ) -> Result<Option<String>> {
        let child = Command::new(&tool.program)
            .args(tool.args(database_url, target))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackupError::Process(format!(
                    "failed to launch {}: {e}",
                    tool.program.display()
                ))
            })?;

        let output = match self.config.dump_timeout() {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    BackupError::Process(format!("pg_dump timed out after {}s", limit.as_secs()))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| BackupError::Process(format!("failed waiting for pg_dump: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(BackupError::Process(format!(
                "pg_dump exited with {}: {}",
                output.status, stderr
            )));
        }

        Ok((!stderr.is_empty()).then_some(stderr))
    }
}

fn read_database_url(var: &str, env: &dyn Fn(&str) -> Option<String>) -> Result<String> {
    match env(var) {
        Some(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(BackupError::Configuration(format!("{var} is not set"))),
    }
}

/// Dump target that is removed on drop unless the dump completed. Covers
/// failed exits as well as an attempt dropped mid-dump (timeout, shutdown).
struct PartialOutput {
    path: PathBuf,
    keep: bool,
}

impl PartialOutput {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "[DB Backup] Removed partial output")
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "[DB Backup] Could not remove partial output"
            ),
        }
    }
}
