use crate::services::db_backup::{BackupReport, BackupRunner};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Owns the daily backup trigger. Unarmed until `start`; `shutdown` returns
/// it to Unarmed and a later `start` arms it again on a fresh job scheduler.
pub struct BackupScheduler {
    scheduler: Mutex<Option<JobScheduler>>,
    runner: Arc<BackupRunner>,
    cron_expression: String,
    job_id: Mutex<Option<Uuid>>,
}

impl BackupScheduler {
    pub async fn new(runner: Arc<BackupRunner>, cron_expression: &str) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(Some(scheduler)),
            runner,
            cron_expression: cron_expression.to_string(),
            job_id: Mutex::new(None),
        })
    }

    /// Arm the recurring trigger. Calling this again while armed is a no-op.
    pub async fn start(&self) -> anyhow::Result<()> {
        let mut job_id = self.job_id.lock().await;
        if let Some(id) = *job_id {
            tracing::debug!(job_id = %id, "Backup service already armed");
            return Ok(());
        }

        let runner = self.runner.clone();
        let job = Job::new_async_tz(
            self.cron_expression.as_str(),
            chrono::Local,
            move |_uuid, _lock| {
                let runner = runner.clone();
                Box::pin(async move {
                    // Outcome is logged by the runner; a failure must not disarm the job.
                    let _ = runner.run().await;
                })
            },
        )?;

        let mut slot = self.scheduler.lock().await;
        let scheduler = match slot.as_ref() {
            Some(scheduler) => scheduler.clone(),
            None => {
                let scheduler = JobScheduler::new().await?;
                *slot = Some(scheduler.clone());
                scheduler
            }
        };

        let id = scheduler.add(job).await?;
        if let Err(e) = scheduler.start().await {
            if let Err(remove_err) = scheduler.remove(&id).await {
                tracing::warn!(job_id = %id, error = %remove_err, "Failed to remove unstarted job");
            }
            return Err(e.into());
        }
        *job_id = Some(id);

        tracing::info!(
            job_id = %id,
            cron = %self.cron_expression,
            dir = %self.runner.backup_dir().display(),
            "Backup service armed"
        );
        Ok(())
    }

    pub async fn is_armed(&self) -> bool {
        self.job_id.lock().await.is_some()
    }

    pub async fn job_id(&self) -> Option<Uuid> {
        *self.job_id.lock().await
    }

    /// The runner behind the schedule, for on-demand attempts.
    pub fn runner(&self) -> Arc<BackupRunner> {
        self.runner.clone()
    }

    /// Run one attempt now, outside the schedule.
    pub async fn run_now(&self) -> crate::Result<BackupReport> {
        tracing::info!("On-demand backup requested");
        self.runner.run().await
    }

    /// Stop the trigger. The job scheduler is discarded; `start` builds a new one.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let mut job_id = self.job_id.lock().await;
        if job_id.take().is_none() {
            return Ok(());
        }
        if let Some(mut scheduler) = self.scheduler.lock().await.take() {
            scheduler.shutdown().await?;
        }
        tracing::info!("Backup service disarmed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackupConfig;
    use crate::services::retention::RetentionPolicy;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    const EVERY_SECOND: &str = "* * * * * *";

    fn runner(dir: &Path) -> Arc<BackupRunner> {
        let config = BackupConfig {
            dir: dir.to_path_buf(),
            ..BackupConfig::default()
        };
        Arc::new(BackupRunner::new(config, RetentionPolicy::default()).with_env_lookup(|_| None))
    }

    /// Runner whose dump appends a line to `marker` and then fails.
    #[cfg(unix)]
    fn failing_runner(dir: &Path, marker: &Path) -> Arc<BackupRunner> {
        let config = BackupConfig {
            dir: dir.to_path_buf(),
            dump_program: Some(PathBuf::from("sh")),
            dump_program_args: vec![
                "-c".into(),
                format!("echo hit >> '{}'; exit 1", marker.display()),
                "sh".into(),
            ],
            ..BackupConfig::default()
        };
        let runner = BackupRunner::new(config, RetentionPolicy::default())
            .with_env_lookup(|_| Some("postgres://localhost/campus".to_string()));
        Arc::new(runner)
    }

    #[cfg(unix)]
    fn hits(marker: &Path) -> usize {
        std::fs::read_to_string(marker)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let scheduler = BackupScheduler::new(runner(temp_dir.path()), "0 0 0 * * *").await?;
        assert!(!scheduler.is_armed().await);

        scheduler.start().await?;
        let first = scheduler.job_id().await;
        scheduler.start().await?;

        assert!(scheduler.is_armed().await);
        assert!(first.is_some());
        assert_eq!(scheduler.job_id().await, first);

        scheduler.shutdown().await?;
        assert!(!scheduler.is_armed().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_cron_stays_unarmed() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let scheduler = BackupScheduler::new(runner(temp_dir.path()), "every midnight").await?;

        assert!(scheduler.start().await.is_err());
        assert!(!scheduler.is_armed().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_now_runs_an_attempt() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let dir = temp_dir.path().join("backups");
        let scheduler = BackupScheduler::new(runner(&dir), "0 0 0 * * *").await?;

        let err = scheduler.run_now().await.unwrap_err();
        assert!(matches!(err, crate::BackupError::Configuration(_)));
        // The attempt got as far as provisioning the backup directory.
        assert!(dir.is_dir());
        assert!(!scheduler.is_armed().await);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_trigger_keeps_firing_after_failed_attempts() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let marker = temp_dir.path().join("hits");
        let runner = failing_runner(&temp_dir.path().join("backups"), &marker);
        let scheduler = BackupScheduler::new(runner, EVERY_SECOND).await?;

        scheduler.start().await?;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        scheduler.shutdown().await?;

        assert!(hits(&marker) >= 2, "expected repeated firings, got {}", hits(&marker));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rearm_after_shutdown() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let marker = temp_dir.path().join("hits");
        let runner = failing_runner(&temp_dir.path().join("backups"), &marker);
        let scheduler = BackupScheduler::new(runner, EVERY_SECOND).await?;

        scheduler.start().await?;
        let first = scheduler.job_id().await;
        scheduler.shutdown().await?;
        assert!(!scheduler.is_armed().await);

        // Let any firing already in flight land before counting.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let before = hits(&marker);

        scheduler.start().await?;
        assert!(scheduler.is_armed().await);
        assert_ne!(scheduler.job_id().await, first);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await?;

        assert!(hits(&marker) > before, "re-armed trigger never fired");
        Ok(())
    }
}
