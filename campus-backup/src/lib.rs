//! Campus Backup
//!
//! Daily `pg_dump` snapshots of the campus administration database with
//! age-based retention of old snapshots.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{BackupError, CleanupError, Result};
pub use services::backup_scheduler::BackupScheduler;
pub use services::db_backup::{BackupReport, BackupRunner};
pub use services::retention::{RetentionPolicy, RetentionSweeper, SweepReport};
