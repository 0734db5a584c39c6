pub mod backup_scheduler;
pub mod db_backup;
pub mod dump_tool;
pub mod retention;
