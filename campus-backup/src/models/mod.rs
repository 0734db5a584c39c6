pub mod backup_attempt;
