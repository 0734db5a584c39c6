//! Utility modules for the backup service.

pub mod logger;
