//! Locating the `pg_dump` executable.
//!
//! Known install locations are kept in a table keyed by host OS. The first
//! candidate that exists wins; otherwise the bare program name is used and
//! the OS resolves it through `PATH`.

use std::path::{Path, PathBuf};

pub const DUMP_PROGRAM: &str = "pg_dump";

/// Install locations probed before falling back to `PATH`, per OS.
pub type LocationTable<'a> = [(&'a str, &'a [&'a str])];

const KNOWN_LOCATIONS: &LocationTable<'static> = &[(
    "windows",
    &[
        r"C:\Program Files\PostgreSQL\17\bin\pg_dump.exe",
        r"C:\Program Files\PostgreSQL\16\bin\pg_dump.exe",
        r"C:\Program Files\PostgreSQL\15\bin\pg_dump.exe",
    ],
)];

/// Resolved program plus any fixed leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTool {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
}

impl DumpTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    /// Full argument list: connection string, custom format, file output.
    pub fn args(&self, database_url: &str, target: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> =
            self.leading_args.iter().map(Into::into).collect();
        args.push(database_url.into());
        args.push("-F".into());
        args.push("c".into());
        args.push("-f".into());
        args.push(target.as_os_str().to_owned());
        args
    }
}

/// Candidate install paths for `os` (a `std::env::consts::OS` value).
pub fn known_locations(os: &str) -> &'static [&'static str] {
    candidates(KNOWN_LOCATIONS, os)
}

fn candidates<'a>(table: &'a LocationTable<'a>, os: &str) -> &'a [&'a str] {
    table
        .iter()
        .find(|(name, _)| *name == os)
        .map(|(_, paths)| *paths)
        .unwrap_or(&[])
}

/// Resolve the dump program for `os`. `configured` bypasses the lookup.
pub async fn resolve(os: &str, configured: Option<&Path>) -> PathBuf {
    resolve_with(KNOWN_LOCATIONS, os, configured).await
}

/// Resolve against an explicit location table: first existing candidate,
/// else the bare program name.
pub async fn resolve_with(
    table: &LocationTable<'_>,
    os: &str,
    configured: Option<&Path>,
) -> PathBuf {
    if let Some(program) = configured {
        return program.to_path_buf();
    }

    for candidate in candidates(table, os) {
        if tokio::fs::try_exists(candidate).await.unwrap_or(false) {
            tracing::debug!(path = %candidate, "Using installed pg_dump");
            return PathBuf::from(candidate);
        }
    }

    PathBuf::from(DUMP_PROGRAM)
}
