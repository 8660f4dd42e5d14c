// ABOUTME: Error types for edge config file handling.
// ABOUTME: Carries the path involved in every I/O failure.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },
}
