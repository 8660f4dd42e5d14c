// ABOUTME: File side effects on the editable edge config.
// ABOUTME: Timestamped backups, in-place writes that keep the inode, restore and pruning.

use super::error::RouteError;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const BACKUP_INFIX: &str = ".bak.";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<String, RouteError> {
        fs::read_to_string(&self.path).map_err(|source| RouteError::Read {
            path: self.path.clone(),
            source,
        })
    }

    /// Copy the current file to `<file>.bak.<UTC timestamp>`.
    pub fn backup(&self) -> Result<PathBuf, RouteError> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let base = format!("{}{BACKUP_INFIX}{stamp}", self.path.display());

        let mut candidate = PathBuf::from(&base);
        let mut n = 1;
        while candidate.exists() {
            candidate = PathBuf::from(format!("{base}-{n}"));
            n += 1;
        }

        fs::copy(&self.path, &candidate).map_err(|source| RouteError::Backup {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("Backed up {} to {}", self.path.display(), candidate.display());
        Ok(candidate)
    }

    /// Replace the file's content without replacing the file.
    ///
    /// A bind mount follows the inode, so the file is truncated and
    /// rewritten through the same handle rather than renamed over.
    pub fn write_in_place(&self, text: &str) -> Result<(), RouteError> {
        let write_err = |source| RouteError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&self.path)
            .map_err(write_err)?;
        file.write_all(text.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        Ok(())
    }

    pub fn restore(&self, backup: &Path) -> Result<(), RouteError> {
        let text = fs::read_to_string(backup).map_err(|source| RouteError::Read {
            path: backup.to_path_buf(),
            source,
        })?;
        self.write_in_place(&text)?;
        tracing::info!("Restored {} from {}", self.path.display(), backup.display());
        Ok(())
    }

    /// Backups of this file, oldest first.
    pub fn backups(&self) -> Result<Vec<PathBuf>, RouteError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let Some(name) = self.path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{name}{BACKUP_INFIX}");

        let entries = fs::read_dir(&dir).map_err(|source| RouteError::Read {
            path: dir.clone(),
            source,
        })?;

        let mut backups: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        backups.sort();
        Ok(backups)
    }

    /// Delete all but the newest `keep` backups. Returns how many went.
    pub fn prune_backups(&self, keep: usize) -> Result<usize, RouteError> {
        let backups = self.backups()?;
        let excess = backups.len().saturating_sub(keep);
        for old in &backups[..excess] {
            fs::remove_file(old).map_err(|source| RouteError::Write {
                path: old.clone(),
                source,
            })?;
        }
        Ok(excess)
    }
}
