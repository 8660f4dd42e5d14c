// ABOUTME: Host-wide switch lock preventing concurrent runs.
// ABOUTME: Kernel advisory lock on a file that also records the holder as JSON.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use super::SwitchError;

/// Information about who holds a switch lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Domain being switched.
    pub domain: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(domain: &str) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            domain: domain.to_string(),
        }
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (pid {}) switching {} since {}",
            self.holder, self.pid, self.domain, self.started_at
        )
    }
}

/// A held switch lock.
///
/// The kernel drops the lock when the holding process exits, so a crashed
/// run never blocks the next one. The file itself is never removed: another
/// process may already have it open, and unlinking it would let two runs
/// lock different inodes under the same path.
#[derive(Debug)]
pub struct SwitchLock {
    path: PathBuf,
    file: Option<File>,
}

impl SwitchLock {
    /// Acquire the lock at `path`.
    ///
    /// Never waits: a lock held by a live process is an error. With `force`,
    /// the lock file is replaced so a hung holder no longer blocks; that
    /// holder keeps its lock on the old, unlinked file.
    pub fn acquire(path: &Path, domain: &str, force: bool) -> Result<Self, SwitchError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SwitchError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let info = LockInfo::new(domain);

        if let Some(file) = Self::try_lock(path)? {
            tracing::debug!("Acquired switch lock {}", path.display());
            return Self::held(path, file, &info);
        }

        let existing = Self::read_existing(path);
        if !force {
            return Err(SwitchError::LockHeld {
                path: path.to_path_buf(),
                holder: existing
                    .as_ref()
                    .map(LockInfo::to_string)
                    .unwrap_or_else(|| "a process that has not recorded itself yet".to_string()),
                info: existing,
            });
        }

        match &existing {
            Some(existing) => tracing::warn!("Breaking switch lock held by {}", existing),
            None => tracing::warn!("Breaking switch lock at {}", path.display()),
        }
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SwitchError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        match Self::try_lock(path)? {
            Some(file) => Self::held(path, file, &info),
            None => Err(SwitchError::Lock(
                "lock acquired by another process during break".to_string(),
            )),
        }
    }

    /// Open the lock file and try a non-blocking exclusive lock.
    /// `Ok(None)` when another open file description holds it.
    fn try_lock(path: &Path) -> Result<Option<File>, SwitchError> {
        let io_err = |source| SwitchError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(path)
            .map_err(io_err)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(file)),
            Err(e)
                if e.kind() == ErrorKind::WouldBlock
                    || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                tracing::debug!("Switch lock {} is held: {}", path.display(), e);
                Ok(None)
            }
            Err(e) => Err(io_err(e)),
        }
    }

    fn held(path: &Path, mut file: File, info: &LockInfo) -> Result<Self, SwitchError> {
        let io_err = |source| SwitchError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string(info)
            .map_err(|e| SwitchError::Lock(format!("failed to serialize lock: {e}")))?;

        file.set_len(0).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    fn read_existing(path: &Path) -> Option<LockInfo> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, reporting failure instead of ignoring it.
    pub fn release(mut self) -> Result<(), SwitchError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let io_err = |source| SwitchError::Io {
            path: self.path.clone(),
            source,
        };
        // Clearing goes through our own handle, so a replacement file from a
        // forced takeover is left alone.
        file.set_len(0).map_err(io_err)?;
        FileExt::unlock(&file).map_err(io_err)?;
        Ok(())
    }
}

impl Drop for SwitchLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.set_len(0);
        }
    }
}
