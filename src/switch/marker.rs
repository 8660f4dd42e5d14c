// ABOUTME: Persisted active-slot marker: one line naming blue or green.
// ABOUTME: Advisory only; written via temp file and rename with owner-only permissions.

use crate::types::Slot;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ActiveMarker {
    path: PathBuf,
}

impl ActiveMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Slot named by the marker. Missing or unreadable markers are `None`.
    pub fn read(&self) -> Option<Slot> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match content.trim().parse() {
            Ok(slot) => Some(slot),
            Err(_) => {
                tracing::warn!(
                    "Ignoring marker {} with unexpected content {:?}",
                    self.path.display(),
                    content.trim()
                );
                None
            }
        }
    }

    pub fn write(&self, slot: Slot) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)?;
        // mode() only applies on create
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(slot.as_str().as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!("Marker {} now names {}", self.path.display(), slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_exact_slot_name() {
        let dir = tempfile::tempdir().unwrap();
        let marker = ActiveMarker::new(dir.path().join("state/active_color"));
        marker.write(Slot::Green).unwrap();

        assert_eq!(std::fs::read_to_string(marker.path()).unwrap(), "green");
        assert_eq!(marker.read(), Some(Slot::Green));
    }

    #[test]
    fn marker_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let marker = ActiveMarker::new(dir.path().join("active_color"));
        marker.write(Slot::Blue).unwrap();

        let mode = std::fs::metadata(marker.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn tolerates_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let marker = ActiveMarker::new(dir.path().join("active_color"));
        assert_eq!(marker.read(), None);

        std::fs::write(marker.path(), "purple\n").unwrap();
        assert_eq!(marker.read(), None);

        std::fs::write(marker.path(), " BLUE \n").unwrap();
        assert_eq!(marker.read(), Some(Slot::Blue));
    }
}
