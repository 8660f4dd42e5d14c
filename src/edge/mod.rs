// ABOUTME: Edge proxy runtime: where the proxy runs and which config file to edit.
// ABOUTME: Detection is read-only; ProxyController performs validate, reload and restart.

mod controller;
mod detect;

pub use controller::{EdgeController, ProxyController};
pub use detect::{config_location, detect_edge};

use crate::runtime::{ContainerError, ExecError, HostError};
use crate::types::ContainerId;
use std::fmt;
use std::path::{Path, PathBuf};

/// How the edge proxy is hosted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeMode {
    /// Runs in a container managed by the local runtime.
    Container { name: String, id: ContainerId },
    /// Runs as a systemd unit on the host.
    Host { unit: String },
}

impl fmt::Display for EdgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeMode::Container { name, id } => write!(f, "container {} ({})", name, id.short()),
            EdgeMode::Host { unit } => write!(f, "host unit {}", unit),
        }
    }
}

/// Where the proxy's config lives and which copy slotswap edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Host file bind-mounted into the container; edits are seen directly.
    BindMounted { host: PathBuf, in_container: PathBuf },
    /// Local working copy pushed into the container before each validate.
    LocalCopy { local: PathBuf, in_container: PathBuf },
    /// Config file of a host-level proxy.
    HostFile(PathBuf),
}

/// Detected edge proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRuntime {
    pub mode: EdgeMode,
    pub config: ConfigLocation,
}

impl EdgeRuntime {
    /// File on this host that slotswap rewrites.
    pub fn editable_path(&self) -> &Path {
        match &self.config {
            ConfigLocation::BindMounted { host, .. } => host,
            ConfigLocation::LocalCopy { local, .. } => local,
            ConfigLocation::HostFile(path) => path,
        }
    }

    /// Path the proxy itself reads, passed to validate and reload.
    pub fn proxy_path(&self) -> &Path {
        match &self.config {
            ConfigLocation::BindMounted { in_container, .. }
            | ConfigLocation::LocalCopy { in_container, .. } => in_container,
            ConfigLocation::HostFile(path) => path,
        }
    }

    pub fn container_id(&self) -> Option<&ContainerId> {
        match &self.mode {
            EdgeMode::Container { id, .. } => Some(id),
            EdgeMode::Host { .. } => None,
        }
    }

    pub fn is_local_copy(&self) -> bool {
        matches!(self.config, ConfigLocation::LocalCopy { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    #[error("no edge proxy found: nothing owns port {port} and unit {unit} is not active")]
    NotFound { port: u16, unit: String },

    #[error("edge '{0}' is neither a running container nor an active systemd unit")]
    ExplicitNotFound(String),

    #[error("edge container {0} is not running")]
    NotRunning(String),

    #[error("{action} failed: {message}")]
    CommandFailed { action: &'static str, message: String },

    #[error("edge config is {size} bytes, too large to push through exec")]
    ConfigTooLarge { size: usize },

    #[error("edge config I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Host(#[from] HostError),
}
