// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerInfo, ContainerSummary, mounts, published ports, exec config and results.

use crate::types::{ContainerId, NetworkId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Information about a container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Container ID.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Image used.
    pub image: String,
    /// Current state.
    pub state: ContainerState,
    /// Health status (if healthcheck configured).
    pub health: Option<HealthState>,
    /// When the container was last started.
    pub started_at: Option<DateTime<Utc>>,
    /// Host PID of the main process while running.
    pub pid: Option<i64>,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Network settings.
    pub network_settings: NetworkSettings,
    /// Filesystem mounts.
    pub mounts: Vec<MountInfo>,
    /// Ports published on the host.
    pub ports: Vec<PublishedPort>,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    pub fn publishes(&self, port: u16) -> bool {
        self.ports.iter().any(|p| p.host_port == Some(port))
    }
}

/// Container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

/// Health state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
    None,
}

/// Network settings for a container.
#[derive(Debug, Clone, Default)]
pub struct NetworkSettings {
    /// Attachments by network name.
    pub networks: HashMap<String, NetworkInfo>,
}

impl NetworkSettings {
    /// IDs of every attached network, keyed by name.
    pub fn network_ids(&self) -> Vec<(String, NetworkId)> {
        let mut ids: Vec<_> = self
            .networks
            .iter()
            .map(|(name, info)| {
                let id = if info.network_id.is_empty() {
                    name.clone()
                } else {
                    info.network_id.clone()
                };
                (name.clone(), NetworkId::new(id))
            })
            .collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        ids
    }
}

/// Network information for a container.
#[derive(Debug, Clone, Default)]
pub struct NetworkInfo {
    /// Network ID.
    pub network_id: String,
    /// IP address in this network.
    pub ip_address: String,
    /// Aliases in this network.
    pub aliases: Vec<String>,
}

/// A mount as reported by inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Host path or volume name.
    pub source: String,
    /// Path inside the container.
    pub destination: String,
    /// Mount type (`bind`, `volume`, ...).
    pub kind: String,
}

impl MountInfo {
    pub fn is_bind(&self) -> bool {
        self.kind == "bind"
    }
}

/// A container port published on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedPort {
    pub container_port: u16,
    pub host_port: Option<u16>,
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Container ID.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Image used.
    pub image: String,
    /// Current state.
    pub state: String,
    /// Status message.
    pub status: String,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Ports published on the host.
    pub ports: Vec<PublishedPort>,
}

impl ContainerSummary {
    pub fn publishes(&self, port: u16) -> bool {
        self.ports.iter().any(|p| p.host_port == Some(port))
    }
}

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g., "docker", "podman").
    pub name: String,
    /// Runtime version.
    pub version: String,
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
}

/// Exec configuration for running commands in containers.
#[derive(Debug, Clone, Default)]
pub struct ExecConfig {
    /// Command and arguments to run.
    pub cmd: Vec<String>,
    /// Environment variables (`KEY=value`).
    pub env: Vec<String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// User to run as.
    pub user: Option<String>,
}

impl ExecConfig {
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{key}={value}"));
        self
    }
}

/// Result of an exec operation.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Exit code.
    pub exit_code: i64,
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error.
    pub stderr: Vec<u8>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
