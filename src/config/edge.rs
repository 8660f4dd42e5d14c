// ABOUTME: Edge proxy settings and idle-slot bring-up command.
// ABOUTME: Config paths, validate/reload templates and backup retention.

use super::command::CommandTemplate;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSettings {
    /// Port whose owner is the edge.
    #[serde(default = "default_public_port")]
    pub public_port: u16,

    /// Systemd unit of a host-level edge.
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Config file path inside the edge container.
    #[serde(default = "default_config_path")]
    pub container_config_path: PathBuf,

    /// Config file path of a host-level edge.
    #[serde(default = "default_config_path")]
    pub host_config_path: PathBuf,

    /// Local working copy when the container config is not bind-mounted.
    #[serde(default = "default_local_copy")]
    pub local_copy: PathBuf,

    #[serde(default = "default_validate")]
    pub validate: CommandTemplate,

    #[serde(default = "default_reload")]
    pub reload: CommandTemplate,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Number of timestamped config backups kept after a rewrite.
    #[serde(default = "default_keep_backups")]
    pub keep_backups: usize,

    /// Directives added to the generated route block.
    #[serde(default, deserialize_with = "super::deserialize::deserialize_directives")]
    pub extra_directives: Vec<String>,
}

fn default_public_port() -> u16 {
    443
}

fn default_unit() -> String {
    "caddy".to_string()
}

fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/caddy/Caddyfile")
}

fn default_local_copy() -> PathBuf {
    PathBuf::from("/var/lib/slotswap/Caddyfile")
}

fn default_validate() -> CommandTemplate {
    CommandTemplate::new(
        "caddy",
        &["validate", "--config", "{config}", "--adapter", "caddyfile"],
    )
}

fn default_reload() -> CommandTemplate {
    CommandTemplate::new(
        "caddy",
        &["reload", "--config", "{config}", "--adapter", "caddyfile"],
    )
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_keep_backups() -> usize {
    10
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            public_port: default_public_port(),
            unit: default_unit(),
            container_config_path: default_config_path(),
            host_config_path: default_config_path(),
            local_copy: default_local_copy(),
            validate: default_validate(),
            reload: default_reload(),
            command_timeout: default_command_timeout(),
            keep_backups: default_keep_backups(),
            extra_directives: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BringUpConfig {
    /// Command starting or updating one slot's service.
    #[serde(default = "default_bring_up")]
    pub command: CommandTemplate,

    #[serde(default = "default_bring_up_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Working directory for the command (compose project directory).
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_bring_up() -> CommandTemplate {
    CommandTemplate::new("docker", &["compose", "up", "-d", "--no-deps", "{service}"])
}

fn default_bring_up_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for BringUpConfig {
    fn default() -> Self {
        Self {
            command: default_bring_up(),
            timeout: default_bring_up_timeout(),
            working_dir: None,
        }
    }
}
