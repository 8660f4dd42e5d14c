// ABOUTME: Configuration types and parsing for slotswap.yml.
// ABOUTME: Handles YAML parsing, discovery order, validation and the init template.

mod command;
mod deserialize;
mod edge;
mod healthcheck;
mod probe;
mod slots;

pub use command::CommandTemplate;
pub use edge::{BringUpConfig, EdgeSettings};
pub use healthcheck::HealthConfig;
pub use probe::ProbeConfig;
pub use slots::{SlotSpec, SlotsConfig};

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::types::Slot;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "slotswap.yml";
pub const CONFIG_FILENAME_ALT: &str = "slotswap.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".slotswap/config.yml";
pub const SYSTEM_CONFIG: &str = "/etc/slotswap/config.yml";
pub const CONFIG_ENV: &str = "SLOTSWAP_CONFIG";

/// Name of the marker file inside `state_dir`.
pub const MARKER_FILENAME: &str = "active_color";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Public domain whose route block is switched.
    pub domain: String,

    /// Address the public domain is pinned to while probing.
    #[serde(default = "default_public_ip")]
    pub public_ip: std::net::IpAddr,

    pub slots: SlotsConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub edge: EdgeSettings,

    #[serde(default)]
    pub bring_up: BringUpConfig,

    /// Explicit container runtime; detected from local sockets when absent.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,

    #[serde(default = "default_slot")]
    pub default_slot: Slot,

    #[serde(default = "default_auto_rollback")]
    pub auto_rollback: bool,

    /// File this config was loaded from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn default_public_ip() -> std::net::IpAddr {
    std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/slotswap")
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("/run/lock/slotswap.lock")
}

fn default_slot() -> Slot {
    Slot::Blue
}

fn default_auto_rollback() -> bool {
    true
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Locate and load the configuration.
    ///
    /// Order: explicit path, `$SLOTSWAP_CONFIG`, the working directory
    /// candidates, then the system-wide file.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Self::load(Path::new(&path));
        }

        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
            PathBuf::from(SYSTEM_CONFIG),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("Using config file {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        let domain = self.domain.trim();
        if domain.is_empty() {
            return Err(Error::InvalidConfig("domain cannot be empty".to_string()));
        }
        if domain.contains(char::is_whitespace) || domain.contains(['{', '}']) {
            return Err(Error::InvalidConfig(format!("invalid domain: {domain}")));
        }

        self.slots.validate().map_err(Error::InvalidConfig)?;

        if self.probe.retries == 0 {
            return Err(Error::InvalidConfig(
                "probe.retries must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn slot(&self, slot: Slot) -> &SlotSpec {
        self.slots.get(slot)
    }

    /// Path of the persisted active-slot marker.
    pub fn marker_path(&self) -> PathBuf {
        self.state_dir.join(MARKER_FILENAME)
    }

    /// Directory holding the config file, used to find hooks.
    pub fn project_dir(&self) -> Option<&Path> {
        self.source.as_deref().and_then(Path::parent)
    }

    /// Minimal configuration used by `init` and tests.
    pub fn template() -> Self {
        Config {
            domain: "api.example.com".to_string(),
            public_ip: default_public_ip(),
            slots: SlotsConfig::template(),
            health: HealthConfig::default(),
            probe: ProbeConfig::default(),
            edge: EdgeSettings::default(),
            bring_up: BringUpConfig::default(),
            runtime: RuntimeConfig::default(),
            state_dir: default_state_dir(),
            lock_path: default_lock_path(),
            default_slot: default_slot(),
            auto_rollback: default_auto_rollback(),
            source: None,
        }
    }
}

pub fn init_config(dir: &Path, domain: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();
    if let Some(d) = domain {
        config.domain = d.to_string();
    }
    config.validate()?;

    std::fs::write(&config_path, generate_template_yaml(&config))?;
    Ok(config_path)
}

fn generate_template_yaml(config: &Config) -> String {
    let blue = config.slot(Slot::Blue);
    let green = config.slot(Slot::Green);
    format!(
        r#"domain: {domain}
# Address the domain is pinned to while probing (like curl --resolve)
public_ip: {ip}

slots:
  blue:
    service: {blue_service}
    container: {blue_container}
    upstream: {blue_upstream}
  green:
    service: {green_service}
    container: {green_container}
    upstream: {green_upstream}

health:
  path: /health
  timeout: 240s

probe:
  path: /__slot
  header: X-Deploy-Slot

# edge:
#   unit: caddy
#   container_config_path: /etc/caddy/Caddyfile
#   host_config_path: /etc/caddy/Caddyfile

# bring_up:
#   command: [docker, compose, up, -d, --no-deps, "{{service}}"]

# runtime:
#   runtime: podman
#   socket: /run/podman/podman.sock

auto_rollback: true
"#,
        domain = config.domain,
        ip = config.public_ip,
        blue_service = blue.service,
        blue_container = blue.container,
        blue_upstream = blue.upstream,
        green_service = green.service,
        green_container = green.container,
        green_upstream = green.upstream,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_round_trips_through_yaml() {
        let yaml = generate_template_yaml(&Config::template());
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.domain, "api.example.com");
        assert_eq!(config.slot(Slot::Green).upstream, "backend-green:8000");
        assert_eq!(config.health.timeout, std::time::Duration::from_secs(240));
    }

    #[test]
    fn marker_path_is_inside_state_dir() {
        let mut config = Config::template();
        config.state_dir = PathBuf::from("/tmp/state");
        assert_eq!(config.marker_path(), PathBuf::from("/tmp/state/active_color"));
    }
}
