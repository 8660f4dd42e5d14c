// ABOUTME: Slot readiness check configuration.
// ABOUTME: Bounds the idle-slot health wait and the local HTTP probe.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Service health endpoint, probed on the slot's local port.
    #[serde(default = "default_path")]
    pub path: String,

    /// Upper bound on waiting for the idle slot to become healthy.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Timeout of a single HTTP request or exec probe.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_path() -> String {
    "/health".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(240)
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3)
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            timeout: default_timeout(),
            interval: default_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}
