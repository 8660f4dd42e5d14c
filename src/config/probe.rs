// ABOUTME: Public endpoint probe configuration.
// ABOUTME: Reserved slot path, identifying header, retry budget and TLS policy.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Reserved path answering the name of the slot behind the edge.
    #[serde(default = "default_path")]
    pub path: String,

    /// Response header naming the slot that answered.
    #[serde(default = "default_header")]
    pub header: String,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Port of the public endpoint; defaults to the scheme's port.
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Accept certificates that do not validate (staging edges).
    #[serde(default)]
    pub insecure_tls: bool,
}

fn default_path() -> String {
    "/__slot".to_string()
}

fn default_header() -> String {
    "X-Deploy-Slot".to_string()
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_retries() -> u32 {
    10
}

fn default_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

impl ProbeConfig {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.scheme == "http" { 80 } else { 443 })
    }

    /// URL of the reserved probe path on `domain`.
    pub fn url(&self, domain: &str) -> String {
        let port = self.effective_port();
        let default_port = if self.scheme == "http" { 80 } else { 443 };
        if port == default_port {
            format!("{}://{}{}", self.scheme, domain, self.path)
        } else {
            format!("{}://{}:{}{}", self.scheme, domain, port, self.path)
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            header: default_header(),
            scheme: default_scheme(),
            port: None,
            retries: default_retries(),
            interval: default_interval(),
            request_timeout: default_request_timeout(),
            insecure_tls: false,
        }
    }
}
