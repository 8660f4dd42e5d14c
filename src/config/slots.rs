// ABOUTME: Per-slot backend configuration (service, container, upstream).
// ABOUTME: Derives the addressing mode from the upstream host.

use crate::types::{ServiceName, Slot};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotsConfig {
    pub blue: SlotSpec,
    pub green: SlotSpec,
}

impl SlotsConfig {
    pub fn get(&self, slot: Slot) -> &SlotSpec {
        match slot {
            Slot::Blue => &self.blue,
            Slot::Green => &self.green,
        }
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        for slot in Slot::ALL {
            let spec = self.get(slot);
            if spec.upstream_host().is_none() || spec.upstream_port().is_none() {
                return Err(format!(
                    "slots.{slot}.upstream must be host:port, got '{}'",
                    spec.upstream
                ));
            }
        }
        if self.blue.container == self.green.container {
            return Err("blue and green must use different containers".to_string());
        }
        if self.blue.upstream == self.green.upstream {
            return Err("blue and green must use different upstreams".to_string());
        }
        Ok(())
    }

    pub(super) fn template() -> Self {
        let spec = |color: &str, port: u16| SlotSpec {
            service: ServiceName::new(&format!("backend-{color}")).expect("valid template name"),
            container: ServiceName::new(&format!("app-backend-{color}"))
                .expect("valid template name"),
            upstream: format!("backend-{color}:8000"),
            local_port: Some(port),
        };
        SlotsConfig {
            blue: spec("blue", 8001),
            green: spec("green", 8002),
        }
    }
}

/// Backend deployment for one slot.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotSpec {
    /// Compose service brought up for this slot.
    pub service: ServiceName,

    /// Container name backing the slot.
    pub container: ServiceName,

    /// Address the edge proxies to, as `host:port`.
    pub upstream: String,

    /// Host loopback port published by the slot, if any.
    #[serde(default)]
    pub local_port: Option<u16>,
}

impl SlotSpec {
    pub fn upstream_host(&self) -> Option<&str> {
        let (host, _) = self.upstream.rsplit_once(':')?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        (!host.is_empty()).then_some(host)
    }

    pub fn upstream_port(&self) -> Option<u16> {
        self.upstream.rsplit_once(':')?.1.parse().ok()
    }

    /// Whether the edge reaches this slot over loopback rather than by
    /// container DNS name.
    pub fn is_loopback(&self) -> bool {
        match self.upstream_host() {
            Some("localhost") => true,
            Some(host) => host
                .parse::<std::net::IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false),
            None => false,
        }
    }
}
