// ABOUTME: The single route block slotswap writes for the switched domain.
// ABOUTME: Serves the probe path with the slot name and proxies everything else.

use super::parse::RouteBlock;
use crate::config::Config;
use crate::types::Slot;

/// Route block pointing the domain at one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBlock {
    pub domain: String,
    pub slot: Slot,
    pub upstream: String,
    pub probe_path: String,
    pub header: String,
    pub extra_directives: Vec<String>,
}

impl CanonicalBlock {
    pub fn for_slot(config: &Config, slot: Slot) -> Self {
        Self {
            domain: config.domain.trim().to_string(),
            slot,
            upstream: config.slot(slot).upstream.clone(),
            probe_path: config.probe.path.clone(),
            header: config.probe.header.clone(),
            extra_directives: config.edge.extra_directives.clone(),
        }
    }

    pub fn render(&self) -> Vec<String> {
        let slot = self.slot.as_str();
        let mut lines = vec![
            format!("{} {{", self.domain),
            format!("\t# managed by slotswap: active slot {slot}"),
        ];

        for directive in &self.extra_directives {
            for line in directive.lines() {
                lines.push(format!("\t{line}"));
            }
        }

        lines.extend([
            format!("\t@slotswap_probe path {}", self.probe_path),
            "\thandle @slotswap_probe {".to_string(),
            format!("\t\theader {} {slot}", self.header),
            format!("\t\trespond \"{slot}\" 200"),
            "\t}".to_string(),
            "\thandle {".to_string(),
            format!("\t\treverse_proxy {} {{", self.upstream),
            format!("\t\t\theader_down {} {slot}", self.header),
            "\t\t}".to_string(),
            "\t}".to_string(),
            "}".to_string(),
        ]);
        lines
    }

    pub fn to_block(&self) -> RouteBlock {
        RouteBlock {
            header: self.domain.clone(),
            lines: self.render(),
            terminated: true,
        }
    }
}
