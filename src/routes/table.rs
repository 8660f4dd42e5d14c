// ABOUTME: Domain-keyed view of the edge config and the route rewrite.
// ABOUTME: set_route leaves exactly one block per domain and is byte-idempotent.

use super::canonical::CanonicalBlock;
use super::parse::{EdgeConfigText, RouteBlock, Segment};
use crate::config::SlotsConfig;
use crate::types::Slot;
use std::collections::BTreeMap;

/// Parsed edge config with its site blocks indexed by domain.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    text: EdgeConfigText,
    routes: BTreeMap<String, Vec<RouteBlock>>,
}

impl RouteTable {
    pub fn parse(text: &str) -> Self {
        let mut table = Self {
            text: EdgeConfigText::parse(text),
            routes: BTreeMap::new(),
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        self.routes.clear();
        for block in self.text.blocks() {
            if let Some(domain) = block.domain() {
                self.routes.entry(domain).or_default().push(block.clone());
            }
        }
    }

    pub fn routes(&self) -> &BTreeMap<String, Vec<RouteBlock>> {
        &self.routes
    }

    /// Blocks serving `domain`, in file order.
    pub fn blocks_for<'a>(&'a self, domain: &'a str) -> Vec<&'a RouteBlock> {
        self.text.blocks_for(domain).collect()
    }

    pub fn render(&self) -> String {
        self.text.render()
    }

    /// Replace every block for the domain with `block`.
    ///
    /// The new block goes first, after a leading global options block when
    /// one exists. Returns whether the rendered text changed.
    pub fn set_route(&mut self, block: &CanonicalBlock) -> bool {
        let before = self.text.render();
        let domain = block.domain.as_str();

        let blank_tail = trailing_blanks(&self.text.segments);
        let mut kept: Vec<Segment> = Vec::with_capacity(self.text.segments.len() + 2);
        let mut removed = 0;
        let mut skip_blank = false;

        for mut segment in std::mem::take(&mut self.text.segments) {
            if let Segment::Block(shared) = &segment
                && let Some(trimmed) = shared.without_domain(domain)
            {
                tracing::info!(
                    "Moving {} out of shared site block '{}'",
                    domain,
                    shared.header
                );
                segment = Segment::Block(trimmed);
            }
            let stale = match &segment {
                Segment::Block(existing) => existing.serves(domain).then_some(existing),
                Segment::Text(_) => None,
            };
            if let Some(existing) = stale {
                if !existing.terminated {
                    tracing::warn!(
                        "Dropping unterminated block for {} that ran to end of file",
                        domain
                    );
                }
                removed += 1;
                skip_blank = kept.last().is_none_or(Segment::is_blank);
                continue;
            }
            if skip_blank && segment.is_blank() {
                skip_blank = false;
                continue;
            }
            skip_blank = false;
            kept.push(segment);
        }

        // A removed final block must not leave its separator behind.
        while trailing_blanks(&kept) > blank_tail {
            kept.pop();
        }

        self.text.segments = kept;
        let mut idx = self.text.front_index();
        let segments = &mut self.text.segments;

        while idx < segments.len() && segments[idx].is_blank() {
            segments.remove(idx);
        }
        while idx > 0 && segments[idx - 1].is_blank() {
            segments.remove(idx - 1);
            idx -= 1;
        }

        let mut insert = Vec::with_capacity(3);
        if idx > 0 {
            insert.push(Segment::Text(String::new()));
        }
        insert.push(Segment::Block(block.to_block()));
        if idx < segments.len() {
            insert.push(Segment::Text(String::new()));
        }
        segments.splice(idx..idx, insert);

        tracing::debug!(
            "Replaced {} block(s) for {} with one pointing at {}",
            removed,
            domain,
            block.upstream
        );

        self.reindex();
        self.text.render() != before
    }

    /// Slot whose upstream the domain's block(s) reference, if exactly one.
    pub fn upstream_slot(&self, domain: &str, slots: &SlotsConfig) -> Option<Slot> {
        let tokens: Vec<&str> = self
            .text
            .blocks_for(domain)
            .flat_map(|b| b.body())
            .flat_map(str::split_whitespace)
            .map(|t| t.trim_matches('"'))
            .collect();

        let mut found = Slot::ALL
            .into_iter()
            .filter(|slot| tokens.iter().any(|t| references(t, slots, *slot)));

        match (found.next(), found.next()) {
            (Some(slot), None) => Some(slot),
            _ => None,
        }
    }
}

fn trailing_blanks(segments: &[Segment]) -> usize {
    segments.iter().rev().take_while(|s| s.is_blank()).count()
}

fn references(token: &str, slots: &SlotsConfig, slot: Slot) -> bool {
    let spec = slots.get(slot);
    let address = token
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(token)
        .trim_end_matches('/');

    if address == spec.upstream {
        return true;
    }
    if spec.is_loopback() {
        return false;
    }

    let host = address.split(':').next().unwrap_or(address);
    Some(host) == spec.upstream_host() || host == spec.container.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn canonical(slot: Slot) -> CanonicalBlock {
        CanonicalBlock::for_slot(&Config::template(), slot)
    }

    fn rewrite(text: &str, slot: Slot) -> String {
        let mut table = RouteTable::parse(text);
        table.set_route(&canonical(slot));
        table.render()
    }

    #[test]
    fn replaces_block_and_keeps_other_sites() {
        let text = "\
other.com {
\treverse_proxy other:80
}

api.example.com {
\treverse_proxy backend-blue:8000
}
";
        let out = rewrite(text, Slot::Green);
        let table = RouteTable::parse(&out);
        assert_eq!(table.blocks_for("api.example.com").len(), 1);
        assert!(out.starts_with("api.example.com {"));
        assert!(out.contains("other.com {\n\treverse_proxy other:80\n}\n"));
        assert_eq!(
            table.upstream_slot("api.example.com", &Config::template().slots),
            Some(Slot::Green)
        );
    }

    #[test]
    fn inserts_after_global_options() {
        let text = "{\n\temail ops@example.com\n}\n\nother.com {\n}\n";
        let out = rewrite(text, Slot::Blue);
        assert!(out.starts_with("{\n\temail ops@example.com\n}\n\napi.example.com {"));
        assert!(out.ends_with("}\n\nother.com {\n}\n"));
    }

    #[test]
    fn adds_block_to_empty_file() {
        let out = rewrite("", Slot::Blue);
        assert_eq!(RouteTable::parse(&out).blocks_for("api.example.com").len(), 1);
        assert!(out.ends_with("}\n"));
    }

    #[test]
    fn second_rewrite_is_a_no_op() {
        let text = "# edge\n{\n\tadmin off\n}\napi.example.com:443 {\n\trespond hi\n}\n\n\nb.com {\n}\n";
        let once = rewrite(text, Slot::Green);
        let mut table = RouteTable::parse(&once);
        assert!(!table.set_route(&canonical(Slot::Green)));
        assert_eq!(table.render(), once);
    }

    #[test]
    fn upstream_slot_matches_service_names() {
        let slots = Config::template().slots;
        let table = RouteTable::parse("api.example.com {\n\treverse_proxy http://backend-blue:8000\n}\n");
        assert_eq!(table.upstream_slot("api.example.com", &slots), Some(Slot::Blue));

        let table = RouteTable::parse("api.example.com {\n\treverse_proxy app-backend-green:8000\n}\n");
        assert_eq!(table.upstream_slot("api.example.com", &slots), Some(Slot::Green));
    }

    #[test]
    fn upstream_slot_is_none_when_ambiguous_or_missing() {
        let slots = Config::template().slots;
        let both = "api.example.com {\n\treverse_proxy backend-blue:8000 backend-green:8000\n}\n";
        assert_eq!(RouteTable::parse(both).upstream_slot("api.example.com", &slots), None);
        assert_eq!(RouteTable::parse("").upstream_slot("api.example.com", &slots), None);
    }

    #[test]
    fn routes_index_by_domain() {
        let table = RouteTable::parse("a.com {\n}\na.com:443 {\n}\nb.com {\n}\n");
        assert_eq!(table.routes()["a.com"].len(), 2);
        assert_eq!(table.routes()["b.com"].len(), 1);
    }
}
