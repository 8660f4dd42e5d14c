// ABOUTME: Line-oriented parser splitting an edge config into text and blocks.
// ABOUTME: A block closes only when cumulative brace depth returns to zero.

/// Net brace depth change of one line.
///
/// Braces inside double-quoted strings and after a `#` comment are ignored.
pub fn brace_delta(line: &str) -> i32 {
    let mut depth = 0;
    let mut in_quote = false;
    let mut escaped = false;
    let mut prev_ws = true;

    for c in line.chars() {
        if escaped {
            escaped = false;
            prev_ws = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' => in_quote = !in_quote,
            '#' if !in_quote && prev_ws => break,
            '{' if !in_quote => depth += 1,
            '}' if !in_quote => depth -= 1,
            _ => {}
        }
        prev_ws = c.is_whitespace();
    }

    depth
}

/// Strip a trailing `#` comment (outside quotes).
fn strip_comment(line: &str) -> &str {
    let mut in_quote = false;
    let mut prev_ws = true;
    for (idx, c) in line.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            '#' if !in_quote && prev_ws => return &line[..idx],
            _ => {}
        }
        prev_ws = c.is_whitespace();
    }
    line
}

/// Address part of a block-opening line, or `None` if the line does not
/// open a block. A bare `{` yields `Some("")` (global options block).
fn block_header(line: &str) -> Option<&str> {
    let code = strip_comment(line).trim();
    let header = code.strip_suffix('{')?;
    if brace_delta(line) <= 0 {
        return None;
    }
    Some(header.trim())
}

/// Reduce one site address to its bare host name.
fn address_host(address: &str) -> String {
    let without_scheme = address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address);
    let without_path = without_scheme
        .split_once('/')
        .map(|(host, _)| host)
        .unwrap_or(without_scheme);
    let host = match without_path.rsplit_once(':') {
        Some((host, port))
            if !host.is_empty() && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host
        }
        _ => without_path,
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Site addresses in a block header, split on commas and whitespace.
fn addresses(header: &str) -> impl Iterator<Item = &str> {
    header
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|a| !a.is_empty())
}

/// Whether a block header (everything before `{`) serves exactly `domain`.
///
/// Accepts `domain`, `domain:443`, `https://domain` and comma or space
/// separated lists in which every address names the domain.
pub fn header_names_domain(header: &str, domain: &str) -> bool {
    let domain = normalize_domain(domain);
    let mut addresses = addresses(header).peekable();

    if addresses.peek().is_none() {
        return false;
    }
    addresses.all(|a| address_host(a) == domain)
}

/// A top-level brace-delimited block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBlock {
    /// Address list before the opening brace; empty for global options.
    pub header: String,
    /// Every line of the block, opener and closer included.
    pub lines: Vec<String>,
    /// False when the file ended before depth returned to zero.
    pub terminated: bool,
}

impl RouteBlock {
    pub fn serves(&self, domain: &str) -> bool {
        header_names_domain(&self.header, domain)
    }

    /// Whether any address in the header names `domain`.
    pub fn names(&self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        addresses(&self.header).any(|a| address_host(a) == domain)
    }

    /// This block with `domain` dropped from a shared address list.
    ///
    /// `None` unless some, but not all, of the header's addresses name the
    /// domain. The body is kept as is for the remaining sites.
    pub fn without_domain(&self, domain: &str) -> Option<RouteBlock> {
        let wanted = normalize_domain(domain);
        let (named, rest): (Vec<&str>, Vec<&str>) =
            addresses(&self.header).partition(|a| address_host(a) == wanted);
        if named.is_empty() || rest.is_empty() {
            return None;
        }

        let header = rest.join(", ");
        let mut lines = self.lines.clone();
        let opener = lines.first_mut()?;
        *opener = opener.replacen(self.header.as_str(), &header, 1);
        Some(RouteBlock {
            header,
            lines,
            terminated: self.terminated,
        })
    }

    pub fn is_global_options(&self) -> bool {
        self.header.is_empty()
    }

    /// The single host this block serves, if every address agrees.
    pub fn domain(&self) -> Option<String> {
        let mut hosts = addresses(&self.header).map(address_host);
        let first = hosts.next()?;
        if first.is_empty() || !hosts.all(|h| h == first) {
            return None;
        }
        Some(first)
    }

    /// Body text without the opening and closing lines.
    pub fn body(&self) -> impl Iterator<Item = &str> {
        let end = if self.terminated {
            self.lines.len().saturating_sub(1)
        } else {
            self.lines.len()
        };
        self.lines[1.min(end)..end].iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A line outside any block, kept verbatim.
    Text(String),
    Block(RouteBlock),
}

impl Segment {
    pub fn is_blank(&self) -> bool {
        matches!(self, Segment::Text(line) if line.trim().is_empty())
    }

    fn is_comment_or_blank(&self) -> bool {
        matches!(self, Segment::Text(line) if line.trim().is_empty() || line.trim_start().starts_with('#'))
    }
}

/// Edge config split into top-level segments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdgeConfigText {
    pub(crate) segments: Vec<Segment>,
}

impl EdgeConfigText {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let Some(header) = block_header(lines[i]) else {
                segments.push(Segment::Text(lines[i].to_string()));
                i += 1;
                continue;
            };

            let start = i;
            let mut depth = 0;
            while i < lines.len() {
                depth += brace_delta(lines[i]);
                i += 1;
                if depth <= 0 {
                    break;
                }
            }

            if depth > 0 {
                tracing::warn!(
                    "Block '{}' opened at line {} is not closed before end of file",
                    header,
                    start + 1
                );
            }

            segments.push(Segment::Block(RouteBlock {
                header: header.to_string(),
                lines: lines[start..i].iter().map(|l| l.to_string()).collect(),
                terminated: depth <= 0,
            }));
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn blocks(&self) -> impl Iterator<Item = &RouteBlock> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Block(b) => Some(b),
            Segment::Text(_) => None,
        })
    }

    /// Blocks whose address list names `domain`, in file order.
    pub fn blocks_for<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a RouteBlock> + 'a {
        self.blocks().filter(move |b| b.names(domain))
    }

    /// Index where a site block should go so that it precedes every other
    /// site block. Leading comments and a global options block stay above it.
    pub(crate) fn front_index(&self) -> usize {
        let first_content = self
            .segments
            .iter()
            .position(|s| !s.is_comment_or_blank());
        match first_content {
            Some(idx) => match &self.segments[idx] {
                Segment::Block(b) if b.is_global_options() => idx + 1,
                _ => idx,
            },
            None => self.segments.len(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(line) => {
                    out.push_str(line);
                    out.push('\n');
                }
                Segment::Block(block) => {
                    for line in &block.lines {
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
        }
        out
    }
}
