//! Diagram rendering for fenced ```` ```mermaid ```` blocks.
//!
//! The renderer hands each diagram's decoded source to a [`DiagramEngine`]
//! and splices the returned HTML element into the answer. The bundled
//! [`MermaidEngine`] does not lay out diagrams itself: it checks that the
//! source is a well-formed mermaid definition and emits the
//! `<pre class="mermaid">` element the client-side mermaid runtime draws.
//! Rejecting broken sources here is what lets the renderer show the raw
//! syntax with an error banner instead of an empty box.
//!
//! ## What is checked
//!
//! | Check | Error |
//! |-------|-------|
//! | At least one meaningful line | [`DiagramError::Empty`] |
//! | Known diagram keyword on the first meaningful line | [`DiagramError::UnknownType`] |
//! | `graph`/`flowchart` direction is TB, TD, BT, RL or LR | [`DiagramError::InvalidDirection`] |
//! | Flowchart and pie: every `"` on a line is closed on that line | [`DiagramError::UnterminatedString`] |
//! | Flowchart node brackets `()[]{}` nest correctly, outside quotes and `\|edge labels\|` | [`DiagramError::Unbalanced`] |
//!
//! Meaningful lines skip blanks, `%%` comments and `%%{init}%%` directives,
//! and a leading `---` front-matter block.

use crate::error::DiagramError;
use tracing::debug;

/// Renders one diagram source into an HTML fragment.
///
/// Implementations write into their own buffer and return it whole; the
/// caller splices it into the page only on `Ok`. A panicking engine is
/// treated by the caller as a failed diagram.
pub trait DiagramEngine: Send + Sync {
    fn render(&self, source: &str) -> Result<String, DiagramError>;
}

/// Diagram keywords accepted on the first meaningful line.
pub const DIAGRAM_KEYWORDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "journey",
    "gantt",
    "pie",
    "quadrantChart",
    "requirementDiagram",
    "gitGraph",
    "mindmap",
    "timeline",
    "sankey-beta",
    "xychart-beta",
    "block-beta",
    "C4Context",
];

const DIRECTIONS: &[&str] = &["TB", "TD", "BT", "RL", "LR"];

/// Validating engine for the client-side mermaid runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct MermaidEngine;

impl MermaidEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DiagramEngine for MermaidEngine {
    fn render(&self, source: &str) -> Result<String, DiagramError> {
        let lines = meaningful_lines(source);
        let (_, header) = lines.first().ok_or(DiagramError::Empty)?;

        let mut tokens = header.split_whitespace();
        let keyword = tokens
            .next()
            .map(|t| t.trim_end_matches(';'))
            .unwrap_or_default();
        if !DIAGRAM_KEYWORDS.contains(&keyword) {
            return Err(DiagramError::UnknownType(keyword.to_string()));
        }

        let is_flowchart = keyword == "graph" || keyword == "flowchart";
        if is_flowchart {
            if let Some(direction) = tokens.next().map(|t| t.trim_end_matches(';')) {
                if !direction.is_empty() && !DIRECTIONS.contains(&direction) {
                    return Err(DiagramError::InvalidDirection(direction.to_string()));
                }
            }
        }

        // Other diagram types use `"` as plain text (`Alice->>Bob: 5" screen`).
        if is_flowchart || keyword == "pie" {
            check_quotes(&lines)?;
        }
        if is_flowchart {
            check_brackets(&lines)?;
        }

        debug!("Accepted {} diagram ({} lines)", keyword, lines.len());
        Ok(format!(
            "<div class=\"mermaid-diagram\"><pre class=\"mermaid\">{}</pre></div>",
            escape_html(source.trim())
        ))
    }
}

/// `(1-based line number, trimmed line)` for every line that carries content.
fn meaningful_lines(source: &str) -> Vec<(usize, &str)> {
    let mut in_front_matter = false;
    let mut seen_content = false;
    let mut out = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line == "---" && (in_front_matter || !seen_content) {
            in_front_matter = !in_front_matter;
            seen_content = true;
            continue;
        }
        if in_front_matter || line.is_empty() || line.starts_with("%%") {
            continue;
        }
        seen_content = true;
        out.push((idx + 1, line));
    }
    out
}

fn check_quotes(lines: &[(usize, &str)]) -> Result<(), DiagramError> {
    for &(number, line) in lines {
        if line.matches('"').count() % 2 != 0 {
            return Err(DiagramError::UnterminatedString(number));
        }
    }
    Ok(())
}

/// Bracket nesting for flowchart node shapes.
///
/// Quoted text, `|edge labels|` and `<`/`>` inside an open node label are
/// skipped. `A>label]` (asymmetric node) opens with a `>` that directly
/// follows a bare node id at the start of a token; arrow heads never do.
fn check_brackets(lines: &[(usize, &str)]) -> Result<(), DiagramError> {
    let mut stack: Vec<(char, usize)> = Vec::new();

    for &(number, line) in lines {
        let mut in_quotes = false;
        let mut in_edge_label = false;
        // Length of the bare node id typed since the last token boundary,
        // `None` once anything else appears in the token.
        let mut node_id: Option<usize> = Some(0);

        for c in line.chars() {
            if c == '"' {
                in_quotes = !in_quotes;
                node_id = None;
                continue;
            }
            if in_quotes {
                continue;
            }
            if stack.is_empty() {
                if c == '|' {
                    in_edge_label = !in_edge_label;
                    node_id = Some(0);
                    continue;
                }
                if in_edge_label {
                    continue;
                }
                match c {
                    c if c.is_alphanumeric() || c == '_' => {
                        node_id = node_id.map(|n| n + 1);
                        continue;
                    }
                    c if c.is_whitespace() || c == '&' || c == ';' => {
                        node_id = Some(0);
                        continue;
                    }
                    '>' if node_id.is_some_and(|n| n > 0) => {
                        stack.push(('>', number));
                        continue;
                    }
                    // Arrow head: the next node starts right after it.
                    '>' => {
                        node_id = Some(0);
                        continue;
                    }
                    _ => node_id = None,
                }
            }

            match c {
                '(' | '[' | '{' => stack.push((c, number)),
                ')' | ']' | '}' => {
                    let expected: &[char] = match c {
                        ')' => &['('],
                        ']' => &['[', '>'],
                        _ => &['{'],
                    };
                    match stack.pop() {
                        Some((open, _)) if expected.contains(&open) => {}
                        _ => {
                            return Err(DiagramError::Unbalanced {
                                delimiter: c,
                                line: number,
                            })
                        }
                    }
                }
                _ => {}
            }
        }
    }

    match stack.pop() {
        Some((open, line)) => Err(DiagramError::Unbalanced {
            delimiter: open,
            line,
        }),
        None => Ok(()),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
