//! Post-processing: deterministic cleanup of model answers before rendering.
//!
//! ## Why is post-processing necessary?
//!
//! Chat models occasionally produce answers that are fine as text but render
//! badly:
//!
//! - Wrapping the whole answer in a ` ```markdown ... ``` ` fence, which the
//!   markdown parser then shows as one big code block
//! - Windows-style `\r\n` line endings
//! - Zero-width characters and BOMs copied from the source document
//! - Diagram fences tagged ` ```Mermaid ` or ` ``` mermaid `, which the
//!   diagram pass would not recognise
//!
//! Each rule is a pure `&str → String` function, independently testable.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the fence rules can rely on `\n`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation rules to a raw provider answer.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip an outer ```` ```markdown ```` / ```` ```md ```` fence
/// 3. Re-tag diagram fences to the canonical ```` ```mermaid ````
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
pub fn normalise_answer(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = canonicalise_diagram_fences(&s);
    remove_invisible_chars(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer markdown fences ──────────────────────────────────────

// Only explicit markdown fences: a bare ``` around the whole answer is a real
// code block.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)[ \t]*\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        // A second fence opener inside means the outer pair is not a wrapper.
        Some(caps) if !caps[1].contains("\n```markdown") => caps[1].to_string(),
        _ => input.to_string(),
    }
}

// ── Rule 3: Canonical diagram fences ─────────────────────────────────────────

static RE_DIAGRAM_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^([ \t]{0,3})(`{3,}|~{3,})[ \t]*mermaid[ \t]*$").unwrap());

fn canonicalise_diagram_fences(input: &str) -> String {
    RE_DIAGRAM_FENCE
        .replace_all(input, "${1}${2}mermaid")
        .into_owned()
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────
