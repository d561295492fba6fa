//! Answer rendering: markdown → sanitized HTML → diagrams.
//!
//! ## Pipeline
//!
//! ```text
//! markdown ─► MarkdownParser ─► HtmlSanitizer ─► diagram pass ─► RenderedMessage
//!    │             │ Err            │ Err
//!    └─────────────┴────────────────┴──────────► PlainText(markdown)
//! ```
//!
//! Parser, sanitizer and diagram engine sit behind traits so hosts and tests
//! can swap them. None of their failures escape this module: a parser or
//! sanitizer error degrades the whole answer to plain text, and a diagram
//! failure degrades only that diagram to its raw source under an error
//! banner.
//!
//! Sanitization runs on every HTML path, so model output can never inject
//! `<script>` or event-handler attributes into the host page.

use crate::config::RenderingCapability;
use crate::error::{DiagramError, RenderError};
use crate::pipeline::diagram::{DiagramEngine, MermaidEngine};
use once_cell::sync::Lazy;
use pulldown_cmark::{Options, Parser};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Banner inserted before a diagram block that could not be rendered.
pub const DIAGRAM_ERROR_BANNER: &str =
    "<div class=\"diagram-error\">Failed to render diagram. Showing raw syntax:</div>";

static RE_DIAGRAM_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<pre><code class="language-mermaid">(.*?)</code></pre>"#).unwrap()
});

// ── Seams ────────────────────────────────────────────────────────────────────

/// Converts markdown into (unsanitized) HTML.
pub trait MarkdownParser: Send + Sync {
    fn to_html(&self, markdown: &str) -> Result<String, RenderError>;
}

/// Removes anything unsafe from an HTML fragment.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> Result<String, RenderError>;
}

/// CommonMark via `pulldown-cmark` with tables, strikethrough and task lists.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommonMarkParser;

impl MarkdownParser for CommonMarkParser {
    fn to_html(&self, markdown: &str) -> Result<String, RenderError> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut html = String::with_capacity(markdown.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, Parser::new_ext(markdown, options));
        Ok(html)
    }
}

/// `ammonia` with its default allow-list plus `class` on `<code>`, which
/// carries the fence language the diagram pass looks for.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmmoniaSanitizer;

impl HtmlSanitizer for AmmoniaSanitizer {
    fn sanitize(&self, html: &str) -> Result<String, RenderError> {
        let mut builder = ammonia::Builder::default();
        builder.add_tag_attributes("code", &["class"]);
        Ok(builder.clean(html).to_string())
    }
}

// ── Output types ─────────────────────────────────────────────────────────────

/// Renderable body of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "body", rename_all = "snake_case")]
pub enum RenderedContent {
    /// Sanitized HTML fragment.
    Html(String),
    /// Shown verbatim; used for errors and when rendering is unavailable.
    PlainText(String),
}

impl RenderedContent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Html(s) | Self::PlainText(s) => s,
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html(_))
    }
}

/// Result of rendering one diagram block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderOutcome {
    Success,
    Failed { reason: DiagramError },
}

/// A fenced diagram found in an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramBlock {
    /// Decoded diagram source, as the model wrote it.
    pub source_text: String,
    pub outcome: RenderOutcome,
}

impl DiagramBlock {
    pub fn succeeded(&self) -> bool {
        self.outcome == RenderOutcome::Success
    }
}

/// Fully rendered answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub content: RenderedContent,
    /// In document order; empty for plain-text content.
    pub diagrams: Vec<DiagramBlock>,
}

// ── Renderer ─────────────────────────────────────────────────────────────────

/// Turns markdown answers into display-ready content.
pub struct ResponseRenderer {
    capability: RenderingCapability,
    parser: Arc<dyn MarkdownParser>,
    sanitizer: Arc<dyn HtmlSanitizer>,
    engine: Arc<dyn DiagramEngine>,
}

impl Default for ResponseRenderer {
    fn default() -> Self {
        Self::new(RenderingCapability::default(), Arc::new(MermaidEngine::new()))
    }
}

impl ResponseRenderer {
    /// Renderer with the CommonMark parser and ammonia sanitizer.
    pub fn new(capability: RenderingCapability, engine: Arc<dyn DiagramEngine>) -> Self {
        Self::with_components(
            capability,
            Arc::new(CommonMarkParser),
            Arc::new(AmmoniaSanitizer),
            engine,
        )
    }

    pub fn with_components(
        capability: RenderingCapability,
        parser: Arc<dyn MarkdownParser>,
        sanitizer: Arc<dyn HtmlSanitizer>,
        engine: Arc<dyn DiagramEngine>,
    ) -> Self {
        Self {
            capability,
            parser,
            sanitizer,
            engine,
        }
    }

    pub fn capability(&self) -> RenderingCapability {
        self.capability
    }

    /// Markdown → sanitized HTML, or the markdown itself as plain text.
    pub fn render(&self, markdown: &str) -> RenderedContent {
        if !self.capability.available {
            return RenderedContent::PlainText(markdown.to_string());
        }

        let html = self
            .parser
            .to_html(markdown)
            .and_then(|html| self.sanitizer.sanitize(&html));

        match html {
            Ok(html) => RenderedContent::Html(html),
            Err(e) => {
                warn!("Rendering failed, showing plain text: {}", e);
                RenderedContent::PlainText(markdown.to_string())
            }
        }
    }

    /// Render every diagram block of sanitized HTML.
    ///
    /// Successful diagrams replace their `<pre>` block in place. Failed ones
    /// keep the block, with [`DIAGRAM_ERROR_BANNER`] inserted just before it.
    /// Everything else is copied unchanged.
    pub fn render_diagrams(&self, html: &str) -> (String, Vec<DiagramBlock>) {
        let mut out = String::with_capacity(html.len());
        let mut blocks = Vec::new();
        let mut last = 0;

        for caps in RE_DIAGRAM_BLOCK.captures_iter(html) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&html[last..whole.start()]);
            last = whole.end();

            let source_text = decode_entities(&caps[1]);
            match self.render_one(&source_text) {
                Ok(element) => {
                    out.push_str(&element);
                    blocks.push(DiagramBlock {
                        source_text,
                        outcome: RenderOutcome::Success,
                    });
                }
                Err(reason) => {
                    warn!("Diagram {} failed to render: {}", blocks.len() + 1, reason);
                    out.push_str(DIAGRAM_ERROR_BANNER);
                    out.push_str(whole.as_str());
                    blocks.push(DiagramBlock {
                        source_text,
                        outcome: RenderOutcome::Failed { reason },
                    });
                }
            }
        }
        out.push_str(&html[last..]);

        if !blocks.is_empty() {
            debug!(
                "Rendered {}/{} diagrams",
                blocks.iter().filter(|b| b.succeeded()).count(),
                blocks.len()
            );
        }
        (out, blocks)
    }

    /// The full pipeline for one answer.
    pub fn render_message(&self, markdown: &str) -> RenderedMessage {
        match self.render(markdown) {
            RenderedContent::Html(html) => {
                let (html, diagrams) = self.render_diagrams(&html);
                RenderedMessage {
                    content: RenderedContent::Html(html),
                    diagrams,
                }
            }
            plain => RenderedMessage {
                content: plain,
                diagrams: Vec::new(),
            },
        }
    }

    fn render_one(&self, source: &str) -> Result<String, DiagramError> {
        let engine = Arc::clone(&self.engine);
        panic::catch_unwind(AssertUnwindSafe(|| engine.render(source)))
            .unwrap_or_else(|payload| Err(DiagramError::EnginePanic(panic_message(&*payload))))
    }
}

impl std::fmt::Debug for ResponseRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseRenderer")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Undo the entity escaping of HTML text content. `&amp;` goes last so
/// `&amp;lt;` decodes to `&lt;`, not `<`.
fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
