//! # edgequake-pdfchat
//!
//! Chat with a PDF document using a large language model.
//!
//! ## Why this crate?
//!
//! Reviewing a pitch deck or an investor memo usually means the same handful
//! of questions: what does the company do, what are the numbers, what should
//! we ask the team. This crate loads one PDF at a time, extracts its text,
//! and answers free-form questions or canned analysis tasks about it through
//! OpenAI or Gemini. Answers come back as sanitized HTML ready to display,
//! including Mermaid diagrams the model draws from the document's data.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   text layer via pdfium (CPU-bound, spawn_blocking)
//!  │
//! question / task
//!  │
//!  ├─ 3. Prompt    instruction + first 100 000 chars + question
//!  ├─ 4. Route     model id "gpt*" → OpenAI, anything else → Gemini
//!  ├─ 5. Polish    fence, line-ending and invisible-character cleanup
//!  ├─ 6. Render    markdown → sanitized HTML (or plain text)
//!  └─ 7. Diagrams  ```mermaid blocks → diagram elements, with fallback
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfchat::{ChatConfig, ChatSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Model from EDGEQUAKE_MODEL (default gpt-4o); key from OPENAI_API_KEY / GEMINI_API_KEY
//!     let session = ChatSession::new(ChatConfig::default())?;
//!     session.open("deck.pdf").await?;
//!
//!     let summary = session.run_task("summarize").await;
//!     println!("{}", summary.copy_text());
//!
//!     let answer = session.ask("Who are the founders?").await;
//!     println!("{}", answer.content.as_str());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfchat = { version = "0.1", default-features = false }
//! ```
//!
//! ## Tasks
//!
//! | Id | What it asks for |
//! |----|------------------|
//! | `summarize` | Summary of value proposition, financials and team |
//! | `tech-questions` | 5–10 technical due-diligence questions |
//! | `create-diagrams` | Mermaid diagrams of the document's key data |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod status;
pub mod store;
pub mod tasks;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    classify_model, ChatConfig, ChatConfigBuilder, ProviderConfig, ProviderKind,
    RenderingCapability,
};
pub use error::{DiagramError, PdfChatError, RenderError};
pub use pipeline::diagram::{DiagramEngine, MermaidEngine};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::llm::{CompletionBackend, CompletionRequest, EdgequakeBackend, ProviderRouter};
pub use pipeline::render::{
    DiagramBlock, RenderOutcome, RenderedContent, RenderedMessage, ResponseRenderer,
};
pub use prompts::{build_prompt, PromptRequest};
pub use session::{ChatSession, Message, Role, NO_DOCUMENT_MESSAGE};
pub use status::{
    ChannelStatusCallback, NoopStatusCallback, StatusCallback, StatusChannel, StatusEvent,
};
pub use store::{Document, DocumentStore};
pub use tasks::TaskDefinition;
