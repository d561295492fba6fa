//! Pipeline stages for chatting with a PDF.
//!
//! Each submodule implements exactly one step and sits behind a trait where
//! the step talks to something external (pdfium, a provider, a diagram
//! runtime), so sessions can be tested with fakes.
//!
//! ## Data Flow
//!
//! ```text
//! load:  input ──▶ extract ──▶ DocumentStore
//!       (path/URL)  (pdfium)
//!
//! ask:   prompts ──▶ llm ──▶ postprocess ──▶ render ──▶ diagram
//!                  (OpenAI/   (cleanup)    (markdown,  (mermaid)
//!                   Gemini)                 sanitize)
//! ```
//!
//! 1. [`input`]   read a local file or download a URL, check `%PDF` magic
//! 2. [`extract`] pull the text layer out of the PDF on the blocking pool
//! 3. [`llm`]     validate the credential and make the single provider call
//! 4. [`postprocess`] deterministic cleanup of model quirks
//! 5. [`render`]  markdown to sanitized HTML, falling back to plain text
//! 6. [`diagram`] turn fenced mermaid blocks into diagram elements

pub mod diagram;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
