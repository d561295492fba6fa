//! Error types for the edgequake-pdfchat library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfChatError`]: **request-level**: a load, question or task cannot be
//!   completed (unreadable PDF, missing API key, provider failure). Returned
//!   as `Err(PdfChatError)` from the store, router and `try_*` session
//!   methods, and turned into an `"Error: …"` message by
//!   [`crate::session::ChatSession::ask`] / [`crate::session::ChatSession::run_task`].
//!
//! * [`RenderError`] / [`DiagramError`]: **contained**: a markdown parser,
//!   sanitizer or diagram engine failed. These never leave
//!   [`crate::pipeline::render::ResponseRenderer`]; the renderer degrades to
//!   plain text or to the raw diagram source instead.

use std::path::PathBuf;
use thiserror::Error;

/// All request-level errors returned by the edgequake-pdfchat library.
#[derive(Debug, Error)]
pub enum PdfChatError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but could not be read (a directory, an I/O error).
    #[error("Failed to read '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("'{name}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── Document errors ───────────────────────────────────────────────────
    /// Text extraction failed; the previously loaded document stays active.
    #[error("Failed to read the PDF file '{name}': {detail}")]
    Parse { name: String, detail: String },

    /// A question or task was issued before any document was loaded.
    #[error("No document is loaded. Please open a PDF file first.")]
    NoDocument,

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Request errors ────────────────────────────────────────────────────
    /// The requested task id is not in the catalog.
    #[error("Unknown task '{id}'")]
    UnknownTask { id: String },

    /// The credential for the classified provider is absent.
    #[error("No API key found for {provider}: set {variable}")]
    MissingCredential {
        provider: &'static str,
        variable: &'static str,
    },

    /// The provider call failed or returned an unusable response.
    #[error("{provider} request for model '{model}' failed: {message}")]
    Provider {
        provider: &'static str,
        model: String,
        message: String,
    },

    /// A question or task was issued while another one is still running.
    #[error("Another request is still in progress; wait for it to finish.")]
    Busy,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A contained failure of the markdown parser or HTML sanitizer.
///
/// Triggers the plain-text fallback in the renderer.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown parser failed: {0}")]
    Parser(String),

    #[error("HTML sanitizer failed: {0}")]
    Sanitizer(String),
}

/// Why a single diagram block could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DiagramError {
    #[error("diagram is empty")]
    Empty,

    #[error("unknown diagram type '{0}'")]
    UnknownType(String),

    #[error("invalid direction '{0}' (expected TB, TD, BT, RL or LR)")]
    InvalidDirection(String),

    #[error("unbalanced '{delimiter}' on line {line}")]
    Unbalanced { delimiter: char, line: usize },

    #[error("unterminated string on line {0}")]
    UnterminatedString(usize),

    #[error("diagram engine panicked: {0}")]
    EnginePanic(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_names_variable() {
        let e = PdfChatError::MissingCredential {
            provider: "OpenAI",
            variable: "OPENAI_API_KEY",
        };
        let msg = e.to_string();
        assert!(msg.contains("OPENAI_API_KEY"), "got: {msg}");
        assert!(msg.contains("OpenAI"));
    }

    #[test]
    fn provider_error_display() {
        let e = PdfChatError::Provider {
            provider: "Gemini",
            model: "gemini-1.5-pro".into(),
            message: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("gemini-1.5-pro"));
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn parse_error_keeps_underlying_message() {
        let e = PdfChatError::Parse {
            name: "deck.pdf".into(),
            detail: "xref table corrupt".into(),
        };
        assert!(e.to_string().contains("xref table corrupt"));
    }

    #[test]
    fn unbalanced_display() {
        let e = DiagramError::Unbalanced {
            delimiter: '[',
            line: 3,
        };
        assert_eq!(e.to_string(), "unbalanced '[' on line 3");
    }
}
