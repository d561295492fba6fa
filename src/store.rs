//! The currently loaded document.
//!
//! [`DocumentStore`] holds at most one [`Document`]. A load extracts the text
//! first and swaps it in only on success, so a failed load leaves the
//! previous document fully usable. Readers get an `Arc<Document>` snapshot:
//! a question that started before a reload keeps answering against the text
//! it started with.

use crate::error::PdfChatError;
use crate::pipeline::extract::TextExtractor;
use crate::status::StatusChannel;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// An extracted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Display name, usually the file name.
    pub name: String,
    /// Full extracted text. May exceed the prompt limit; truncation happens
    /// when the prompt is built.
    pub text: String,
}

/// Holds the single active document.
pub struct DocumentStore {
    current: RwLock<Option<Arc<Document>>>,
    extractor: Arc<dyn TextExtractor>,
    status: StatusChannel,
}

impl DocumentStore {
    pub fn new(extractor: Arc<dyn TextExtractor>, status: StatusChannel) -> Self {
        Self {
            current: RwLock::new(None),
            extractor,
            status,
        }
    }

    /// Extract `bytes` and make the result the active document.
    ///
    /// Status sequence: `Reading file: {name}...`, `Parsing PDF...`, then
    /// either `File loaded successfully.` followed by the document-loaded
    /// event, or `Error: {error}`. On error the previous document stays.
    pub async fn load(&self, bytes: Vec<u8>, name: &str) -> Result<Arc<Document>, PdfChatError> {
        self.status.status(format!("Reading file: {}...", name));
        self.status.status("Parsing PDF...");

        let text = match self.extractor.extract_text(name, bytes).await {
            Ok(text) => text,
            Err(e) => {
                let e = into_parse_error(name, e);
                warn!("Failed to load '{}': {}", name, e);
                self.status.status(format!("Error: {e}"));
                return Err(e);
            }
        };

        let document = Arc::new(Document {
            name: name.to_string(),
            text,
        });
        {
            let mut slot = self.current.write().unwrap_or_else(|p| p.into_inner());
            *slot = Some(Arc::clone(&document));
        }

        info!(
            "Loaded '{}' ({} characters)",
            document.name,
            document.text.chars().count()
        );
        self.status.status("File loaded successfully.");
        self.status.document_loaded(&document.name);
        Ok(document)
    }

    /// Snapshot of the active document, if any.
    pub fn current(&self) -> Option<Arc<Document>> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn current_text(&self) -> Option<String> {
        self.current().map(|d| d.text.clone())
    }

    /// The active document, or [`PdfChatError::NoDocument`].
    pub fn require(&self) -> Result<Arc<Document>, PdfChatError> {
        self.current().ok_or(PdfChatError::NoDocument)
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("current", &self.current().map(|d| d.name.clone()))
            .finish_non_exhaustive()
    }
}

/// Every extraction failure surfaces as a parse error naming the document.
fn into_parse_error(name: &str, e: PdfChatError) -> PdfChatError {
    match e {
        PdfChatError::Parse { .. } => e,
        other => PdfChatError::Parse {
            name: name.to_string(),
            detail: other.to_string(),
        },
    }
}
