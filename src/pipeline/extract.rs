//! PDF text extraction.
//!
//! [`TextExtractor`] is the seam between the document store and whatever
//! turns PDF bytes into text. The production implementation,
//! [`PdfiumExtractor`], uses `pdfium-render`; tests inject fakes.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with internal global state and no async support.
//! Extraction is CPU-bound and can take seconds on large documents, so it runs
//! on Tokio's blocking pool instead of stalling a worker thread.

use crate::error::PdfChatError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Environment variable pointing at an existing pdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Turns raw PDF bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the full text of the document.
    ///
    /// `name` is the display name, used only in error messages. Failures that
    /// mean "these bytes are not a readable document" must be reported as
    /// [`PdfChatError::Parse`].
    async fn extract_text(&self, name: &str, bytes: Vec<u8>) -> Result<String, PdfChatError>;
}

/// Text extraction through pdfium.
///
/// The library bindings are not thread-safe to share, so each extraction
/// binds pdfium on the blocking thread that uses it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumExtractor;

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract_text(&self, name: &str, bytes: Vec<u8>) -> Result<String, PdfChatError> {
        let name_owned = name.to_string();

        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium()?;
            extract_blocking(&pdfium, &name_owned, &bytes)
        })
        .await
        .map_err(|e| PdfChatError::Internal(format!("Extraction task panicked: {}", e)))?
    }
}

/// Bind to `PDFIUM_LIB_PATH` when set, else to the system library.
fn bind_pdfium() -> Result<Pdfium, PdfChatError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from {}", path);
            Pdfium::bind_to_library(&path)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PdfChatError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_blocking(pdfium: &Pdfium, name: &str, bytes: &[u8]) -> Result<String, PdfChatError> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PdfChatError::Parse {
            name: name.to_string(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let mut page_texts = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| PdfChatError::Parse {
            name: name.to_string(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        page_texts.push(text.all());
    }

    let text = join_pages(&page_texts);
    if text.trim().is_empty() {
        return Err(PdfChatError::Parse {
            name: name.to_string(),
            detail: "the document has no extractable text (scanned pages without a text layer?)"
                .into(),
        });
    }

    info!(
        "Extracted {} characters from {} pages of '{}'",
        text.chars().count(),
        page_texts.len(),
        name
    );
    Ok(text)
}

/// Join page texts with a blank line, trimming page-edge whitespace.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
