//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! The document store only ever sees `(bytes, display name)`; this module is
//! the presentation-side helper that produces them. We validate the PDF magic
//! bytes (`%PDF`) here so a wrong file is reported as "not a PDF" instead of
//! as an opaque extraction failure.

use crate::error::PdfChatError;
use std::path::Path;
use tracing::{debug, info};

/// Raw bytes of a PDF and the name to display for it.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub bytes: Vec<u8>,
    pub name: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
///
/// If the input is a URL, download it. Otherwise read the local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, PdfChatError> {
    let resolved = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(Path::new(input)).await?
    };
    check_magic(&resolved)?;
    Ok(resolved)
}

/// Read a local file, mapping I/O failures to input errors.
async fn read_local(path: &Path) -> Result<ResolvedInput, PdfChatError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PdfChatError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => PdfChatError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => PdfChatError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput { bytes, name })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, PdfChatError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdfChatError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfChatError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());

    Ok(ResolvedInput {
        bytes: bytes.to_vec(),
        name: filename_from_url(url),
    })
}

/// Display name for a downloaded document: the last URL path segment when it
/// looks like a file name, else `downloaded.pdf`.
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

fn check_magic(input: &ResolvedInput) -> Result<(), PdfChatError> {
    if input.bytes.starts_with(b"%PDF") {
        return Ok(());
    }
    Err(PdfChatError::NotAPdf {
        name: input.name.clone(),
        magic: input.bytes.iter().take(4).copied().collect(),
    })
}
