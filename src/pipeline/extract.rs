//! Text extraction: turn an uploaded document into plain text.
//!
//! ## Why extract from a path?
//!
//! Uploads are staged to a temporary file by [`crate::ask`] (keeping the
//! original extension), so every format reads from the same place and the
//! temp file is removed when the request finishes, however it finishes.
//!
//! ## Why is this blocking?
//!
//! pdfium is a C++ library with thread-local state; `docx-rs` parses the
//! whole archive in memory. Both are CPU-bound, so callers run
//! [`extract_text`] inside `tokio::task::spawn_blocking`.

use crate::error::ExtractError;
use pdfium_render::prelude::*;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Extensions accepted by the service, in the order they are advertised.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = [".pdf", ".docx", ".doc", ".md"];

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    /// Word documents. Legacy `.doc` uploads are routed here too and fail
    /// extraction unless they are really OOXML with the wrong extension.
    Docx,
    Markdown,
}

impl DocumentFormat {
    /// Resolve the format from a file name's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let ext = Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        match ext.as_str() {
            ".pdf" => Ok(DocumentFormat::Pdf),
            ".docx" | ".doc" => Ok(DocumentFormat::Docx),
            ".md" => Ok(DocumentFormat::Markdown),
            _ => Err(ExtractError::UnsupportedFormat { extension: ext }),
        }
    }

    /// Canonical extension, used for the staged temp file.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => ".pdf",
            DocumentFormat::Docx => ".docx",
            DocumentFormat::Markdown => ".md",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Markdown => "Markdown",
        })
    }
}

/// Extract plain text from the document at `path`.
pub fn extract_text(path: &Path, format: DocumentFormat) -> Result<String, ExtractError> {
    let text = match format {
        DocumentFormat::Pdf => extract_pdf(path),
        DocumentFormat::Docx => extract_docx(path),
        DocumentFormat::Markdown => extract_markdown(path),
    }?;
    debug!("Extracted {} chars of {} text", text.chars().count(), format);
    Ok(text)
}

fn failed(format: DocumentFormat, detail: impl fmt::Display) -> ExtractError {
    ExtractError::ExtractionFailed {
        format: format.to_string(),
        detail: detail.to_string(),
    }
}

// ── PDF ──────────────────────────────────────────────────────────────────────

/// Bind pdfium from `PDFIUM_LIB_PATH` if set, else from the system library path.
fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| failed(DocumentFormat::Pdf, format!("pdfium unavailable: {:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| failed(DocumentFormat::Pdf, format!("{:?}", e)))?;

    let mut text = String::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|e| failed(DocumentFormat::Pdf, format!("page {}: {:?}", idx + 1, e)))?;
        text.push_str(&page_text.all());
        text.push('\n');
    }
    Ok(text)
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

fn extract_docx(path: &Path) -> Result<String, ExtractError> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild};

    let bytes = std::fs::read(path).map_err(|e| failed(DocumentFormat::Docx, e))?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| failed(DocumentFormat::Docx, e))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(
                para.children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(
                            run.children
                                .iter()
                                .filter_map(|rc| match rc {
                                    RunChild::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect::<String>(),
                        ),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

// ── Markdown ─────────────────────────────────────────────────────────────────

fn extract_markdown(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| failed(DocumentFormat::Markdown, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
