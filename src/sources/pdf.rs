//! PDF text extraction.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use super::DocumentLoader;
use crate::error::SourceError;
use crate::models::PageText;

/// Loads PDFs page by page with `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<PageText>, SourceError> {
        let source = path.to_string_lossy().to_string();
        let document = Document::load(path).map_err(|e| SourceError::PdfError {
            path: source.clone(),
            message: e.to_string(),
        })?;

        let pages: Vec<PageText> = document
            .get_pages()
            .into_keys()
            .map(|page| {
                // Pages without extractable text (scans, images) still count.
                let text = document.extract_text(&[page]).unwrap_or_else(|e| {
                    warn!(source = %source, page, error = %e, "could not extract page text");
                    String::new()
                });
                PageText {
                    source: source.clone(),
                    page,
                    text,
                }
            })
            .collect();

        debug!(source = %source, pages = pages.len(), "loaded PDF");
        Ok(pages)
    }

    fn name(&self) -> &str {
        "pdf"
    }
}
