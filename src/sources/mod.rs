//! Document sources.
//!
//! A loader turns one file into per-page text; `scan_documents` finds the
//! files to load.

mod local;
mod pdf;

pub use local::scan_documents;
pub use pdf::PdfLoader;

#[cfg(test)]
pub(crate) use pdf::tests as pdf_tests;

use std::path::Path;

use crate::error::SourceError;
use crate::models::PageText;

/// Extracts page text from a single document.
pub trait DocumentLoader: Send + Sync {
    /// Pages in document order, numbered from 1.
    fn load(&self, path: &Path) -> Result<Vec<PageText>, SourceError>;

    /// Human-readable name.
    fn name(&self) -> &str;
}
