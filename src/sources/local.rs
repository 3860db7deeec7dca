//! Local document discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::SourceError;

const PDF_EXTENSION: &str = "pdf";

/// Collect every PDF below `root`, sorted by path.
///
/// `root` may also name a single PDF. Paths matching any of
/// `exclude_patterns` (glob syntax) are skipped.
pub fn scan_documents(
    root: &Path,
    exclude_patterns: &[String],
) -> Result<Vec<PathBuf>, SourceError> {
    if root.is_file() {
        return Ok(if is_pdf(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    if !root.is_dir() {
        return Err(SourceError::DirectoryNotFound(root.display().to_string()));
    }

    let patterns: Vec<glob::Pattern> = exclude_patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| SourceError::WalkError(e.to_string()))?;
        let path = entry.path();

        if !entry.file_type().is_file() || !is_pdf(path) {
            continue;
        }

        let path_str = path.to_string_lossy();
        if patterns.iter().any(|p| p.matches(&path_str)) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(PDF_EXTENSION))
}
