//! Index command implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::{build_embedder, open_store};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, ResolvedConfig};
use crate::services::{CorpusIndexer, CorpusReconciler, PrepareOutcome, TextChunker};
use crate::sources::{PdfLoader, scan_documents};

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Directory (or single PDF) to index; defaults to `indexing.docs_dir`
    #[arg(long, short = 'd')]
    pub docs_dir: Option<PathBuf>,

    /// Rebuild the store even when it already covers every document
    #[arg(long)]
    pub force: bool,

    /// List the documents that would be indexed without indexing them
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_index(
    args: IndexArgs,
    resolved: &ResolvedConfig,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = &resolved.config;
    let formatter = get_formatter(format);
    let docs_dir = args
        .docs_dir
        .unwrap_or_else(|| config.indexing.docs_dir.clone());

    if args.dry_run {
        let documents = find_documents(config, &docs_dir)?;
        println!(
            "{}",
            formatter.format_message(&format!(
                "Dry run: would index {} document(s)",
                documents.len()
            ))
        );
        for document in &documents {
            println!("  {}", document.display());
        }
        return Ok(());
    }

    let outcome = prepare_corpus(config, &docs_dir, args.force, verbose).await?;
    print!("{}", formatter.format_prepare(&outcome));
    Ok(())
}

/// Make the vector store cover every PDF under `docs_dir`.
///
/// Shared by `index`, `ask` and `chat`; progress goes to stderr.
pub(crate) async fn prepare_corpus(
    config: &Config,
    docs_dir: &Path,
    force: bool,
    verbose: bool,
) -> Result<PrepareOutcome> {
    let embedder = build_embedder(config)?;
    let documents = find_documents(config, docs_dir)?;
    if documents.is_empty() {
        anyhow::bail!(
            "no PDF documents found in {}; add files or set indexing.docs_dir",
            docs_dir.display()
        );
    }

    if verbose {
        eprintln!("Found {} document(s) in {}", documents.len(), docs_dir.display());
    }

    let store = open_store(config).await?;
    let indexer = CorpusIndexer::new(
        Arc::new(PdfLoader::new()),
        TextChunker::new(&config.indexing),
        embedder,
        store,
        CorpusReconciler::new(config.vector_store.scan_limit as usize),
    );

    let pb = ProgressBar::new(4);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );

    let outcome = indexer.prepare(&documents, force, &pb).await;
    pb.finish_and_clear();

    outcome.context("failed to prepare the vector store")
}

fn find_documents(config: &Config, docs_dir: &Path) -> Result<Vec<PathBuf>> {
    scan_documents(docs_dir, &config.indexing.exclude_patterns)
        .with_context(|| format!("failed to scan {}", docs_dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_corpus_requires_key_before_scanning() {
        let config = Config::default();
        let err = prepare_corpus(&config, Path::new("does-not-exist"), false, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_prepare_corpus_rejects_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.api.key = Some("test-key".to_string());
        config.vector_store.path = dir.path().join("store");

        let err = prepare_corpus(&config, dir.path(), false, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no PDF documents found"));
    }

    #[test]
    fn test_find_documents_honors_excludes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("draft.pdf"), b"%PDF").unwrap();
        let mut config = Config::default();
        config.indexing.exclude_patterns = vec!["**/draft*".to_string()];

        let documents = find_documents(&config, dir.path()).unwrap();
        assert_eq!(documents, vec![dir.path().join("keep.pdf")]);
    }
}
