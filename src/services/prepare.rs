//! Build or reuse the vector store for a set of documents.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{info, warn};

use super::batch::BatchEmbedder;
use super::chunker::TextChunker;
use super::reconcile::{CorpusReconciler, Reconciliation};
use super::vector_store::VectorStore;
use crate::error::IndexError;
use crate::models::{DocumentChunk, PageText};
use crate::sources::DocumentLoader;

const UPSERT_BATCH_SIZE: usize = 100;

/// Counts from a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
    /// Chunks stored with a vector.
    pub embedded: usize,
    /// Chunks dropped because embedding failed.
    pub failed: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum PrepareOutcome {
    /// The store already covered every document and was left untouched.
    Reused { documents: usize },
    Rebuilt(IndexStats),
}

pub struct CorpusIndexer {
    loader: Arc<dyn DocumentLoader>,
    chunker: TextChunker,
    embedder: BatchEmbedder,
    store: Arc<dyn VectorStore>,
    reconciler: CorpusReconciler,
}

impl CorpusIndexer {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        chunker: TextChunker,
        embedder: BatchEmbedder,
        store: Arc<dyn VectorStore>,
        reconciler: CorpusReconciler,
    ) -> Self {
        Self {
            loader,
            chunker,
            embedder,
            store,
            reconciler,
        }
    }

    /// Make the store cover `documents`.
    ///
    /// Unless `force` is set, a non-empty store that already holds every
    /// document is reused. Otherwise the whole set is reprocessed and the
    /// store replaced.
    pub async fn prepare(
        &self,
        documents: &[PathBuf],
        force: bool,
        progress: &ProgressBar,
    ) -> Result<PrepareOutcome, IndexError> {
        if documents.is_empty() {
            return Err(IndexError::NoDocuments);
        }

        if !force && self.is_current(documents).await {
            info!(documents = documents.len(), "vector store is current");
            return Ok(PrepareOutcome::Reused {
                documents: documents.len(),
            });
        }

        self.rebuild(documents, progress)
            .await
            .map(PrepareOutcome::Rebuilt)
    }

    /// A store whose collection info cannot be read counts as current.
    async fn is_current(&self, documents: &[PathBuf]) -> bool {
        let points = match self.store.get_collection_info().await {
            Ok(Some(info)) => info.points_count,
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "could not read collection info, using store as-is");
                return true;
            }
        };
        if points == 0 {
            return false;
        }

        let names = documents.iter().map(|p| p.to_string_lossy());
        match self.reconciler.reconcile(names, self.store.as_ref()).await {
            Reconciliation::Current => true,
            Reconciliation::Stale { missing } => {
                info!(
                    missing = missing.len(),
                    documents = ?missing,
                    "new documents found, reprocessing all"
                );
                false
            }
        }
    }

    async fn rebuild(
        &self,
        documents: &[PathBuf],
        progress: &ProgressBar,
    ) -> Result<IndexStats, IndexError> {
        let start = Instant::now();
        progress.set_length(4);
        progress.set_position(0);

        progress.set_message(format!(
            "Step 1/4: Extracting text from {} document(s)",
            documents.len()
        ));
        let pages = self.load_pages(documents)?;
        progress.inc(1);

        progress.set_message(format!("Step 2/4: Chunking {} page(s)", pages.len()));
        let mut chunks = self.chunker.chunk_all(&pages);
        progress.inc(1);

        progress.set_message(format!(
            "Step 3/4: Generating embeddings for {} chunk(s)",
            chunks.len()
        ));
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_many(&texts).await;
        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            chunk.dense_vector = vector;
        }
        progress.inc(1);

        progress.set_message("Step 4/4: Saving to database");
        let total_chunks = chunks.len();
        let embedded: Vec<DocumentChunk> = chunks
            .into_iter()
            .filter(|c| !c.dense_vector.is_empty())
            .collect();
        let failed = total_chunks - embedded.len();
        if failed > 0 {
            warn!(failed, "skipping chunks without embeddings");
        }
        if total_chunks > 0 && embedded.is_empty() {
            return Err(IndexError::NothingEmbedded {
                chunks: total_chunks,
            });
        }

        self.store.clear_collection().await?;
        self.store.create_collection().await?;

        let embedded_count = embedded.len();
        let mut remaining = embedded;
        while !remaining.is_empty() {
            let rest = remaining.split_off(remaining.len().min(UPSERT_BATCH_SIZE));
            self.store.upsert_points(remaining).await?;
            remaining = rest;
        }
        progress.inc(1);

        let stats = IndexStats {
            documents: documents.len(),
            pages: pages.len(),
            chunks: total_chunks,
            embedded: embedded_count,
            failed,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            documents = stats.documents,
            pages = stats.pages,
            chunks = stats.chunks,
            failed = stats.failed,
            duration_ms = stats.duration_ms,
            "rebuilt vector store"
        );

        Ok(stats)
    }

    fn load_pages(&self, documents: &[PathBuf]) -> Result<Vec<PageText>, IndexError> {
        let mut pages = Vec::new();
        for path in documents {
            pages.extend(self.loader.load(path)?);
        }
        Ok(pages)
    }
}
