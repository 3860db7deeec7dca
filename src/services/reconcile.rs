//! Decide whether an existing store already covers a set of documents.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::vector_store::VectorStore;
use crate::models::{DEFAULT_SCAN_LIMIT, document_id_from_source};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Every requested document is represented in the store.
    Current,
    /// These requested documents have no records in the store.
    Stale { missing: BTreeSet<String> },
}

impl Reconciliation {
    pub fn is_current(&self) -> bool {
        matches!(self, Reconciliation::Current)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CorpusReconciler {
    scan_limit: usize,
}

impl Default for CorpusReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_LIMIT as usize)
    }
}

impl CorpusReconciler {
    pub fn new(scan_limit: usize) -> Self {
        Self { scan_limit }
    }

    /// Compare `requested` document names against what `store` holds.
    ///
    /// Names on both sides are reduced to their final path segment. A store
    /// that cannot be listed is reported as current, so a session can still
    /// run against whatever was indexed before.
    pub async fn reconcile<I, S>(&self, requested: I, store: &dyn VectorStore) -> Reconciliation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: BTreeSet<String> = requested
            .into_iter()
            .filter_map(|name| document_id_from_source(name.as_ref()))
            .collect();

        let existing: BTreeSet<String> = match store.list_metadata(self.scan_limit).await {
            Ok(records) => records.iter().filter_map(|m| m.document_id()).collect(),
            Err(e) => {
                warn!(
                    collection = store.collection(),
                    error = %e,
                    "could not list indexed documents, using store as-is"
                );
                return Reconciliation::Current;
            }
        };

        let missing: BTreeSet<String> = requested.difference(&existing).cloned().collect();

        debug!(
            requested = requested.len(),
            existing = existing.len(),
            missing = missing.len(),
            "reconciled corpus"
        );

        if missing.is_empty() {
            Reconciliation::Current
        } else {
            Reconciliation::Stale { missing }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::VectorStoreError;
    use crate::models::{ChunkMetadata, DocumentChunk, RetrievedRecord, VectorDriver};
    use crate::services::vector_store::CollectionInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory store that can be told to fail listing or collection info.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub chunks: Mutex<Vec<DocumentChunk>>,
        pub exists: Mutex<bool>,
        pub fail_list: bool,
        pub fail_info: bool,
        pub list_limits: Mutex<Vec<usize>>,
        pub clears: Mutex<usize>,
    }

    impl MemoryStore {
        pub fn with_sources(sources: &[&str]) -> Self {
            let chunks = sources
                .iter()
                .enumerate()
                .map(|(i, source)| {
                    let page = crate::models::PageText {
                        source: source.to_string(),
                        page: 1,
                        text: format!("text {i}"),
                    };
                    let mut chunk = DocumentChunk::from_page(&page, page.text.clone(), 0);
                    chunk.dense_vector = vec![1.0, 0.0];
                    chunk
                })
                .collect();
            Self {
                chunks: Mutex::new(chunks),
                exists: Mutex::new(true),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail_list: true,
                exists: Mutex::new(true),
                ..Default::default()
            }
        }

        pub fn stored(&self) -> Vec<DocumentChunk> {
            self.chunks.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorStore for MemoryStore {
        async fn health_check(&self) -> Result<bool, VectorStoreError> {
            Ok(true)
        }

        async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
            if self.fail_info {
                return Err(VectorStoreError::CollectionError(
                    "collection info unavailable".to_string(),
                ));
            }
            if !*self.exists.lock().unwrap() {
                return Ok(None);
            }
            Ok(Some(CollectionInfo {
                points_count: self.chunks.lock().unwrap().len() as u64,
            }))
        }

        async fn create_collection(&self) -> Result<(), VectorStoreError> {
            *self.exists.lock().unwrap() = true;
            Ok(())
        }

        async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
            if chunks.iter().any(|c| c.dense_vector.is_empty()) {
                return Err(VectorStoreError::UpsertError("empty vector".to_string()));
            }
            self.chunks.lock().unwrap().extend(chunks);
            Ok(())
        }

        async fn search(
            &self,
            _query_vector: Vec<f32>,
            limit: u64,
        ) -> Result<Vec<RetrievedRecord>, VectorStoreError> {
            Ok(self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .take(limit as usize)
                .map(|c| RetrievedRecord {
                    id: c.id.clone(),
                    score: 0.9,
                    content: c.content.clone(),
                    metadata: c.metadata.clone(),
                })
                .collect())
        }

        async fn list_metadata(
            &self,
            limit: usize,
        ) -> Result<Vec<ChunkMetadata>, VectorStoreError> {
            self.list_limits.lock().unwrap().push(limit);
            if self.fail_list {
                return Err(VectorStoreError::ListError("store unreadable".to_string()));
            }
            Ok(self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .take(limit)
                .map(|c| c.metadata.clone())
                .collect())
        }

        async fn clear_collection(&self) -> Result<(), VectorStoreError> {
            *self.clears.lock().unwrap() += 1;
            self.chunks.lock().unwrap().clear();
            Ok(())
        }

        fn collection(&self) -> &str {
            "memory"
        }

        fn driver(&self) -> VectorDriver {
            VectorDriver::Local
        }
    }

    #[tokio::test]
    async fn test_missing_document_makes_store_stale() {
        let store = MemoryStore::with_sources(&["docs/a.pdf"]);

        let result = CorpusReconciler::default()
            .reconcile(["a.pdf", "b.pdf"], &store)
            .await;

        assert_eq!(
            result,
            Reconciliation::Stale {
                missing: BTreeSet::from(["b.pdf".to_string()])
            }
        );
    }

    #[tokio::test]
    async fn test_subset_is_current() {
        let store = MemoryStore::with_sources(&["docs/a.pdf", "docs/b.pdf"]);

        let result = CorpusReconciler::default().reconcile(["a.pdf"], &store).await;

        assert!(result.is_current());
    }

    #[tokio::test]
    async fn test_listing_failure_degrades_to_current() {
        let store = MemoryStore::failing();

        let result = CorpusReconciler::default()
            .reconcile(["a.pdf", "b.pdf"], &store)
            .await;

        assert_eq!(result, Reconciliation::Current);
    }

    #[tokio::test]
    async fn test_paths_are_compared_by_file_name() {
        let store = MemoryStore::with_sources(&["C:\\papers\\a.pdf", "/srv/docs/b.pdf"]);

        let result = CorpusReconciler::default()
            .reconcile(["docs/a.pdf", "other/b.pdf"], &store)
            .await;

        assert!(result.is_current());
    }

    #[tokio::test]
    async fn test_empty_store_reports_everything_missing() {
        let store = MemoryStore::default();

        let result = CorpusReconciler::default()
            .reconcile(vec!["b.pdf".to_string(), "a.pdf".to_string()], &store)
            .await;

        let Reconciliation::Stale { missing } = result else {
            panic!("expected stale");
        };
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_scan_limit_bounds_listing() {
        let store = MemoryStore::with_sources(&["a.pdf", "b.pdf", "c.pdf"]);

        let result = CorpusReconciler::new(2)
            .reconcile(["a.pdf", "c.pdf"], &store)
            .await;

        assert_eq!(*store.list_limits.lock().unwrap(), vec![2]);
        assert_eq!(
            result,
            Reconciliation::Stale {
                missing: BTreeSet::from(["c.pdf".to_string()])
            }
        );
    }
}
