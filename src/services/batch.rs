//! Quota-aware batch embedding.
//!
//! Texts are embedded in groups of at most `batch_size` so a corpus costs one
//! request per group instead of one per chunk. When a group request fails the
//! group is retried one text at a time; a text that still fails gets an empty
//! placeholder vector. The output therefore always lines up with the input,
//! and callers must treat an empty vector as "not embedded".

use std::sync::Arc;

use tracing::{debug, warn};

use super::embedding::{EmbeddingProvider, TaskType};
use crate::error::EmbeddingError;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Clone)]
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl BatchEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn with_default_batch_size(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(provider, DEFAULT_BATCH_SIZE)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Embed documents for indexing. Never fails; see the module docs.
    pub async fn embed_many(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_index, group) in texts.chunks(self.batch_size).enumerate() {
            match self.embed_group(group).await {
                Ok(embeddings) => vectors.extend(embeddings),
                Err(e) => {
                    warn!(
                        batch = batch_index,
                        size = group.len(),
                        error = %e,
                        "batch embedding failed, falling back to individual requests"
                    );
                    for text in group {
                        vectors.push(self.embed_individually(text).await);
                    }
                }
            }
        }

        debug!(
            texts = texts.len(),
            failed = vectors.iter().filter(|v| v.is_empty()).count(),
            "embedded documents"
        );

        vectors
    }

    /// Embed a search query. Errors are returned to the caller unchanged.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self.provider.embed(text, TaskType::RetrievalQuery).await?;
        if vector.is_empty() {
            return Err(EmbeddingError::MalformedResponse(
                "empty query embedding".to_string(),
            ));
        }
        Ok(vector)
    }

    async fn embed_group(&self, group: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let embeddings = self
            .provider
            .embed_batch(group, TaskType::RetrievalDocument)
            .await?;

        if embeddings.len() != group.len() {
            return Err(EmbeddingError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                group.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    async fn embed_individually(&self, text: &str) -> Vec<f32> {
        match self.provider.embed(text, TaskType::RetrievalDocument).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "failed to embed individual text");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for BatchEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEmbedder")
            .field("model", &self.provider.model())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Batch { size: usize, task_type: TaskType },
        Single { text: String, task_type: TaskType },
    }

    /// Provider whose vectors encode the text, with scripted failures.
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        pub calls: Mutex<Vec<Call>>,
        pub fail_batches: bool,
        /// Return this many extra (positive) or missing (negative) vectors per batch.
        pub batch_count_skew: isize,
        pub fail_single: HashSet<String>,
    }

    impl ScriptedProvider {
        pub fn vector_for(text: &str) -> Vec<f32> {
            vec![text.len() as f32, 1.0]
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn batch_sizes(&self) -> Vec<usize> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Batch { size, .. } => Some(size),
                    Call::Single { .. } => None,
                })
                .collect()
        }

        pub fn single_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Single { .. }))
                .count()
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        async fn embed_batch(
            &self,
            texts: &[String],
            task_type: TaskType,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.lock().unwrap().push(Call::Batch {
                size: texts.len(),
                task_type,
            });
            if self.fail_batches {
                return Err(EmbeddingError::Transport("connection reset".to_string()));
            }
            let mut vectors: Vec<Vec<f32>> =
                texts.iter().map(|t| Self::vector_for(t)).collect();
            if self.batch_count_skew > 0 {
                for _ in 0..self.batch_count_skew {
                    vectors.push(vec![0.0, 0.0]);
                }
            } else {
                let keep = vectors.len().saturating_sub(self.batch_count_skew.unsigned_abs());
                vectors.truncate(keep);
            }
            Ok(vectors)
        }

        async fn embed(
            &self,
            text: &str,
            task_type: TaskType,
        ) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.lock().unwrap().push(Call::Single {
                text: text.to_string(),
                task_type,
            });
            if self.fail_single.contains(text) {
                return Err(EmbeddingError::QuotaExceeded("429".to_string()));
            }
            Ok(Self::vector_for(text))
        }

        fn model(&self) -> &str {
            "models/scripted"
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk-{i:04}{}", "x".repeat(i % 7))).collect()
    }

    fn embedder(provider: &Arc<ScriptedProvider>, batch_size: usize) -> BatchEmbedder {
        BatchEmbedder::new(provider.clone(), batch_size)
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let provider = Arc::new(ScriptedProvider::default());
        let vectors = embedder(&provider, 100).embed_many(&[]).await;
        assert!(vectors.is_empty());
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_groups_cover_input_in_order() {
        let provider = Arc::new(ScriptedProvider::default());
        let input = texts(250);

        let vectors = embedder(&provider, 100).embed_many(&input).await;

        assert_eq!(provider.batch_sizes(), vec![100, 100, 50]);
        assert_eq!(provider.single_count(), 0);
        assert_eq!(vectors.len(), 250);
        for (text, vector) in input.iter().zip(&vectors) {
            assert_eq!(vector, &ScriptedProvider::vector_for(text));
        }
    }

    #[tokio::test]
    async fn test_length_preserved_for_various_batch_sizes() {
        for (n, batch_size) in [(1, 1), (7, 3), (10, 10), (11, 10), (99, 100), (5, 0)] {
            let provider = Arc::new(ScriptedProvider::default());
            let vectors = embedder(&provider, batch_size).embed_many(&texts(n)).await;
            assert_eq!(vectors.len(), n, "n={n} batch_size={batch_size}");
            let expected_batches = n.div_ceil(batch_size.max(1));
            assert_eq!(provider.batch_sizes().len(), expected_batches);
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_falls_back_per_item() {
        for skew in [1, -1] {
            let provider = Arc::new(ScriptedProvider {
                batch_count_skew: skew,
                ..Default::default()
            });
            let input = texts(4);

            let vectors = embedder(&provider, 100).embed_many(&input).await;

            assert_eq!(provider.batch_sizes(), vec![4]);
            assert_eq!(provider.single_count(), 4);
            assert_eq!(vectors.len(), 4);
            for (text, vector) in input.iter().zip(&vectors) {
                assert_eq!(vector, &ScriptedProvider::vector_for(text));
            }
        }
    }

    #[tokio::test]
    async fn test_individual_failure_leaves_placeholder() {
        let input = texts(5);
        let provider = Arc::new(ScriptedProvider {
            fail_batches: true,
            fail_single: HashSet::from([input[2].clone()]),
            ..Default::default()
        });

        let vectors = embedder(&provider, 100).embed_many(&input).await;

        assert_eq!(vectors.len(), 5);
        assert!(vectors[2].is_empty());
        for i in [0, 1, 3, 4] {
            assert_eq!(vectors[i], ScriptedProvider::vector_for(&input[i]));
        }
    }

    #[tokio::test]
    async fn test_all_failures_still_return_full_length() {
        let input = texts(7);
        let provider = Arc::new(ScriptedProvider {
            fail_batches: true,
            fail_single: input.iter().cloned().collect(),
            ..Default::default()
        });

        let vectors = embedder(&provider, 3).embed_many(&input).await;

        assert_eq!(vectors.len(), 7);
        assert!(vectors.iter().all(Vec::is_empty));
        assert_eq!(provider.batch_sizes(), vec![3, 3, 1]);
        assert_eq!(provider.single_count(), 7);
    }

    #[tokio::test]
    async fn test_fallback_keeps_input_order() {
        let provider = Arc::new(ScriptedProvider {
            fail_batches: true,
            ..Default::default()
        });
        let input = texts(3);

        let vectors = embedder(&provider, 2).embed_many(&input).await;

        let singles: Vec<String> = provider
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Single { text, .. } => Some(text),
                Call::Batch { .. } => None,
            })
            .collect();
        assert_eq!(singles, input);
        assert_eq!(vectors.len(), 3);
    }

    #[tokio::test]
    async fn test_task_types_differ_between_documents_and_queries() {
        let provider = Arc::new(ScriptedProvider {
            fail_batches: true,
            ..Default::default()
        });
        let embedder = embedder(&provider, 10);

        embedder.embed_many(&texts(1)).await;
        embedder.embed_one("where is the warranty?").await.unwrap();

        let calls = provider.calls();
        assert_eq!(
            calls[0],
            Call::Batch {
                size: 1,
                task_type: TaskType::RetrievalDocument
            }
        );
        assert!(matches!(
            &calls[1],
            Call::Single {
                task_type: TaskType::RetrievalDocument,
                ..
            }
        ));
        assert_eq!(
            calls[2],
            Call::Single {
                text: "where is the warranty?".to_string(),
                task_type: TaskType::RetrievalQuery
            }
        );
    }

    #[tokio::test]
    async fn test_query_errors_propagate() {
        let provider = Arc::new(ScriptedProvider {
            fail_single: HashSet::from(["question".to_string()]),
            ..Default::default()
        });

        let err = embedder(&provider, 10).embed_one("question").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::QuotaExceeded(_)));
        assert_eq!(provider.calls().len(), 1);
    }
}
