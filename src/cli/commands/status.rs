use anyhow::Result;

use super::open_store;
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{OutputFormat, ResolvedConfig, VectorDriver};
use crate::services::{CorpusReconciler, Reconciliation};
use crate::sources::scan_documents;

pub async fn handle_status(
    resolved: &ResolvedConfig,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = &resolved.config;
    let formatter = get_formatter(format);

    let documents = match scan_documents(&config.indexing.docs_dir, &config.indexing.exclude_patterns)
    {
        Ok(documents) => documents,
        Err(e) => {
            if verbose {
                eprintln!("Could not scan documents: {e}");
            }
            Vec::new()
        }
    };

    let (vector_store_connected, vector_store_points, missing_documents) =
        if let Ok(store) = open_store(config).await {
            let connected = store.health_check().await.unwrap_or(false);
            let points = if connected {
                store
                    .get_collection_info()
                    .await
                    .ok()
                    .flatten()
                    .map_or(0, |info| info.points_count)
            } else {
                0
            };

            let missing = if connected && !documents.is_empty() {
                let reconciler = CorpusReconciler::new(config.vector_store.scan_limit as usize);
                let names = documents.iter().map(|p| p.to_string_lossy());
                match reconciler.reconcile(names, store.as_ref()).await {
                    Reconciliation::Current => Some(Vec::new()),
                    Reconciliation::Stale { missing } => Some(missing.into_iter().collect()),
                }
            } else {
                None
            };
            (connected, points, missing)
        } else {
            (false, 0, None)
        };

    let vector_store_location = match config.vector_store.driver {
        VectorDriver::Local => config.vector_store.path.display().to_string(),
        VectorDriver::Qdrant => config.vector_store.url.clone(),
    };

    let status = StatusInfo {
        api_key_configured: config.require_api_key().is_ok(),
        embedding_model: config.embedding.model.clone(),
        chat_model: config.chat.model.clone(),
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_location,
        vector_store_connected,
        vector_store_points,
        collection: config.vector_store.collection.clone(),
        docs_dir: config.indexing.docs_dir.display().to_string(),
        documents_found: documents.len(),
        missing_documents,
    };

    print!("{}", formatter.format_status(&status));

    if !status.api_key_configured || !vector_store_connected || documents.is_empty() {
        eprintln!();
        if !status.api_key_configured {
            eprintln!("Hint: set GOOGLE_API_KEY in the environment or in a .env file.");
        }
        if !vector_store_connected && config.vector_store.driver == VectorDriver::Qdrant {
            eprintln!("Warning: Qdrant not running. Start with: docker-compose up -d qdrant");
        }
        if documents.is_empty() {
            eprintln!(
                "Hint: no PDFs found in {}. Add documents or set indexing.docs_dir.",
                status.docs_dir
            );
        }
    } else if status
        .missing_documents
        .as_ref()
        .is_some_and(|missing| !missing.is_empty())
    {
        eprintln!();
        eprintln!("Hint: run `docchat index` to bring the vector store up to date.");
    }

    Ok(())
}
