use serde::{Deserialize, Serialize};

/// Text extracted from one page of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// Path of the originating document, as it was loaded (e.g. `docs/report.pdf`)
    pub source: String,
    /// 1-based page number
    pub page: u32,
    pub text: String,
}

/// Metadata carried by every indexed record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
}

impl ChunkMetadata {
    /// The document identifier this record belongs to.
    pub fn document_id(&self) -> Option<String> {
        document_id_from_source(&self.source)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: u32,
    pub metadata: ChunkMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dense_vector: Vec<f32>,
    pub created_at: String,
}

impl DocumentChunk {
    pub fn generate_id(document_id: &str, page: u32, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}:{}", document_id, page, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn from_page(page: &PageText, content: String, chunk_index: u32) -> Self {
        let document_id = document_id_from_source(&page.source).unwrap_or_default();
        let id = Self::generate_id(&document_id, page.page, chunk_index);
        Self {
            id,
            document_id,
            content,
            chunk_index,
            metadata: ChunkMetadata {
                source: page.source.clone(),
                page: page.page,
            },
            dense_vector: Vec::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Extract a document identifier (the file name) from a path-like source string.
///
/// Both `/` and `\` are treated as separators so stores written on either
/// platform compare equal.
pub fn document_id_from_source(source: &str) -> Option<String> {
    source
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
}
