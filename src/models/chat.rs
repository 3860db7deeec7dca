//! Conversation models.

use serde::{Deserialize, Serialize};

use super::search::RetrievedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// A document cited by an answer, with the pages that were used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub pages: Vec<u32>,
}

/// The result of one question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    /// Records retrieved as context, in retrieval order.
    pub context: Vec<RetrievedRecord>,
    pub duration_ms: u64,
}

impl ChatTurn {
    /// Group the retrieved records by source document.
    ///
    /// Sources keep their first-seen order; pages are sorted and de-duplicated.
    pub fn citations(&self) -> Vec<Citation> {
        let mut citations: Vec<Citation> = Vec::new();
        for record in &self.context {
            let source = &record.metadata.source;
            match citations.iter_mut().find(|c| &c.source == source) {
                Some(citation) => citation.pages.push(record.metadata.page),
                None => citations.push(Citation {
                    source: source.clone(),
                    pages: vec![record.metadata.page],
                }),
            }
        }
        for citation in &mut citations {
            citation.pages.sort_unstable();
            citation.pages.dedup();
        }
        citations
    }
}
