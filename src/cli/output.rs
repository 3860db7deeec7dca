use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{ChatTurn, OutputFormat};
use crate::services::PrepareOutcome;

pub trait Formatter {
    fn format_answer(&self, turn: &ChatTurn) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_prepare(&self, outcome: &PrepareOutcome) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub api_key_configured: bool,
    pub embedding_model: String,
    pub chat_model: String,
    pub vector_store_driver: String,
    /// Server URL or directory, depending on the driver
    pub vector_store_location: String,
    pub vector_store_connected: bool,
    pub vector_store_points: u64,
    pub collection: String,
    pub docs_dir: String,
    pub documents_found: usize,
    /// Documents in `docs_dir` with no indexed records; None when unknown.
    pub missing_documents: Option<Vec<String>>,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, turn: &ChatTurn) -> String {
        let mut output = String::new();
        writeln!(output, "{}", turn.answer.trim_end()).unwrap();

        let citations = turn.citations();
        if !citations.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "Sources").unwrap();
            writeln!(output, "-------").unwrap();
            for citation in citations {
                let pages: Vec<String> = citation.pages.iter().map(ToString::to_string).collect();
                writeln!(output, "  {} (pages {})", citation.source, pages.join(", ")).unwrap();
            }
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let key_status = if status.api_key_configured {
            "[CONFIGURED]"
        } else {
            "[MISSING]"
        };
        writeln!(output, "API Key:       {}", key_status).unwrap();
        writeln!(output, "  Embedding:   {}", status.embedding_model).unwrap();
        writeln!(output, "  Chat:        {}", status.chat_model).unwrap();
        writeln!(output).unwrap();

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store:  {} ({})",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "  Location:    {}", status.vector_store_location).unwrap();
        if status.vector_store_connected {
            writeln!(output, "  Collection:  {}", status.collection).unwrap();
            writeln!(output, "  Points:      {}", status.vector_store_points).unwrap();
        }
        writeln!(output).unwrap();

        writeln!(output, "Documents:     {}", status.docs_dir).unwrap();
        writeln!(output, "  Found:       {}", status.documents_found).unwrap();
        match &status.missing_documents {
            Some(missing) if missing.is_empty() => {
                writeln!(output, "  Index:       [CURRENT]").unwrap();
            }
            Some(missing) => {
                writeln!(output, "  Index:       [STALE] {} not indexed", missing.len()).unwrap();
                for name in missing {
                    writeln!(output, "    - {}", name).unwrap();
                }
            }
            None => {}
        }

        output
    }

    fn format_prepare(&self, outcome: &PrepareOutcome) -> String {
        let mut output = String::new();
        match outcome {
            PrepareOutcome::Reused { documents } => {
                writeln!(
                    output,
                    "Vector store is up to date ({} document(s)); nothing to do.",
                    documents
                )
                .unwrap();
            }
            PrepareOutcome::Rebuilt(stats) => {
                writeln!(output, "Indexing Complete").unwrap();
                writeln!(output, "-----------------").unwrap();
                writeln!(output, "Documents: {}", stats.documents).unwrap();
                writeln!(output, "Pages:     {}", stats.pages).unwrap();
                writeln!(output, "Chunks:    {}", stats.chunks).unwrap();
                writeln!(output, "Embedded:  {}", stats.embedded).unwrap();
                if stats.failed > 0 {
                    writeln!(output, "Failed:    {}", stats.failed).unwrap();
                }
                writeln!(output, "Duration:  {}ms", stats.duration_ms).unwrap();
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, turn: &ChatTurn) -> String {
        let json = serde_json::json!({
            "question": turn.question,
            "answer": turn.answer,
            "sources": turn.citations(),
            "context": turn.context,
            "duration_ms": turn.duration_ms,
        });
        self.render(&json)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_prepare(&self, outcome: &PrepareOutcome) -> String {
        self.render(outcome)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_answer(&self, turn: &ChatTurn) -> String {
        let mut output = String::new();
        writeln!(output, "{}\n", turn.answer.trim_end()).unwrap();

        let citations = turn.citations();
        if !citations.is_empty() {
            writeln!(output, "### Sources\n").unwrap();
            for citation in citations {
                let pages: Vec<String> = citation.pages.iter().map(ToString::to_string).collect();
                writeln!(
                    output,
                    "- **{}** (pages {})",
                    citation.source,
                    pages.join(", ")
                )
                .unwrap();
            }
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let key_status = if status.api_key_configured { "✅" } else { "❌" };
        writeln!(output, "### Provider {}\n", key_status).unwrap();
        writeln!(output, "- **Embedding:** {}", status.embedding_model).unwrap();
        writeln!(output, "- **Chat:** {}", status.chat_model).unwrap();
        writeln!(output).unwrap();

        let vector_status = if status.vector_store_connected {
            "✅"
        } else {
            "❌"
        };
        writeln!(
            output,
            "### Vector Store ({}) {}\n",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "- **Location:** `{}`", status.vector_store_location).unwrap();
        writeln!(output, "- **Collection:** {}", status.collection).unwrap();
        writeln!(output, "- **Points:** {}", status.vector_store_points).unwrap();
        writeln!(output).unwrap();

        writeln!(output, "### Documents\n").unwrap();
        writeln!(output, "- **Directory:** `{}`", status.docs_dir).unwrap();
        writeln!(output, "- **Found:** {}", status.documents_found).unwrap();
        if let Some(missing) = &status.missing_documents {
            if missing.is_empty() {
                writeln!(output, "- **Index:** current").unwrap();
            } else {
                writeln!(output, "- **Not indexed:**").unwrap();
                for name in missing {
                    writeln!(output, "  - `{}`", name).unwrap();
                }
            }
        }

        output
    }

    fn format_prepare(&self, outcome: &PrepareOutcome) -> String {
        let mut output = String::new();
        match outcome {
            PrepareOutcome::Reused { documents } => {
                writeln!(
                    output,
                    "> Vector store is up to date ({} document(s)).",
                    documents
                )
                .unwrap();
            }
            PrepareOutcome::Rebuilt(stats) => {
                writeln!(output, "## Indexing Complete\n").unwrap();
                writeln!(output, "| Metric | Value |").unwrap();
                writeln!(output, "|--------|-------|").unwrap();
                writeln!(output, "| Documents | {} |", stats.documents).unwrap();
                writeln!(output, "| Pages | {} |", stats.pages).unwrap();
                writeln!(output, "| Chunks | {} |", stats.chunks).unwrap();
                writeln!(output, "| Embedded | {} |", stats.embedded).unwrap();
                writeln!(output, "| Failed | {} |", stats.failed).unwrap();
                writeln!(output, "| Duration | {}ms |", stats.duration_ms).unwrap();
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
