//! Command-line interface for docchat.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Chat with your PDF documents using retrieval-augmented generation.
#[derive(Debug, Parser)]
#[command(name = "docchat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check provider credentials, vector store and document coverage
    Status,

    /// Index the documents directory into the vector store
    Index(commands::IndexArgs),

    /// Answer a single question from the indexed documents
    Ask(commands::AskArgs),

    /// Start an interactive chat session
    Chat,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

impl Commands {
    /// Whether the command can run with an unreadable configuration.
    pub fn tolerates_broken_config(&self) -> bool {
        matches!(self, Commands::Config(_))
    }
}
