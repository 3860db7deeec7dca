use anyhow::Result;
use clap::Args;
use indicatif::ProgressBar;
use std::time::Duration;

use super::index::prepare_corpus;
use super::{build_embedder, build_engine, open_store};
use crate::cli::output::get_formatter;
use crate::models::{OutputFormat, ResolvedConfig};

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question to answer from the indexed documents")]
    pub question: String,

    #[arg(long, short = 'k', help = "Number of chunks to retrieve as context")]
    pub top_k: Option<u32>,

    #[arg(long, help = "Answer from the existing store without checking the documents")]
    pub no_prepare: bool,
}

pub async fn handle_ask(
    args: AskArgs,
    resolved: &ResolvedConfig,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let mut config = resolved.config.clone();
    if let Some(top_k) = args.top_k {
        if top_k == 0 {
            anyhow::bail!("top-k must be at least 1");
        }
        config.chat.top_k = top_k;
    }
    let formatter = get_formatter(format);

    if !args.no_prepare {
        let outcome = prepare_corpus(&config, &config.indexing.docs_dir, false, verbose).await?;
        if verbose {
            eprint!("{}", get_formatter(OutputFormat::Text).format_prepare(&outcome));
        }
    }

    let embedder = build_embedder(&config)?;
    let store = open_store(&config).await?;
    let engine = build_engine(&config, embedder, store)?;

    if verbose {
        eprintln!("Question: \"{question}\"");
        eprintln!("  Model: {}", engine.model());
        eprintln!("  Top-k: {}", config.chat.top_k);
        eprintln!("  Timeout: {}s", engine.timeout().as_secs());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = engine.respond(question, &[]).await;
    spinner.finish_and_clear();

    let turn = match result {
        Ok(turn) => turn,
        Err(e) => {
            let message = e.user_message();
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    print!("{}", formatter.format_answer(&turn));
    if verbose {
        eprintln!("Answered in {}ms", turn.duration_ms);
    }

    Ok(())
}
