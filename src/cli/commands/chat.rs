//! Interactive chat over the indexed documents.

use std::io::{BufRead, Write as _};
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::ProgressBar;
use tokio::sync::mpsc;

use super::index::prepare_corpus;
use super::{build_embedder, build_engine, open_store};
use crate::cli::output::{Formatter, get_formatter};
use crate::models::{OutputFormat, ResolvedConfig, Role};
use crate::services::{ChatSession, TurnOutcome};

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Clear,
    History,
    Help,
    Question(&'a str),
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/quit" | "/exit" | "/q" => Input::Quit,
        "/clear" => Input::Clear,
        "/history" => Input::History,
        "/help" | "/?" => Input::Help,
        question => Input::Question(question),
    }
}

pub async fn handle_chat(resolved: &ResolvedConfig, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = &resolved.config;
    let formatter = get_formatter(format);

    let outcome = prepare_corpus(config, &config.indexing.docs_dir, false, verbose).await?;
    eprint!("{}", get_formatter(OutputFormat::Text).format_prepare(&outcome));

    let embedder = build_embedder(config)?;
    let store = open_store(config).await?;
    let engine = build_engine(config, embedder, store)?;
    let mut session = ChatSession::new(engine);

    println!(
        "{} {}",
        style("docchat").cyan().bold(),
        style(format!("({})", session.engine().model())).dim()
    );
    println!(
        "{}",
        style("Ask about your documents. /help lists commands, /quit exits.").dim()
    );

    let mut lines = spawn_line_reader();

    loop {
        print!("\n{} ", style("you>").green().bold());
        std::io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.recv().await else {
            println!();
            break;
        };
        let line = line.context("failed to read input")?;

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Clear => {
                session.clear();
                println!("{}", style("History cleared.").dim());
            }
            Input::History => print_history(&session),
            Input::Help => print_help(),
            Input::Question(question) => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_message("Thinking...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                let outcome = session.ask(question).await;
                spinner.finish_and_clear();

                print_outcome(&outcome, formatter.as_ref(), verbose);
            }
        }
    }

    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_outcome(outcome: &TurnOutcome, formatter: &dyn Formatter, verbose: bool) {
    match outcome {
        TurnOutcome::Ignored => {}
        TurnOutcome::Answered(turn) => {
            println!("{}", style("docchat>").cyan().bold());
            print!("{}", formatter.format_answer(turn));
            if verbose {
                eprintln!(
                    "{}",
                    style(format!(
                        "{} chunk(s) retrieved, {}ms",
                        turn.context.len(),
                        turn.duration_ms
                    ))
                    .dim()
                );
            }
        }
        TurnOutcome::Failed(e) => {
            println!("{}", style("docchat>").red().bold());
            println!("{}", style(e.user_message()).yellow());
            if verbose {
                eprintln!("{}", style(format!("[{:?}] {}", e.kind(), e)).dim());
            }
        }
    }
}

fn print_history(session: &ChatSession) {
    if session.history().is_empty() {
        println!("{}", style("No messages yet.").dim());
        return;
    }
    for message in session.history() {
        let label = match message.role {
            Role::Human => style("you").green(),
            Role::Ai => style("docchat").cyan(),
        };
        println!("{}: {}", label, message.content);
    }
}

fn print_help() {
    println!("  /clear    forget the conversation so far");
    println!("  /history  show the conversation so far");
    println!("  /quit     leave the chat");
}
