use std::collections::BTreeMap;

use anyhow::Result;
use clap::Parser;
use tokio::signal;

use docchat::cli::commands::{handle_ask, handle_chat, handle_config, handle_index, handle_status};
use docchat::cli::{Cli, Commands};
use docchat::logging;
use docchat::models::{Config, OutputFormat, ResolvedConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let resolved = match Config::load() {
        Ok(resolved) => resolved,
        Err(e) if cli.command.tolerates_broken_config() => {
            eprintln!("Warning: {e}; showing defaults");
            ResolvedConfig {
                config: Config::default(),
                sources: BTreeMap::new(),
                project_path: None,
                global_path: None,
            }
        }
        Err(e) => return Err(e.into()),
    };

    logging::init(&resolved.config.logging, cli.verbose);

    let format = cli.format.unwrap_or(resolved.config.output.default_format);
    let verbose = cli.verbose;

    tokio::select! {
        result = run_command(cli.command, &resolved, format, verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, exiting...");
        }
    }

    Ok(())
}

async fn run_command(
    command: Commands,
    resolved: &ResolvedConfig,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    match command {
        Commands::Status => handle_status(resolved, format, verbose).await,
        Commands::Index(args) => handle_index(args, resolved, format, verbose).await,
        Commands::Ask(args) => handle_ask(args, resolved, format, verbose).await,
        Commands::Chat => handle_chat(resolved, format, verbose).await,
        Commands::Config(cmd) => handle_config(cmd, resolved, format, verbose).await,
    }
}

/// Resolves on Ctrl+C or SIGTERM. If a handler cannot be installed that
/// signal is never reported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
