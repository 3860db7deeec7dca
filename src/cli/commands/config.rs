use anyhow::{Context, Result};
use clap::Subcommand;
use std::fmt::Write as FmtWrite;
use std::path::PathBuf;
use std::process::Command;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, ConfigSource, ENV_OVERRIDES, OutputFormat, ResolvedConfig};

const SECRET_MASK: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create global config instead of project config"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show {
        #[arg(long, help = "Show source of each configuration value")]
        source: bool,
    },
    #[command(about = "Show configuration file paths")]
    Path {
        #[arg(long, help = "Show all possible config paths")]
        all: bool,
    },
    #[command(about = "Edit configuration file")]
    Edit {
        #[arg(
            long,
            short = 'g',
            help = "Edit global config instead of project config"
        )]
        global: bool,
    },
}

pub async fn handle_config(
    cmd: ConfigCommand,
    resolved: &ResolvedConfig,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show { source } => handle_show(resolved, source, format),
        ConfigCommand::Path { all } => handle_path(all),
        ConfigCommand::Edit { global } => handle_edit(global, formatter.as_ref()),
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let (scope, target) = if global {
        ("global", Config::global_path())
    } else {
        (
            "project",
            Config::project_config_dir().map(|dir| dir.join("config.toml")),
        )
    };
    let target = target.ok_or_else(|| anyhow::anyhow!("could not determine {scope} config path"))?;

    if target.exists() && !force {
        anyhow::bail!(
            "{scope} config already exists at: {}\nUse --force to overwrite.",
            target.display()
        );
    }

    let path = if global {
        Config::init_global()
    } else {
        Config::init_project()
    }
    .with_context(|| format!("failed to create {scope} config"))?;

    println!(
        "{}",
        formatter.format_message(&format!("Created {scope} config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(resolved: &ResolvedConfig, show_source: bool, format: OutputFormat) -> Result<()> {
    let table = masked_table(&resolved.config)?;

    if format == OutputFormat::Json {
        if show_source {
            let output = serde_json::json!({
                "config": table,
                "sources": resolved.sources,
                "project_path": resolved.project_path,
                "global_path": resolved.global_path,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        return Ok(());
    }

    if let Some(ref path) = resolved.project_path {
        println!("# Project config: {}", path.display());
    }
    if let Some(ref path) = resolved.global_path {
        println!("# Global config: {}", path.display());
    }
    println!();

    print!("{}", render_resolved_config(resolved, &table, show_source));

    Ok(())
}

/// The configuration as a TOML table with credentials replaced by a mask.
fn masked_table(config: &Config) -> Result<toml::Table> {
    let mut shown = config.clone();
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some(SECRET_MASK.to_string());
        }
    };
    mask(&mut shown.api.key);
    mask(&mut shown.vector_store.api_key);

    match toml::Value::try_from(&shown).context("failed to serialize configuration")? {
        toml::Value::Table(table) => Ok(table),
        _ => anyhow::bail!("configuration did not serialize to a table"),
    }
}

fn render_resolved_config(resolved: &ResolvedConfig, table: &toml::Table, show_source: bool) -> String {
    let mut output = String::new();

    for (section, value) in table {
        let toml::Value::Table(entries) = value else {
            continue;
        };
        writeln!(output, "[{section}]").unwrap();
        for (key, value) in entries {
            let full_key = format!("{section}.{key}");
            if show_source {
                let source = resolved.source_of(&full_key);
                writeln!(output, "{key} = {value}  # {}", format_source(&source)).unwrap();
            } else {
                writeln!(output, "{key} = {value}").unwrap();
            }
        }
        writeln!(output).unwrap();
    }

    output
}

fn format_source(source: &ConfigSource) -> &'static str {
    match source {
        ConfigSource::Default => "default",
        ConfigSource::Global => "global",
        ConfigSource::Project => "project",
        ConfigSource::Env => "env",
    }
}

fn handle_path(show_all: bool) -> Result<()> {
    let describe = |label: &str, path: Option<PathBuf>| {
        let Some(path) = path else {
            return;
        };
        if path.exists() {
            println!("{label} (active): {}", path.display());
        } else if show_all {
            println!("{label} (would be): {}", path.display());
        }
    };

    println!("Configuration paths:");
    println!();
    describe(
        "Project config",
        Config::find_project_config()
            .or_else(|| Config::project_config_dir().map(|dir| dir.join("config.toml"))),
    );
    describe("Global config", Config::global_path());
    describe(
        ".env file",
        std::env::current_dir().ok().map(|cwd| cwd.join(".env")),
    );

    if show_all {
        println!();
        println!("Environment overrides:");
        for (var, key) in ENV_OVERRIDES {
            let state = if std::env::var_os(var).is_some() {
                "set"
            } else {
                "unset"
            };
            println!("  {var:<24} -> {key} ({state})");
        }
    }

    Ok(())
}

fn handle_edit(global: bool, formatter: &dyn Formatter) -> Result<()> {
    let existing = if global {
        Config::global_path().filter(|path| path.exists())
    } else {
        Config::find_project_config()
    };

    let config_path = match existing {
        Some(path) => path,
        None => {
            let path = if global {
                Config::init_global()
            } else {
                Config::init_project()
            }
            .context("failed to create config file")?;
            println!(
                "{}",
                formatter.format_message(&format!("Created config at: {}", path.display()))
            );
            path
        }
    };

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| "vi".to_string());

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .with_context(|| format!("failed to open editor: {editor}"))?;
    if !status.success() {
        anyhow::bail!("{editor} exited with {status}");
    }

    Ok(())
}
