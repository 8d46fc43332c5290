//! # Note Harness CLI (`nh`)
//!
//! ## Usage
//!
//! ```bash
//! nh --config ./config/nh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nh related "<content>"` | List notes related to some content |
//! | `nh create "<content>"` | Structure, link, and write a new note |
//! | `nh daily "<content>"` | Append to the daily note |
//! | `nh search "<query>"` | Search notes |
//! | `nh get <title>` | Print a note |
//! | `nh list` | List notes |
//! | `nh tools list` | List tools with schemas |
//! | `nh tools call <name>` | Call a tool with `--param key=value` pairs |
//! | `nh serve` | Start the JSON HTTP server |
//!
//! Results are printed as JSON on stdout; logs go to stderr and are
//! filtered with `RUST_LOG` (default `info`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use note_harness::config;
use note_harness::notes;
use note_harness::related::RelatedNoteFinder;
use note_harness::search;
use note_harness::server;
use note_harness::structure::create_structurer;
use note_harness::traits::{ToolContext, ToolRegistry};
use note_harness::vault::Vault;

/// Note Harness CLI: create, link, and search notes in a markdown vault.
#[derive(Parser)]
#[command(name = "nh", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List notes whose text contains the given content.
    Related {
        content: String,

        /// Title never reported as related (the note being written).
        #[arg(long, default_value = "")]
        exclude: String,

        /// Override `related.match_cap`.
        #[arg(long)]
        cap: Option<usize>,
    },

    /// Structure content, link related notes, and write a new note.
    Create {
        content: String,

        /// Note title; derived from the content when omitted.
        #[arg(long)]
        title: Option<String>,

        /// Replace an existing note with the same title.
        #[arg(long)]
        overwrite: bool,
    },

    /// Append content to the daily note, creating it if needed.
    Daily {
        content: String,

        /// Day to update (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },

    /// Search notes.
    Search {
        query: String,

        /// `keyword` (token overlap) or `semantic` (embeddings).
        #[arg(long, default_value = "keyword")]
        mode: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print a note by title.
    Get { title: String },

    /// List notes in the vault.
    List,

    /// Inspect and call tools.
    Tools {
        #[command(subcommand)]
        action: ToolAction,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ToolAction {
    /// List all tools with their parameter schemas.
    List,
    /// Call a tool the same way the HTTP API does.
    Call {
        name: String,
        /// Tool parameters as `key=value` pairs. Values that parse as JSON
        /// (numbers, booleans) are passed as such.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Related {
            content,
            exclude,
            cap,
        } => {
            let mut finder = RelatedNoteFinder::from_config(&cfg)?;
            if let Some(cap) = cap {
                finder = finder.with_cap(cap);
            }
            let related = finder.find_related(&content, &exclude).await?;
            print_json(&serde_json::json!({ "related": related }))?;
        }
        Commands::Create {
            content,
            title,
            overwrite,
        } => {
            let structurer = create_structurer(&cfg.structuring)?;
            let created = notes::create_note(
                &cfg,
                structurer.as_ref(),
                &content,
                title.as_deref(),
                overwrite,
            )
            .await?;
            print_json(&created)?;
        }
        Commands::Daily { content, date } => {
            let date = date
                .map(|d| {
                    chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                        .with_context(|| format!("invalid date: {}", d))
                })
                .transpose()?;
            let structurer = create_structurer(&cfg.structuring)?;
            let updated =
                notes::update_daily_note(&cfg, structurer.as_ref(), &content, date).await?;
            print_json(&updated)?;
        }
        Commands::Search { query, mode, limit } => {
            let hits = search::search_notes(&cfg, &query, &mode, limit).await?;
            print_json(&serde_json::json!({ "results": hits }))?;
        }
        Commands::Get { title } => {
            let note = Vault::from_config(&cfg).read_note(&title).await?;
            print_json(&note)?;
        }
        Commands::List => {
            let notes = Vault::from_config(&cfg).list_notes().await?;
            print_json(&serde_json::json!({ "notes": notes }))?;
        }
        Commands::Tools { action } => {
            let registry = ToolRegistry::with_builtins();
            match action {
                ToolAction::List => {
                    print_json(&serde_json::json!({ "tools": registry.infos() }))?;
                }
                ToolAction::Call { name, params } => {
                    let params: serde_json::Map<String, serde_json::Value> = params
                        .into_iter()
                        .map(|(k, v)| {
                            let value = match serde_json::from_str::<serde_json::Value>(&v) {
                                Ok(parsed) if !parsed.is_string() && !parsed.is_object() => parsed,
                                _ => serde_json::Value::String(v),
                            };
                            (k, value)
                        })
                        .collect();
                    let ctx = ToolContext::new(Arc::new(cfg));
                    let result = registry
                        .call(&name, serde_json::Value::Object(params), &ctx)
                        .await?;
                    print_json(&result)?;
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
