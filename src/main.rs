mod commands;
mod generator;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use commands::Context;

#[derive(Parser)]
#[command(name = "calplan")]
#[command(about = "Generate a weekly plan, turn it into ICS and sync it with Google Calendar")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, default_value = "config/settings.toml")]
    settings: PathBuf,

    /// Prompt template used by generate-json
    #[arg(long, global = true, default_value = "prompts/prompt_es.txt")]
    prompt: PathBuf,

    /// Schedule JSON path (overrides the configured output directory)
    #[arg(long, global = true)]
    json_out: Option<PathBuf>,

    /// ICS path (overrides the configured output directory)
    #[arg(long, global = true)]
    ics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the model for this week's plan and save it as JSON
    GenerateJson,
    /// Convert the saved plan JSON into an ICS file
    JsonToIcs,
    /// Import the ICS file into the routed Google calendars
    ImportIcs {
        /// Keep importing after an event fails for good
        #[arg(long)]
        continue_on_error: bool,
    },
    /// generate-json, json-to-ics and import-ics in one go
    Plan {
        /// Keep importing after an event fails for good
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Delete (or preview deleting) events from the configured calendars
    Purge {
        /// Only events starting at or after this date/time (UTC), e.g. 2025-11-04
        #[arg(long)]
        since: String,

        /// Only events whose title starts with this prefix (repeatable)
        #[arg(long = "prefix")]
        prefixes: Vec<String>,

        /// Actually delete instead of previewing
        #[arg(long)]
        no_dry_run: bool,
    },
    /// Run the Google consent flow and cache the token
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Interrupted, finishing the current call...".yellow());
            on_ctrl_c.cancel();
        }
    });

    let ctx = Context::load(&cli.settings, cli.prompt, cli.json_out, cli.ics_out, cancel)?;

    match cli.command {
        Commands::GenerateJson => commands::generate::run(&ctx).await,
        Commands::JsonToIcs => commands::convert::run(&ctx),
        Commands::ImportIcs { continue_on_error } => {
            commands::import::run(&ctx, continue_on_error).await
        }
        Commands::Plan { continue_on_error } => commands::plan::run(&ctx, continue_on_error).await,
        Commands::Purge {
            since,
            prefixes,
            no_dry_run,
        } => commands::purge::run(&ctx, &since, prefixes, !no_dry_run).await,
        Commands::Auth => commands::auth::run(&ctx).await,
    }
}
