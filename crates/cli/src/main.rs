//! `pitchcraft` entry point.
//!
//! This binary is the composition root. It loads `pitchcraft.toml`, wires
//! `tracing-subscriber` (plus an optional OTLP exporter), builds the document
//! store, settings and Anthropic provider, then runs one pipeline against a
//! JSON request file and prints the result JSON to stdout.
//!
//! ```text
//! pitchcraft outline --request outline.json
//! pitchcraft slides  --request slides.json --thread-id <uuid>
//! ```
//!
//! The `slides` command exits non-zero when no slides could be produced.

mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llm::AnthropicProvider;
use nodes::{run_outline_pipeline, run_slide_pipeline, Collaborators, LlmGateway, RunConfig};
use pipeline::{OutlineRequest, SlideRequest, ThreadId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use store::InMemoryDocumentStore;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::CliConfig;

#[derive(Debug, Parser)]
#[command(name = "pitchcraft", version, about = "Generate pitch outlines and slide decks")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "PITCHCRAFT_CONFIG", default_value = "pitchcraft.toml")]
    config: PathBuf,

    /// Correlation id for the run; random when omitted.
    #[arg(long, global = true)]
    thread_id: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a first-draft outline from client and competitor records.
    Outline {
        /// JSON file holding the outline request.
        #[arg(long)]
        request: PathBuf,
    },
    /// Generate a reviewed slide deck from slide outlines.
    Slides {
        /// JSON file holding the slide request.
        #[arg(long)]
        request: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = CliConfig::load(&cli.config)?;
    let _telemetry = telemetry::init(&config.telemetry)?;

    let store = Arc::new(match &config.store.data_file {
        Some(path) => InMemoryDocumentStore::load(path)
            .await
            .context("failed to load document store")?,
        None => InMemoryDocumentStore::new(),
    });
    let collab = collaborators(&config, store.clone())?;
    let run_config = RunConfig {
        thread_id: cli.thread_id.map(ThreadId::from_uuid),
    };

    let code = match cli.command {
        Command::Outline { request } => {
            let input: OutlineRequest = read_request(&request).await?;
            let result = run_outline_pipeline(&collab, input, run_config).await;
            print_json(&result)?;
            ExitCode::SUCCESS
        }
        Command::Slides { request } => {
            let input: SlideRequest = read_request(&request).await?;
            match run_slide_pipeline(&collab, input, run_config).await {
                Ok(result) => {
                    print_json(&result)?;
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!(error = %err, "slide generation failed");
                    eprintln!("error: {err}");
                    ExitCode::FAILURE
                }
            }
        }
    };

    if let Some(path) = &config.store.data_file {
        store
            .persist(path)
            .await
            .context("failed to write document store")?;
        info!(path = %path.display(), "document store saved");
    }
    Ok(code)
}

fn collaborators(config: &CliConfig, store: Arc<InMemoryDocumentStore>) -> Result<Collaborators> {
    let api_key = std::env::var(&config.llm.api_key_env)
        .with_context(|| format!("environment variable {} is not set", config.llm.api_key_env))?;
    let provider = AnthropicProvider::new(config.anthropic_config(api_key))
        .context("failed to create Anthropic client")?;
    let gateway = LlmGateway::new(Arc::new(provider), config.generation_options()?);
    Ok(Collaborators::new(store, Arc::new(config.settings()), gateway))
}

async fn read_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read request {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid request {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
