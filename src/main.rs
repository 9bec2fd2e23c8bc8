//! Hand analyzer: count fingers in a photo with Google Gemini.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hand_analyzer::{encode, server, Config, SelectedFile, WorkflowHandle};

/// Finger counting and hand description via a vision-language model
#[derive(Parser)]
#[command(name = "hand-analyzer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    config: Config,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web UI (default)
    Serve,

    /// Analyze one image file and print the result
    Analyze {
        /// Path to the image
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli.config).await,
        Commands::Analyze { path } => analyze_file(&cli.config, path).await,
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();
}

fn spawn_workflow(config: &Config) -> WorkflowHandle {
    let client = config.client();
    if !client.has_api_key() {
        tracing::warn!("GEMINI_API_KEY is not set; analyses will fail until it is provided");
    }
    WorkflowHandle::spawn(Arc::new(client), config.timeout())
}

async fn serve(config: &Config) -> Result<()> {
    let workflow = spawn_workflow(config);
    let app = server::router(workflow);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(addr = %config.bind, "Server running");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn analyze_file(config: &Config, path: PathBuf) -> Result<()> {
    let workflow = spawn_workflow(config);

    let file = SelectedFile::from_path(&path).await?;
    workflow.upload(encode(Some(file))).await?;
    workflow.analyze().await?;

    let snapshot = workflow.settled().await?;
    match (snapshot.result, snapshot.error) {
        (Some(text), _) => {
            println!("{text}");
            Ok(())
        }
        (None, Some(message)) => anyhow::bail!(message),
        (None, None) => anyhow::bail!("analysis ended in the {} state", snapshot.status),
    }
}
