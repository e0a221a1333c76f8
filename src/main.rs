//! # lexrag CLI
//!
//! ## Usage
//!
//! ```bash
//! lexrag --config ./config/lexrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexrag serve` | Start the HTTP query/upload service |
//! | `lexrag ingest <FILES>...` | Add documents to the persisted index |
//! | `lexrag rebuild` | Re-ingest `[corpus].dir` into a fresh index |
//! | `lexrag ask "<question>"` | Answer one question and print the JSON result |
//! | `lexrag stats` | Show index size and location |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `info,lexrag=debug`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lexrag::config::{self, Config};
use lexrag::extract::mime_from_filename;
use lexrag::models::{QueryRequest, UploadedFile};
use lexrag::server;
use lexrag::service::{Capabilities, ServiceContext};
use lexrag_core::index::VectorIndex;
use tracing_subscriber::EnvFilter;

/// Legal question answering over a private corpus with web fallback.
#[derive(Parser)]
#[command(name = "lexrag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lexrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    ///
    /// Loads the persisted index (ingesting `[corpus].dir` when none exists)
    /// and serves until Ctrl-C.
    Serve,

    /// Ingest documents into the persisted index.
    Ingest {
        /// PDF, DOCX or TXT files, or directories to walk.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Discard the index and re-ingest `[corpus].dir`.
    Rebuild,

    /// Run the query path once and print the JSON answer.
    Ask {
        question: String,

        #[arg(long, default_value = lexrag::models::DEFAULT_USER_TYPE)]
        user_type: String,

        #[arg(long, default_value = lexrag::models::DEFAULT_LEGAL_AREA)]
        legal_area: String,

        #[arg(long, default_value = lexrag::models::DEFAULT_LANGUAGE)]
        language: String,

        /// Previous question, forwarded as conversational context.
        #[arg(long)]
        prior_question: Option<String>,
    },

    /// Print chunk count, dimensionality and index location.
    Stats,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lexrag=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn build_service(config: Config) -> anyhow::Result<ServiceContext> {
    let caps = Capabilities::from_config(&config)?;
    ServiceContext::from_config(config, caps)
        .await
        .context("failed to open index")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let service = Arc::new(build_service(cfg).await?);
            server::run_server(service).await?;
        }
        Commands::Ingest { files } => {
            let service = build_service(cfg).await?;
            for path in files {
                if path.is_dir() {
                    let report = service.ingest_dir(&path).await?;
                    println!(
                        "{}: {} files, {} skipped, {} chunks",
                        path.display(),
                        report.files,
                        report.skipped,
                        report.chunks
                    );
                    continue;
                }
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let mime_type = mime_from_filename(&filename)
                    .with_context(|| format!("unsupported file type: {}", path.display()))?;
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let report = service
                    .ingest(&UploadedFile {
                        filename,
                        bytes,
                        mime_type: mime_type.to_string(),
                    })
                    .await?;
                println!("{}: {} chunks", path.display(), report.chunk_ids.len());
            }
            println!("index now holds {} chunks", service.chunk_count());
        }
        Commands::Rebuild => {
            let caps = Capabilities::from_config(&cfg)?;
            let report = ServiceContext::rebuild_index(cfg, caps)
                .await
                .context("rebuild failed")?;
            println!(
                "rebuilt index: {} files, {} skipped, {} chunks",
                report.files, report.skipped, report.chunks
            );
        }
        Commands::Ask {
            question,
            user_type,
            legal_area,
            language,
            prior_question,
        } => {
            let service = build_service(cfg).await?;
            let request = QueryRequest {
                user_type,
                legal_area,
                language,
                prior_question,
                ..QueryRequest::new(question)
            };
            let answer = service.handle(request).await?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
        Commands::Stats => {
            let store = lexrag::store::IndexStore::new(&cfg.index.path);
            match store.load() {
                Ok(index) => {
                    println!("index:  {}", store.path().display());
                    println!("chunks: {}", index.len());
                    match index.dims() {
                        Some(d) => println!("dims:   {}", d),
                        None => println!("dims:   -"),
                    }
                }
                Err(lexrag::Error::IndexNotFound(path)) => {
                    println!("no index at {}", path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
