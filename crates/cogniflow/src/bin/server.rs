//! CogniFlow server binary
//!
//! Run with: cargo run -p cogniflow --bin cogniflow-server -- --config cogniflow.toml

use clap::Parser;
use cogniflow::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cogniflow-server", version)]
#[command(about = "Socratic tutoring backend over uploaded study material")]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cogniflow=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = RagConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.llm.embed_model);
    tracing::info!("  - Chat model: {}", config.llm.chat_model);
    tracing::info!("  - Chunk size: {} (overlap {})", config.chunking.chunk_size, config.chunking.chunk_overlap);
    tracing::info!("  - Embedding batch size: {}", config.index.batch_size);
    tracing::info!("  - Uploads: {}", config.storage.uploads_dir.display());

    let server = RagServer::new(config).await?;

    let embedder_up = matches!(server.state().embedding_provider().health_check().await, Ok(true));
    let llm_up = matches!(server.state().llm_provider().health_check().await, Ok(true));
    match (embedder_up, llm_up) {
        (true, true) => tracing::info!("Ollama is running"),
        _ => {
            tracing::warn!("Ollama not available at {}", server.state().config().llm.base_url);
            tracing::warn!("Start it with `ollama serve` and pull the configured models");
        }
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("\nEndpoints:");
    println!("  POST /upload      - Upload a document (.pdf, .txt, .md)");
    println!("  GET  /status/:id  - Poll indexing progress");
    println!("  POST /chat        - Ask the tutor");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
