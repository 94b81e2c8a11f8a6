//! Doctype server binary
//!
//! Run with: cargo run -p doctype-rag --bin doctype-server -- --config doctype.toml

use clap::Parser;
use doctype_rag::{
    config::{EmbeddingBackend, LlmBackend, RagConfig},
    server::RagServer,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ask questions about an uploaded PDF
#[derive(Debug, Parser)]
#[command(name = "doctype-server", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "DOCTYPE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doctype_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = RagConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    let embed_model = match config.embeddings.provider {
        EmbeddingBackend::Local => &config.embeddings.model,
        EmbeddingBackend::Gemini => &config.llm.gemini_embed_model,
        EmbeddingBackend::Ollama => &config.llm.ollama_embed_model,
    };
    tracing::info!(
        "  - Embeddings: {:?} ({})",
        config.embeddings.provider,
        embed_model
    );
    tracing::info!("  - Vector store: {:?}", config.vector_store.backend);
    let llm_model = match config.llm.provider {
        LlmBackend::Gemini => &config.llm.gemini_model,
        LlmBackend::Ollama => &config.llm.ollama_generate_model,
    };
    tracing::info!("  - LLM: {:?} ({})", config.llm.provider, llm_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );

    let server = RagServer::new(config).await?;

    println!("\nDoctype.io backend");
    println!("  API:    http://{}", server.address());
    println!("  Info:   http://{}/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /ingest - Upload a PDF (multipart field 'file')");
    println!("  POST /chat   - Ask a question");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
