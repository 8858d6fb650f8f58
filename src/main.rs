use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rust_rag_server::api;
use rust_rag_server::config::AppConfig;
use rust_rag_server::database::InMemoryVectorStore;
use rust_rag_server::llm::RagPipeline;
use rust_rag_server::providers::{DeepSeekProvider, OpenAIEmbeddingProvider};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on, overrides PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    run_api_server(config, args).await
}

async fn run_api_server(config: AppConfig, args: Args) -> anyhow::Result<()> {
    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(
        embedding_model = %config.embedding.model,
        chat_model = %config.chat.model,
        chunk_size = config.rag.chunk_size,
        chunk_overlap = config.rag.chunk_overlap,
        "initializing RAG pipeline"
    );

    let embedder = OpenAIEmbeddingProvider::new(&config.embedding).context("failed to build embedding client")?;
    let chat = DeepSeekProvider::new(&config.chat).context("failed to build chat client")?;

    let pipeline = RagPipeline::new(
        config.rag,
        Arc::new(embedder),
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(chat),
    )
    .context("failed to build RAG pipeline")?;

    let app = api::create_api(Arc::new(pipeline));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    info!(%addr, "server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
