use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ragchat_app_server::serve;
use ragchat_app_server::tracing_setup::init_tracing;
use ragchat_retrieval::{AnswerService, RagConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "ragchat-server",
    about = "Answer questions over HTTP from a prebuilt vector store"
)]
struct Cli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "RAGCHAT_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// TOML configuration file. Flags below override its values.
    #[arg(long, env = "RAGCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the vector store artifact.
    #[arg(long, env = "RAGCHAT_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Number of passages put into each prompt.
    #[arg(long)]
    top_k: Option<usize>,

    /// Deadline per question in seconds; 0 disables it.
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Load the store and build providers before accepting requests.
    #[arg(long)]
    preload: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "RAGCHAT_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn rag_config(&self) -> Result<RagConfig> {
        let mut config = match &self.config {
            Some(path) => RagConfig::from_toml_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RagConfig::default(),
        };

        if let Some(path) = &self.store_path {
            config = config.with_store_path(path);
        }
        if let Some(top_k) = self.top_k {
            config = config.with_top_k(top_k);
        }
        if let Some(secs) = self.request_timeout_secs {
            config = config.with_request_timeout_secs(secs);
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.rag_config()?;
    info!(
        "Store {}, top_k {}, generation model {}",
        config.store_path.display(),
        config.top_k,
        config.generation.model
    );

    let service = Arc::new(AnswerService::from_config(&config));
    if cli.preload {
        // A failed preload is cached, so requests will report it too.
        if let Err(err) = service.warm_up().await {
            warn!("Preload failed: {err}");
        }
    }

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    serve(listener, service, shutdown_signal())
        .await
        .context("server shutdown")?;
    info!("ragchat stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
