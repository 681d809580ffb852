use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tower_http::cors::CorsLayer;

use voice_relay::config::Config;
use voice_relay::logging::{self, LogFormat};
use voice_relay::routes;
use voice_relay::state::AppState;

/// Relay voice-assistant webhooks to a chat model or a local CLI tool.
#[derive(Parser, Debug)]
#[command(name = "voice-relay", version)]
struct Cli {
    /// Override HOST from the environment
    #[arg(long)]
    host: Option<String>,

    /// Override PORT from the environment
    #[arg(short, long)]
    port: Option<u16>,

    /// Debug-level logging (ignored when RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    if config.llm.api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; /ask will fail until it is");
    }

    let state = Arc::new(AppState::from_config(&config)?);

    let app = routes::create_router()
        .with_state(state)
        .layer(CorsLayer::very_permissive());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, model = %config.llm.model, "voice relay listening");
    tracing::info!("  POST /ask     - send queries to the chat model");
    tracing::info!("  POST /ask-cli - send queries to {}", config.cli_program.display());
    tracing::info!("  POST /clear   - clear conversation history");

    axum::serve(listener, app).await?;
    Ok(())
}
