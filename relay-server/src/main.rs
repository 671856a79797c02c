use std::sync::Arc;

use clap::Parser;
use relay_core::{ChatKitClient, RelayConfig, SessionBackend};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use relay_server::http;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chatkit-relay.toml")]
    config: String,

    /// Validate configuration and exit without serving
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience: production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load and validate config before anything binds
    let config = match RelayConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    if args.check {
        println!("✅ Workflow: {}", config.upstream.workflow_id);
        println!("✅ Upstream: {}", config.upstream.base_url);
        println!("✅ Listen:   {}:{}", config.http.host, config.http.port);
        println!("✅ ChatKit relay config check passed");
        return Ok(());
    }

    let backend: Arc<dyn SessionBackend> = match ChatKitClient::new(&config.upstream) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Failed to create ChatKit client: {}", e);
            std::process::exit(1);
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(config, backend, tx.subscribe()).await
}
