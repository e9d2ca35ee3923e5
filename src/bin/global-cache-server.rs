//! global-cache HTTP API server.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use global_cache::server::{AppState, Config, init_logging, serve};

/// global-cache HTTP API server.
#[derive(Parser, Debug)]
#[command(name = "global-cache-server")]
#[command(about = "Coordinating process for values computed once and shared by parallel workers")]
struct Args {
    /// Path to the configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "GLOBAL_CACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configuration file.
    #[arg(short, long, env = "GLOBAL_CACHE_PORT")]
    port: Option<u16>,

    /// Directory for persistent keys, overriding the configuration file.
    #[arg(long, env = "GLOBAL_CACHE_PATH")]
    base_path: Option<PathBuf>,

    /// Run identifier used in logs. A random one is generated when omitted.
    #[arg(long, env = "GLOBAL_CACHE_RUN_ID")]
    run_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(base_path) = args.base_path {
        config.storage.base_path = base_path;
    }

    init_logging(&config.logging)?;

    let run_id = args
        .run_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(
        run_id = %run_id,
        base_path = %config.storage.base_path.display(),
        "Starting run"
    );

    let state = AppState::from_config(&config, &run_id);

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    serve(listener, state, shutdown_signal()).await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
