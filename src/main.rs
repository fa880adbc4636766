use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rabboni_bridge::{api, bridge::Bridge, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; variables may also come from the environment
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting rabboni_bridge");

    // Load config
    let config = Config::from_env()?;

    // One bridge per process: stream session, reading cache and metadata client
    let bridge = Arc::new(Bridge::start(&config)?);

    if let Some(delay) = config.reconnect_delay {
        tokio::spawn(bridge.clone().supervise(delay));
    }

    // Start HTTP server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, stream_url = %config.stream_url, "HTTP server listening");

    axum::serve(listener, api::router(bridge.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bridge.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
