//! Web server using Axum.

use std::net::SocketAddr;

use super::router::create_app_router;
use super::AppState;
use crate::error::{Error, Result};

/// Bind `host:port` and serve until Ctrl-C.
pub async fn run_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = create_app_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| Error::Web(format!("Invalid address {}:{}: {}", host, port, e)))?;

    tracing::info!("Starting web server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
