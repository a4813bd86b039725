//! HTTP server lifecycle

use std::net::SocketAddr;

use tracing::info;

use crate::api::build_app;
use crate::core::error::{AppError, Result};
use crate::core::state::ServerState;
use crate::core::tasks;

pub struct Server {
    state: ServerState,
}

impl Server {
    pub fn with_state(state: ServerState) -> Self {
        Self { state }
    }

    pub async fn run(&self) -> Result<()> {
        let state = self.state.clone();
        let config = state.config();

        // The worker's first tick fires immediately and covers the
        // boot-time AirPrint ensure through the shared limiter.
        let _worker = tasks::spawn_airprint_worker(state.clone());

        let app = build_app(&state).with_state(state.clone());

        let host: std::net::IpAddr = config
            .app
            .host
            .parse()
            .map_err(|e| AppError::Config(format!("app.host is not a valid address: {e}")))?;
        let addr = SocketAddr::new(host, config.app.port as u16);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind {addr}: {e}")))?;

        info!("🖨️  PrinterPal listening on http://{addr}/");

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {e}")))?;

        info!("Server shutdown complete");
        Ok(())
    }
}

/// Graceful shutdown handler
///
/// Listens for SIGTERM (systemd) and Ctrl+C signals
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
