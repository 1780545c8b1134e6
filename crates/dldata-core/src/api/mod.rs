//! HTTP front end
//!
//! Serves the login gate, the dashboard page and its JSON form.

pub mod handlers;
pub mod render;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;

use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};

/// HTTP dashboard server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Serve until Ctrl+C
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = create_router(self.state)
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal(format!("failed to bind {addr}: {e}")))?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
