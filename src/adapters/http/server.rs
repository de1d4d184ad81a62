//! HTTP server lifecycle: bind, serve, drain on shutdown.

use tokio::sync::broadcast;
use tracing::{info, instrument};

use super::{AppState, build_router};

/// axum server for all service routes.
pub struct HttpServer {
    /// Shared handler state.
    state: AppState,
    /// Listener address, e.g. `0.0.0.0:8000`.
    bind_address: String,
}

impl HttpServer {
    pub const fn new(state: AppState, bind_address: String) -> Self {
        Self {
            state,
            bind_address,
        }
    }

    /// Serve until a shutdown signal arrives, then drain in-flight requests.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!(address = %self.bind_address, "HTTP server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}
