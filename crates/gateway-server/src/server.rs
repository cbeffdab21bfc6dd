//! HTTP server implementation.

use crate::{routes::create_router, state::GatewayState};
use std::future::Future;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// HTTP server for the gateway
pub struct Server {
    state: GatewayState,
}

impl Server {
    /// Create a new server
    #[must_use]
    pub fn new(state: GatewayState) -> Self {
        Self { state }
    }

    /// Run the server until Ctrl+C or SIGTERM
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound or the server fails
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the server with a custom shutdown signal
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound or the server fails
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.server.socket_addr();

        info!(
            host = %self.state.config.server.host,
            port = self.state.config.server.port,
            routes = self.state.routes.len(),
            "Starting HTTP server"
        );

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// The cache store is closed once the server has drained.
    ///
    /// # Errors
    /// Returns error if the server fails
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(local) = listener.local_addr() {
            info!(address = %local, "Server listening");
        }

        let cache = self.state.cache.clone();
        let router = create_router(self.state);

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()));

        if let Some(cache) = cache {
            if let Err(e) = cache.close().await {
                warn!(error = %e, "Failed to close response cache");
            }
        }

        info!("Server shutdown complete");
        result
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),
    /// Server error during operation
    #[error("Server error: {0}")]
    Serve(String),
}

/// Shutdown signal handler
///
/// # Panics
/// Panics if signal handlers cannot be installed (should not happen on supported platforms)
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
