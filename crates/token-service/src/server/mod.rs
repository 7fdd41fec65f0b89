//! HTTP server for the login handshake.
//!
//! ## Handshake
//!
//! - `/oauth/authorize` parks the request of an anonymous browser and sends it to `/login`
//! - `/login` starts a pending login and issues a one-time confirmation code
//! - `/auth` confirms the code and marks the session authenticated
//! - the next `/oauth/authorize` resumes the parked request for the confirmed user

pub mod dump;
pub mod handlers;
pub mod session;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use transport::HttpState;

/// Token service bound to its shared state.
#[derive(Debug)]
pub struct TokenServer {
    state: Arc<HttpState>,
}

impl TokenServer {
    #[must_use]
    pub fn new(state: HttpState) -> Self {
        Self { state: Arc::new(state) }
    }

    /// Router serving this server's state.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        transport::create_router(Arc::clone(&self.state))
    }

    /// Run the server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be bound or the server fails.
    pub async fn run_http(self) -> anyhow::Result<()> {
        let port = self.state.config.port;
        let router = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
