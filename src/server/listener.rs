//! HTTP server listener
//!
//! Binds the listen address and serves the relay routes until shutdown.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::device::StreamState;
use crate::error::Result;
use crate::relay::RelayConfig;
use crate::server::config::ServerConfig;
use crate::server::routes::{router, AppState};

/// HTTP front end of the relay
pub struct RelayServer {
    config: ServerConfig,
    relay: RelayConfig,
    state: Arc<StreamState>,
}

impl RelayServer {
    /// Create a new server for `state`
    pub fn new(config: ServerConfig, relay: RelayConfig, state: Arc<StreamState>) -> Self {
        Self {
            config,
            relay,
            state,
        }
    }

    /// Router serving this server's routes
    pub fn router(&self) -> Router {
        router(AppState::new(self.state.clone(), self.relay.clone()))
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, source = %self.state.source(), "HTTP server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let (state, _writer) = StreamState::new("http://cam/video");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = RelayServer::new(ServerConfig::with_addr(addr), RelayConfig::default(), state);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = stop_rx.await;
                })
                .await
        });

        let mut socket = TcpStream::connect(addr).await.unwrap();
        socket
            .write_all(b"GET /view HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        socket.read_to_end(&mut raw).await.unwrap();
        assert!(raw.starts_with(b"HTTP/1.1 200"));

        stop_tx.send(()).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_until_binds_configured_addr() {
        let (state, _writer) = StreamState::new("http://cam/video");
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let server = RelayServer::new(ServerConfig::with_addr(addr), RelayConfig::default(), state);

        // Address already in use
        assert!(server.run_until(std::future::pending()).await.is_err());
    }
}
