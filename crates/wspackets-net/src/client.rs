//! Client facade: dials WebSocket connections to one endpoint and routes
//! outbound packets across them.

use std::sync::Arc;

use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use wspackets_core::error::{Result, WspError};
use wspackets_core::{Packet, TypeResolver};

use crate::connection::{Connection, ConnectionOptions};
use crate::obs::WspMetrics;
use crate::registry::Registry;
use crate::transport::{ClientSocket, Transport};

#[derive(Clone)]
pub struct Client {
    endpoint: String,
    registry: Registry,
}

impl Client {
    pub fn new(endpoint: impl Into<String>, resolver: Arc<dyn TypeResolver>) -> Self {
        Self::with_options(endpoint, resolver, ConnectionOptions::default())
    }

    pub fn with_options(
        endpoint: impl Into<String>,
        resolver: Arc<dyn TypeResolver>,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            registry: Registry::new(resolver, options),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Dial the configured endpoint and start a new connection.
    pub async fn add_connection(&self) -> Result<Connection> {
        self.add_connection_with(self.endpoint.as_str()).await
    }

    /// Dial with a caller-built handshake request (extra headers,
    /// subprotocols). Cancelled by `close`.
    pub async fn add_connection_with<R>(&self, request: R) -> Result<Connection>
    where
        R: IntoClientRequest + Unpin,
    {
        let shutdown = self.registry.shutdown_token();
        if shutdown.is_cancelled() {
            return Err(WspError::Shutdown);
        }

        let dialed = tokio::select! {
            _ = shutdown.cancelled() => return Err(WspError::Shutdown),
            dialed = tokio_tungstenite::connect_async(request) => dialed,
        };
        let (socket, response) = dialed.map_err(|e| {
            tracing::warn!(endpoint = %self.endpoint, error = %e, "dial failed");
            WspError::Transport(format!("websocket connect: {e}"))
        })?;
        tracing::debug!(endpoint = %self.endpoint, status = %response.status(), "dialed");

        self.registry.attach(Arc::new(ClientSocket::new(socket)))
    }

    /// Start a connection over an already established transport.
    pub fn add_transport(&self, transport: Arc<dyn Transport>) -> Result<Connection> {
        self.registry.attach(transport)
    }

    pub fn send(&self, packet: Packet) -> Result<()> {
        self.registry.send(packet)
    }

    pub fn broadcast(&self, packet: Packet) -> usize {
        self.registry.broadcast(packet)
    }

    pub fn best_connection(&self) -> Option<Connection> {
        self.registry.best_connection()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.registry.connections()
    }

    pub fn on_packet_received<F>(&self, handler: F)
    where
        F: Fn(&Connection, Packet) + Send + Sync + 'static,
    {
        self.registry.on_packet_received(handler);
    }

    pub fn on_connection_lost<F>(&self, handler: F)
    where
        F: Fn(&Connection) + Send + Sync + 'static,
    {
        self.registry.on_connection_lost(handler);
    }

    pub fn metrics(&self) -> Arc<WspMetrics> {
        self.registry.metrics()
    }

    pub async fn close(&self) {
        self.registry.close().await;
    }
}
