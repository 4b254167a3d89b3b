//! Server facade: wraps accepted WebSocket sessions in connections.

use std::sync::Arc;

use axum::extract::ws::WebSocket;

use wspackets_core::error::Result;
use wspackets_core::{Packet, TypeResolver};

use crate::connection::{Connection, ConnectionOptions};
use crate::obs::WspMetrics;
use crate::registry::Registry;
use crate::transport::{ServerSocket, Transport};

#[derive(Clone)]
pub struct Server {
    registry: Registry,
}

impl Server {
    pub fn new(resolver: Arc<dyn TypeResolver>) -> Self {
        Self::with_options(resolver, ConnectionOptions::default())
    }

    pub fn with_options(resolver: Arc<dyn TypeResolver>, options: ConnectionOptions) -> Self {
        Self {
            registry: Registry::new(resolver, options),
        }
    }

    /// Adopt a session accepted by the axum upgrade handler.
    pub fn add_connection(&self, socket: WebSocket) -> Result<Connection> {
        self.registry.attach(Arc::new(ServerSocket::new(socket)))
    }

    /// Adopt any other transport (in-memory pairs, custom adapters).
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
