//! Connection registry shared by the client and server facades.
//!
//! - `id -> Connection` for every live connection of one endpoint role
//! - fans connection events out to role-level observers
//! - routes outbound packets to the least-loaded connection
//!
//! A connection removes itself from the set inside its disconnect
//! notification, before the role-level "connection lost" observers run.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use wspackets_core::error::{Result, WspError};
use wspackets_core::{Packet, TypeResolver};

use crate::connection::{
    invoke_isolated, Connection, ConnectionId, ConnectionOptions, DisconnectCallback,
    PacketCallback,
};
use crate::obs::WspMetrics;
use crate::transport::Transport;

#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    resolver: Arc<dyn TypeResolver>,
    options: ConnectionOptions,
    metrics: Arc<WspMetrics>,
    connections: DashMap<ConnectionId, Connection>,
    on_packet: RwLock<Vec<PacketCallback>>,
    on_lost: RwLock<Vec<DisconnectCallback>>,
    shutdown: CancellationToken,
}

impl Registry {
    pub fn new(resolver: Arc<dyn TypeResolver>, options: ConnectionOptions) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                resolver,
                options,
                metrics: Arc::default(),
                connections: DashMap::new(),
                on_packet: RwLock::new(Vec::new()),
                on_lost: RwLock::new(Vec::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Wrap an open transport in a connection, wire its events, insert it,
    /// and start it.
    pub fn attach(&self, transport: Arc<dyn Transport>) -> Result<Connection> {
        if self.inner.shutdown.is_cancelled() {
            return Err(WspError::Shutdown);
        }
        if !transport.is_open() {
            return Err(WspError::Transport("unable to attach a closed transport".into()));
        }

        let conn = Connection::with_metrics(
            transport,
            Arc::clone(&self.inner.resolver),
            self.inner.options.clone(),
            Arc::clone(&self.inner.metrics),
        );

        let weak = Arc::downgrade(&self.inner);
        conn.on_disconnected(move |conn| {
            if let Some(inner) = weak.upgrade() {
                inner.connection_lost(conn);
            }
        });
        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        conn.on_packet(move |conn, packet| {
            if let Some(inner) = weak.upgrade() {
                inner.packet_received(conn, packet);
            }
        });

        self.inner.connections.insert(conn.id(), conn.clone());
        if self.inner.shutdown.is_cancelled() {
            // lost a race with `close`
            self.inner.connections.remove(&conn.id());
            return Err(WspError::Shutdown);
        }
        if let Err(e) = conn.start() {
            self.inner.connections.remove(&conn.id());
            return Err(e);
        }

        tracing::info!(conn = %conn.id(), total = self.inner.connections.len(), "connection added");
        Ok(conn)
    }

    /// The live connection with the smallest write backlog, if any.
    ///
    /// The answer may be stale by the time it is used; that only affects
    /// balance, never correctness.
    pub fn best_connection(&self) -> Option<Connection> {
        self.connections()
            .into_iter()
            .min_by_key(Connection::write_queue_len)
    }

    /// Send through the least-loaded connection.
    ///
    /// A candidate that closed after selection is skipped in favour of the
    /// next least-loaded one, so the packet is either queued or the caller
    /// gets `NoConnection`.
    pub fn send(&self, packet: Packet) -> Result<()> {
        let mut candidates = self.connections();
        candidates.sort_by_key(Connection::write_queue_len);
        for conn in candidates {
            match conn.send(packet.clone()) {
                Ok(()) => return Ok(()),
                Err(WspError::ConnectionClosed) => {
                    tracing::debug!(conn = %conn.id(), "selected connection closed, trying next");
                }
                Err(e) => return Err(e),
            }
        }
        Err(WspError::NoConnection)
    }

    /// Send to every live connection. Returns how many accepted the packet.
    pub fn broadcast(&self, packet: Packet) -> usize {
        self.connections()
            .into_iter()
            .filter(|conn| conn.send(packet.clone()).is_ok())
            .count()
    }

    /// Stop accepting new connections, then close every live one.
    pub async fn close(&self) {
        // an `attach` racing with us either sees the cancellation after its
        // insert or lands in the snapshot below
        self.inner.shutdown.cancel();
        let connections = self.connections();
        for conn in &connections {
            conn.close().await;
        }
        self.inner.connections.clear();
        tracing::info!(closed = connections.len(), "registry closed");
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Snapshot of the live connections.
    pub fn connections(&self) -> Vec<Connection> {
        self.inner
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn on_packet_received<F>(&self, handler: F)
    where
        F: Fn(&Connection, Packet) + Send + Sync + 'static,
    {
        self.inner.on_packet.write().push(Arc::new(handler));
    }

    pub fn on_connection_lost<F>(&self, handler: F)
    where
        F: Fn(&Connection) + Send + Sync + 'static,
    {
        self.inner.on_lost.write().push(Arc::new(handler));
    }

    /// Cancelled once `close` ran; pending dials select on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub fn metrics(&self) -> Arc<WspMetrics> {
        Arc::clone(&self.inner.metrics)
    }
}

impl RegistryInner {
    fn connection_lost(&self, conn: &Connection) {
        self.connections.remove(&conn.id());
        tracing::info!(conn = %conn.id(), remaining = self.connections.len(), "connection lost");

        let observers = self.on_lost.read().clone();
        for observer in observers {
            if let Err(e) = invoke_isolated("connection lost observer", || observer(conn)) {
                tracing::error!(conn = %conn.id(), error = %e, "connection lost observer faulted");
            }
        }
    }

    fn packet_received(&self, conn: &Connection, packet: Packet) {
        let observers = self.on_packet.read().clone();
        for observer in observers {
            let p = packet.clone();
            if let Err(e) = invoke_isolated("packet observer", || observer(conn, p)) {
                self.metrics
                    .handler_faults
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                tracing::error!(packet = packet.type_name(), error = %e, "packet handler faulted");
            }
        }
    }
}
