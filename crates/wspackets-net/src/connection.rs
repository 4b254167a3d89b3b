//! Connection engine.
//!
//! One `Connection` owns one transport and runs three tokio tasks:
//! - read: frame -> envelope -> resolved packet -> dispatch queue
//! - write: outbound queue -> resolver + JSON -> envelope -> frame
//! - dispatch: dispatch queue -> `on_packet` observers, synchronously
//!
//! The queues are unbounded channels, so a loop wakes up the moment work is
//! enqueued. A single bad message is logged and dropped; only the transport
//! going away (or an explicit `close`) ends the connection.
//!
//! Lifecycle: `Created -> Started -> Closing -> Closed`. Teardown runs once no
//! matter how many loops or callers ask for it.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use wspackets_core::error::{Result, WspError};
use wspackets_core::protocol::wire;
use wspackets_core::{Packet, TypeResolver};

use crate::obs::WspMetrics;
use crate::transport::Transport;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    Created = 0,
    Started = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Created,
            1 => ConnectionState::Started,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Tunables for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Handler calls slower than this are logged (never cancelled).
    pub slow_handler_threshold: Duration,
    /// Larger frames are dropped, inbound and outbound.
    pub max_frame_bytes: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            slow_handler_threshold: Duration::from_secs(3),
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Observer of decoded inbound packets.
pub type PacketCallback = Arc<dyn Fn(&Connection, Packet) + Send + Sync>;
/// Observer of the open -> closed transition.
pub type DisconnectCallback = Arc<dyn Fn(&Connection) + Send + Sync>;

/// Handle to one live session. Cheap to clone; all clones share the engine.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn TypeResolver>,
    options: ConnectionOptions,
    metrics: Arc<WspMetrics>,
    state: AtomicU8,

    outbound_tx: mpsc::UnboundedSender<Packet>,
    // taken by `start`
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Packet>>>,
    backlog: AtomicUsize,

    shutdown: CancellationToken,
    closed: CancellationToken,

    on_packet: RwLock<Vec<PacketCallback>>,
    on_disconnected: RwLock<Vec<DisconnectCallback>>,
}

impl Connection {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn TypeResolver>,
        options: ConnectionOptions,
    ) -> Self {
        Self::with_metrics(transport, resolver, options, Arc::default())
    }

    pub fn with_metrics(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn TypeResolver>,
        options: ConnectionOptions,
        metrics: Arc<WspMetrics>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                id: ConnectionId::next(),
                transport,
                resolver,
                options,
                metrics,
                state: AtomicU8::new(ConnectionState::Created as u8),
                outbound_tx,
                outbound_rx: Mutex::new(Some(outbound_rx)),
                backlog: AtomicUsize::new(0),
                shutdown: CancellationToken::new(),
                closed: CancellationToken::new(),
                on_packet: RwLock::new(Vec::new()),
                on_disconnected: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Packets accepted by `send` and not yet flushed. A load signal only.
    pub fn write_queue_len(&self) -> usize {
        self.inner.backlog.load(Ordering::Acquire)
    }

    /// Register an inbound packet observer. Observers run on the dispatch
    /// task in registration order; a panicking observer is logged and skipped.
    pub fn on_packet<F>(&self, handler: F)
    where
        F: Fn(&Connection, Packet) + Send + Sync + 'static,
    {
        self.inner.on_packet.write().push(Arc::new(handler));
    }

    /// Register a disconnect observer. Fired exactly once per connection.
    pub fn on_disconnected<F>(&self, handler: F)
    where
        F: Fn(&Connection) + Send + Sync + 'static,
    {
        self.inner.on_disconnected.write().push(Arc::new(handler));
    }

    /// Spawn the read, write, and dispatch loops. Returns immediately.
    ///
    /// Must run inside a tokio runtime. A second call fails with
    /// `AlreadyStarted`; starting a closed connection fails with
    /// `ConnectionClosed`.
    pub fn start(&self) -> Result<()> {
        if let Err(current) = self.inner.state.compare_exchange(
            ConnectionState::Created as u8,
            ConnectionState::Started as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(Self::start_refused(ConnectionState::from_u8(current)));
        }
        // a concurrent `close` may have claimed the queue after our CAS
        let outbound = self
            .inner
            .outbound_rx
            .lock()
            .take()
            .ok_or_else(|| Self::start_refused(self.state()))?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        self.inner.metrics.connections_active.fetch_add(1, Ordering::Relaxed);
        let span = tracing::info_span!("wsp_conn", conn = %self.id());
        tracing::debug!(parent: &span, "connection started");

        tokio::spawn(self.clone().read_loop(inbound_tx).instrument(span.clone()));
        tokio::spawn(self.clone().write_loop(outbound).instrument(span.clone()));
        tokio::spawn(self.clone().dispatch_loop(inbound_rx).instrument(span));
        Ok(())
    }

    fn start_refused(state: ConnectionState) -> WspError {
        match state {
            ConnectionState::Created | ConnectionState::Started => WspError::AlreadyStarted,
            ConnectionState::Closing | ConnectionState::Closed => WspError::ConnectionClosed,
        }
    }

    /// Queue a packet for delivery. Never waits on the network.
    ///
    /// Fails with `ConnectionClosed` once the connection is closing or closed,
    /// so a caller always learns that the packet was not accepted.
    pub fn send(&self, packet: Packet) -> Result<()> {
        if self.state() >= ConnectionState::Closing {
            return Err(WspError::ConnectionClosed);
        }
        self.inner.backlog.fetch_add(1, Ordering::AcqRel);
        if self.inner.outbound_tx.send(packet).is_err() {
            self.inner.backlog.fetch_sub(1, Ordering::AcqRel);
            return Err(WspError::ConnectionClosed);
        }
        Ok(())
    }

    /// Idempotent teardown: notify observers, stop the loops, close the
    /// transport, release waiters. Concurrent callers all return after the
    /// single teardown completed.
    pub async fn close(&self) {
        if !self.begin_closing() {
            self.wait_for_close().await;
            return;
        }

        tracing::debug!(conn = %self.id(), "closing connection");
        self.notify_disconnected();
        self.inner.shutdown.cancel();

        if self.inner.transport.is_open() {
            if let Err(e) = self.inner.transport.close().await {
                tracing::debug!(conn = %self.id(), error = %e, "transport close failed");
            }
        }

        if self.inner.outbound_rx.lock().take().is_some() {
            // never started: whatever was queued can no longer go anywhere
            self.abandon_backlog();
        } else {
            self.inner.metrics.connections_active.fetch_sub(1, Ordering::Relaxed);
        }

        self.inner
            .state
            .store(ConnectionState::Closed as u8, Ordering::Release);
        self.inner.closed.cancel();
    }

    /// Wait until teardown has fully completed. Any number of waiters.
    pub async fn wait_for_close(&self) {
        self.inner.closed.cancelled().await;
    }

    fn begin_closing(&self) -> bool {
        let mut current = self.inner.state.load(Ordering::Acquire);
        loop {
            if ConnectionState::from_u8(current) >= ConnectionState::Closing {
                return false;
            }
            match self.inner.state.compare_exchange(
                current,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn notify_disconnected(&self) {
        let observers = self.inner.on_disconnected.read().clone();
        for observer in observers {
            if let Err(e) = invoke_isolated("disconnect observer", || observer(self)) {
                tracing::error!(conn = %self.id(), error = %e, "disconnect observer faulted");
            }
        }
    }

    fn abandon_backlog(&self) {
        let abandoned = self.inner.backlog.swap(0, Ordering::AcqRel);
        if abandoned > 0 {
            self.inner
                .metrics
                .undelivered
                .fetch_add(abandoned as u64, Ordering::Relaxed);
            tracing::warn!(conn = %self.id(), undelivered = abandoned, "connection closed with unsent packets");
        }
    }

    async fn read_loop(self, inbound: mpsc::UnboundedSender<Packet>) {
        let transport = Arc::clone(&self.inner.transport);
        while transport.is_open() {
            let frame = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                frame = transport.receive_frame() => frame,
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(error = %e, "read loop stopping");
                    break;
                }
            };

            match self.decode_frame(frame) {
                Ok(packet) => {
                    self.inner.metrics.packets.inc("in");
                    if inbound.send(packet).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    self.inner.metrics.dropped.inc(e.code());
                    tracing::error!(error = %e, kind = e.kind().as_str(), "dropping inbound message");
                }
            }
        }

        // lets the dispatch loop drain what is already decoded, then finish
        drop(inbound);
        self.close().await;
    }

    async fn write_loop(self, mut outbound: mpsc::UnboundedReceiver<Packet>) {
        let transport = Arc::clone(&self.inner.transport);
        while transport.is_open() {
            let packet = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                packet = outbound.recv() => match packet {
                    Some(packet) => packet,
                    None => break,
                },
            };

            let frame = match self.encode_packet(&packet) {
                Ok(frame) => frame,
                Err(e) => {
                    self.inner.backlog.fetch_sub(1, Ordering::AcqRel);
                    self.inner.metrics.dropped.inc(e.code());
                    tracing::error!(packet = packet.type_name(), error = %e, "dropping outbound packet");
                    continue;
                }
            };

            let sent = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                sent = transport.send_frame(frame) => sent,
            };
            match sent {
                Ok(()) => {
                    self.inner.backlog.fetch_sub(1, Ordering::AcqRel);
                    self.inner.metrics.packets.inc("out");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "write loop stopping");
                    break;
                }
            }
        }

        outbound.close();
        self.close().await;
        self.abandon_backlog();
    }

    async fn dispatch_loop(self, mut inbound: mpsc::UnboundedReceiver<Packet>) {
        // runs past shutdown until the read loop's sender is gone and the
        // queue is empty, so decoded packets are never lost
        while let Some(packet) = inbound.recv().await {
            self.dispatch(packet);
        }
        tracing::trace!("dispatch loop drained");
    }

    fn dispatch(&self, packet: Packet) {
        let observers = self.inner.on_packet.read().clone();
        let started = Instant::now();
        for observer in observers {
            let p = packet.clone();
            if let Err(e) = invoke_isolated("packet handler", || observer(self, p)) {
                self.inner.metrics.handler_faults.fetch_add(1, Ordering::Relaxed);
                tracing::error!(packet = packet.type_name(), error = %e, "packet handler faulted");
            }
        }

        let elapsed = started.elapsed();
        self.inner.metrics.dispatch_duration.observe(elapsed);
        if elapsed > self.inner.options.slow_handler_threshold {
            self.inner.metrics.slow_handlers.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                packet = packet.type_name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "packet handler took too long"
            );
        }
    }

    fn decode_frame(&self, frame: Bytes) -> Result<Packet> {
        let max = self.inner.options.max_frame_bytes;
        if frame.len() > max {
            return Err(WspError::FrameTooLarge { len: frame.len(), max });
        }
        wire::decode_packet(self.inner.resolver.as_ref(), frame)
    }

    fn encode_packet(&self, packet: &Packet) -> Result<Bytes> {
        let frame = wire::encode_packet(self.inner.resolver.as_ref(), packet)?;
        let max = self.inner.options.max_frame_bytes;
        if frame.len() > max {
            return Err(WspError::FrameTooLarge { len: frame.len(), max });
        }
        Ok(frame)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("write_queue_len", &self.write_queue_len())
            .finish()
    }
}

/// Run an application callback, turning a panic into `HandlerPanic`.
pub(crate) fn invoke_isolated(what: &'static str, f: impl FnOnce()) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|cause| {
        let msg = panic_message(cause.as_ref());
        tracing::trace!(what, %msg, "callback panicked");
        WspError::HandlerPanic(msg)
    })
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde::{Deserialize, Serialize};
    use wspackets_core::PacketRegistry;

    use super::*;
    use crate::transport::MemoryTransport;

    #[derive(Debug, Serialize, Deserialize)]
    struct Ping;

    fn unstarted() -> Connection {
        let mut reg = PacketRegistry::new();
        reg.register::<Ping>().unwrap();
        let (a, _b) = MemoryTransport::pair();
        Connection::new(Arc::new(a), Arc::new(reg), ConnectionOptions::default())
    }

    #[test]
    fn queued_packets_count_as_backlog_before_start() {
        let conn = unstarted();
        for _ in 0..4 {
            conn.send(Packet::new(Ping)).unwrap();
        }
        assert_eq!(conn.write_queue_len(), 4);
        assert_eq!(conn.state(), ConnectionState::Created);
    }

    #[test]
    fn ids_are_unique_and_displayed() {
        let a = unstarted();
        let b = unstarted();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().to_string(), format!("conn-{}", a.id().get()));
    }

    #[test]
    fn panics_become_handler_faults() {
        let err = invoke_isolated("test", || panic!("boom")).unwrap_err();
        assert!(matches!(err, WspError::HandlerPanic(msg) if msg == "boom"));
        assert!(invoke_isolated("test", || {}).is_ok());
    }

    #[test]
    fn refused_start_reports_closed_once_closing() {
        assert!(matches!(
            Connection::start_refused(ConnectionState::Started),
            WspError::AlreadyStarted
        ));
        assert!(matches!(
            Connection::start_refused(ConnectionState::Closing),
            WspError::ConnectionClosed
        ));
        assert!(matches!(
            Connection::start_refused(ConnectionState::Closed),
            WspError::ConnectionClosed
        ));
    }

    #[tokio::test]
    async fn closing_an_unstarted_connection_drops_its_queue() {
        let conn = unstarted();
        conn.send(Packet::new(Ping)).unwrap();
        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.write_queue_len(), 0);
        assert!(matches!(conn.send(Packet::new(Ping)), Err(WspError::ConnectionClosed)));
        assert!(matches!(conn.start(), Err(WspError::ConnectionClosed)));
    }
}
