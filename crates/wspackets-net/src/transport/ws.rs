//! WebSocket transport adapter.
//!
//! Works for any socket that is both a `Stream` of messages and a `Sink` of
//! messages: axum's server-side `WebSocket` and tokio-tungstenite's client
//! `WebSocketStream`. The socket is split once so the read loop and the write
//! loop never wait on each other's lock.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;

use wspackets_core::error::{Result, WspError};

use crate::transport::codec::{Inbound, WsFrame};
use crate::transport::Transport;

/// Server-side socket accepted by axum.
pub type ServerSocket = WsTransport<axum::extract::ws::WebSocket, axum::extract::ws::Message>;

/// Client-side socket dialed by tokio-tungstenite.
pub type ClientSocket = WsTransport<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tokio_tungstenite::tungstenite::Message,
>;

pub struct WsTransport<S, M> {
    sink: Mutex<SplitSink<S, M>>,
    stream: Mutex<SplitStream<S>>,
    open: AtomicBool,
}

impl<S, M, E> WsTransport<S, M>
where
    S: Stream<Item = std::result::Result<M, E>> + Sink<M, Error = E> + Send + Unpin + 'static,
    M: WsFrame,
    E: Display + Send + 'static,
{
    pub fn new(socket: S) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            open: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl<S, M, E> Transport for WsTransport<S, M>
where
    S: Stream<Item = std::result::Result<M, E>> + Sink<M, Error = E> + Send + Unpin + 'static,
    M: WsFrame,
    E: Display + Send + 'static,
{
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn receive_frame(&self) -> Result<Bytes> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(msg)) => match msg.classify() {
                    Inbound::Data(frame) => return Ok(frame),
                    Inbound::Control => continue,
                    Inbound::Close => {
                        self.open.store(false, Ordering::Release);
                        return Err(WspError::ConnectionClosed);
                    }
                },
                Some(Err(e)) => {
                    self.open.store(false, Ordering::Release);
                    return Err(WspError::Transport(format!("websocket receive: {e}")));
                }
                None => {
                    self.open.store(false, Ordering::Release);
                    return Err(WspError::ConnectionClosed);
                }
            }
        }
    }

    async fn send_frame(&self, frame: Bytes) -> Result<()> {
        if !self.is_open() {
            return Err(WspError::ConnectionClosed);
        }
        let mut sink = self.sink.lock().await;
        sink.send(M::binary(frame)).await.map_err(|e| {
            self.open.store(false, Ordering::Release);
            WspError::Transport(format!("websocket send: {e}"))
        })
    }

    async fn close(&self) -> Result<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let mut sink = self.sink.lock().await;
        // the peer may already be gone; the close frame is best-effort
        let _ = sink.send(M::close()).await;
        sink.close()
            .await
            .map_err(|e| WspError::Transport(format!("websocket close: {e}")))
    }
}
