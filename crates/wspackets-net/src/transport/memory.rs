//! In-process transport pair.
//!
//! Two `MemoryTransport`s created by [`MemoryTransport::pair`] behave like the
//! two ends of a WebSocket: frames sent on one arrive on the other in order,
//! and closing either end closes both.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wspackets_core::error::{Result, WspError};

use crate::transport::Transport;

pub struct MemoryTransport {
    outbound: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
    closed: CancellationToken,
}

impl MemoryTransport {
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::UnboundedSender<Bytes>, rx: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self {
            outbound: Mutex::new(Some(tx)),
            inbound: tokio::sync::Mutex::new(rx),
            closed: CancellationToken::new(),
        }
    }

    // Dropping our sender is what the peer observes as the close.
    fn shut(&self) {
        self.outbound.lock().take();
        self.closed.cancel();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    async fn receive_frame(&self) -> Result<Bytes> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(WspError::ConnectionClosed),
            frame = inbound.recv() => match frame {
                Some(frame) => Ok(frame),
                None => {
                    self.shut();
                    Err(WspError::ConnectionClosed)
                }
            },
        }
    }

    async fn send_frame(&self, frame: Bytes) -> Result<()> {
        let delivered = match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => return Err(WspError::ConnectionClosed),
        };
        if !delivered {
            self.shut();
            return Err(WspError::ConnectionClosed);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shut();
        Ok(())
    }
}
