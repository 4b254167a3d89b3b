//! Transport layer.
//!
//! A `Transport` is one full-duplex session that moves whole binary frames.
//! The connection engine reads and writes concurrently, so every method
//! takes `&self` and implementations keep their read and write halves under
//! separate locks.

pub mod codec;
pub mod memory;
pub mod ws;

use async_trait::async_trait;
use bytes::Bytes;

use wspackets_core::error::Result;

pub use memory::MemoryTransport;
pub use ws::{ClientSocket, ServerSocket, WsTransport};

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// `false` once either side closed or the session failed.
    fn is_open(&self) -> bool;

    /// Wait for the next data frame. Any error means the session is over.
    async fn receive_frame(&self) -> Result<Bytes>;

    async fn send_frame(&self, frame: Bytes) -> Result<()>;

    /// Close the session if still open. Calling it twice is harmless.
    async fn close(&self) -> Result<()>;
}
