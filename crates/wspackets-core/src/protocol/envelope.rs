//! Envelope: the on-wire layout of one packet.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Result, WspError};
use crate::protocol::frame::{self, LEN_PREFIX};

/// Decoded envelope. The payload stays raw until a resolver picks its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Wire type name.
    pub name: String,
    /// JSON payload bytes (zero-copy slice of the frame).
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Exact encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        2 * LEN_PREFIX + self.name.len() + self.payload.len()
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(self.encoded_len());
        frame::write_string(&mut out, &self.name)?;
        frame::write_bytes(&mut out, &self.payload)?;
        Ok(out.freeze())
    }

    /// Decode one whole frame. Bytes after the payload field are rejected.
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        let name = frame::read_string(&mut buf)?;
        let payload = frame::read_bytes(&mut buf)?;
        if buf.has_remaining() {
            return Err(WspError::TrailingBytes(buf.remaining()));
        }
        Ok(Self { name, payload })
    }
}
