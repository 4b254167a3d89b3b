//! WebSocket message classification.
//!
//! - Binary and Text frames => raw frame bytes
//! - Ping/Pong are skipped (the WebSocket libraries answer pings themselves)
//! - Close ends the session

use bytes::Bytes;

#[derive(Debug)]
pub enum Inbound {
    Data(Bytes),
    Control,
    Close,
}

/// Message type of one WebSocket library.
pub trait WsFrame: Send + 'static {
    fn binary(frame: Bytes) -> Self;
    fn close() -> Self;
    fn classify(self) -> Inbound;
}

impl WsFrame for axum::extract::ws::Message {
    fn binary(frame: Bytes) -> Self {
        Self::Binary(frame.to_vec())
    }

    fn close() -> Self {
        Self::Close(None)
    }

    fn classify(self) -> Inbound {
        match self {
            Self::Binary(b) => Inbound::Data(Bytes::from(b)),
            Self::Text(s) => Inbound::Data(Bytes::from(s)),
            Self::Ping(_) | Self::Pong(_) => Inbound::Control,
            Self::Close(_) => Inbound::Close,
        }
    }
}

impl WsFrame for tokio_tungstenite::tungstenite::Message {
    fn binary(frame: Bytes) -> Self {
        Self::Binary(frame)
    }

    fn close() -> Self {
        Self::Close(None)
    }

    fn classify(self) -> Inbound {
        match self {
            Self::Binary(b) => Inbound::Data(b),
            Self::Text(s) => Inbound::Data(Bytes::copy_from_slice(s.as_str().as_bytes())),
            Self::Ping(_) | Self::Pong(_) | Self::Frame(_) => Inbound::Control,
            Self::Close(_) => Inbound::Close,
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::Message;

    use super::*;

    #[test]
    fn text_and_binary_both_carry_frames() {
        assert!(matches!(Message::Binary(vec![1, 2]).classify(), Inbound::Data(b) if b == Bytes::from_static(&[1, 2])));
        assert!(matches!(Message::Text("hi".into()).classify(), Inbound::Data(b) if b == Bytes::from_static(b"hi")));
        assert!(matches!(Message::Ping(vec![]).classify(), Inbound::Control));
        assert!(matches!(<Message as WsFrame>::close().classify(), Inbound::Close));
    }
}
