//! Shared error type across wsPackets crates.

use thiserror::Error;

/// Failure category. Decides whether an error closes a connection, drops a
/// single message, or goes back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stream is gone. Always closes the connection, never retried.
    TransportFatal,
    /// One bad message. Logged and discarded, the connection stays open.
    MessageLocal,
    /// An application packet handler faulted.
    HandlerFault,
    /// The caller used the API wrongly (no connection, double start, bad config).
    Misuse,
}

impl ErrorKind {
    /// Stable string form used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TransportFatal => "TRANSPORT_FATAL",
            ErrorKind::MessageLocal => "MESSAGE_LOCAL",
            ErrorKind::HandlerFault => "HANDLER_FAULT",
            ErrorKind::Misuse => "MISUSE",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WspError>;

/// Unified error type used by core, net, and applications.
#[derive(Debug, Error)]
pub enum WspError {
    #[error("frame truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("invalid utf-8 in packet type name")]
    InvalidUtf8,
    #[error("frame has {0} trailing bytes after the payload")]
    TrailingBytes(usize),
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("unknown packet type '{0}'")]
    UnknownPacket(String),
    #[error("packet type {0} is not registered")]
    UnregisteredType(&'static str),
    #[error("payload codec failed for '{name}': {reason}")]
    Codec { name: String, reason: String },
    #[error("packet handler panicked: {0}")]
    HandlerPanic(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connection already started")]
    AlreadyStarted,
    #[error("unable to find any connection, make sure at least one connection is open")]
    NoConnection,
    #[error("endpoint is shut down")]
    Shutdown,
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("duplicate packet registration '{0}'")]
    DuplicatePacket(String),
}

impl WspError {
    /// Map the error onto its handling category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WspError::Truncated { .. }
            | WspError::InvalidUtf8
            | WspError::TrailingBytes(_)
            | WspError::FrameTooLarge { .. }
            | WspError::UnknownPacket(_)
            | WspError::UnregisteredType(_)
            | WspError::Codec { .. } => ErrorKind::MessageLocal,
            WspError::HandlerPanic(_) => ErrorKind::HandlerFault,
            WspError::Transport(_) | WspError::ConnectionClosed => ErrorKind::TransportFatal,
            WspError::AlreadyStarted
            | WspError::NoConnection
            | WspError::Shutdown
            | WspError::Config(_)
            | WspError::UnsupportedVersion
            | WspError::DuplicatePacket(_) => ErrorKind::Misuse,
        }
    }

    /// Stable machine code (test vectors, metric labels).
    pub fn code(&self) -> &'static str {
        match self {
            WspError::Truncated { .. } => "TRUNCATED",
            WspError::InvalidUtf8 => "INVALID_UTF8",
            WspError::TrailingBytes(_) => "TRAILING_BYTES",
            WspError::FrameTooLarge { .. } => "FRAME_TOO_LARGE",
            WspError::UnknownPacket(_) => "UNKNOWN_PACKET",
            WspError::UnregisteredType(_) => "UNREGISTERED_TYPE",
            WspError::Codec { .. } => "CODEC",
            WspError::HandlerPanic(_) => "HANDLER_PANIC",
            WspError::Transport(_) => "TRANSPORT",
            WspError::ConnectionClosed => "CONNECTION_CLOSED",
            WspError::AlreadyStarted => "ALREADY_STARTED",
            WspError::NoConnection => "NO_CONNECTION",
            WspError::Shutdown => "SHUTDOWN",
            WspError::Config(_) => "CONFIG",
            WspError::UnsupportedVersion => "UNSUPPORTED_VERSION",
            WspError::DuplicatePacket(_) => "DUPLICATE_PACKET",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_local_errors_never_count_as_fatal() {
        let errs = [
            WspError::Truncated { needed: 4, remaining: 1 },
            WspError::UnknownPacket("Nope".into()),
            WspError::Codec { name: "Ping".into(), reason: "eof".into() },
        ];
        for e in errs {
            assert_eq!(e.kind(), ErrorKind::MessageLocal, "{e}");
        }
        assert_eq!(WspError::ConnectionClosed.kind(), ErrorKind::TransportFatal);
        assert_eq!(WspError::NoConnection.kind().as_str(), "MISUSE");
    }
}
