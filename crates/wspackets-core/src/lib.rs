//! wsPackets core: runtime-free wire primitives for typed packet exchange.
//!
//! This crate defines the envelope codec, the type resolver boundary, the
//! type-erased `Packet` value, and the error surface shared by the runtime
//! crate and applications. It carries no transport or async runtime
//! dependencies so it can be reused from any context.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed frames surface as `WspError`/`Result` so a hostile or buggy
//! peer cannot crash the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod packet;
pub mod protocol;
pub mod resolver;

/// Shared result type.
pub use error::{ErrorKind, Result, WspError};
pub use packet::Packet;
pub use resolver::{PacketCodec, PacketRegistry, TypeResolver};
