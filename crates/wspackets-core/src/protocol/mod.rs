//! Wire format of one packet.
//!
//! ```text
//! [u32 len N1][N1 bytes: UTF-8 type name]
//! [u32 len N2][N2 bytes: UTF-8 JSON payload]
//! ```
//!
//! Length prefixes are little-endian and count exactly the bytes of the field
//! that follows. All parsers are panic-free: malformed input is reported as
//! `WspError` and never yields a partially-filled value.

pub mod envelope;
pub mod frame;
pub mod wire;

pub use envelope::Envelope;
pub use wire::{decode_packet, encode_packet};
