//! Top-level facade crate for wsPackets.
//!
//! Re-exports the wire primitives and the runtime so users can depend on a single crate.

pub mod core {
    pub use wspackets_core::*;
}

pub mod net {
    pub use wspackets_net::*;
}

pub mod prelude {
    pub use wspackets_core::{Packet, PacketRegistry, Result, TypeResolver, WspError};
    pub use wspackets_net::{Client, Connection, ConnectionOptions, Server};
}
