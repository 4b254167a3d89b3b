//! wsPackets runtime: connection engine, registries, and transport glue.
//!
//! This crate drives live sessions on tokio. Each `Connection` owns one
//! transport and runs read, write, and dispatch loops; `Client` and `Server`
//! hold sets of connections and route outbound packets to the least-loaded
//! one. It is consumed by the demo binaries and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod config;
pub mod connection;
pub mod obs;
pub mod ops;
pub mod registry;
pub mod router;
pub mod server;
pub mod transport;

pub use client::Client;
pub use connection::{Connection, ConnectionId, ConnectionOptions, ConnectionState};
pub use registry::Registry;
pub use server::Server;
pub use transport::Transport;
