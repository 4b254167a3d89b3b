//! Lightweight in-process metrics (dependency-free).
//!
//! Counters are plain atomics shared by one registry and all of its
//! connections, rendered in Prometheus text format by the `/metrics` handler.

pub mod metrics;

pub use metrics::WspMetrics;
