//! Metric primitives and the engine's metric set.
//!
//! Labels are `&'static str` (error codes, directions), so label sets stay
//! bounded. Histogram buckets are fixed in microseconds to avoid floating
//! point math.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

/// Counter with one label dimension.
#[derive(Default)]
pub struct CounterVec {
    map: DashMap<&'static str, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, label: &'static str) {
        self.map
            .entry(label)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, label: &str) -> u64 {
        self.map
            .get(label)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, label_key: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        let mut rows: Vec<(&'static str, u64)> = self
            .map
            .iter()
            .map(|r| (*r.key(), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort_unstable();
        for (label, val) in rows {
            let _ = writeln!(out, "{name}{{{label_key}=\"{label}\"}} {val}");
        }
    }
}

// 100us, 1ms, 10ms, 100ms, 1s, 3s
const BUCKETS_MICROS: [u64; 6] = [100, 1_000, 10_000, 100_000, 1_000_000, 3_000_000];

#[derive(Default)]
pub struct Histogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 6],
}

impl Histogram {
    pub fn observe(&self, d: Duration) {
        let micros = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(micros, Ordering::Relaxed);
        for (bucket, &le) in self.buckets.iter().zip(BUCKETS_MICROS.iter()) {
            if micros <= le {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for (bucket, le) in self.buckets.iter().zip(BUCKETS_MICROS) {
            let _ = writeln!(out, "{name}_bucket{{le=\"{le}\"}} {}", bucket.load(Ordering::Relaxed));
        }
        let count = self.count();
        let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {count}");
        let _ = writeln!(out, "{name}_sum {}", self.sum.load(Ordering::Relaxed));
        let _ = writeln!(out, "{name}_count {count}");
    }
}

/// Metric set shared by a registry and its connections.
#[derive(Default)]
pub struct WspMetrics {
    /// Packets decoded / flushed, labelled `in` / `out`.
    pub packets: CounterVec,
    /// Message-local drops, labelled by error code.
    pub dropped: CounterVec,
    pub handler_faults: AtomicU64,
    pub slow_handlers: AtomicU64,
    /// Packets accepted by `send` but never flushed.
    pub undelivered: AtomicU64,
    pub connections_active: AtomicI64,
    /// Time spent in packet handlers, microseconds.
    pub dispatch_duration: Histogram,
}

impl WspMetrics {
    pub fn render(&self, extra: &[(&str, u64)]) -> String {
        let mut out = String::new();
        self.packets.render("wsp_packets_total", "direction", &mut out);
        self.dropped.render("wsp_dropped_messages_total", "code", &mut out);
        let plain = [
            ("wsp_handler_faults_total", self.handler_faults.load(Ordering::Relaxed)),
            ("wsp_slow_handlers_total", self.slow_handlers.load(Ordering::Relaxed)),
            ("wsp_undelivered_packets_total", self.undelivered.load(Ordering::Relaxed)),
        ];
        for (name, val) in plain {
            let _ = writeln!(out, "# TYPE {name} counter\n{name} {val}");
        }
        let _ = writeln!(
            out,
            "# TYPE wsp_connections_active gauge\nwsp_connections_active {}",
            self.connections_active.load(Ordering::Relaxed)
        );
        self.dispatch_duration.render("wsp_dispatch_duration_micros", &mut out);
        for (k, v) in extra {
            let _ = writeln!(out, "{k} {v}");
        }
        out
    }
}
