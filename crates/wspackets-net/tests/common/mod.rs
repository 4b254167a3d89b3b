#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use wspackets_core::PacketRegistry;

pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub seq: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub seq: u32,
}

/// Serializable, but never registered.
#[derive(Debug, Serialize, Deserialize)]
pub struct Secret {
    pub code: String,
}

pub fn resolver() -> Arc<PacketRegistry> {
    let mut reg = PacketRegistry::new();
    reg.register::<Ping>()
        .and_then(|r| r.register::<Pong>())
        .expect("register test packets");
    Arc::new(reg)
}

/// Receive `n` items or fail after `WAIT`.
pub async fn collect<T>(rx: &mut mpsc::UnboundedReceiver<T>, n: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let item = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for packets")
            .expect("channel closed");
        out.push(item);
    }
    out
}

/// Poll `cond` until it holds or `WAIT` elapses.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
