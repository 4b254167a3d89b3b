//! Packets shared by the demo server and client.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use wspackets_core::error::Result;
use wspackets_core::PacketRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ping {
    pub seq: u64,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pong {
    pub seq: u64,
    /// Server wall clock, unix millis.
    pub time: u64,
}

impl Pong {
    pub fn reply_to(ping: &Ping) -> Self {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { seq: ping.seq, time }
    }
}

/// Both sides must register the same names.
pub fn resolver() -> Result<Arc<PacketRegistry>> {
    let mut reg = PacketRegistry::new();
    reg.register::<Ping>()?.register::<Pong>()?;
    Ok(Arc::new(reg))
}

/// Config path from the first CLI argument, `wspackets.yaml` otherwise.
pub fn config_path() -> String {
    std::env::args()
        .nth(1)
        .unwrap_or_else(|| "wspackets.yaml".to_string())
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use wspackets_core::TypeResolver;

    use super::*;

    #[test]
    fn demo_packets_use_short_names() {
        let reg = resolver().unwrap();
        assert_eq!(reg.names(), vec!["Ping", "Pong"]);
        assert_eq!(reg.name_of(TypeId::of::<Pong>()), Some("Pong"));

        let pong = Pong::reply_to(&Ping { seq: 4, note: String::new() });
        assert_eq!(pong.seq, 4);
        assert!(pong.time > 0);
    }
}
