//! Demo client: opens `client.connections` connections, sends N pings
//! (second CLI argument, default 10000), waits for every pong, and reports
//! throughput.

use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Notify;
use tracing_subscriber::{fmt, EnvFilter};

use wspackets_core::Packet;
use wspackets_demo::{config_path, resolver, Ping, Pong};
use wspackets_net::{config, Client};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = config::load_from_file(&config_path())?;
    let total: u64 = match std::env::args().nth(2) {
        Some(n) => n.parse()?,
        None => 10_000,
    };

    let client = Client::with_options(
        cfg.client.endpoint.clone(),
        resolver()?,
        cfg.connection.options(),
    );

    let received = Arc::new(AtomicU64::new(0));
    let done = Arc::new(Notify::new());
    {
        let received = Arc::clone(&received);
        let done = Arc::clone(&done);
        client.on_packet_received(move |_, packet| {
            if let Some(pong) = packet.downcast_ref::<Pong>() {
                tracing::trace!(seq = pong.seq, time = pong.time, "pong");
                if received.fetch_add(1, Ordering::Relaxed) + 1 == total {
                    done.notify_one();
                }
            }
        });
    }
    client.on_connection_lost(|conn| {
        tracing::info!(conn = %conn.id(), "connection lost");
    });

    for _ in 0..cfg.client.connections {
        let conn = client.add_connection().await?;
        tracing::info!(conn = %conn.id(), endpoint = %client.endpoint(), "connected");
    }

    let started = Instant::now();
    for seq in 0..total {
        client.send(Packet::new(Ping {
            seq,
            note: "hello".into(),
        }))?;
    }
    if total > 0 {
        done.notified().await;
    }

    let elapsed = started.elapsed();
    let rate = total as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    tracing::info!(
        packets = total,
        elapsed_ms = elapsed.as_millis() as u64,
        round_trips_per_sec = rate as u64,
        "all pongs received"
    );

    client.close().await;
    Ok(())
}
