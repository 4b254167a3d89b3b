//! Demo server: answers every `Ping` with a `Pong` on the same connection.
//!
//! - WebSocket endpoint: `server.path` (default `/ws`)
//! - `/healthz`, `/metrics`

use std::error::Error;
use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use wspackets_core::Packet;
use wspackets_demo::{config_path, resolver, Ping, Pong};
use wspackets_net::{config, router, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = config::load_from_file(&config_path())?;
    let listen: SocketAddr = cfg.server.listen.parse()?;

    let server = Server::with_options(resolver()?, cfg.connection.options());
    server.on_packet_received(|conn, packet| {
        if let Some(ping) = packet.downcast_ref::<Ping>() {
            tracing::debug!(conn = %conn.id(), seq = ping.seq, note = %ping.note, "ping");
            if let Err(e) = conn.send(Packet::new(Pong::reply_to(ping))) {
                tracing::warn!(conn = %conn.id(), error = %e, "pong not sent");
            }
        }
    });
    server.on_connection_lost(|conn| {
        tracing::info!(conn = %conn.id(), "connection lost");
    });

    let app = router::build_router(server.clone(), &cfg.server.path);

    tracing::info!(%listen, path = %cfg.server.path, "wsp-server starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    let shutdown = server.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "ctrl-c handler failed");
            }
            // upgraded sessions end once their connections close
            shutdown.close().await;
        })
        .await?;

    tracing::info!("wsp-server stopped");
    Ok(())
}
