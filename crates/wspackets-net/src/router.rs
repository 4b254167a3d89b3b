//! Axum router wiring (HTTP -> WS upgrade).
//!
//! Mounts the WebSocket route at a configurable path next to the
//! operational endpoints.

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::{routing::get, Router};

use crate::{ops, server::Server};

pub fn build_router(server: Server, path: &str) -> Router {
    Router::new()
        .route(path, get(ws_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .with_state(server)
}

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(server): State<Server>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(server, socket))
}

async fn serve_socket(server: Server, socket: WebSocket) {
    match server.add_connection(socket) {
        // keep the upgrade task alive for the session's lifetime
        Ok(conn) => conn.wait_for_close().await,
        Err(e) => tracing::warn!(error = %e, "rejecting websocket session"),
    }
}
