#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use wspackets_core::Packet;
use wspackets_net::{router, Client, Server};

use common::{collect, eventually, resolver, Ping, Pong};

async fn spawn_server() -> (Server, SocketAddr) {
    let server = Server::new(resolver());
    server.on_packet_received(|conn, packet| {
        if let Some(ping) = packet.downcast_ref::<Ping>() {
            conn.send(Packet::new(Pong { seq: ping.seq })).unwrap();
        }
    });

    let app = router::build_router(server.clone(), "/ws");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (server, addr)
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();
    let mut body = String::new();
    stream.read_to_string(&mut body).await.unwrap();
    body
}

#[tokio::test]
async fn ping_pong_over_loopback() {
    let (server, addr) = spawn_server().await;

    let client = Client::new(format!("ws://{addr}/ws"), resolver());
    let (tx, mut pongs) = mpsc::unbounded_channel();
    client.on_packet_received(move |_, packet| {
        if let Some(pong) = packet.downcast_ref::<Pong>() {
            let _ = tx.send(pong.seq);
        }
    });
    client.add_connection().await.unwrap();
    assert!(eventually(|| server.connection_count() == 1).await);

    for seq in 0..200 {
        client.send(Packet::new(Ping { seq })).unwrap();
    }
    assert_eq!(collect(&mut pongs, 200).await, (0..200).collect::<Vec<_>>());

    let metrics = http_get(addr, "/metrics").await;
    assert!(metrics.contains("200 OK"));
    assert!(metrics.contains("wsp_packets_total{direction=\"in\"} 200"));
    assert!(metrics.contains("wsp_registry_connections 1"));

    client.close().await;
    assert_eq!(client.connection_count(), 0);
    assert!(eventually(|| server.connection_count() == 0).await);
}

#[tokio::test]
async fn healthz_answers() {
    let (_server, addr) = spawn_server().await;
    let resp = http_get(addr, "/healthz").await;
    assert!(resp.starts_with("HTTP/1.1 200"));
    assert!(resp.ends_with("ok"));
}

#[tokio::test]
async fn dial_failure_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::new(format!("ws://{addr}/ws"), resolver());
    let err = client.add_connection().await.unwrap_err();
    assert_eq!(err.code(), "TRANSPORT");
    assert_eq!(client.connection_count(), 0);
}
