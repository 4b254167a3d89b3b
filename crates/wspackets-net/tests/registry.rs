#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use wspackets_core::{Packet, WspError};
use wspackets_net::transport::MemoryTransport;
use wspackets_net::{Client, Server};

use common::{collect, eventually, resolver, Ping, Pong};

fn echo_server() -> Server {
    let server = Server::new(resolver());
    server.on_packet_received(|conn, packet| {
        if let Some(ping) = packet.downcast_ref::<Ping>() {
            conn.send(Packet::new(Pong { seq: ping.seq })).unwrap();
        }
    });
    server
}

#[tokio::test]
async fn thousand_pings_get_thousand_ordered_pongs() {
    let server = echo_server();
    let client = Client::new("ws://in-memory", resolver());
    let (tx, mut pongs) = mpsc::unbounded_channel();
    client.on_packet_received(move |_, packet| {
        if let Some(pong) = packet.downcast_ref::<Pong>() {
            let _ = tx.send(pong.seq);
        }
    });

    let (a, b) = MemoryTransport::pair();
    server.add_transport(Arc::new(a)).unwrap();
    client.add_transport(Arc::new(b)).unwrap();
    assert_eq!(server.connection_count(), 1);
    assert_eq!(client.connection_count(), 1);

    for seq in 0..1000 {
        client.send(Packet::new(Ping { seq })).unwrap();
    }
    let got = collect(&mut pongs, 1000).await;
    assert_eq!(got, (0..1000).collect::<Vec<_>>());

    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn closing_the_best_connection_falls_back_to_the_rest() {
    let server = Server::new(resolver());
    let lost = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&lost);
    server.on_connection_lost(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // the peer ends must outlive the test or the connections close
    let mut peers = Vec::new();
    for _ in 0..3 {
        let (a, b) = MemoryTransport::pair();
        server.add_transport(Arc::new(a)).unwrap();
        peers.push(b);
    }
    assert_eq!(server.connection_count(), 3);

    let best = server.best_connection().unwrap();
    best.close().await;
    assert_eq!(server.connection_count(), 2);
    assert_eq!(lost.load(Ordering::SeqCst), 1);

    // the stale handle itself refuses, the registry does not
    assert!(matches!(best.send(Packet::new(Ping { seq: 0 })), Err(WspError::ConnectionClosed)));
    server.send(Packet::new(Ping { seq: 1 })).unwrap();

    for conn in server.connections() {
        conn.close().await;
    }
    assert_eq!(server.connection_count(), 0);
    assert_eq!(lost.load(Ordering::SeqCst), 3);
    let err = server.send(Packet::new(Ping { seq: 2 })).unwrap_err();
    assert!(matches!(err, WspError::NoConnection));
    drop(peers);
}

#[tokio::test]
async fn peer_going_away_removes_the_connection() {
    let server = Server::new(resolver());
    let lost = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&lost);
    server.on_connection_lost(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (a, b) = MemoryTransport::pair();
    let conn = server.add_transport(Arc::new(a)).unwrap();
    drop(b);

    conn.wait_for_close().await;
    assert!(eventually(|| server.connection_count() == 0).await);
    assert_eq!(lost.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn broadcast_reaches_every_connection() {
    let server = Server::new(resolver());
    let client = Client::new("ws://in-memory", resolver());
    let (tx, mut pings) = mpsc::unbounded_channel();
    client.on_packet_received(move |conn, packet| {
        if packet.is::<Ping>() {
            let _ = tx.send(conn.id());
        }
    });

    for _ in 0..3 {
        let (a, b) = MemoryTransport::pair();
        server.add_transport(Arc::new(a)).unwrap();
        client.add_transport(Arc::new(b)).unwrap();
    }

    assert_eq!(server.broadcast(Packet::new(Ping { seq: 9 })), 3);
    let mut ids = collect(&mut pings, 3).await;
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    server.close().await;
    client.close().await;
}

#[tokio::test]
async fn closed_endpoint_refuses_new_connections() {
    let client = Client::new("ws://127.0.0.1:9/ws", resolver());
    let (a, _b) = MemoryTransport::pair();
    client.add_transport(Arc::new(a)).unwrap();

    client.close().await;
    assert_eq!(client.connection_count(), 0);

    let (c, _d) = MemoryTransport::pair();
    assert!(matches!(client.add_transport(Arc::new(c)), Err(WspError::Shutdown)));
    assert!(matches!(client.add_connection().await, Err(WspError::Shutdown)));
}

#[tokio::test]
async fn reconnect_from_lost_observer_is_refused_during_close() {
    let server = Server::new(resolver());
    let outcomes = Arc::new(std::sync::Mutex::new(Vec::new()));
    let peers = Arc::new(std::sync::Mutex::new(Vec::new()));
    {
        let reconnect = server.clone();
        let outcomes = Arc::clone(&outcomes);
        let peers = Arc::clone(&peers);
        server.on_connection_lost(move |_| {
            let (a, b) = MemoryTransport::pair();
            peers.lock().unwrap().push(b);
            let outcome = reconnect.add_transport(Arc::new(a));
            outcomes.lock().unwrap().push(outcome);
        });
    }

    let mut initial = Vec::new();
    for _ in 0..2 {
        let (a, b) = MemoryTransport::pair();
        server.add_transport(Arc::new(a)).unwrap();
        initial.push(b);
    }

    server.close().await;

    assert_eq!(server.connection_count(), 0);
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 2);
    for outcome in outcomes.iter() {
        assert!(matches!(outcome, Err(WspError::Shutdown)), "{outcome:?}");
    }
}
