use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use crate::error::SwarmError;
use crate::info_hash::InfoHash;
use crate::peer_id::PeerId;
use crate::pool::PoolRegistry;
use crate::swarm::{Swarm, SwarmEvent, SwarmOptions};
use crate::wire::{Handshake, Reserved, HANDSHAKE_LEN};

fn swarm_for(byte: u8) -> Arc<Swarm> {
    Swarm::new(
        InfoHash::from_bytes([byte; 20]),
        PeerId::generate(),
        SwarmOptions::default(),
    )
}

/// Connects to the pool and speaks a handshake for `info_hash`.
async fn handshake_as(port: u16, info_hash: InfoHash) -> TcpStream {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let handshake = Handshake::new(info_hash, PeerId::generate(), Reserved::default());
    stream.write_all(&handshake.encode()).await.unwrap();
    stream
}

async fn expect_wire(events: &mut broadcast::Receiver<SwarmEvent>) {
    loop {
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("no wire event")
            .unwrap();
        if matches!(event, SwarmEvent::Wire { .. }) {
            return;
        }
    }
}

#[tokio::test]
async fn test_ephemeral_listens_use_distinct_ports() {
    let registry = PoolRegistry::new();
    let first = swarm_for(0x01);
    let second = swarm_for(0x02);

    let port_a = first.listen(&registry, None).await.unwrap();
    let port_b = second.listen(&registry, None).await.unwrap();
    assert_ne!(port_a, 0);
    assert_ne!(port_a, port_b);
    assert_eq!(registry.num_pools().await, 2);

    first.destroy();
    second.destroy();
}

#[tokio::test]
async fn test_incoming_demux_routes_by_info_hash() {
    let registry = PoolRegistry::new();
    let swarm_a = swarm_for(0xaa);
    let swarm_b = swarm_for(0xbb);
    let mut events_a = swarm_a.subscribe();
    let mut events_b = swarm_b.subscribe();

    let port = swarm_a.listen(&registry, None).await.unwrap();
    assert_eq!(swarm_b.listen(&registry, Some(port)).await.unwrap(), port);
    assert_eq!(registry.num_pools().await, 1);

    let mut conn_a = handshake_as(port, *swarm_a.info_hash()).await;
    let mut conn_b = handshake_as(port, *swarm_b.info_hash()).await;

    // Each connection lands on its swarm, which answers the handshake.
    let mut buf = [0u8; HANDSHAKE_LEN];
    conn_a.read_exact(&mut buf).await.unwrap();
    assert_eq!(
        Handshake::decode(&buf).unwrap().info_hash,
        *swarm_a.info_hash()
    );
    conn_b.read_exact(&mut buf).await.unwrap();
    assert_eq!(
        Handshake::decode(&buf).unwrap().info_hash,
        *swarm_b.info_hash()
    );

    expect_wire(&mut events_a).await;
    expect_wire(&mut events_b).await;
    assert_eq!(swarm_a.num_peers(), 1);
    assert_eq!(swarm_b.num_peers(), 1);

    swarm_a.destroy();
    swarm_b.destroy();
}

#[tokio::test]
async fn test_unknown_info_hash_is_destroyed() {
    let registry = PoolRegistry::new();
    let swarm = swarm_for(0xaa);
    let mut events = swarm.subscribe();
    let port = swarm.listen(&registry, None).await.unwrap();

    let mut conn = handshake_as(port, InfoHash::from_bytes([0xcc; 20])).await;

    // The pool hangs up without answering.
    let mut buf = [0u8; 1];
    let res = timeout(Duration::from_secs(2), conn.read(&mut buf))
        .await
        .expect("connection not closed");
    assert!(matches!(res, Ok(0) | Err(_)));

    assert_eq!(swarm.num_peers(), 0);
    // The listening event is all the swarm ever saw.
    let event = events.try_recv().unwrap();
    assert!(matches!(event, SwarmEvent::Listening(_)));
    assert!(events.try_recv().is_err());

    swarm.destroy();
}

#[tokio::test]
async fn test_duplicate_swarm_rejected_incumbent_unaffected() {
    let registry = PoolRegistry::new();
    let first = swarm_for(0xdd);
    let second = swarm_for(0xdd);
    let mut first_events = first.subscribe();
    let mut second_events = second.subscribe();

    let port = first.listen(&registry, None).await.unwrap();
    let err = second.listen(&registry, Some(port)).await.unwrap_err();
    assert!(matches!(err, SwarmError::DuplicateSwarm { .. }));
    match timeout(Duration::from_secs(1), second_events.recv())
        .await
        .unwrap()
        .unwrap()
    {
        SwarmEvent::Error(SwarmError::DuplicateSwarm { port: p, .. }) => assert_eq!(p, port),
        event => panic!("unexpected event: {event:?}"),
    }

    // The incumbent still accepts and routes connections.
    let _conn = handshake_as(port, *first.info_hash()).await;
    expect_wire(&mut first_events).await;
    assert_eq!(first.num_peers(), 1);

    // Removing the last swarm closes the listener.
    first.destroy();
    timeout(Duration::from_secs(2), async {
        while registry.num_pools().await != 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pool not deregistered");
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());

    second.destroy();
}

#[tokio::test]
async fn test_listen_twice_fails() {
    let registry = PoolRegistry::new();
    let swarm = swarm_for(0xee);
    let port = swarm.listen(&registry, None).await.unwrap();
    assert!(matches!(
        swarm.listen(&registry, None).await,
        Err(SwarmError::AlreadyListening(p)) if p == port
    ));
    swarm.destroy();
}

#[tokio::test]
async fn test_incoming_handshake_timeout_closes_connection() {
    let registry = PoolRegistry::new();
    let swarm = swarm_for(0xab);
    let port = swarm.listen(&registry, None).await.unwrap();

    // Connect but never speak; the pool gives up after its deadline.
    let mut conn = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut buf = [0u8; 1];
    let res = timeout(Duration::from_secs(7), conn.read(&mut buf))
        .await
        .expect("connection not closed after handshake deadline");
    assert!(matches!(res, Ok(0) | Err(_)));
    assert_eq!(swarm.num_peers(), 0);

    swarm.destroy();
}
