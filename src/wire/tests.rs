use super::*;
use crate::info_hash::InfoHash;
use crate::peer_id::PeerId;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[test]
fn test_handshake_encode_decode() {
    let info_hash = InfoHash::from_bytes([1u8; 20]);
    let peer_id = PeerId::generate();
    let reserved = HandshakeOptions::default().reserved();

    let handshake = Handshake::new(info_hash, peer_id, reserved);
    let encoded = handshake.encode();
    assert_eq!(encoded.len(), HANDSHAKE_LEN);

    let decoded = Handshake::decode(&encoded).unwrap();
    assert_eq!(decoded.info_hash, info_hash);
    assert_eq!(decoded.peer_id, peer_id);
    assert!(decoded.reserved.supports_extension_protocol());
    assert!(decoded.reserved.supports_fast_extension());
    assert!(!decoded.reserved.supports_dht());
}

#[test]
fn test_handshake_decode_rejects_garbage() {
    assert!(Handshake::decode(&[0u8; 10]).is_err());

    let mut bad = Handshake::new(
        InfoHash::from_bytes([0u8; 20]),
        PeerId::generate(),
        Reserved::default(),
    )
    .encode()
    .to_vec();
    bad[1] = b'X';
    assert!(Handshake::decode(&bad).is_err());
}

#[test]
fn test_handshake_options_reserved_bits() {
    let reserved = HandshakeOptions {
        extension_protocol: false,
        fast_extension: false,
        dht: true,
    }
    .reserved();
    assert!(!reserved.supports_extension_protocol());
    assert!(!reserved.supports_fast_extension());
    assert!(reserved.supports_dht());
}

async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (client.unwrap(), accepted.unwrap().0)
}

#[tokio::test]
async fn test_tcp_wire_handshake_exchange() {
    let (client, mut server) = tcp_pair().await;
    let info_hash = InfoHash::from_bytes([0x11; 20]);
    let our_id = PeerId::generate();
    let their_id = PeerId::generate();

    let (wire, mut events) = TcpWire::attach(client);
    wire.handshake(&info_hash, &our_id, &HandshakeOptions::default());

    // The remote end answers with a matching handshake.
    let mut buf = [0u8; HANDSHAKE_LEN];
    server.read_exact(&mut buf).await.unwrap();
    let received = Handshake::decode(&buf).unwrap();
    assert_eq!(received.info_hash, info_hash);
    assert_eq!(received.peer_id, our_id);

    let reply = Handshake::new(info_hash, their_id, Reserved::default());
    server.write_all(&reply.encode()).await.unwrap();

    let remote = recv_handshake(&mut events).await.unwrap();
    assert_eq!(remote.info_hash, info_hash);
    assert_eq!(remote.peer_id, their_id);
}

#[tokio::test]
async fn test_tcp_wire_counts_download_bytes() {
    let (client, mut server) = tcp_pair().await;
    let info_hash = InfoHash::from_bytes([0x22; 20]);

    let (_wire, mut events) = TcpWire::attach(client);

    let handshake = Handshake::new(info_hash, PeerId::generate(), Reserved::default());
    server.write_all(&handshake.encode()).await.unwrap();
    server.write_all(&[0u8; 1000]).await.unwrap();

    recv_handshake(&mut events).await.unwrap();

    let mut total = 0u64;
    while total < 1000 {
        match events.recv().await.unwrap() {
            WireEvent::Download(n) => total += n,
            event => panic!("unexpected event: {event:?}"),
        }
    }
    assert_eq!(total, 1000);
}

#[tokio::test]
async fn test_tcp_wire_counts_upload_bytes() {
    let (client, mut server) = tcp_pair().await;

    let (wire, mut events) = TcpWire::attach(client);
    wire.send(bytes::Bytes::from_static(&[7u8; 512]));

    let mut buf = vec![0u8; 512];
    server.read_exact(&mut buf).await.unwrap();

    match events.recv().await.unwrap() {
        WireEvent::Upload(n) => assert_eq!(n, 512),
        event => panic!("unexpected event: {event:?}"),
    }
}

#[tokio::test]
async fn test_tcp_wire_end_then_close_on_remote_fin() {
    let (client, server) = tcp_pair().await;

    let (_wire, mut events) = TcpWire::attach(client);
    drop(server);

    assert!(matches!(events.recv().await, Some(WireEvent::End)));
    assert!(matches!(events.recv().await, Some(WireEvent::Close)));
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_tcp_wire_destroy_emits_single_close() {
    let (client, _server) = tcp_pair().await;

    let (wire, mut events) = TcpWire::attach(client);
    wire.destroy();
    wire.destroy();

    assert!(matches!(events.recv().await, Some(WireEvent::Close)));
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_tcp_wire_sends_handshake_once() {
    let (client, mut server) = tcp_pair().await;
    let info_hash = InfoHash::from_bytes([0x33; 20]);
    let our_id = PeerId::generate();

    let (wire, _events) = TcpWire::attach(client);
    wire.handshake(&info_hash, &our_id, &HandshakeOptions::default());
    wire.handshake(&info_hash, &our_id, &HandshakeOptions::default());
    wire.finish();

    let mut received = Vec::new();
    server.read_to_end(&mut received).await.unwrap();
    assert_eq!(received.len(), HANDSHAKE_LEN);
}
