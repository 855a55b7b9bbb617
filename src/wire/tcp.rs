use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

use super::adapter::{
    AttachedWire, HandshakeOptions, RemoteHandshake, Wire, WireEvent, WireFactory,
};
use super::error::WireError;
use super::handshake::{Handshake, HANDSHAKE_LEN};
use crate::constants::WIRE_READ_BUF_CAPACITY;
use crate::info_hash::InfoHash;
use crate::peer_id::PeerId;

enum Cmd {
    Write { data: Bytes, count: bool },
    Finish,
}

/// Factory producing [`TcpWire`]s; the default of `SwarmOptions`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpWireFactory;

impl WireFactory for TcpWireFactory {
    fn attach(&self, stream: TcpStream) -> AttachedWire {
        let (wire, events) = TcpWire::attach(stream);
        AttachedWire { wire, events }
    }
}

/// The built-in wire over a TCP stream.
///
/// Frames the 68-byte handshake in both directions and reports raw byte
/// counts for everything after it. Payload queued through [`send`] is
/// counted as upload once written; the handshake itself is protocol
/// overhead and is not counted.
///
/// [`send`]: TcpWire::send
pub struct TcpWire {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    event_tx: mpsc::UnboundedSender<WireEvent>,
    handshake_sent: AtomicBool,
    closed: AtomicBool,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl TcpWire {
    /// Attaches a wire to `stream`, spawning its read and write pumps.
    pub fn attach(stream: TcpStream) -> (Arc<TcpWire>, mpsc::UnboundedReceiver<WireEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let wire = Arc::new(TcpWire {
            cmd_tx,
            event_tx,
            handshake_sent: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::with_capacity(2)),
        });

        let (read_half, write_half) = stream.into_split();
        let reader = tokio::spawn(read_pump(wire.clone(), read_half));
        let writer = tokio::spawn(write_pump(wire.clone(), write_half, cmd_rx));
        wire.tasks
            .lock()
            .extend([reader.abort_handle(), writer.abort_handle()]);

        (wire, event_rx)
    }

    /// Queues raw payload bytes for the peer.
    pub fn send(&self, data: Bytes) {
        let _ = self.cmd_tx.send(Cmd::Write { data, count: true });
    }

    /// Ends the write side after any queued data, leaving reads open.
    pub fn finish(&self) {
        let _ = self.cmd_tx.send(Cmd::Finish);
    }

    fn emit(&self, event: WireEvent) {
        if !self.closed.load(Ordering::SeqCst) {
            let _ = self.event_tx.send(event);
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.event_tx.send(WireEvent::Close);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Wire for TcpWire {
    fn handshake(&self, info_hash: &InfoHash, peer_id: &PeerId, opts: &HandshakeOptions) {
        if self.handshake_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        let handshake = Handshake::new(*info_hash, *peer_id, opts.reserved());
        let _ = self.cmd_tx.send(Cmd::Write {
            data: handshake.encode(),
            count: false,
        });
    }

    fn destroy(&self) {
        self.shutdown();
    }
}

async fn read_pump(wire: Arc<TcpWire>, mut stream: OwnedReadHalf) {
    let mut buf = BytesMut::with_capacity(WIRE_READ_BUF_CAPACITY);

    while buf.len() < HANDSHAKE_LEN {
        match stream.read_buf(&mut buf).await {
            Ok(0) => {
                wire.emit(WireEvent::End);
                wire.shutdown();
                return;
            }
            Ok(_) => {}
            Err(err) => {
                wire.emit(WireEvent::Error(WireError::Io(err)));
                wire.shutdown();
                return;
            }
        }
    }

    let head = buf.split_to(HANDSHAKE_LEN);
    match Handshake::decode(&head) {
        Ok(handshake) => {
            trace!(info_hash = %handshake.info_hash, "received handshake");
            wire.emit(WireEvent::Handshake(RemoteHandshake {
                info_hash: handshake.info_hash,
                peer_id: handshake.peer_id,
                reserved: handshake.reserved,
            }));
        }
        Err(err) => {
            wire.emit(WireEvent::Error(err));
            wire.shutdown();
            return;
        }
    }

    // Bytes that arrived piggybacked on the handshake read.
    if !buf.is_empty() {
        wire.emit(WireEvent::Download(buf.len() as u64));
    }

    loop {
        buf.clear();
        match stream.read_buf(&mut buf).await {
            Ok(0) => {
                wire.emit(WireEvent::End);
                break;
            }
            Ok(n) => wire.emit(WireEvent::Download(n as u64)),
            Err(err) => {
                wire.emit(WireEvent::Error(WireError::Io(err)));
                break;
            }
        }
    }
    wire.shutdown();
}

async fn write_pump(
    wire: Arc<TcpWire>,
    mut stream: OwnedWriteHalf,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Cmd::Write { data, count } => match stream.write_all(&data).await {
                Ok(()) => {
                    if count {
                        wire.emit(WireEvent::Upload(data.len() as u64));
                    }
                }
                Err(err) => {
                    wire.emit(WireEvent::Error(WireError::Io(err)));
                    wire.shutdown();
                    return;
                }
            },
            Cmd::Finish => break,
        }
    }
    let _ = stream.shutdown().await;
    wire.emit(WireEvent::Finish);
}
