use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::error::WireError;
use super::handshake::Reserved;
use crate::info_hash::InfoHash;
use crate::peer_id::PeerId;

/// Capability flags advertised in our half of the handshake.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeOptions {
    /// Advertise the extension protocol (BEP-10).
    pub extension_protocol: bool,
    /// Advertise the fast extension (BEP-6).
    pub fast_extension: bool,
    /// Advertise DHT support (BEP-5).
    pub dht: bool,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            extension_protocol: true,
            fast_extension: true,
            dht: false,
        }
    }
}

impl HandshakeOptions {
    /// Renders the flags into handshake reserved bytes.
    pub fn reserved(&self) -> Reserved {
        let mut bytes = [0u8; 8];
        if self.extension_protocol {
            bytes[5] |= 0x10;
        }
        if self.fast_extension {
            bytes[7] |= 0x04;
        }
        if self.dht {
            bytes[7] |= 0x01;
        }
        Reserved(bytes)
    }
}

/// The remote side of a completed handshake.
#[derive(Debug, Clone, Copy)]
pub struct RemoteHandshake {
    /// Info hash the remote peer handshook with.
    pub info_hash: InfoHash,
    /// The remote peer's ID.
    pub peer_id: PeerId,
    /// The remote peer's capability flags.
    pub reserved: Reserved,
}

/// Events a wire delivers to its owner.
#[derive(Debug)]
pub enum WireEvent {
    /// The remote handshake arrived. Fired at most once.
    Handshake(RemoteHandshake),
    /// Bytes received from the peer since the last event.
    Download(u64),
    /// Bytes written to the peer since the last event.
    Upload(u64),
    /// The read side ended (remote FIN).
    End,
    /// The write side finished.
    Finish,
    /// The wire failed.
    Error(WireError),
    /// The wire is fully torn down. Always the last event.
    Close,
}

impl WireEvent {
    /// Returns `true` for events after which no handshake can arrive.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WireEvent::End | WireEvent::Finish | WireEvent::Error(_) | WireEvent::Close
        )
    }
}

/// Contract the swarm core expects from a peer-protocol framer.
///
/// Both calls are fire-and-forget: a wire runs its own pump tasks and
/// reports everything through its event stream.
pub trait Wire: Send + Sync {
    /// Sends our handshake. A wire sends at most one handshake; repeat
    /// calls are ignored.
    fn handshake(&self, info_hash: &InfoHash, peer_id: &PeerId, opts: &HandshakeOptions);

    /// Forces termination. Must cause a final [`WireEvent::Close`].
    fn destroy(&self);
}

/// A wire together with the receiving end of its event stream.
pub struct AttachedWire {
    /// Shared handle to the wire.
    pub wire: Arc<dyn Wire>,
    /// The wire's event stream. Exactly one consumer.
    pub events: mpsc::UnboundedReceiver<WireEvent>,
}

/// Attaches a framer to a connected TCP stream.
pub trait WireFactory: Send + Sync {
    /// Wraps `stream` in a wire and returns it with its event stream.
    fn attach(&self, stream: TcpStream) -> AttachedWire;
}

/// Waits for the remote handshake on a freshly attached wire.
///
/// Pre-handshake byte counts are ignored. Returns `None` if the wire
/// terminates before a handshake arrives.
pub async fn recv_handshake(
    events: &mut mpsc::UnboundedReceiver<WireEvent>,
) -> Option<RemoteHandshake> {
    while let Some(event) = events.recv().await {
        match event {
            WireEvent::Handshake(remote) => return Some(remote),
            event if event.is_terminal() => return None,
            _ => {}
        }
    }
    None
}
