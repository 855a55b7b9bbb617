use std::sync::Arc;

use tokio::task::AbortHandle;

use crate::wire::Wire;

/// Lifecycle of a peer within its swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Waiting in the dial queue.
    Queued,
    /// Outbound connect in flight.
    Dialing,
    /// Transport up, handshake not yet complete.
    Connected,
    /// Handshake complete; the wire is in the swarm's wire list.
    Active,
    /// Waiting out a reconnect delay.
    Backoff,
}

/// Per-peer record, keyed by address (or an opaque id for adopted wires)
/// in the swarm's peer table.
///
/// There is no destroyed flag: removal from the table is the one-way
/// destruction marker, and event handlers that no longer find their key
/// become no-ops.
pub struct Peer {
    /// Dialable address, if the peer has one. Adopted wires without an
    /// address are never re-dialed.
    pub addr: Option<String>,
    pub state: PeerState,
    /// Reconnect attempts consumed from the backoff schedule.
    pub retries: usize,
    /// Whether our handshake went out on the current connection.
    pub sent_handshake: bool,
    /// The attached framer, once a transport exists.
    pub wire: Option<Arc<dyn Wire>>,
    /// Abort handle of the peer's lifecycle task.
    pub task: Option<AbortHandle>,
}

impl Peer {
    /// A peer waiting for an outbound dial.
    pub fn queued(addr: String) -> Self {
        Self {
            addr: Some(addr),
            state: PeerState::Queued,
            retries: 0,
            sent_handshake: false,
            wire: None,
            task: None,
        }
    }

    /// A peer constructed already-connected (incoming or external
    /// transport).
    pub fn connected(addr: Option<String>, wire: Arc<dyn Wire>) -> Self {
        Self {
            addr,
            state: PeerState::Connected,
            retries: 0,
            sent_handshake: false,
            wire: Some(wire),
            task: None,
        }
    }

    /// `true` while the peer holds a live transport.
    pub fn has_conn(&self) -> bool {
        matches!(
            self.state,
            PeerState::Dialing | PeerState::Connected | PeerState::Active
        )
    }
}
