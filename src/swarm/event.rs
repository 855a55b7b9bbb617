use std::fmt;
use std::sync::Arc;

use crate::error::SwarmError;
use crate::wire::Wire;

/// Events a swarm broadcasts to subscribers.
#[derive(Clone)]
pub enum SwarmEvent {
    /// The swarm's listening port is bound. Delivered once, before any
    /// [`SwarmEvent::Wire`] for this swarm.
    Listening(u16),
    /// A peer completed the handshake and its wire is now active. `addr`
    /// is absent for adopted wires without a known address.
    Wire {
        /// Handle to the active wire.
        wire: Arc<dyn Wire>,
        /// The peer's `host:port`, when known.
        addr: Option<String>,
    },
    /// Bytes received across any wire of this swarm.
    Download(u64),
    /// Bytes sent across any wire of this swarm.
    Upload(u64),
    /// A non-fatal error; the swarm stays operable.
    Error(SwarmError),
    /// The swarm is destroyed. Delivered exactly once, last.
    Close,
}

impl fmt::Debug for SwarmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmEvent::Listening(port) => write!(f, "Listening({port})"),
            SwarmEvent::Wire { addr, .. } => write!(f, "Wire({addr:?})"),
            SwarmEvent::Download(n) => write!(f, "Download({n})"),
            SwarmEvent::Upload(n) => write!(f, "Upload({n})"),
            SwarmEvent::Error(err) => write!(f, "Error({err})"),
            SwarmEvent::Close => write!(f, "Close"),
        }
    }
}
