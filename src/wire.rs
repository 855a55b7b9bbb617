//! Wire adapter: the seam between the swarm core and a peer-protocol
//! codec.
//!
//! The swarm manager does not speak the full peer wire protocol. It needs
//! exactly three things from a framer: a way to send its handshake, a
//! stream of events (the remote handshake, byte counts, termination), and
//! forced teardown. The [`Wire`] trait captures that contract;
//! [`WireFactory`] attaches a framer to a freshly connected TCP stream.
//!
//! [`TcpWire`] is the built-in implementation: it frames the 68-byte
//! BitTorrent handshake and reports raw byte counts for everything after
//! it, which is all the swarm core observes. A full message codec plugs
//! in by implementing [`Wire`] itself.

mod adapter;
mod error;
mod handshake;
mod tcp;

pub use adapter::{
    recv_handshake, AttachedWire, HandshakeOptions, RemoteHandshake, Wire, WireEvent, WireFactory,
};
pub use error::WireError;
pub use handshake::{Handshake, Reserved, HANDSHAKE_LEN, PROTOCOL};
pub use tcp::{TcpWire, TcpWireFactory};

#[cfg(test)]
mod tests;
