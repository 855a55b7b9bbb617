//! Swarms: per-torrent connection management.
//!
//! A [`Swarm`] owns every peer for one torrent. Peers added by address
//! wait in a FIFO queue and are dialed while the swarm is under its
//! connection cap; incoming connections arrive through the listening
//! pool once their handshake names this swarm's info hash. Either way a
//! peer becomes "active" only after the handshake round-trip, at which
//! point its wire is announced via [`SwarmEvent::Wire`].
//!
//! Peers that lose their wire are re-dialed on a bounded backoff
//! schedule; exhausting it removes the peer. All teardown paths converge
//! on one idempotent per-peer destruction routine, so sockets, framers,
//! and timers never outlive their peer.

mod event;
mod manager;
mod peer;

pub use event::SwarmEvent;
pub use manager::{Swarm, SwarmOptions};
