//! rswarm - BitTorrent swarm connection management
//!
//! This library maintains the peer population of a torrent: a bounded
//! pool of TCP connections over which the BitTorrent handshake is
//! exchanged, with queued outbound dials, bounded reconnect backoff, and
//! a shared listening port that routes incoming peers to the right swarm
//! by info hash. It deliberately stops at the handshake: piece transfer,
//! choking, and storage belong to a wire-protocol codec plugged in
//! through the [`wire`] module's traits.
//!
//! # Modules
//!
//! - [`swarm`] - Per-torrent connection management and events
//! - [`pool`] - Shared listening ports and the port registry
//! - [`wire`] - The framer contract and the built-in handshake wire
//! - [`info_hash`] / [`peer_id`] - The 20-byte torrent and client identifiers
//! - [`speed`] - Sliding-window transfer speed estimation
//! - [`addr`] - Peer address validation
//!
//! # Example
//!
//! ```no_run
//! use rswarm::{InfoHash, PeerId, PoolRegistry, Swarm, SwarmEvent, SwarmOptions};
//!
//! # async fn example() -> Result<(), rswarm::SwarmError> {
//! let registry = PoolRegistry::new();
//! let swarm = Swarm::new(
//!     InfoHash::from_hex("c12fe1c06bba254a9dc9f519b335aa7c1367a88a")?,
//!     PeerId::generate(),
//!     SwarmOptions::default(),
//! );
//! let mut events = swarm.subscribe();
//!
//! let port = swarm.listen(&registry, None).await?;
//! println!("listening on {port}");
//!
//! swarm.add("203.0.113.7:6881");
//! while let Ok(event) = events.recv().await {
//!     if let SwarmEvent::Wire { addr, .. } = event {
//!         println!("handshaken with {addr:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod addr;
pub mod constants;
pub mod error;
pub mod info_hash;
pub mod peer_id;
pub mod pool;
pub mod speed;
pub mod swarm;
pub mod wire;

pub use addr::valid_addr;
pub use error::SwarmError;
pub use info_hash::InfoHash;
pub use peer_id::PeerId;
pub use pool::PoolRegistry;
pub use speed::Speedometer;
pub use swarm::{Swarm, SwarmEvent, SwarmOptions};
pub use wire::{
    AttachedWire, Handshake, HandshakeOptions, RemoteHandshake, TcpWire, TcpWireFactory, Wire,
    WireError, WireEvent, WireFactory,
};
