//! Swarm-level errors.

use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by a swarm or its listening pool.
///
/// The type is `Clone` so the same error can be delivered both to the
/// caller and to event subscribers; I/O causes are wrapped in [`Arc`]
/// for that reason.
#[derive(Debug, Clone, Error)]
pub enum SwarmError {
    /// The swarm has been destroyed.
    #[error("swarm destroyed")]
    Destroyed,

    /// An info hash was not 20 bytes (or 40 hex characters).
    #[error("invalid info hash length")]
    InvalidInfoHash,

    /// The swarm is already bound to a listening port.
    #[error("swarm already listening on port {0}")]
    AlreadyListening(u16),

    /// Another swarm with the same info hash is registered on this port.
    #[error("duplicate swarm for info hash {info_hash} on port {port}")]
    DuplicateSwarm {
        /// Lowercase hex info hash of the colliding swarm.
        info_hash: String,
        /// The contested listening port.
        port: u16,
    },

    /// Binding the listening port failed after all retries.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// The port that could not be bound.
        port: u16,
        /// The final bind error.
        source: Arc<std::io::Error>,
    },

    /// The ephemeral-port picker found no free port.
    #[error("no free ephemeral port")]
    NoAvailablePort,

    /// Network I/O error.
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for SwarmError {
    fn from(err: std::io::Error) -> Self {
        SwarmError::Io(Arc::new(err))
    }
}
