use thiserror::Error;

/// Errors reported by a wire.
#[derive(Debug, Error)]
pub enum WireError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent an invalid handshake.
    #[error("invalid handshake")]
    InvalidHandshake,
}
