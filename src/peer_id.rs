//! Local and remote peer identifiers.

use std::fmt;

use rand::Rng as _;

use crate::constants::CLIENT_PREFIX;

/// A 20-byte peer ID.
///
/// Generated IDs use the Azureus convention: a dash-delimited client
/// prefix followed by random bytes. IDs received from remote peers are
/// opaque.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    /// Generates a fresh peer ID with this client's prefix.
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        id[..8].copy_from_slice(CLIENT_PREFIX.as_bytes());
        rand::rng().fill(&mut id[8..]);
        Self(id)
    }

    /// Creates a peer ID from a 20-byte slice, or `None` if the length is
    /// wrong.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 20 {
            return None;
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(bytes);
        Some(Self(id))
    }

    /// Creates a peer ID from a textual form whose UTF-8 encoding is
    /// exactly 20 bytes.
    pub fn from_text(s: &str) -> Option<Self> {
        Self::from_bytes(s.as_bytes())
    }

    /// Returns the raw bytes of the peer ID.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Extracts the Azureus-style client identifier, if present.
    pub fn client_id(&self) -> Option<&str> {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            std::str::from_utf8(&self.0[1..7]).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(client) = self.client_id() {
            write!(f, "PeerId({})", client)
        } else {
            write!(f, "PeerId({:02x?})", &self.0[..8])
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            if byte.is_ascii_alphanumeric() || *byte == b'-' {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "%{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

impl From<[u8; 20]> for PeerId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate() {
        let id1 = PeerId::generate();
        let id2 = PeerId::generate();
        assert_ne!(id1.0, id2.0);
        assert_eq!(id1.client_id(), Some("RS0001"));
    }

    #[test]
    fn test_from_text() {
        let id = PeerId::from_text("-XX0001-aaaaaaaaaaaa").unwrap();
        assert_eq!(id.client_id(), Some("XX0001"));
        assert!(PeerId::from_text("too short").is_none());
    }

    #[test]
    fn test_from_bytes_length() {
        assert!(PeerId::from_bytes(&[1u8; 20]).is_some());
        assert!(PeerId::from_bytes(&[1u8; 21]).is_none());
    }
}
