use bytes::{BufMut, Bytes, BytesMut};

use super::error::WireError;
use crate::info_hash::InfoHash;
use crate::peer_id::PeerId;

/// The BitTorrent protocol identifier.
pub const PROTOCOL: &[u8] = b"BitTorrent protocol";
/// Length of the handshake message in bytes.
pub const HANDSHAKE_LEN: usize = 68;

/// The reserved bytes of a handshake, carrying capability flags.
///
/// - Byte 5, bit 4: Extension protocol ([BEP-10])
/// - Byte 7, bit 0: DHT ([BEP-5])
/// - Byte 7, bit 2: Fast extension ([BEP-6])
///
/// [BEP-5]: http://bittorrent.org/beps/bep_0005.html
/// [BEP-6]: http://bittorrent.org/beps/bep_0006.html
/// [BEP-10]: http://bittorrent.org/beps/bep_0010.html
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reserved(pub [u8; 8]);

impl Reserved {
    /// Returns `true` if the peer supports the extension protocol (BEP-10).
    pub fn supports_extension_protocol(&self) -> bool {
        (self.0[5] & 0x10) != 0
    }

    /// Returns `true` if the peer supports the fast extension (BEP-6).
    pub fn supports_fast_extension(&self) -> bool {
        (self.0[7] & 0x04) != 0
    }

    /// Returns `true` if the peer supports DHT (BEP-5).
    pub fn supports_dht(&self) -> bool {
        (self.0[7] & 0x01) != 0
    }
}

/// The BitTorrent handshake message.
///
/// The first message exchanged on every wire: protocol identifier,
/// reserved capability bytes, the torrent's info hash, and the sender's
/// peer ID. The info hash field is what the pool routes incoming
/// connections by.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// The torrent's info hash.
    pub info_hash: InfoHash,
    /// The sender's peer ID.
    pub peer_id: PeerId,
    /// Reserved bytes for protocol extensions.
    pub reserved: Reserved,
}

impl Handshake {
    /// Creates a handshake carrying the given capability flags.
    pub fn new(info_hash: InfoHash, peer_id: PeerId, reserved: Reserved) -> Self {
        Self {
            info_hash,
            peer_id,
            reserved,
        }
    }

    /// Encodes the handshake to bytes for transmission.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&self.reserved.0);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(self.peer_id.as_bytes());
        buf.freeze()
    }

    /// Decodes a handshake from exactly [`HANDSHAKE_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidHandshake`] on a length or protocol
    /// string mismatch.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() != HANDSHAKE_LEN {
            return Err(WireError::InvalidHandshake);
        }
        if data[0] as usize != PROTOCOL.len() || &data[1..20] != PROTOCOL {
            return Err(WireError::InvalidHandshake);
        }
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);
        Ok(Self {
            info_hash: InfoHash(info_hash),
            peer_id: PeerId(peer_id),
            reserved: Reserved(reserved),
        })
    }
}
