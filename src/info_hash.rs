//! Torrent info hashes.

use std::fmt;

use crate::error::SwarmError;

/// A BitTorrent info hash (20-byte SHA1).
///
/// The info hash identifies a torrent across the network and is the key
/// a listening pool routes incoming handshakes by. Equality and hashing
/// are by byte value; the textual form is lowercase hex.
///
/// # Examples
///
/// ```
/// use rswarm::InfoHash;
///
/// let hash = InfoHash::from_hex("c12fe1c06bba254a9dc9f519b335aa7c1367a88a").unwrap();
/// assert_eq!(hash.as_bytes().len(), 20);
/// println!("{}", hash); // 40-character lowercase hex
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    /// Creates an info hash from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an info hash from a 20-byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`SwarmError::InvalidInfoHash`] if the slice is not exactly
    /// 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SwarmError> {
        if bytes.len() != 20 {
            return Err(SwarmError::InvalidInfoHash);
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Creates an info hash by hashing info dictionary bytes.
    pub fn from_info_bytes(info_bytes: &[u8]) -> Self {
        use sha1::{Digest, Sha1};
        let mut hasher = Sha1::new();
        hasher.update(info_bytes);
        let hash: [u8; 20] = hasher.finalize().into();
        Self(hash)
    }

    /// Parses an info hash from a 40-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`SwarmError::InvalidInfoHash`] if the string is not
    /// 40 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, SwarmError> {
        if s.len() != 40 {
            return Err(SwarmError::InvalidInfoHash);
        }
        let bytes = hex_decode(s).ok_or(SwarmError::InvalidInfoHash)?;
        Self::from_slice(&bytes)
    }

    /// Returns the raw bytes of the info hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Converts to a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

pub(crate) fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
