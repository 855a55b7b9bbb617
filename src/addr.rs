//! Peer address parsing.
//!
//! Swarm peers are addressed as `host:port` strings. Only the port is
//! validated here; a bogus host surfaces later through the connect path.

/// Splits a `host:port` address into its parts.
///
/// The split is on the last colon so bracketed IPv6 hosts pass through
/// unharmed. Returns `None` if there is no colon, the host is empty, or
/// the port is not in `1..=65534`.
pub fn split_host_port(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    let port: u32 = port.parse().ok()?;
    if port == 0 || port >= 65535 {
        return None;
    }
    Some((host, port as u16))
}

/// Returns `true` if `addr` is a dialable `host:port` string.
pub fn valid_addr(addr: &str) -> bool {
    split_host_port(addr).is_some()
}
