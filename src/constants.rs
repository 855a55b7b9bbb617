//! Tuning parameters for the swarm manager.
//!
//! Connection caps, handshake deadlines, and the reconnect schedule follow
//! the defaults of mainstream clients; the per-swarm connection cap can be
//! overridden through `SwarmOptions`.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &str = "-RS0001-";

// ============================================================================
// Connection limits
// ============================================================================

/// Maximum simultaneous connections per swarm. Counts every peer with a
/// live transport, whether it is still dialing, mid-handshake, or active.
pub const MAX_CONNS: usize = 100;

// ============================================================================
// Handshake deadlines
// ============================================================================

/// How long an outbound peer gets to answer our handshake, measured from
/// dial completion.
pub const HANDSHAKE_TIMEOUT_OUT: Duration = Duration::from_secs(25);

/// How long an incoming connection gets to speak its handshake, measured
/// from accept. Incoming peers connected to us first, so they must show
/// intent quickly.
pub const HANDSHAKE_TIMEOUT_IN: Duration = Duration::from_secs(5);

// ============================================================================
// Reconnect backoff
// ============================================================================

/// Delays between successive reconnect attempts for a peer that lost its
/// wire. The schedule is terminal: a peer that exhausts it is removed.
pub const RECONNECT_BACKOFF: &[Duration] = &[
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(15),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(120),
    Duration::from_secs(300),
    Duration::from_secs(600),
];

// ============================================================================
// Listener binding
// ============================================================================

/// Bind attempts on `EADDRINUSE` before the pool gives up.
pub const BIND_RETRIES: u32 = 5;

/// Delay between bind attempts.
pub const BIND_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Lowest port the ephemeral-port picker will hand out.
pub const EPHEMERAL_PORT_MIN: u16 = 1025;

/// Upper bound (exclusive) for the randomized ephemeral base port.
pub const EPHEMERAL_PORT_MAX: u16 = 61025;

/// How many consecutive ports the picker probes before giving up.
pub const EPHEMERAL_PORT_PROBES: u16 = 64;

// ============================================================================
// Channels and buffers
// ============================================================================

/// Capacity of a swarm's broadcast event channel.
pub const SWARM_CHANNEL_CAPACITY: usize = 64;

/// Initial capacity of a wire's read buffer.
pub const WIRE_READ_BUF_CAPACITY: usize = 32 * 1024;

// ============================================================================
// Speed estimation
// ============================================================================

/// Sliding window over which transfer speeds are averaged.
pub const SPEED_WINDOW: Duration = Duration::from_secs(5);
