//! Shared listening ports.
//!
//! Several swarms can listen on one TCP port: a per-port pool accepts
//! every incoming connection, waits for its handshake, and routes it to
//! the swarm whose info hash matches. The [`PoolRegistry`] tracks pools
//! by port and owns the ephemeral-port picker; pools are created lazily
//! with their first swarm and torn down with their last.

mod listener;
mod registry;

pub use registry::PoolRegistry;

#[cfg(test)]
mod tests;
