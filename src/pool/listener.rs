use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::constants::{BIND_RETRIES, BIND_RETRY_DELAY, HANDSHAKE_TIMEOUT_IN};
use crate::error::SwarmError;
use crate::info_hash::InfoHash;
use crate::swarm::Swarm;
use crate::wire::{recv_handshake, AttachedWire, Wire, WireFactory};

/// One listening TCP port, shared by the swarms registered on it.
///
/// The pool accepts connections, attaches a wire, waits briefly for the
/// remote handshake, and hands the connection to the swarm whose info
/// hash matches. Connections that never speak, or speak for an unknown
/// torrent, are destroyed.
pub(crate) struct Pool {
    port: u16,
    factory: Arc<dyn WireFactory>,
    /// Member swarms, keyed by lowercase-hex info hash.
    swarms: DashMap<String, Arc<Swarm>>,
    /// Incoming wires still waiting for their handshake, kept so shutdown
    /// can force-close them.
    conns: DashMap<u64, Arc<dyn Wire>>,
    next_conn_id: AtomicU64,
    accept_task: Mutex<Option<AbortHandle>>,
}

impl Pool {
    /// Binds `port` (retrying `EADDRINUSE`) and starts the accept loop.
    pub(crate) async fn open(
        port: u16,
        factory: Arc<dyn WireFactory>,
    ) -> Result<Arc<Self>, SwarmError> {
        let listener = Self::bind(port).await?;
        let pool = Arc::new(Self {
            port,
            factory,
            swarms: DashMap::new(),
            conns: DashMap::new(),
            next_conn_id: AtomicU64::new(0),
            accept_task: Mutex::new(None),
        });
        let task = tokio::spawn(accept_loop(pool.clone(), listener));
        *pool.accept_task.lock() = Some(task.abort_handle());
        Ok(pool)
    }

    async fn bind(port: u16) -> Result<TcpListener, SwarmError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match TcpListener::bind(("0.0.0.0", port)).await {
                Ok(listener) => return Ok(listener),
                Err(err) if err.kind() == io::ErrorKind::AddrInUse && attempt < BIND_RETRIES => {
                    warn!(port, attempt, "port in use, retrying bind");
                    tokio::time::sleep(BIND_RETRY_DELAY).await;
                }
                Err(err) => {
                    return Err(SwarmError::Bind {
                        port,
                        source: Arc::new(err),
                    });
                }
            }
        }
    }

    /// Registers a swarm on this port. At most one swarm per info hash;
    /// the colliding newcomer is rejected, the incumbent unaffected.
    /// Callers serialize through the registry lock.
    pub(crate) fn add_swarm(&self, swarm: &Arc<Swarm>) -> Result<(), SwarmError> {
        let hex = swarm.info_hash().to_hex();
        if self.swarms.contains_key(&hex) {
            return Err(SwarmError::DuplicateSwarm {
                info_hash: hex,
                port: self.port,
            });
        }
        // Listening is announced before the swarm can see wires.
        swarm.announce_listening(self.port);
        self.swarms.insert(hex, swarm.clone());
        Ok(())
    }

    pub(crate) fn remove_swarm(&self, info_hash: &InfoHash) {
        self.swarms.remove(&info_hash.to_hex());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.swarms.is_empty()
    }

    /// Stops accepting and force-closes every pre-handshake connection.
    pub(crate) fn shutdown(&self) {
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
        for entry in self.conns.iter() {
            entry.value().destroy();
        }
        self.conns.clear();
    }
}

async fn accept_loop(pool: Arc<Pool>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                trace!(port = pool.port, peer = %addr, "incoming connection");
                tokio::spawn(handle_incoming(pool.clone(), stream, addr));
            }
            Err(err) => {
                debug!(port = pool.port, error = %err, "accept failed");
                // Do not spin on persistent accept errors.
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

/// Demultiplexes one incoming connection by its handshake info hash.
async fn handle_incoming(pool: Arc<Pool>, stream: TcpStream, addr: SocketAddr) {
    let AttachedWire { wire, mut events } = pool.factory.attach(stream);
    let conn_id = pool.next_conn_id.fetch_add(1, Ordering::Relaxed);
    pool.conns.insert(conn_id, wire.clone());

    let handshake = timeout(HANDSHAKE_TIMEOUT_IN, recv_handshake(&mut events)).await;
    pool.conns.remove(&conn_id);

    let remote = match handshake {
        Ok(Some(remote)) => remote,
        Ok(None) => {
            trace!(peer = %addr, "connection closed before handshake");
            wire.destroy();
            return;
        }
        Err(_) => {
            debug!(peer = %addr, "incoming handshake timed out");
            wire.destroy();
            return;
        }
    };

    let swarm = match pool.swarms.get(&remote.info_hash.to_hex()) {
        Some(entry) => entry.value().clone(),
        None => {
            debug!(peer = %addr, info_hash = %remote.info_hash, "handshake for unknown torrent");
            wire.destroy();
            return;
        }
    };
    let peer_addr = addr.to_string();
    swarm.adopt(peer_addr.clone(), Some(peer_addr), wire, events, remote);
}
