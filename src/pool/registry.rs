use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use rand::Rng as _;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::debug;

use super::listener::Pool;
use crate::constants::{EPHEMERAL_PORT_MAX, EPHEMERAL_PORT_MIN, EPHEMERAL_PORT_PROBES};
use crate::error::SwarmError;
use crate::info_hash::InfoHash;
use crate::swarm::Swarm;

/// The table of listening pools, one per TCP port.
///
/// Not a process global: every registry is independent, so tests can
/// create fresh ones and run in parallel without port collisions. Swarms
/// that listen through the same registry on the same port share one
/// listener, demultiplexed by info hash. A pool comes into being with
/// the first swarm on its port and dies with the last.
pub struct PoolRegistry {
    pools: Mutex<HashMap<u16, Arc<Pool>>>,
    /// Next candidate for an ephemeral port. The base is randomized per
    /// registry so simultaneously started processes do not contend for
    /// the same run of ports.
    next_port: AtomicU16,
}

impl PoolRegistry {
    /// Creates an empty registry with a freshly randomized ephemeral
    /// port base.
    pub fn new() -> Arc<Self> {
        let base = rand::rng().random_range(EPHEMERAL_PORT_MIN..EPHEMERAL_PORT_MAX);
        Arc::new(Self {
            pools: Mutex::new(HashMap::new()),
            next_port: AtomicU16::new(base),
        })
    }

    /// Number of ports currently listening.
    pub async fn num_pools(&self) -> usize {
        self.pools.lock().await.len()
    }

    /// Registers `swarm` on `port`, creating and binding the port's pool
    /// if this is its first swarm. `None` (or 0) picks an ephemeral port.
    pub(crate) async fn attach(
        &self,
        swarm: &Arc<Swarm>,
        port: Option<u16>,
    ) -> Result<u16, SwarmError> {
        let port = match port {
            Some(port) if port != 0 => port,
            _ => self.pick_port().await?,
        };
        let mut pools = self.pools.lock().await;
        let pool = match pools.get(&port) {
            Some(pool) => pool.clone(),
            None => {
                let pool = Pool::open(port, swarm.wire_factory()).await?;
                pools.insert(port, pool.clone());
                pool
            }
        };
        pool.add_swarm(swarm)?;
        Ok(port)
    }

    /// Deregisters a swarm; the pool is torn down with its last swarm.
    pub(crate) async fn detach(&self, port: u16, info_hash: &InfoHash) {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&port) {
            pool.remove_swarm(info_hash);
            if pool.is_empty() {
                pool.shutdown();
                pools.remove(&port);
                debug!(port, "listening pool closed");
            }
        }
    }

    /// Probes forward from the randomized base until a bindable port
    /// turns up.
    async fn pick_port(&self) -> Result<u16, SwarmError> {
        for _ in 0..EPHEMERAL_PORT_PROBES {
            let port = self.next_port.fetch_add(1, Ordering::Relaxed);
            if port < EPHEMERAL_PORT_MIN {
                // Wrapped around the u16 range.
                self.next_port.store(EPHEMERAL_PORT_MIN, Ordering::Relaxed);
                continue;
            }
            if TcpListener::bind(("0.0.0.0", port)).await.is_ok() {
                return Ok(port);
            }
        }
        Err(SwarmError::NoAvailablePort)
    }
}
