use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing::{debug, trace};

use super::event::SwarmEvent;
use super::peer::{Peer, PeerState};
use crate::addr::valid_addr;
use crate::constants::{
    HANDSHAKE_TIMEOUT_IN, HANDSHAKE_TIMEOUT_OUT, MAX_CONNS, RECONNECT_BACKOFF,
    SWARM_CHANNEL_CAPACITY,
};
use crate::error::SwarmError;
use crate::info_hash::InfoHash;
use crate::peer_id::PeerId;
use crate::pool::PoolRegistry;
use crate::speed::Speedometer;
use crate::wire::{
    recv_handshake, AttachedWire, HandshakeOptions, RemoteHandshake, TcpWireFactory, Wire,
    WireEvent, WireFactory,
};

/// Configuration for a swarm.
#[derive(Clone)]
pub struct SwarmOptions {
    /// Cap on simultaneous connections; every peer with a live transport
    /// counts, including dials still in flight.
    pub max_conns: usize,
    /// Capability flags for our half of the handshake.
    pub handshake: HandshakeOptions,
    /// Framer attached to each transport.
    pub wire_factory: Arc<dyn WireFactory>,
}

impl Default for SwarmOptions {
    fn default() -> Self {
        Self {
            max_conns: MAX_CONNS,
            handshake: HandshakeOptions::default(),
            wire_factory: Arc::new(TcpWireFactory),
        }
    }
}

/// The connection manager for one torrent.
///
/// A swarm tracks every peer it knows about, dials queued peers while
/// under the connection cap, exchanges handshakes, and keeps the list of
/// active wires. Incoming connections reach it through a listening
/// [`PoolRegistry`] which routes them by info hash.
///
/// All methods are non-blocking; connection work happens on spawned
/// tasks, so a swarm must live inside a tokio runtime. Progress is
/// reported through the broadcast channel returned by [`subscribe`].
///
/// [`subscribe`]: Swarm::subscribe
pub struct Swarm {
    me: Weak<Swarm>,
    info_hash: InfoHash,
    peer_id: PeerId,
    opts: SwarmOptions,
    state: Mutex<State>,
    events: broadcast::Sender<SwarmEvent>,
    downloaded: AtomicU64,
    uploaded: AtomicU64,
    download_speed: Speedometer,
    upload_speed: Speedometer,
    paused: AtomicBool,
    destroyed: AtomicBool,
    port: AtomicU16,
    listening_announced: AtomicBool,
}

#[derive(Default)]
struct State {
    peers: HashMap<String, Peer>,
    queue: VecDeque<String>,
    wires: Vec<Arc<dyn Wire>>,
    registry: Option<(Weak<PoolRegistry>, u16)>,
}

impl Swarm {
    /// Creates a swarm for `info_hash`, identifying as `peer_id`.
    pub fn new(info_hash: InfoHash, peer_id: PeerId, opts: SwarmOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(SWARM_CHANNEL_CAPACITY);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            info_hash,
            peer_id,
            opts,
            state: Mutex::new(State::default()),
            events,
            downloaded: AtomicU64::new(0),
            uploaded: AtomicU64::new(0),
            download_speed: Speedometer::new(),
            upload_speed: Speedometer::new(),
            paused: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            port: AtomicU16::new(0),
            listening_announced: AtomicBool::new(false),
        })
    }

    /// Subscribes to this swarm's events.
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.events.subscribe()
    }

    /// The torrent this swarm manages.
    pub fn info_hash(&self) -> &InfoHash {
        &self.info_hash
    }

    /// Our peer ID.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Queues `addr` (`host:port`) for an outbound connection.
    ///
    /// Invalid addresses and addresses already known are silently
    /// ignored. The dial happens when a connection slot frees up.
    pub fn add(&self, addr: &str) {
        if self.is_destroyed() || !valid_addr(addr) {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.peers.contains_key(addr) {
                return;
            }
            state
                .peers
                .insert(addr.to_string(), Peer::queued(addr.to_string()));
            state.queue.push_back(addr.to_string());
        }
        self.drain();
    }

    /// Removes a peer, tearing down its connection if it has one, then
    /// lets a queued peer take the freed slot.
    pub fn remove(&self, addr: &str) {
        if self.destroy_peer(addr) {
            self.drain();
        }
    }

    /// Returns `true` if a peer with this address (or id) is known.
    pub fn contains(&self, addr: &str) -> bool {
        self.state.lock().peers.contains_key(addr)
    }

    /// Stops new outbound dials. Incoming connections and in-flight
    /// transfers are unaffected.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes outbound dialing.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.drain();
    }

    /// Binds a listening port for incoming peers, registering this swarm
    /// with the port's pool in `registry`.
    ///
    /// With `port` absent (or 0) an ephemeral port is picked from the
    /// registry's randomized range. Returns the bound port; a
    /// [`SwarmEvent::Listening`] event is also emitted.
    ///
    /// # Errors
    ///
    /// Fails if the swarm is destroyed or already listening, if another
    /// swarm with the same info hash is on the port, or if binding fails
    /// after retries. Failures are also emitted as [`SwarmEvent::Error`].
    pub async fn listen(
        &self,
        registry: &Arc<PoolRegistry>,
        port: Option<u16>,
    ) -> Result<u16, SwarmError> {
        if self.is_destroyed() {
            return Err(SwarmError::Destroyed);
        }
        let current = self.port.load(Ordering::SeqCst);
        if current != 0 {
            return Err(SwarmError::AlreadyListening(current));
        }
        let Some(me) = self.me.upgrade() else {
            return Err(SwarmError::Destroyed);
        };
        match registry.attach(&me, port).await {
            Ok(bound) => {
                let stale = {
                    let mut state = self.state.lock();
                    if self.is_destroyed() {
                        true
                    } else {
                        state.registry = Some((Arc::downgrade(registry), bound));
                        false
                    }
                };
                if stale {
                    // Destroyed while the bind was in flight.
                    registry.detach(bound, &self.info_hash).await;
                    return Err(SwarmError::Destroyed);
                }
                Ok(bound)
            }
            Err(err) => {
                self.emit(SwarmEvent::Error(err.clone()));
                Err(err)
            }
        }
    }

    /// Destroys the swarm: every peer is removed, every wire closed, and
    /// the listening pool (if any) released. A single
    /// [`SwarmEvent::Close`] follows; no events are delivered after it.
    /// Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (peers, registry) = {
            let mut state = self.state.lock();
            state.queue.clear();
            state.wires.clear();
            let peers: Vec<Peer> = state.peers.drain().map(|(_, peer)| peer).collect();
            (peers, state.registry.take())
        };
        for peer in peers {
            if let Some(task) = peer.task {
                task.abort();
            }
            if let Some(wire) = peer.wire {
                wire.destroy();
            }
        }
        let events = self.events.clone();
        let info_hash = self.info_hash;
        match registry {
            Some((registry, port)) => {
                tokio::spawn(async move {
                    if let Some(registry) = registry.upgrade() {
                        registry.detach(port, &info_hash).await;
                    }
                    let _ = events.send(SwarmEvent::Close);
                });
            }
            None => {
                let _ = events.send(SwarmEvent::Close);
            }
        }
    }

    /// Adopts an already-connected wire under an opaque id — the entry
    /// point for transports the swarm does not dial itself.
    ///
    /// The remote handshake is awaited (incoming deadline) and must carry
    /// this swarm's info hash; otherwise the wire is destroyed.
    pub fn add_incoming(&self, id: &str, attached: AttachedWire) {
        if self.is_destroyed() {
            attached.wire.destroy();
            return;
        }
        let Some(me) = self.me.upgrade() else {
            return;
        };
        let id = id.to_string();
        tokio::spawn(async move {
            let AttachedWire { wire, mut events } = attached;
            match timeout(HANDSHAKE_TIMEOUT_IN, recv_handshake(&mut events)).await {
                Ok(Some(remote)) if remote.info_hash == me.info_hash => {
                    me.adopt(id, None, wire, events, remote);
                }
                Ok(Some(remote)) => {
                    debug!(peer = %id, theirs = %remote.info_hash, "handshake info hash mismatch");
                    wire.destroy();
                }
                _ => wire.destroy(),
            }
        });
    }

    // ------------------------------------------------------------------
    // Observable counters
    // ------------------------------------------------------------------

    /// Total bytes downloaded across all wires.
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Total bytes uploaded across all wires.
    pub fn uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::Relaxed)
    }

    /// Upload/download ratio; 0 while nothing has been downloaded.
    pub fn ratio(&self) -> f64 {
        let downloaded = self.downloaded();
        if downloaded == 0 {
            0.0
        } else {
            self.uploaded() as f64 / downloaded as f64
        }
    }

    /// Current download speed in bytes per second.
    pub fn download_speed(&self) -> f64 {
        self.download_speed.rate()
    }

    /// Current upload speed in bytes per second.
    pub fn upload_speed(&self) -> f64 {
        self.upload_speed.rate()
    }

    /// Peers waiting for an outbound dial.
    pub fn num_queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Peers with a live transport (dialing, handshaking, or active).
    pub fn num_conns(&self) -> usize {
        self.state
            .lock()
            .peers
            .values()
            .filter(|peer| peer.has_conn())
            .count()
    }

    /// Active (handshaken) wires.
    pub fn num_peers(&self) -> usize {
        self.state.lock().wires.len()
    }

    /// The bound listening port, or 0 when not listening.
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    /// `true` while outbound dialing is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// `true` once [`destroy`](Swarm::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Pool integration
    // ------------------------------------------------------------------

    pub(crate) fn wire_factory(&self) -> Arc<dyn WireFactory> {
        self.opts.wire_factory.clone()
    }

    /// Records the bound port and emits `Listening` once.
    pub(crate) fn announce_listening(&self, port: u16) {
        if self.listening_announced.swap(true, Ordering::SeqCst) {
            return;
        }
        self.port.store(port, Ordering::SeqCst);
        self.emit(SwarmEvent::Listening(port));
    }

    /// Takes over a demultiplexed connection whose handshake matched this
    /// swarm: records the peer, answers the handshake, and promotes the
    /// wire.
    pub(crate) fn adopt(
        &self,
        key: String,
        addr: Option<String>,
        wire: Arc<dyn Wire>,
        mut events: mpsc::UnboundedReceiver<WireEvent>,
        remote: RemoteHandshake,
    ) {
        if self.is_destroyed() {
            wire.destroy();
            return;
        }
        {
            let mut state = self.state.lock();
            if state.peers.contains_key(&key) {
                drop(state);
                debug!(peer = %key, "duplicate connection for known peer");
                wire.destroy();
                return;
            }
            state
                .peers
                .insert(key.clone(), Peer::connected(addr, wire.clone()));
        }
        if self.mark_handshake_sent(&key) {
            wire.handshake(&self.info_hash, &self.peer_id, &self.opts.handshake);
        }
        self.promote(&key, &wire, &remote);

        let Some(me) = self.me.upgrade() else {
            return;
        };
        let pump_key = key.clone();
        let pump_wire = wire.clone();
        let task = tokio::spawn(async move {
            me.run_wire(&mut events).await;
            pump_wire.destroy();
            me.disconnected(pump_key).await;
        });
        if let Some(peer) = self.state.lock().peers.get_mut(&key) {
            peer.task = Some(task.abort_handle());
        }
    }

    // ------------------------------------------------------------------
    // Admission control and the peer lifecycle
    // ------------------------------------------------------------------

    fn emit(&self, event: SwarmEvent) {
        if !self.is_destroyed() {
            let _ = self.events.send(event);
        }
    }

    fn on_download(&self, n: u64) {
        self.downloaded.fetch_add(n, Ordering::Relaxed);
        self.download_speed.record(n);
        self.emit(SwarmEvent::Download(n));
    }

    fn on_upload(&self, n: u64) {
        self.uploaded.fetch_add(n, Ordering::Relaxed);
        self.upload_speed.record(n);
        self.emit(SwarmEvent::Upload(n));
    }

    /// Dials queued peers while a connection slot is free.
    fn drain(&self) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        while let Some((key, addr)) = self.next_dial() {
            let task = tokio::spawn(me.clone().dial(key.clone(), addr));
            if let Some(peer) = self.state.lock().peers.get_mut(&key) {
                peer.task = Some(task.abort_handle());
            }
        }
    }

    /// Pops the next dialable peer, honoring pause and the connection
    /// cap. Queue order is FIFO.
    fn next_dial(&self) -> Option<(String, String)> {
        let mut state = self.state.lock();
        if self.is_destroyed() || self.is_paused() {
            return None;
        }
        loop {
            let live = state.peers.values().filter(|peer| peer.has_conn()).count();
            if live >= self.opts.max_conns {
                return None;
            }
            let key = state.queue.pop_front()?;
            let Some(peer) = state.peers.get_mut(&key) else {
                continue;
            };
            let Some(addr) = peer.addr.clone() else {
                continue;
            };
            peer.state = PeerState::Dialing;
            return Some((key, addr));
        }
    }

    /// One connection attempt: connect, handshake, pump the wire until it
    /// terminates, then decide between reconnect and removal.
    async fn dial(self: Arc<Self>, key: String, addr: String) {
        trace!(peer = %addr, "dialing");
        let stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(err) => {
                debug!(peer = %addr, error = %err, "connect failed");
                self.disconnected(key).await;
                return;
            }
        };
        let AttachedWire { wire, mut events } = self.opts.wire_factory.attach(stream);
        if !self.register_conn(&key, &wire) {
            // Peer was removed (or swarm destroyed) while connecting.
            wire.destroy();
            return;
        }
        if self.mark_handshake_sent(&key) {
            wire.handshake(&self.info_hash, &self.peer_id, &self.opts.handshake);
        }

        match timeout(HANDSHAKE_TIMEOUT_OUT, recv_handshake(&mut events)).await {
            Ok(Some(remote)) if remote.info_hash == self.info_hash => {
                self.promote(&key, &wire, &remote);
                self.run_wire(&mut events).await;
            }
            Ok(Some(remote)) => {
                debug!(peer = %addr, theirs = %remote.info_hash, "handshake info hash mismatch");
            }
            Ok(None) => {
                trace!(peer = %addr, "wire ended before handshake");
            }
            Err(_) => {
                debug!(peer = %addr, "handshake timed out");
            }
        }
        wire.destroy();
        self.disconnected(key).await;
    }

    /// Attaches a freshly connected wire to its peer record.
    fn register_conn(&self, key: &str, wire: &Arc<dyn Wire>) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let mut state = self.state.lock();
        match state.peers.get_mut(key) {
            Some(peer) => {
                peer.state = PeerState::Connected;
                peer.wire = Some(wire.clone());
                true
            }
            None => false,
        }
    }

    /// Claims the one handshake we send per connection.
    fn mark_handshake_sent(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        match state.peers.get_mut(key) {
            Some(peer) if !peer.sent_handshake => {
                peer.sent_handshake = true;
                true
            }
            _ => false,
        }
    }

    /// Promotes a handshaken peer: retries reset, wire listed, event
    /// emitted.
    fn promote(&self, key: &str, wire: &Arc<dyn Wire>, remote: &RemoteHandshake) {
        let addr = {
            let mut state = self.state.lock();
            let Some(peer) = state.peers.get_mut(key) else {
                return;
            };
            peer.state = PeerState::Active;
            peer.retries = 0;
            let addr = peer.addr.clone();
            state.wires.push(wire.clone());
            addr
        };
        trace!(peer = ?addr, remote_id = %remote.peer_id, "wire established");
        self.emit(SwarmEvent::Wire {
            wire: wire.clone(),
            addr,
        });
    }

    /// Forwards wire byte counts until a terminal event.
    async fn run_wire(&self, events: &mut mpsc::UnboundedReceiver<WireEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                WireEvent::Download(n) => self.on_download(n),
                WireEvent::Upload(n) => self.on_upload(n),
                WireEvent::Handshake(_) => {}
                WireEvent::End | WireEvent::Finish | WireEvent::Error(_) | WireEvent::Close => {
                    return;
                }
            }
        }
    }

    /// The wire-loss path: unlink the wire, then either wait out the next
    /// backoff delay and re-queue, or remove the peer for good once the
    /// schedule is exhausted (or the peer has no dialable address).
    async fn disconnected(&self, key: String) {
        let (wire, delay) = {
            let mut state = self.state.lock();
            let wire = match state.peers.get_mut(&key) {
                Some(peer) => peer.wire.take(),
                None => return,
            };
            if let Some(wire) = &wire {
                state.wires.retain(|w| !Arc::ptr_eq(w, wire));
            }
            let Some(peer) = state.peers.get_mut(&key) else {
                return;
            };
            peer.sent_handshake = false;
            let delay = if self.is_destroyed()
                || peer.addr.is_none()
                || peer.retries >= RECONNECT_BACKOFF.len()
            {
                None
            } else {
                let delay = RECONNECT_BACKOFF[peer.retries];
                peer.retries += 1;
                peer.state = PeerState::Backoff;
                Some(delay)
            };
            (wire, delay)
        };
        if let Some(wire) = wire {
            wire.destroy();
        }
        match delay {
            Some(delay) => {
                trace!(peer = %key, ?delay, "reconnecting after backoff");
                tokio::time::sleep(delay).await;
                {
                    let mut state = self.state.lock();
                    let Some(peer) = state.peers.get_mut(&key) else {
                        return;
                    };
                    peer.state = PeerState::Queued;
                    state.queue.push_back(key);
                }
                self.drain();
            }
            None => {
                self.destroy_peer(&key);
                self.drain();
            }
        }
    }

    /// The single peer-destruction path. Removes the record, unlinks it
    /// from the queue and wire list, cancels its task, and closes its
    /// wire. Returns `false` if the peer was already gone, which is what
    /// makes repeated destruction a no-op.
    fn destroy_peer(&self, key: &str) -> bool {
        let peer = {
            let mut state = self.state.lock();
            let Some(peer) = state.peers.remove(key) else {
                return false;
            };
            state.queue.retain(|queued| queued != key);
            if let Some(wire) = &peer.wire {
                state.wires.retain(|w| !Arc::ptr_eq(w, wire));
            }
            peer
        };
        if let Some(task) = peer.task {
            task.abort();
        }
        if let Some(wire) = peer.wire {
            wire.destroy();
        }
        true
    }
}
