//! In-memory channel-backed transport
//!
//! Provides a full [`Transport`] implementation over in-process channels,
//! used for wiring tests and mesh simulations without real sockets.
//!
//! Endpoints attach to a shared [`MemoryHub`] keyed by listen address;
//! `connect` performs an address lookup in place of a wire handshake and
//! requires both endpoints to be running. Each
//! endpoint keeps **one bounded ingress queue per lane**, so a saturated
//! bulk lane backpressures bulk senders while control traffic keeps
//! flowing. Buffer sizes from [`TransportConfig`] are interpreted as
//! message counts here.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trellis_transport::{MemoryHub, MemoryTransportFactory, TransportRegistry};
//!
//! let hub = MemoryHub::new();
//! let registry = TransportRegistry::new();
//! registry.register("memory", Arc::new(MemoryTransportFactory::new(hub)));
//!
//! let transport = registry.create("memory", node_a, config_a)?;
//! transport.start().await?;
//! let link = transport.connect("addr-b", node_b, "a-b".into()).await?;
//! link.send(LaneClass::Control, payload).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify, RwLock, mpsc};
use tracing::{debug, info, warn};

use trellis_core::error::TransportError;
use trellis_core::{
    BackpressureState, LaneClass, LaneStats, LinkStatus, NodeId, StreamStatus, TransportConfig,
    derive_lane_status,
};

use crate::factory::TransportFactory;
use crate::link::{Link, LinkStats, Stream};
use crate::transport::{Transport, TransportStats};

/// A message delivered through the memory fabric
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Node that sent the message
    pub sender: NodeId,
    /// Lane the message arrived on
    pub lane: LaneClass,
    /// Message payload
    pub payload: Bytes,
}

// Status enums are stored as atomics so snapshots never take a lock.
fn link_status_to_u8(s: LinkStatus) -> u8 {
    match s {
        LinkStatus::Connecting => 0,
        LinkStatus::Connected => 1,
        LinkStatus::Degraded => 2,
        LinkStatus::Failed => 3,
        LinkStatus::Closed => 4,
    }
}

fn link_status_from_u8(v: u8) -> LinkStatus {
    match v {
        0 => LinkStatus::Connecting,
        1 => LinkStatus::Connected,
        2 => LinkStatus::Degraded,
        3 => LinkStatus::Failed,
        _ => LinkStatus::Closed,
    }
}

fn stream_status_to_u8(s: StreamStatus) -> u8 {
    match s {
        StreamStatus::Opening => 0,
        StreamStatus::Open => 1,
        StreamStatus::Closed => 2,
        StreamStatus::Failed => 3,
    }
}

fn stream_status_from_u8(v: u8) -> StreamStatus {
    match v {
        0 => StreamStatus::Opening,
        1 => StreamStatus::Open,
        2 => StreamStatus::Closed,
        _ => StreamStatus::Failed,
    }
}

/// Per-lane send/receive counters, updated lock-free
#[derive(Default)]
struct LaneCounters {
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_received: AtomicU64,
    /// Milliseconds since epoch of last activity; 0 means never
    last_activity_ms: AtomicI64,
}

impl LaneCounters {
    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn last_activity(&self) -> Option<DateTime<Utc>> {
        match self.last_activity_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }
}

/// One lane of a memory link: a sender into the remote endpoint's ingress
/// queue plus local counters
struct LaneHandle {
    tx: mpsc::Sender<InboundMessage>,
    counters: LaneCounters,
}

/// In-memory link to one remote node
pub struct MemoryLink {
    id: String,
    local: NodeId,
    remote: NodeId,
    status: AtomicU8,
    lanes: HashMap<LaneClass, LaneHandle>,
    streams: DashMap<u64, Arc<MemoryStream>>,
    next_stream_id: AtomicU64,
    max_message_size: usize,
    /// Wakes the remote endpoint's receive loop after an enqueue
    ingress_notify: Arc<Notify>,
    /// Weak self-reference handed to streams as their parent pointer
    self_ref: std::sync::Weak<MemoryLink>,
}

impl MemoryLink {
    fn new(
        id: String,
        local: NodeId,
        remote: NodeId,
        lane_txs: HashMap<LaneClass, mpsc::Sender<InboundMessage>>,
        ingress_notify: Arc<Notify>,
        max_message_size: usize,
    ) -> Arc<Self> {
        let lanes: HashMap<LaneClass, LaneHandle> = lane_txs
            .into_iter()
            .map(|(lane, tx)| {
                (
                    lane,
                    LaneHandle {
                        tx,
                        counters: LaneCounters::default(),
                    },
                )
            })
            .collect();

        Arc::new_cyclic(|weak| Self {
            id,
            local,
            remote,
            status: AtomicU8::new(link_status_to_u8(LinkStatus::Connecting)),
            lanes,
            streams: DashMap::new(),
            next_stream_id: AtomicU64::new(1),
            max_message_size,
            ingress_notify,
            self_ref: weak.clone(),
        })
    }

    /// Drive the link's state machine; illegal transitions are faults
    fn transition(&self, next: LinkStatus) -> Result<(), TransportError> {
        loop {
            let current = link_status_from_u8(self.status.load(Ordering::SeqCst));
            if current == next {
                return Ok(());
            }
            if !current.can_transition(next) {
                return Err(TransportError::Fault {
                    kind: "state".to_string(),
                    message: format!("illegal link transition on {}", self.id),
                    detail: format!("{current:?} -> {next:?}"),
                });
            }
            let swapped = self.status.compare_exchange(
                link_status_to_u8(current),
                link_status_to_u8(next),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            if swapped.is_ok() {
                debug!(link = %self.id, from = ?current, to = ?next, "Link status changed");
                return Ok(());
            }
        }
    }

    fn record_received(&self, lane: LaneClass, bytes: usize) {
        if let Some(handle) = self.lanes.get(&lane) {
            handle
                .counters
                .messages_received
                .fetch_add(1, Ordering::Relaxed);
            handle
                .counters
                .bytes_received
                .fetch_add(bytes as u64, Ordering::Relaxed);
            handle.counters.touch();
        }
    }

    fn lane_queue(&self, handle: &LaneHandle) -> (usize, usize) {
        let capacity = handle.tx.max_capacity();
        let depth = capacity.saturating_sub(handle.tx.capacity());
        (depth, capacity)
    }
}

#[async_trait]
impl Link for MemoryLink {
    fn id(&self) -> &str {
        &self.id
    }

    fn local_node(&self) -> &NodeId {
        &self.local
    }

    fn remote_node(&self) -> &NodeId {
        &self.remote
    }

    fn status(&self) -> LinkStatus {
        link_status_from_u8(self.status.load(Ordering::SeqCst))
    }

    async fn send(&self, lane: LaneClass, payload: Bytes) -> Result<(), TransportError> {
        let status = self.status();
        if status.is_terminal() {
            return Err(TransportError::LinkClosed(self.id.clone()));
        }
        if !status.is_usable() {
            return Err(TransportError::SendFailed(format!(
                "link {} not connected",
                self.id
            )));
        }
        if payload.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: payload.len(),
                max: self.max_message_size,
            });
        }

        let handle = self.lanes.get(&lane).ok_or_else(|| {
            TransportError::SendFailed(format!("no {lane} lane on link {}", self.id))
        })?;

        let size = payload.len();
        let msg = InboundMessage {
            sender: self.local.clone(),
            lane,
            payload,
        };

        match handle.tx.try_send(msg) {
            Ok(()) => {
                handle.counters.messages_sent.fetch_add(1, Ordering::Relaxed);
                handle
                    .counters
                    .bytes_sent
                    .fetch_add(size as u64, Ordering::Relaxed);
                handle.counters.touch();
                self.ingress_notify.notify_one();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Backpressure: the caller should throttle, not block
                Err(TransportError::SendFailed(format!(
                    "{lane} lane queue full on link {}",
                    self.id
                )))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Remote endpoint is gone; the link is done
                let _ = self.transition(LinkStatus::Failed);
                Err(TransportError::ConnectionClosed)
            }
        }
    }

    async fn open_stream(
        &self,
        lane: LaneClass,
        priority: u8,
    ) -> Result<Arc<dyn Stream>, TransportError> {
        if !self.status().is_usable() {
            return Err(TransportError::LinkClosed(self.id.clone()));
        }

        let id = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        let stream = Arc::new(MemoryStream {
            id,
            lane,
            priority,
            status: AtomicU8::new(stream_status_to_u8(StreamStatus::Opening)),
            link: self.self_ref.clone(),
        });
        stream.transition(StreamStatus::Open)?;
        self.streams.insert(id, stream.clone());

        debug!(link = %self.id, stream = id, lane = %lane, "Stream opened");
        Ok(stream)
    }

    fn stream(&self, id: u64) -> Option<Arc<dyn Stream>> {
        self.streams.get(&id).map(|s| s.clone() as Arc<dyn Stream>)
    }

    fn streams(&self) -> Vec<Arc<dyn Stream>> {
        self.streams
            .iter()
            .map(|s| s.clone() as Arc<dyn Stream>)
            .collect()
    }

    fn stats(&self) -> LinkStats {
        let status = self.status();
        let lanes = self
            .lanes
            .iter()
            .map(|(lane, handle)| {
                let (queue_depth, queue_capacity) = self.lane_queue(handle);
                (
                    *lane,
                    LaneStats {
                        messages_sent: handle.counters.messages_sent.load(Ordering::Relaxed),
                        messages_received: handle
                            .counters
                            .messages_received
                            .load(Ordering::Relaxed),
                        bytes_sent: handle.counters.bytes_sent.load(Ordering::Relaxed),
                        bytes_received: handle.counters.bytes_received.load(Ordering::Relaxed),
                        avg_latency_ms: 0.0,
                        last_activity: handle.counters.last_activity(),
                        last_heartbeat: None,
                        queue_depth,
                        queue_capacity,
                    },
                )
            })
            .collect();

        LinkStats {
            link_id: self.id.clone(),
            remote_node: self.remote.clone(),
            status,
            lanes,
        }
    }

    fn backpressure(&self) -> Vec<BackpressureState> {
        let status = self.status();
        self.lanes
            .iter()
            .map(|(lane, handle)| {
                let (queue_depth, queue_capacity) = self.lane_queue(handle);
                BackpressureState {
                    lane: *lane,
                    queue_depth,
                    queue_capacity,
                    status: derive_lane_status(status, queue_depth, queue_capacity),
                }
            })
            .collect()
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.status().is_terminal() {
            return Ok(());
        }
        self.transition(LinkStatus::Closed)?;

        // Closing the link ends every stream it owns
        for stream in self.streams.iter() {
            let _ = stream.transition(StreamStatus::Closed);
        }
        self.streams.clear();

        info!(link = %self.id, remote = %self.remote, "Link closed");
        Ok(())
    }
}

/// In-memory stream bound to one lane of a [`MemoryLink`]
pub struct MemoryStream {
    id: u64,
    lane: LaneClass,
    priority: u8,
    status: AtomicU8,
    link: std::sync::Weak<MemoryLink>,
}

impl MemoryStream {
    fn transition(&self, next: StreamStatus) -> Result<(), TransportError> {
        loop {
            let current = stream_status_from_u8(self.status.load(Ordering::SeqCst));
            if current == next {
                return Ok(());
            }
            if !current.can_transition(next) {
                return Err(TransportError::Fault {
                    kind: "state".to_string(),
                    message: format!("illegal stream transition on stream {}", self.id),
                    detail: format!("{current:?} -> {next:?}"),
                });
            }
            let swapped = self.status.compare_exchange(
                stream_status_to_u8(current),
                stream_status_to_u8(next),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            if swapped.is_ok() {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl Stream for MemoryStream {
    fn id(&self) -> u64 {
        self.id
    }

    fn lane(&self) -> LaneClass {
        self.lane
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn status(&self) -> StreamStatus {
        stream_status_from_u8(self.status.load(Ordering::SeqCst))
    }

    async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        if self.status() != StreamStatus::Open {
            return Err(TransportError::StreamClosed(self.id));
        }
        let link = self
            .link
            .upgrade()
            .ok_or(TransportError::StreamClosed(self.id))?;
        link.send(self.lane, payload).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.status().is_terminal() {
            return Ok(());
        }
        self.transition(StreamStatus::Closed)?;
        if let Some(link) = self.link.upgrade() {
            link.streams.remove(&self.id);
        }
        Ok(())
    }
}

/// Shared state of one memory endpoint, registered in the hub
struct EndpointState {
    node: NodeId,
    config: TransportConfig,
    ingress_tx: HashMap<LaneClass, mpsc::Sender<InboundMessage>>,
    ingress_rx: HashMap<LaneClass, Mutex<mpsc::Receiver<InboundMessage>>>,
    /// Signaled on every enqueue so a parked receiver wakes without
    /// holding any lane lock
    ingress_notify: Arc<Notify>,
    links: DashMap<String, Arc<MemoryLink>>,
    running: RwLock<bool>,
}

/// In-process wiring fabric connecting memory endpoints by listen address
#[derive(Clone, Default)]
pub struct MemoryHub {
    endpoints: Arc<DashMap<String, Arc<EndpointState>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&self, addr: &str, state: Arc<EndpointState>) -> Result<(), TransportError> {
        use dashmap::mapref::entry::Entry;
        match self.endpoints.entry(addr.to_string()) {
            Entry::Occupied(_) => Err(TransportError::Fault {
                kind: "bind".to_string(),
                message: format!("address {addr} already bound"),
                detail: state.node.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(state);
                Ok(())
            }
        }
    }

    fn lookup(&self, addr: &str) -> Option<Arc<EndpointState>> {
        self.endpoints.get(addr).map(|e| e.clone())
    }

    fn unbind(&self, addr: &str) {
        self.endpoints.remove(addr);
    }
}

/// In-memory transport attached to a [`MemoryHub`]
pub struct MemoryTransport {
    hub: MemoryHub,
    state: Arc<EndpointState>,
}

impl MemoryTransport {
    /// Create a transport and bind it to the hub at `config.listen_addr`
    pub fn new(
        hub: MemoryHub,
        local_node: NodeId,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        // Ingress buffer sizes are message counts in the memory fabric
        let capacity = config.read_buffer_size.max(1);
        let mut ingress_tx = HashMap::new();
        let mut ingress_rx = HashMap::new();
        for lane in LaneClass::all() {
            let (tx, rx) = mpsc::channel(capacity);
            ingress_tx.insert(lane, tx);
            ingress_rx.insert(lane, Mutex::new(rx));
        }

        let state = Arc::new(EndpointState {
            node: local_node,
            config,
            ingress_tx,
            ingress_rx,
            ingress_notify: Arc::new(Notify::new()),
            links: DashMap::new(),
            running: RwLock::new(false),
        });

        hub.bind(&state.config.listen_addr, state.clone())?;
        info!(node = %state.node, addr = %state.config.listen_addr, "Memory transport bound");

        Ok(Self { hub, state })
    }

    /// Receive the next inbound message, preferring control over priority
    /// over bulk when several lanes have traffic queued
    ///
    /// Lane locks are only held for a non-blocking poll, so a concurrent
    /// [`try_recv`](Self::try_recv) never waits behind a parked `recv`.
    pub async fn recv(&self) -> Result<InboundMessage, TransportError> {
        loop {
            let notified = self.state.ingress_notify.notified();
            if let Some(msg) = self.try_recv().await? {
                return Ok(msg);
            }
            // A send racing the poll above leaves a permit, so the wakeup
            // is never lost
            notified.await;
        }
    }

    /// Receive without blocking; `Ok(None)` when no lane has traffic
    pub async fn try_recv(&self) -> Result<Option<InboundMessage>, TransportError> {
        for lane in LaneClass::all() {
            let mut rx = self.state.ingress_rx[&lane].lock().await;
            match rx.try_recv() {
                Ok(msg) => {
                    self.note_received(&msg);
                    return Ok(Some(msg));
                }
                Err(mpsc::error::TryRecvError::Empty) => continue,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return Err(TransportError::ReceiveFailed(format!(
                        "{lane} lane disconnected"
                    )));
                }
            }
        }
        Ok(None)
    }

    fn note_received(&self, msg: &InboundMessage) {
        // Attribute the receive to the link facing the sender, if any
        if let Some(link) = self.link_to_inner(&msg.sender) {
            link.record_received(msg.lane, msg.payload.len());
        }
    }

    fn link_to_inner(&self, node: &NodeId) -> Option<Arc<MemoryLink>> {
        self.state
            .links
            .iter()
            .find(|l| l.remote_node() == node)
            .map(|l| l.clone())
    }

}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_node(&self) -> &NodeId {
        &self.state.node
    }

    async fn start(&self) -> Result<(), TransportError> {
        let mut running = self.state.running.write().await;
        if *running {
            return Ok(());
        }
        // Re-bind after a stop
        if self.hub.lookup(&self.state.config.listen_addr).is_none() {
            self.hub
                .bind(&self.state.config.listen_addr, self.state.clone())?;
        }
        *running = true;
        debug!(node = %self.state.node, "Memory transport started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let mut running = self.state.running.write().await;
        if !*running {
            return Ok(());
        }
        *running = false;

        self.hub.unbind(&self.state.config.listen_addr);

        let ids: Vec<String> = self.state.links.iter().map(|l| l.id().to_string()).collect();
        for id in ids {
            if let Some((_, link)) = self.state.links.remove(&id) {
                link.close().await?;
            }
        }

        info!(node = %self.state.node, "Memory transport stopped");
        Ok(())
    }

    async fn connect(
        &self,
        remote_addr: &str,
        node_id: NodeId,
        link_id: String,
    ) -> Result<Arc<dyn Link>, TransportError> {
        if !*self.state.running.read().await {
            return Err(TransportError::ConnectionFailed(format!(
                "transport for {} is not running",
                self.state.node
            )));
        }
        if self.state.links.len() >= self.state.config.max_connections {
            return Err(TransportError::ConnectionFailed(format!(
                "connection limit reached ({})",
                self.state.config.max_connections
            )));
        }

        let remote = self.hub.lookup(remote_addr).ok_or_else(|| {
            TransportError::ConnectionFailed(format!("no endpoint listening on {remote_addr}"))
        })?;

        // The hub lookup stands in for the wire handshake; a node identity
        // mismatch is a failed negotiation
        if remote.node != node_id {
            return Err(TransportError::ConnectionFailed(format!(
                "remote identity mismatch: expected {node_id}, found {}",
                remote.node
            )));
        }
        if !*remote.running.read().await {
            return Err(TransportError::ConnectionFailed(format!(
                "endpoint at {remote_addr} is not accepting connections"
            )));
        }

        let forward = MemoryLink::new(
            link_id.clone(),
            self.state.node.clone(),
            remote.node.clone(),
            remote.ingress_tx.clone(),
            remote.ingress_notify.clone(),
            self.state.config.max_message_size,
        );
        // A link id names exactly one link; displacing a live one would
        // strand its streams
        {
            use dashmap::mapref::entry::Entry;
            match self.state.links.entry(link_id.clone()) {
                Entry::Occupied(_) => {
                    return Err(TransportError::ConnectionFailed(format!(
                        "link id {link_id} already in use"
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(forward.clone());
                }
            }
        }
        forward.transition(LinkStatus::Connected)?;

        // Accept side: give the remote a link back to us unless it already
        // has one facing this node
        let has_reverse = remote
            .links
            .iter()
            .any(|l| l.remote_node() == &self.state.node);
        if !has_reverse {
            let reverse = MemoryLink::new(
                format!("{link_id}:accept"),
                remote.node.clone(),
                self.state.node.clone(),
                self.state.ingress_tx.clone(),
                self.state.ingress_notify.clone(),
                remote.config.max_message_size,
            );
            remote.links.insert(reverse.id.clone(), reverse.clone());
            reverse.transition(LinkStatus::Connected)?;
        }

        info!(
            node = %self.state.node,
            remote = %node_id,
            link = %link_id,
            "Link established"
        );

        Ok(forward)
    }

    fn link(&self, link_id: &str) -> Option<Arc<dyn Link>> {
        self.state
            .links
            .get(link_id)
            .map(|l| l.clone() as Arc<dyn Link>)
    }

    fn link_to(&self, node: &NodeId) -> Option<Arc<dyn Link>> {
        self.link_to_inner(node).map(|l| l as Arc<dyn Link>)
    }

    fn list_links(&self) -> Vec<Arc<dyn Link>> {
        self.state
            .links
            .iter()
            .map(|l| l.clone() as Arc<dyn Link>)
            .collect()
    }

    async fn close_link(&self, link_id: &str) -> Result<(), TransportError> {
        let (_, link) = self
            .state
            .links
            .remove(link_id)
            .ok_or_else(|| TransportError::LinkNotFound(link_id.to_string()))?;
        link.close().await
    }

    fn stats(&self) -> TransportStats {
        let links = self
            .state
            .links
            .iter()
            .map(|l| (l.id().to_string(), l.stats()))
            .collect();
        TransportStats {
            local_node: self.state.node.clone(),
            links,
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        // Dropping the transport frees its address for reuse
        if let Some(existing) = self.hub.lookup(&self.state.config.listen_addr) {
            if Arc::ptr_eq(&existing, &self.state) {
                self.hub.unbind(&self.state.config.listen_addr);
            }
        }
    }
}

/// Factory constructing [`MemoryTransport`]s attached to one hub
pub struct MemoryTransportFactory {
    hub: MemoryHub,
}

impl MemoryTransportFactory {
    pub fn new(hub: MemoryHub) -> Self {
        Self { hub }
    }
}

impl TransportFactory for MemoryTransportFactory {
    fn create(
        &self,
        local_node: NodeId,
        config: TransportConfig,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        if config.listen_addr.is_empty() {
            warn!(node = %local_node, "Memory transport created with empty listen address");
        }
        let transport = MemoryTransport::new(self.hub.clone(), local_node, config)?;
        Ok(Arc::new(transport))
    }
}
