//! Link and stream capability traits
//!
//! A [`Link`] is one logical bidirectional connection to exactly one remote
//! node. It multiplexes many [`Stream`]s across independent class-of-service
//! lanes; congestion on the bulk lane must never block control traffic, which
//! is why every lane keeps its own queue and its own backpressure snapshot.
//!
//! Concrete wire implementations (WebSocket, TCP, UDP, in-memory channels)
//! drive the status state machines; this module only defines the contracts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use trellis_core::{BackpressureState, LaneClass, LaneStats, LinkStatus, NodeId, StreamStatus};
use trellis_core::error::TransportError;

/// A logical, ordered byte channel bound to one lane of a link
///
/// Streams are owned by their parent link: closing the link closes all of
/// its streams. A stream in a terminal status cannot be reopened; open a
/// new one instead.
#[async_trait]
pub trait Stream: Send + Sync {
    /// Stream identifier, unique within the parent link
    fn id(&self) -> u64;

    /// The lane this stream is bound to
    fn lane(&self) -> LaneClass;

    /// Scheduling priority within the lane (higher first)
    fn priority(&self) -> u8;

    /// Current lifecycle status
    fn status(&self) -> StreamStatus;

    /// Send a payload on this stream, in order
    async fn send(&self, payload: Bytes) -> Result<(), TransportError>;

    /// Close the stream; terminal, idempotent
    async fn close(&self) -> Result<(), TransportError>;
}

/// A logical bidirectional connection to one remote node
#[async_trait]
pub trait Link: Send + Sync {
    /// Link identifier, unique within the owning transport
    fn id(&self) -> &str;

    /// The local node's identity
    fn local_node(&self) -> &NodeId;

    /// The remote node this link connects to
    fn remote_node(&self) -> &NodeId;

    /// Current connectivity status
    fn status(&self) -> LinkStatus;

    /// Send a raw payload on the given lane
    async fn send(&self, lane: LaneClass, payload: Bytes) -> Result<(), TransportError>;

    /// Open a new stream bound to the given lane
    async fn open_stream(
        &self,
        lane: LaneClass,
        priority: u8,
    ) -> Result<Arc<dyn Stream>, TransportError>;

    /// Look up an open stream by id
    fn stream(&self, id: u64) -> Option<Arc<dyn Stream>>;

    /// All streams currently owned by this link
    fn streams(&self) -> Vec<Arc<dyn Stream>>;

    /// Per-lane statistics snapshot
    fn stats(&self) -> LinkStats;

    /// Per-lane backpressure snapshot
    fn backpressure(&self) -> Vec<BackpressureState>;

    /// Close the link and all of its streams; terminal, idempotent
    async fn close(&self) -> Result<(), TransportError>;
}

/// Point-in-time statistics for one link
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// The link this snapshot describes
    pub link_id: String,
    /// The remote node the link connects to
    pub remote_node: NodeId,
    /// Link status at snapshot time
    pub status: LinkStatus,
    /// Per-lane statistics
    pub lanes: HashMap<LaneClass, LaneStats>,
}

impl LinkStats {
    /// Total messages sent across all lanes
    pub fn messages_sent(&self) -> u64 {
        self.lanes.values().map(|l| l.messages_sent).sum()
    }

    /// Total bytes sent across all lanes
    pub fn bytes_sent(&self) -> u64 {
        self.lanes.values().map(|l| l.bytes_sent).sum()
    }
}
