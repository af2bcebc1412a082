//! Lane and stream vocabulary
//!
//! A *lane* is a class-of-service channel within a link: control traffic,
//! priority traffic, and bulk traffic each get an independent queue so
//! congestion on one class never blocks another. A *stream* is a logical,
//! ordered byte channel bound to one lane.
//!
//! This module defines the data vocabulary only: status enums and their
//! legal transitions, plus the point-in-time statistics and backpressure
//! snapshots. Behavior lives in the transport crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Class of service for a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneClass {
    /// Routing and control-plane messages; must never be starved
    Control,
    /// Latency-sensitive application traffic
    Priority,
    /// Throughput-oriented traffic (replication, backfill)
    Bulk,
}

impl LaneClass {
    /// All lane classes, in scheduling-priority order
    pub fn all() -> [LaneClass; 3] {
        [LaneClass::Control, LaneClass::Priority, LaneClass::Bulk]
    }

    /// Stable string tag for logging and wire framing
    pub fn as_str(&self) -> &'static str {
        match self {
            LaneClass::Control => "control",
            LaneClass::Priority => "priority",
            LaneClass::Bulk => "bulk",
        }
    }
}

impl std::fmt::Display for LaneClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connectivity status of a link (also reused per-lane for backpressure)
///
/// State machine: `Connecting → Connected → {Degraded, Failed, Closed}`,
/// `Degraded → {Connected, Failed, Closed}`. `Failed` and `Closed` are
/// terminal for the link instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkStatus {
    Connecting,
    Connected,
    Degraded,
    Failed,
    Closed,
}

impl LinkStatus {
    /// Whether this status ends the link's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkStatus::Failed | LinkStatus::Closed)
    }

    /// Whether the link can carry traffic in this status
    pub fn is_usable(&self) -> bool {
        matches!(self, LinkStatus::Connected | LinkStatus::Degraded)
    }

    /// Check whether a transition to `next` is legal
    pub fn can_transition(&self, next: LinkStatus) -> bool {
        match self {
            LinkStatus::Connecting => matches!(
                next,
                LinkStatus::Connected | LinkStatus::Failed | LinkStatus::Closed
            ),
            LinkStatus::Connected => matches!(
                next,
                LinkStatus::Degraded | LinkStatus::Failed | LinkStatus::Closed
            ),
            LinkStatus::Degraded => matches!(
                next,
                LinkStatus::Connected | LinkStatus::Failed | LinkStatus::Closed
            ),
            LinkStatus::Failed | LinkStatus::Closed => false,
        }
    }

    /// Health ordering: lower is healthier. Used to verify that
    /// backpressure reporting is monotonic in queue occupancy.
    pub fn severity(&self) -> u8 {
        match self {
            LinkStatus::Connected => 0,
            LinkStatus::Connecting => 1,
            LinkStatus::Degraded => 2,
            LinkStatus::Failed => 3,
            LinkStatus::Closed => 4,
        }
    }
}

/// Lifecycle status of a stream
///
/// State machine: `Opening → Open → {Closed, Failed}`. Terminal states end
/// the stream; a stream cannot be reopened; create a new one instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamStatus {
    Opening,
    Open,
    Closed,
    Failed,
}

impl StreamStatus {
    /// Whether this status ends the stream's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamStatus::Closed | StreamStatus::Failed)
    }

    /// Check whether a transition to `next` is legal
    pub fn can_transition(&self, next: StreamStatus) -> bool {
        match self {
            StreamStatus::Opening => matches!(
                next,
                StreamStatus::Open | StreamStatus::Closed | StreamStatus::Failed
            ),
            StreamStatus::Open => matches!(next, StreamStatus::Closed | StreamStatus::Failed),
            StreamStatus::Closed | StreamStatus::Failed => false,
        }
    }
}

/// Point-in-time statistics for one lane
///
/// Computed on demand from live counters; never persisted independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaneStats {
    /// Messages sent on this lane
    pub messages_sent: u64,
    /// Messages received on this lane
    pub messages_received: u64,
    /// Bytes sent on this lane
    pub bytes_sent: u64,
    /// Bytes received on this lane
    pub bytes_received: u64,
    /// Rolling average send latency in milliseconds (0 when unmeasured)
    pub avg_latency_ms: f64,
    /// Last send or receive activity on this lane
    pub last_activity: Option<DateTime<Utc>>,
    /// Last keepalive heartbeat observed on this lane
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Current send-queue depth
    pub queue_depth: usize,
    /// Send-queue capacity
    pub queue_capacity: usize,
}

/// Backpressure snapshot for one lane
///
/// `status` reuses the link connectivity enumeration so callers can tell
/// "slow" (Connected/Degraded with a deep queue) from "broken" (Failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackpressureState {
    /// The lane this snapshot describes
    pub lane: LaneClass,
    /// Current send-queue depth
    pub queue_depth: usize,
    /// Send-queue capacity
    pub queue_capacity: usize,
    /// Derived lane status (see [`derive_lane_status`])
    pub status: LinkStatus,
}

impl BackpressureState {
    /// Whether the lane's queue is at capacity
    pub fn is_saturated(&self) -> bool {
        self.queue_depth >= self.queue_capacity
    }
}

/// Derive a lane's reported status from its link status and queue occupancy.
///
/// A lane on an unusable link reports the link status unchanged. On a
/// usable link a saturated queue reports `Degraded`. Monotonic: for a fixed
/// link status, higher occupancy never yields a healthier status.
pub fn derive_lane_status(link: LinkStatus, queue_depth: usize, queue_capacity: usize) -> LinkStatus {
    if !link.is_usable() {
        return link;
    }
    if queue_capacity == 0 || queue_depth >= queue_capacity {
        LinkStatus::Degraded
    } else {
        link
    }
}
