//! Route table rows and the dissemination envelope
//!
//! A [`Route`] is one row of the distance-vector table. A [`RouteUpdate`]
//! packages a full table snapshot for broadcast; it is built fresh for each
//! dissemination tick and discarded after the receiver merges it.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trellis_core::error::RoutingError;
use trellis_core::{Clock, NodeId};

/// Message type tag carried by route dissemination broadcasts
pub const ROUTE_UPDATE: &str = "route_update";

/// One row of the distance-vector table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Destination node
    pub destination: NodeId,
    /// Neighbor to forward through to reach the destination
    pub next_hop: NodeId,
    /// Path cost; lower is better
    pub cost: f64,
    /// Monotonic nanoseconds at the owning router when last written
    pub last_update: i64,
}

impl Route {
    /// Build a route stamped with the given clock
    pub fn new(destination: NodeId, next_hop: NodeId, cost: f64, clock: &dyn Clock) -> Self {
        Self {
            destination,
            next_hop,
            cost,
            last_update: clock.monotonic_nanos(),
        }
    }

    /// Check the route invariants: non-empty endpoints, finite non-negative
    /// cost
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.destination.is_empty() {
            return Err(RoutingError::InvalidRoute("empty destination".to_string()));
        }
        if self.next_hop.is_empty() {
            return Err(RoutingError::InvalidRoute("empty next_hop".to_string()));
        }
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(RoutingError::InvalidRoute(format!(
                "cost {} is not a finite non-negative number",
                self.cost
            )));
        }
        Ok(())
    }

    /// Age of this route relative to `now` on the same clock
    pub fn age(&self, now_nanos: i64) -> Duration {
        Duration::from_nanos(now_nanos.saturating_sub(self.last_update).max(0) as u64)
    }
}

/// Full-table broadcast envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteUpdate {
    /// Node whose table this is
    pub source: NodeId,
    /// Routes keyed by destination
    pub routes: HashMap<NodeId, Route>,
    /// Wall-clock time the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

impl RouteUpdate {
    pub fn new(source: NodeId, routes: HashMap<NodeId, Route>, clock: &dyn Clock) -> Self {
        Self {
            source,
            routes,
            timestamp: clock.now_utc(),
        }
    }

    /// Serialize for the wire
    pub fn encode(&self) -> Result<Bytes, postcard::Error> {
        postcard::to_allocvec(self).map(Bytes::from)
    }

    /// Deserialize from the wire
    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
