//! Router diagnostics counters
//!
//! Not authoritative: the route table owns the real costs. These maps exist
//! so operators can see rounded cost snapshots, per-peer update volume, and
//! how many malformed entries peers have sent, without taking the table
//! lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use trellis_core::NodeId;

/// Lock-free diagnostics for one router
#[derive(Default)]
pub struct RouterMetrics {
    /// Rounded cost snapshot per destination
    costs: DashMap<NodeId, i64>,
    /// Updates received per source peer, counted whether or not any route
    /// changed
    updates_from: DashMap<NodeId, u64>,
    /// Entries skipped during merge because they failed validation
    invalid_entries: AtomicU64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cost(&self, destination: &NodeId, cost: f64) {
        self.costs.insert(destination.clone(), cost.round() as i64);
    }

    pub fn forget(&self, destination: &NodeId) {
        self.costs.remove(destination);
    }

    pub fn record_update_from(&self, peer: &NodeId) {
        *self.updates_from.entry(peer.clone()).or_insert(0) += 1;
    }

    pub fn record_invalid_entry(&self) {
        self.invalid_entries.fetch_add(1, Ordering::Relaxed);
    }

    /// Rounded cost snapshot for a destination, if tracked
    pub fn cost_snapshot(&self, destination: &NodeId) -> Option<i64> {
        self.costs.get(destination).map(|c| *c)
    }

    /// Number of updates received from a peer
    pub fn updates_from(&self, peer: &NodeId) -> u64 {
        self.updates_from.get(peer).map(|c| *c).unwrap_or(0)
    }

    /// Total malformed entries skipped during merges
    pub fn invalid_entries(&self) -> u64 {
        self.invalid_entries.load(Ordering::Relaxed)
    }

    /// Copy of all cost snapshots
    pub fn costs(&self) -> HashMap<NodeId, i64> {
        self.costs
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }
}
