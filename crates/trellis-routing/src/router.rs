//! Distance-vector mesh router
//!
//! The [`MeshRouter`] owns the routing table: a map from destination to
//! [`Route`], guarded by one read/write lock. Foreground calls mutate and
//! query it; two background tasks started by [`MeshRouter::start`] keep it
//! live:
//!
//! 1. **Broadcast**: on a fixed interval, and immediately after a local
//!    write marks the table dirty, snapshot the table and broadcast it as a
//!    [`RouteUpdate`]. Broadcast failures are logged, never returned to the
//!    writer; the next tick resends the then-current table.
//! 2. **Sweep**: on a fixed interval, drop routes whose `last_update` age
//!    exceeds the staleness threshold. There is no withdrawal message in
//!    this protocol; a silent peer is forgotten only by this sweep.
//!
//! Merging is standard distance-vector relaxation: an incoming route is
//! adopted only when the destination is unknown or the incoming cost is
//! strictly lower. Ties keep the incumbent, so equal-cost churn is
//! impossible.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, trace, warn};

use trellis_core::error::RoutingError;
use trellis_core::{Clock, Network, NodeId, SystemClock};

use crate::metrics::RouterMetrics;
use crate::route::{ROUTE_UPDATE, Route, RouteUpdate};

/// Timing knobs for the router's background protocols
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Interval between full-table broadcasts
    pub broadcast_interval: Duration,
    /// Interval between stale-route sweeps
    pub sweep_interval: Duration,
    /// Age beyond which a route is purged
    pub stale_after: Duration,
    /// How long `stop` waits for each background task to acknowledge
    pub shutdown_grace: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

type RouteTable = Arc<RwLock<HashMap<NodeId, Route>>>;

/// Distance-vector router for one mesh node
pub struct MeshRouter<N: Network + 'static> {
    node: NodeId,
    network: Arc<N>,
    clock: Arc<dyn Clock>,
    config: RouterConfig,
    table: RouteTable,
    metrics: Arc<RouterMetrics>,
    /// Signalled by local writes so the broadcaster does not wait for the
    /// next tick
    dirty: Arc<Notify>,
    shutdown: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: RwLock<bool>,
}

impl<N: Network + 'static> MeshRouter<N> {
    pub fn new(node: NodeId, network: Arc<N>) -> Self {
        Self::with_config(node, network, RouterConfig::default())
    }

    pub fn with_config(node: NodeId, network: Arc<N>, config: RouterConfig) -> Self {
        Self::with_clock(node, network, config, Arc::new(SystemClock::new()))
    }

    /// Full constructor; tests inject a manual clock to drive staleness
    pub fn with_clock(
        node: NodeId,
        network: Arc<N>,
        config: RouterConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(4);
        Self {
            node,
            network,
            clock,
            config,
            table: Arc::new(RwLock::new(HashMap::new())),
            metrics: Arc::new(RouterMetrics::new()),
            dirty: Arc::new(Notify::new()),
            shutdown,
            tasks: Mutex::new(Vec::new()),
            running: RwLock::new(false),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn metrics(&self) -> Arc<RouterMetrics> {
        self.metrics.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Insert or overwrite a route
    ///
    /// The table write succeeds or fails synchronously; dissemination of the
    /// change is asynchronous and best effort.
    ///
    /// # Errors
    ///
    /// Fails with [`RoutingError::InvalidRoute`] when the route has an empty
    /// endpoint or a cost that is negative or not finite. The table is left
    /// unchanged in that case.
    pub async fn update_route(&self, mut route: Route) -> Result<(), RoutingError> {
        route.validate()?;
        route.last_update = self.clock.monotonic_nanos();

        debug!(
            node = %self.node,
            dest = %route.destination,
            next_hop = %route.next_hop,
            cost = route.cost,
            "Route updated"
        );

        self.metrics.record_cost(&route.destination, route.cost);
        self.table
            .write()
            .await
            .insert(route.destination.clone(), route);
        self.dirty.notify_one();
        Ok(())
    }

    /// Merge a peer's table broadcast
    ///
    /// Never fails: malformed entries are counted and skipped, routes to
    /// this node are ignored, and an entry is adopted only when it is new or
    /// strictly cheaper than the incumbent. Adopted routes are restamped
    /// with the local clock, since peer clocks are not comparable to ours.
    pub async fn handle_route_update(&self, update: RouteUpdate) {
        self.metrics.record_update_from(&update.source);

        let now = self.clock.monotonic_nanos();
        let mut adopted = 0usize;
        let mut table = self.table.write().await;

        for (dest, mut route) in update.routes {
            if dest == self.node {
                trace!(node = %self.node, source = %update.source, "Skipping route to self");
                continue;
            }
            if route.destination != dest || route.validate().is_err() {
                self.metrics.record_invalid_entry();
                debug!(
                    node = %self.node,
                    source = %update.source,
                    dest = %dest,
                    "Skipping invalid route entry"
                );
                continue;
            }

            let adopt = match table.get(&dest) {
                None => true,
                Some(current) => route.cost < current.cost,
            };
            if adopt {
                route.last_update = now;
                self.metrics.record_cost(&dest, route.cost);
                table.insert(dest, route);
                adopted += 1;
            }
        }
        drop(table);

        if adopted > 0 {
            debug!(
                node = %self.node,
                source = %update.source,
                adopted,
                "Merged route update"
            );
        }
    }

    /// Route to a destination, if known
    pub async fn route(&self, destination: &NodeId) -> Option<Route> {
        self.table.read().await.get(destination).cloned()
    }

    /// Next hop toward a destination
    ///
    /// # Errors
    ///
    /// Fails with [`RoutingError::NoRoute`] when the destination is unknown.
    pub async fn next_hop(&self, destination: &NodeId) -> Result<NodeId, RoutingError> {
        self.table
            .read()
            .await
            .get(destination)
            .map(|r| r.next_hop.clone())
            .ok_or_else(|| RoutingError::NoRoute(destination.to_string()))
    }

    /// Cost toward a destination
    ///
    /// # Errors
    ///
    /// Fails with [`RoutingError::NoRoute`] when the destination is unknown.
    pub async fn cost(&self, destination: &NodeId) -> Result<f64, RoutingError> {
        self.table
            .read()
            .await
            .get(destination)
            .map(|r| r.cost)
            .ok_or_else(|| RoutingError::NoRoute(destination.to_string()))
    }

    /// Snapshot copy of the whole table
    ///
    /// The copy is detached: later router mutations never show through it.
    pub async fn all_routes(&self) -> HashMap<NodeId, Route> {
        self.table.read().await.clone()
    }

    /// Run one staleness sweep now; returns the number of routes purged
    pub async fn evict_stale(&self) -> usize {
        sweep_stale(
            &self.node,
            &self.table,
            &self.metrics,
            self.clock.as_ref(),
            self.config.stale_after,
        )
        .await
    }

    /// Start the broadcast and sweep background tasks; idempotent
    pub async fn start(&self) {
        let mut running = self.running.write().await;
        if *running {
            return;
        }
        *running = true;

        let mut tasks = self.tasks.lock().await;

        // Broadcaster: periodic tick, woken early by local writes
        {
            let node = self.node.clone();
            let table = self.table.clone();
            let network = self.network.clone();
            let clock = self.clock.clone();
            let dirty = self.dirty.clone();
            let mut shutdown = self.shutdown.subscribe();
            let period = self.config.broadcast_interval;
            tasks.push(tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = dirty.notified() => {}
                        _ = shutdown.recv() => break,
                    }
                    broadcast_table(&node, &table, network.as_ref(), clock.as_ref()).await;
                }
                debug!(node = %node, "Broadcast task stopped");
            }));
        }

        // Sweeper: periodic staleness eviction
        {
            let node = self.node.clone();
            let table = self.table.clone();
            let metrics = self.metrics.clone();
            let clock = self.clock.clone();
            let mut shutdown = self.shutdown.subscribe();
            let period = self.config.sweep_interval;
            let stale_after = self.config.stale_after;
            tasks.push(tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // Skip the immediate first tick; a fresh table has nothing
                // stale in it
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = shutdown.recv() => break,
                    }
                    sweep_stale(&node, &table, &metrics, clock.as_ref(), stale_after).await;
                }
                debug!(node = %node, "Sweep task stopped");
            }));
        }

        info!(node = %self.node, "Router started");
    }

    /// Signal both background tasks to stop and wait for each to acknowledge
    ///
    /// Waiting is bounded by `shutdown_grace` per task; a task that misses
    /// the grace window is aborted.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        let _ = self.shutdown.send(());

        let mut tasks = self.tasks.lock().await;
        for mut handle in tasks.drain(..) {
            match timeout(self.config.shutdown_grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(node = %self.node, error = %e, "Background task failed"),
                Err(_) => {
                    warn!(
                        node = %self.node,
                        grace_ms = self.config.shutdown_grace.as_millis() as u64,
                        "Background task missed shutdown grace; aborting"
                    );
                    handle.abort();
                }
            }
        }

        info!(node = %self.node, "Router stopped");
    }
}

/// Snapshot the table and broadcast it; failures are logged only
async fn broadcast_table<N: Network>(
    node: &NodeId,
    table: &RwLock<HashMap<NodeId, Route>>,
    network: &N,
    clock: &dyn Clock,
) {
    let snapshot = table.read().await.clone();
    if snapshot.is_empty() {
        trace!(node = %node, "Nothing to broadcast");
        return;
    }

    let update = RouteUpdate::new(node.clone(), snapshot, clock);
    let bytes = match update.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(node = %node, error = %e, "Failed to encode route update");
            return;
        }
    };

    if let Err(e) = network.broadcast(ROUTE_UPDATE, bytes).await {
        warn!(node = %node, error = %e, "Route broadcast failed");
    }
}

/// Purge routes older than the threshold from the table and the metrics
async fn sweep_stale(
    node: &NodeId,
    table: &RwLock<HashMap<NodeId, Route>>,
    metrics: &RouterMetrics,
    clock: &dyn Clock,
    stale_after: Duration,
) -> usize {
    let now = clock.monotonic_nanos();
    let mut removed = Vec::new();

    {
        let mut table = table.write().await;
        table.retain(|dest, route| {
            if route.age(now) > stale_after {
                removed.push(dest.clone());
                false
            } else {
                true
            }
        });
    }

    for dest in &removed {
        metrics.forget(dest);
    }
    if !removed.is_empty() {
        debug!(node = %node, purged = removed.len(), "Purged stale routes");
    }
    removed.len()
}
