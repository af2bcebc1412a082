//! Transport capability trait
//!
//! A [`Transport`] owns zero or more links, one per remote node it is
//! connected to, and aggregates their statistics. Concrete wire
//! implementations are selected at process wiring time through the factory
//! registry (see [`crate::factory`]); everything above this trait is
//! implementation-agnostic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use trellis_core::NodeId;
use trellis_core::error::TransportError;

use crate::link::{Link, LinkStats};

/// Transport capability: lifecycle, connection management, statistics
#[async_trait]
pub trait Transport: Send + Sync {
    /// The local node this transport speaks for
    fn local_node(&self) -> &NodeId;

    /// Start the transport (begin listening/accepting); idempotent
    async fn start(&self) -> Result<(), TransportError>;

    /// Stop the transport and close all links; idempotent
    async fn stop(&self) -> Result<(), TransportError>;

    /// Connect to a remote node, creating a new link
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::ConnectionFailed`] or
    /// [`TransportError::HandshakeTimeout`] when wire negotiation fails or
    /// exceeds the configured handshake timeout.
    async fn connect(
        &self,
        remote_addr: &str,
        node_id: NodeId,
        link_id: String,
    ) -> Result<Arc<dyn Link>, TransportError>;

    /// Look up a link by its id
    fn link(&self, link_id: &str) -> Option<Arc<dyn Link>>;

    /// Look up the link to a remote node, if one exists
    fn link_to(&self, node: &NodeId) -> Option<Arc<dyn Link>>;

    /// All links currently owned by this transport
    fn list_links(&self) -> Vec<Arc<dyn Link>>;

    /// Close a link and release all of its streams
    async fn close_link(&self, link_id: &str) -> Result<(), TransportError>;

    /// Nested statistics snapshot: transport → link → lane
    fn stats(&self) -> TransportStats;
}

/// Aggregated statistics for a transport and all of its links
#[derive(Debug, Clone)]
pub struct TransportStats {
    /// The local node the transport speaks for
    pub local_node: NodeId,
    /// Per-link statistics, keyed by link id
    pub links: HashMap<String, LinkStats>,
}

impl TransportStats {
    /// Number of links in the snapshot
    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}
