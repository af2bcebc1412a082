//! Transport factory registry
//!
//! Maps a transport-type tag (e.g. `"websocket"`, `"tcp"`, `"memory"`) to a
//! factory that constructs a [`Transport`] from a [`TransportConfig`]. The
//! wiring layer picks the concrete wire implementation here; nothing above
//! this seam knows which one was chosen.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use trellis_core::{NodeId, TransportConfig};
use trellis_core::error::TransportError;

use crate::transport::Transport;

/// Factory capable of constructing a transport from a configuration
pub trait TransportFactory: Send + Sync {
    /// Build a transport speaking for `local_node`, consuming `config` once
    fn create(
        &self,
        local_node: NodeId,
        config: TransportConfig,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Registry of transport factories keyed by type tag
#[derive(Default)]
pub struct TransportRegistry {
    factories: DashMap<String, Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a transport type, replacing any previous one
    pub fn register(&self, kind: impl Into<String>, factory: Arc<dyn TransportFactory>) {
        let kind = kind.into();
        debug!(kind = %kind, "Registered transport factory");
        self.factories.insert(kind, factory);
    }

    /// Construct a transport of the given type
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::UnsupportedTransportType`] when no
    /// factory is registered for `kind`.
    pub fn create(
        &self,
        kind: &str,
        local_node: NodeId,
        config: TransportConfig,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| TransportError::UnsupportedTransportType(kind.to_string()))?;
        factory.create(local_node, config)
    }

    /// Whether a factory is registered for a transport type
    pub fn supports(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// All registered transport-type tags
    pub fn registered_kinds(&self) -> Vec<String> {
        self.factories.iter().map(|e| e.key().clone()).collect()
    }
}
