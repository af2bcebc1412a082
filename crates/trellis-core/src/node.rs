//! Node identifiers
//!
//! Every participant in the mesh is named by a [`NodeId`], an opaque
//! string assigned at deployment time (typically the database node's
//! stable name). Routing and transport code treats it as a pure key.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a mesh node
///
/// An empty id is representable (inbound route updates from peers may
/// carry one) but is rejected by route validation rather than at
/// construction, so defensive merge paths can observe and count it.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the id is empty (invalid for routing)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
