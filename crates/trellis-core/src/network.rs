//! Network capability consumed by the router
//!
//! The [`Network`] trait is the router's only view of the outside world: a
//! way to send a typed message to one node and a way to broadcast to all
//! reachable nodes. It is typically backed by a transport/link pair (see
//! the trellis-transport crate), but the router never learns which wire
//! implementation sits underneath.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::NetworkError;
use crate::node::NodeId;

/// Message-delivery capability for routing and control traffic
///
/// Implementations must be safe to share across tasks; the router invokes
/// `broadcast` from a background task concurrently with foreground calls.
#[async_trait]
pub trait Network: Send + Sync {
    /// Send a typed message to a specific node
    ///
    /// # Errors
    ///
    /// Returns an error if the node is unreachable or the send fails.
    async fn send_message(
        &self,
        target: &NodeId,
        msg_type: &str,
        payload: Bytes,
    ) -> Result<(), NetworkError>;

    /// Broadcast a typed message to all reachable nodes, best effort
    ///
    /// # Errors
    ///
    /// Returns an error only when delivery failed outright (for example no
    /// node received the message); partial delivery is success.
    async fn broadcast(&self, msg_type: &str, payload: Bytes) -> Result<(), NetworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Network stub that records everything it is asked to deliver
    struct RecordingNetwork {
        sent: Mutex<Vec<(NodeId, String, Bytes)>>,
        broadcasts: Mutex<Vec<(String, Bytes)>>,
    }

    #[async_trait]
    impl Network for RecordingNetwork {
        async fn send_message(
            &self,
            target: &NodeId,
            msg_type: &str,
            payload: Bytes,
        ) -> Result<(), NetworkError> {
            self.sent
                .lock()
                .unwrap()
                .push((target.clone(), msg_type.to_string(), payload));
            Ok(())
        }

        async fn broadcast(&self, msg_type: &str, payload: Bytes) -> Result<(), NetworkError> {
            self.broadcasts
                .lock()
                .unwrap()
                .push((msg_type.to_string(), payload));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_network_trait_object_safe() {
        let network: Box<dyn Network> = Box::new(RecordingNetwork {
            sent: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
        });

        network
            .send_message(&NodeId::from("node-b"), "ping", Bytes::from_static(b"hi"))
            .await
            .unwrap();
        network
            .broadcast("route_update", Bytes::from_static(b"table"))
            .await
            .unwrap();
    }
}
