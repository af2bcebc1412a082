//! Network capability backed by a transport
//!
//! [`LinkNetwork`] adapts a [`Transport`] to the [`Network`] trait the
//! router consumes. Typed messages travel as a small [`Envelope`] on the
//! control lane; the receive side is driven by the surrounding wiring
//! layer, which decodes envelopes and dispatches them by message type.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use trellis_core::error::NetworkError;
use trellis_core::{LaneClass, Network, NodeId};
use trellis_transport::Transport;

/// Wire framing for typed messages: a type tag plus an opaque payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub msg_type: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(msg_type: &str, payload: Bytes) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            payload: payload.to_vec(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, postcard::Error> {
        postcard::to_allocvec(self).map(Bytes::from)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// [`Network`] implementation sending control traffic over transport links
pub struct LinkNetwork {
    transport: Arc<dyn Transport>,
}

impl LinkNetwork {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Network for LinkNetwork {
    async fn send_message(
        &self,
        target: &NodeId,
        msg_type: &str,
        payload: Bytes,
    ) -> Result<(), NetworkError> {
        let link = self
            .transport
            .link_to(target)
            .ok_or_else(|| NetworkError::PeerNotConnected(target.to_string()))?;

        let bytes = Envelope::new(msg_type, payload)
            .encode()
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;

        link.send(LaneClass::Control, bytes)
            .await
            .map_err(|e| NetworkError::SendFailed(e.to_string()))
    }

    async fn broadcast(&self, msg_type: &str, payload: Bytes) -> Result<(), NetworkError> {
        let links = self.transport.list_links();
        if links.is_empty() {
            // A lone node has nobody to tell; not an error
            return Ok(());
        }

        let bytes = Envelope::new(msg_type, payload)
            .encode()
            .map_err(|e| NetworkError::BroadcastFailed(e.to_string()))?;

        let mut delivered = 0usize;
        for link in &links {
            match link.send(LaneClass::Control, bytes.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        link = link.id(),
                        remote = %link.remote_node(),
                        error = %e,
                        "Broadcast send failed on link"
                    );
                }
            }
        }

        // Partial delivery is success; total failure is not
        if delivered == 0 {
            return Err(NetworkError::BroadcastFailed(format!(
                "all {} links failed",
                links.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::TransportConfig;
    use trellis_transport::{MemoryHub, MemoryTransport};

    #[test]
    fn test_envelope_round_trip() {
        let env = Envelope::new("route_update", Bytes::from_static(b"\x01\x02\x03"));
        let bytes = env.encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();

        assert_eq!(decoded.msg_type, "route_update");
        assert_eq!(decoded.payload, vec![1, 2, 3]);
    }

    fn config(addr: &str) -> TransportConfig {
        TransportConfig {
            listen_addr: addr.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_message_requires_link() {
        let hub = MemoryHub::new();
        let transport =
            Arc::new(MemoryTransport::new(hub, NodeId::from("a"), config("addr-a")).unwrap());
        let network = LinkNetwork::new(transport);

        let result = network
            .send_message(&NodeId::from("b"), "ping", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(NetworkError::PeerNotConnected(_))));
    }

    #[tokio::test]
    async fn test_send_message_travels_on_control_lane() {
        let hub = MemoryHub::new();
        let ta = Arc::new(
            MemoryTransport::new(hub.clone(), NodeId::from("a"), config("addr-a")).unwrap(),
        );
        let tb =
            Arc::new(MemoryTransport::new(hub, NodeId::from("b"), config("addr-b")).unwrap());
        ta.start().await.unwrap();
        tb.start().await.unwrap();

        ta.connect("addr-b", NodeId::from("b"), "a-b".to_string())
            .await
            .unwrap();

        let network = LinkNetwork::new(ta.clone());
        network
            .send_message(&NodeId::from("b"), "ping", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        let msg = tb.recv().await.unwrap();
        assert_eq!(msg.lane, LaneClass::Control);
        let env = Envelope::decode(&msg.payload).unwrap();
        assert_eq!(env.msg_type, "ping");
        assert_eq!(env.payload, b"hello");
    }

    #[tokio::test]
    async fn test_broadcast_with_no_links_is_ok() {
        let hub = MemoryHub::new();
        let transport =
            Arc::new(MemoryTransport::new(hub, NodeId::from("a"), config("addr-a")).unwrap());
        let network = LinkNetwork::new(transport);

        network
            .broadcast("route_update", Bytes::from_static(b"table"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_link() {
        let hub = MemoryHub::new();
        let ta = Arc::new(
            MemoryTransport::new(hub.clone(), NodeId::from("a"), config("addr-a")).unwrap(),
        );
        let tb = Arc::new(
            MemoryTransport::new(hub.clone(), NodeId::from("b"), config("addr-b")).unwrap(),
        );
        let tc =
            Arc::new(MemoryTransport::new(hub, NodeId::from("c"), config("addr-c")).unwrap());
        for t in [&ta, &tb, &tc] {
            t.start().await.unwrap();
        }

        ta.connect("addr-b", NodeId::from("b"), "a-b".to_string())
            .await
            .unwrap();
        ta.connect("addr-c", NodeId::from("c"), "a-c".to_string())
            .await
            .unwrap();

        let network = LinkNetwork::new(ta.clone());
        network
            .broadcast("route_update", Bytes::from_static(b"table"))
            .await
            .unwrap();

        for t in [&tb, &tc] {
            let msg = t.recv().await.unwrap();
            assert_eq!(msg.sender, NodeId::from("a"));
            let env = Envelope::decode(&msg.payload).unwrap();
            assert_eq!(env.msg_type, "route_update");
        }
    }
}
