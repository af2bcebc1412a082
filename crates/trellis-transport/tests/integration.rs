//! End-to-end tests for the transport layer: factory wiring, a small mesh
//! over the memory transport, lane isolation under load, and lifecycle.

use std::sync::Arc;

use bytes::Bytes;

use trellis_core::error::TransportError;
use trellis_core::{LaneClass, LinkStatus, NodeId, TransportConfig};
use trellis_transport::{
    MemoryHub, MemoryTransport, MemoryTransportFactory, Transport, TransportRegistry,
};

fn config(addr: &str) -> TransportConfig {
    TransportConfig {
        listen_addr: addr.to_string(),
        ..Default::default()
    }
}

/// Build `n` started transports on one hub through the factory registry
async fn build_mesh(n: usize) -> (TransportRegistry, Vec<Arc<dyn Transport>>) {
    let registry = TransportRegistry::new();
    let hub = MemoryHub::new();
    registry.register("memory", Arc::new(MemoryTransportFactory::new(hub)));

    let transports: Vec<Arc<dyn Transport>> = (0..n)
        .map(|i| {
            registry
                .create(
                    "memory",
                    NodeId::from(format!("node-{i}").as_str()),
                    config(&format!("addr-{i}")),
                )
                .expect("create transport")
        })
        .collect();
    for t in &transports {
        t.start().await.expect("start");
    }

    (registry, transports)
}

#[tokio::test]
async fn test_factory_registry_end_to_end() {
    let (registry, transports) = build_mesh(2).await;

    assert!(registry.supports("memory"));
    assert!(matches!(
        registry.create("quic", NodeId::from("x"), TransportConfig::default()),
        Err(TransportError::UnsupportedTransportType(_))
    ));

    let link = transports[0]
        .connect("addr-1", NodeId::from("node-1"), "0-1".to_string())
        .await
        .expect("connect");
    assert_eq!(link.status(), LinkStatus::Connected);
    assert_eq!(link.remote_node(), &NodeId::from("node-1"));
}

#[tokio::test]
async fn test_full_mesh_connectivity() {
    let (_registry, transports) = build_mesh(4).await;

    // Every node dials every higher-numbered node; accept links cover the rest
    for i in 0..transports.len() {
        for j in (i + 1)..transports.len() {
            transports[i]
                .connect(
                    &format!("addr-{j}"),
                    NodeId::from(format!("node-{j}").as_str()),
                    format!("{i}-{j}"),
                )
                .await
                .expect("connect");
        }
    }

    for (i, t) in transports.iter().enumerate() {
        assert_eq!(
            t.list_links().len(),
            transports.len() - 1,
            "node-{i} should see every peer"
        );
        for j in 0..transports.len() {
            if i == j {
                continue;
            }
            let peer = NodeId::from(format!("node-{j}").as_str());
            assert!(t.link_to(&peer).is_some(), "node-{i} missing link to {peer}");
        }
    }
}

#[tokio::test]
async fn test_bulk_flood_does_not_starve_control() {
    let registry = TransportRegistry::new();
    let hub = MemoryHub::new();
    registry.register("memory", Arc::new(MemoryTransportFactory::new(hub.clone())));

    let sender = registry
        .create("memory", NodeId::from("sender"), config("addr-sender"))
        .expect("create");
    // Small ingress buffers so the flood saturates quickly
    let receiver = MemoryTransport::new(
        hub,
        NodeId::from("receiver"),
        TransportConfig {
            listen_addr: "addr-receiver".to_string(),
            read_buffer_size: 8,
            ..Default::default()
        },
    )
    .expect("create receiver");
    sender.start().await.expect("start");
    receiver.start().await.expect("start");

    let link = sender
        .connect("addr-receiver", NodeId::from("receiver"), "s-r".to_string())
        .await
        .expect("connect");

    // Flood bulk until the lane refuses; the refusal is the backpressure
    // signal, the sender is never blocked
    let mut accepted = 0;
    loop {
        match link.send(LaneClass::Bulk, Bytes::from_static(b"flood")).await {
            Ok(()) => accepted += 1,
            Err(TransportError::SendFailed(_)) => break,
            Err(other) => panic!("unexpected error: {other}"),
        }
        assert!(accepted <= 8, "bulk lane accepted more than its capacity");
    }
    assert_eq!(accepted, 8);

    // Control sends still succeed while bulk is saturated
    for _ in 0..3 {
        link.send(LaneClass::Control, Bytes::from_static(b"ctl"))
            .await
            .expect("control send under bulk saturation");
    }

    // The receiver drains control first
    for _ in 0..3 {
        let msg = receiver.recv().await.expect("recv");
        assert_eq!(msg.lane, LaneClass::Control);
    }
    let msg = receiver.recv().await.expect("recv");
    assert_eq!(msg.lane, LaneClass::Bulk);
}

#[tokio::test]
async fn test_stats_aggregate_across_links() {
    let (_registry, transports) = build_mesh(3).await;

    let l1 = transports[0]
        .connect("addr-1", NodeId::from("node-1"), "0-1".to_string())
        .await
        .expect("connect");
    let l2 = transports[0]
        .connect("addr-2", NodeId::from("node-2"), "0-2".to_string())
        .await
        .expect("connect");

    l1.send(LaneClass::Control, Bytes::from_static(b"aa"))
        .await
        .expect("send");
    l2.send(LaneClass::Bulk, Bytes::from_static(b"bbbb"))
        .await
        .expect("send");
    l2.send(LaneClass::Bulk, Bytes::from_static(b"cc"))
        .await
        .expect("send");

    let stats = transports[0].stats();
    assert_eq!(stats.link_count(), 2);
    assert_eq!(stats.links["0-1"].messages_sent(), 1);
    assert_eq!(stats.links["0-1"].bytes_sent(), 2);
    assert_eq!(stats.links["0-2"].messages_sent(), 2);
    assert_eq!(stats.links["0-2"].bytes_sent(), 6);
}

#[tokio::test]
async fn test_send_after_remote_stop_backpressures() {
    let hub = MemoryHub::new();
    let sender = MemoryTransport::new(hub.clone(), NodeId::from("a"), config("addr-a"))
        .expect("create sender");
    let receiver = MemoryTransport::new(
        hub,
        NodeId::from("b"),
        TransportConfig {
            listen_addr: "addr-b".to_string(),
            read_buffer_size: 8,
            ..Default::default()
        },
    )
    .expect("create receiver");
    sender.start().await.expect("start");
    receiver.start().await.expect("start");

    let link = sender
        .connect("addr-b", NodeId::from("b"), "a-b".to_string())
        .await
        .expect("connect");

    receiver.stop().await.expect("stop");

    // Nobody drains a stopped endpoint, so the lane fills and refuses
    let mut failed = false;
    for _ in 0..20 {
        if link
            .send(LaneClass::Control, Bytes::from_static(b"x"))
            .await
            .is_err()
        {
            failed = true;
            break;
        }
    }
    assert!(failed, "sends kept succeeding after remote stop");
}

#[tokio::test]
async fn test_streams_multiplex_one_link() {
    let (_registry, transports) = build_mesh(2).await;

    let link = transports[0]
        .connect("addr-1", NodeId::from("node-1"), "0-1".to_string())
        .await
        .expect("connect");

    let control = link.open_stream(LaneClass::Control, 0).await.expect("open");
    let bulk_lo = link.open_stream(LaneClass::Bulk, 1).await.expect("open");
    let bulk_hi = link.open_stream(LaneClass::Bulk, 9).await.expect("open");

    // Ids are unique within the link
    let mut ids = vec![control.id(), bulk_lo.id(), bulk_hi.id()];
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    assert_eq!(link.streams().len(), 3);

    control.send(Bytes::from_static(b"c")).await.expect("send");
    bulk_hi.send(Bytes::from_static(b"b")).await.expect("send");

    bulk_lo.close().await.expect("close");
    assert_eq!(link.streams().len(), 2);
}
