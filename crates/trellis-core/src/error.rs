//! Error types for the Trellis mesh

use thiserror::Error;

/// Top-level error type for Trellis
#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors related to routing
///
/// Lookup misses ([`RoutingError::NoRoute`]) are ordinary, expected
/// outcomes (a freshly joined node simply has no route yet) and are
/// kept distinguishable from malformed input by variant.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("No route to destination: {0}")]
    NoRoute(String),
}

/// Errors related to the network capability
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("Peer not connected: {0}")]
    PeerNotConnected(String),
}

/// Errors related to transport, links, and streams
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Handshake timed out after {0} ms")]
    HandshakeTimeout(u64),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Link not found: {0}")]
    LinkNotFound(String),

    #[error("Link is closed: {0}")]
    LinkClosed(String),

    #[error("Stream is closed: {0}")]
    StreamClosed(u64),

    #[error("Unsupported transport type: {0}")]
    UnsupportedTransportType(String),

    #[error("Transport fault [{kind}]: {message} ({detail})")]
    Fault {
        kind: String,
        message: String,
        detail: String,
    },
}

/// Result type alias for Trellis operations
pub type TrellisResult<T> = Result<T, TrellisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_error_display() {
        let err = RoutingError::InvalidRoute("empty destination".to_string());
        assert!(format!("{}", err).contains("Invalid route"));
        assert!(format!("{}", err).contains("empty destination"));

        let err = RoutingError::NoRoute("db-node-9".to_string());
        assert!(format!("{}", err).contains("No route"));
        assert!(format!("{}", err).contains("db-node-9"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::MessageTooLarge {
            size: 1_000_000,
            max: 524_288,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1000000"));
        assert!(msg.contains("524288"));

        let err = TransportError::UnsupportedTransportType("carrier-pigeon".to_string());
        assert!(format!("{}", err).contains("carrier-pigeon"));

        let err = TransportError::Fault {
            kind: "io".to_string(),
            message: "socket reset".to_string(),
            detail: "ECONNRESET".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("io"));
        assert!(msg.contains("socket reset"));
        assert!(msg.contains("ECONNRESET"));
    }

    #[test]
    fn test_network_error_display() {
        let err = NetworkError::PeerNotConnected("node-c".to_string());
        assert!(format!("{}", err).contains("node-c"));

        let err = NetworkError::BroadcastFailed("no links".to_string());
        assert!(format!("{}", err).contains("no links"));
    }

    #[test]
    fn test_error_conversions() {
        let routing_err = RoutingError::NoRoute("x".to_string());
        let err: TrellisError = routing_err.into();
        assert!(matches!(err, TrellisError::Routing(_)));

        let network_err = NetworkError::SendFailed("closed".to_string());
        let err: TrellisError = network_err.into();
        assert!(matches!(err, TrellisError::Network(_)));

        let transport_err = TransportError::ConnectionClosed;
        let err: TrellisError = transport_err.into();
        assert!(matches!(err, TrellisError::Transport(_)));
    }
}
