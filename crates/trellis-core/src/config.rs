//! Transport configuration
//!
//! A [`TransportConfig`] is an immutable value consumed once when a
//! transport is constructed. Defaults are fully populated starting points a
//! deployment overrides wholesale; there is no per-field merging at call
//! time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a transport instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Address to listen on (interpretation is up to the wire implementation)
    pub listen_addr: String,
    /// Read buffer size in bytes
    pub read_buffer_size: usize,
    /// Write buffer size in bytes
    pub write_buffer_size: usize,
    /// Maximum size of a single message in bytes
    pub max_message_size: usize,
    /// Timeout for connection handshakes
    pub handshake_timeout: Duration,
    /// Timeout for a single write
    pub write_timeout: Duration,
    /// How long to wait for a pong before declaring the peer gone
    pub pong_timeout: Duration,
    /// Interval between keepalive pings
    pub ping_interval: Duration,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Whether to negotiate per-message compression
    pub enable_compression: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7400".to_string(),
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            max_message_size: 512 * 1024,
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(54),
            max_connections: 1000,
            enable_compression: true,
        }
    }
}
