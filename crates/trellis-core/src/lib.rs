//! # Trellis Core
//!
//! Core traits, types, and errors for the Trellis mesh.
//!
//! Trellis connects distributed database nodes over a self-healing mesh.
//! This crate holds the shared vocabulary the routing and transport layers
//! are built on, with no behavior of its own beyond validation and state
//! machine rules.
//!
//! ## Key Types
//!
//! - [`NodeId`]: opaque identifier of a mesh node
//! - [`LaneClass`] / [`LaneStats`] / [`BackpressureState`]: class-of-service
//!   lanes and their snapshots
//! - [`LinkStatus`] / [`StreamStatus`]: connection and stream state machines
//! - [`TransportConfig`]: immutable transport construction parameters
//!
//! ## Key Traits
//!
//! - [`Network`]: message delivery capability consumed by the router
//! - [`Clock`]: time abstraction so staleness is testable

pub mod clock;
pub mod config;
pub mod error;
pub mod lane;
pub mod network;
pub mod node;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TransportConfig;
pub use error::{NetworkError, RoutingError, TransportError, TrellisError, TrellisResult};
pub use lane::{
    BackpressureState, LaneClass, LaneStats, LinkStatus, StreamStatus, derive_lane_status,
};
pub use network::Network;
pub use node::NodeId;
