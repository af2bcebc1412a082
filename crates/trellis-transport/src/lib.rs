//! Transport layer for the Trellis mesh
//!
//! Defines the capability traits the rest of the mesh programs against and
//! one concrete implementation:
//!
//! - [`Transport`]: lifecycle, link management, aggregated statistics
//! - [`Link`]: one logical connection to one remote node, multiplexing
//!   class-of-service lanes with independent backpressure
//! - [`Stream`]: an ordered channel bound to one lane of a link
//! - [`TransportRegistry`]: maps transport-type tags to factories so the
//!   wiring layer picks the wire implementation
//! - [`MemoryTransport`]: channel-backed transport for tests and simulations
//!
//! Routing and higher layers depend only on the traits; swapping the wire
//! implementation is a registry change.

pub mod factory;
pub mod link;
pub mod memory;
pub mod transport;

pub use factory::{TransportFactory, TransportRegistry};
pub use link::{Link, LinkStats, Stream};
pub use memory::{InboundMessage, MemoryHub, MemoryTransport, MemoryTransportFactory};
pub use transport::{Transport, TransportStats};
