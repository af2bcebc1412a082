//! Distance-vector routing for the Trellis mesh
//!
//! Each node runs a [`MeshRouter`] that keeps a table of (destination,
//! next hop, cost) rows, broadcasts the full table on a fixed interval,
//! merges peer broadcasts by adopting strictly cheaper routes, and forgets
//! routes that go unrefreshed past a staleness threshold. There is no
//! membership protocol and no withdrawal message: reachability is learned
//! from broadcasts and unlearned by silence.
//!
//! The router sees the world through the `Network` capability from
//! trellis-core; [`LinkNetwork`] binds that capability to transport links.

pub mod metrics;
pub mod net;
pub mod route;
pub mod router;

pub use metrics::RouterMetrics;
pub use net::{Envelope, LinkNetwork};
pub use route::{ROUTE_UPDATE, Route, RouteUpdate};
pub use router::{MeshRouter, RouterConfig};
