//! L3 routing tables.
//!
//! A switch holds up to `max_routers` routers (VRFs). Each router owns a
//! neighbor table, a unicast route table and a multicast route table.
//! Router interfaces attach a router to a VLAN or a port of a bridge and
//! are numbered switch-wide.

mod api;
mod rif;
mod table;
mod types;
mod vrf;

pub use rif::RouterInterface;
pub use table::{Router, RouterSnapshot};
pub use types::{
    EcmpHashParams, L3Interface, McDecision, McRouteData, McRouteEntry, McRouteKey, NeighData,
    NeighEntry, RifAttributes, RifCounters, RifState, RouteDecision, RouterAction,
    RouterAttributes, UcRouteData, UcRouteEntry,
};
pub use vrf::Vrf;
