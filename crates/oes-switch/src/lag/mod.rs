//! Link aggregation groups.
//!
//! A LAG is a logical port of the bridge it was created on. Its members are
//! physical ports of that bridge; traffic is distributed over the members
//! whose distributor is enabled by [`flow_hash`](oes_common::flow_hash).

mod api;
mod types;

pub use types::{Lag, LagHashParams, LagMember, LagTable};
