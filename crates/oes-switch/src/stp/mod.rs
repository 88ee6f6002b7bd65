//! Spanning tree: mode, MST instances and per-instance port states.
//!
//! Instance 0 is the CIST; every VLAN not mapped to an MSTI belongs to it.

mod api;
mod types;

pub use types::{StpMode, StpPortState, StpTable, CIST_ID};
