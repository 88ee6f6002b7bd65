//! Forwarding database: unicast and multicast MAC tables, learning, aging
//! and the L2 forwarding decision.
//!
//! Unicast entries are keyed by (VID, MAC) and walked in that order.
//! Static entries are only removed by explicit deletion; every flush and
//! aging pass touches dynamic entries only.

mod api;
mod forward;
mod table;
mod types;

pub use forward::L2Egress;
pub use table::FdbTable;
pub use types::{
    FdbEntryType, FdbKey, FdbMcEntry, FdbStats, FdbUcEntry, LearnMode, LearnOutcome,
};
