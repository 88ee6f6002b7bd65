//! Common abstractions for the OES forwarding-state manager.
//!
//! This crate provides the pieces every table manager in `oes-switch` is
//! built from:
//!
//! - [`OesStatus`] / [`OesError`]: the vendor status-code taxonomy and the
//!   typed error that maps onto it
//! - [`AccessCmd`], [`GetCmd`], [`CounterCmd`]: command enums accepted by
//!   set/get operations
//! - [`SyncTable`]: ordered table that never auto-creates entries and
//!   implements GET / GET_FIRST / GET_NEXT iteration
//! - [`flow_hash`]: deterministic flow hashing shared by LAG and ECMP
//!   distribution

mod cmd;
mod error;
mod hash;
mod status;
mod table;

pub use cmd::{AccessCmd, CounterCmd, GetCmd};
pub use error::{BatchFailure, OesError, OesResult};
pub use hash::{flow_hash, FlowFields, HashAlgorithm, HashFieldSet};
pub use status::OesStatus;
pub use table::{HasRefCount, SyncTable};
