//! Bridges (switch partitions) and their member ports.

mod api;
mod types;

pub use types::Bridge;
