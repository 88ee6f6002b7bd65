//! Port mirroring (SPAN).
//!
//! A session describes where mirrored traffic goes: a local analyzer port,
//! or a remote analyzer reached through an L2 encapsulation. Ports are bound
//! to a session per direction.

mod api;
mod types;

pub use types::{MirrorDirection, SpanSession, SpanSessionParams, SpanTable};
