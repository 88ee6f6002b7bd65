//! Asynchronous event delivery.
//!
//! Clients open an [`EventChannel`] and register it for an event kind on a
//! bridge. The switch publishes [`EventInfo`] records to every channel
//! registered for the event's kind and bridge.

mod api;
mod hub;
mod types;

pub use hub::{EventChannel, EventHub};
pub use types::{Event, EventInfo, EventKind};
