//! Event types.

use chrono::{DateTime, Utc};
use oes_types::{BridgeId, LogPort, MacAddress, OperState, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of events a channel can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PortOperState,
    FdbLearned,
    FdbAged,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::PortOperState => "PORT_OPER_STATE",
            EventKind::FdbLearned => "FDB_LEARNED",
            EventKind::FdbAged => "FDB_AGED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PortOperState {
        port: LogPort,
        state: OperState,
    },
    /// A new source address was seen. `installed` is false when the learn
    /// mode is controlled and the entry awaits installation by the client.
    FdbLearned {
        vid: VlanId,
        mac: MacAddress,
        port: LogPort,
        installed: bool,
    },
    FdbAged {
        vid: VlanId,
        mac: MacAddress,
        port: LogPort,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PortOperState { .. } => EventKind::PortOperState,
            Event::FdbLearned { .. } => EventKind::FdbLearned,
            Event::FdbAged { .. } => EventKind::FdbAged,
        }
    }
}

/// An event as received from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub bridge: BridgeId,
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}

impl EventInfo {
    pub fn new(bridge: BridgeId, event: Event) -> Self {
        Self {
            bridge,
            event,
            timestamp: Utc::now(),
        }
    }
}
