//! SPAN types.

use oes_common::{OesError, OesResult, SyncTable};
use oes_types::{LogPort, MacAddress, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorDirection {
    Ingress,
    Egress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpanSessionParams {
    Local {
        tclass: u8,
    },
    /// Mirrored frames are tagged with `vid`/`prio` and sent to `mac`.
    RemoteL2 {
        tclass: u8,
        vid: VlanId,
        prio: u8,
        mac: MacAddress,
    },
}

impl SpanSessionParams {
    pub fn validate(&self) -> OesResult<()> {
        match self {
            SpanSessionParams::Local { tclass } => {
                OesError::check_range("tclass", i64::from(*tclass), 0, 7)
            }
            SpanSessionParams::RemoteL2 {
                tclass, prio, mac, ..
            } => {
                OesError::check_range("tclass", i64::from(*tclass), 0, 7)?;
                OesError::check_range("prio", i64::from(*prio), 0, 7)?;
                if !mac.is_valid_station() {
                    return Err(OesError::param(format!(
                        "remote analyzer MAC {} is not unicast",
                        mac
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanSession {
    pub params: SpanSessionParams,
    pub analyzer: Option<LogPort>,
}

#[derive(Debug, Clone)]
pub struct SpanTable {
    pub(crate) sessions: SyncTable<u8, SpanSession>,
    /// Session each (port, direction) mirrors into.
    pub(crate) mirrors: BTreeMap<(LogPort, MirrorDirection), u8>,
}

impl SpanTable {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: SyncTable::with_capacity_limit("span session", max_sessions),
            mirrors: BTreeMap::new(),
        }
    }

    pub fn session(&self, id: u8) -> OesResult<&SpanSession> {
        self.sessions.lookup(&id)
    }

    pub fn mirrors_into(&self, session: u8) -> impl Iterator<Item = &(LogPort, MirrorDirection)> {
        self.mirrors
            .iter()
            .filter(move |(_, s)| **s == session)
            .map(|(k, _)| k)
    }

    pub fn is_analyzer(&self, port: LogPort) -> bool {
        self.sessions.values().any(|s| s.analyzer == Some(port))
    }

    /// True if `port` mirrors into any session, in either direction.
    pub fn is_mirrored(&self, port: LogPort) -> bool {
        self.mirrors.keys().any(|(p, _)| *p == port)
    }

    /// Drops the mirror bindings of `port`.
    pub(crate) fn remove_port(&mut self, port: LogPort) {
        self.mirrors.retain(|(p, _), _| *p != port);
    }
}
