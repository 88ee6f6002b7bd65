//! FDB types.

use oes_types::{LogPort, MacAddress, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdbEntryType {
    Static,
    Dynamic,
}

/// Key of a unicast or multicast FDB entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FdbKey {
    pub vid: VlanId,
    pub mac: MacAddress,
}

impl FdbKey {
    pub fn new(vid: VlanId, mac: MacAddress) -> Self {
        Self { vid, mac }
    }
}

impl fmt::Display for FdbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.vid, self.mac)
    }
}

/// A unicast FDB entry as passed to and returned from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FdbUcEntry {
    pub vid: VlanId,
    pub mac: MacAddress,
    pub port: LogPort,
    pub entry_type: FdbEntryType,
}

impl FdbUcEntry {
    pub fn new_static(vid: VlanId, mac: MacAddress, port: LogPort) -> Self {
        Self {
            vid,
            mac,
            port,
            entry_type: FdbEntryType::Static,
        }
    }

    pub fn new_dynamic(vid: VlanId, mac: MacAddress, port: LogPort) -> Self {
        Self {
            vid,
            mac,
            port,
            entry_type: FdbEntryType::Dynamic,
        }
    }

    pub fn key(&self) -> FdbKey {
        FdbKey::new(self.vid, self.mac)
    }

    pub fn is_dynamic(&self) -> bool {
        self.entry_type == FdbEntryType::Dynamic
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdbMcEntry {
    pub vid: VlanId,
    pub mac: MacAddress,
    pub ports: Vec<LogPort>,
}

/// Stored unicast entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FdbRecord {
    pub port: LogPort,
    pub entry_type: FdbEntryType,
    pub last_seen: Instant,
}

impl FdbRecord {
    pub fn is_dynamic(&self) -> bool {
        self.entry_type == FdbEntryType::Dynamic
    }

    pub fn to_entry(self, key: &FdbKey) -> FdbUcEntry {
        FdbUcEntry {
            vid: key.vid,
            mac: key.mac,
            port: self.port,
            entry_type: self.entry_type,
        }
    }
}

/// Learning mode, ordered from least to most restrictive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LearnMode {
    /// Learn and install new addresses.
    #[default]
    Auto,
    /// Report new addresses; the client installs them.
    Controlled,
    DontLearn,
}

/// Result of a learning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnOutcome {
    Installed,
    /// Known address on the same port; its age was reset.
    Refreshed,
    /// Known address seen on another port.
    Moved { from: LogPort },
    /// Controlled learning reported the address without installing it.
    Notified,
    /// Learning is disabled for the port or VLAN.
    Disabled,
    /// The port's STP state does not allow learning, or the port is a LAG
    /// member with its collector disabled.
    Blocked,
    /// A static entry owns the address.
    StaticEntry,
}

impl LearnOutcome {
    /// True if the outcome is reported as an `FdbLearned` event.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            LearnOutcome::Installed | LearnOutcome::Moved { .. } | LearnOutcome::Notified
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdbStats {
    pub learned: u64,
    pub moved: u64,
    pub aged: u64,
    pub flushed: u64,
    /// Learning attempts refused because of limits or a full table.
    pub learn_drops: u64,
}
