//! Logical port, bridge and port state definitions.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a bridge (switch partition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeId(pub u16);

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "br{}", self.0)
    }
}

/// Logical port identifier.
///
/// Physical ports carry the id from the port inventory. LAG ports are
/// allocated by the switch and have [`LogPort::LAG_FLAG`] set, with the LAG
/// index in the low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogPort(pub u32);

impl LogPort {
    pub const LAG_FLAG: u32 = 0x2000_0000;

    /// Creates the logical port of LAG `index`.
    pub const fn lag(index: u16) -> Self {
        LogPort(Self::LAG_FLAG | index as u32)
    }

    pub const fn is_lag(&self) -> bool {
        self.0 & Self::LAG_FLAG != 0
    }

    /// Returns the LAG index if this is a LAG port.
    pub const fn lag_index(&self) -> Option<u16> {
        if self.is_lag() {
            Some((self.0 & 0xffff) as u16)
        } else {
            None
        }
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LogPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lag_index() {
            Some(index) => write!(f, "lag{}", index),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for LogPort {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if let Some(index) = lower.strip_prefix("lag") {
            let index: u16 = index
                .parse()
                .map_err(|_| ParseError::InvalidLogPort(s.to_string()))?;
            return Ok(LogPort::lag(index));
        }

        let id: u32 = lower
            .parse()
            .map_err(|_| ParseError::InvalidLogPort(s.to_string()))?;
        if id & Self::LAG_FLAG != 0 {
            return Err(ParseError::InvalidLogPort(s.to_string()));
        }
        Ok(LogPort(id))
    }
}

/// Administrative state of a port or router interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    #[default]
    Down,
    Up,
}

impl AdminState {
    pub const fn is_up(&self) -> bool {
        matches!(self, AdminState::Up)
    }
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminState::Up => write!(f, "up"),
            AdminState::Down => write!(f, "down"),
        }
    }
}

impl FromStr for AdminState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(AdminState::Up),
            "down" => Ok(AdminState::Down),
            _ => Err(ParseError::InvalidPortState(format!(
                "invalid admin state: {}",
                s
            ))),
        }
    }
}

/// Operational state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    #[default]
    Down,
    Up,
}

impl OperState {
    pub const fn is_up(&self) -> bool {
        matches!(self, OperState::Up)
    }
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperState::Up => write!(f, "up"),
            OperState::Down => write!(f, "down"),
        }
    }
}
