//! Access command enums.

use crate::error::{OesError, OesResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command passed to set-style operations.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessCmd {
    Add = 1,
    Edit = 2,
    Delete = 3,
    DeleteAll = 4,
    Test = 8,
    Apply = 9,
    Enable = 10,
    Disable = 11,
    Create = 12,
    Destroy = 13,
}

impl AccessCmd {
    /// Fails with `CMD_UNSUPPORTED` unless the command is one of `allowed`.
    pub fn ensure_one_of(self, allowed: &[AccessCmd], op: &'static str) -> OesResult<()> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(OesError::CmdUnsupported {
                cmd: self.to_string(),
                op,
            })
        }
    }
}

impl fmt::Display for AccessCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessCmd::Add => "ADD",
            AccessCmd::Edit => "EDIT",
            AccessCmd::Delete => "DELETE",
            AccessCmd::DeleteAll => "DELETE_ALL",
            AccessCmd::Test => "TEST",
            AccessCmd::Apply => "APPLY",
            AccessCmd::Enable => "ENABLE",
            AccessCmd::Disable => "DISABLE",
            AccessCmd::Create => "CREATE",
            AccessCmd::Destroy => "DESTROY",
        };
        write!(f, "{}", s)
    }
}

/// Command passed to table read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetCmd {
    /// Exactly the given key.
    Get,
    /// The first n entries in key order.
    GetFirst,
    /// Up to n entries strictly after the given key.
    GetNext,
    /// Like `Get`, additionally returning and clearing the activity bit.
    GetActivity,
}

impl fmt::Display for GetCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GetCmd::Get => "GET",
            GetCmd::GetFirst => "GET_FIRST",
            GetCmd::GetNext => "GET_NEXT",
            GetCmd::GetActivity => "GET_ACTIVITY",
        };
        write!(f, "{}", s)
    }
}

/// Command passed to counter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterCmd {
    Read,
    ReadClear,
}

impl CounterCmd {
    pub fn clears(&self) -> bool {
        matches!(self, CounterCmd::ReadClear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::OesStatus;

    #[test]
    fn test_ensure_one_of() {
        assert!(AccessCmd::Add
            .ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "vlan_ports_set")
            .is_ok());

        let err = AccessCmd::Edit
            .ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "vlan_ports_set")
            .unwrap_err();
        assert_eq!(err.status(), OesStatus::CmdUnsupported);
        assert_eq!(err.to_string(), "Command EDIT unsupported by vlan_ports_set");
    }

    #[test]
    fn test_vendor_values() {
        assert_eq!(AccessCmd::Create as u8, 12);
        assert_eq!(AccessCmd::DeleteAll as u8, 4);
    }

    #[test]
    fn test_counter_cmd() {
        assert!(CounterCmd::ReadClear.clears());
        assert!(!CounterCmd::Read.clears());
    }
}
