//! OES status codes.
//!
//! Numeric values follow the vendor status header, so a status can be
//! handed to a C caller unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Return status of every OES operation.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OesStatus {
    Success = 0,
    Error = 1,
    NotInitialized = 2,
    NoResources = 5,
    NoMemory = 6,
    CmdUnsupported = 8,
    ParamNull = 12,
    ParamError = 13,
    ParamExceedsRange = 14,
    EntryNotFound = 21,
    EntryAlreadyExists = 22,
    ResourceInUse = 23,
}

impl OesStatus {
    /// Creates an OesStatus from a raw i32 value.
    ///
    /// Unknown values collapse to [`OesStatus::Error`].
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => OesStatus::Success,
            1 => OesStatus::Error,
            2 => OesStatus::NotInitialized,
            5 => OesStatus::NoResources,
            6 => OesStatus::NoMemory,
            8 => OesStatus::CmdUnsupported,
            12 => OesStatus::ParamNull,
            13 => OesStatus::ParamError,
            14 => OesStatus::ParamExceedsRange,
            21 => OesStatus::EntryNotFound,
            22 => OesStatus::EntryAlreadyExists,
            23 => OesStatus::ResourceInUse,
            _ => OesStatus::Error,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn is_success(&self) -> bool {
        *self == OesStatus::Success
    }
}

impl fmt::Display for OesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OesStatus::Success => "OES_STATUS_SUCCESS",
            OesStatus::Error => "OES_STATUS_ERROR",
            OesStatus::NotInitialized => "OES_STATUS_NOT_INITIALIZED",
            OesStatus::NoResources => "OES_STATUS_NO_RESOURCES",
            OesStatus::NoMemory => "OES_STATUS_NO_MEMORY",
            OesStatus::CmdUnsupported => "OES_STATUS_CMD_UNSUPPORTED",
            OesStatus::ParamNull => "OES_STATUS_PARAM_NULL",
            OesStatus::ParamError => "OES_STATUS_PARAM_ERROR",
            OesStatus::ParamExceedsRange => "OES_STATUS_PARAM_EXCEEDS_RANGE",
            OesStatus::EntryNotFound => "OES_STATUS_ENTRY_NOT_FOUND",
            OesStatus::EntryAlreadyExists => "OES_STATUS_ENTRY_ALREADY_EXISTS",
            OesStatus::ResourceInUse => "OES_STATUS_RESOURCE_IN_USE",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_raw_values_round_trip() {
        for status in [
            OesStatus::Success,
            OesStatus::NoResources,
            OesStatus::ParamError,
            OesStatus::EntryNotFound,
            OesStatus::ResourceInUse,
        ] {
            assert_eq!(OesStatus::from_raw(status.as_raw()), status);
        }
    }

    #[test]
    fn test_vendor_values() {
        assert_eq!(OesStatus::Success.as_raw(), 0);
        assert_eq!(OesStatus::ParamError.as_raw(), 13);
        assert_eq!(OesStatus::EntryNotFound.as_raw(), 21);
        assert_eq!(OesStatus::from_raw(-1), OesStatus::Error);
    }

    #[test]
    fn test_display() {
        assert_eq!(OesStatus::NoResources.to_string(), "OES_STATUS_NO_RESOURCES");
        assert!(OesStatus::Success.is_success());
    }
}
