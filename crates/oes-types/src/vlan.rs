//! 802.1Q VLAN identifier.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A VLAN id in 1..=4094.
///
/// 0 (priority tag) and 4095 are reserved and never name a VLAN.
///
/// ```
/// use oes_types::VlanId;
///
/// let vid: VlanId = "Vlan100".parse().unwrap();
/// assert_eq!(vid.as_u16(), 100);
/// assert!(VlanId::new(0).is_err());
/// assert!(VlanId::new(4095).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 4094;
    pub const DEFAULT: VlanId = VlanId(1);

    pub const fn new(id: u16) -> Result<Self, ParseError> {
        match id {
            Self::MIN..=Self::MAX => Ok(VlanId(id)),
            _ => Err(ParseError::InvalidVlanId(id)),
        }
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl Default for VlanId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Accepts `100` and the interface-style `Vlan100`.
impl FromStr for VlanId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("Vlan")
            .or_else(|| s.strip_prefix("vlan"))
            .unwrap_or(s);
        // Out-of-range u16 values saturate so the error still reports a VID.
        let id = match digits.parse::<u32>() {
            Ok(id) => u16::try_from(id).unwrap_or(u16::MAX),
            Err(_) => return Err(ParseError::InvalidVlanId(0)),
        };
        Self::new(id)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vid: VlanId) -> u16 {
        vid.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_range_bounds() {
        assert_eq!(VlanId::new(1).unwrap(), VlanId::DEFAULT);
        assert_eq!(VlanId::new(4094).unwrap().as_u16(), VlanId::MAX);
        assert_eq!(VlanId::new(0), Err(ParseError::InvalidVlanId(0)));
        assert_eq!(VlanId::new(4095), Err(ParseError::InvalidVlanId(4095)));
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("Vlan100".parse::<VlanId>().unwrap().as_u16(), 100);
        assert_eq!("vlan7".parse::<VlanId>().unwrap().as_u16(), 7);
        assert_eq!("200".parse::<VlanId>().unwrap().to_string(), "200");
        assert!("Vlan".parse::<VlanId>().is_err());
        assert!("-1".parse::<VlanId>().is_err());
        assert_eq!(
            "70000".parse::<VlanId>(),
            Err(ParseError::InvalidVlanId(u16::MAX))
        );
    }

    #[test]
    fn test_serde_rejects_reserved() {
        assert_eq!(serde_json::from_str::<VlanId>("10").unwrap().as_u16(), 10);
        assert!(serde_json::from_str::<VlanId>("4095").is_err());
    }
}
