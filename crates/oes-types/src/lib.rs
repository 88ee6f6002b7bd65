//! Common OES types for switch forwarding state.
//!
//! This crate provides type-safe representations of the keys and small
//! value types shared by every table of the forwarding-state manager:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`IpAddress`]: IPv4 and IPv6 addresses
//! - [`IpPrefix`]: IP network prefixes (CIDR notation)
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers
//! - [`LogPort`]: logical port identifiers (physical ports and LAGs)
//!
//! All key types are totally ordered so tables can be walked with
//! get-first / get-next semantics.

mod ip;
mod mac;
mod port;
mod vlan;

pub use ip::{IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
pub use mac::MacAddress;
pub use port::{AdminState, BridgeId, LogPort, OperState};
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid logical port: {0}")]
    InvalidLogPort(String),

    #[error("invalid port state: {0}")]
    InvalidPortState(String),
}
