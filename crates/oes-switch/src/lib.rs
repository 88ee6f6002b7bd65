//! OES forwarding-state manager.
//!
//! [`Switch`] holds the forwarding state of an Ethernet switch and exposes
//! the OES set/get operations over it:
//!
//! - [`bridge`]: switch partitions and their member ports
//! - [`port`]: per-port settings, counters and link state
//! - [`vlan`]: VLAN membership, PVIDs, flooding and QinQ
//! - [`fdb`]: unicast/multicast MAC tables, learning, aging, L2 forwarding
//! - [`lag`]: link aggregation and member selection
//! - [`cos`]: priority classification and scheduling
//! - [`span`]: port mirroring
//! - [`stp`]: spanning-tree instances and port states
//! - [`router`]: routers, router interfaces, neighbors and routes
//! - [`event`]: asynchronous notifications
//!
//! # Example
//!
//! ```
//! use oes_common::AccessCmd;
//! use oes_switch::{config::SwitchConfig, vlan::VlanMember, Switch};
//! use oes_types::{LogPort, VlanId};
//!
//! let mut sw = Switch::new(SwitchConfig::with_ports(4)).unwrap();
//! let br = sw.bridge_set(AccessCmd::Create, None).unwrap();
//! sw.bridge_port_set(AccessCmd::Add, br, &[LogPort(1), LogPort(2)]).unwrap();
//! let vid = VlanId::new(10).unwrap();
//! sw.vlan_ports_set(AccessCmd::Add, br, vid, &[VlanMember::tagged(LogPort(1))])
//!     .unwrap();
//! assert_eq!(sw.vlan_ports_get(br, vid).unwrap().len(), 1);
//! ```

pub mod bridge;
pub mod config;
pub mod cos;
pub mod event;
pub mod fdb;
pub mod lag;
pub mod port;
pub mod router;
pub mod span;
pub mod stp;
mod switch;
pub mod vlan;

pub use switch::{BridgeSnapshot, PortSnapshot, Switch, SwitchSnapshot, VlanSnapshot};
