//! Router types.

use crate::port::{PORT_MTU_DEFAULT, PORT_MTU_MAX, PORT_MTU_MIN};
use oes_common::{HashAlgorithm, HashFieldSet, OesError, OesResult};
use oes_types::{AdminState, BridgeId, IpAddress, IpPrefix, LogPort, MacAddress, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Packet action of a route or neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterAction {
    #[default]
    Forward,
    /// Send to the CPU.
    Trap,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterAttributes {
    pub ipv4_enable: bool,
    pub ipv6_enable: bool,
    pub ipv4_mc_enable: bool,
    pub ipv6_mc_enable: bool,
    /// Action for unicast packets that match no route. `Trap` or `Drop`.
    pub uc_default_action: RouterAction,
}

impl Default for RouterAttributes {
    fn default() -> Self {
        Self {
            ipv4_enable: true,
            ipv6_enable: true,
            ipv4_mc_enable: true,
            ipv6_mc_enable: true,
            uc_default_action: RouterAction::Drop,
        }
    }
}

impl RouterAttributes {
    pub fn uc_enabled(&self, addr: &IpAddress) -> bool {
        if addr.is_ipv4() {
            self.ipv4_enable
        } else {
            self.ipv6_enable
        }
    }

    pub fn mc_enabled(&self, addr: &IpAddress) -> bool {
        if addr.is_ipv4() {
            self.ipv4_mc_enable
        } else {
            self.ipv6_mc_enable
        }
    }
}

/// The L2 interface a router interface sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum L3Interface {
    Vlan { bridge: BridgeId, vid: VlanId },
    Port { bridge: BridgeId, port: LogPort },
}

impl L3Interface {
    pub fn bridge(&self) -> BridgeId {
        match self {
            L3Interface::Vlan { bridge, .. } | L3Interface::Port { bridge, .. } => *bridge,
        }
    }
}

impl fmt::Display for L3Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            L3Interface::Vlan { bridge, vid } => write!(f, "{}|vlan{}", bridge, vid),
            L3Interface::Port { bridge, port } => write!(f, "{}|port{}", bridge, port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RifAttributes {
    pub mtu: u32,
    pub mac: MacAddress,
}

impl RifAttributes {
    pub fn new(mac: MacAddress) -> Self {
        Self {
            mtu: PORT_MTU_DEFAULT,
            mac,
        }
    }

    pub fn validate(&self) -> OesResult<()> {
        OesError::check_range(
            "mtu",
            i64::from(self.mtu),
            i64::from(PORT_MTU_MIN),
            i64::from(PORT_MTU_MAX),
        )?;
        if !self.mac.is_valid_station() {
            return Err(OesError::param(format!(
                "router interface MAC {} is not unicast",
                self.mac
            )));
        }
        Ok(())
    }
}

/// Per-family admin state of a router interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RifState {
    pub ipv4: AdminState,
    pub ipv6: AdminState,
}

impl Default for RifState {
    fn default() -> Self {
        Self {
            ipv4: AdminState::Up,
            ipv6: AdminState::Up,
        }
    }
}

impl RifState {
    pub fn is_up_for(&self, addr: &IpAddress) -> bool {
        if addr.is_ipv4() {
            self.ipv4.is_up()
        } else {
            self.ipv6.is_up()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RifCounters {
    pub ingress_packets: u64,
    pub egress_packets: u64,
    pub egress_discards: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighData {
    pub rif: u32,
    pub mac: MacAddress,
    pub action: RouterAction,
}

/// A neighbor as returned by a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NeighEntry {
    pub ip: IpAddress,
    pub data: NeighData,
    /// Set when routed traffic used the neighbor since the last activity
    /// read.
    pub active: bool,
}

/// Unicast route as configured.
///
/// A `Forward` route needs next hops, a directly connected `rif`, or both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UcRouteData {
    pub action: RouterAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_hops: Vec<IpAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rif: Option<u32>,
}

impl UcRouteData {
    pub fn next_hops(next_hops: impl IntoIterator<Item = IpAddress>) -> Self {
        Self {
            action: RouterAction::Forward,
            next_hops: next_hops.into_iter().collect(),
            rif: None,
        }
    }

    pub fn direct(rif: u32) -> Self {
        Self {
            action: RouterAction::Forward,
            next_hops: Vec::new(),
            rif: Some(rif),
        }
    }

    pub fn action(action: RouterAction) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }
}

/// A unicast route with its resolution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UcRouteEntry {
    pub prefix: IpPrefix,
    pub data: UcRouteData,
    /// Next hops with a forwarding neighbor; the ECMP set in use.
    pub resolved: Vec<IpAddress>,
    /// `Trap` while a next-hop route waits for its neighbors. A direct
    /// route stays `Forward`: it covers a whole attached subnet, and each
    /// destination is resolved against its neighbor on the route's rif at
    /// lookup time.
    pub effective_action: RouterAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct McRouteKey {
    pub group: IpAddress,
    /// `None` matches any source.
    pub source: Option<IpAddress>,
    pub ingress_rif: u32,
}

impl fmt::Display for McRouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(source) => write!(f, "({}, {})", source, self.group),
            None => write!(f, "(*, {})", self.group),
        }?;
        write!(f, " rif {}", self.ingress_rif)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct McRouteData {
    pub action: RouterAction,
    pub egress_rifs: BTreeSet<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McRouteEntry {
    pub key: McRouteKey,
    pub data: McRouteData,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcmpHashParams {
    pub hash_type: HashAlgorithm,
    pub fields: HashFieldSet,
    pub seed: u32,
}

impl Default for EcmpHashParams {
    fn default() -> Self {
        Self {
            hash_type: HashAlgorithm::Crc,
            fields: HashFieldSet::L3 | HashFieldSet::L4,
            seed: 0,
        }
    }
}

/// Result of a unicast route lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RouteDecision {
    Forward {
        prefix: IpPrefix,
        rif: u32,
        next_hop: IpAddress,
        mac: MacAddress,
    },
    /// `prefix` is `None` when no route matched.
    Trap { prefix: Option<IpPrefix> },
    Drop { prefix: Option<IpPrefix> },
}

/// Result of a multicast route lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum McDecision {
    Forward { key: McRouteKey, egress_rifs: Vec<u32> },
    Trap { key: McRouteKey },
    Drop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_route_data_serialization() {
        let data = UcRouteData::next_hops(["10.0.0.2".parse().unwrap()]);
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            serde_json::json!({ "action": "forward", "next_hops": ["10.0.0.2"] })
        );
        let back: UcRouteData =
            serde_json::from_value(serde_json::json!({ "action": "drop" })).unwrap();
        assert_eq!(back, UcRouteData::action(RouterAction::Drop));
    }

    #[test]
    fn test_family_switches() {
        let attrs = RouterAttributes {
            ipv6_enable: false,
            ..RouterAttributes::default()
        };
        assert!(attrs.uc_enabled(&"10.0.0.1".parse().unwrap()));
        assert!(!attrs.uc_enabled(&"2001:db8::1".parse().unwrap()));

        let state = RifState {
            ipv4: AdminState::Down,
            ..RifState::default()
        };
        assert!(!state.is_up_for(&"10.0.0.1".parse().unwrap()));
        assert!(state.is_up_for(&"2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_mc_key_display() {
        let key = McRouteKey {
            group: "239.1.1.1".parse().unwrap(),
            source: None,
            ingress_rif: 2,
        };
        assert_eq!(key.to_string(), "(*, 239.1.1.1) rif 2");
    }
}
