//! L2 forwarding decision.

use crate::switch::Switch;
use crate::vlan::{FloodCmd, FloodType};
use oes_common::OesResult;
use oes_types::{BridgeId, LogPort, MacAddress, VlanId};
use serde::Serialize;

/// Where a bridged frame goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum L2Egress {
    /// Known unicast destination.
    Unicast(LogPort),
    /// Registered multicast group.
    Multicast(Vec<LogPort>),
    /// Unknown unicast, unregistered multicast or broadcast.
    Flood(Vec<LogPort>),
    Discard,
}

impl L2Egress {
    pub fn ports(&self) -> Vec<LogPort> {
        match self {
            L2Egress::Unicast(port) => vec![*port],
            L2Egress::Multicast(ports) | L2Egress::Flood(ports) => ports.clone(),
            L2Egress::Discard => Vec::new(),
        }
    }
}

impl Switch {
    fn can_egress(&self, br: BridgeId, ingress: LogPort, port: LogPort, vid: VlanId) -> bool {
        if port == ingress {
            return false;
        }
        let Ok(bridge) = self.bridge(br) else {
            return false;
        };
        let Some(state) = self.ports.get(&port) else {
            return false;
        };
        bridge.has_port(port)
            && state.lag_membership().is_none()
            && state.oper().is_up()
            && !state.isolation.contains(&ingress)
            && bridge.vlans().is_member(port, vid)
            && bridge.stp().port_state_for_vlan(port, vid).forwards()
    }

    /// Computes the egress ports of a frame received on `ingress` and
    /// classified to `vid`.
    ///
    /// A frame received on a LAG member is treated as received on the LAG.
    /// The frame is discarded when the ingress port is not a forwarding
    /// member of the VLAN.
    pub fn l2_egress(
        &self,
        br: BridgeId,
        ingress: LogPort,
        vid: VlanId,
        dmac: MacAddress,
    ) -> OesResult<L2Egress> {
        self.member(br, ingress)?;
        if !self.collects(br, ingress) {
            return Ok(L2Egress::Discard);
        }
        let ingress = self.logical_port(ingress);
        let bridge = self.bridge(br)?;

        if !bridge.vlans().is_member(ingress, vid)
            || !bridge.stp().port_state_for_vlan(ingress, vid).forwards()
        {
            return Ok(L2Egress::Discard);
        }

        let flood_type = if dmac.is_broadcast() {
            FloodType::Broadcast
        } else if dmac.is_multicast() {
            if let Some(group) = bridge.fdb().lookup_mc(vid, dmac) {
                let ports: Vec<LogPort> = group
                    .iter()
                    .copied()
                    .filter(|p| self.can_egress(br, ingress, *p, vid))
                    .collect();
                return Ok(L2Egress::Multicast(ports));
            }
            FloodType::Multicast
        } else {
            if let Some(entry) = bridge.fdb().lookup_uc(vid, dmac) {
                if self.can_egress(br, ingress, entry.port, vid) {
                    return Ok(L2Egress::Unicast(entry.port));
                }
                return Ok(L2Egress::Discard);
            }
            FloodType::Unicast
        };

        let vlan = bridge.vlans().vlan(vid)?;
        let candidates: Vec<LogPort> = match vlan.flood.get(flood_type) {
            FloodCmd::Flood => vlan.members.keys().copied().collect(),
            FloodCmd::Prune => vlan.flood_ports.iter().copied().collect(),
        };
        let ports: Vec<LogPort> = candidates
            .into_iter()
            .filter(|p| self.can_egress(br, ingress, *p, vid))
            .collect();
        if ports.is_empty() {
            return Ok(L2Egress::Discard);
        }
        Ok(L2Egress::Flood(ports))
    }
}
