//! The forwarding-state manager.

use crate::bridge::Bridge;
use crate::config::SwitchConfig;
use crate::event::{Event, EventHub};
use crate::fdb::{FdbMcEntry, FdbUcEntry};
use crate::port::PortState;
use crate::router::{Router, RouterSnapshot};
use crate::vlan::VlanMember;
use log::{debug, info};
use oes_common::{OesError, OesResult, SyncTable};
use oes_types::{AdminState, BridgeId, LogPort, OperState, VlanId};
use serde::Serialize;

/// In-memory switch forwarding state.
///
/// Every operation takes `&mut self` or `&self`; callers that share a switch
/// between tasks wrap it in a mutex.
#[derive(Debug)]
pub struct Switch {
    pub(crate) config: SwitchConfig,
    pub(crate) ports: SyncTable<LogPort, PortState>,
    pub(crate) bridges: SyncTable<BridgeId, Bridge>,
    pub(crate) router: Router,
    pub(crate) events: EventHub,
}

impl Switch {
    pub fn new(config: SwitchConfig) -> OesResult<Self> {
        config.validate()?;

        let mut ports = SyncTable::new("port");
        for port in &config.ports {
            ports.insert_new(port.id, PortState::physical(port))?;
        }
        info!(
            "Switch: initialized with {} ports, {} bridges max",
            ports.len(),
            config.max_bridges
        );

        Ok(Self {
            bridges: SyncTable::with_capacity_limit("bridge", config.max_bridges),
            router: Router::new(&config),
            events: EventHub::new(),
            ports,
            config,
        })
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    pub fn bridge(&self, br: BridgeId) -> OesResult<&Bridge> {
        self.bridges.lookup(&br)
    }

    pub(crate) fn bridge_mut(&mut self, br: BridgeId) -> OesResult<&mut Bridge> {
        self.bridges.lookup_mut(&br)
    }

    /// Looks up a port of the inventory or a LAG port.
    pub fn port(&self, port: LogPort) -> OesResult<&PortState> {
        self.ports.lookup(&port)
    }

    /// Fails unless `br` exists and `port` is one of its ports.
    pub(crate) fn ensure_member(&self, br: BridgeId, port: LogPort) -> OesResult<()> {
        if !self.bridge(br)?.has_port(port) {
            return Err(OesError::param(format!(
                "port {} is not a member of {}",
                port, br
            )));
        }
        Ok(())
    }

    pub(crate) fn member(&self, br: BridgeId, port: LogPort) -> OesResult<&PortState> {
        self.ensure_member(br, port)?;
        self.ports.lookup(&port)
    }

    pub(crate) fn member_mut(&mut self, br: BridgeId, port: LogPort) -> OesResult<&mut PortState> {
        self.ensure_member(br, port)?;
        self.ports.lookup_mut(&port)
    }

    /// Fails unless `port` is a physical member of `br`.
    pub(crate) fn physical_member_mut(
        &mut self,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<&mut PortState> {
        if port.is_lag() {
            return Err(OesError::param(format!(
                "{} is a LAG port, operation needs a physical port",
                port
            )));
        }
        self.member_mut(br, port)
    }

    /// Fails unless `port` is a member of `br` that is not part of a LAG.
    /// LAG members take their forwarding settings from the LAG port.
    pub(crate) fn ensure_configurable(&self, br: BridgeId, port: LogPort) -> OesResult<()> {
        if let Some(lag) = self.member(br, port)?.lag_membership() {
            return Err(OesError::param(format!(
                "port {} is a member of {}, configure the LAG",
                port, lag
            )));
        }
        Ok(())
    }

    /// Maps a LAG member to its LAG; other ports map to themselves.
    pub(crate) fn logical_port(&self, port: LogPort) -> LogPort {
        self.ports
            .get(&port)
            .and_then(PortState::lag_membership)
            .unwrap_or(port)
    }

    /// False for a LAG member whose collector is disabled. Frames received
    /// on such a member are discarded.
    pub(crate) fn collects(&self, br: BridgeId, port: LogPort) -> bool {
        let Some(lag) = self.ports.get(&port).and_then(PortState::lag_membership) else {
            return true;
        };
        self.bridge(br)
            .ok()
            .and_then(|b| b.lags().lag(lag))
            .and_then(|g| g.member(port))
            .map_or(true, |m| m.collector)
    }

    pub(crate) fn publish(&mut self, br: BridgeId, event: Event) {
        let delivered = self.events.publish(br, event);
        if delivered > 0 {
            debug!("Switch: event delivered to {} channels on {}", delivered, br);
        }
    }

    /// Captures bridges, VLANs, FDB and routing tables for display.
    pub fn snapshot(&self) -> SwitchSnapshot {
        let bridges = self
            .bridges
            .iter()
            .map(|(id, bridge)| BridgeSnapshot {
                id: *id,
                ports: bridge
                    .ports()
                    .iter()
                    .filter_map(|p| self.ports.get(p))
                    .map(|state| PortSnapshot {
                        port: state.id(),
                        admin: state.admin(),
                        oper: state.oper(),
                        lag: state.lag_membership(),
                    })
                    .collect(),
                vlans: bridge
                    .vlans()
                    .vlans()
                    .map(|(vid, vlan)| VlanSnapshot {
                        vid: *vid,
                        members: vlan.members(),
                    })
                    .collect(),
                fdb: bridge.fdb().uc_entries().collect(),
                fdb_mc: bridge.fdb().mc_entries().collect(),
            })
            .collect();

        SwitchSnapshot {
            bridges,
            routers: self.router.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortSnapshot {
    pub port: LogPort,
    pub admin: AdminState,
    pub oper: OperState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lag: Option<LogPort>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VlanSnapshot {
    pub vid: VlanId,
    pub members: Vec<VlanMember>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BridgeSnapshot {
    pub id: BridgeId,
    pub ports: Vec<PortSnapshot>,
    pub vlans: Vec<VlanSnapshot>,
    pub fdb: Vec<FdbUcEntry>,
    pub fdb_mc: Vec<FdbMcEntry>,
}

/// Serializable view of the whole switch.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchSnapshot {
    pub bridges: Vec<BridgeSnapshot>,
    pub routers: Vec<RouterSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use oes_common::OesStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_loads_inventory() {
        let switch = Switch::new(SwitchConfig::with_ports(4)).unwrap();
        assert_eq!(switch.ports.len(), 4);
        assert_eq!(switch.port(LogPort(3)).unwrap().oper(), OperState::Down);
        assert_eq!(
            switch.port(LogPort(9)).unwrap_err().status(),
            OesStatus::EntryNotFound
        );
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SwitchConfig {
            max_bridges: 0,
            ..SwitchConfig::with_ports(1)
        };
        assert!(Switch::new(config).is_err());
    }

    #[test]
    fn test_empty_snapshot_serializes() {
        let switch = Switch::new(SwitchConfig::with_ports(2)).unwrap();
        let json = serde_json::to_value(switch.snapshot()).unwrap();
        assert_eq!(json["bridges"], serde_json::json!([]));
        assert_eq!(json["routers"], serde_json::json!([]));
    }
}
