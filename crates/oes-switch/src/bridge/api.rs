//! Bridge operations.

use super::types::Bridge;
use crate::switch::Switch;
use log::info;
use oes_common::{AccessCmd, OesError, OesResult};
use oes_types::{BridgeId, LogPort};

impl Switch {
    /// Creates or destroys a bridge.
    ///
    /// CREATE allocates the lowest free id and returns it; `br` is ignored.
    /// DESTROY needs `br` and refuses a bridge that still has ports or is
    /// used by a router interface.
    pub fn bridge_set(&mut self, cmd: AccessCmd, br: Option<BridgeId>) -> OesResult<BridgeId> {
        cmd.ensure_one_of(&[AccessCmd::Create, AccessCmd::Destroy], "bridge_set")?;

        match cmd {
            AccessCmd::Create => {
                let id = (0..self.config.max_bridges)
                    .map(|i| BridgeId(i as u16))
                    .find(|id| !self.bridges.contains_key(id))
                    .ok_or_else(|| OesError::no_resources("bridge"))?;
                self.bridges.insert_new(id, Bridge::new(id, &self.config))?;
                info!("BridgeMgr: created {}", id);
                Ok(id)
            }
            _ => {
                let id = OesError::require(br, "br")?;
                let bridge = self.bridge(id)?;
                if !bridge.ports().is_empty() {
                    return Err(OesError::in_use(format!(
                        "{} has {} ports",
                        id,
                        bridge.ports().len()
                    )));
                }
                if self.router.bridge_in_use(id) {
                    return Err(OesError::in_use(format!(
                        "{} is bound to a router interface",
                        id
                    )));
                }
                self.bridges.remove(&id)?;
                self.events.forget_bridge(id);
                info!("BridgeMgr: destroyed {}", id);
                Ok(id)
            }
        }
    }

    /// Active bridge ids in order.
    pub fn bridge_get(&self) -> Vec<BridgeId> {
        self.bridges.keys().copied().collect()
    }

    /// Adds physical ports to, or removes them from, a bridge.
    ///
    /// The whole list is validated before anything changes.
    pub fn bridge_port_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        ports: &[LogPort],
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "bridge_port_set")?;
        self.bridge(br)?;

        match cmd {
            AccessCmd::Add => {
                for port in ports {
                    self.check_port_add(br, *port)?;
                }
                for port in ports {
                    self.ports.lookup_mut(port)?.bridge = Some(br);
                    self.bridge_mut(br)?.ports.insert(*port);
                    info!("BridgeMgr: added port {} to {}", port, br);
                }
            }
            _ => {
                for port in ports {
                    self.check_port_delete(br, *port)?;
                }
                for port in ports {
                    self.detach_port(br, *port)?;
                    info!("BridgeMgr: removed port {} from {}", port, br);
                }
            }
        }
        Ok(())
    }

    /// Ports of a bridge, physical and LAG, in order.
    pub fn bridge_port_get(&self, br: BridgeId) -> OesResult<Vec<LogPort>> {
        Ok(self.bridge(br)?.ports().iter().copied().collect())
    }

    fn check_port_add(&self, br: BridgeId, port: LogPort) -> OesResult<()> {
        if port.is_lag() {
            return Err(OesError::param(format!(
                "{} is a LAG port, LAGs join a bridge when created",
                port
            )));
        }
        let state = self
            .ports
            .get(&port)
            .ok_or_else(|| OesError::param(format!("unknown port {}", port)))?;
        match state.bridge() {
            None => Ok(()),
            Some(owner) if owner == br => Err(OesError::already_exists(format!(
                "port {} in {}",
                port, br
            ))),
            Some(owner) => Err(OesError::in_use(format!(
                "port {} belongs to {}",
                port, owner
            ))),
        }
    }

    fn check_port_delete(&self, br: BridgeId, port: LogPort) -> OesResult<()> {
        let bridge = self.bridge(br)?;
        if !bridge.has_port(port) {
            return Err(OesError::not_found(format!("port {} in {}", port, br)));
        }
        if port.is_lag() {
            return Err(OesError::param(format!(
                "{} is a LAG port, destroy the LAG instead",
                port
            )));
        }
        if let Some(lag) = self.ports.get(&port).and_then(|p| p.lag_membership()) {
            return Err(OesError::in_use(format!("port {} is a member of {}", port, lag)));
        }
        if bridge.span().is_analyzer(port) {
            return Err(OesError::in_use(format!("port {} is a SPAN analyzer", port)));
        }
        if let Some(rif) = self.router.rif_for_port(br, port) {
            return Err(OesError::in_use(format!(
                "port {} is bound to router interface {}",
                port, rif
            )));
        }
        Ok(())
    }

    /// Removes `port` from every table of `br` and from the isolation sets
    /// of the remaining ports.
    pub(crate) fn detach_port(&mut self, br: BridgeId, port: LogPort) -> OesResult<()> {
        let bridge = self.bridge_mut(br)?;
        bridge.forget_port(port);
        let remaining: Vec<LogPort> = bridge.ports().iter().copied().collect();

        for other in remaining {
            if let Some(state) = self.ports.get_mut(&other) {
                state.isolation.remove(&port);
            }
        }
        if let Some(state) = self.ports.get_mut(&port) {
            state.bridge = None;
            state.isolation.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SwitchConfig;
    use crate::fdb::FdbUcEntry;
    use crate::switch::Switch;
    use crate::vlan::VlanMember;
    use oes_common::{AccessCmd, OesStatus};
    use oes_types::{BridgeId, LogPort, MacAddress, VlanId};
    use pretty_assertions::assert_eq;

    fn switch() -> Switch {
        Switch::new(SwitchConfig {
            max_bridges: 2,
            ..SwitchConfig::with_ports(8)
        })
        .unwrap()
    }

    #[test]
    fn test_create_allocates_lowest_free_id() {
        let mut sw = switch();
        assert_eq!(sw.bridge_set(AccessCmd::Create, None).unwrap(), BridgeId(0));
        assert_eq!(sw.bridge_set(AccessCmd::Create, None).unwrap(), BridgeId(1));
        assert_eq!(
            sw.bridge_set(AccessCmd::Create, None).unwrap_err().status(),
            OesStatus::NoResources
        );

        sw.bridge_set(AccessCmd::Destroy, Some(BridgeId(0))).unwrap();
        assert_eq!(sw.bridge_get(), vec![BridgeId(1)]);
        assert_eq!(sw.bridge_set(AccessCmd::Create, None).unwrap(), BridgeId(0));
    }

    #[test]
    fn test_unsupported_commands() {
        let mut sw = switch();
        assert_eq!(
            sw.bridge_set(AccessCmd::Add, None).unwrap_err().status(),
            OesStatus::CmdUnsupported
        );
        assert_eq!(
            sw.bridge_set(AccessCmd::Destroy, None).unwrap_err().status(),
            OesStatus::ParamNull
        );
        assert_eq!(
            sw.bridge_set(AccessCmd::Destroy, Some(BridgeId(5)))
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
    }

    #[test]
    fn test_destroy_refused_with_ports() {
        let mut sw = switch();
        let br = sw.bridge_set(AccessCmd::Create, None).unwrap();
        sw.bridge_port_set(AccessCmd::Add, br, &[LogPort(1)]).unwrap();
        assert_eq!(
            sw.bridge_set(AccessCmd::Destroy, Some(br)).unwrap_err().status(),
            OesStatus::ResourceInUse
        );
    }

    #[test]
    fn test_port_belongs_to_one_bridge() {
        let mut sw = switch();
        let br0 = sw.bridge_set(AccessCmd::Create, None).unwrap();
        let br1 = sw.bridge_set(AccessCmd::Create, None).unwrap();
        sw.bridge_port_set(AccessCmd::Add, br0, &[LogPort(1), LogPort(2)])
            .unwrap();

        let err = sw
            .bridge_port_set(AccessCmd::Add, br1, &[LogPort(3), LogPort(2)])
            .unwrap_err();
        assert_eq!(err.status(), OesStatus::ResourceInUse);
        // Validation failed before port 3 was added.
        assert!(sw.bridge_port_get(br1).unwrap().is_empty());

        assert_eq!(
            sw.bridge_port_set(AccessCmd::Add, br0, &[LogPort(99)])
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );
        assert_eq!(
            sw.bridge_port_get(br0).unwrap(),
            vec![LogPort(1), LogPort(2)]
        );
        assert_eq!(sw.port(LogPort(1)).unwrap().bridge(), Some(br0));
    }

    #[test]
    fn test_port_delete_cleans_tables() {
        let mut sw = switch();
        let br = sw.bridge_set(AccessCmd::Create, None).unwrap();
        sw.bridge_port_set(AccessCmd::Add, br, &[LogPort(1), LogPort(2)])
            .unwrap();
        let vid = VlanId::new(10).unwrap();
        sw.vlan_ports_set(
            AccessCmd::Add,
            br,
            vid,
            &[VlanMember::tagged(LogPort(1)), VlanMember::tagged(LogPort(2))],
        )
        .unwrap();
        let mac: MacAddress = "00:00:00:00:00:01".parse().unwrap();
        sw.fdb_uc_mac_addr_set(
            AccessCmd::Add,
            br,
            &[FdbUcEntry::new_static(vid, mac, LogPort(1))],
        )
        .unwrap();
        sw.port_isolation_set(AccessCmd::Create, br, LogPort(2), &[LogPort(1)])
            .unwrap();

        sw.bridge_port_set(AccessCmd::Delete, br, &[LogPort(1)])
            .unwrap();

        assert_eq!(sw.fdb_uc_count(br).unwrap(), 0);
        assert_eq!(
            sw.vlan_ports_get(br, vid).unwrap(),
            vec![VlanMember::tagged(LogPort(2))]
        );
        assert!(sw
            .port_isolation_get(br, LogPort(2))
            .unwrap()
            .is_empty());
        assert_eq!(sw.port(LogPort(1)).unwrap().bridge(), None);
        assert_eq!(
            sw.bridge_port_set(AccessCmd::Delete, br, &[LogPort(1)])
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
    }
}
