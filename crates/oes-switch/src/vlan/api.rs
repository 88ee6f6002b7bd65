//! VLAN operations.

use super::types::{
    AcceptedFrameTypes, FloodCmd, FloodType, FrameTag, IngressFilterMode, PortVlan, QinqMode,
    QinqOuterPrioMode, VlanMember,
};
use crate::switch::Switch;
use log::{debug, info};
use oes_common::{AccessCmd, OesError, OesResult};
use oes_types::{BridgeId, LogPort, VlanId};

impl Switch {
    /// Adds or removes VLAN members.
    ///
    /// ADD creates the VLAN when needed and updates the tagging of existing
    /// members. DELETE flushes the dynamic FDB entries of each removed
    /// (port, vid). DELETE_ALL removes the VLAN with all its members and
    /// FDB entries; `members` is ignored.
    pub fn vlan_ports_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        vid: VlanId,
        members: &[VlanMember],
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[AccessCmd::Add, AccessCmd::Delete, AccessCmd::DeleteAll],
            "vlan_ports_set",
        )?;
        self.bridge(br)?;

        match cmd {
            AccessCmd::Add => {
                for member in members {
                    self.ensure_configurable(br, member.port)?;
                }
                let bridge = self.bridge_mut(br)?;
                for member in members {
                    bridge.vlans.add_member(vid, *member);
                }
                debug!("VlanMgr: added {} members to vlan {} on {}", members.len(), vid, br);
            }
            AccessCmd::Delete => {
                let bridge = self.bridge(br)?;
                bridge.vlans().vlan(vid)?;
                for member in members {
                    if !bridge.vlans().is_member(member.port, vid) {
                        return Err(OesError::not_found(format!(
                            "port {} in vlan {}",
                            member.port, vid
                        )));
                    }
                }
                let bridge = self.bridge_mut(br)?;
                for member in members {
                    bridge.vlans.remove_member(vid, member.port)?;
                    bridge
                        .fdb
                        .flush(|e| e.port == member.port && e.vid == vid);
                }
            }
            _ => {
                let bridge = self.bridge_mut(br)?;
                bridge.vlans.remove_vlan(vid)?;
                let removed = bridge.fdb.purge(|e| e.vid == vid);
                let groups = bridge.fdb.flush_mc(|k| k.vid == vid);
                info!(
                    "VlanMgr: removed vlan {} from {} with {} unicast and {} multicast FDB entries",
                    vid,
                    br,
                    removed.len(),
                    groups
                );
            }
        }
        Ok(())
    }

    pub fn vlan_ports_get(&self, br: BridgeId, vid: VlanId) -> OesResult<Vec<VlanMember>> {
        Ok(self.bridge(br)?.vlans().vlan(vid)?.members())
    }

    /// Adds one port to, or removes it from, several VLANs at once.
    pub fn vlan_port_multi_vlan_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        vlans: &[PortVlan],
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "vlan_port_multi_vlan_set")?;
        self.ensure_configurable(br, port)?;

        if cmd == AccessCmd::Delete {
            let table = self.bridge(br)?.vlans();
            if let Some(missing) = vlans.iter().find(|v| !table.is_member(port, v.vid)) {
                return Err(OesError::not_found(format!(
                    "port {} in vlan {}",
                    port, missing.vid
                )));
            }
        }

        let bridge = self.bridge_mut(br)?;
        for vlan in vlans {
            if cmd == AccessCmd::Add {
                bridge.vlans.add_member(
                    vlan.vid,
                    VlanMember {
                        port,
                        tagged: vlan.tagged,
                    },
                );
            } else {
                bridge.vlans.remove_member(vlan.vid, port)?;
                bridge.fdb.flush(|e| e.port == port && e.vid == vlan.vid);
            }
        }
        Ok(())
    }

    pub fn vlan_ingr_filter_ports_set(
        &mut self,
        br: BridgeId,
        ports: &[LogPort],
        mode: IngressFilterMode,
    ) -> OesResult<()> {
        for port in ports {
            self.ensure_configurable(br, *port)?;
        }
        let bridge = self.bridge_mut(br)?;
        for port in ports {
            bridge.vlans.port_config_mut(*port).ingress_filter = mode;
        }
        Ok(())
    }

    pub fn vlan_ingr_filter_ports_get(
        &self,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<IngressFilterMode> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.vlans().port_config(port).ingress_filter)
    }

    /// ADD sets the PVID of a port; DELETE returns it to the bridge default
    /// VID and ignores `pvid`.
    pub fn vlan_port_pvid_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        pvid: VlanId,
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "vlan_port_pvid_set")?;
        self.ensure_configurable(br, port)?;
        let config = self.bridge_mut(br)?.vlans.port_config_mut(port);
        config.pvid = match cmd {
            AccessCmd::Add => Some(pvid),
            _ => None,
        };
        Ok(())
    }

    pub fn vlan_port_pvid_get(&self, br: BridgeId, port: LogPort) -> OesResult<VlanId> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.vlans().pvid(port))
    }

    pub fn vlan_port_accptd_frm_types_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        types: AcceptedFrameTypes,
    ) -> OesResult<()> {
        if !types.allows_any() {
            return Err(OesError::param(format!(
                "port {} must accept at least one frame type",
                port
            )));
        }
        self.ensure_configurable(br, port)?;
        self.bridge_mut(br)?.vlans.port_config_mut(port).accepted_frames = types;
        Ok(())
    }

    pub fn vlan_port_accptd_frm_types_get(
        &self,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<AcceptedFrameTypes> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.vlans().port_config(port).accepted_frames)
    }

    /// Changes the default VID. Ports whose PVID is the old default follow.
    pub fn vlan_default_vid_set(&mut self, br: BridgeId, vid: VlanId) -> OesResult<()> {
        self.bridge_mut(br)?.vlans.set_default_vid(vid);
        info!("VlanMgr: default vid of {} is now {}", br, vid);
        Ok(())
    }

    pub fn vlan_default_vid_get(&self, br: BridgeId) -> OesResult<VlanId> {
        Ok(self.bridge(br)?.vlans().default_vid())
    }

    pub fn vlan_flood_mode_set(
        &mut self,
        br: BridgeId,
        vid: VlanId,
        flood_type: FloodType,
        mode: FloodCmd,
    ) -> OesResult<()> {
        self.bridge_mut(br)?
            .vlans
            .vlan_mut(vid)?
            .flood
            .set(flood_type, mode);
        Ok(())
    }

    pub fn vlan_flood_mode_get(
        &self,
        br: BridgeId,
        vid: VlanId,
        flood_type: FloodType,
    ) -> OesResult<FloodCmd> {
        Ok(self.bridge(br)?.vlans().vlan(vid)?.flood.get(flood_type))
    }

    /// Edits the list of ports that receive pruned flooding. Ports must be
    /// members of the VLAN.
    pub fn vlan_flood_ports_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        vid: VlanId,
        ports: &[LogPort],
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "vlan_flood_ports_set")?;
        let vlan = self.bridge_mut(br)?.vlans.vlan_mut(vid)?;

        match cmd {
            AccessCmd::Add => {
                if let Some(outsider) = ports.iter().find(|p| !vlan.is_member(**p)) {
                    return Err(OesError::param(format!(
                        "port {} is not a member of vlan {}",
                        outsider, vid
                    )));
                }
                vlan.flood_ports.extend(ports.iter().copied());
            }
            _ => {
                if let Some(missing) = ports.iter().find(|p| !vlan.flood_ports.contains(*p)) {
                    return Err(OesError::not_found(format!(
                        "port {} in flood list of vlan {}",
                        missing, vid
                    )));
                }
                for port in ports {
                    vlan.flood_ports.remove(port);
                }
            }
        }
        Ok(())
    }

    pub fn vlan_flood_ports_get(&self, br: BridgeId, vid: VlanId) -> OesResult<Vec<LogPort>> {
        Ok(self
            .bridge(br)?
            .vlans()
            .vlan(vid)?
            .flood_ports
            .iter()
            .copied()
            .collect())
    }

    pub fn vlan_qinq_mode_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        mode: QinqMode,
    ) -> OesResult<()> {
        self.ensure_configurable(br, port)?;
        self.bridge_mut(br)?.vlans.port_config_mut(port).qinq_mode = mode;
        Ok(())
    }

    pub fn vlan_qinq_mode_get(&self, br: BridgeId, port: LogPort) -> OesResult<QinqMode> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.vlans().port_config(port).qinq_mode)
    }

    pub fn vlan_qinq_outer_prio_mode_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        mode: QinqOuterPrioMode,
    ) -> OesResult<()> {
        self.ensure_configurable(br, port)?;
        self.bridge_mut(br)?.vlans.port_config_mut(port).qinq_outer_prio = mode;
        Ok(())
    }

    pub fn vlan_qinq_outer_prio_mode_get(
        &self,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<QinqOuterPrioMode> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.vlans().port_config(port).qinq_outer_prio)
    }

    /// Classifies a frame received on `port` (or on a LAG member, which
    /// classifies by its LAG). `None` means the frame is dropped.
    pub fn vlan_ingress_classify(
        &self,
        br: BridgeId,
        port: LogPort,
        tag: FrameTag,
    ) -> OesResult<Option<VlanId>> {
        self.member(br, port)?;
        if !self.collects(br, port) {
            return Ok(None);
        }
        let port = self.logical_port(port);
        Ok(self.bridge(br)?.vlans().classify(port, tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwitchConfig;
    use crate::fdb::FdbUcEntry;
    use oes_common::OesStatus;
    use oes_types::MacAddress;
    use pretty_assertions::assert_eq;

    fn vid(id: u16) -> VlanId {
        VlanId::new(id).unwrap()
    }

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0, 0, 0, 0, 0, last])
    }

    fn setup() -> (Switch, BridgeId) {
        let mut sw = Switch::new(SwitchConfig::with_ports(4)).unwrap();
        let br = sw.bridge_set(AccessCmd::Create, None).unwrap();
        sw.bridge_port_set(AccessCmd::Add, br, &[LogPort(1), LogPort(2), LogPort(3)])
            .unwrap();
        (sw, br)
    }

    #[test]
    fn test_add_creates_vlan() {
        let (mut sw, br) = setup();
        assert_eq!(
            sw.vlan_ports_get(br, vid(10)).unwrap_err().status(),
            OesStatus::EntryNotFound
        );
        sw.vlan_ports_set(
            AccessCmd::Add,
            br,
            vid(10),
            &[VlanMember::tagged(LogPort(1)), VlanMember::untagged(LogPort(2))],
        )
        .unwrap();
        assert_eq!(
            sw.vlan_ports_get(br, vid(10)).unwrap(),
            vec![VlanMember::tagged(LogPort(1)), VlanMember::untagged(LogPort(2))]
        );

        // Re-adding updates the tagging.
        sw.vlan_ports_set(AccessCmd::Add, br, vid(10), &[VlanMember::untagged(LogPort(1))])
            .unwrap();
        assert_eq!(
            sw.vlan_ports_get(br, vid(10)).unwrap()[0],
            VlanMember::untagged(LogPort(1))
        );
    }

    #[test]
    fn test_add_non_member_port_rejected() {
        let (mut sw, br) = setup();
        let err = sw
            .vlan_ports_set(AccessCmd::Add, br, vid(10), &[VlanMember::tagged(LogPort(4))])
            .unwrap_err();
        assert_eq!(err.status(), OesStatus::ParamError);
        assert!(sw.vlan_ports_get(br, vid(10)).is_err());
    }

    #[test]
    fn test_delete_flushes_port_vid_fdb() {
        let (mut sw, br) = setup();
        sw.vlan_ports_set(
            AccessCmd::Add,
            br,
            vid(10),
            &[VlanMember::tagged(LogPort(1)), VlanMember::tagged(LogPort(2))],
        )
        .unwrap();
        sw.fdb_uc_mac_addr_set(
            AccessCmd::Add,
            br,
            &[
                FdbUcEntry::new_dynamic(vid(10), mac(1), LogPort(1)),
                FdbUcEntry::new_dynamic(vid(10), mac(2), LogPort(2)),
                FdbUcEntry::new_static(vid(10), mac(3), LogPort(1)),
            ],
        )
        .unwrap();

        sw.vlan_ports_set(AccessCmd::Delete, br, vid(10), &[VlanMember::tagged(LogPort(1))])
            .unwrap();
        let fdb = sw.bridge(br).unwrap().fdb();
        assert!(fdb.lookup_uc(vid(10), mac(1)).is_none());
        assert!(fdb.lookup_uc(vid(10), mac(2)).is_some());
        assert!(fdb.lookup_uc(vid(10), mac(3)).is_some());

        assert_eq!(
            sw.vlan_ports_set(AccessCmd::Delete, br, vid(10), &[VlanMember::tagged(LogPort(1))])
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
    }

    #[test]
    fn test_delete_all_removes_vlan_and_fdb() {
        let (mut sw, br) = setup();
        sw.vlan_ports_set(AccessCmd::Add, br, vid(10), &[VlanMember::tagged(LogPort(1))])
            .unwrap();
        sw.vlan_ports_set(AccessCmd::Add, br, vid(20), &[VlanMember::tagged(LogPort(1))])
            .unwrap();
        sw.fdb_uc_mac_addr_set(
            AccessCmd::Add,
            br,
            &[
                FdbUcEntry::new_static(vid(10), mac(1), LogPort(1)),
                FdbUcEntry::new_static(vid(20), mac(1), LogPort(1)),
            ],
        )
        .unwrap();
        let group: MacAddress = "01:00:5e:01:01:01".parse().unwrap();
        sw.fdb_mc_mac_addr_set(AccessCmd::Add, br, vid(10), group, &[LogPort(1)])
            .unwrap();

        sw.vlan_ports_set(AccessCmd::DeleteAll, br, vid(10), &[])
            .unwrap();
        assert!(sw.vlan_ports_get(br, vid(10)).is_err());
        assert_eq!(sw.fdb_uc_count(br).unwrap(), 1);
        assert_eq!(
            sw.fdb_mc_mac_addr_get(br, vid(10), group)
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
        assert_eq!(
            sw.vlan_ports_set(AccessCmd::DeleteAll, br, vid(10), &[])
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
    }

    #[test]
    fn test_multi_vlan() {
        let (mut sw, br) = setup();
        let vlans = [
            PortVlan {
                vid: vid(10),
                tagged: true,
            },
            PortVlan {
                vid: vid(20),
                tagged: false,
            },
        ];
        sw.vlan_port_multi_vlan_set(AccessCmd::Add, br, LogPort(3), &vlans)
            .unwrap();
        assert_eq!(
            sw.bridge(br).unwrap().vlans().port_vlans(LogPort(3)),
            vec![vid(10), vid(20)]
        );

        sw.vlan_port_multi_vlan_set(AccessCmd::Delete, br, LogPort(3), &vlans[..1])
            .unwrap();
        assert_eq!(
            sw.bridge(br).unwrap().vlans().port_vlans(LogPort(3)),
            vec![vid(20)]
        );
        assert_eq!(
            sw.vlan_port_multi_vlan_set(AccessCmd::Delete, br, LogPort(3), &vlans)
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
    }

    #[test]
    fn test_pvid_follows_default_vid() {
        let (mut sw, br) = setup();
        assert_eq!(sw.vlan_port_pvid_get(br, LogPort(1)).unwrap(), VlanId::DEFAULT);

        sw.vlan_port_pvid_set(AccessCmd::Add, br, LogPort(1), vid(30))
            .unwrap();
        sw.vlan_default_vid_set(br, vid(5)).unwrap();
        assert_eq!(sw.vlan_port_pvid_get(br, LogPort(1)).unwrap(), vid(30));
        assert_eq!(sw.vlan_port_pvid_get(br, LogPort(2)).unwrap(), vid(5));

        sw.vlan_port_pvid_set(AccessCmd::Delete, br, LogPort(1), vid(30))
            .unwrap();
        assert_eq!(sw.vlan_port_pvid_get(br, LogPort(1)).unwrap(), vid(5));
    }

    #[test]
    fn test_accepted_frame_types_need_one() {
        let (mut sw, br) = setup();
        let none = AcceptedFrameTypes {
            allow_tagged: false,
            allow_untagged: false,
            allow_priority_tagged: false,
        };
        assert_eq!(
            sw.vlan_port_accptd_frm_types_set(br, LogPort(1), none)
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );

        let tagged_only = AcceptedFrameTypes {
            allow_untagged: false,
            allow_priority_tagged: false,
            ..Default::default()
        };
        sw.vlan_port_accptd_frm_types_set(br, LogPort(1), tagged_only)
            .unwrap();
        assert_eq!(
            sw.vlan_ingress_classify(br, LogPort(1), FrameTag::Untagged)
                .unwrap(),
            None
        );
        assert_eq!(
            sw.vlan_ingress_classify(br, LogPort(1), FrameTag::Tagged(vid(7)))
                .unwrap(),
            Some(vid(7))
        );
    }

    #[test]
    fn test_ingress_filter() {
        let (mut sw, br) = setup();
        sw.vlan_ports_set(AccessCmd::Add, br, vid(10), &[VlanMember::tagged(LogPort(1))])
            .unwrap();
        sw.vlan_ingr_filter_ports_set(br, &[LogPort(1)], IngressFilterMode::Enabled)
            .unwrap();
        assert_eq!(
            sw.vlan_ingr_filter_ports_get(br, LogPort(1)).unwrap(),
            IngressFilterMode::Enabled
        );
        assert_eq!(
            sw.vlan_ingress_classify(br, LogPort(1), FrameTag::Tagged(vid(10)))
                .unwrap(),
            Some(vid(10))
        );
        assert_eq!(
            sw.vlan_ingress_classify(br, LogPort(1), FrameTag::Tagged(vid(11)))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_qinq_classifies_to_pvid() {
        let (mut sw, br) = setup();
        sw.vlan_port_pvid_set(AccessCmd::Add, br, LogPort(2), vid(100))
            .unwrap();
        sw.vlan_qinq_mode_set(br, LogPort(2), QinqMode::Qinq).unwrap();
        sw.vlan_qinq_outer_prio_mode_set(br, LogPort(2), QinqOuterPrioMode::Copy)
            .unwrap();
        assert_eq!(
            sw.vlan_ingress_classify(br, LogPort(2), FrameTag::Tagged(vid(7)))
                .unwrap(),
            Some(vid(100))
        );
        assert_eq!(
            sw.vlan_qinq_outer_prio_mode_get(br, LogPort(2)).unwrap(),
            QinqOuterPrioMode::Copy
        );
    }

    #[test]
    fn test_flood_ports_must_be_members() {
        let (mut sw, br) = setup();
        sw.vlan_ports_set(
            AccessCmd::Add,
            br,
            vid(10),
            &[VlanMember::tagged(LogPort(1)), VlanMember::tagged(LogPort(2))],
        )
        .unwrap();
        assert_eq!(
            sw.vlan_flood_ports_set(AccessCmd::Add, br, vid(10), &[LogPort(3)])
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );
        sw.vlan_flood_ports_set(AccessCmd::Add, br, vid(10), &[LogPort(2)])
            .unwrap();
        sw.vlan_flood_mode_set(br, vid(10), FloodType::Unicast, FloodCmd::Prune)
            .unwrap();
        assert_eq!(sw.vlan_flood_ports_get(br, vid(10)).unwrap(), vec![LogPort(2)]);
        assert_eq!(
            sw.vlan_flood_mode_get(br, vid(10), FloodType::Unicast).unwrap(),
            FloodCmd::Prune
        );

        // Leaving the VLAN drops the port from the flood list.
        sw.vlan_ports_set(AccessCmd::Delete, br, vid(10), &[VlanMember::tagged(LogPort(2))])
            .unwrap();
        assert!(sw.vlan_flood_ports_get(br, vid(10)).unwrap().is_empty());
    }
}
