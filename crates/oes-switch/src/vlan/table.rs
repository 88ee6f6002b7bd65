//! Per-bridge VLAN table.

use super::types::{FloodModes, FrameTag, IngressFilterMode, QinqMode, VlanMember, VlanPortConfig};
use oes_common::{OesError, OesResult};
use oes_types::{LogPort, VlanId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Vlan {
    /// Member ports and whether they egress tagged.
    pub(crate) members: BTreeMap<LogPort, bool>,
    pub(crate) flood: FloodModes,
    pub(crate) flood_ports: BTreeSet<LogPort>,
}

impl Vlan {
    pub fn members(&self) -> Vec<VlanMember> {
        self.members
            .iter()
            .map(|(port, tagged)| VlanMember {
                port: *port,
                tagged: *tagged,
            })
            .collect()
    }

    pub fn is_member(&self, port: LogPort) -> bool {
        self.members.contains_key(&port)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VlanTable {
    default_vid: VlanId,
    vlans: BTreeMap<VlanId, Vlan>,
    ports: BTreeMap<LogPort, VlanPortConfig>,
}

impl VlanTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_vid(&self) -> VlanId {
        self.default_vid
    }

    /// Changes the default VID. Ports explicitly set to the old default
    /// follow the new one.
    pub fn set_default_vid(&mut self, vid: VlanId) {
        let old = self.default_vid;
        for config in self.ports.values_mut() {
            if config.pvid == Some(old) {
                config.pvid = None;
            }
        }
        self.default_vid = vid;
    }

    pub fn vlan(&self, vid: VlanId) -> OesResult<&Vlan> {
        self.vlans
            .get(&vid)
            .ok_or_else(|| OesError::not_found(format!("vlan {}", vid)))
    }

    pub fn vlan_mut(&mut self, vid: VlanId) -> OesResult<&mut Vlan> {
        self.vlans
            .get_mut(&vid)
            .ok_or_else(|| OesError::not_found(format!("vlan {}", vid)))
    }

    pub fn vlans(&self) -> impl Iterator<Item = (&VlanId, &Vlan)> {
        self.vlans.iter()
    }

    pub fn contains(&self, vid: VlanId) -> bool {
        self.vlans.contains_key(&vid)
    }

    pub fn is_member(&self, port: LogPort, vid: VlanId) -> bool {
        self.vlans.get(&vid).is_some_and(|v| v.is_member(port))
    }

    /// Adds or updates a membership, creating the VLAN if needed.
    pub fn add_member(&mut self, vid: VlanId, member: VlanMember) {
        self.vlans
            .entry(vid)
            .or_default()
            .members
            .insert(member.port, member.tagged);
    }

    pub fn remove_member(&mut self, vid: VlanId, port: LogPort) -> OesResult<()> {
        let vlan = self.vlan_mut(vid)?;
        if vlan.members.remove(&port).is_none() {
            return Err(OesError::not_found(format!(
                "port {} in vlan {}",
                port, vid
            )));
        }
        vlan.flood_ports.remove(&port);
        Ok(())
    }

    pub fn remove_vlan(&mut self, vid: VlanId) -> OesResult<Vlan> {
        self.vlans
            .remove(&vid)
            .ok_or_else(|| OesError::not_found(format!("vlan {}", vid)))
    }

    /// Removes every trace of `port`; returns the VLANs it was a member of.
    pub fn remove_port(&mut self, port: LogPort) -> Vec<VlanId> {
        self.ports.remove(&port);
        let mut left = Vec::new();
        for (vid, vlan) in self.vlans.iter_mut() {
            vlan.flood_ports.remove(&port);
            if vlan.members.remove(&port).is_some() {
                left.push(*vid);
            }
        }
        left
    }

    /// VLANs `port` is a member of.
    pub fn port_vlans(&self, port: LogPort) -> Vec<VlanId> {
        self.vlans
            .iter()
            .filter(|(_, vlan)| vlan.is_member(port))
            .map(|(vid, _)| *vid)
            .collect()
    }

    pub fn port_config(&self, port: LogPort) -> VlanPortConfig {
        self.ports.get(&port).copied().unwrap_or_default()
    }

    pub fn port_config_mut(&mut self, port: LogPort) -> &mut VlanPortConfig {
        self.ports.entry(port).or_default()
    }

    pub fn pvid(&self, port: LogPort) -> VlanId {
        self.port_config(port).pvid.unwrap_or(self.default_vid)
    }

    /// Classifies a received frame to a VLAN.
    ///
    /// Returns `None` when the port drops the frame: its format is not
    /// accepted, or ingress filtering is on and the port is not a member of
    /// the resulting VLAN.
    pub fn classify(&self, port: LogPort, tag: FrameTag) -> Option<VlanId> {
        let config = self.port_config(port);
        let pvid = config.pvid.unwrap_or(self.default_vid);

        let vid = match tag {
            FrameTag::Untagged if config.accepted_frames.allow_untagged => pvid,
            FrameTag::PriorityTagged if config.accepted_frames.allow_priority_tagged => pvid,
            FrameTag::Tagged(vid) if config.accepted_frames.allow_tagged => {
                match config.qinq_mode {
                    QinqMode::Dot1q => vid,
                    QinqMode::Qinq => pvid,
                }
            }
            _ => return None,
        };

        if config.ingress_filter == IngressFilterMode::Enabled && !self.is_member(port, vid) {
            return None;
        }
        Some(vid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vlan::AcceptedFrameTypes;
    use oes_common::OesStatus;
    use pretty_assertions::assert_eq;

    fn vid(id: u16) -> VlanId {
        VlanId::new(id).unwrap()
    }

    #[test]
    fn test_add_and_remove_member() {
        let mut table = VlanTable::new();
        table.add_member(vid(10), VlanMember::tagged(LogPort(1)));
        table.add_member(vid(10), VlanMember::untagged(LogPort(2)));
        assert!(table.is_member(LogPort(1), vid(10)));
        assert_eq!(table.vlan(vid(10)).unwrap().members().len(), 2);

        table.remove_member(vid(10), LogPort(1)).unwrap();
        assert!(!table.is_member(LogPort(1), vid(10)));

        let err = table.remove_member(vid(10), LogPort(1)).unwrap_err();
        assert_eq!(err.status(), OesStatus::EntryNotFound);
        assert!(table.remove_member(vid(20), LogPort(1)).is_err());
    }

    #[test]
    fn test_re_add_updates_tagging() {
        let mut table = VlanTable::new();
        table.add_member(vid(10), VlanMember::tagged(LogPort(1)));
        table.add_member(vid(10), VlanMember::untagged(LogPort(1)));
        assert_eq!(
            table.vlan(vid(10)).unwrap().members(),
            vec![VlanMember::untagged(LogPort(1))]
        );
    }

    #[test]
    fn test_remove_port() {
        let mut table = VlanTable::new();
        table.add_member(vid(10), VlanMember::tagged(LogPort(1)));
        table.add_member(vid(20), VlanMember::tagged(LogPort(1)));
        table.add_member(vid(20), VlanMember::tagged(LogPort(2)));
        table.port_config_mut(LogPort(1)).pvid = Some(vid(20));

        assert_eq!(table.remove_port(LogPort(1)), vec![vid(10), vid(20)]);
        assert_eq!(table.pvid(LogPort(1)), VlanId::DEFAULT);
        assert_eq!(table.port_vlans(LogPort(2)), vec![vid(20)]);
    }

    #[test]
    fn test_default_vid_followers() {
        let mut table = VlanTable::new();
        table.port_config_mut(LogPort(1)).pvid = Some(VlanId::DEFAULT);
        table.port_config_mut(LogPort(2)).pvid = Some(vid(30));

        table.set_default_vid(vid(100));
        assert_eq!(table.pvid(LogPort(1)), vid(100));
        assert_eq!(table.pvid(LogPort(2)), vid(30));
        assert_eq!(table.pvid(LogPort(3)), vid(100));
    }

    #[test]
    fn test_classify() {
        let mut table = VlanTable::new();
        table.add_member(vid(10), VlanMember::untagged(LogPort(1)));
        table.port_config_mut(LogPort(1)).pvid = Some(vid(10));

        assert_eq!(table.classify(LogPort(1), FrameTag::Untagged), Some(vid(10)));
        assert_eq!(table.classify(LogPort(1), FrameTag::PriorityTagged), Some(vid(10)));
        assert_eq!(table.classify(LogPort(1), FrameTag::Tagged(vid(20))), Some(vid(20)));

        table.port_config_mut(LogPort(1)).ingress_filter = IngressFilterMode::Enabled;
        assert_eq!(table.classify(LogPort(1), FrameTag::Tagged(vid(20))), None);

        table.port_config_mut(LogPort(1)).accepted_frames = AcceptedFrameTypes {
            allow_tagged: true,
            allow_untagged: false,
            allow_priority_tagged: false,
        };
        assert_eq!(table.classify(LogPort(1), FrameTag::Untagged), None);
        assert_eq!(table.classify(LogPort(1), FrameTag::Tagged(vid(10))), Some(vid(10)));
    }

    #[test]
    fn test_classify_qinq() {
        let mut table = VlanTable::new();
        let config = table.port_config_mut(LogPort(1));
        config.pvid = Some(vid(500));
        config.qinq_mode = QinqMode::Qinq;

        assert_eq!(table.classify(LogPort(1), FrameTag::Tagged(vid(10))), Some(vid(500)));
    }
}
