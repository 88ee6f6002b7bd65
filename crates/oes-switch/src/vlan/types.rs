//! VLAN types.

use oes_types::{LogPort, VlanId};
use serde::{Deserialize, Serialize};

/// A port's membership in a VLAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VlanMember {
    pub port: LogPort,
    /// Egress frames carry the VLAN tag.
    pub tagged: bool,
}

impl VlanMember {
    pub fn tagged(port: LogPort) -> Self {
        Self { port, tagged: true }
    }

    pub fn untagged(port: LogPort) -> Self {
        Self {
            port,
            tagged: false,
        }
    }
}

/// A VLAN a port joins, as passed to multi-VLAN updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortVlan {
    pub vid: VlanId,
    pub tagged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngressFilterMode {
    #[default]
    Disabled,
    Enabled,
}

/// Frame formats a port accepts on ingress. At least one must be allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcceptedFrameTypes {
    pub allow_tagged: bool,
    pub allow_untagged: bool,
    pub allow_priority_tagged: bool,
}

impl Default for AcceptedFrameTypes {
    fn default() -> Self {
        Self {
            allow_tagged: true,
            allow_untagged: true,
            allow_priority_tagged: true,
        }
    }
}

impl AcceptedFrameTypes {
    pub fn allows_any(&self) -> bool {
        self.allow_tagged || self.allow_untagged || self.allow_priority_tagged
    }
}

/// 802.1Q tag of a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameTag {
    Untagged,
    /// Tagged with VID 0.
    PriorityTagged,
    Tagged(VlanId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloodType {
    Unicast,
    Multicast,
    Broadcast,
}

/// `Flood` sends unknown traffic to every VLAN member; `Prune` restricts it
/// to the VLAN's flood port list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloodCmd {
    #[default]
    Flood,
    Prune,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FloodModes {
    pub unicast: FloodCmd,
    pub multicast: FloodCmd,
    pub broadcast: FloodCmd,
}

impl FloodModes {
    pub fn get(&self, flood_type: FloodType) -> FloodCmd {
        match flood_type {
            FloodType::Unicast => self.unicast,
            FloodType::Multicast => self.multicast,
            FloodType::Broadcast => self.broadcast,
        }
    }

    pub fn set(&mut self, flood_type: FloodType, cmd: FloodCmd) {
        match flood_type {
            FloodType::Unicast => self.unicast = cmd,
            FloodType::Multicast => self.multicast = cmd,
            FloodType::Broadcast => self.broadcast = cmd,
        }
    }
}

/// Q-in-Q mode of a port. A `Qinq` port classifies every frame to its PVID
/// and pushes an outer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QinqMode {
    #[default]
    Dot1q,
    Qinq,
}

/// Priority of the pushed outer tag: the port default priority, or copied
/// from the inner tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QinqOuterPrioMode {
    #[default]
    Fixed,
    Copy,
}

/// Per-port VLAN settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VlanPortConfig {
    /// `None` follows the bridge default VID.
    pub pvid: Option<VlanId>,
    pub ingress_filter: IngressFilterMode,
    pub accepted_frames: AcceptedFrameTypes,
    pub qinq_mode: QinqMode,
    pub qinq_outer_prio: QinqOuterPrioMode,
}
