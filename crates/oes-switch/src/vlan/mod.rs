//! VLAN membership, per-port VLAN settings and flooding control.

mod api;
mod table;
mod types;

pub use table::{Vlan, VlanTable};
pub use types::{
    AcceptedFrameTypes, FloodCmd, FloodModes, FloodType, FrameTag, IngressFilterMode, PortVlan,
    QinqMode, QinqOuterPrioMode, VlanMember, VlanPortConfig,
};
