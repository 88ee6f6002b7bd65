//! Port types.

use super::counters::PortCounters;
use crate::config::PortConfig;
use oes_types::{AdminState, BridgeId, LogPort, MacAddress, OperState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PORT_MTU_MIN: u32 = 64;
pub const PORT_MTU_MAX: u32 = 10240;
pub const PORT_MTU_DEFAULT: u32 = 1500;

/// Port speed and media type, with the vendor numbering.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSpeed {
    NotAvailable = 0,
    Speed1GbCxSgmii = 1,
    Speed1GbKx = 2,
    Speed10GbCx4Xaui = 3,
    Speed10GbKx4 = 4,
    Speed10GbKr = 5,
    Speed20GbKr2 = 6,
    Speed40GbCr4 = 7,
    Speed40GbKr4 = 8,
    Speed56GbKr4 = 9,
    Speed56GbKx4 = 10,
}

impl PortSpeed {
    /// Line rate in Mb/s.
    pub fn mbps(&self) -> u32 {
        match self {
            PortSpeed::NotAvailable => 0,
            PortSpeed::Speed1GbCxSgmii | PortSpeed::Speed1GbKx => 1_000,
            PortSpeed::Speed10GbCx4Xaui | PortSpeed::Speed10GbKx4 | PortSpeed::Speed10GbKr => {
                10_000
            }
            PortSpeed::Speed20GbKr2 => 20_000,
            PortSpeed::Speed40GbCr4 | PortSpeed::Speed40GbKr4 => 40_000,
            PortSpeed::Speed56GbKr4 | PortSpeed::Speed56GbKx4 => 56_000,
        }
    }
}

/// Speeds a port is allowed to negotiate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortSpeedCapability {
    pub speeds: BTreeSet<PortSpeed>,
}

impl PortSpeedCapability {
    pub fn new(speeds: impl IntoIterator<Item = PortSpeed>) -> Self {
        Self {
            speeds: speeds.into_iter().collect(),
        }
    }

    /// Every speed up to and including `max`.
    pub fn up_to(max: PortSpeed) -> Self {
        Self::new(
            ALL_SPEEDS
                .iter()
                .copied()
                .filter(|s| *s != PortSpeed::NotAvailable && s.mbps() <= max.mbps()),
        )
    }

    /// The speed a link comes up at.
    pub fn highest(&self) -> PortSpeed {
        self.speeds
            .iter()
            .copied()
            .max_by_key(|s| (s.mbps(), *s))
            .unwrap_or(PortSpeed::NotAvailable)
    }
}

const ALL_SPEEDS: [PortSpeed; 11] = [
    PortSpeed::NotAvailable,
    PortSpeed::Speed1GbCxSgmii,
    PortSpeed::Speed1GbKx,
    PortSpeed::Speed10GbCx4Xaui,
    PortSpeed::Speed10GbKx4,
    PortSpeed::Speed10GbKr,
    PortSpeed::Speed20GbKr2,
    PortSpeed::Speed40GbCr4,
    PortSpeed::Speed40GbKr4,
    PortSpeed::Speed56GbKr4,
    PortSpeed::Speed56GbKx4,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortLoopback {
    #[default]
    None,
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowCtrlMode {
    GlobalPause,
    Pfc,
}

/// Pause frame generation and reception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FlowCtrlEnable {
    pub tx: bool,
    pub rx: bool,
}

impl FlowCtrlEnable {
    pub const DISABLED: FlowCtrlEnable = FlowCtrlEnable { tx: false, rx: false };

    pub fn is_enabled(&self) -> bool {
        self.tx || self.rx
    }
}

/// Flow control setting. `prio` is only meaningful in PFC mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCtrlParams {
    pub mode: FlowCtrlMode,
    pub prio: u8,
    pub enable: FlowCtrlEnable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowCtrlState {
    pub global: FlowCtrlEnable,
    pub pfc: [FlowCtrlEnable; 8],
}

impl FlowCtrlState {
    pub fn any_pfc(&self) -> bool {
        self.pfc.iter().any(FlowCtrlEnable::is_enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopbackFilterMode {
    #[default]
    Disabled,
    Enabled,
}

/// Packet sampling on a port: one in `rate` packets, randomized by
/// `deviation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SflowParams {
    pub rate: u32,
    pub deviation: u32,
    /// Bytes of each sampled packet sent to the collector.
    pub cutoff_bytes: u16,
}

/// State of one logical port.
#[derive(Debug, Clone)]
pub struct PortState {
    pub(crate) id: LogPort,
    pub(crate) bridge: Option<BridgeId>,
    pub(crate) max_speed: PortSpeed,
    pub(crate) speed_capability: PortSpeedCapability,
    pub(crate) mac: MacAddress,
    pub(crate) mtu: u32,
    pub(crate) loopback: PortLoopback,
    pub(crate) admin: AdminState,
    pub(crate) link_up: bool,
    pub(crate) oper: OperState,
    pub(crate) flow_ctrl: FlowCtrlState,
    pub(crate) counters: PortCounters,
    pub(crate) policer: Option<u32>,
    pub(crate) sflow: Option<SflowParams>,
    pub(crate) loopback_filter: LoopbackFilterMode,
    /// Ports whose traffic must not be transmitted to this port.
    pub(crate) isolation: BTreeSet<LogPort>,
    /// The LAG this port is a member of.
    pub(crate) lag: Option<LogPort>,
}

impl PortState {
    pub(crate) fn physical(config: &PortConfig) -> Self {
        Self {
            id: config.id,
            bridge: None,
            max_speed: config.speed,
            speed_capability: PortSpeedCapability::up_to(config.speed),
            mac: config.mac,
            mtu: PORT_MTU_DEFAULT,
            loopback: PortLoopback::None,
            admin: AdminState::Down,
            link_up: false,
            oper: OperState::Down,
            flow_ctrl: FlowCtrlState::default(),
            counters: PortCounters::default(),
            policer: None,
            sflow: None,
            loopback_filter: LoopbackFilterMode::Disabled,
            isolation: BTreeSet::new(),
            lag: None,
        }
    }

    /// A LAG port starts administratively up; it is oper up while any
    /// member is.
    pub(crate) fn lag(id: LogPort, bridge: BridgeId, mac: MacAddress) -> Self {
        Self {
            id,
            bridge: Some(bridge),
            max_speed: PortSpeed::NotAvailable,
            speed_capability: PortSpeedCapability::default(),
            mac,
            mtu: PORT_MTU_DEFAULT,
            loopback: PortLoopback::None,
            admin: AdminState::Up,
            link_up: false,
            oper: OperState::Down,
            flow_ctrl: FlowCtrlState::default(),
            counters: PortCounters::default(),
            policer: None,
            sflow: None,
            loopback_filter: LoopbackFilterMode::Disabled,
            isolation: BTreeSet::new(),
            lag: None,
        }
    }

    pub fn id(&self) -> LogPort {
        self.id
    }

    pub fn bridge(&self) -> Option<BridgeId> {
        self.bridge
    }

    pub fn admin(&self) -> AdminState {
        self.admin
    }

    pub fn oper(&self) -> OperState {
        self.oper
    }

    pub fn lag_membership(&self) -> Option<LogPort> {
        self.lag
    }

    pub fn is_lag(&self) -> bool {
        self.id.is_lag()
    }

    /// Recomputes the oper state from admin state and link.
    ///
    /// Returns the new state if it changed.
    pub(crate) fn refresh_oper(&mut self) -> Option<OperState> {
        let oper = if self.admin.is_up() && self.link_up {
            OperState::Up
        } else {
            OperState::Down
        };
        if oper == self.oper {
            return None;
        }
        self.oper = oper;
        Some(oper)
    }

    pub(crate) fn oper_speed(&self) -> PortSpeed {
        if self.oper.is_up() {
            self.speed_capability.highest()
        } else {
            PortSpeed::NotAvailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn port_config() -> PortConfig {
        PortConfig {
            id: LogPort(1),
            speed: PortSpeed::Speed40GbCr4,
            mac: "00:02:c9:00:00:01".parse().unwrap(),
        }
    }

    #[test]
    fn test_capability_up_to() {
        let cap = PortSpeedCapability::up_to(PortSpeed::Speed10GbKr);
        assert!(cap.speeds.contains(&PortSpeed::Speed1GbKx));
        assert!(cap.speeds.contains(&PortSpeed::Speed10GbKx4));
        assert!(!cap.speeds.contains(&PortSpeed::Speed20GbKr2));
        assert!(!cap.speeds.contains(&PortSpeed::NotAvailable));
    }

    #[test]
    fn test_highest_speed() {
        let cap = PortSpeedCapability::new([PortSpeed::Speed1GbKx, PortSpeed::Speed20GbKr2]);
        assert_eq!(cap.highest(), PortSpeed::Speed20GbKr2);
        assert_eq!(PortSpeedCapability::default().highest(), PortSpeed::NotAvailable);
    }

    #[test]
    fn test_oper_follows_admin_and_link() {
        let mut port = PortState::physical(&port_config());
        assert_eq!(port.oper(), OperState::Down);

        port.link_up = true;
        assert_eq!(port.refresh_oper(), None);

        port.admin = AdminState::Up;
        assert_eq!(port.refresh_oper(), Some(OperState::Up));
        assert_eq!(port.oper_speed(), PortSpeed::Speed40GbKr4);

        port.link_up = false;
        assert_eq!(port.refresh_oper(), Some(OperState::Down));
        assert_eq!(port.oper_speed(), PortSpeed::NotAvailable);
    }
}
