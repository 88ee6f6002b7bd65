//! STP types and per-bridge STP table.

use oes_types::{LogPort, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const CIST_ID: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StpMode {
    #[default]
    Rstp,
    Mstp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StpPortState {
    Discarding,
    Learning,
    #[default]
    Forwarding,
}

impl StpPortState {
    pub fn learns(&self) -> bool {
        !matches!(self, StpPortState::Discarding)
    }

    pub fn forwards(&self) -> bool {
        matches!(self, StpPortState::Forwarding)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StpTable {
    pub(crate) mode: StpMode,
    /// MSTI id to mapped VLANs.
    pub(crate) mstis: BTreeMap<u16, BTreeSet<VlanId>>,
    /// Only non-forwarding states are stored.
    pub(crate) port_states: BTreeMap<(u16, LogPort), StpPortState>,
}

impl StpTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> StpMode {
        self.mode
    }

    pub fn has_instance(&self, inst: u16) -> bool {
        inst == CIST_ID || self.mstis.contains_key(&inst)
    }

    pub fn instance_for_vlan(&self, vid: VlanId) -> u16 {
        self.mstis
            .iter()
            .find(|(_, vlans)| vlans.contains(&vid))
            .map(|(inst, _)| *inst)
            .unwrap_or(CIST_ID)
    }

    pub fn port_state(&self, inst: u16, port: LogPort) -> StpPortState {
        self.port_states
            .get(&(inst, port))
            .copied()
            .unwrap_or_default()
    }

    pub fn port_state_for_vlan(&self, port: LogPort, vid: VlanId) -> StpPortState {
        self.port_state(self.instance_for_vlan(vid), port)
    }

    pub(crate) fn set_port_state(&mut self, inst: u16, port: LogPort, state: StpPortState) {
        if state == StpPortState::Forwarding {
            self.port_states.remove(&(inst, port));
        } else {
            self.port_states.insert((inst, port), state);
        }
    }

    /// Drops an MSTI and the port states kept for it.
    pub(crate) fn remove_instance(&mut self, inst: u16) -> Option<BTreeSet<VlanId>> {
        self.port_states.retain(|(i, _), _| *i != inst);
        self.mstis.remove(&inst)
    }

    pub(crate) fn remove_port(&mut self, port: LogPort) {
        self.port_states.retain(|(_, p), _| *p != port);
    }
}
