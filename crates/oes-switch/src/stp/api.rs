//! STP operations.

use super::types::{StpMode, StpPortState, CIST_ID};
use crate::config::MSTI_ID_MAX;
use crate::switch::Switch;
use log::{debug, info};
use oes_common::{AccessCmd, OesError, OesResult};
use oes_types::{BridgeId, LogPort, VlanId};
use std::collections::BTreeSet;

impl Switch {
    /// Switching to RSTP deletes every MSTI.
    pub fn stp_mode_set(&mut self, br: BridgeId, mode: StpMode) -> OesResult<()> {
        let stp = &mut self.bridge_mut(br)?.stp;
        if mode == StpMode::Rstp {
            let mstis: Vec<u16> = stp.mstis.keys().copied().collect();
            for inst in mstis {
                stp.remove_instance(inst);
            }
        }
        stp.mode = mode;
        info!("StpMgr: {} runs {:?}", br, mode);
        Ok(())
    }

    pub fn stp_mode_get(&self, br: BridgeId) -> OesResult<StpMode> {
        Ok(self.bridge(br)?.stp().mode())
    }

    /// Creates or deletes an MSTI. Deleting returns its VLANs to the CIST.
    pub fn stp_msti_set(&mut self, cmd: AccessCmd, br: BridgeId, inst: u16) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "stp_msti_set")?;
        OesError::check_range("inst", i64::from(inst), 1, i64::from(MSTI_ID_MAX))?;
        let max_msti = self.config.max_msti;
        let stp = &mut self.bridge_mut(br)?.stp;
        if stp.mode != StpMode::Mstp {
            return Err(OesError::param(format!(
                "{} is not in MSTP mode, cannot manage instance {}",
                br, inst
            )));
        }

        match cmd {
            AccessCmd::Add => {
                if stp.mstis.contains_key(&inst) {
                    return Err(OesError::already_exists(format!("msti {}", inst)));
                }
                if stp.mstis.len() >= max_msti {
                    return Err(OesError::no_resources("msti"));
                }
                stp.mstis.insert(inst, BTreeSet::new());
                info!("StpMgr: created msti {} on {}", inst, br);
            }
            _ => {
                let vlans = stp
                    .remove_instance(inst)
                    .ok_or_else(|| OesError::not_found(format!("msti {}", inst)))?;
                info!(
                    "StpMgr: deleted msti {} on {}, {} vlans back to the CIST",
                    inst,
                    br,
                    vlans.len()
                );
            }
        }
        Ok(())
    }

    /// Maps VLANs to, or unmaps them from, an MSTI. A VLAN mapped to
    /// another MSTI moves.
    pub fn stp_msti_vlan_list_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        inst: u16,
        vlans: &[VlanId],
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "stp_msti_vlan_list_set")?;
        let stp = &mut self.bridge_mut(br)?.stp;
        if !stp.mstis.contains_key(&inst) {
            return Err(OesError::not_found(format!("msti {}", inst)));
        }

        match cmd {
            AccessCmd::Add => {
                for mapped in stp.mstis.values_mut() {
                    for vid in vlans {
                        mapped.remove(vid);
                    }
                }
                if let Some(mapped) = stp.mstis.get_mut(&inst) {
                    mapped.extend(vlans.iter().copied());
                }
            }
            _ => {
                let mapped = stp.mstis.get_mut(&inst).ok_or_else(|| {
                    OesError::not_found(format!("msti {}", inst))
                })?;
                if let Some(missing) = vlans.iter().find(|v| !mapped.contains(*v)) {
                    return Err(OesError::not_found(format!(
                        "vlan {} in msti {}",
                        missing, inst
                    )));
                }
                for vid in vlans {
                    mapped.remove(vid);
                }
            }
        }
        debug!("StpMgr: {} {} vlans of msti {} on {}", cmd, vlans.len(), inst, br);
        Ok(())
    }

    /// VLANs of an instance. For the CIST these are the bridge VLANs not
    /// mapped to any MSTI.
    pub fn stp_msti_vlan_list_get(&self, br: BridgeId, inst: u16) -> OesResult<Vec<VlanId>> {
        let bridge = self.bridge(br)?;
        let stp = bridge.stp();
        if inst == CIST_ID {
            return Ok(bridge
                .vlans()
                .vlans()
                .map(|(vid, _)| *vid)
                .filter(|vid| stp.instance_for_vlan(*vid) == CIST_ID)
                .collect());
        }
        stp.mstis
            .get(&inst)
            .map(|vlans| vlans.iter().copied().collect())
            .ok_or_else(|| OesError::not_found(format!("msti {}", inst)))
    }

    /// Sets the state of a port in an instance. Entering `Discarding`
    /// flushes the port's dynamic FDB entries on the instance's VLANs.
    pub fn stp_msti_port_state_set(
        &mut self,
        br: BridgeId,
        inst: u16,
        port: LogPort,
        state: StpPortState,
    ) -> OesResult<()> {
        self.ensure_configurable(br, port)?;
        let bridge = self.bridge_mut(br)?;
        if !bridge.stp.has_instance(inst) {
            return Err(OesError::not_found(format!("msti {}", inst)));
        }
        bridge.stp.set_port_state(inst, port, state);

        if state == StpPortState::Discarding {
            let stp = &bridge.stp;
            let flushed = bridge
                .fdb
                .flush(|e| e.port == port && stp.instance_for_vlan(e.vid) == inst);
            debug!(
                "StpMgr: port {} discarding in instance {}, flushed {} entries",
                port,
                inst,
                flushed.len()
            );
        }
        Ok(())
    }

    pub fn stp_msti_port_state_get(
        &self,
        br: BridgeId,
        inst: u16,
        port: LogPort,
    ) -> OesResult<StpPortState> {
        self.member(br, port)?;
        let stp = self.bridge(br)?.stp();
        if !stp.has_instance(inst) {
            return Err(OesError::not_found(format!("msti {}", inst)));
        }
        Ok(stp.port_state(inst, port))
    }

    /// State of `port` in the instance `vid` is mapped to.
    pub fn stp_port_state_for_vlan(
        &self,
        br: BridgeId,
        port: LogPort,
        vid: VlanId,
    ) -> OesResult<StpPortState> {
        self.member(br, port)?;
        let port = self.logical_port(port);
        Ok(self.bridge(br)?.stp().port_state_for_vlan(port, vid))
    }
}
