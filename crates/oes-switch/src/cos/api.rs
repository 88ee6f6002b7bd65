//! CoS operations.

use super::types::{
    CosDecision, EtsArbitration, PortBuffConfig, PortEtsConfig, TcEtsConfig, TrustLevel,
    NUM_DSCP, NUM_PRIORITIES, NUM_TRAFFIC_CLASSES,
};
use crate::switch::Switch;
use log::{debug, info};
use oes_common::{AccessCmd, OesError, OesResult};
use oes_types::{BridgeId, LogPort};

const PRIO_MAX: i64 = NUM_PRIORITIES as i64 - 1;
const TC_MAX: i64 = NUM_TRAFFIC_CLASSES as i64 - 1;
const DSCP_MAX: i64 = NUM_DSCP as i64 - 1;

fn check_prio(param: &'static str, prio: u8) -> OesResult<()> {
    OesError::check_range(param, i64::from(prio), 0, PRIO_MAX)
}

fn check_tc(tc: u8) -> OesResult<()> {
    OesError::check_range("traffic_class", i64::from(tc), 0, TC_MAX)
}

impl Switch {
    pub fn cos_port_default_prio_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        prio: u8,
    ) -> OesResult<()> {
        check_prio("priority", prio)?;
        self.ensure_configurable(br, port)?;
        self.bridge_mut(br)?.cos.port_mut(port).default_prio = prio;
        Ok(())
    }

    pub fn cos_port_default_prio_get(&self, br: BridgeId, port: LogPort) -> OesResult<u8> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.cos().port(port).default_prio)
    }

    /// Maps a received priority to the priority used inside the switch.
    pub fn cos_port_prio_regen_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        orig_prio: u8,
        regen_prio: u8,
    ) -> OesResult<()> {
        check_prio("orig_priority", orig_prio)?;
        check_prio("regen_priority", regen_prio)?;
        self.ensure_configurable(br, port)?;
        self.bridge_mut(br)?.cos.port_mut(port).prio_regen[usize::from(orig_prio)] = regen_prio;
        Ok(())
    }

    pub fn cos_port_prio_regen_get(
        &self,
        br: BridgeId,
        port: LogPort,
        orig_prio: u8,
    ) -> OesResult<u8> {
        check_prio("orig_priority", orig_prio)?;
        self.member(br, port)?;
        Ok(self.bridge(br)?.cos().port(port).prio_regen[usize::from(orig_prio)])
    }

    /// ADD maps `prio` to `tc`. DELETE restores the default mapping of
    /// `prio` and ignores `tc`.
    pub fn cos_port_tc_prio_map_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        prio: u8,
        tc: u8,
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "cos_port_tc_prio_map_set")?;
        check_prio("priority", prio)?;
        let tc = match cmd {
            AccessCmd::Add => {
                check_tc(tc)?;
                tc
            }
            _ => prio,
        };
        self.ensure_configurable(br, port)?;
        self.bridge_mut(br)?.cos.port_mut(port).tc_map[usize::from(prio)] = tc;
        debug!("CosMgr: port {} priority {} -> tc {}", port, prio, tc);
        Ok(())
    }

    pub fn cos_port_tc_prio_map_get(
        &self,
        br: BridgeId,
        port: LogPort,
        prio: u8,
    ) -> OesResult<u8> {
        check_prio("priority", prio)?;
        self.member(br, port)?;
        Ok(self.bridge(br)?.cos().port(port).tc_map[usize::from(prio)])
    }

    pub fn cos_port_trust_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        trust: TrustLevel,
    ) -> OesResult<()> {
        self.ensure_configurable(br, port)?;
        self.bridge_mut(br)?.cos.port_mut(port).trust = trust;
        info!("CosMgr: port {} trusts {:?}", port, trust);
        Ok(())
    }

    pub fn cos_port_trust_get(&self, br: BridgeId, port: LogPort) -> OesResult<TrustLevel> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.cos().port(port).trust)
    }

    pub fn cos_dscp_to_prio_set(&mut self, br: BridgeId, dscp: u8, prio: u8) -> OesResult<()> {
        OesError::check_range("dscp", i64::from(dscp), 0, DSCP_MAX)?;
        check_prio("priority", prio)?;
        self.bridge_mut(br)?.cos.dscp_to_prio[usize::from(dscp)] = prio;
        Ok(())
    }

    pub fn cos_dscp_to_prio_get(&self, br: BridgeId, dscp: u8) -> OesResult<u8> {
        OesError::check_range("dscp", i64::from(dscp), 0, DSCP_MAX)?;
        Ok(self.bridge(br)?.cos().dscp_to_prio[usize::from(dscp)])
    }

    /// Updates the ETS settings of the listed traffic classes.
    ///
    /// The guaranteed shares of the DWRR classes of the port, after the
    /// update, may not exceed 100%.
    pub fn cos_tc_ets_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        configs: &[TcEtsConfig],
    ) -> OesResult<()> {
        if configs.is_empty() {
            return Err(OesError::param("empty traffic class list"));
        }
        for config in configs {
            check_tc(config.tc)?;
            OesError::check_range("bw_allocation", i64::from(config.bw_allocation), 0, 100)?;
        }
        self.ensure_configurable(br, port)?;

        let mut updated = self.bridge(br)?.cos().port(port).tc_ets;
        for config in configs {
            updated[usize::from(config.tc)] = *config;
        }
        let cos = self.bridge(br)?.cos().port(port);
        if cos.port_ets.arbitration == EtsArbitration::Dwrr {
            let total: u32 = updated.iter().map(|c| u32::from(c.bw_allocation)).sum();
            if total > 100 {
                return Err(OesError::param(format!(
                    "port {} bandwidth shares add up to {}%",
                    port, total
                )));
            }
        }

        self.bridge_mut(br)?.cos.port_mut(port).tc_ets = updated;
        Ok(())
    }

    pub fn cos_tc_ets_get(&self, br: BridgeId, port: LogPort) -> OesResult<Vec<TcEtsConfig>> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.cos().port(port).tc_ets.to_vec())
    }

    pub fn cos_port_ets_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        config: &PortEtsConfig,
    ) -> OesResult<()> {
        self.ensure_configurable(br, port)?;
        self.bridge_mut(br)?.cos.port_mut(port).port_ets = *config;
        Ok(())
    }

    pub fn cos_port_ets_get(&self, br: BridgeId, port: LogPort) -> OesResult<PortEtsConfig> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.cos().port(port).port_ets)
    }

    /// Replaces the ingress buffer layout of a physical port.
    pub fn cos_port_buff_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        config: &PortBuffConfig,
    ) -> OesResult<()> {
        config.validate()?;
        self.physical_member_mut(br, port)?;
        self.bridge_mut(br)?.cos.port_mut(port).buffers = config.clone();
        info!(
            "CosMgr: port {} configured with {} buffers",
            port,
            config.buffers.len()
        );
        Ok(())
    }

    pub fn cos_port_buff_get(&self, br: BridgeId, port: LogPort) -> OesResult<PortBuffConfig> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.cos().port(port).buffers)
    }

    /// Priority and traffic class of a packet received on `port`. Packets
    /// received on a LAG member use the LAG settings.
    pub fn cos_classify(
        &self,
        br: BridgeId,
        port: LogPort,
        pcp: Option<u8>,
        dscp: Option<u8>,
    ) -> OesResult<CosDecision> {
        if let Some(pcp) = pcp {
            check_prio("pcp", pcp)?;
        }
        if let Some(dscp) = dscp {
            OesError::check_range("dscp", i64::from(dscp), 0, DSCP_MAX)?;
        }
        self.member(br, port)?;
        let port = self.logical_port(port);
        Ok(self.bridge(br)?.cos().classify(port, pcp, dscp))
    }
}
