//! Port operations.
//!
//! Operations take the bridge the port belongs to and fail with
//! `PARAM_ERROR` when the port is not one of its members.

use super::counters::{
    Ieee8023Counters, PortCounters, Rfc2819Counters, Rfc2863Counters, Rfc3635Counters,
};
use super::counters::FrameSample;
use super::types::{
    FlowCtrlEnable, FlowCtrlMode, FlowCtrlParams, LoopbackFilterMode, PortLoopback, PortSpeed,
    PortSpeedCapability, SflowParams, PORT_MTU_MAX, PORT_MTU_MIN,
};
use crate::event::Event;
use crate::switch::Switch;
use log::{debug, info};
use oes_common::{AccessCmd, CounterCmd, OesError, OesResult};
use oes_types::{AdminState, BridgeId, LogPort, MacAddress, OperState};

/// Highest sFlow sampling deviation, in percent of the rate.
const SFLOW_DEVIATION_MAX: u32 = 100;

impl Switch {
    /// Sets the MTU of a port. On a LAG port the members follow.
    pub fn port_mtu_set(&mut self, br: BridgeId, port: LogPort, mtu: u32) -> OesResult<()> {
        OesError::check_range(
            "mtu",
            i64::from(mtu),
            i64::from(PORT_MTU_MIN),
            i64::from(PORT_MTU_MAX),
        )?;
        self.member_mut(br, port)?.mtu = mtu;

        if port.is_lag() {
            for state in self.ports.values_mut() {
                if state.lag == Some(port) {
                    state.mtu = mtu;
                }
            }
        }
        debug!("PortMgr: port {} mtu {}", port, mtu);
        Ok(())
    }

    pub fn port_mtu_get(&self, br: BridgeId, port: LogPort) -> OesResult<u32> {
        Ok(self.member(br, port)?.mtu)
    }

    /// Restricts the speeds a physical port may negotiate. Every speed must
    /// be supported by the port hardware.
    pub fn port_speed_capability_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        capability: &PortSpeedCapability,
    ) -> OesResult<()> {
        let state = self.physical_member_mut(br, port)?;
        if capability.speeds.is_empty() {
            return Err(OesError::param("speed capability is empty"));
        }
        if let Some(bad) = capability
            .speeds
            .iter()
            .find(|s| **s == PortSpeed::NotAvailable || s.mbps() > state.max_speed.mbps())
        {
            return Err(OesError::param(format!(
                "port {} does not support speed {:?}",
                port, bad
            )));
        }
        state.speed_capability = capability.clone();
        Ok(())
    }

    pub fn port_speed_capability_get(
        &self,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<PortSpeedCapability> {
        Ok(self.member(br, port)?.speed_capability.clone())
    }

    /// Operational speed: the highest enabled capability while the port is
    /// oper up, `NotAvailable` otherwise.
    pub fn port_speed_get(&self, br: BridgeId, port: LogPort) -> OesResult<PortSpeed> {
        Ok(self.member(br, port)?.oper_speed())
    }

    pub fn port_mac_addr_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        mac: MacAddress,
    ) -> OesResult<()> {
        if !mac.is_valid_station() {
            return Err(OesError::param(format!("port MAC {} is not unicast", mac)));
        }
        self.member_mut(br, port)?.mac = mac;
        Ok(())
    }

    pub fn port_mac_addr_get(&self, br: BridgeId, port: LogPort) -> OesResult<MacAddress> {
        Ok(self.member(br, port)?.mac)
    }

    pub fn port_phys_loopback_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        loopback: PortLoopback,
    ) -> OesResult<()> {
        let state = self.physical_member_mut(br, port)?;
        if let Some(lag) = state.lag {
            return Err(OesError::param(format!(
                "port {} is a member of {}, loopback not allowed",
                port, lag
            )));
        }
        state.loopback = loopback;
        Ok(())
    }

    pub fn port_phys_loopback_get(&self, br: BridgeId, port: LogPort) -> OesResult<PortLoopback> {
        Ok(self.member(br, port)?.loopback)
    }

    /// Sets the admin state; the oper state follows.
    pub fn port_state_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        admin: AdminState,
    ) -> OesResult<()> {
        self.member_mut(br, port)?.admin = admin;
        info!("PortMgr: port {} admin state {}", port, admin);
        self.refresh_port_oper(port)
    }

    pub fn port_state_get(
        &self,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<(AdminState, OperState)> {
        let state = self.member(br, port)?;
        Ok((state.admin, state.oper))
    }

    /// Feeds a link signal from the PHY of a physical port.
    pub fn port_link_update(&mut self, port: LogPort, up: bool) -> OesResult<()> {
        if port.is_lag() {
            return Err(OesError::param(format!(
                "{} is a LAG port, its link follows its members",
                port
            )));
        }
        self.ports.lookup_mut(&port)?.link_up = up;
        self.refresh_port_oper(port)
    }

    /// Recomputes the oper state of a port, and of its LAG when it is a
    /// member.
    pub(crate) fn refresh_port_oper(&mut self, port: LogPort) -> OesResult<()> {
        let state = self.ports.lookup_mut(&port)?;
        let changed = state.refresh_oper();
        let (bridge, lag) = (state.bridge, state.lag);

        if let Some(oper) = changed {
            self.on_oper_change(bridge, port, oper);
        }
        if let Some(lag) = lag {
            self.refresh_lag_oper(lag)?;
        }
        Ok(())
    }

    /// A LAG is linked while any member is oper up.
    pub(crate) fn refresh_lag_oper(&mut self, lag: LogPort) -> OesResult<()> {
        let any_up = self
            .ports
            .values()
            .any(|p| p.lag == Some(lag) && p.oper.is_up());
        self.ports.lookup_mut(&lag)?.link_up = any_up;
        self.refresh_port_oper(lag)
    }

    fn on_oper_change(&mut self, bridge: Option<BridgeId>, port: LogPort, oper: OperState) {
        info!("PortMgr: port {} oper state {}", port, oper);
        let Some(br) = bridge else {
            return;
        };

        if !oper.is_up() && self.config.flush_fdb_on_port_down {
            if let Some(bridge) = self.bridges.get_mut(&br) {
                let flushed = bridge.fdb.flush(|e| e.port == port);
                if !flushed.is_empty() {
                    info!(
                        "PortMgr: flushed {} FDB entries of port {} on link down",
                        flushed.len(),
                        port
                    );
                }
            }
        }
        self.publish(br, Event::PortOperState { port, state: oper });
    }

    /// Global pause and PFC are mutually exclusive on a port.
    pub fn port_flow_ctrl_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        params: &FlowCtrlParams,
    ) -> OesResult<()> {
        let state = self.physical_member_mut(br, port)?;
        let fc = &mut state.flow_ctrl;

        match params.mode {
            FlowCtrlMode::GlobalPause => {
                if params.enable.is_enabled() && fc.any_pfc() {
                    return Err(OesError::param(format!(
                        "port {} has PFC enabled, cannot enable global pause",
                        port
                    )));
                }
                fc.global = params.enable;
            }
            FlowCtrlMode::Pfc => {
                OesError::check_range("prio", i64::from(params.prio), 0, 7)?;
                if params.enable.is_enabled() && fc.global.is_enabled() {
                    return Err(OesError::param(format!(
                        "port {} has global pause enabled, cannot enable PFC",
                        port
                    )));
                }
                fc.pfc[usize::from(params.prio)] = params.enable;
            }
        }
        Ok(())
    }

    /// Flow control setting of a port; `prio` is used in PFC mode only.
    pub fn port_flow_ctrl_get(
        &self,
        br: BridgeId,
        port: LogPort,
        mode: FlowCtrlMode,
        prio: u8,
    ) -> OesResult<FlowCtrlEnable> {
        let state = self.member(br, port)?;
        match mode {
            FlowCtrlMode::GlobalPause => Ok(state.flow_ctrl.global),
            FlowCtrlMode::Pfc => {
                OesError::check_range("prio", i64::from(prio), 0, 7)?;
                Ok(state.flow_ctrl.pfc[usize::from(prio)])
            }
        }
    }

    fn read_counters<T: Copy + Default>(
        &mut self,
        cmd: CounterCmd,
        br: BridgeId,
        port: LogPort,
        family: fn(&mut PortCounters) -> &mut T,
    ) -> OesResult<T> {
        let counters = family(&mut self.member_mut(br, port)?.counters);
        let value = *counters;
        if cmd.clears() {
            *counters = T::default();
        }
        Ok(value)
    }

    pub fn port_cntr_ieee_802_dot_3_get(
        &mut self,
        cmd: CounterCmd,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<Ieee8023Counters> {
        self.read_counters(cmd, br, port, |c| &mut c.ieee_802_3)
    }

    pub fn port_cntr_rfc_2863_get(
        &mut self,
        cmd: CounterCmd,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<Rfc2863Counters> {
        self.read_counters(cmd, br, port, |c| &mut c.rfc_2863)
    }

    pub fn port_cntr_rfc_2819_get(
        &mut self,
        cmd: CounterCmd,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<Rfc2819Counters> {
        self.read_counters(cmd, br, port, |c| &mut c.rfc_2819)
    }

    pub fn port_cntr_rfc_3635_get(
        &mut self,
        cmd: CounterCmd,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<Rfc3635Counters> {
        self.read_counters(cmd, br, port, |c| &mut c.rfc_3635)
    }

    /// Accounts a frame seen on a port. Frames on a LAG member also count
    /// on the LAG.
    pub fn port_counters_account(
        &mut self,
        br: BridgeId,
        port: LogPort,
        frame: &FrameSample,
    ) -> OesResult<()> {
        let state = self.member_mut(br, port)?;
        let (mtu, lag) = (state.mtu, state.lag);
        state.counters.account(frame, mtu);

        if let Some(lag) = lag {
            let lag_state = self.ports.lookup_mut(&lag)?;
            lag_state.counters.account(frame, mtu);
        }
        Ok(())
    }

    /// Binds or unbinds a policer. A port has at most one policer.
    pub fn port_policer_bind_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        policer_id: u32,
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "port_policer_bind_set")?;
        let state = self.member_mut(br, port)?;
        if let Some(lag) = state.lag {
            return Err(OesError::param(format!(
                "port {} is a member of {}, bind the policer to the LAG",
                port, lag
            )));
        }

        match cmd {
            AccessCmd::Add => {
                if let Some(bound) = state.policer {
                    return Err(OesError::already_exists(format!(
                        "policer {} on port {}",
                        bound, port
                    )));
                }
                state.policer = Some(policer_id);
            }
            _ => {
                if state.policer != Some(policer_id) {
                    return Err(OesError::not_found(format!(
                        "policer {} on port {}",
                        policer_id, port
                    )));
                }
                state.policer = None;
            }
        }
        Ok(())
    }

    pub fn port_policer_get(&self, br: BridgeId, port: LogPort) -> OesResult<Option<u32>> {
        Ok(self.member(br, port)?.policer)
    }

    /// Creates, edits or destroys packet sampling on a physical port.
    /// `params` is ignored for DESTROY.
    pub fn port_sflow_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        params: Option<&SflowParams>,
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[AccessCmd::Create, AccessCmd::Edit, AccessCmd::Destroy],
            "port_sflow_set",
        )?;
        let state = self.physical_member_mut(br, port)?;

        if cmd == AccessCmd::Destroy {
            if state.sflow.take().is_none() {
                return Err(OesError::not_found(format!("sflow on port {}", port)));
            }
            return Ok(());
        }

        let params = *OesError::require(params, "params")?;
        if params.rate == 0 {
            return Err(OesError::param("sflow rate must be positive"));
        }
        OesError::check_range(
            "deviation",
            i64::from(params.deviation),
            0,
            i64::from(SFLOW_DEVIATION_MAX),
        )?;

        match (cmd, state.sflow.is_some()) {
            (AccessCmd::Create, true) => {
                Err(OesError::already_exists(format!("sflow on port {}", port)))
            }
            (AccessCmd::Edit, false) => Err(OesError::not_found(format!("sflow on port {}", port))),
            _ => {
                state.sflow = Some(params);
                Ok(())
            }
        }
    }

    pub fn port_sflow_get(&self, br: BridgeId, port: LogPort) -> OesResult<SflowParams> {
        self.member(br, port)?
            .sflow
            .ok_or_else(|| OesError::not_found(format!("sflow on port {}", port)))
    }

    pub fn port_loopback_filter_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        mode: LoopbackFilterMode,
    ) -> OesResult<()> {
        self.member_mut(br, port)?.loopback_filter = mode;
        Ok(())
    }

    pub fn port_loopback_filter_get(
        &self,
        br: BridgeId,
        port: LogPort,
    ) -> OesResult<LoopbackFilterMode> {
        Ok(self.member(br, port)?.loopback_filter)
    }

    /// Manages the set of ports whose traffic is not forwarded to `port`.
    ///
    /// CREATE replaces the set, ADD and DELETE edit it, DESTROY clears it.
    pub fn port_isolation_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        ports: &[LogPort],
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[
                AccessCmd::Create,
                AccessCmd::Add,
                AccessCmd::Delete,
                AccessCmd::Destroy,
            ],
            "port_isolation_set",
        )?;
        self.ensure_member(br, port)?;
        if cmd != AccessCmd::Destroy {
            for other in ports {
                self.ensure_member(br, *other)?;
                if *other == port {
                    return Err(OesError::param(format!(
                        "port {} cannot be isolated from itself",
                        port
                    )));
                }
            }
        }

        let state = self.ports.lookup_mut(&port)?;
        match cmd {
            AccessCmd::Create => state.isolation = ports.iter().copied().collect(),
            AccessCmd::Add => state.isolation.extend(ports.iter().copied()),
            AccessCmd::Delete => {
                if let Some(missing) = ports.iter().find(|p| !state.isolation.contains(*p)) {
                    return Err(OesError::not_found(format!(
                        "port {} in isolation list of {}",
                        missing, port
                    )));
                }
                for other in ports {
                    state.isolation.remove(other);
                }
            }
            _ => state.isolation.clear(),
        }
        Ok(())
    }

    pub fn port_isolation_get(&self, br: BridgeId, port: LogPort) -> OesResult<Vec<LogPort>> {
        Ok(self.member(br, port)?.isolation.iter().copied().collect())
    }
}
