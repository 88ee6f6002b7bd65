//! LAG operations.

use super::types::{Lag, LagHashParams, LagMember};
use crate::port::PortState;
use crate::switch::Switch;
use itertools::Itertools;
use log::{debug, info};
use oes_common::{flow_hash, AccessCmd, FlowFields, OesError, OesResult};
use oes_types::{BridgeId, LogPort};

impl Switch {
    /// Manages a LAG and its members.
    ///
    /// CREATE allocates a LAG port on `br` and returns it; `lag` is ignored
    /// and `ports` must be empty. DESTROY needs an empty group. ADD and
    /// DELETE change the members of `lag`.
    pub fn lag_port_group_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        lag: Option<LogPort>,
        ports: &[LogPort],
    ) -> OesResult<LogPort> {
        cmd.ensure_one_of(
            &[
                AccessCmd::Create,
                AccessCmd::Destroy,
                AccessCmd::Add,
                AccessCmd::Delete,
            ],
            "lag_port_group_set",
        )?;
        self.bridge(br)?;

        match cmd {
            AccessCmd::Create => {
                if !ports.is_empty() {
                    return Err(OesError::param("members are added after the LAG is created"));
                }
                self.lag_create(br)
            }
            AccessCmd::Destroy => {
                let lag = OesError::require(lag, "lag")?;
                self.lag_destroy(br, lag)?;
                Ok(lag)
            }
            AccessCmd::Add => {
                let lag = OesError::require(lag, "lag")?;
                self.lag_add_members(br, lag, ports)?;
                Ok(lag)
            }
            _ => {
                let lag = OesError::require(lag, "lag")?;
                self.lag_remove_members(br, lag, ports)?;
                Ok(lag)
            }
        }
    }

    fn lag_create(&mut self, br: BridgeId) -> OesResult<LogPort> {
        let in_use = self.ports.keys().filter(|p| p.is_lag()).count();
        if in_use >= self.config.max_lags {
            return Err(OesError::no_resources("lag"));
        }
        let id = (0..self.config.max_lags)
            .map(|i| LogPort::lag(i as u16))
            .find(|id| !self.ports.contains_key(id))
            .ok_or_else(|| OesError::no_resources("lag"))?;

        let mac = self
            .config
            .ports
            .first()
            .map(|p| p.mac)
            .unwrap_or_default();
        self.ports.insert_new(id, PortState::lag(id, br, mac))?;
        let bridge = self.bridge_mut(br)?;
        bridge.ports.insert(id);
        bridge.lags.lags.insert(id, Lag::default());
        info!("LagMgr: created {} on {}", id, br);
        Ok(id)
    }

    fn bridge_lag(&self, br: BridgeId, lag: LogPort) -> OesResult<&Lag> {
        self.bridge(br)?
            .lags()
            .lag(lag)
            .ok_or_else(|| OesError::not_found(format!("{} on {}", lag, br)))
    }

    fn lag_destroy(&mut self, br: BridgeId, lag: LogPort) -> OesResult<()> {
        if !self.bridge_lag(br, lag)?.is_empty() {
            return Err(OesError::in_use(format!("{} still has members", lag)));
        }
        if self.bridge(br)?.span().is_analyzer(lag) {
            return Err(OesError::in_use(format!("{} is a SPAN analyzer", lag)));
        }
        if let Some(rif) = self.router.rif_for_port(br, lag) {
            return Err(OesError::in_use(format!(
                "{} is bound to router interface {}",
                lag, rif
            )));
        }

        self.detach_port(br, lag)?;
        self.bridge_mut(br)?.lags.lags.remove(&lag);
        self.ports.remove(&lag)?;
        info!("LagMgr: destroyed {} on {}", lag, br);
        Ok(())
    }

    fn lag_add_members(&mut self, br: BridgeId, lag: LogPort, ports: &[LogPort]) -> OesResult<()> {
        let current = self.bridge_lag(br, lag)?.members.len();
        let ports: Vec<LogPort> = ports.iter().copied().unique().collect();
        for port in &ports {
            if port.is_lag() {
                return Err(OesError::param(format!("{} cannot join a LAG", port)));
            }
            let state = self.member(br, *port)?;
            match state.lag_membership() {
                Some(owner) if owner == lag => {
                    return Err(OesError::already_exists(format!("port {} in {}", port, lag)))
                }
                Some(owner) => {
                    return Err(OesError::in_use(format!("port {} belongs to {}", port, owner)))
                }
                None => {}
            }
            let span = self.bridge(br)?.span();
            if span.is_analyzer(*port) {
                return Err(OesError::in_use(format!("port {} is a SPAN analyzer", port)));
            }
            if span.is_mirrored(*port) {
                return Err(OesError::in_use(format!("port {} is a SPAN mirror source", port)));
            }
            if let Some(rif) = self.router.rif_for_port(br, *port) {
                return Err(OesError::in_use(format!(
                    "port {} is bound to router interface {}",
                    port, rif
                )));
            }
        }
        if current + ports.len() > self.config.max_lag_members {
            return Err(OesError::no_resources(format!("members of {}", lag)));
        }

        for port in &ports {
            // The port now forwards as part of the LAG.
            let bridge = self.bridge_mut(br)?;
            bridge.vlans.remove_port(*port);
            bridge.fdb.purge(|e| e.port == *port);
            bridge.fdb.remove_port_from_mc(*port);
            bridge.cos.ports.remove(port);
            bridge.stp.remove_port(*port);
            if let Some(group) = bridge.lags.lags.get_mut(&lag) {
                group.members.insert(*port, LagMember::default());
            }
            self.ports.lookup_mut(port)?.lag = Some(lag);
            info!("LagMgr: port {} joined {}", port, lag);
        }
        self.refresh_lag_oper(lag)
    }

    fn lag_remove_members(
        &mut self,
        br: BridgeId,
        lag: LogPort,
        ports: &[LogPort],
    ) -> OesResult<()> {
        let group = self.bridge_lag(br, lag)?;
        if let Some(missing) = ports.iter().find(|p| group.member(**p).is_none()) {
            return Err(OesError::not_found(format!("port {} in {}", missing, lag)));
        }

        for port in ports {
            if let Some(group) = self.bridge_mut(br)?.lags.lags.get_mut(&lag) {
                group.members.remove(port);
            }
            self.ports.lookup_mut(port)?.lag = None;
            info!("LagMgr: port {} left {}", port, lag);
        }
        self.refresh_lag_oper(lag)
    }

    pub fn lag_port_group_get(&self, br: BridgeId, lag: LogPort) -> OesResult<Vec<LogPort>> {
        Ok(self.bridge_lag(br, lag)?.members())
    }

    fn lag_member_mut(
        &mut self,
        br: BridgeId,
        lag: LogPort,
        port: LogPort,
    ) -> OesResult<&mut LagMember> {
        self.bridge_mut(br)?
            .lags
            .lags
            .get_mut(&lag)
            .ok_or_else(|| OesError::not_found(format!("{} on {}", lag, br)))?
            .members
            .get_mut(&port)
            .ok_or_else(|| OesError::not_found(format!("port {} in {}", port, lag)))
    }

    /// Enables or disables reception on a member.
    pub fn lag_port_collector_set(
        &mut self,
        br: BridgeId,
        lag: LogPort,
        port: LogPort,
        enable: bool,
    ) -> OesResult<()> {
        self.lag_member_mut(br, lag, port)?.collector = enable;
        debug!("LagMgr: collector of {} in {} {}", port, lag, enable);
        Ok(())
    }

    /// Enables or disables transmission on a member.
    pub fn lag_port_distributor_set(
        &mut self,
        br: BridgeId,
        lag: LogPort,
        port: LogPort,
        enable: bool,
    ) -> OesResult<()> {
        self.lag_member_mut(br, lag, port)?.distributor = enable;
        debug!("LagMgr: distributor of {} in {} {}", port, lag, enable);
        Ok(())
    }

    /// Returns the LAG `port` belongs to, if any.
    pub fn lag_port_member_get(&self, br: BridgeId, port: LogPort) -> OesResult<Option<LogPort>> {
        Ok(self.member(br, port)?.lag_membership())
    }

    /// Collector and distributor state of a member.
    pub fn lag_port_member_state_get(
        &self,
        br: BridgeId,
        lag: LogPort,
        port: LogPort,
    ) -> OesResult<LagMember> {
        self.bridge_lag(br, lag)?
            .member(port)
            .copied()
            .ok_or_else(|| OesError::not_found(format!("port {} in {}", port, lag)))
    }

    pub fn lag_hash_set(&mut self, br: BridgeId, params: LagHashParams) -> OesResult<()> {
        if params.fields.is_empty() {
            return Err(OesError::param("LAG hash needs at least one field"));
        }
        self.bridge_mut(br)?.lags.hash = params;
        Ok(())
    }

    pub fn lag_hash_get(&self, br: BridgeId) -> OesResult<LagHashParams> {
        Ok(self.bridge(br)?.lags().hash())
    }

    /// Picks the member that transmits `flow`. Only oper up members with
    /// the distributor enabled are candidates; `None` when there is none.
    pub fn lag_select_member(
        &self,
        br: BridgeId,
        lag: LogPort,
        flow: &FlowFields,
    ) -> OesResult<Option<LogPort>> {
        let group = self.bridge_lag(br, lag)?;
        let candidates: Vec<LogPort> = group
            .members
            .iter()
            .filter(|(_, m)| m.distributor)
            .map(|(p, _)| *p)
            .filter(|p| self.ports.get(p).is_some_and(|s| s.oper().is_up()))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let hash = self.bridge(br)?.lags().hash();
        let h = flow_hash(hash.hash_type, hash.seed, flow, hash.fields);
        Ok(Some(candidates[(h % candidates.len() as u64) as usize]))
    }
}
