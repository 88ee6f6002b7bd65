//! FDB operations.

use super::types::{FdbKey, FdbMcEntry, FdbUcEntry, LearnMode, LearnOutcome};
use crate::config::{FDB_AGE_TIME_MAX, FDB_AGE_TIME_MIN};
use crate::event::Event;
use crate::switch::Switch;
use log::{debug, info, warn};
use oes_common::{AccessCmd, BatchFailure, GetCmd, OesError, OesResult};
use oes_types::{BridgeId, LogPort, MacAddress, VlanId};
use std::time::Instant;

impl Switch {
    pub fn fdb_age_time_set(&mut self, br: BridgeId, age_time: u32) -> OesResult<()> {
        OesError::check_range(
            "age_time",
            i64::from(age_time),
            i64::from(FDB_AGE_TIME_MIN),
            i64::from(FDB_AGE_TIME_MAX),
        )?;
        self.bridge_mut(br)?.fdb.set_age_time(age_time);
        info!("FdbTable: age time of {} set to {}s", br, age_time);
        Ok(())
    }

    pub fn fdb_age_time_get(&self, br: BridgeId) -> OesResult<u32> {
        Ok(self.bridge(br)?.fdb().age_time())
    }

    fn check_uc_entry(&self, br: BridgeId, entry: &FdbUcEntry) -> OesResult<()> {
        if !entry.mac.is_valid_station() {
            return Err(OesError::param(format!(
                "{} is not a unicast station address",
                entry.mac
            )));
        }
        let state = self.member(br, entry.port)?;
        if let Some(lag) = state.lag_membership() {
            return Err(OesError::param(format!(
                "port {} is a member of {}, use the LAG port",
                entry.port, lag
            )));
        }
        Ok(())
    }

    /// Adds or deletes unicast entries.
    ///
    /// Each entry is applied on its own; on failure the entries that
    /// succeeded stay applied and the failed ones are returned with the
    /// first error.
    pub fn fdb_uc_mac_addr_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        entries: &[FdbUcEntry],
    ) -> Result<(), BatchFailure<FdbUcEntry>> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "fdb_uc_mac_addr_set")?;
        self.bridge(br)?;

        let now = Instant::now();
        let mut first_error = None;
        let mut failed = Vec::new();
        for entry in entries {
            let result = match cmd {
                AccessCmd::Add => self
                    .check_uc_entry(br, entry)
                    .and_then(|()| self.bridge_mut(br)?.fdb.add_uc(entry, now)),
                _ => self
                    .bridge_mut(br)
                    .and_then(|bridge| bridge.fdb.remove_uc(&entry.key()))
                    .map(|_| ()),
            };
            if let Err(e) = result {
                debug!("FdbTable: {} {} on {} failed: {}", cmd, entry.key(), br, e);
                first_error.get_or_insert(e);
                failed.push(*entry);
            }
        }

        match first_error {
            None => Ok(()),
            Some(error) => {
                warn!(
                    "FdbTable: {} of {} entries on {} failed",
                    failed.len(),
                    entries.len(),
                    br
                );
                Err(BatchFailure { error, failed })
            }
        }
    }

    pub fn fdb_uc_mac_addr_get(
        &self,
        cmd: GetCmd,
        br: BridgeId,
        key: Option<&FdbKey>,
        count: usize,
    ) -> OesResult<Vec<FdbUcEntry>> {
        self.bridge(br)?.fdb().walk_uc(cmd, key, count)
    }

    /// Number of unicast entries, static and dynamic.
    pub fn fdb_uc_count(&self, br: BridgeId) -> OesResult<usize> {
        Ok(self.bridge(br)?.fdb().uc_count())
    }

    fn check_limit(&self, limit: u32) -> OesResult<()> {
        OesError::check_range(
            "limit",
            i64::from(limit),
            0,
            self.config.fdb_table_size as i64,
        )
    }

    /// ADD sets the number of dynamic entries a port may learn, DELETE
    /// removes the limit and ignores `limit`.
    pub fn fdb_uc_limit_port_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        limit: u32,
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "fdb_uc_limit_port_set")?;
        self.member(br, port)?;
        let limit = match cmd {
            AccessCmd::Add => {
                self.check_limit(limit)?;
                Some(limit)
            }
            _ => None,
        };
        self.bridge_mut(br)?.fdb.set_port_limit(port, limit);
        Ok(())
    }

    /// The port's learning limit; the table size when unlimited.
    pub fn fdb_uc_limit_port_get(&self, br: BridgeId, port: LogPort) -> OesResult<u32> {
        self.member(br, port)?;
        let fdb = self.bridge(br)?.fdb();
        Ok(fdb
            .port_limit(port)
            .unwrap_or(self.config.fdb_table_size as u32))
    }

    pub fn fdb_uc_limit_vlan_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        vid: VlanId,
        limit: u32,
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "fdb_uc_limit_vlan_set")?;
        let limit = match cmd {
            AccessCmd::Add => {
                self.check_limit(limit)?;
                Some(limit)
            }
            _ => None,
        };
        self.bridge_mut(br)?.fdb.set_vlan_limit(vid, limit);
        Ok(())
    }

    pub fn fdb_uc_limit_vid_get(&self, br: BridgeId, vid: VlanId) -> OesResult<u32> {
        Ok(self
            .bridge(br)?
            .fdb()
            .vlan_limit(vid)
            .unwrap_or(self.config.fdb_table_size as u32))
    }

    /// ADD merges `ports` into the group, creating it; DELETE removes them
    /// and the group once it is empty.
    pub fn fdb_mc_mac_addr_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        vid: VlanId,
        mac: MacAddress,
        ports: &[LogPort],
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "fdb_mc_mac_addr_set")?;
        if !mac.is_multicast() || mac.is_broadcast() {
            return Err(OesError::param(format!("{} is not a multicast group", mac)));
        }
        if ports.is_empty() {
            return Err(OesError::param("multicast entry needs at least one port"));
        }

        let key = FdbKey::new(vid, mac);
        match cmd {
            AccessCmd::Add => {
                for port in ports {
                    self.member(br, *port)?;
                }
                self.bridge_mut(br)?.fdb.add_mc_ports(key, ports)
            }
            _ => self.bridge_mut(br)?.fdb.remove_mc_ports(key, ports),
        }
    }

    pub fn fdb_mc_mac_addr_get(
        &self,
        br: BridgeId,
        vid: VlanId,
        mac: MacAddress,
    ) -> OesResult<Vec<LogPort>> {
        Ok(self
            .bridge(br)?
            .fdb()
            .mc_entry(&FdbKey::new(vid, mac))?
            .ports)
    }

    pub fn fdb_mc_mac_addr_walk(
        &self,
        cmd: GetCmd,
        br: BridgeId,
        key: Option<&FdbKey>,
        count: usize,
    ) -> OesResult<Vec<FdbMcEntry>> {
        self.bridge(br)?.fdb().walk_mc(cmd, key, count)
    }

    /// Removes every dynamic unicast entry of the bridge.
    pub fn fdb_uc_flush_set(&mut self, br: BridgeId) -> OesResult<usize> {
        let flushed = self.bridge_mut(br)?.fdb.flush(|_| true).len();
        info!("FdbTable: flushed {} entries on {}", flushed, br);
        Ok(flushed)
    }

    pub fn fdb_uc_flush_port_set(&mut self, br: BridgeId, port: LogPort) -> OesResult<usize> {
        self.member(br, port)?;
        Ok(self.bridge_mut(br)?.fdb.flush(|e| e.port == port).len())
    }

    pub fn fdb_uc_flush_vid_set(&mut self, br: BridgeId, vid: VlanId) -> OesResult<usize> {
        Ok(self.bridge_mut(br)?.fdb.flush(|e| e.vid == vid).len())
    }

    pub fn fdb_uc_flush_port_vid_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        vid: VlanId,
    ) -> OesResult<usize> {
        self.member(br, port)?;
        Ok(self
            .bridge_mut(br)?
            .fdb
            .flush(|e| e.port == port && e.vid == vid)
            .len())
    }

    pub fn fdb_mc_flush_all_set(&mut self, br: BridgeId) -> OesResult<usize> {
        Ok(self.bridge_mut(br)?.fdb.flush_mc(|_| true))
    }

    pub fn fdb_mc_flush_vid_set(&mut self, br: BridgeId, vid: VlanId) -> OesResult<usize> {
        Ok(self.bridge_mut(br)?.fdb.flush_mc(|k| k.vid == vid))
    }

    pub fn fdb_learn_mode_set(&mut self, br: BridgeId, mode: LearnMode) -> OesResult<()> {
        self.bridge_mut(br)?.fdb.set_learn_mode(mode);
        info!("FdbTable: learn mode of {} set to {:?}", br, mode);
        Ok(())
    }

    pub fn fdb_learn_mode_get(&self, br: BridgeId) -> OesResult<LearnMode> {
        Ok(self.bridge(br)?.fdb().learn_mode())
    }

    pub fn fdb_vid_learn_mode_set(
        &mut self,
        br: BridgeId,
        vid: VlanId,
        mode: LearnMode,
    ) -> OesResult<()> {
        self.bridge_mut(br)?.fdb.set_vlan_learn_mode(vid, mode);
        Ok(())
    }

    pub fn fdb_vid_learn_mode_get(&self, br: BridgeId, vid: VlanId) -> OesResult<LearnMode> {
        Ok(self.bridge(br)?.fdb().vlan_learn_mode(vid))
    }

    pub fn fdb_port_learn_mode_set(
        &mut self,
        br: BridgeId,
        port: LogPort,
        mode: LearnMode,
    ) -> OesResult<()> {
        self.member(br, port)?;
        self.bridge_mut(br)?.fdb.set_port_learn_mode(port, mode);
        Ok(())
    }

    pub fn fdb_port_learn_mode_get(&self, br: BridgeId, port: LogPort) -> OesResult<LearnMode> {
        self.member(br, port)?;
        Ok(self.bridge(br)?.fdb().port_learn_mode(port))
    }

    /// Processes a source MAC seen on `port` in `vid`.
    ///
    /// Addresses seen on a LAG member are learned on the LAG. Installed,
    /// moved and controlled-mode addresses are reported as `FdbLearned`.
    pub fn fdb_learn(
        &mut self,
        br: BridgeId,
        port: LogPort,
        vid: VlanId,
        mac: MacAddress,
        now: Instant,
    ) -> OesResult<LearnOutcome> {
        if !mac.is_valid_station() {
            return Err(OesError::param(format!(
                "{} is not a unicast source address",
                mac
            )));
        }
        self.member(br, port)?;
        if !self.collects(br, port) {
            return Ok(LearnOutcome::Blocked);
        }
        let port = self.logical_port(port);

        let bridge = self.bridge_mut(br)?;
        if !bridge.stp().port_state_for_vlan(port, vid).learns() {
            return Ok(LearnOutcome::Blocked);
        }
        let outcome = bridge.fdb.learn(FdbKey::new(vid, mac), port, now)?;

        if outcome.is_reported() {
            self.publish(
                br,
                Event::FdbLearned {
                    vid,
                    mac,
                    port,
                    installed: outcome != LearnOutcome::Notified,
                },
            );
        }
        Ok(outcome)
    }

    /// Runs an aging pass over every bridge and reports removed entries as
    /// `FdbAged`. Returns the number of entries removed.
    pub fn fdb_age(&mut self, now: Instant) -> usize {
        let mut aged = Vec::new();
        for (id, bridge) in self.bridges.iter_mut() {
            for entry in bridge.fdb.age(now) {
                aged.push((*id, entry));
            }
        }
        if !aged.is_empty() {
            debug!("FdbTable: aged out {} entries", aged.len());
        }

        let total = aged.len();
        for (br, entry) in aged {
            self.publish(
                br,
                Event::FdbAged {
                    vid: entry.vid,
                    mac: entry.mac,
                    port: entry.port,
                },
            );
        }
        total
    }
}
