//! Per-bridge FDB table.

use super::types::{
    FdbEntryType, FdbKey, FdbMcEntry, FdbRecord, FdbStats, FdbUcEntry, LearnMode, LearnOutcome,
};
use log::{debug, info};
use oes_common::{GetCmd, OesError, OesResult, SyncTable};
use oes_types::{LogPort, MacAddress, VlanId};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FdbTable {
    uc: SyncTable<FdbKey, FdbRecord>,
    mc: SyncTable<FdbKey, BTreeSet<LogPort>>,
    age_time: u32,
    learn_mode: LearnMode,
    vlan_learn_modes: BTreeMap<VlanId, LearnMode>,
    port_learn_modes: BTreeMap<LogPort, LearnMode>,
    port_limits: BTreeMap<LogPort, u32>,
    vlan_limits: BTreeMap<VlanId, u32>,
    dynamic_by_port: BTreeMap<LogPort, u32>,
    dynamic_by_vlan: BTreeMap<VlanId, u32>,
    stats: FdbStats,
}

fn bump<K: Ord + Copy>(counts: &mut BTreeMap<K, u32>, key: K) {
    *counts.entry(key).or_default() += 1;
}

fn drop_one<K: Ord + Copy>(counts: &mut BTreeMap<K, u32>, key: K) {
    if let Some(n) = counts.get_mut(&key) {
        *n = n.saturating_sub(1);
        if *n == 0 {
            counts.remove(&key);
        }
    }
}

impl FdbTable {
    pub fn new(capacity: usize, age_time: u32) -> Self {
        Self {
            uc: SyncTable::with_capacity_limit("fdb uc", capacity),
            mc: SyncTable::new("fdb mc"),
            age_time,
            learn_mode: LearnMode::Auto,
            vlan_learn_modes: BTreeMap::new(),
            port_learn_modes: BTreeMap::new(),
            port_limits: BTreeMap::new(),
            vlan_limits: BTreeMap::new(),
            dynamic_by_port: BTreeMap::new(),
            dynamic_by_vlan: BTreeMap::new(),
            stats: FdbStats::default(),
        }
    }

    pub fn stats(&self) -> &FdbStats {
        &self.stats
    }

    pub fn age_time(&self) -> u32 {
        self.age_time
    }

    pub(crate) fn set_age_time(&mut self, age_time: u32) {
        self.age_time = age_time;
    }

    // ---- learn modes and limits ----

    pub fn learn_mode(&self) -> LearnMode {
        self.learn_mode
    }

    pub(crate) fn set_learn_mode(&mut self, mode: LearnMode) {
        self.learn_mode = mode;
    }

    pub fn vlan_learn_mode(&self, vid: VlanId) -> LearnMode {
        self.vlan_learn_modes.get(&vid).copied().unwrap_or_default()
    }

    pub(crate) fn set_vlan_learn_mode(&mut self, vid: VlanId, mode: LearnMode) {
        if mode == LearnMode::Auto {
            self.vlan_learn_modes.remove(&vid);
        } else {
            self.vlan_learn_modes.insert(vid, mode);
        }
    }

    pub fn port_learn_mode(&self, port: LogPort) -> LearnMode {
        self.port_learn_modes.get(&port).copied().unwrap_or_default()
    }

    pub(crate) fn set_port_learn_mode(&mut self, port: LogPort, mode: LearnMode) {
        if mode == LearnMode::Auto {
            self.port_learn_modes.remove(&port);
        } else {
            self.port_learn_modes.insert(port, mode);
        }
    }

    /// The most restrictive of the bridge, VLAN and port modes.
    pub fn effective_learn_mode(&self, port: LogPort, vid: VlanId) -> LearnMode {
        self.learn_mode
            .max(self.vlan_learn_mode(vid))
            .max(self.port_learn_mode(port))
    }

    pub fn port_limit(&self, port: LogPort) -> Option<u32> {
        self.port_limits.get(&port).copied()
    }

    pub(crate) fn set_port_limit(&mut self, port: LogPort, limit: Option<u32>) {
        match limit {
            Some(limit) => self.port_limits.insert(port, limit),
            None => self.port_limits.remove(&port),
        };
    }

    pub fn vlan_limit(&self, vid: VlanId) -> Option<u32> {
        self.vlan_limits.get(&vid).copied()
    }

    pub(crate) fn set_vlan_limit(&mut self, vid: VlanId, limit: Option<u32>) {
        match limit {
            Some(limit) => self.vlan_limits.insert(vid, limit),
            None => self.vlan_limits.remove(&vid),
        };
    }

    pub fn dynamic_count_port(&self, port: LogPort) -> u32 {
        self.dynamic_by_port.get(&port).copied().unwrap_or(0)
    }

    pub fn dynamic_count_vlan(&self, vid: VlanId) -> u32 {
        self.dynamic_by_vlan.get(&vid).copied().unwrap_or(0)
    }

    fn port_has_room(&self, port: LogPort) -> bool {
        self.port_limit(port)
            .map_or(true, |limit| self.dynamic_count_port(port) < limit)
    }

    fn vlan_has_room(&self, vid: VlanId) -> bool {
        self.vlan_limit(vid)
            .map_or(true, |limit| self.dynamic_count_vlan(vid) < limit)
    }

    // ---- unicast entries ----

    pub fn uc_count(&self) -> usize {
        self.uc.len()
    }

    pub fn lookup_uc(&self, vid: VlanId, mac: MacAddress) -> Option<FdbUcEntry> {
        let key = FdbKey::new(vid, mac);
        self.uc.get(&key).map(|r| r.to_entry(&key))
    }

    pub fn uc_entries(&self) -> impl Iterator<Item = FdbUcEntry> + '_ {
        self.uc.iter().map(|(k, r)| r.to_entry(k))
    }

    fn account_insert(&mut self, key: &FdbKey, record: &FdbRecord) {
        if record.is_dynamic() {
            bump(&mut self.dynamic_by_port, record.port);
            bump(&mut self.dynamic_by_vlan, key.vid);
        }
    }

    fn account_remove(&mut self, key: &FdbKey, record: &FdbRecord) {
        if record.is_dynamic() {
            drop_one(&mut self.dynamic_by_port, record.port);
            drop_one(&mut self.dynamic_by_vlan, key.vid);
        }
    }

    fn insert_record(&mut self, key: FdbKey, record: FdbRecord) -> OesResult<Option<FdbRecord>> {
        let old = self.uc.upsert(key, record)?;
        if let Some(old) = &old {
            self.account_remove(&key, old);
        }
        self.account_insert(&key, &record);
        Ok(old)
    }

    /// Adds or replaces a unicast entry.
    pub(crate) fn add_uc(&mut self, entry: &FdbUcEntry, now: Instant) -> OesResult<()> {
        let record = FdbRecord {
            port: entry.port,
            entry_type: entry.entry_type,
            last_seen: now,
        };
        if self.insert_record(entry.key(), record)?.is_some() {
            debug!("FdbTable: replaced {}", entry.key());
        }
        Ok(())
    }

    pub(crate) fn remove_uc(&mut self, key: &FdbKey) -> OesResult<FdbUcEntry> {
        let record = self.uc.remove(key)?;
        self.account_remove(key, &record);
        Ok(record.to_entry(key))
    }

    /// Removes entries matching `pred`, static ones included.
    pub(crate) fn purge<F>(&mut self, mut pred: F) -> Vec<FdbUcEntry>
    where
        F: FnMut(&FdbUcEntry) -> bool,
    {
        let removed = self.uc.drain_where(|k, r| pred(&r.to_entry(k)));
        removed
            .into_iter()
            .map(|(key, record)| {
                self.account_remove(&key, &record);
                record.to_entry(&key)
            })
            .collect()
    }

    /// Removes dynamic entries matching `pred`.
    pub(crate) fn flush<F>(&mut self, mut pred: F) -> Vec<FdbUcEntry>
    where
        F: FnMut(&FdbUcEntry) -> bool,
    {
        let flushed = self.purge(|e| e.is_dynamic() && pred(e));
        self.stats.flushed += flushed.len() as u64;
        flushed
    }

    pub fn walk_uc(&self, cmd: GetCmd, key: Option<&FdbKey>, count: usize) -> OesResult<Vec<FdbUcEntry>> {
        Ok(self
            .uc
            .walk(cmd, key, count)?
            .into_iter()
            .map(|(k, r)| r.to_entry(&k))
            .collect())
    }

    /// Learns `key` on `port`.
    pub(crate) fn learn(&mut self, key: FdbKey, port: LogPort, now: Instant) -> OesResult<LearnOutcome> {
        let mode = self.effective_learn_mode(port, key.vid);
        if mode == LearnMode::DontLearn {
            return Ok(LearnOutcome::Disabled);
        }

        if let Some(record) = self.uc.get_mut(&key) {
            if !record.is_dynamic() {
                return Ok(LearnOutcome::StaticEntry);
            }
            if record.port == port {
                record.last_seen = now;
                return Ok(LearnOutcome::Refreshed);
            }
            if mode == LearnMode::Controlled {
                return Ok(LearnOutcome::Notified);
            }

            let from = record.port;
            if !self.port_has_room(port) {
                self.stats.learn_drops += 1;
                return Err(OesError::no_resources(format!(
                    "fdb limit of port {} reached",
                    port
                )));
            }
            self.insert_record(
                key,
                FdbRecord {
                    port,
                    entry_type: FdbEntryType::Dynamic,
                    last_seen: now,
                },
            )?;
            self.stats.moved += 1;
            info!("FdbTable: station {} moved from {} to {}", key, from, port);
            return Ok(LearnOutcome::Moved { from });
        }

        if mode == LearnMode::Controlled {
            return Ok(LearnOutcome::Notified);
        }

        if !self.port_has_room(port) || !self.vlan_has_room(key.vid) {
            self.stats.learn_drops += 1;
            return Err(OesError::no_resources(format!(
                "fdb limit reached learning {} on port {}",
                key, port
            )));
        }
        let record = FdbRecord {
            port,
            entry_type: FdbEntryType::Dynamic,
            last_seen: now,
        };
        if let Err(e) = self.insert_record(key, record) {
            self.stats.learn_drops += 1;
            return Err(e);
        }
        self.stats.learned += 1;
        debug!("FdbTable: learned {} on port {}", key, port);
        Ok(LearnOutcome::Installed)
    }

    /// Removes dynamic entries idle for at least the age time.
    pub(crate) fn age(&mut self, now: Instant) -> Vec<FdbUcEntry> {
        let max_idle = Duration::from_secs(u64::from(self.age_time));
        let aged: Vec<FdbKey> = self
            .uc
            .iter()
            .filter(|(_, r)| r.is_dynamic() && now.saturating_duration_since(r.last_seen) >= max_idle)
            .map(|(k, _)| *k)
            .collect();

        let mut removed = Vec::with_capacity(aged.len());
        for key in aged {
            if let Ok(entry) = self.remove_uc(&key) {
                removed.push(entry);
            }
        }
        self.stats.aged += removed.len() as u64;
        removed
    }

    // ---- multicast entries ----

    pub fn mc_count(&self) -> usize {
        self.mc.len()
    }

    pub fn lookup_mc(&self, vid: VlanId, mac: MacAddress) -> Option<&BTreeSet<LogPort>> {
        self.mc.get(&FdbKey::new(vid, mac))
    }

    pub(crate) fn add_mc_ports(&mut self, key: FdbKey, ports: &[LogPort]) -> OesResult<()> {
        match self.mc.get_mut(&key) {
            Some(group) => group.extend(ports.iter().copied()),
            None => self.mc.insert_new(key, ports.iter().copied().collect())?,
        }
        Ok(())
    }

    /// Removes ports from a group; the group goes away once empty.
    pub(crate) fn remove_mc_ports(&mut self, key: FdbKey, ports: &[LogPort]) -> OesResult<()> {
        let group = self.mc.lookup_mut(&key)?;
        if let Some(missing) = ports.iter().find(|p| !group.contains(*p)) {
            return Err(OesError::not_found(format!("port {} in mc group {}", missing, key)));
        }
        for port in ports {
            group.remove(port);
        }
        if group.is_empty() {
            self.mc.remove(&key)?;
        }
        Ok(())
    }

    pub fn mc_entry(&self, key: &FdbKey) -> OesResult<FdbMcEntry> {
        let ports = self.mc.lookup(key)?;
        Ok(FdbMcEntry {
            vid: key.vid,
            mac: key.mac,
            ports: ports.iter().copied().collect(),
        })
    }

    pub fn mc_entries(&self) -> impl Iterator<Item = FdbMcEntry> + '_ {
        self.mc.iter().map(|(k, ports)| FdbMcEntry {
            vid: k.vid,
            mac: k.mac,
            ports: ports.iter().copied().collect(),
        })
    }

    pub fn walk_mc(&self, cmd: GetCmd, key: Option<&FdbKey>, count: usize) -> OesResult<Vec<FdbMcEntry>> {
        Ok(self
            .mc
            .walk(cmd, key, count)?
            .into_iter()
            .map(|(k, ports)| FdbMcEntry {
                vid: k.vid,
                mac: k.mac,
                ports: ports.into_iter().collect(),
            })
            .collect())
    }

    /// Removes multicast groups matching `pred`; returns how many.
    pub(crate) fn flush_mc<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&FdbKey) -> bool,
    {
        self.mc.drain_where(|k, _| pred(k)).len()
    }

    /// Removes `port` from every multicast group.
    pub(crate) fn remove_port_from_mc(&mut self, port: LogPort) {
        for group in self.mc.values_mut() {
            group.remove(&port);
        }
        self.mc.drain_where(|_, group| group.is_empty());
    }
}
