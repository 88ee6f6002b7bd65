//! Bridge state.

use crate::config::SwitchConfig;
use crate::cos::CosTable;
use crate::fdb::FdbTable;
use crate::lag::LagTable;
use crate::span::SpanTable;
use crate::stp::StpTable;
use crate::vlan::VlanTable;
use oes_types::{BridgeId, LogPort};
use std::collections::BTreeSet;

/// A switch partition. Each bridge has its own L2 forwarding state.
#[derive(Debug, Clone)]
pub struct Bridge {
    pub(crate) id: BridgeId,
    /// Member ports, physical and LAG.
    pub(crate) ports: BTreeSet<LogPort>,
    pub(crate) vlans: VlanTable,
    pub(crate) fdb: FdbTable,
    pub(crate) lags: LagTable,
    pub(crate) cos: CosTable,
    pub(crate) span: SpanTable,
    pub(crate) stp: StpTable,
}

impl Bridge {
    pub(crate) fn new(id: BridgeId, config: &SwitchConfig) -> Self {
        Self {
            id,
            ports: BTreeSet::new(),
            vlans: VlanTable::new(),
            fdb: FdbTable::new(config.fdb_table_size, config.default_fdb_age_time),
            lags: LagTable::new(),
            cos: CosTable::new(),
            span: SpanTable::new(config.max_span_sessions),
            stp: StpTable::new(),
        }
    }

    pub fn id(&self) -> BridgeId {
        self.id
    }

    pub fn ports(&self) -> &BTreeSet<LogPort> {
        &self.ports
    }

    pub fn has_port(&self, port: LogPort) -> bool {
        self.ports.contains(&port)
    }

    pub fn vlans(&self) -> &VlanTable {
        &self.vlans
    }

    pub fn fdb(&self) -> &FdbTable {
        &self.fdb
    }

    pub fn lags(&self) -> &LagTable {
        &self.lags
    }

    pub fn cos(&self) -> &CosTable {
        &self.cos
    }

    pub fn span(&self) -> &SpanTable {
        &self.span
    }

    pub fn stp(&self) -> &StpTable {
        &self.stp
    }

    /// Removes every trace of `port` from the bridge's tables.
    pub(crate) fn forget_port(&mut self, port: LogPort) {
        self.vlans.remove_port(port);
        self.fdb.purge(|e| e.port == port);
        self.fdb.remove_port_from_mc(port);
        self.fdb.set_port_limit(port, None);
        self.fdb.set_port_learn_mode(port, Default::default());
        self.cos.ports.remove(&port);
        self.span.remove_port(port);
        self.stp.remove_port(port);
        self.ports.remove(&port);
    }
}
