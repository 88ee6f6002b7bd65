//! LAG types.

use oes_common::{HashAlgorithm, HashFieldSet};
use oes_types::LogPort;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collector and distributor state of a LAG member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagMember {
    pub collector: bool,
    pub distributor: bool,
}

impl Default for LagMember {
    fn default() -> Self {
        Self {
            collector: true,
            distributor: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lag {
    pub(crate) members: BTreeMap<LogPort, LagMember>,
}

impl Lag {
    pub fn members(&self) -> Vec<LogPort> {
        self.members.keys().copied().collect()
    }

    pub fn member(&self, port: LogPort) -> Option<&LagMember> {
        self.members.get(&port)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LagHashParams {
    pub hash_type: HashAlgorithm,
    pub fields: HashFieldSet,
    pub seed: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LagTable {
    pub(crate) lags: BTreeMap<LogPort, Lag>,
    pub(crate) hash: LagHashParams,
}

impl LagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lag(&self, lag: LogPort) -> Option<&Lag> {
        self.lags.get(&lag)
    }

    pub fn lag_ports(&self) -> impl Iterator<Item = &LogPort> {
        self.lags.keys()
    }

    pub fn hash(&self) -> LagHashParams {
        self.hash
    }
}
