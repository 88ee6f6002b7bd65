//! CoS types.

use oes_common::{OesError, OesResult};
use oes_types::LogPort;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NUM_PRIORITIES: usize = 8;
pub const NUM_TRAFFIC_CLASSES: usize = 8;
pub const NUM_DSCP: usize = 64;
pub const MAX_PORT_BUFFERS: usize = 9;

/// Which packet field assigns the switch priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Always the port default priority.
    #[default]
    Port,
    Pcp,
    Dscp,
    /// DSCP for IP packets, else PCP.
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtsArbitration {
    #[default]
    Dwrr,
    Sp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaperUnits {
    #[default]
    Mbps,
    Gbps,
}

/// ETS setting of one traffic class. A `max_bw_value` of 0 leaves the
/// class unshaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TcEtsConfig {
    pub tc: u8,
    /// Guaranteed share of the port bandwidth, in percent.
    pub bw_allocation: u8,
    pub max_bw_value: u32,
    pub max_bw_units: ShaperUnits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortEtsConfig {
    pub arbitration: EtsArbitration,
    pub max_bw_value: u32,
    pub max_bw_units: ShaperUnits,
}

/// One ingress buffer of a port. Thresholds are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortBuffer {
    pub size: u32,
    pub xon: u32,
    pub xoff: u32,
    /// Priorities mapped to this buffer, one bit per priority.
    pub prio_mask: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortBuffConfig {
    /// Pause time advertised in XOFF frames.
    pub xoff_timer: u32,
    /// Interval at which XOFF is re-sent while congested.
    pub xoff_refresh: u32,
    pub buffers: Vec<PortBuffer>,
}

impl PortBuffConfig {
    pub fn validate(&self) -> OesResult<()> {
        if self.buffers.len() > MAX_PORT_BUFFERS {
            return Err(OesError::ParamExceedsRange {
                param: "buffer count",
                value: self.buffers.len() as i64,
                min: 0,
                max: MAX_PORT_BUFFERS as i64,
            });
        }
        if self.xoff_refresh > self.xoff_timer {
            return Err(OesError::param(format!(
                "xoff refresh {} exceeds xoff timer {}",
                self.xoff_refresh, self.xoff_timer
            )));
        }
        let mut mapped = 0u8;
        for (i, buf) in self.buffers.iter().enumerate() {
            if buf.xon > buf.xoff || buf.xoff > buf.size {
                return Err(OesError::param(format!(
                    "buffer {}: need xon {} <= xoff {} <= size {}",
                    i, buf.xon, buf.xoff, buf.size
                )));
            }
            if mapped & buf.prio_mask != 0 {
                return Err(OesError::param(format!(
                    "buffer {}: priority mapped to more than one buffer",
                    i
                )));
            }
            mapped |= buf.prio_mask;
        }
        Ok(())
    }
}

/// Per-port CoS settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosPortConfig {
    pub default_prio: u8,
    pub trust: TrustLevel,
    /// Regenerated priority, indexed by the received priority.
    pub prio_regen: [u8; NUM_PRIORITIES],
    /// Traffic class, indexed by priority.
    pub tc_map: [u8; NUM_PRIORITIES],
    pub tc_ets: [TcEtsConfig; NUM_TRAFFIC_CLASSES],
    pub port_ets: PortEtsConfig,
    pub buffers: PortBuffConfig,
}

impl Default for CosPortConfig {
    fn default() -> Self {
        let mut tc_ets = [TcEtsConfig::default(); NUM_TRAFFIC_CLASSES];
        for (tc, ets) in tc_ets.iter_mut().enumerate() {
            ets.tc = tc as u8;
        }
        Self {
            default_prio: 0,
            trust: TrustLevel::Port,
            prio_regen: [0, 1, 2, 3, 4, 5, 6, 7],
            tc_map: [0, 1, 2, 3, 4, 5, 6, 7],
            tc_ets,
            port_ets: PortEtsConfig::default(),
            buffers: PortBuffConfig::default(),
        }
    }
}

/// Priority and traffic class assigned to a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosDecision {
    pub priority: u8,
    pub tc: u8,
}

#[derive(Debug, Clone)]
pub struct CosTable {
    pub(crate) ports: BTreeMap<LogPort, CosPortConfig>,
    /// Priority, indexed by DSCP.
    pub(crate) dscp_to_prio: [u8; NUM_DSCP],
}

impl Default for CosTable {
    fn default() -> Self {
        let mut dscp_to_prio = [0u8; NUM_DSCP];
        for (dscp, prio) in dscp_to_prio.iter_mut().enumerate() {
            *prio = (dscp >> 3) as u8;
        }
        Self {
            ports: BTreeMap::new(),
            dscp_to_prio,
        }
    }
}

impl CosTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port settings; ports never configured report the defaults.
    pub fn port(&self, port: LogPort) -> CosPortConfig {
        self.ports.get(&port).cloned().unwrap_or_default()
    }

    pub(crate) fn port_mut(&mut self, port: LogPort) -> &mut CosPortConfig {
        self.ports.entry(port).or_default()
    }

    pub fn classify(&self, port: LogPort, pcp: Option<u8>, dscp: Option<u8>) -> CosDecision {
        let config = self.ports.get(&port);
        let default_prio = config.map_or(0, |c| c.default_prio);
        let trust = config.map_or(TrustLevel::Port, |c| c.trust);

        let from_dscp = dscp.map(|d| self.dscp_to_prio[usize::from(d) % NUM_DSCP]);
        let received = match trust {
            TrustLevel::Port => default_prio,
            TrustLevel::Pcp => pcp.unwrap_or(default_prio),
            TrustLevel::Dscp => from_dscp.unwrap_or(default_prio),
            TrustLevel::Both => from_dscp.or(pcp).unwrap_or(default_prio),
        };

        let idx = usize::from(received) % NUM_PRIORITIES;
        let priority = config.map_or(received, |c| c.prio_regen[idx]);
        let tc = config.map_or(priority, |c| c.tc_map[usize::from(priority) % NUM_PRIORITIES]);
        CosDecision { priority, tc }
    }
}
