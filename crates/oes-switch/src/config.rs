//! Switch configuration: capacity limits and the physical port inventory.

use crate::port::PortSpeed;
use oes_common::{OesError, OesResult};
use oes_types::{LogPort, MacAddress};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Valid FDB age time range, in seconds.
pub const FDB_AGE_TIME_MIN: u32 = 10;
pub const FDB_AGE_TIME_MAX: u32 = 1_000_000;

/// Highest MSTI id.
pub const MSTI_ID_MAX: u16 = 64;

/// One physical port of the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub id: LogPort,
    /// Highest speed the port hardware supports.
    pub speed: PortSpeed,
    pub mac: MacAddress,
}

/// Configuration of a [`Switch`](crate::Switch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub max_bridges: usize,
    /// Unicast FDB capacity of each bridge.
    pub fdb_table_size: usize,
    pub max_lags: usize,
    pub max_lag_members: usize,
    /// SPAN sessions per bridge.
    pub max_span_sessions: usize,
    pub max_routers: usize,
    pub max_router_interfaces: usize,
    pub neigh_table_size: usize,
    pub uc_route_table_size: usize,
    pub mc_route_table_size: usize,
    pub max_ecmp_paths: usize,
    /// MSTIs per bridge, excluding the CIST.
    pub max_msti: usize,
    /// Age time given to new bridges, in seconds.
    pub default_fdb_age_time: u32,
    /// Flush dynamic FDB entries of a port when it goes oper down.
    pub flush_fdb_on_port_down: bool,
    pub ports: Vec<PortConfig>,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            max_bridges: 8,
            fdb_table_size: 16384,
            max_lags: 64,
            max_lag_members: 16,
            max_span_sessions: 4,
            max_routers: 16,
            max_router_interfaces: 1024,
            neigh_table_size: 8192,
            uc_route_table_size: 16384,
            mc_route_table_size: 1024,
            max_ecmp_paths: 64,
            max_msti: 64,
            default_fdb_age_time: 300,
            flush_fdb_on_port_down: true,
            ports: Vec::new(),
        }
    }
}

impl SwitchConfig {
    /// Default limits with `count` 40G ports numbered from 1.
    pub fn with_ports(count: u32) -> Self {
        let ports = (1..=count)
            .map(|id| PortConfig {
                id: LogPort(id),
                speed: PortSpeed::Speed40GbCr4,
                mac: MacAddress::new([0x00, 0x02, 0xc9, 0x00, (id >> 8) as u8, id as u8]),
            })
            .collect();
        Self {
            ports,
            ..Default::default()
        }
    }

    /// Checks the configuration for internal consistency.
    pub fn validate(&self) -> OesResult<()> {
        OesError::check_range(
            "default_fdb_age_time",
            i64::from(self.default_fdb_age_time),
            i64::from(FDB_AGE_TIME_MIN),
            i64::from(FDB_AGE_TIME_MAX),
        )?;
        OesError::check_range("max_msti", self.max_msti as i64, 0, i64::from(MSTI_ID_MAX))?;
        OesError::check_range("max_lags", self.max_lags as i64, 0, 0xffff)?;

        if self.max_bridges == 0 {
            return Err(OesError::param("max_bridges must be at least 1"));
        }
        if self.max_ecmp_paths == 0 {
            return Err(OesError::param("max_ecmp_paths must be at least 1"));
        }

        let mut seen = BTreeSet::new();
        for port in &self.ports {
            if port.id.is_lag() {
                return Err(OesError::param(format!(
                    "port id {:#x} collides with the LAG id space",
                    port.id.as_u32()
                )));
            }
            if port.speed == PortSpeed::NotAvailable {
                return Err(OesError::param(format!("port {} has no speed", port.id)));
            }
            if !port.mac.is_valid_station() {
                return Err(OesError::param(format!(
                    "port {} MAC {} is not a unicast address",
                    port.id, port.mac
                )));
            }
            if !seen.insert(port.id) {
                return Err(OesError::param(format!("duplicate port {}", port.id)));
            }
        }
        Ok(())
    }
}
