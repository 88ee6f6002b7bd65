//! Router state: routers (VRFs), router interfaces and the ECMP hash.

use super::rif::RouterInterface;
use super::types::{
    EcmpHashParams, L3Interface, McRouteEntry, NeighEntry, RouterAttributes, UcRouteEntry,
};
use super::vrf::{Vrf, VrfLimits};
use crate::config::SwitchConfig;
use oes_common::{OesError, OesResult, SyncTable};
use oes_types::{BridgeId, LogPort};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Router {
    pub(crate) ecmp_hash: EcmpHashParams,
    pub(crate) vrfs: SyncTable<u32, Vrf>,
    /// Interfaces of every router, keyed by a switch-wide id.
    pub(crate) rifs: SyncTable<u32, RouterInterface>,
    pub(crate) limits: VrfLimits,
    pub(crate) max_routers: usize,
    pub(crate) max_rifs: usize,
    pub(crate) max_ecmp_paths: usize,
}

impl Router {
    pub fn new(config: &SwitchConfig) -> Self {
        Self {
            ecmp_hash: EcmpHashParams::default(),
            vrfs: SyncTable::with_capacity_limit("router", config.max_routers),
            rifs: SyncTable::with_capacity_limit(
                "router interface",
                config.max_router_interfaces,
            ),
            limits: VrfLimits {
                neighbors: config.neigh_table_size,
                uc_routes: config.uc_route_table_size,
                mc_routes: config.mc_route_table_size,
            },
            max_routers: config.max_routers,
            max_rifs: config.max_router_interfaces,
            max_ecmp_paths: config.max_ecmp_paths,
        }
    }

    pub fn vrf(&self, vrid: u32) -> OesResult<&Vrf> {
        self.vrfs.lookup(&vrid)
    }

    pub(crate) fn rif_for_interface(&self, ifc: &L3Interface) -> Option<u32> {
        self.rifs
            .values()
            .find(|r| r.interface() == ifc)
            .map(RouterInterface::id)
    }

    /// True if a router interface sits on the bridge.
    pub(crate) fn bridge_in_use(&self, br: BridgeId) -> bool {
        self.rifs.values().any(|r| r.interface().bridge() == br)
    }

    pub(crate) fn rif_for_port(&self, br: BridgeId, port: LogPort) -> Option<u32> {
        self.rif_for_interface(&L3Interface::Port { bridge: br, port })
    }

    pub fn snapshot(&self) -> Vec<RouterSnapshot> {
        self.vrfs
            .iter()
            .map(|(vrid, vrf)| RouterSnapshot {
                vrid: *vrid,
                attributes: vrf.attrs,
                interfaces: self
                    .rifs
                    .values()
                    .filter(|r| r.vrid() == *vrid)
                    .cloned()
                    .collect(),
                neighbors: vrf.neigh_entries().collect(),
                routes: vrf.route_entries().collect(),
                mc_routes: vrf.mc_entries().collect(),
            })
            .collect()
    }
}

/// Fails with `ENTRY_NOT_FOUND` unless `rif` is an interface of `vrid`.
pub(crate) fn rif_in_vrf(
    rifs: &SyncTable<u32, RouterInterface>,
    vrid: u32,
    rif: u32,
) -> OesResult<&RouterInterface> {
    rifs.get(&rif)
        .filter(|r| r.vrid() == vrid)
        .ok_or_else(|| OesError::not_found(format!("rif {} in router {}", rif, vrid)))
}

pub(crate) fn rif_in_vrf_mut(
    rifs: &mut SyncTable<u32, RouterInterface>,
    vrid: u32,
    rif: u32,
) -> OesResult<&mut RouterInterface> {
    rifs.get_mut(&rif)
        .filter(|r| r.vrid() == vrid)
        .ok_or_else(|| OesError::not_found(format!("rif {} in router {}", rif, vrid)))
}

/// Takes a reference on `rif` for an entry of router `vrid`.
pub(crate) fn acquire_rif(
    rifs: &mut SyncTable<u32, RouterInterface>,
    vrid: u32,
    rif: u32,
) -> OesResult<()> {
    rif_in_vrf(rifs, vrid, rif)?;
    rifs.increment_ref(&rif)?;
    Ok(())
}

pub(crate) fn release_rif(rifs: &mut SyncTable<u32, RouterInterface>, rif: u32) -> OesResult<()> {
    rifs.decrement_ref(&rif)?;
    Ok(())
}

/// Serializable view of one router.
#[derive(Debug, Clone, Serialize)]
pub struct RouterSnapshot {
    pub vrid: u32,
    pub attributes: RouterAttributes,
    pub interfaces: Vec<RouterInterface>,
    pub neighbors: Vec<NeighEntry>,
    pub routes: Vec<UcRouteEntry>,
    pub mc_routes: Vec<McRouteEntry>,
}
