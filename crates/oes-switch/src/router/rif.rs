//! Router interfaces.

use super::table::{rif_in_vrf, rif_in_vrf_mut};
use super::types::{L3Interface, RifAttributes, RifCounters, RifState};
use crate::switch::Switch;
use log::{debug, info};
use oes_common::{AccessCmd, CounterCmd, HasRefCount, OesError, OesResult};
use oes_types::{IpAddress, MacAddress};
use serde::Serialize;
use std::collections::BTreeSet;

/// An L3 interface on a VLAN or a port of a bridge.
///
/// Neighbors, direct routes and multicast routes reference the interface;
/// it cannot be deleted while referenced.
#[derive(Debug, Clone, Serialize)]
pub struct RouterInterface {
    id: u32,
    vrid: u32,
    interface: L3Interface,
    attrs: RifAttributes,
    state: RifState,
    /// Additional router MACs.
    macs: BTreeSet<MacAddress>,
    #[serde(skip)]
    counters: Option<RifCounters>,
    #[serde(skip)]
    refs: u32,
}

impl RouterInterface {
    pub(crate) fn new(id: u32, vrid: u32, interface: L3Interface, attrs: RifAttributes) -> Self {
        Self {
            id,
            vrid,
            interface,
            attrs,
            state: RifState::default(),
            macs: BTreeSet::new(),
            counters: None,
            refs: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn vrid(&self) -> u32 {
        self.vrid
    }

    pub fn interface(&self) -> &L3Interface {
        &self.interface
    }

    pub fn attributes(&self) -> &RifAttributes {
        &self.attrs
    }

    pub fn state(&self) -> RifState {
        self.state
    }

    /// True if frames to `mac` are routed by this interface.
    pub fn is_router_mac(&self, mac: &MacAddress) -> bool {
        self.attrs.mac == *mac || self.macs.contains(mac)
    }

    pub(crate) fn is_up_for(&self, addr: &IpAddress) -> bool {
        self.state.is_up_for(addr)
    }

    pub(crate) fn count_ingress(&mut self) {
        if let Some(counters) = self.counters.as_mut() {
            counters.ingress_packets += 1;
        }
    }

    pub(crate) fn count_egress(&mut self) {
        if let Some(counters) = self.counters.as_mut() {
            counters.egress_packets += 1;
        }
    }

    pub(crate) fn count_discard(&mut self) {
        if let Some(counters) = self.counters.as_mut() {
            counters.egress_discards += 1;
        }
    }
}

impl HasRefCount for RouterInterface {
    fn increment_ref(&mut self) -> u32 {
        self.refs += 1;
        self.refs
    }

    fn decrement_ref(&mut self) -> Option<u32> {
        self.refs = self.refs.checked_sub(1)?;
        Some(self.refs)
    }

    fn ref_count(&self) -> u32 {
        self.refs
    }
}

impl Switch {
    /// Manages router interfaces of router `vrid`.
    ///
    /// ADD creates an interface on `ifc` and returns its id; an L2 interface
    /// carries at most one router interface. EDIT replaces the attributes of
    /// `rif`. DELETE removes `rif` unless it is referenced. DELETE_ALL
    /// removes every interface of the router and returns how many were
    /// removed; it fails without removing anything if one is referenced.
    pub fn router_interface_set(
        &mut self,
        cmd: AccessCmd,
        vrid: u32,
        ifc: Option<&L3Interface>,
        attrs: Option<&RifAttributes>,
        rif: Option<u32>,
    ) -> OesResult<u32> {
        cmd.ensure_one_of(
            &[
                AccessCmd::Add,
                AccessCmd::Edit,
                AccessCmd::Delete,
                AccessCmd::DeleteAll,
            ],
            "router_interface_set",
        )?;
        self.router.vrfs.lookup(&vrid)?;

        match cmd {
            AccessCmd::Add => {
                let ifc = OesError::require(ifc, "ifc")?;
                let attrs = OesError::require(attrs, "attrs")?;
                attrs.validate()?;
                match *ifc {
                    L3Interface::Vlan { bridge, .. } => {
                        self.bridge(bridge)?;
                    }
                    L3Interface::Port { bridge, port } => self.ensure_configurable(bridge, port)?,
                }

                let router = &mut self.router;
                if let Some(existing) = router.rif_for_interface(ifc) {
                    return Err(OesError::already_exists(format!(
                        "router interface {} on {}",
                        existing, ifc
                    )));
                }
                let id = (0u32..)
                    .take(router.max_rifs)
                    .find(|id| !router.rifs.contains_key(id))
                    .ok_or_else(|| OesError::no_resources("router interface"))?;
                router
                    .rifs
                    .insert_new(id, RouterInterface::new(id, vrid, *ifc, *attrs))?;
                info!(
                    "RouterMgr: created rif {} on {} in router {}",
                    id, ifc, vrid
                );
                Ok(id)
            }
            AccessCmd::Edit => {
                let id = OesError::require(rif, "rif")?;
                let attrs = OesError::require(attrs, "attrs")?;
                attrs.validate()?;
                let entry = rif_in_vrf_mut(&mut self.router.rifs, vrid, id)?;
                if ifc.is_some_and(|ifc| *ifc != entry.interface) {
                    return Err(OesError::param(format!(
                        "rif {} stays on {}, interface cannot change",
                        id, entry.interface
                    )));
                }
                entry.attrs = *attrs;
                debug!("RouterMgr: updated rif {} attributes {:?}", id, attrs);
                Ok(id)
            }
            AccessCmd::Delete => {
                let id = OesError::require(rif, "rif")?;
                let rifs = &mut self.router.rifs;
                rif_in_vrf(rifs, vrid, id)?;
                let removed = rifs.remove_unreferenced(&id)?;
                info!(
                    "RouterMgr: deleted rif {} on {}",
                    id,
                    removed.interface()
                );
                Ok(id)
            }
            _ => {
                let rifs = &mut self.router.rifs;
                let ids: Vec<u32> = rifs
                    .values()
                    .filter(|r| r.vrid == vrid)
                    .map(RouterInterface::id)
                    .collect();
                if let Some(busy) = ids.iter().find(|id| rifs.ref_count(id).unwrap_or(0) > 0) {
                    return Err(OesError::in_use(format!(
                        "rif {} is referenced",
                        busy
                    )));
                }
                for id in &ids {
                    rifs.remove(id)?;
                }
                info!(
                    "RouterMgr: deleted {} rifs of router {}",
                    ids.len(),
                    vrid
                );
                Ok(ids.len() as u32)
            }
        }
    }

    pub fn router_interface_get(&self, vrid: u32, rif: u32) -> OesResult<&RouterInterface> {
        self.router.vrfs.lookup(&vrid)?;
        rif_in_vrf(&self.router.rifs, vrid, rif)
    }

    pub fn router_interface_state_set(
        &mut self,
        vrid: u32,
        rif: u32,
        state: RifState,
    ) -> OesResult<()> {
        rif_in_vrf_mut(&mut self.router.rifs, vrid, rif)?.state = state;
        info!(
            "RouterMgr: rif {} ipv4 {:?} ipv6 {:?}",
            rif, state.ipv4, state.ipv6
        );
        Ok(())
    }

    pub fn router_interface_state_get(&self, vrid: u32, rif: u32) -> OesResult<RifState> {
        Ok(rif_in_vrf(&self.router.rifs, vrid, rif)?.state)
    }

    /// Adds or removes additional router MACs of an interface.
    pub fn router_interface_mac_set(
        &mut self,
        cmd: AccessCmd,
        vrid: u32,
        rif: u32,
        macs: &[MacAddress],
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[AccessCmd::Add, AccessCmd::Delete, AccessCmd::DeleteAll],
            "router_interface_mac_set",
        )?;
        let entry = rif_in_vrf_mut(&mut self.router.rifs, vrid, rif)?;

        match cmd {
            AccessCmd::Add => {
                if let Some(bad) = macs.iter().find(|m| !m.is_valid_station()) {
                    return Err(OesError::param(format!("router MAC {} is not unicast", bad)));
                }
                if let Some(dup) = macs.iter().find(|m| entry.macs.contains(*m)) {
                    return Err(OesError::already_exists(format!(
                        "router MAC {} on rif {}",
                        dup, rif
                    )));
                }
                entry.macs.extend(macs.iter().copied());
            }
            AccessCmd::Delete => {
                if let Some(missing) = macs.iter().find(|m| !entry.macs.contains(*m)) {
                    return Err(OesError::not_found(format!(
                        "router MAC {} on rif {}",
                        missing, rif
                    )));
                }
                for mac in macs {
                    entry.macs.remove(mac);
                }
            }
            _ => entry.macs.clear(),
        }
        Ok(())
    }

    pub fn router_interface_mac_get(&self, vrid: u32, rif: u32) -> OesResult<Vec<MacAddress>> {
        Ok(rif_in_vrf(&self.router.rifs, vrid, rif)?
            .macs
            .iter()
            .copied()
            .collect())
    }

    /// Enables (ADD) or disables (DELETE) counting on an interface.
    pub fn router_interface_cntr_set(
        &mut self,
        cmd: AccessCmd,
        vrid: u32,
        rif: u32,
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[AccessCmd::Add, AccessCmd::Delete],
            "router_interface_cntr_set",
        )?;
        let entry = rif_in_vrf_mut(&mut self.router.rifs, vrid, rif)?;
        match (cmd, entry.counters.is_some()) {
            (AccessCmd::Add, true) => Err(OesError::already_exists(format!(
                "counters on rif {}",
                rif
            ))),
            (AccessCmd::Add, false) => {
                entry.counters = Some(RifCounters::default());
                Ok(())
            }
            (_, false) => Err(OesError::not_found(format!("counters on rif {}", rif))),
            (_, true) => {
                entry.counters = None;
                Ok(())
            }
        }
    }

    pub fn router_interface_cntr_get(
        &mut self,
        cmd: CounterCmd,
        vrid: u32,
        rif: u32,
    ) -> OesResult<RifCounters> {
        let entry = rif_in_vrf_mut(&mut self.router.rifs, vrid, rif)?;
        let counters = entry
            .counters
            .as_mut()
            .ok_or_else(|| OesError::not_found(format!("counters on rif {}", rif)))?;
        let snapshot = *counters;
        if cmd.clears() {
            *counters = RifCounters::default();
        }
        Ok(snapshot)
    }
}
