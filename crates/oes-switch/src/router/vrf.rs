//! Per-router tables and next-hop resolution.
//!
//! A `Forward` route with next hops is usable only through next hops that
//! have a forwarding neighbor. Until at least one does, the route traps to
//! the CPU so the control plane can resolve it. Every route is indexed by
//! its next hops, so a neighbor change only revisits the routes using it.

use super::types::{
    McRouteData, McRouteEntry, McRouteKey, NeighData, NeighEntry, RouterAction, RouterAttributes,
    UcRouteData, UcRouteEntry,
};
use log::debug;
use oes_common::{OesResult, SyncTable};
use oes_types::{IpAddress, IpPrefix};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Neighbor {
    pub(crate) data: NeighData,
    pub(crate) active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UcRoute {
    pub(crate) data: UcRouteData,
    pub(crate) resolved: Vec<IpAddress>,
    pub(crate) effective_action: RouterAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct McRoute {
    pub(crate) data: McRouteData,
    pub(crate) active: bool,
}

/// Table sizes of one router.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VrfLimits {
    pub(crate) neighbors: usize,
    pub(crate) uc_routes: usize,
    pub(crate) mc_routes: usize,
}

#[derive(Debug, Clone)]
pub struct Vrf {
    pub(crate) attrs: RouterAttributes,
    pub(crate) neighbors: SyncTable<IpAddress, Neighbor>,
    pub(crate) uc_routes: SyncTable<IpPrefix, UcRoute>,
    pub(crate) mc_routes: SyncTable<McRouteKey, McRoute>,
    /// Routes using each next hop.
    nh_index: BTreeMap<IpAddress, BTreeSet<IpPrefix>>,
}

impl Vrf {
    pub(crate) fn new(attrs: RouterAttributes, limits: VrfLimits) -> Self {
        Self {
            attrs,
            neighbors: SyncTable::with_capacity_limit("neighbor", limits.neighbors),
            uc_routes: SyncTable::with_capacity_limit("uc route", limits.uc_routes),
            mc_routes: SyncTable::with_capacity_limit("mc route", limits.mc_routes),
            nh_index: BTreeMap::new(),
        }
    }

    pub fn attributes(&self) -> &RouterAttributes {
        &self.attrs
    }

    /// True when the router holds no neighbors or routes.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty() && self.uc_routes.is_empty() && self.mc_routes.is_empty()
    }

    fn resolve(&self, data: &UcRouteData) -> (Vec<IpAddress>, RouterAction) {
        if data.action != RouterAction::Forward {
            return (Vec::new(), data.action);
        }
        let resolved: Vec<IpAddress> = data
            .next_hops
            .iter()
            .filter(|nh| {
                self.neighbors
                    .get(nh)
                    .is_some_and(|n| n.data.action == RouterAction::Forward)
            })
            .copied()
            .collect();
        let action = if data.next_hops.is_empty() || !resolved.is_empty() {
            RouterAction::Forward
        } else {
            RouterAction::Trap
        };
        (resolved, action)
    }

    /// Installs or replaces a route and returns the replaced data.
    pub(crate) fn install_route(
        &mut self,
        prefix: IpPrefix,
        data: UcRouteData,
    ) -> OesResult<Option<UcRouteData>> {
        let (resolved, effective_action) = self.resolve(&data);
        let next_hops = data.next_hops.clone();
        let old = self.uc_routes.upsert(
            prefix,
            UcRoute {
                data,
                resolved,
                effective_action,
            },
        )?;
        if let Some(old) = &old {
            self.unindex(prefix, &old.data.next_hops);
        }
        for nh in next_hops {
            self.nh_index.entry(nh).or_default().insert(prefix);
        }
        Ok(old.map(|route| route.data))
    }

    pub(crate) fn remove_route(&mut self, prefix: &IpPrefix) -> OesResult<UcRouteData> {
        let route = self.uc_routes.remove(prefix)?;
        self.unindex(*prefix, &route.data.next_hops);
        Ok(route.data)
    }

    pub(crate) fn drain_routes(&mut self) -> Vec<UcRouteData> {
        self.nh_index.clear();
        self.uc_routes
            .drain_where(|_, _| true)
            .into_iter()
            .map(|(_, route)| route.data)
            .collect()
    }

    fn unindex(&mut self, prefix: IpPrefix, next_hops: &[IpAddress]) {
        for nh in next_hops {
            if let Some(prefixes) = self.nh_index.get_mut(nh) {
                prefixes.remove(&prefix);
                if prefixes.is_empty() {
                    self.nh_index.remove(nh);
                }
            }
        }
    }

    /// Recomputes the routes using `nh` after its neighbor changed.
    ///
    /// Returns the number of routes whose effective action changed.
    pub(crate) fn refresh_next_hop(&mut self, nh: &IpAddress) -> usize {
        let prefixes: Vec<IpPrefix> = self
            .nh_index
            .get(nh)
            .map(|prefixes| prefixes.iter().copied().collect())
            .unwrap_or_default();

        let mut changed = 0;
        for prefix in prefixes {
            let Some(data) = self.uc_routes.get(&prefix).map(|r| r.data.clone()) else {
                continue;
            };
            let (resolved, action) = self.resolve(&data);
            if let Some(route) = self.uc_routes.get_mut(&prefix) {
                if route.effective_action != action {
                    debug!(
                        "RouterMgr: route {} now {:?} via {}",
                        prefix, action, nh
                    );
                    changed += 1;
                }
                route.resolved = resolved;
                route.effective_action = action;
            }
        }
        changed
    }

    /// Longest-prefix match for `dst`.
    pub(crate) fn longest_match(&self, dst: &IpAddress) -> Option<(IpPrefix, &UcRoute)> {
        (0..=dst.max_prefix_len()).rev().find_map(|len| {
            let prefix = IpPrefix::new(dst.mask(len), len).ok()?;
            self.uc_routes.get(&prefix).map(|route| (prefix, route))
        })
    }

    pub(crate) fn neigh_entries(&self) -> impl Iterator<Item = NeighEntry> + '_ {
        self.neighbors
            .iter()
            .map(|(ip, neigh)| neigh_entry(*ip, neigh))
    }

    pub(crate) fn route_entries(&self) -> impl Iterator<Item = UcRouteEntry> + '_ {
        self.uc_routes
            .iter()
            .map(|(prefix, route)| route_entry(*prefix, route))
    }

    pub(crate) fn mc_entries(&self) -> impl Iterator<Item = McRouteEntry> + '_ {
        self.mc_routes.iter().map(|(key, route)| mc_entry(*key, route))
    }
}

pub(crate) fn neigh_entry(ip: IpAddress, neigh: &Neighbor) -> NeighEntry {
    NeighEntry {
        ip,
        data: neigh.data,
        active: neigh.active,
    }
}

pub(crate) fn route_entry(prefix: IpPrefix, route: &UcRoute) -> UcRouteEntry {
    UcRouteEntry {
        prefix,
        data: route.data.clone(),
        resolved: route.resolved.clone(),
        effective_action: route.effective_action,
    }
}

pub(crate) fn mc_entry(key: McRouteKey, route: &McRoute) -> McRouteEntry {
    McRouteEntry {
        key,
        data: route.data.clone(),
        active: route.active,
    }
}
