//! Router operations: routers, neighbors, unicast and multicast routes and
//! the forwarding lookups.

use super::table::{acquire_rif, release_rif, rif_in_vrf, rif_in_vrf_mut, Router};
use super::types::{
    EcmpHashParams, McDecision, McRouteData, McRouteEntry, McRouteKey, NeighData, NeighEntry,
    RouteDecision, RouterAction, RouterAttributes, UcRouteData, UcRouteEntry,
};
use super::vrf::{mc_entry, neigh_entry, route_entry, McRoute, Neighbor, Vrf};
use crate::switch::Switch;
use itertools::Itertools;
use log::{debug, info};
use oes_common::{flow_hash, AccessCmd, FlowFields, GetCmd, OesError, OesResult};
use oes_types::{IpAddress, IpPrefix};
use std::iter;

impl Switch {
    pub fn router_ecmp_hash_params_set(&mut self, params: EcmpHashParams) -> OesResult<()> {
        if params.fields.is_empty() {
            return Err(OesError::param("ECMP hash needs at least one field"));
        }
        self.router.ecmp_hash = params;
        info!("RouterMgr: ECMP hash {:?}", params);
        Ok(())
    }

    pub fn router_ecmp_hash_params_get(&self) -> EcmpHashParams {
        self.router.ecmp_hash
    }

    /// Creates, edits or deletes a router.
    ///
    /// ADD allocates the lowest free router id and returns it; missing
    /// `attrs` means defaults. EDIT needs `vrid` and `attrs`. DELETE is
    /// refused while the router has interfaces, neighbors or routes.
    pub fn router_set(
        &mut self,
        cmd: AccessCmd,
        attrs: Option<&RouterAttributes>,
        vrid: Option<u32>,
    ) -> OesResult<u32> {
        cmd.ensure_one_of(
            &[AccessCmd::Add, AccessCmd::Edit, AccessCmd::Delete],
            "router_set",
        )?;
        let router = &mut self.router;

        match cmd {
            AccessCmd::Add => {
                let attrs = attrs.copied().unwrap_or_default();
                check_router_attributes(&attrs)?;
                let id = (0u32..)
                    .take(router.max_routers)
                    .find(|id| !router.vrfs.contains_key(id))
                    .ok_or_else(|| OesError::no_resources("router"))?;
                router.vrfs.insert_new(id, Vrf::new(attrs, router.limits))?;
                info!("RouterMgr: created router {}", id);
                Ok(id)
            }
            AccessCmd::Edit => {
                let id = OesError::require(vrid, "vrid")?;
                let attrs = OesError::require(attrs, "attrs")?;
                check_router_attributes(attrs)?;
                router.vrfs.lookup_mut(&id)?.attrs = *attrs;
                debug!("RouterMgr: router {} attributes {:?}", id, attrs);
                Ok(id)
            }
            _ => {
                let id = OesError::require(vrid, "vrid")?;
                let vrf = router.vrfs.lookup(&id)?;
                let rifs = router.rifs.values().filter(|r| r.vrid() == id).count();
                if rifs > 0 {
                    return Err(OesError::in_use(format!(
                        "router {} has {} interfaces",
                        id, rifs
                    )));
                }
                if !vrf.is_empty() {
                    return Err(OesError::in_use(format!(
                        "router {} has neighbors or routes",
                        id
                    )));
                }
                router.vrfs.remove(&id)?;
                info!("RouterMgr: deleted router {}", id);
                Ok(id)
            }
        }
    }

    pub fn router_get(&self, vrid: u32) -> OesResult<RouterAttributes> {
        Ok(self.router.vrfs.lookup(&vrid)?.attrs)
    }

    /// Manages neighbors of router `vrid`.
    ///
    /// ADD and EDIT need `ip` and `data`, DELETE needs `ip`. DELETE_ALL
    /// removes the neighbors on `data.rif` when `data` is given, otherwise
    /// every neighbor. Routes through a changed neighbor are re-resolved.
    pub fn router_neigh_set(
        &mut self,
        cmd: AccessCmd,
        vrid: u32,
        ip: Option<&IpAddress>,
        data: Option<&NeighData>,
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[
                AccessCmd::Add,
                AccessCmd::Edit,
                AccessCmd::Delete,
                AccessCmd::DeleteAll,
            ],
            "router_neigh_set",
        )?;
        let router = &mut self.router;
        let vrf = router.vrfs.lookup_mut(&vrid)?;
        let rifs = &mut router.rifs;

        match cmd {
            AccessCmd::Add => {
                let ip = *OesError::require(ip, "ip")?;
                let data = *OesError::require(data, "data")?;
                check_neighbor(vrf, &ip, &data)?;
                if vrf.neighbors.contains_key(&ip) {
                    return Err(OesError::already_exists(format!("neighbor {}", ip)));
                }
                if vrf.neighbors.is_full() {
                    return Err(OesError::no_resources("neighbor table full"));
                }
                acquire_rif(rifs, vrid, data.rif)?;
                vrf.neighbors.insert_new(
                    ip,
                    Neighbor {
                        data,
                        active: false,
                    },
                )?;
                let changed = vrf.refresh_next_hop(&ip);
                info!(
                    "RouterMgr: neighbor {} {} on rif {}, {} routes changed",
                    ip, data.mac, data.rif, changed
                );
            }
            AccessCmd::Edit => {
                let ip = *OesError::require(ip, "ip")?;
                let data = *OesError::require(data, "data")?;
                check_neighbor(vrf, &ip, &data)?;
                let old = vrf.neighbors.lookup(&ip)?.data;
                if old.rif != data.rif {
                    acquire_rif(rifs, vrid, data.rif)?;
                    release_rif(rifs, old.rif)?;
                }
                vrf.neighbors.lookup_mut(&ip)?.data = data;
                let changed = vrf.refresh_next_hop(&ip);
                debug!("RouterMgr: neighbor {} updated, {} routes changed", ip, changed);
            }
            AccessCmd::Delete => {
                let ip = *OesError::require(ip, "ip")?;
                let removed = vrf.neighbors.remove(&ip)?;
                release_rif(rifs, removed.data.rif)?;
                let changed = vrf.refresh_next_hop(&ip);
                info!("RouterMgr: neighbor {} removed, {} routes changed", ip, changed);
            }
            _ => {
                let only_rif = data.map(|d| d.rif);
                let removed = vrf
                    .neighbors
                    .drain_where(|_, n| only_rif.map_or(true, |rif| n.data.rif == rif));
                for (ip, neigh) in &removed {
                    release_rif(rifs, neigh.data.rif)?;
                    vrf.refresh_next_hop(ip);
                }
                info!(
                    "RouterMgr: removed {} neighbors of router {}",
                    removed.len(),
                    vrid
                );
            }
        }
        Ok(())
    }

    /// Reads neighbors. `GetActivity` reads one neighbor and clears its
    /// activity bit.
    pub fn router_neigh_get(
        &mut self,
        cmd: GetCmd,
        vrid: u32,
        ip: Option<&IpAddress>,
        count: usize,
    ) -> OesResult<Vec<NeighEntry>> {
        let vrf = self.router.vrfs.lookup_mut(&vrid)?;
        if cmd == GetCmd::GetActivity {
            let ip = activity_key(ip, count)?;
            let neigh = vrf.neighbors.lookup_mut(ip)?;
            let entry = neigh_entry(*ip, neigh);
            neigh.active = false;
            return Ok(vec![entry]);
        }
        Ok(vrf
            .neighbors
            .walk(cmd, ip, count)?
            .into_iter()
            .map(|(ip, neigh)| neigh_entry(ip, &neigh))
            .collect())
    }

    /// Manages unicast routes of router `vrid`. ADD replaces an existing
    /// route with the same prefix.
    pub fn router_uc_route_set(
        &mut self,
        cmd: AccessCmd,
        vrid: u32,
        prefix: Option<&IpPrefix>,
        data: Option<&UcRouteData>,
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[AccessCmd::Add, AccessCmd::Delete, AccessCmd::DeleteAll],
            "router_uc_route_set",
        )?;

        match cmd {
            AccessCmd::Add => {
                let prefix = *OesError::require(prefix, "prefix")?;
                let data = OesError::require(data, "data")?.clone();
                check_uc_route(&self.router, vrid, &prefix, &data)?;

                let router = &mut self.router;
                let vrf = router.vrfs.lookup_mut(&vrid)?;
                if !vrf.uc_routes.contains_key(&prefix) && vrf.uc_routes.is_full() {
                    return Err(OesError::no_resources("uc route table full"));
                }
                if let Some(rif) = data.rif {
                    acquire_rif(&mut router.rifs, vrid, rif)?;
                }
                let hops = data.next_hops.len();
                if let Some(old_rif) = vrf.install_route(prefix, data)?.and_then(|old| old.rif) {
                    release_rif(&mut router.rifs, old_rif)?;
                }
                let route = vrf.uc_routes.lookup(&prefix)?;
                info!(
                    "RouterMgr: route {} in router {} via {} next hops, {:?}",
                    prefix, vrid, hops, route.effective_action
                );
            }
            AccessCmd::Delete => {
                let prefix = OesError::require(prefix, "prefix")?;
                let router = &mut self.router;
                let removed = router.vrfs.lookup_mut(&vrid)?.remove_route(prefix)?;
                if let Some(rif) = removed.rif {
                    release_rif(&mut router.rifs, rif)?;
                }
                info!("RouterMgr: removed route {} from router {}", prefix, vrid);
            }
            _ => {
                let router = &mut self.router;
                let removed = router.vrfs.lookup_mut(&vrid)?.drain_routes();
                for rif in removed.iter().filter_map(|d| d.rif) {
                    release_rif(&mut router.rifs, rif)?;
                }
                info!(
                    "RouterMgr: removed {} routes from router {}",
                    removed.len(),
                    vrid
                );
            }
        }
        Ok(())
    }

    pub fn router_uc_route_get(
        &self,
        cmd: GetCmd,
        vrid: u32,
        prefix: Option<&IpPrefix>,
        count: usize,
    ) -> OesResult<Vec<UcRouteEntry>> {
        Ok(self
            .router
            .vrfs
            .lookup(&vrid)?
            .uc_routes
            .walk(cmd, prefix, count)?
            .into_iter()
            .map(|(prefix, route)| route_entry(prefix, &route))
            .collect())
    }

    /// Routes a unicast packet to `dst`.
    ///
    /// Picks the longest matching prefix, then an ECMP member by hashing
    /// `flow`. A forwarded packet marks its neighbor active and counts on
    /// the egress interface.
    pub fn route_lookup(
        &mut self,
        vrid: u32,
        dst: &IpAddress,
        flow: &FlowFields,
    ) -> OesResult<RouteDecision> {
        let router = &mut self.router;
        let hash = router.ecmp_hash;
        let vrf = router.vrfs.lookup_mut(&vrid)?;
        if !vrf.attrs.uc_enabled(dst) {
            return Ok(RouteDecision::Drop { prefix: None });
        }

        let Some((prefix, route)) = vrf.longest_match(dst) else {
            return Ok(match vrf.attrs.uc_default_action {
                RouterAction::Trap => RouteDecision::Trap { prefix: None },
                _ => RouteDecision::Drop { prefix: None },
            });
        };
        match route.effective_action {
            RouterAction::Trap => return Ok(RouteDecision::Trap { prefix: Some(prefix) }),
            RouterAction::Drop => return Ok(RouteDecision::Drop { prefix: Some(prefix) }),
            RouterAction::Forward => {}
        }
        // Direct routes deliver to the destination itself, which must be a
        // neighbor on the route's interface.
        let (next_hop, direct_rif) = if route.resolved.is_empty() {
            (*dst, route.data.rif)
        } else {
            let h = flow_hash(hash.hash_type, hash.seed, flow, hash.fields);
            (route.resolved[(h % route.resolved.len() as u64) as usize], None)
        };

        let Some(neigh) = vrf
            .neighbors
            .get_mut(&next_hop)
            .filter(|n| direct_rif.map_or(true, |rif| n.data.rif == rif))
        else {
            return Ok(RouteDecision::Trap { prefix: Some(prefix) });
        };
        match neigh.data.action {
            RouterAction::Trap => return Ok(RouteDecision::Trap { prefix: Some(prefix) }),
            RouterAction::Drop => return Ok(RouteDecision::Drop { prefix: Some(prefix) }),
            RouterAction::Forward => {}
        }
        let data = neigh.data;
        let rif = router.rifs.lookup_mut(&data.rif)?;
        if !rif.is_up_for(dst) {
            rif.count_discard();
            return Ok(RouteDecision::Drop { prefix: Some(prefix) });
        }
        neigh.active = true;
        rif.count_egress();
        Ok(RouteDecision::Forward {
            prefix,
            rif: data.rif,
            next_hop,
            mac: data.mac,
        })
    }

    /// Manages multicast routes of router `vrid`. ADD replaces an existing
    /// route with the same key.
    pub fn router_mc_route_set(
        &mut self,
        cmd: AccessCmd,
        vrid: u32,
        key: Option<&McRouteKey>,
        data: Option<&McRouteData>,
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[AccessCmd::Add, AccessCmd::Delete, AccessCmd::DeleteAll],
            "router_mc_route_set",
        )?;

        match cmd {
            AccessCmd::Add => {
                let key = *OesError::require(key, "key")?;
                let data = OesError::require(data, "data")?.clone();
                check_mc_route(&self.router, vrid, &key, &data)?;

                let router = &mut self.router;
                let vrf = router.vrfs.lookup_mut(&vrid)?;
                if !vrf.mc_routes.contains_key(&key) && vrf.mc_routes.is_full() {
                    return Err(OesError::no_resources("mc route table full"));
                }
                for rif in mc_route_rifs(&key, &data) {
                    acquire_rif(&mut router.rifs, vrid, rif)?;
                }
                let egress = data.egress_rifs.len();
                let old = vrf.mc_routes.upsert(
                    key,
                    McRoute {
                        data,
                        active: false,
                    },
                )?;
                if let Some(old) = old {
                    for rif in mc_route_rifs(&key, &old.data) {
                        release_rif(&mut router.rifs, rif)?;
                    }
                }
                info!(
                    "RouterMgr: mc route {} in router {} to {} rifs",
                    key, vrid, egress
                );
            }
            AccessCmd::Delete => {
                let key = OesError::require(key, "key")?;
                let router = &mut self.router;
                let removed = router.vrfs.lookup_mut(&vrid)?.mc_routes.remove(key)?;
                for rif in mc_route_rifs(key, &removed.data) {
                    release_rif(&mut router.rifs, rif)?;
                }
                info!("RouterMgr: removed mc route {} from router {}", key, vrid);
            }
            _ => {
                let router = &mut self.router;
                let removed = router
                    .vrfs
                    .lookup_mut(&vrid)?
                    .mc_routes
                    .drain_where(|_, _| true);
                for (key, route) in &removed {
                    for rif in mc_route_rifs(key, &route.data) {
                        release_rif(&mut router.rifs, rif)?;
                    }
                }
                info!(
                    "RouterMgr: removed {} mc routes from router {}",
                    removed.len(),
                    vrid
                );
            }
        }
        Ok(())
    }

    /// Reads multicast routes. `GetActivity` reads one route and clears its
    /// activity bit.
    pub fn router_mc_route_get(
        &mut self,
        cmd: GetCmd,
        vrid: u32,
        key: Option<&McRouteKey>,
        count: usize,
    ) -> OesResult<Vec<McRouteEntry>> {
        let vrf = self.router.vrfs.lookup_mut(&vrid)?;
        if cmd == GetCmd::GetActivity {
            let key = activity_key(key, count)?;
            let route = vrf.mc_routes.lookup_mut(key)?;
            let entry = mc_entry(*key, route);
            route.active = false;
            return Ok(vec![entry]);
        }
        Ok(vrf
            .mc_routes
            .walk(cmd, key, count)?
            .into_iter()
            .map(|(key, route)| mc_entry(key, &route))
            .collect())
    }

    /// Adds egress interfaces to, or removes them from, a multicast route.
    pub fn router_mc_egress_rif_set(
        &mut self,
        cmd: AccessCmd,
        vrid: u32,
        key: &McRouteKey,
        rifs: &[u32],
    ) -> OesResult<()> {
        cmd.ensure_one_of(
            &[AccessCmd::Add, AccessCmd::Delete],
            "router_mc_egress_rif_set",
        )?;
        let router = &mut self.router;
        let route = router.vrfs.lookup_mut(&vrid)?.mc_routes.lookup_mut(key)?;

        match cmd {
            AccessCmd::Add => {
                for rif in rifs {
                    rif_in_vrf(&router.rifs, vrid, *rif)?;
                }
                if let Some(dup) = rifs.iter().find(|r| route.data.egress_rifs.contains(*r)) {
                    return Err(OesError::already_exists(format!(
                        "rif {} in mc route {}",
                        dup, key
                    )));
                }
                for rif in rifs.iter().unique() {
                    acquire_rif(&mut router.rifs, vrid, *rif)?;
                    route.data.egress_rifs.insert(*rif);
                }
            }
            _ => {
                if let Some(missing) = rifs.iter().find(|r| !route.data.egress_rifs.contains(*r)) {
                    return Err(OesError::not_found(format!(
                        "rif {} in mc route {}",
                        missing, key
                    )));
                }
                for rif in rifs.iter().unique() {
                    route.data.egress_rifs.remove(rif);
                    release_rif(&mut router.rifs, *rif)?;
                }
            }
        }
        debug!("RouterMgr: {} {} egress rifs of mc route {}", cmd, rifs.len(), key);
        Ok(())
    }

    pub fn router_mc_egress_rif_get(&self, vrid: u32, key: &McRouteKey) -> OesResult<Vec<u32>> {
        Ok(self
            .router
            .vrfs
            .lookup(&vrid)?
            .mc_routes
            .lookup(key)?
            .data
            .egress_rifs
            .iter()
            .copied()
            .collect())
    }

    /// Routes a multicast packet received on `ingress_rif`.
    ///
    /// An (S, G) route wins over the (*, G) route of the same interface.
    /// Packets matching no route are dropped.
    pub fn mc_route_lookup(
        &mut self,
        vrid: u32,
        ingress_rif: u32,
        source: &IpAddress,
        group: &IpAddress,
    ) -> OesResult<McDecision> {
        let router = &mut self.router;
        let vrf = router.vrfs.lookup_mut(&vrid)?;
        let ingress = rif_in_vrf_mut(&mut router.rifs, vrid, ingress_rif)?;
        ingress.count_ingress();
        if !group.is_multicast() || !vrf.attrs.mc_enabled(group) || !ingress.is_up_for(group) {
            return Ok(McDecision::Drop);
        }

        let sg = McRouteKey {
            group: *group,
            source: Some(*source),
            ingress_rif,
        };
        let key = if vrf.mc_routes.contains_key(&sg) {
            sg
        } else {
            McRouteKey { source: None, ..sg }
        };
        let Some(route) = vrf.mc_routes.get_mut(&key) else {
            return Ok(McDecision::Drop);
        };
        route.active = true;

        match route.data.action {
            RouterAction::Trap => Ok(McDecision::Trap { key }),
            RouterAction::Drop => Ok(McDecision::Drop),
            RouterAction::Forward => {
                let mut egress_rifs = Vec::new();
                for id in route.data.egress_rifs.iter().filter(|r| **r != ingress_rif) {
                    let Some(rif) = router.rifs.get_mut(id) else {
                        continue;
                    };
                    if rif.is_up_for(group) {
                        rif.count_egress();
                        egress_rifs.push(*id);
                    } else {
                        rif.count_discard();
                    }
                }
                Ok(McDecision::Forward { key, egress_rifs })
            }
        }
    }
}

fn check_router_attributes(attrs: &RouterAttributes) -> OesResult<()> {
    if attrs.uc_default_action == RouterAction::Forward {
        return Err(OesError::param(
            "router default action must be trap or drop",
        ));
    }
    Ok(())
}

fn activity_key<K>(key: Option<&K>, count: usize) -> OesResult<&K> {
    if count != 1 {
        return Err(OesError::param(format!(
            "GET_ACTIVITY requires count 1, got {}",
            count
        )));
    }
    key.ok_or_else(|| OesError::param("GET_ACTIVITY requires a key"))
}

fn check_neighbor(vrf: &Vrf, ip: &IpAddress, data: &NeighData) -> OesResult<()> {
    if ip.is_multicast() {
        return Err(OesError::param(format!("neighbor {} is multicast", ip)));
    }
    if !vrf.attrs.uc_enabled(ip) {
        return Err(OesError::param(format!(
            "address family of neighbor {} is disabled",
            ip
        )));
    }
    if data.action == RouterAction::Forward && !data.mac.is_valid_station() {
        return Err(OesError::param(format!(
            "neighbor {} MAC {} is not unicast",
            ip, data.mac
        )));
    }
    Ok(())
}

fn check_uc_route(
    router: &Router,
    vrid: u32,
    prefix: &IpPrefix,
    data: &UcRouteData,
) -> OesResult<()> {
    let vrf = router.vrfs.lookup(&vrid)?;
    if !prefix.is_canonical() {
        return Err(OesError::param(format!(
            "route {} has host bits set, use {}",
            prefix,
            prefix.masked()
        )));
    }
    if !vrf.attrs.uc_enabled(prefix.address()) {
        return Err(OesError::param(format!(
            "address family of route {} is disabled",
            prefix
        )));
    }
    if data.action == RouterAction::Forward && data.next_hops.is_empty() && data.rif.is_none() {
        return Err(OesError::param(format!(
            "forwarding route {} needs next hops or a rif",
            prefix
        )));
    }
    OesError::check_range(
        "next_hops",
        data.next_hops.len() as i64,
        0,
        router.max_ecmp_paths as i64,
    )?;
    if let Some(nh) = data
        .next_hops
        .iter()
        .find(|nh| nh.is_ipv4() != prefix.is_ipv4() || nh.is_multicast())
    {
        return Err(OesError::param(format!(
            "next hop {} cannot serve route {}",
            nh, prefix
        )));
    }
    if !data.next_hops.iter().all_unique() {
        return Err(OesError::param(format!(
            "route {} repeats a next hop",
            prefix
        )));
    }
    if let Some(rif) = data.rif {
        rif_in_vrf(&router.rifs, vrid, rif)?;
    }
    Ok(())
}

fn check_mc_route(
    router: &Router,
    vrid: u32,
    key: &McRouteKey,
    data: &McRouteData,
) -> OesResult<()> {
    let vrf = router.vrfs.lookup(&vrid)?;
    if !key.group.is_multicast() {
        return Err(OesError::param(format!("group {} is not multicast", key.group)));
    }
    if !vrf.attrs.mc_enabled(&key.group) {
        return Err(OesError::param(format!(
            "multicast routing for {} is disabled",
            key.group
        )));
    }
    if let Some(source) = key.source {
        if source.is_ipv4() != key.group.is_ipv4() || source.is_multicast() {
            return Err(OesError::param(format!(
                "source {} cannot send to {}",
                source, key.group
            )));
        }
    }
    for rif in mc_route_rifs(key, data) {
        rif_in_vrf(&router.rifs, vrid, rif)?;
    }
    Ok(())
}

fn mc_route_rifs<'a>(key: &McRouteKey, data: &'a McRouteData) -> impl Iterator<Item = u32> + 'a {
    iter::once(key.ingress_rif).chain(data.egress_rifs.iter().copied())
}

#[cfg(test)]
mod tests {
    use crate::config::SwitchConfig;
    use crate::router::{
        EcmpHashParams, L3Interface, McDecision, McRouteData, McRouteKey, NeighData, RifAttributes,
        RifState, RouteDecision, RouterAction, RouterAttributes, UcRouteData,
    };
    use crate::switch::Switch;
    use oes_common::{AccessCmd, CounterCmd, FlowFields, GetCmd, HashFieldSet, OesStatus};
    use oes_types::{AdminState, IpAddress, IpPrefix, MacAddress, VlanId};
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeSet, HashSet};

    const ROUTER_MAC: MacAddress = MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

    fn ip(s: &str) -> IpAddress {
        s.parse().unwrap()
    }

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    fn host_mac(last: u8) -> MacAddress {
        MacAddress::new([0x00, 0x0c, 0x29, 0x00, 0x00, last])
    }

    /// A switch with one router and two VLAN interfaces.
    fn setup(config: SwitchConfig) -> (Switch, u32, u32, u32) {
        let mut sw = Switch::new(config).unwrap();
        let br = sw.bridge_set(AccessCmd::Create, None).unwrap();
        let vrid = sw.router_set(AccessCmd::Add, None, None).unwrap();
        let mut rifs = Vec::new();
        for vid in [10, 20] {
            let ifc = L3Interface::Vlan {
                bridge: br,
                vid: VlanId::new(vid).unwrap(),
            };
            rifs.push(
                sw.router_interface_set(
                    AccessCmd::Add,
                    vrid,
                    Some(&ifc),
                    Some(&RifAttributes::new(ROUTER_MAC)),
                    None,
                )
                .unwrap(),
            );
        }
        (sw, vrid, rifs[0], rifs[1])
    }

    fn add_neigh(sw: &mut Switch, vrid: u32, addr: &str, rif: u32, last: u8) {
        let data = NeighData {
            rif,
            mac: host_mac(last),
            action: RouterAction::Forward,
        };
        sw.router_neigh_set(AccessCmd::Add, vrid, Some(&ip(addr)), Some(&data))
            .unwrap();
    }

    fn flow(l4_src_port: u16) -> FlowFields {
        FlowFields {
            src_ip: Some(ip("172.16.0.1")),
            dst_ip: Some(ip("192.168.1.1")),
            ip_proto: 6,
            l4_src_port,
            l4_dst_port: 443,
            ..FlowFields::default()
        }
    }

    #[test]
    fn test_router_lifecycle() {
        let (mut sw, vrid, rif, _) = setup(SwitchConfig::with_ports(2));
        assert_eq!(sw.router_get(vrid).unwrap(), RouterAttributes::default());

        let bad = RouterAttributes {
            uc_default_action: RouterAction::Forward,
            ..RouterAttributes::default()
        };
        assert_eq!(
            sw.router_set(AccessCmd::Edit, Some(&bad), Some(vrid))
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );
        assert_eq!(
            sw.router_set(AccessCmd::Delete, None, Some(vrid))
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );

        add_neigh(&mut sw, vrid, "10.0.10.2", rif, 2);
        sw.router_interface_set(AccessCmd::DeleteAll, vrid, None, None, None)
            .unwrap_err();
        sw.router_neigh_set(AccessCmd::DeleteAll, vrid, None, None)
            .unwrap();
        sw.router_interface_set(AccessCmd::DeleteAll, vrid, None, None, None)
            .unwrap();
        sw.router_set(AccessCmd::Delete, None, Some(vrid)).unwrap();
        assert_eq!(
            sw.router_get(vrid).unwrap_err().status(),
            OesStatus::EntryNotFound
        );
        assert_eq!(
            sw.router_set(AccessCmd::DeleteAll, None, None)
                .unwrap_err()
                .status(),
            OesStatus::CmdUnsupported
        );
    }

    #[test]
    fn test_neighbor_references_rif() {
        let (mut sw, vrid, rif10, rif20) = setup(SwitchConfig::with_ports(2));
        add_neigh(&mut sw, vrid, "10.0.10.2", rif10, 2);
        assert_eq!(
            sw.router_interface_set(AccessCmd::Delete, vrid, None, None, Some(rif10))
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );

        // Moving the neighbor moves the reference.
        let moved = NeighData {
            rif: rif20,
            mac: host_mac(2),
            action: RouterAction::Forward,
        };
        sw.router_neigh_set(AccessCmd::Edit, vrid, Some(&ip("10.0.10.2")), Some(&moved))
            .unwrap();
        sw.router_interface_set(AccessCmd::Delete, vrid, None, None, Some(rif10))
            .unwrap();
        assert_eq!(
            sw.router_interface_set(AccessCmd::Delete, vrid, None, None, Some(rif20))
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );
    }

    #[test]
    fn test_neighbor_validation() {
        let (mut sw, vrid, rif, _) = setup(SwitchConfig::with_ports(2));
        add_neigh(&mut sw, vrid, "10.0.10.2", rif, 2);
        let data = NeighData {
            rif,
            mac: host_mac(3),
            action: RouterAction::Forward,
        };
        assert_eq!(
            sw.router_neigh_set(AccessCmd::Add, vrid, Some(&ip("10.0.10.2")), Some(&data))
                .unwrap_err()
                .status(),
            OesStatus::EntryAlreadyExists
        );
        assert_eq!(
            sw.router_neigh_set(AccessCmd::Add, vrid, Some(&ip("224.0.0.5")), Some(&data))
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );
        let no_rif = NeighData { rif: 77, ..data };
        assert_eq!(
            sw.router_neigh_set(AccessCmd::Add, vrid, Some(&ip("10.0.10.3")), Some(&no_rif))
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
        assert_eq!(
            sw.router_neigh_set(AccessCmd::Add, vrid, None, Some(&data))
                .unwrap_err()
                .status(),
            OesStatus::ParamNull
        );
        assert_eq!(
            sw.router_neigh_set(AccessCmd::Delete, vrid, Some(&ip("10.0.10.9")), None)
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
    }

    #[test]
    fn test_neighbor_walk_and_delete_by_rif() {
        let (mut sw, vrid, rif10, rif20) = setup(SwitchConfig::with_ports(2));
        add_neigh(&mut sw, vrid, "10.0.10.2", rif10, 2);
        add_neigh(&mut sw, vrid, "10.0.10.3", rif10, 3);
        add_neigh(&mut sw, vrid, "10.0.20.2", rif20, 4);
        add_neigh(&mut sw, vrid, "2001:db8::2", rif20, 5);

        let first = sw.router_neigh_get(GetCmd::GetFirst, vrid, None, 2).unwrap();
        assert_eq!(
            first.iter().map(|n| n.ip).collect::<Vec<_>>(),
            vec![ip("10.0.10.2"), ip("10.0.10.3")]
        );
        let rest = sw
            .router_neigh_get(GetCmd::GetNext, vrid, Some(&first[1].ip), 10)
            .unwrap();
        assert_eq!(
            rest.iter().map(|n| n.ip).collect::<Vec<_>>(),
            vec![ip("10.0.20.2"), ip("2001:db8::2")]
        );

        let selector = NeighData {
            rif: rif10,
            mac: MacAddress::ZERO,
            action: RouterAction::Drop,
        };
        sw.router_neigh_set(AccessCmd::DeleteAll, vrid, None, Some(&selector))
            .unwrap();
        let left = sw.router_neigh_get(GetCmd::GetFirst, vrid, None, 10).unwrap();
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|n| n.data.rif == rif20));
    }

    #[test]
    fn test_route_resolution_follows_neighbors() {
        let (mut sw, vrid, rif10, _) = setup(SwitchConfig::with_ports(2));
        let dst = prefix("192.168.0.0/16");
        sw.router_uc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&dst),
            Some(&UcRouteData::next_hops([ip("10.0.10.2")])),
        )
        .unwrap();

        let route = &sw
            .router_uc_route_get(GetCmd::Get, vrid, Some(&dst), 1)
            .unwrap()[0];
        assert_eq!(route.effective_action, RouterAction::Trap);
        assert_eq!(
            sw.route_lookup(vrid, &ip("192.168.1.1"), &flow(1)).unwrap(),
            RouteDecision::Trap { prefix: Some(dst) }
        );

        add_neigh(&mut sw, vrid, "10.0.10.2", rif10, 2);
        assert_eq!(
            sw.route_lookup(vrid, &ip("192.168.1.1"), &flow(1)).unwrap(),
            RouteDecision::Forward {
                prefix: dst,
                rif: rif10,
                next_hop: ip("10.0.10.2"),
                mac: host_mac(2),
            }
        );

        sw.router_neigh_set(AccessCmd::Delete, vrid, Some(&ip("10.0.10.2")), None)
            .unwrap();
        let route = &sw
            .router_uc_route_get(GetCmd::Get, vrid, Some(&dst), 1)
            .unwrap()[0];
        assert_eq!(route.effective_action, RouterAction::Trap);
        assert!(route.resolved.is_empty());
    }

    #[test]
    fn test_ecmp_spreads_flows() {
        let (mut sw, vrid, rif10, rif20) = setup(SwitchConfig::with_ports(2));
        add_neigh(&mut sw, vrid, "10.0.10.2", rif10, 2);
        add_neigh(&mut sw, vrid, "10.0.20.2", rif20, 3);
        let dst = prefix("0.0.0.0/0");
        sw.router_uc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&dst),
            Some(&UcRouteData::next_hops([ip("10.0.10.2"), ip("10.0.20.2")])),
        )
        .unwrap();

        let hops: HashSet<IpAddress> = (0..64)
            .map(|p| match sw.route_lookup(vrid, &ip("8.8.8.8"), &flow(p)).unwrap() {
                RouteDecision::Forward { next_hop, .. } => next_hop,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(hops.len(), 2);

        // Same flow, same member.
        let a = sw.route_lookup(vrid, &ip("8.8.8.8"), &flow(7)).unwrap();
        let b = sw.route_lookup(vrid, &ip("8.8.8.8"), &flow(7)).unwrap();
        assert_eq!(a, b);

        // Without L4 fields in the hash, port changes stay on one member.
        sw.router_ecmp_hash_params_set(EcmpHashParams {
            fields: HashFieldSet::L3,
            ..EcmpHashParams::default()
        })
        .unwrap();
        let hops: HashSet<IpAddress> = (0..64)
            .map(|p| match sw.route_lookup(vrid, &ip("8.8.8.8"), &flow(p)).unwrap() {
                RouteDecision::Forward { next_hop, .. } => next_hop,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(hops.len(), 1);
        assert_eq!(
            sw.router_ecmp_hash_params_set(EcmpHashParams {
                fields: HashFieldSet::empty(),
                ..EcmpHashParams::default()
            })
            .unwrap_err()
            .status(),
            OesStatus::ParamError
        );
    }

    #[test]
    fn test_longest_prefix_and_default_action() {
        let (mut sw, vrid, rif10, rif20) = setup(SwitchConfig::with_ports(2));
        add_neigh(&mut sw, vrid, "10.0.10.2", rif10, 2);
        add_neigh(&mut sw, vrid, "10.0.20.2", rif20, 3);
        sw.router_uc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&prefix("10.1.0.0/16")),
            Some(&UcRouteData::next_hops([ip("10.0.10.2")])),
        )
        .unwrap();
        sw.router_uc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&prefix("10.1.2.0/24")),
            Some(&UcRouteData::next_hops([ip("10.0.20.2")])),
        )
        .unwrap();
        sw.router_uc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&prefix("10.1.3.0/24")),
            Some(&UcRouteData::action(RouterAction::Drop)),
        )
        .unwrap();

        let via = |sw: &mut Switch, dst: &str| match sw.route_lookup(vrid, &ip(dst), &flow(1)).unwrap() {
            RouteDecision::Forward { rif, .. } => Some(rif),
            _ => None,
        };
        assert_eq!(via(&mut sw, "10.1.2.9"), Some(rif20));
        assert_eq!(via(&mut sw, "10.1.9.9"), Some(rif10));
        assert_eq!(
            sw.route_lookup(vrid, &ip("10.1.3.1"), &flow(1)).unwrap(),
            RouteDecision::Drop {
                prefix: Some(prefix("10.1.3.0/24"))
            }
        );
        assert_eq!(
            sw.route_lookup(vrid, &ip("172.31.0.1"), &flow(1)).unwrap(),
            RouteDecision::Drop { prefix: None }
        );

        let trap = RouterAttributes {
            uc_default_action: RouterAction::Trap,
            ..RouterAttributes::default()
        };
        sw.router_set(AccessCmd::Edit, Some(&trap), Some(vrid)).unwrap();
        assert_eq!(
            sw.route_lookup(vrid, &ip("172.31.0.1"), &flow(1)).unwrap(),
            RouteDecision::Trap { prefix: None }
        );
    }

    #[test]
    fn test_direct_route_and_interface_state() {
        let (mut sw, vrid, rif10, _) = setup(SwitchConfig::with_ports(2));
        let subnet = prefix("10.0.10.0/24");
        sw.router_uc_route_set(AccessCmd::Add, vrid, Some(&subnet), Some(&UcRouteData::direct(rif10)))
            .unwrap();
        assert_eq!(
            sw.route_lookup(vrid, &ip("10.0.10.5"), &flow(1)).unwrap(),
            RouteDecision::Trap {
                prefix: Some(subnet)
            }
        );

        add_neigh(&mut sw, vrid, "10.0.10.5", rif10, 5);
        sw.router_interface_cntr_set(AccessCmd::Add, vrid, rif10).unwrap();
        assert!(matches!(
            sw.route_lookup(vrid, &ip("10.0.10.5"), &flow(1)).unwrap(),
            RouteDecision::Forward { .. }
        ));

        sw.router_interface_state_set(
            vrid,
            rif10,
            RifState {
                ipv4: AdminState::Down,
                ipv6: AdminState::Up,
            },
        )
        .unwrap();
        assert_eq!(
            sw.route_lookup(vrid, &ip("10.0.10.5"), &flow(1)).unwrap(),
            RouteDecision::Drop {
                prefix: Some(subnet)
            }
        );

        let counters = sw
            .router_interface_cntr_get(CounterCmd::ReadClear, vrid, rif10)
            .unwrap();
        assert_eq!((counters.egress_packets, counters.egress_discards), (1, 1));
        let counters = sw
            .router_interface_cntr_get(CounterCmd::Read, vrid, rif10)
            .unwrap();
        assert_eq!(counters.egress_packets, 0);

        // The route references the interface.
        sw.router_neigh_set(AccessCmd::DeleteAll, vrid, None, None)
            .unwrap();
        assert_eq!(
            sw.router_interface_set(AccessCmd::Delete, vrid, None, None, Some(rif10))
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );
        sw.router_uc_route_set(AccessCmd::Delete, vrid, Some(&subnet), None)
            .unwrap();
        sw.router_interface_set(AccessCmd::Delete, vrid, None, None, Some(rif10))
            .unwrap();
    }

    #[test]
    fn test_direct_route_needs_neighbor_on_its_rif() {
        let (mut sw, vrid, rif10, rif20) = setup(SwitchConfig::with_ports(2));
        let subnet = prefix("10.0.1.0/24");
        sw.router_uc_route_set(AccessCmd::Add, vrid, Some(&subnet), Some(&UcRouteData::direct(rif10)))
            .unwrap();
        add_neigh(&mut sw, vrid, "10.0.1.5", rif20, 5);

        assert_eq!(
            sw.route_lookup(vrid, &ip("10.0.1.5"), &flow(1)).unwrap(),
            RouteDecision::Trap {
                prefix: Some(subnet)
            }
        );
        let route = sw
            .router_uc_route_get(GetCmd::Get, vrid, Some(&subnet), 1)
            .unwrap();
        assert_eq!(route[0].effective_action, RouterAction::Forward);

        // Moving the neighbor onto the route's interface resolves it.
        let data = NeighData {
            rif: rif10,
            mac: host_mac(5),
            action: RouterAction::Forward,
        };
        sw.router_neigh_set(AccessCmd::Edit, vrid, Some(&ip("10.0.1.5")), Some(&data))
            .unwrap();
        let RouteDecision::Forward { rif, mac, .. } =
            sw.route_lookup(vrid, &ip("10.0.1.5"), &flow(1)).unwrap()
        else {
            panic!("direct route did not forward");
        };
        assert_eq!((rif, mac), (rif10, host_mac(5)));
    }

    #[test]
    fn test_neighbor_activity() {
        let (mut sw, vrid, rif10, _) = setup(SwitchConfig::with_ports(2));
        add_neigh(&mut sw, vrid, "10.0.10.2", rif10, 2);
        sw.router_uc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&prefix("10.9.0.0/16")),
            Some(&UcRouteData::next_hops([ip("10.0.10.2")])),
        )
        .unwrap();
        let key = ip("10.0.10.2");

        assert!(!sw.router_neigh_get(GetCmd::Get, vrid, Some(&key), 1).unwrap()[0].active);
        sw.route_lookup(vrid, &ip("10.9.1.1"), &flow(1)).unwrap();
        assert!(sw.router_neigh_get(GetCmd::GetActivity, vrid, Some(&key), 1).unwrap()[0].active);
        assert!(!sw.router_neigh_get(GetCmd::GetActivity, vrid, Some(&key), 1).unwrap()[0].active);
        assert_eq!(
            sw.router_neigh_get(GetCmd::GetActivity, vrid, None, 1)
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );
    }

    #[test]
    fn test_route_validation() {
        let config = SwitchConfig {
            max_ecmp_paths: 2,
            ..SwitchConfig::with_ports(2)
        };
        let (mut sw, vrid, rif10, _) = setup(config);
        let check = |sw: &mut Switch, p: &str, data: UcRouteData| {
            sw.router_uc_route_set(AccessCmd::Add, vrid, Some(&prefix(p)), Some(&data))
                .unwrap_err()
                .status()
        };

        assert_eq!(check(&mut sw, "10.1.1.1/24", UcRouteData::direct(rif10)), OesStatus::ParamError);
        assert_eq!(
            check(&mut sw, "10.1.0.0/16", UcRouteData::action(RouterAction::Forward)),
            OesStatus::ParamError
        );
        assert_eq!(
            check(
                &mut sw,
                "10.1.0.0/16",
                UcRouteData::next_hops([ip("10.0.0.1"), ip("10.0.0.2"), ip("10.0.0.3")])
            ),
            OesStatus::ParamExceedsRange
        );
        assert_eq!(
            check(&mut sw, "10.1.0.0/16", UcRouteData::next_hops([ip("2001:db8::1")])),
            OesStatus::ParamError
        );
        assert_eq!(
            check(&mut sw, "10.1.0.0/16", UcRouteData::next_hops([ip("10.0.0.1"), ip("10.0.0.1")])),
            OesStatus::ParamError
        );
        assert_eq!(check(&mut sw, "10.1.0.0/16", UcRouteData::direct(42)), OesStatus::EntryNotFound);

        let v4_only = RouterAttributes {
            ipv6_enable: false,
            ..RouterAttributes::default()
        };
        sw.router_set(AccessCmd::Edit, Some(&v4_only), Some(vrid)).unwrap();
        assert_eq!(
            check(&mut sw, "2001:db8::/32", UcRouteData::action(RouterAction::Drop)),
            OesStatus::ParamError
        );
    }

    #[test]
    fn test_route_replace_and_walk() {
        let (mut sw, vrid, rif10, rif20) = setup(SwitchConfig::with_ports(2));
        for p in ["10.2.0.0/16", "10.1.0.0/16", "10.1.0.0/24"] {
            sw.router_uc_route_set(AccessCmd::Add, vrid, Some(&prefix(p)), Some(&UcRouteData::direct(rif10)))
                .unwrap();
        }
        sw.router_uc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&prefix("10.1.0.0/24")),
            Some(&UcRouteData::direct(rif20)),
        )
        .unwrap();

        let all = sw.router_uc_route_get(GetCmd::GetFirst, vrid, None, 10).unwrap();
        assert_eq!(
            all.iter().map(|r| r.prefix.to_string()).collect::<Vec<_>>(),
            vec!["10.1.0.0/16", "10.1.0.0/24", "10.2.0.0/16"]
        );
        assert_eq!(all[1].data.rif, Some(rif20));
        let next = sw
            .router_uc_route_get(GetCmd::GetNext, vrid, Some(&prefix("10.1.0.0/24")), 10)
            .unwrap();
        assert_eq!(next.len(), 1);

        // rif10 dropped one reference on replace; removing the rest frees it.
        sw.router_uc_route_set(AccessCmd::DeleteAll, vrid, None, None)
            .unwrap();
        sw.router_interface_set(AccessCmd::Delete, vrid, None, None, Some(rif10))
            .unwrap();
        sw.router_interface_set(AccessCmd::Delete, vrid, None, None, Some(rif20))
            .unwrap();
    }

    #[test]
    fn test_mc_routes() {
        let (mut sw, vrid, rif10, rif20) = setup(SwitchConfig::with_ports(2));
        let group = ip("239.1.1.1");
        let any = McRouteKey {
            group,
            source: None,
            ingress_rif: rif10,
        };
        let sg = McRouteKey {
            source: Some(ip("10.0.10.7")),
            ..any
        };
        sw.router_mc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&any),
            Some(&McRouteData {
                action: RouterAction::Forward,
                egress_rifs: BTreeSet::from([rif20]),
            }),
        )
        .unwrap();
        sw.router_mc_route_set(
            AccessCmd::Add,
            vrid,
            Some(&sg),
            Some(&McRouteData {
                action: RouterAction::Trap,
                ..McRouteData::default()
            }),
        )
        .unwrap();

        assert_eq!(
            sw.mc_route_lookup(vrid, rif10, &ip("10.0.10.7"), &group).unwrap(),
            McDecision::Trap { key: sg }
        );
        assert_eq!(
            sw.mc_route_lookup(vrid, rif10, &ip("10.0.10.8"), &group).unwrap(),
            McDecision::Forward {
                key: any,
                egress_rifs: vec![rif20]
            }
        );
        assert_eq!(
            sw.mc_route_lookup(vrid, rif20, &ip("10.0.10.8"), &group).unwrap(),
            McDecision::Drop
        );
        assert!(sw.router_mc_route_get(GetCmd::GetActivity, vrid, Some(&any), 1).unwrap()[0].active);

        assert_eq!(
            sw.router_mc_egress_rif_set(AccessCmd::Add, vrid, &any, &[rif20])
                .unwrap_err()
                .status(),
            OesStatus::EntryAlreadyExists
        );
        sw.router_mc_egress_rif_set(AccessCmd::Delete, vrid, &any, &[rif20])
            .unwrap();
        assert!(sw.router_mc_egress_rif_get(vrid, &any).unwrap().is_empty());
        sw.router_mc_egress_rif_set(AccessCmd::Add, vrid, &sg, &[rif20])
            .unwrap();
        assert_eq!(sw.router_mc_egress_rif_get(vrid, &sg).unwrap(), vec![rif20]);

        assert_eq!(
            sw.router_interface_set(AccessCmd::Delete, vrid, None, None, Some(rif20))
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );
        sw.router_mc_route_set(AccessCmd::DeleteAll, vrid, None, None)
            .unwrap();
        sw.router_interface_set(AccessCmd::DeleteAll, vrid, None, None, None)
            .unwrap();

        let not_group = McRouteKey {
            group: ip("10.0.0.1"),
            ..any
        };
        assert_eq!(
            sw.router_mc_route_set(AccessCmd::Add, vrid, Some(&not_group), Some(&McRouteData::default()))
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );
    }
}
