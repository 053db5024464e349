// NetDP: Data Plane Computation for Network Configurations
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # BGP
//!
//! Session establishment, the BGP decision process, and route exchange between BGP speakers.
//!
//! A session is formed between two peer configurations if each side names the address of the
//! other side as its peer, and both sides expect the AS number the other side is configured with.
//! Routes are exported according to the iBGP split horizon and route reflection rules, transformed
//! (AS path prepending and next hop rewrite on eBGP sessions, originator id and cluster list when
//! reflecting), and filtered by the export policy of the sender. The receiver drops routes with its
//! own AS in the path, its own router id as originator, or its own cluster id in the cluster list,
//! applies its import policy, and only accepts routes whose next hop resolves in its main RIB of
//! the previous round.

use super::config::Configuration;
use super::preference::RoutePreference;
use super::redistribution::{redistributed_routes, Redistribution, RedistributionSource};
use super::rib::Rib;
use super::route::{NextHop, Route, RouteAttributes, RoutingProtocol};
use super::route_map::apply_policy;
use super::router::RouterContext;
use super::topology::{IpOwners, Topology};
use super::types::{AsId, Prefix};

use log::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Local preference of routes that do not carry one
pub static DEFAULT_LOCAL_PREF: u32 = 100;

/// Type of a BGP session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BgpSessionType {
    /// iBGP session with a peer (or from a client with a Route Reflector)
    IBgpPeer,
    /// iBGP session from a Route Reflector with a client
    IBgpClient,
    /// eBGP session
    EBgp,
}

impl BgpSessionType {
    /// returns true if the session type is EBgp
    pub fn is_ebgp(&self) -> bool {
        matches!(self, Self::EBgp)
    }

    /// returns true if the session type is IBgp
    pub fn is_ibgp(&self) -> bool {
        !self.is_ebgp()
    }
}

/// Origin attribute, lower is preferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    /// Originated with a network statement
    Igp,
    /// Learned from EGP
    Egp,
    /// Redistributed
    Incomplete,
}

/// BGP path attributes of a route. Once a route is advertised, its attributes are shared and never
/// changed in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BgpAttributes {
    /// AS-PATH, where the origin of the route is last, and the ID of a new AS is prepended.
    pub as_path: Vec<AsId>,
    /// LOCAL-PREF
    pub local_pref: u32,
    /// MED (Multi-Exit Discriminator)
    pub med: u32,
    /// ORIGIN
    pub origin: Origin,
    /// Communities
    pub communities: BTreeSet<u32>,
    /// Router id of the router which advertised the route into the AS (set when reflecting)
    pub originator_id: Option<Ipv4Addr>,
    /// Cluster ids of all route reflectors which reflected the route
    pub cluster_list: Vec<Ipv4Addr>,
    /// Address of the neighbor the route was received from (`None` for local routes)
    pub received_from: Option<Ipv4Addr>,
    /// Router id of the neighbor the route was received from
    pub received_from_router_id: Option<Ipv4Addr>,
    /// Session the route was received on, from the point of view of the receiver
    pub session_type: Option<BgpSessionType>,
    /// Cost of the route towards the next hop
    pub igp_cost: u64,
}

impl BgpAttributes {
    /// Attributes of a locally originated route
    pub fn local(origin: Origin, med: u32) -> Self {
        Self {
            as_path: Vec::new(),
            local_pref: DEFAULT_LOCAL_PREF,
            med,
            origin,
            communities: BTreeSet::new(),
            originator_id: None,
            cluster_list: Vec::new(),
            received_from: None,
            received_from_router_id: None,
            session_type: None,
            igp_cost: 0,
        }
    }

    /// Returns `true` if the route was originated by this router
    pub fn is_local(&self) -> bool {
        self.received_from.is_none()
    }
}

impl RoutePreference for BgpAttributes {
    fn compare_preference(&self, other: &Self) -> Ordering {
        match self.local_pref.cmp(&other.local_pref) {
            Ordering::Equal => {}
            o => return o,
        }

        match (self.is_local(), other.is_local()) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }

        match self.as_path.len().cmp(&other.as_path.len()) {
            Ordering::Equal => {}
            o => return o.reverse(),
        }

        match self.origin.cmp(&other.origin) {
            Ordering::Equal => {}
            o => return o.reverse(),
        }

        match self.med.cmp(&other.med) {
            Ordering::Equal => {}
            o => return o.reverse(),
        }

        let self_ebgp = self.session_type.map(|t| t.is_ebgp()).unwrap_or(false);
        let other_ebgp = other.session_type.map(|t| t.is_ebgp()).unwrap_or(false);
        match (self_ebgp, other_ebgp) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }

        self.igp_cost.cmp(&other.igp_cost).reverse()
    }
}

/// Configuration of a BGP neighbor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BgpPeerConfig {
    /// Address of the neighbor
    pub peer_address: Ipv4Addr,
    /// Local address of the session. If absent, the address of the interface whose subnet
    /// contains the peer address is used.
    pub local_address: Option<Ipv4Addr>,
    /// AS number of the neighbor
    pub remote_as: AsId,
    /// The neighbor is a route reflector client
    pub route_reflector_client: bool,
    /// Rewrite the next hop to the local address on iBGP sessions
    pub next_hop_self: bool,
    /// Policy applied to received routes
    pub import_policy: Option<String>,
    /// Policy applied to advertised routes
    pub export_policy: Option<String>,
}

impl BgpPeerConfig {
    /// Create a new neighbor without policies
    pub fn new(peer_address: Ipv4Addr, remote_as: AsId) -> Self {
        Self {
            peer_address,
            local_address: None,
            remote_as,
            route_reflector_client: false,
            next_hop_self: false,
            import_policy: None,
            export_policy: None,
        }
    }

    /// Set the local address of the session
    pub fn local_address(mut self, address: Ipv4Addr) -> Self {
        self.local_address = Some(address);
        self
    }

    /// Mark the neighbor as route reflector client
    pub fn route_reflector_client(mut self) -> Self {
        self.route_reflector_client = true;
        self
    }

    /// Enable next-hop-self
    pub fn next_hop_self(mut self) -> Self {
        self.next_hop_self = true;
        self
    }

    /// Set the import policy
    pub fn import_policy<S: Into<String>>(mut self, policy: S) -> Self {
        self.import_policy = Some(policy.into());
        self
    }

    /// Set the export policy
    pub fn export_policy<S: Into<String>>(mut self, policy: S) -> Self {
        self.export_policy = Some(policy.into());
        self
    }
}

/// BGP process of a VRF
#[derive(Debug, Clone, PartialEq)]
pub struct BgpProcess {
    /// Router id
    pub router_id: Ipv4Addr,
    /// Local AS number
    pub local_as: AsId,
    /// Cluster id used when reflecting routes (defaults to the router id)
    pub cluster_id: Option<Ipv4Addr>,
    /// Neighbors
    pub neighbors: Vec<BgpPeerConfig>,
    /// Prefixes originated with network statements
    pub networks: Vec<Prefix>,
    /// Routes redistributed into BGP
    pub redistribute: Vec<Redistribution>,
    /// Keep all equally preferred paths
    pub multipath: bool,
    /// Administrative distance of eBGP routes
    pub ebgp_admin_distance: u8,
    /// Administrative distance of iBGP and local routes
    pub ibgp_admin_distance: u8,
}

impl BgpProcess {
    /// Create a new process without neighbors
    pub fn new(router_id: Ipv4Addr, local_as: AsId) -> Self {
        Self {
            router_id,
            local_as,
            cluster_id: None,
            neighbors: Vec::new(),
            networks: Vec::new(),
            redistribute: Vec::new(),
            multipath: false,
            ebgp_admin_distance: RoutingProtocol::Bgp.default_admin_distance(),
            ibgp_admin_distance: RoutingProtocol::Ibgp.default_admin_distance(),
        }
    }

    /// Add a neighbor
    pub fn add_neighbor(&mut self, neighbor: BgpPeerConfig) -> &mut Self {
        self.neighbors.push(neighbor);
        self
    }

    /// Add a network statement
    pub fn add_network(&mut self, prefix: Prefix) -> &mut Self {
        self.networks.push(prefix.trunc());
        self
    }

    /// Configuration of the neighbor with the given address
    pub fn neighbor(&self, peer_address: Ipv4Addr) -> Option<&BgpPeerConfig> {
        self.neighbors.iter().find(|n| n.peer_address == peer_address)
    }

    /// Cluster id used when reflecting routes
    pub fn cluster_id(&self) -> Ipv4Addr {
        self.cluster_id.unwrap_or(self.router_id)
    }
}

/// Endpoint of a BGP session: the peer configuration `peer_address` in the VRF of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BgpPeerId {
    /// Hostname of the node
    pub hostname: String,
    /// VRF of the BGP process
    pub vrf: String,
    /// Address of the neighbor, as configured on this node
    pub peer_address: Ipv4Addr,
}

impl BgpPeerId {
    /// Create a new peer id
    pub fn new<S1, S2>(hostname: S1, vrf: S2, peer_address: Ipv4Addr) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self { hostname: hostname.into(), vrf: vrf.into(), peer_address }
    }
}

impl fmt::Display for BgpPeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}", self.hostname, self.vrf, self.peer_address)
    }
}

/// Properties of a directed BGP session edge, from the sender to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BgpSession {
    /// Address of the sender
    pub sender_ip: Ipv4Addr,
    /// Address of the receiver
    pub receiver_ip: Ipv4Addr,
    /// Type of the session, from the point of view of the receiver
    pub session_type: BgpSessionType,
}

fn session_local_address(
    config: &Configuration,
    vrf: &str,
    peer: &BgpPeerConfig,
) -> Option<Ipv4Addr> {
    if let Some(addr) = peer.local_address {
        return Some(addr);
    }
    config
        .interfaces_in_vrf(vrf)
        .filter_map(|i| i.active_address())
        .find(|a| a.contains(&peer.peer_address) && a.addr() != peer.peer_address)
        .map(|a| a.addr())
}

/// Build the BGP session topology. An edge from `a` to `b` means that `a` advertises routes to
/// `b`; every established session results in one edge in each direction.
pub fn bgp_topology(
    configs: &BTreeMap<String, Configuration>,
    owners: &IpOwners,
) -> Topology<BgpPeerId, BgpSession> {
    let mut topo = Topology::new();
    for (hostname, config) in configs.iter() {
        for (vrf_name, vrf) in config.vrfs.iter() {
            let process = match vrf.bgp.as_ref() {
                Some(p) => p,
                None => continue,
            };
            for peer in process.neighbors.iter() {
                let local_ip = match session_local_address(config, vrf_name, peer) {
                    Some(ip) => ip,
                    None => {
                        debug!("{}: no local address for neighbor {}", hostname, peer.peer_address);
                        continue;
                    }
                };
                for (owner, owner_vrf) in owners.owners(&peer.peer_address) {
                    if owner.hostname == *hostname {
                        continue;
                    }
                    let remote_config = match configs.get(&owner.hostname) {
                        Some(c) => c,
                        None => continue,
                    };
                    let remote_vrf = remote_config.vrf(owner_vrf);
                    let remote_process = match remote_vrf.and_then(|v| v.bgp.as_ref()) {
                        Some(p) => p,
                        None => continue,
                    };
                    let remote_peer = match remote_process.neighbor(local_ip) {
                        Some(p) => p,
                        None => continue,
                    };
                    if peer.remote_as != remote_process.local_as
                        || remote_peer.remote_as != process.local_as
                        || session_local_address(remote_config, owner_vrf, remote_peer)
                            != Some(peer.peer_address)
                    {
                        debug!("{}: incompatible session with {}", hostname, peer.peer_address);
                        continue;
                    }
                    let session_type = if process.local_as != remote_process.local_as {
                        BgpSessionType::EBgp
                    } else if peer.route_reflector_client {
                        BgpSessionType::IBgpClient
                    } else {
                        BgpSessionType::IBgpPeer
                    };
                    topo.add_edge(
                        BgpPeerId::new(&owner.hostname, owner_vrf, local_ip),
                        BgpPeerId::new(hostname, vrf_name, peer.peer_address),
                        BgpSession {
                            sender_ip: peer.peer_address,
                            receiver_ip: local_ip,
                            session_type,
                        },
                    );
                }
            }
        }
    }
    debug!("BGP topology has {} edges", topo.num_edges());
    topo
}

/// Returns `true` if a route learned over a session of type `from` (or originated locally if
/// `None`) may be advertised to a neighbor.
fn should_export_route(from: Option<BgpSessionType>, to_ebgp: bool, to_client: bool) -> bool {
    match from {
        None | Some(BgpSessionType::EBgp) | Some(BgpSessionType::IBgpClient) => true,
        Some(BgpSessionType::IBgpPeer) => to_ebgp || to_client,
    }
}

/// Transform a route of the sender for the advertisement to `peer`, and apply the export policy.
fn export(
    config: &Configuration,
    process: &BgpProcess,
    peer: &BgpPeerConfig,
    session: &BgpSession,
    route: &Route,
) -> Option<Route> {
    let attrs = route.bgp()?;
    let to_ebgp = session.session_type.is_ebgp();
    if !should_export_route(attrs.session_type, to_ebgp, peer.route_reflector_client) {
        return None;
    }
    if attrs.received_from == Some(peer.peer_address) {
        return None;
    }

    let mut new = attrs.clone();
    let mut next_hop = route.next_hop.clone();
    if to_ebgp {
        new.as_path.insert(0, process.local_as);
        new.local_pref = DEFAULT_LOCAL_PREF;
        if !attrs.is_local() {
            new.med = 0;
        }
        new.originator_id = None;
        new.cluster_list.clear();
        next_hop = NextHop::Ip(session.sender_ip);
    } else {
        if attrs.session_type.map(|t| t.is_ibgp()).unwrap_or(false) {
            // reflected route
            new.originator_id = attrs.originator_id.or(attrs.received_from_router_id);
            new.cluster_list.insert(0, process.cluster_id());
        }
        if attrs.is_local() || peer.next_hop_self {
            next_hop = NextHop::Ip(session.sender_ip);
        }
    }

    let advertised = Route {
        next_hop,
        metric: new.med as u64,
        attributes: RouteAttributes::Bgp(Arc::new(new)),
        ..route.clone()
    };
    apply_policy(&config.route_policies, peer.export_policy.as_deref(), advertised)
}

/// Cost towards the next hop, or `None` if the next hop does not resolve in the RIB.
fn resolve_next_hop(rib: &Rib, next_hop: Ipv4Addr) -> Option<u64> {
    rib.longest_prefix_match(next_hop, |r| !r.non_forwarding && !r.protocol.is_bgp())
        .map(|(_, routes)| routes.iter().map(|r| r.metric).min().unwrap_or(0))
}

/// Accept a route advertised by a neighbor: loop checks, import policy and next hop resolution.
fn import(
    ctx: &RouterContext,
    process: &BgpProcess,
    peer: &BgpPeerConfig,
    session: &BgpSession,
    sender_router_id: Ipv4Addr,
    route: Route,
) -> Option<Route> {
    let attrs = route.bgp()?;
    if attrs.as_path.contains(&process.local_as)
        || attrs.originator_id == Some(process.router_id)
        || attrs.cluster_list.contains(&process.cluster_id())
    {
        return None;
    }

    let mut new = attrs.clone();
    new.received_from = Some(session.sender_ip);
    new.received_from_router_id = Some(sender_router_id);
    new.session_type = Some(session.session_type);
    let (protocol, admin_distance) = if session.session_type.is_ebgp() {
        (RoutingProtocol::Bgp, process.ebgp_admin_distance)
    } else {
        (RoutingProtocol::Ibgp, process.ibgp_admin_distance)
    };
    let received = Route {
        protocol,
        admin_distance,
        attributes: RouteAttributes::Bgp(Arc::new(new)),
        ..route
    };
    let mut accepted =
        apply_policy(&ctx.config.route_policies, peer.import_policy.as_deref(), received)?;

    let next_hop = accepted.next_hop.ip()?;
    let igp_cost = match resolve_next_hop(&ctx.state.main, next_hop) {
        Some(c) => c,
        None => {
            trace!("{}: unresolvable next hop {} of {}", ctx.hostname, next_hop, accepted.prefix);
            return None;
        }
    };
    if let RouteAttributes::Bgp(a) = &mut accepted.attributes {
        Arc::make_mut(a).igp_cost = igp_cost;
    }
    Some(accepted)
}

fn local_route(
    process: &BgpProcess,
    prefix: Prefix,
    origin: Origin,
    med: u32,
    tag: Option<u32>,
) -> Route {
    let next_hop = NextHop::Ip(Ipv4Addr::UNSPECIFIED);
    let mut route = Route::new(prefix, RoutingProtocol::Ibgp, med as u64, next_hop)
        .with_admin_distance(process.ibgp_admin_distance)
        .with_attributes(RouteAttributes::Bgp(Arc::new(BgpAttributes::local(origin, med))));
    route.tag = tag;
    route
}

/// Compute the BGP RIB of a virtual router for the next round.
pub(crate) fn compute(ctx: &RouterContext) -> Rib {
    let process = match ctx.vrf.bgp.as_ref() {
        Some(p) => p,
        None => return Rib::new(false),
    };
    let mut rib = Rib::new(process.multipath);

    // network statements require an exact match of a non-BGP route
    for prefix in process.networks.iter() {
        let exists = ctx
            .state
            .main
            .get(prefix)
            .map(|routes| routes.iter().any(|r| !r.protocol.is_bgp()))
            .unwrap_or(false);
        if exists {
            rib.merge(local_route(process, *prefix, Origin::Igp, 0, None));
        }
    }
    for r in redistributed_routes(ctx, &process.redistribute, RedistributionSource::Bgp, 0) {
        let med = r.metric.min(u32::MAX as u64) as u32;
        rib.merge(local_route(process, r.prefix, Origin::Incomplete, med, r.tag));
    }

    for peer in process.neighbors.iter() {
        let me = BgpPeerId::new(ctx.hostname, &ctx.vrf.name, peer.peer_address);
        for (sender, session) in ctx.topologies().bgp.in_edges(&me) {
            let (sender_config, sender_state) = match (
                ctx.round.configs.get(&sender.hostname),
                ctx.round.router(&sender.hostname, &sender.vrf),
            ) {
                (Some(c), Some(s)) => (c, s),
                _ => continue,
            };
            let sender_vrf = sender_config.vrf(&sender.vrf);
            let sender_process = match sender_vrf.and_then(|v| v.bgp.as_ref()) {
                Some(p) => p,
                None => continue,
            };
            let sender_peer = match sender_process.neighbor(sender.peer_address) {
                Some(p) => p,
                None => continue,
            };
            for route in sender_state.bgp.best_routes() {
                let advertised =
                    match export(sender_config, sender_process, sender_peer, session, route) {
                        Some(r) => r,
                        None => continue,
                    };
                let sender_id = sender_process.router_id;
                if let Some(r) = import(ctx, process, peer, session, sender_id, advertised) {
                    rib.merge(r);
                }
            }
        }
    }
    rib
}
