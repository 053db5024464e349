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

//! # OSPF
//!
//! OSPF adjacencies are formed between non-passive interfaces in the same area. Routes are
//! propagated between neighbors, accumulating the cost of the receiving interface:
//!
//! - intra-area routes are flooded within their area,
//! - area border routers (attached to the backbone and to at least one other area) summarize
//!   intra-area routes into all other attached areas, and inter-area routes of the backbone into
//!   non-backbone areas,
//! - external routes (type 1 and type 2) are flooded everywhere. Type 1 routes accumulate the cost,
//!   type 2 routes keep their metric and only track the cost towards the advertising router.

use super::config::{Configuration, Interface};
use super::redistribution::{redistributed_routes, Redistribution, RedistributionSource};
use super::rib::Rib;
use super::route::{NextHop, Route, RouteAttributes, RoutingProtocol};
use super::router::RouterContext;
use super::topology::{Layer3Topology, Topology};
use super::types::NodeInterfacePair;

use log::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

/// Reference bandwidth used to derive interface costs (100 Mbps)
pub static DEFAULT_REFERENCE_BANDWIDTH: u64 = 100_000_000;

/// Metric of redistributed routes, if not configured otherwise
pub static DEFAULT_EXTERNAL_METRIC: u64 = 20;

/// OSPF Area number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OspfArea(pub u32);

impl OspfArea {
    /// The backbone area (area 0)
    pub const BACKBONE: OspfArea = OspfArea(0);

    /// Returns `true` for the backbone area
    pub fn is_backbone(&self) -> bool {
        *self == Self::BACKBONE
    }
}

impl fmt::Display for OspfArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_backbone() {
            write!(f, "Backbone")
        } else {
            write!(f, "Area {}", self.0)
        }
    }
}

/// Type of routes redistributed into OSPF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OspfExternalType {
    /// The metric accumulates the internal cost
    E1,
    /// The metric stays constant
    E2,
}

/// OSPF process of a VRF
#[derive(Debug, Clone, PartialEq)]
pub struct OspfProcess {
    /// Router id, adjacencies are only formed between different router ids
    pub router_id: Ipv4Addr,
    /// Reference bandwidth in bits per second
    pub reference_bandwidth: u64,
    /// Administrative distance of OSPF routes
    pub admin_distance: u8,
    /// Type of redistributed routes
    pub external_type: OspfExternalType,
    /// Routes redistributed into OSPF
    pub redistribute: Vec<Redistribution>,
}

impl OspfProcess {
    /// Create a new process with default settings
    pub fn new(router_id: Ipv4Addr) -> Self {
        Self {
            router_id,
            reference_bandwidth: DEFAULT_REFERENCE_BANDWIDTH,
            admin_distance: RoutingProtocol::Ospf.default_admin_distance(),
            external_type: OspfExternalType::E2,
            redistribute: Vec::new(),
        }
    }

    /// Cost of an interface: the configured cost, or the reference bandwidth divided by the
    /// interface bandwidth (at least 1).
    pub fn interface_cost(&self, iface: &Interface) -> u64 {
        match iface.ospf.as_ref().and_then(|s| s.cost) {
            Some(cost) => cost as u64,
            None => (self.reference_bandwidth / iface.bandwidth.max(1)).max(1),
        }
    }
}

/// OSPF settings of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OspfInterfaceSettings {
    /// Area of the interface
    pub area: OspfArea,
    /// Configured cost
    pub cost: Option<u32>,
    /// A passive interface advertises its subnet, but forms no adjacency
    pub passive: bool,
}

impl OspfInterfaceSettings {
    /// Active interface in the area, with cost derived from the bandwidth
    pub fn new(area: OspfArea) -> Self {
        Self { area, cost: None, passive: false }
    }

    /// Set the cost
    pub fn cost(mut self, cost: u32) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Make the interface passive
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }
}

/// OSPF attributes of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OspfAttributes {
    /// Area the route was learned in
    pub area: OspfArea,
    /// Cost towards the router that advertised an external route
    pub cost_to_advertiser: u64,
}

fn ospf_endpoint<'a>(
    configs: &'a BTreeMap<String, Configuration>,
    nip: &NodeInterfacePair,
) -> Option<(&'a OspfProcess, &'a OspfInterfaceSettings)> {
    let config = configs.get(&nip.hostname)?;
    let iface = config.interface(&nip.interface)?;
    let settings = iface.ospf.as_ref()?;
    let process = config.vrf(&iface.vrf)?.ospf.as_ref()?;
    Some((process, settings))
}

/// Build the OSPF topology out of the layer-3 topology. Edge properties are the area.
pub fn ospf_topology(
    configs: &BTreeMap<String, Configuration>,
    layer3: &Layer3Topology,
) -> Topology<NodeInterfacePair, OspfArea> {
    let mut topo = Topology::new();
    for (edge, _) in layer3.edges() {
        let endpoints = (ospf_endpoint(configs, &edge.tail), ospf_endpoint(configs, &edge.head));
        let (a, b) = match endpoints {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        if a.1.passive || b.1.passive || a.1.area != b.1.area || a.0.router_id == b.0.router_id {
            trace!("no OSPF adjacency between {} and {}", edge.tail, edge.head);
            continue;
        }
        topo.add_edge(edge.tail, edge.head, a.1.area);
    }
    debug!("OSPF topology has {} edges", topo.num_edges());
    topo
}

/// Returns `true` if the VRF of the node is an area border router: attached to the backbone and to
/// at least one other area with active interfaces.
pub fn is_abr(config: &Configuration, vrf: &str) -> bool {
    let areas: BTreeSet<OspfArea> = config
        .interfaces_in_vrf(vrf)
        .filter(|i| i.active)
        .filter_map(|i| i.ospf.as_ref().map(|s| s.area))
        .collect();
    areas.len() >= 2 && areas.contains(&OspfArea::BACKBONE)
}

/// OSPF state of a virtual router after one round
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct OspfRibs {
    pub rib: Rib,
    pub external: Vec<Route>,
}

fn ospf_route(
    process: &OspfProcess,
    route: &Route,
    protocol: RoutingProtocol,
    metric: u64,
    attrs: OspfAttributes,
    next_hop: NextHop,
) -> Route {
    let mut new = Route::new(route.prefix, protocol, metric, next_hop)
        .with_admin_distance(process.admin_distance)
        .with_attributes(RouteAttributes::Ospf(attrs));
    new.tag = route.tag;
    new
}

/// Compute the OSPF RIB of a virtual router for the next round.
pub(crate) fn compute(ctx: &RouterContext) -> OspfRibs {
    let process = match ctx.vrf.ospf.as_ref() {
        Some(p) => p,
        None => return OspfRibs::default(),
    };
    let mut rib = Rib::new(ctx.vrf.multipath);

    for iface in ctx.interfaces() {
        let settings = match iface.ospf.as_ref() {
            Some(s) => s,
            None => continue,
        };
        let cost = process.interface_cost(iface);

        // intra-area route for the subnet of the interface
        if let Some(subnet) = iface.subnet() {
            let next_hop = NextHop::Interface(iface.name.clone());
            let route = Route::new(subnet, RoutingProtocol::Ospf, cost, next_hop)
                .with_admin_distance(process.admin_distance)
                .with_attributes(RouteAttributes::Ospf(OspfAttributes {
                    area: settings.area,
                    cost_to_advertiser: 0,
                }));
            rib.merge(route);
        }

        let nip = NodeInterfacePair::new(ctx.hostname, &iface.name);
        for (tail, area) in ctx.topologies().ospf.in_edges(&nip) {
            let neighbor = match ctx.neighbor(tail) {
                Some(n) => n,
                None => continue,
            };
            let next_hop = neighbor.next_hop_from(iface);
            let neighbor_abr = is_abr(neighbor.config, &neighbor.vrf.name);
            let advertised =
                neighbor.state.ospf.rib.routes().chain(neighbor.state.ospf.external.iter());
            for r in advertised {
                let attrs = match r.ospf() {
                    Some(a) => *a,
                    None => continue,
                };
                let own = |protocol, metric, cost_to_advertiser| {
                    ospf_route(
                        process,
                        r,
                        protocol,
                        metric,
                        OspfAttributes { area: *area, cost_to_advertiser },
                        next_hop.clone(),
                    )
                };
                let candidate = match r.protocol {
                    RoutingProtocol::Ospf if attrs.area == *area => {
                        Some(own(RoutingProtocol::Ospf, r.metric + cost, 0))
                    }
                    RoutingProtocol::Ospf if neighbor_abr => {
                        Some(own(RoutingProtocol::OspfIa, r.metric + cost, 0))
                    }
                    RoutingProtocol::OspfIa if attrs.area == *area => {
                        Some(own(RoutingProtocol::OspfIa, r.metric + cost, 0))
                    }
                    RoutingProtocol::OspfIa
                        if neighbor_abr && attrs.area.is_backbone() && !area.is_backbone() =>
                    {
                        Some(own(RoutingProtocol::OspfIa, r.metric + cost, 0))
                    }
                    RoutingProtocol::OspfE1 => {
                        let to_advertiser = attrs.cost_to_advertiser + cost;
                        Some(own(RoutingProtocol::OspfE1, r.metric + cost, to_advertiser))
                    }
                    RoutingProtocol::OspfE2 => {
                        let to_advertiser = attrs.cost_to_advertiser + cost;
                        Some(own(RoutingProtocol::OspfE2, r.metric, to_advertiser))
                    }
                    _ => None,
                };
                if let Some(candidate) = candidate {
                    rib.merge(candidate);
                }
            }
        }
    }

    // routes redistributed into OSPF are only advertised to the neighbors
    let protocol = match process.external_type {
        OspfExternalType::E1 => RoutingProtocol::OspfE1,
        OspfExternalType::E2 => RoutingProtocol::OspfE2,
    };
    let external = redistributed_routes(
        ctx,
        &process.redistribute,
        RedistributionSource::Ospf,
        DEFAULT_EXTERNAL_METRIC,
    )
    .into_iter()
    .map(|r| {
        let metric = r.metric;
        let next_hop = r.next_hop.clone();
        ospf_route(
            process,
            &r,
            protocol,
            metric,
            OspfAttributes { area: OspfArea::BACKBONE, cost_to_advertiser: 0 },
            next_hop,
        )
    })
    .collect();

    OspfRibs { rib, external }
}
