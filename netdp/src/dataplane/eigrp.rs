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

//! # EIGRP
//!
//! EIGRP routes carry a metric vector (minimum bandwidth, cumulative delay, reliability and load).
//! Every hop folds the receiving interface into the vector, and the composite cost is computed out
//! of the vector with the K-values of the process. Classic and wide metrics only differ in their
//! scaling.

use super::config::{Configuration, Interface};
use super::redistribution::{redistributed_routes, Redistribution, RedistributionSource};
use super::rib::Rib;
use super::route::{NextHop, Route, RouteAttributes, RoutingProtocol};
use super::router::RouterContext;
use super::topology::{Layer3Topology, Topology};
use super::types::NodeInterfacePair;

use log::*;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Scaling factor of wide metrics
const WIDE_SCALE: u64 = 65536;
/// Factor between the wide composite cost and the metric installed in the RIB
const WIDE_RIB_SCALE: u64 = 128;

/// Metric version of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EigrpMetricVersion {
    /// 32-bit metric, delay in tens of microseconds
    Classic,
    /// 64-bit metric, delay in picoseconds
    Wide,
}

/// K-values weighting the metric components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EigrpKValues {
    /// Bandwidth
    pub k1: u64,
    /// Load
    pub k2: u64,
    /// Delay
    pub k3: u64,
    /// Reliability (additive)
    pub k4: u64,
    /// Reliability (multiplicative)
    pub k5: u64,
}

impl Default for EigrpKValues {
    fn default() -> Self {
        Self { k1: 1, k2: 0, k3: 1, k4: 0, k5: 0 }
    }
}

/// Metric vector of an EIGRP route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EigrpMetric {
    /// Minimum bandwidth along the path in kbps
    pub bandwidth_kbps: u64,
    /// Cumulative delay in picoseconds
    pub delay_ps: u64,
    /// Reliability (255 is 100%)
    pub reliability: u8,
    /// Load (1 is minimal)
    pub load: u8,
}

impl EigrpMetric {
    /// Metric vector of a single interface
    pub fn of_interface(iface: &Interface) -> Self {
        Self {
            bandwidth_kbps: (iface.bandwidth / 1000).max(1),
            delay_ps: iface.delay(),
            reliability: 255,
            load: 1,
        }
    }

    /// Metric vector after traversing the interface
    pub fn fold(&self, iface: &Interface) -> Self {
        let hop = Self::of_interface(iface);
        Self {
            bandwidth_kbps: self.bandwidth_kbps.min(hop.bandwidth_kbps),
            delay_ps: self.delay_ps.saturating_add(hop.delay_ps),
            reliability: self.reliability.min(hop.reliability),
            load: self.load.max(hop.load),
        }
    }

    /// Composite cost: `(k1 * bw + k2 * bw / (256 - load) + k3 * delay) * scale`, multiplied with
    /// `k5 / (reliability + k4)` if `k5` is not zero.
    pub fn cost(&self, version: EigrpMetricVersion, k: &EigrpKValues) -> u64 {
        let bandwidth_kbps = self.bandwidth_kbps.max(1);
        let (bw, delay, scale) = match version {
            EigrpMetricVersion::Classic => {
                (10_000_000 / bandwidth_kbps, self.delay_ps / 10_000_000, 256)
            }
            EigrpMetricVersion::Wide => (
                WIDE_SCALE * 10_000_000 / bandwidth_kbps,
                WIDE_SCALE.saturating_mul(self.delay_ps) / 1_000_000,
                1,
            ),
        };
        let load_divisor = 256 - (self.load as u64).min(255);
        let mut cost = k.k1 * bw + k.k2 * bw / load_divisor + k.k3.saturating_mul(delay);
        if k.k5 != 0 {
            cost = cost * k.k5 / (self.reliability as u64 + k.k4);
        }
        cost.saturating_mul(scale)
    }

    /// Metric installed into the RIB. For wide metrics, this is the composite cost divided by the
    /// RIB scale.
    pub fn rib_metric(&self, version: EigrpMetricVersion, k: &EigrpKValues) -> u64 {
        match version {
            EigrpMetricVersion::Classic => self.cost(version, k),
            EigrpMetricVersion::Wide => self.cost(version, k) / WIDE_RIB_SCALE,
        }
    }
}

/// EIGRP process of a VRF
#[derive(Debug, Clone, PartialEq)]
pub struct EigrpProcess {
    /// Autonomous system number
    pub asn: u32,
    /// Router id
    pub router_id: Ipv4Addr,
    /// Metric version
    pub version: EigrpMetricVersion,
    /// K-values
    pub k_values: EigrpKValues,
    /// Administrative distance of internal routes
    pub internal_admin_distance: u8,
    /// Administrative distance of external routes
    pub external_admin_distance: u8,
    /// Routes redistributed into EIGRP
    pub redistribute: Vec<Redistribution>,
}

impl EigrpProcess {
    /// Create a new process with default K-values and distances
    pub fn new(asn: u32, router_id: Ipv4Addr, version: EigrpMetricVersion) -> Self {
        Self {
            asn,
            router_id,
            version,
            k_values: EigrpKValues::default(),
            internal_admin_distance: RoutingProtocol::EigrpInternal.default_admin_distance(),
            external_admin_distance: RoutingProtocol::EigrpExternal.default_admin_distance(),
            redistribute: Vec::new(),
        }
    }

    fn route(
        &self,
        prefix: ipnet::Ipv4Net,
        protocol: RoutingProtocol,
        metric: EigrpMetric,
        next_hop: NextHop,
    ) -> Route {
        let admin_distance = match protocol {
            RoutingProtocol::EigrpExternal => self.external_admin_distance,
            _ => self.internal_admin_distance,
        };
        Route::new(prefix, protocol, metric.rib_metric(self.version, &self.k_values), next_hop)
            .with_admin_distance(admin_distance)
            .with_attributes(RouteAttributes::Eigrp(metric))
    }
}

/// EIGRP settings of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EigrpInterfaceSettings {
    /// Autonomous system the interface belongs to
    pub asn: u32,
    /// A passive interface advertises its subnet, but forms no adjacency
    pub passive: bool,
}

impl EigrpInterfaceSettings {
    /// Active interface in the autonomous system
    pub fn new(asn: u32) -> Self {
        Self { asn, passive: false }
    }
}

fn eigrp_endpoint<'a>(
    configs: &'a BTreeMap<String, Configuration>,
    nip: &NodeInterfacePair,
) -> Option<(&'a EigrpProcess, &'a EigrpInterfaceSettings)> {
    let config = configs.get(&nip.hostname)?;
    let iface = config.interface(&nip.interface)?;
    let settings = iface.eigrp.as_ref()?;
    let process = config.vrf(&iface.vrf)?.eigrp.as_ref()?;
    if process.asn != settings.asn {
        return None;
    }
    Some((process, settings))
}

/// Build the EIGRP topology out of the layer-3 topology. Edge properties are the AS number.
/// Adjacencies require the same AS number and the same K-values on both sides.
pub fn eigrp_topology(
    configs: &BTreeMap<String, Configuration>,
    layer3: &Layer3Topology,
) -> Topology<NodeInterfacePair, u32> {
    let mut topo = Topology::new();
    for (edge, _) in layer3.edges() {
        let endpoints = (eigrp_endpoint(configs, &edge.tail), eigrp_endpoint(configs, &edge.head));
        let (a, b) = match endpoints {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        if a.1.passive || b.1.passive || a.0.asn != b.0.asn || a.0.k_values != b.0.k_values {
            trace!("no EIGRP adjacency between {} and {}", edge.tail, edge.head);
            continue;
        }
        topo.add_edge(edge.tail, edge.head, a.0.asn);
    }
    debug!("EIGRP topology has {} edges", topo.num_edges());
    topo
}

/// EIGRP state of a virtual router after one round
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct EigrpRibs {
    pub rib: Rib,
    pub external: Vec<Route>,
}

/// Compute the EIGRP RIB of a virtual router for the next round.
pub(crate) fn compute(ctx: &RouterContext) -> EigrpRibs {
    let process = match ctx.vrf.eigrp.as_ref() {
        Some(p) => p,
        None => return EigrpRibs::default(),
    };
    let mut rib = Rib::new(ctx.vrf.multipath);

    for iface in ctx.interfaces() {
        match iface.eigrp.as_ref() {
            Some(s) if s.asn == process.asn => {}
            _ => continue,
        }

        if let Some(subnet) = iface.subnet() {
            rib.merge(process.route(
                subnet,
                RoutingProtocol::EigrpInternal,
                EigrpMetric::of_interface(iface),
                NextHop::Interface(iface.name.clone()),
            ));
        }

        let nip = NodeInterfacePair::new(ctx.hostname, &iface.name);
        for (tail, _) in ctx.topologies().eigrp.in_edges(&nip) {
            let neighbor = match ctx.neighbor(tail) {
                Some(n) => n,
                None => continue,
            };
            let next_hop = neighbor.next_hop_from(iface);
            let advertised =
                neighbor.state.eigrp.rib.routes().chain(neighbor.state.eigrp.external.iter());
            for r in advertised {
                if let Some(metric) = r.eigrp() {
                    let metric = metric.fold(iface);
                    let mut route = process.route(r.prefix, r.protocol, metric, next_hop.clone());
                    route.tag = r.tag;
                    rib.merge(route);
                }
            }
        }
    }

    // redistributed routes start with the metric of a 1 Gbps link without delay
    let seed = EigrpMetric { bandwidth_kbps: 1_000_000, delay_ps: 0, reliability: 255, load: 1 };
    let external = redistributed_routes(ctx, &process.redistribute, RedistributionSource::Eigrp, 0)
        .into_iter()
        .map(|r| {
            let mut route =
                process.route(r.prefix, RoutingProtocol::EigrpExternal, seed, r.next_hop);
            route.tag = r.tag;
            route
        })
        .collect();

    EigrpRibs { rib, external }
}
