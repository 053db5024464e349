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

//! # ISIS
//!
//! Adjacency negotiation and route propagation for ISIS. Each side of a link contributes the set of
//! levels it is willing to form an adjacency on: its process level, intersected with the levels for
//! which the interface has non-passive settings. The circuit type of the adjacency is the
//! intersection of both sets, further restricted to level 2 if the two nodes are in different
//! areas. No adjacency is formed if the result is empty or if both nodes share the same system id.
//!
//! Level-1 routes are propagated over adjacencies including level 1, level-2 routes over
//! adjacencies including level 2. Level-1-2 routers leak their level-1 routes into level 2.

use super::config::Configuration;
use super::redistribution::{redistributed_routes, Redistribution, RedistributionSource};
use super::rib::Rib;
use super::route::{Route, RoutingProtocol};
use super::router::RouterContext;
use super::topology::{Layer3Topology, Topology};
use super::types::NodeInterfacePair;

use log::*;
use std::collections::BTreeMap;
use std::fmt;

/// Default metric of an interface level
pub static DEFAULT_ISIS_METRIC: u32 = 10;

/// ISIS level (or set of levels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IsisLevel {
    /// Level 1 only
    Level1,
    /// Level 2 only
    Level2,
    /// Both levels
    Level12,
}

impl IsisLevel {
    fn from_flags(level1: bool, level2: bool) -> Option<Self> {
        match (level1, level2) {
            (true, true) => Some(Self::Level12),
            (true, false) => Some(Self::Level1),
            (false, true) => Some(Self::Level2),
            (false, false) => None,
        }
    }

    /// Returns `true` if the set contains level 1
    pub fn includes_level1(&self) -> bool {
        matches!(self, Self::Level1 | Self::Level12)
    }

    /// Returns `true` if the set contains level 2
    pub fn includes_level2(&self) -> bool {
        matches!(self, Self::Level2 | Self::Level12)
    }

    /// Union of two level sets, where `None` is the empty set. `Level12` is absorbing.
    pub fn union(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        let l1 = a.map(|l| l.includes_level1()).unwrap_or(false)
            || b.map(|l| l.includes_level1()).unwrap_or(false);
        let l2 = a.map(|l| l.includes_level2()).unwrap_or(false)
            || b.map(|l| l.includes_level2()).unwrap_or(false);
        Self::from_flags(l1, l2)
    }

    /// Intersection of two level sets, where `None` is the empty set. `Level12` is the identity.
    pub fn intersection(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Self::from_flags(
                a.includes_level1() && b.includes_level1(),
                a.includes_level2() && b.includes_level2(),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for IsisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level1 => write!(f, "L1"),
            Self::Level2 => write!(f, "L2"),
            Self::Level12 => write!(f, "L1L2"),
        }
    }
}

/// System id of an ISIS router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub [u8; 6]);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(f, "{:02x}{:02x}.{:02x}{:02x}.{:02x}{:02x}", b[0], b[1], b[2], b[3], b[4], b[5])
    }
}

/// Area address of an ISIS router
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AreaAddr(pub Vec<u8>);

impl fmt::Display for AreaAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// ISIS process of a VRF
#[derive(Debug, Clone, PartialEq)]
pub struct IsisProcess {
    /// System id
    pub system_id: SystemId,
    /// Area
    pub area: AreaAddr,
    /// Levels the process participates in
    pub level: IsisLevel,
    /// Administrative distance of ISIS routes
    pub admin_distance: u8,
    /// Routes redistributed into ISIS
    pub redistribute: Vec<Redistribution>,
}

impl IsisProcess {
    /// Create a new process with the default administrative distance
    pub fn new(system_id: SystemId, area: AreaAddr, level: IsisLevel) -> Self {
        Self {
            system_id,
            area,
            level,
            admin_distance: RoutingProtocol::IsisL1.default_admin_distance(),
            redistribute: Vec::new(),
        }
    }
}

/// Settings of one level of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IsisInterfaceLevelSettings {
    /// Metric of the level
    pub metric: u32,
    /// A passive interface advertises its subnet, but forms no adjacency
    pub passive: bool,
}

impl Default for IsisInterfaceLevelSettings {
    fn default() -> Self {
        Self { metric: DEFAULT_ISIS_METRIC, passive: false }
    }
}

/// ISIS settings of an interface. A level is enabled on the interface if it has settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IsisInterfaceSettings {
    /// Level 1 settings
    pub level1: Option<IsisInterfaceLevelSettings>,
    /// Level 2 settings
    pub level2: Option<IsisInterfaceLevelSettings>,
}

impl IsisInterfaceSettings {
    /// Both levels enabled with default settings
    pub fn level12() -> Self {
        Self { level1: Some(Default::default()), level2: Some(Default::default()) }
    }

    /// Only level 1 enabled with default settings
    pub fn level1() -> Self {
        Self { level1: Some(Default::default()), level2: None }
    }

    /// Only level 2 enabled with default settings
    pub fn level2() -> Self {
        Self { level1: None, level2: Some(Default::default()) }
    }

    /// Levels for which the interface has settings
    pub fn configured_levels(&self) -> Option<IsisLevel> {
        IsisLevel::from_flags(self.level1.is_some(), self.level2.is_some())
    }

    /// Levels for which the interface has non-passive settings
    pub fn adjacency_levels(&self) -> Option<IsisLevel> {
        IsisLevel::from_flags(
            self.level1.map(|s| !s.passive).unwrap_or(false),
            self.level2.map(|s| !s.passive).unwrap_or(false),
        )
    }

    /// Metric of a level (`Level12` is treated as level 2)
    pub fn metric(&self, level: IsisLevel) -> u32 {
        let settings = match level {
            IsisLevel::Level1 => self.level1,
            IsisLevel::Level2 | IsisLevel::Level12 => self.level2,
        };
        settings.map(|s| s.metric).unwrap_or(DEFAULT_ISIS_METRIC)
    }
}

/// One side of a candidate ISIS adjacency
#[derive(Debug, Clone, Copy)]
pub struct IsisEndpoint<'a> {
    /// Process of the node
    pub process: &'a IsisProcess,
    /// Settings of the interface
    pub settings: &'a IsisInterfaceSettings,
}

impl<'a> IsisEndpoint<'a> {
    /// Levels this side is willing to form an adjacency on
    pub fn enabled_levels(&self) -> Option<IsisLevel> {
        IsisLevel::intersection(Some(self.process.level), self.settings.adjacency_levels())
    }
}

/// Negotiate the circuit type between two endpoints. Returns `None` if no adjacency is formed.
pub fn circuit_type(a: &IsisEndpoint, b: &IsisEndpoint) -> Option<IsisLevel> {
    if a.process.system_id == b.process.system_id {
        return None;
    }
    let level = IsisLevel::intersection(a.enabled_levels(), b.enabled_levels());
    if a.process.area == b.process.area {
        level
    } else {
        IsisLevel::intersection(level, Some(IsisLevel::Level2))
    }
}

fn endpoint<'a>(
    configs: &'a BTreeMap<String, Configuration>,
    nip: &NodeInterfacePair,
) -> Option<IsisEndpoint<'a>> {
    let config = configs.get(&nip.hostname)?;
    let iface = config.interface(&nip.interface)?;
    let settings = iface.isis.as_ref()?;
    let process = config.vrf(&iface.vrf)?.isis.as_ref()?;
    Some(IsisEndpoint { process, settings })
}

/// Build the ISIS topology out of the layer-3 topology. Edge properties are the circuit type.
pub fn isis_topology(
    configs: &BTreeMap<String, Configuration>,
    layer3: &Layer3Topology,
) -> Topology<NodeInterfacePair, IsisLevel> {
    let mut topo = Topology::new();
    for (edge, _) in layer3.edges() {
        let (a, b) = match (endpoint(configs, &edge.tail), endpoint(configs, &edge.head)) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        match circuit_type(&a, &b) {
            Some(level) => topo.add_edge(edge.tail, edge.head, level),
            None => trace!("no ISIS adjacency between {} and {}", edge.tail, edge.head),
        }
    }
    debug!("ISIS topology has {} edges", topo.num_edges());
    topo
}

/// ISIS state of a virtual router after one round
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct IsisRibs {
    pub level1: Rib,
    pub level2: Rib,
    pub external: Vec<Route>,
}

fn level_protocol(level: IsisLevel) -> RoutingProtocol {
    match level {
        IsisLevel::Level1 => RoutingProtocol::IsisL1,
        _ => RoutingProtocol::IsisL2,
    }
}

/// Compute the ISIS RIBs of a virtual router for the next round.
pub(crate) fn compute(ctx: &RouterContext) -> IsisRibs {
    let process = match ctx.vrf.isis.as_ref() {
        Some(p) => p,
        None => return IsisRibs::default(),
    };
    let mut level1 = Rib::new(ctx.vrf.multipath);
    let mut level2 = Rib::new(ctx.vrf.multipath);
    let new_route = |prefix, level, metric: u64, next_hop| {
        Route::new(prefix, level_protocol(level), metric, next_hop)
            .with_admin_distance(process.admin_distance)
    };

    for iface in ctx.interfaces() {
        let settings = match iface.isis.as_ref() {
            Some(s) => s,
            None => continue,
        };
        let enabled = IsisLevel::intersection(Some(process.level), settings.configured_levels());

        // originate the subnet of the interface
        if let (Some(subnet), Some(enabled)) = (iface.subnet(), enabled) {
            let next_hop = super::route::NextHop::Interface(iface.name.clone());
            if enabled.includes_level1() {
                let metric = settings.metric(IsisLevel::Level1) as u64;
                level1.merge(new_route(subnet, IsisLevel::Level1, metric, next_hop.clone()));
            }
            if enabled.includes_level2() {
                let metric = settings.metric(IsisLevel::Level2) as u64;
                level2.merge(new_route(subnet, IsisLevel::Level2, metric, next_hop));
            }
        }

        // receive routes from all adjacencies of this interface
        let nip = NodeInterfacePair::new(ctx.hostname, &iface.name);
        for (tail, circuit) in ctx.topologies().isis.in_edges(&nip) {
            let neighbor = match ctx.neighbor(tail) {
                Some(n) => n,
                None => continue,
            };
            let next_hop = neighbor.next_hop_from(iface);
            let neighbor_level = neighbor.vrf.isis.as_ref().map(|p| p.level);
            let external = |protocol: RoutingProtocol| {
                neighbor.state.isis.external.iter().filter(move |r| r.protocol == protocol)
            };
            if circuit.includes_level1() {
                let cost = settings.metric(IsisLevel::Level1) as u64;
                let received = neighbor
                    .state
                    .isis
                    .level1
                    .routes()
                    .chain(external(RoutingProtocol::IsisL1));
                for r in received {
                    let metric = r.metric + cost;
                    level1.merge(new_route(r.prefix, IsisLevel::Level1, metric, next_hop.clone()));
                }
            }
            if circuit.includes_level2() {
                let cost = settings.metric(IsisLevel::Level2) as u64;
                let leaked = if neighbor_level == Some(IsisLevel::Level12) {
                    Some(neighbor.state.isis.level1.routes())
                } else {
                    None
                };
                let received = neighbor
                    .state
                    .isis
                    .level2
                    .routes()
                    .chain(external(RoutingProtocol::IsisL2))
                    .chain(leaked.into_iter().flatten());
                for r in received {
                    let metric = r.metric + cost;
                    level2.merge(new_route(r.prefix, IsisLevel::Level2, metric, next_hop.clone()));
                }
            }
        }
    }

    // routes redistributed into ISIS are only advertised to the neighbors
    let external_level =
        if process.level.includes_level2() { IsisLevel::Level2 } else { IsisLevel::Level1 };
    let external = redistributed_routes(ctx, &process.redistribute, RedistributionSource::Isis, 0)
        .into_iter()
        .map(|r| {
            let mut route = new_route(r.prefix, external_level, r.metric, r.next_hop);
            route.tag = r.tag;
            route
        })
        .collect();

    IsisRibs { level1, level2, external }
}
