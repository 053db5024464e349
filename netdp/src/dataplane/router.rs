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

//! # Virtual Router
//!
//! State of a single VRF of a node: one RIB per protocol and the main RIB. A [`VirtualRouter`] is
//! never changed during a round. Every round computes a fresh [`VirtualRouter`] out of the state of
//! the previous round (see [`VirtualRouter::step`]).

use super::bgp;
use super::connected::{connected_routes, static_routes};
use super::config::{Configuration, Interface, Vrf};
use super::eigrp::{self, EigrpRibs};
use super::isis::{self, IsisRibs};
use super::network::ProtocolTopologies;
use super::ospf::{self, OspfRibs};
use super::rib::Rib;
use super::route::{NextHop, Route, RoutingProtocol};
use super::types::{NodeInterfacePair, VrfId};

use std::collections::BTreeMap;

/// Routing state of a VRF of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualRouter {
    pub(crate) connected: Rib,
    pub(crate) static_rib: Rib,
    pub(crate) ospf: OspfRibs,
    pub(crate) isis: IsisRibs,
    pub(crate) eigrp: EigrpRibs,
    pub(crate) bgp: Rib,
    pub(crate) main: Rib,
}

impl VirtualRouter {
    /// Create the initial state of the VRF, containing the connected, local and static routes.
    pub fn new(config: &Configuration, vrf: &Vrf) -> Self {
        let connected = connected_routes(config, vrf);
        let static_rib = static_routes(config, vrf);

        let mut main = Rib::new(vrf.multipath);
        main.merge_all(connected.routes().cloned());
        main.merge_all(static_rib.routes().cloned());

        Self {
            connected,
            static_rib,
            ospf: OspfRibs::default(),
            isis: IsisRibs::default(),
            eigrp: EigrpRibs::default(),
            bgp: Rib::new(false),
            main,
        }
    }

    /// Compute the state after the next round. Only the state of the previous round is read.
    pub(crate) fn step(&self, ctx: &RouterContext) -> Self {
        let ospf = ospf::compute(ctx);
        let isis = isis::compute(ctx);
        let eigrp = eigrp::compute(ctx);
        let bgp = bgp::compute(ctx);

        let mut main = Rib::new(ctx.vrf.multipath);
        main.merge_all(self.connected.routes().cloned());
        main.merge_all(self.static_rib.routes().cloned());
        main.merge_all(ospf.rib.routes().cloned());
        main.merge_all(isis.level1.routes().cloned());
        main.merge_all(isis.level2.routes().cloned());
        main.merge_all(eigrp.rib.routes().cloned());
        let learned = |r: &&Route| r.bgp().map(|a| !a.is_local()).unwrap_or(false);
        main.merge_all(bgp.routes().filter(learned).cloned());

        Self {
            connected: self.connected.clone(),
            static_rib: self.static_rib.clone(),
            ospf,
            isis,
            eigrp,
            bgp,
            main,
        }
    }

    /// Connected and local routes
    pub fn connected_rib(&self) -> &Rib {
        &self.connected
    }

    /// Static routes
    pub fn static_rib(&self) -> &Rib {
        &self.static_rib
    }

    /// OSPF routes (intra-area, inter-area and external routes learned from neighbors)
    pub fn ospf_rib(&self) -> &Rib {
        &self.ospf.rib
    }

    /// ISIS level-1 routes
    pub fn isis_l1_rib(&self) -> &Rib {
        &self.isis.level1
    }

    /// ISIS level-2 routes
    pub fn isis_l2_rib(&self) -> &Rib {
        &self.isis.level2
    }

    /// EIGRP routes
    pub fn eigrp_rib(&self) -> &Rib {
        &self.eigrp.rib
    }

    /// BGP routes, including the locally originated ones
    pub fn bgp_rib(&self) -> &Rib {
        &self.bgp
    }

    /// Main RIB
    pub fn main_rib(&self) -> &Rib {
        &self.main
    }

    /// Routes redistributed into a protocol by this router, which are only advertised to its
    /// neighbors.
    pub fn redistributed_routes(&self, protocol: RoutingProtocol) -> Vec<&Route> {
        let routes: Box<dyn Iterator<Item = &Route>> = if protocol.is_ospf() {
            Box::new(self.ospf.external.iter())
        } else if protocol.is_isis() {
            Box::new(self.isis.external.iter())
        } else if protocol.is_eigrp() {
            Box::new(self.eigrp.external.iter())
        } else if protocol.is_bgp() {
            Box::new(self.bgp.routes().filter(|r| r.bgp().map(|a| a.is_local()).unwrap_or(false)))
        } else {
            Box::new(std::iter::empty())
        };
        routes.collect()
    }
}

/// Frozen state of the previous round, shared by all workers of the current round.
pub(crate) struct RoundState<'a> {
    pub configs: &'a BTreeMap<String, Configuration>,
    pub routers: &'a BTreeMap<VrfId, VirtualRouter>,
    pub topologies: &'a ProtocolTopologies,
}

impl<'a> RoundState<'a> {
    /// State of a virtual router in the previous round
    pub fn router(&self, hostname: &str, vrf: &str) -> Option<&'a VirtualRouter> {
        self.routers.get(&(hostname.to_string(), vrf.to_string()))
    }
}

/// Everything a protocol needs to compute the next state of a single virtual router.
pub(crate) struct RouterContext<'a> {
    pub hostname: &'a str,
    pub config: &'a Configuration,
    pub vrf: &'a Vrf,
    pub state: &'a VirtualRouter,
    pub round: &'a RoundState<'a>,
}

impl<'a> RouterContext<'a> {
    /// Active interfaces in the VRF of this router
    pub fn interfaces(&self) -> impl Iterator<Item = &'a Interface> + 'a {
        self.config.interfaces_in_vrf(&self.vrf.name).filter(|i| i.active)
    }

    /// Realized protocol topologies
    pub fn topologies(&self) -> &'a ProtocolTopologies {
        self.round.topologies
    }

    /// The neighbor at the other end of an adjacency, with its state of the previous round.
    pub fn neighbor(&self, nip: &NodeInterfacePair) -> Option<Neighbor<'a>> {
        let config = self.round.configs.get(&nip.hostname)?;
        let interface = config.interface(&nip.interface)?;
        let vrf = config.vrf(&interface.vrf)?;
        let state = self.round.router(&nip.hostname, &vrf.name)?;
        Some(Neighbor { config, interface, vrf, state })
    }
}

/// Neighbor of an IGP adjacency
pub(crate) struct Neighbor<'a> {
    pub config: &'a Configuration,
    pub interface: &'a Interface,
    pub vrf: &'a Vrf,
    pub state: &'a VirtualRouter,
}

impl<'a> Neighbor<'a> {
    /// Next hop of routes learned from this neighbor over the local interface `iface`
    pub fn next_hop_from(&self, iface: &Interface) -> NextHop {
        match self.interface.ip() {
            Some(ip) => NextHop::InterfaceIp(iface.name.clone(), ip),
            None => NextHop::Interface(iface.name.clone()),
        }
    }
}
