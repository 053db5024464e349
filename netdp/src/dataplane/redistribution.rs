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

//! # Redistribution
//!
//! Routes of the main RIB of the previous round are re-announced into another protocol. Every
//! redistribution statement names the source protocol and an optional routing policy.

use super::route::{Route, RoutingProtocol};
use super::route_map::apply_policy;
use super::router::RouterContext;

use log::*;

/// Source of redistributed routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RedistributionSource {
    /// Connected routes (not local routes)
    Connected,
    /// Static routes
    Static,
    /// All OSPF route types
    Ospf,
    /// Both ISIS levels
    Isis,
    /// Internal and external EIGRP routes
    Eigrp,
    /// eBGP and iBGP routes
    Bgp,
}

impl RedistributionSource {
    /// Returns `true` if routes of the protocol are redistributed by this source
    pub fn matches(&self, protocol: RoutingProtocol) -> bool {
        match self {
            Self::Connected => protocol == RoutingProtocol::Connected,
            Self::Static => protocol == RoutingProtocol::Static,
            Self::Ospf => protocol.is_ospf(),
            Self::Isis => protocol.is_isis(),
            Self::Eigrp => protocol.is_eigrp(),
            Self::Bgp => protocol.is_bgp(),
        }
    }
}

/// Redistribution statement of a routing process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Redistribution {
    /// Protocol whose routes are redistributed
    pub source: RedistributionSource,
    /// Name of the routing policy applied to the routes
    pub policy: Option<String>,
    /// Seed metric of the redistributed routes. The policy can still overwrite it.
    pub metric: Option<u64>,
}

impl Redistribution {
    /// Redistribute all routes of the source
    pub fn new(source: RedistributionSource) -> Self {
        Self { source, policy: None, metric: None }
    }

    /// Apply the policy to redistributed routes
    pub fn policy<S: Into<String>>(mut self, policy: S) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// Set the seed metric
    pub fn metric(mut self, metric: u64) -> Self {
        self.metric = Some(metric);
        self
    }
}

/// Collect the routes redistributed into the `target` protocol out of the main RIB of the
/// previous round. Every returned route keeps the prefix, next hop and tag of the original route;
/// its metric is the seed metric (`default_metric` if not configured), possibly changed by the
/// policy. Routes of the target protocol itself are never redistributed.
pub(crate) fn redistributed_routes(
    ctx: &RouterContext,
    redistribute: &[Redistribution],
    target: RedistributionSource,
    default_metric: u64,
) -> Vec<Route> {
    let mut result = Vec::new();
    for redist in redistribute.iter() {
        if redist.source == target {
            continue;
        }
        for route in ctx.state.main.best_routes() {
            let matched = redist.source.matches(route.protocol)
                || is_host_interface(ctx, redist.source, route);
            if !matched {
                continue;
            }
            let mut seeded = route.clone();
            seeded.metric = redist.metric.unwrap_or(default_metric);
            if let Some(r) =
                apply_policy(&ctx.config.route_policies, redist.policy.as_deref(), seeded)
            {
                trace!("{} redistributes {} into {:?}", ctx.hostname, r.prefix, target);
                result.push(r);
            }
        }
    }
    result
}

/// Local routes of /32 interfaces stand in for their connected route.
fn is_host_interface(ctx: &RouterContext, source: RedistributionSource, route: &Route) -> bool {
    source == RedistributionSource::Connected
        && route.protocol == RoutingProtocol::Local
        && route
            .next_hop
            .interface()
            .and_then(|i| ctx.config.interface(i))
            .and_then(|i| i.address)
            .map(|a| a.prefix_len() == 32)
            .unwrap_or(false)
}
