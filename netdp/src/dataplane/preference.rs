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

//! # Route Preference
//!
//! Routes are compared in three stages:
//!
//! 1. administrative distance, lower is preferred (except between two BGP routes),
//! 2. a protocol specific comparison ([`RoutePreference`]),
//! 3. a deterministic tie-break ([`compare_tie_break`]), which is only used to pick a single route
//!    when multipath is disabled.
//!
//! Routes that are equal in the first two stages are equally preferred, and are all kept by a
//! multipath RIB.

use super::route::{Route, RouteAttributes, RoutingProtocol};

use std::cmp::Ordering;

/// Preference order. `Ordering::Greater` means that `self` is preferred over `other`.
pub trait RoutePreference {
    /// Compare `self` to `other`. Returns `Greater` if `self` is more preferred.
    fn compare_preference(&self, other: &Self) -> Ordering;
}

impl RoutePreference for Route {
    fn compare_preference(&self, other: &Self) -> Ordering {
        // BGP routes among themselves follow the decision process only, the distance of eBGP and
        // iBGP routes matters only towards other protocols.
        if let RouteAttributes::Bgp(a) = &self.attributes {
            if let RouteAttributes::Bgp(b) = &other.attributes {
                return a.compare_preference(b);
            }
        }
        // lower administrative distance is better
        match other.admin_distance.cmp(&self.admin_distance) {
            Ordering::Equal => {}
            o => return o,
        }
        // different protocols with the same distance: protocol order, lower is better
        match other.protocol_class().cmp(&self.protocol_class()) {
            Ordering::Equal => {}
            o => return o,
        }
        match (&self.attributes, &other.attributes) {
            (RouteAttributes::Ospf(a), RouteAttributes::Ospf(b)) => {
                match ospf_type_rank(other.protocol).cmp(&ospf_type_rank(self.protocol)) {
                    Ordering::Equal => {}
                    o => return o,
                }
                match other.metric.cmp(&self.metric) {
                    Ordering::Equal => {}
                    o => return o,
                }
                // type 2 externals with the same metric: closer advertiser is better
                if self.protocol == RoutingProtocol::OspfE2 {
                    b.cost_to_advertiser.cmp(&a.cost_to_advertiser)
                } else {
                    Ordering::Equal
                }
            }
            _ => {
                // level 1 is preferred over level 2
                match isis_level_rank(other.protocol).cmp(&isis_level_rank(self.protocol)) {
                    Ordering::Equal => {}
                    o => return o,
                }
                other.metric.cmp(&self.metric)
            }
        }
    }
}

impl Route {
    /// Protocol family used to separate different protocols with equal administrative distance.
    fn protocol_class(&self) -> u8 {
        match self.protocol {
            // the address of a /32 interface is both its subnet and its local address
            RoutingProtocol::Local => 0,
            RoutingProtocol::Connected => 1,
            RoutingProtocol::Static => 2,
            RoutingProtocol::EigrpInternal => 3,
            RoutingProtocol::Ospf
            | RoutingProtocol::OspfIa
            | RoutingProtocol::OspfE1
            | RoutingProtocol::OspfE2 => 4,
            RoutingProtocol::IsisL1 | RoutingProtocol::IsisL2 => 5,
            RoutingProtocol::EigrpExternal => 6,
            RoutingProtocol::Bgp | RoutingProtocol::Ibgp => 7,
        }
    }
}

fn ospf_type_rank(protocol: RoutingProtocol) -> u8 {
    match protocol {
        RoutingProtocol::Ospf => 0,
        RoutingProtocol::OspfIa => 1,
        RoutingProtocol::OspfE1 => 2,
        RoutingProtocol::OspfE2 => 3,
        _ => 4,
    }
}

fn isis_level_rank(protocol: RoutingProtocol) -> u8 {
    match protocol {
        RoutingProtocol::IsisL2 => 1,
        _ => 0,
    }
}

/// Deterministic tie-break between two routes which are equally preferred. Returns `Greater` if
/// `a` wins. Lower BGP neighbor router id wins, then lower neighbor address, then lower next hop.
/// Only identical routes compare as `Equal`.
pub fn compare_tie_break(a: &Route, b: &Route) -> Ordering {
    if let (Some(x), Some(y)) = (a.bgp(), b.bgp()) {
        match y.received_from_router_id.cmp(&x.received_from_router_id) {
            Ordering::Equal => {}
            o => return o,
        }
        match y.received_from.cmp(&x.received_from) {
            Ordering::Equal => {}
            o => return o,
        }
    }
    match b.next_hop.cmp(&a.next_hop) {
        Ordering::Equal => {}
        o => return o,
    }
    // total order over everything else
    b.cmp(a)
}
