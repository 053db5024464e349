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

//! # Routes
//!
//! A [`Route`] is an immutable value. Protocol implementations create new routes for every
//! candidate they produce; RIBs replace routes instead of changing them. BGP path attributes are
//! shared behind an [`Arc`].

use super::bgp::BgpAttributes;
use super::config::StaticRoute;
use super::eigrp::EigrpMetric;
use super::ospf::OspfAttributes;
use super::types::Prefix;

use ipnet::Ipv4Net;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Protocol (and route type) a route was learned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoutingProtocol {
    /// Subnet of an active interface
    Connected,
    /// Address of an active interface (/32)
    Local,
    /// Statically configured route
    Static,
    /// Route learned over an eBGP session
    Bgp,
    /// Route learned over an iBGP session, or originated locally
    Ibgp,
    /// OSPF intra-area route
    Ospf,
    /// OSPF inter-area route
    OspfIa,
    /// OSPF external route of type 1
    OspfE1,
    /// OSPF external route of type 2
    OspfE2,
    /// ISIS level-1 route
    IsisL1,
    /// ISIS level-2 route
    IsisL2,
    /// EIGRP internal route
    EigrpInternal,
    /// EIGRP external (redistributed) route
    EigrpExternal,
}

impl RoutingProtocol {
    /// Administrative distance used when the process does not configure a different one.
    pub fn default_admin_distance(&self) -> u8 {
        match self {
            Self::Connected | Self::Local => 0,
            Self::Static => 1,
            Self::Bgp => 20,
            Self::Ibgp => 200,
            Self::Ospf | Self::OspfIa | Self::OspfE1 | Self::OspfE2 => 110,
            Self::IsisL1 | Self::IsisL2 => 115,
            Self::EigrpInternal => 90,
            Self::EigrpExternal => 170,
        }
    }

    /// Returns `true` for both eBGP and iBGP routes
    pub fn is_bgp(&self) -> bool {
        matches!(self, Self::Bgp | Self::Ibgp)
    }

    /// Returns `true` for every OSPF route type
    pub fn is_ospf(&self) -> bool {
        matches!(self, Self::Ospf | Self::OspfIa | Self::OspfE1 | Self::OspfE2)
    }

    /// Returns `true` for both ISIS levels
    pub fn is_isis(&self) -> bool {
        matches!(self, Self::IsisL1 | Self::IsisL2)
    }

    /// Returns `true` for internal and external EIGRP routes
    pub fn is_eigrp(&self) -> bool {
        matches!(self, Self::EigrpInternal | Self::EigrpExternal)
    }
}

impl fmt::Display for RoutingProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Local => "local",
            Self::Static => "static",
            Self::Bgp => "bgp",
            Self::Ibgp => "ibgp",
            Self::Ospf => "ospf",
            Self::OspfIa => "ospfIA",
            Self::OspfE1 => "ospfE1",
            Self::OspfE2 => "ospfE2",
            Self::IsisL1 => "isisL1",
            Self::IsisL2 => "isisL2",
            Self::EigrpInternal => "eigrp",
            Self::EigrpExternal => "eigrpEX",
        };
        write!(f, "{}", s)
    }
}

/// Next hop of a route
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NextHop {
    /// Destination is directly reachable out of the interface
    Interface(String),
    /// Next hop address, which must be resolved recursively
    Ip(Ipv4Addr),
    /// Next hop address on the given interface
    InterfaceIp(String, Ipv4Addr),
    /// Traffic is dropped
    Discard,
    /// Lookup continues in another VRF of the same node
    Vrf(String),
}

impl NextHop {
    /// Next hop address, if any
    pub fn ip(&self) -> Option<Ipv4Addr> {
        match self {
            Self::Ip(ip) | Self::InterfaceIp(_, ip) => Some(*ip),
            _ => None,
        }
    }

    /// Next hop interface, if any
    pub fn interface(&self) -> Option<&str> {
        match self {
            Self::Interface(i) | Self::InterfaceIp(i, _) => Some(i.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interface(i) => write!(f, "{}", i),
            Self::Ip(ip) => write!(f, "{}", ip),
            Self::InterfaceIp(i, ip) => write!(f, "{} via {}", ip, i),
            Self::Discard => write!(f, "discard"),
            Self::Vrf(v) => write!(f, "vrf {}", v),
        }
    }
}

/// Protocol specific attributes of a route
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteAttributes {
    /// No protocol specific attributes
    None,
    /// BGP path attributes
    Bgp(Arc<BgpAttributes>),
    /// OSPF area and cost to the advertising router
    Ospf(OspfAttributes),
    /// EIGRP metric vector
    Eigrp(EigrpMetric),
}

/// A route of a RIB.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route {
    /// Destination prefix (normalized)
    pub prefix: Prefix,
    /// Protocol which created the route
    pub protocol: RoutingProtocol,
    /// Administrative distance
    pub admin_distance: u8,
    /// Protocol metric
    pub metric: u64,
    /// Next hop
    pub next_hop: NextHop,
    /// Route tag
    pub tag: Option<u32>,
    /// Route must not be installed into the FIB nor used for next hop resolution
    pub non_forwarding: bool,
    /// Protocol specific attributes
    pub attributes: RouteAttributes,
}

impl Route {
    /// Create a new route with the default administrative distance of the protocol, no tag and no
    /// attributes. The prefix is normalized.
    pub fn new(prefix: Prefix, protocol: RoutingProtocol, metric: u64, next_hop: NextHop) -> Self {
        Self {
            prefix: prefix.trunc(),
            protocol,
            admin_distance: protocol.default_admin_distance(),
            metric,
            next_hop,
            tag: None,
            non_forwarding: false,
            attributes: RouteAttributes::None,
        }
    }

    /// Connected route for the subnet of an interface
    pub fn connected(address: &Ipv4Net, interface: &str) -> Self {
        let next_hop = NextHop::Interface(interface.to_string());
        Self::new(address.trunc(), RoutingProtocol::Connected, 0, next_hop)
    }

    /// Local (/32) route for the address of an interface
    pub fn local(address: Ipv4Addr, interface: &str) -> Self {
        let prefix = Ipv4Net::from(address);
        Self::new(prefix, RoutingProtocol::Local, 0, NextHop::Interface(interface.to_string()))
    }

    /// Route for a statically configured route
    pub fn from_static(sr: &StaticRoute) -> Self {
        Self {
            prefix: sr.prefix.trunc(),
            protocol: RoutingProtocol::Static,
            admin_distance: sr.admin_distance,
            metric: 0,
            next_hop: sr.next_hop.clone(),
            tag: sr.tag,
            non_forwarding: sr.non_forwarding,
            attributes: RouteAttributes::None,
        }
    }

    /// Returns the same route with a different administrative distance
    pub fn with_admin_distance(mut self, admin_distance: u8) -> Self {
        self.admin_distance = admin_distance;
        self
    }

    /// Returns the same route with the given attributes
    pub fn with_attributes(mut self, attributes: RouteAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// BGP attributes, if this is a BGP route
    pub fn bgp(&self) -> Option<&BgpAttributes> {
        match &self.attributes {
            RouteAttributes::Bgp(a) => Some(a.as_ref()),
            _ => None,
        }
    }

    /// OSPF attributes, if this is an OSPF route
    pub fn ospf(&self) -> Option<&OspfAttributes> {
        match &self.attributes {
            RouteAttributes::Ospf(a) => Some(a),
            _ => None,
        }
    }

    /// EIGRP metric vector, if this is an EIGRP route
    pub fn eigrp(&self) -> Option<&EigrpMetric> {
        match &self.attributes {
            RouteAttributes::Eigrp(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{}] via {} ({})",
            self.prefix, self.admin_distance, self.metric, self.next_hop, self.protocol
        )?;
        if self.non_forwarding {
            write!(f, " non-forwarding")?;
        }
        Ok(())
    }
}
