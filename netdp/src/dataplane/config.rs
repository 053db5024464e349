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

//! # Configuration
//!
//! Vendor-neutral configuration model of a node. A [`Configuration`] owns VRFs and interfaces, the
//! named ip spaces, filters and routing policies. Every interface is placed in exactly one VRF, and
//! every VRF carries its own routing processes and static routes.
//!
//! ```
//! # use netdp::dataplane::config::*;
//! # use netdp::dataplane::route::NextHop;
//! let mut config = Configuration::new("r1");
//! config.add_interface(Interface::new("eth0", Some("10.0.0.1/31".parse().unwrap())));
//! let default_route = StaticRoute::new(
//!     "0.0.0.0/0".parse().unwrap(),
//!     NextHop::Ip("10.0.0.0".parse().unwrap()),
//! );
//! config.default_vrf_mut().add_static_route(default_route);
//! assert!(config.validate("r1").is_ok());
//! ```

use super::bgp::BgpProcess;
use super::eigrp::{EigrpInterfaceSettings, EigrpProcess};
use super::isis::{IsisInterfaceSettings, IsisProcess};
use super::ospf::{OspfInterfaceSettings, OspfProcess};
use super::route::NextHop;
use super::route_map::RoutePolicy;
use super::types::{ConfigError, NodeInterfacePair, Prefix};
use crate::filter::{Filter, NamedFilters};
use crate::ipspace::{IpSpace, NamedIpSpaces};

use ipnet::Ipv4Net;
use log::*;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Name of the VRF every configuration starts with
pub const DEFAULT_VRF: &str = "default";

/// Bandwidth of interfaces which do not configure one (1 Gbps)
pub static DEFAULT_BANDWIDTH: u64 = 1_000_000_000;

/// Administrative distance of static routes which do not configure one
pub static DEFAULT_STATIC_ADMIN_DISTANCE: u8 = 1;

/// Configuration of a single node
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Hostname of the node
    pub hostname: String,
    /// VRFs by name
    pub vrfs: BTreeMap<String, Vrf>,
    /// Interfaces by name
    pub interfaces: BTreeMap<String, Interface>,
    /// Named ip spaces
    pub ip_spaces: NamedIpSpaces,
    /// Named packet filters
    pub filters: NamedFilters,
    /// Named routing policies
    pub route_policies: BTreeMap<String, RoutePolicy>,
}

impl Configuration {
    /// Create an empty configuration containing only the default VRF.
    pub fn new<S: Into<String>>(hostname: S) -> Self {
        let mut vrfs = BTreeMap::new();
        vrfs.insert(DEFAULT_VRF.to_string(), Vrf::new(DEFAULT_VRF));
        Self {
            hostname: hostname.into(),
            vrfs,
            interfaces: BTreeMap::new(),
            ip_spaces: BTreeMap::new(),
            filters: BTreeMap::new(),
            route_policies: BTreeMap::new(),
        }
    }

    /// Add (or replace) an interface
    pub fn add_interface(&mut self, interface: Interface) -> &mut Self {
        self.interfaces.insert(interface.name.clone(), interface);
        self
    }

    /// Add (or replace) a VRF
    pub fn add_vrf(&mut self, vrf: Vrf) -> &mut Self {
        self.vrfs.insert(vrf.name.clone(), vrf);
        self
    }

    /// Add (or replace) a named ip space
    pub fn add_ip_space<S: Into<String>>(&mut self, name: S, space: IpSpace) -> &mut Self {
        self.ip_spaces.insert(name.into(), space);
        self
    }

    /// Add (or replace) a filter
    pub fn add_filter(&mut self, filter: Filter) -> &mut Self {
        self.filters.insert(filter.name.clone(), filter);
        self
    }

    /// Add (or replace) a routing policy
    pub fn add_route_policy<S: Into<String>>(&mut self, name: S, policy: RoutePolicy) -> &mut Self {
        self.route_policies.insert(name.into(), policy);
        self
    }

    /// The default VRF, which is created if it was removed.
    pub fn default_vrf_mut(&mut self) -> &mut Vrf {
        self.vrfs.entry(DEFAULT_VRF.to_string()).or_insert_with(|| Vrf::new(DEFAULT_VRF))
    }

    /// Mutable reference to a VRF
    pub fn vrf_mut(&mut self, name: &str) -> Option<&mut Vrf> {
        self.vrfs.get_mut(name)
    }

    /// Reference to a VRF
    pub fn vrf(&self, name: &str) -> Option<&Vrf> {
        self.vrfs.get(name)
    }

    /// Reference to an interface
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    /// All interfaces placed in the VRF, ordered by name
    pub fn interfaces_in_vrf<'a>(
        &'a self,
        vrf: &'a str,
    ) -> impl Iterator<Item = &'a Interface> + 'a {
        self.interfaces.values().filter(move |i| i.vrf == vrf)
    }

    /// Check the structural consistency of the configuration, stored under `key`.
    pub fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if key != self.hostname {
            return Err(ConfigError::HostnameMismatch(key.to_string(), self.hostname.clone()));
        }
        for iface in self.interfaces.values() {
            if !self.vrfs.contains_key(&iface.vrf) {
                return Err(ConfigError::UndefinedVrf(
                    NodeInterfacePair::new(&self.hostname, &iface.name),
                    iface.vrf.clone(),
                ));
            }
            for filter in iface.incoming_filter.iter().chain(iface.outgoing_filter.iter()) {
                if !self.filters.contains_key(filter) {
                    warn!(
                        "{}[{}] references undefined filter {}",
                        self.hostname, iface.name, filter
                    );
                }
            }
        }
        for vrf in self.vrfs.values() {
            for sr in vrf.static_routes.iter() {
                if let NextHop::Vrf(next) = &sr.next_hop {
                    if !self.vrfs.contains_key(next) {
                        return Err(ConfigError::UndefinedNextVrf(
                            self.hostname.clone(),
                            sr.prefix,
                            next.clone(),
                        ));
                    }
                }
                if let Some(i) = sr.next_hop.interface() {
                    if !self.interfaces.contains_key(i) {
                        return Err(ConfigError::UndefinedInterface(
                            format!("Static route {} in VRF {}", sr.prefix, vrf.name),
                            NodeInterfacePair::new(&self.hostname, i),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Virtual routing and forwarding instance
#[derive(Debug, Clone, PartialEq)]
pub struct Vrf {
    /// Name of the VRF
    pub name: String,
    /// Keep all equally preferred routes in the main RIB and the IGP RIBs
    pub multipath: bool,
    /// Static routes
    pub static_routes: Vec<StaticRoute>,
    /// BGP process
    pub bgp: Option<BgpProcess>,
    /// OSPF process
    pub ospf: Option<OspfProcess>,
    /// ISIS process
    pub isis: Option<IsisProcess>,
    /// EIGRP process
    pub eigrp: Option<EigrpProcess>,
}

impl Vrf {
    /// Create an empty VRF with multipath enabled
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            multipath: true,
            static_routes: Vec::new(),
            bgp: None,
            ospf: None,
            isis: None,
            eigrp: None,
        }
    }

    /// Add a static route
    pub fn add_static_route(&mut self, route: StaticRoute) -> &mut Self {
        self.static_routes.push(route);
        self
    }
}

/// Statically configured route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StaticRoute {
    /// Destination
    pub prefix: Prefix,
    /// Next hop
    pub next_hop: NextHop,
    /// Administrative distance
    pub admin_distance: u8,
    /// Route tag
    pub tag: Option<u32>,
    /// The route is only used for route selection and redistribution, but never for forwarding
    pub non_forwarding: bool,
}

impl StaticRoute {
    /// Create a new static route with the default administrative distance.
    pub fn new(prefix: Prefix, next_hop: NextHop) -> Self {
        Self {
            prefix: prefix.trunc(),
            next_hop,
            admin_distance: DEFAULT_STATIC_ADMIN_DISTANCE,
            tag: None,
            non_forwarding: false,
        }
    }

    /// Set the administrative distance
    pub fn admin_distance(mut self, admin_distance: u8) -> Self {
        self.admin_distance = admin_distance;
        self
    }

    /// Set the tag
    pub fn tag(mut self, tag: u32) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Mark the route as non-forwarding
    pub fn non_forwarding(mut self) -> Self {
        self.non_forwarding = true;
        self
    }
}

/// Interface of a node
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    /// Name of the interface
    pub name: String,
    /// VRF the interface is placed in
    pub vrf: String,
    /// Address and prefix length of the interface
    pub address: Option<Ipv4Net>,
    /// Only active interfaces create connected routes and adjacencies
    pub active: bool,
    /// Bandwidth in bits per second
    pub bandwidth: u64,
    /// Delay in picoseconds. If absent, it is derived from the bandwidth.
    pub delay: Option<u64>,
    /// The interface answers ARP requests for addresses it can route elsewhere
    pub proxy_arp: bool,
    /// Addresses for which the interface answers ARP requests in addition to its own address
    pub additional_arp_ips: IpSpace,
    /// Neighbor addresses that are known to be reachable out of this interface, independent of
    /// the modeled neighbors
    pub static_neighbors: IpSpace,
    /// OSPF settings
    pub ospf: Option<OspfInterfaceSettings>,
    /// ISIS settings
    pub isis: Option<IsisInterfaceSettings>,
    /// EIGRP settings
    pub eigrp: Option<EigrpInterfaceSettings>,
    /// Filter applied to packets entering the interface
    pub incoming_filter: Option<String>,
    /// Filter applied to packets leaving the interface
    pub outgoing_filter: Option<String>,
}

impl Interface {
    /// Create an active interface in the default VRF with default bandwidth.
    pub fn new<S: Into<String>>(name: S, address: Option<Ipv4Net>) -> Self {
        Self {
            name: name.into(),
            vrf: DEFAULT_VRF.to_string(),
            address,
            active: true,
            bandwidth: DEFAULT_BANDWIDTH,
            delay: None,
            proxy_arp: false,
            additional_arp_ips: IpSpace::Empty,
            static_neighbors: IpSpace::Empty,
            ospf: None,
            isis: None,
            eigrp: None,
            incoming_filter: None,
            outgoing_filter: None,
        }
    }

    /// Place the interface in the VRF
    pub fn vrf<S: Into<String>>(mut self, vrf: S) -> Self {
        self.vrf = vrf.into();
        self
    }

    /// Set the bandwidth (bits per second)
    pub fn bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Shut down the interface
    pub fn shutdown(mut self) -> Self {
        self.active = false;
        self
    }

    /// Enable proxy ARP
    pub fn proxy_arp(mut self) -> Self {
        self.proxy_arp = true;
        self
    }

    /// Enable OSPF
    pub fn ospf(mut self, settings: OspfInterfaceSettings) -> Self {
        self.ospf = Some(settings);
        self
    }

    /// Enable ISIS
    pub fn isis(mut self, settings: IsisInterfaceSettings) -> Self {
        self.isis = Some(settings);
        self
    }

    /// Enable EIGRP
    pub fn eigrp(mut self, settings: EigrpInterfaceSettings) -> Self {
        self.eigrp = Some(settings);
        self
    }

    /// Address of the interface
    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.address.map(|a| a.addr())
    }

    /// Subnet of the interface (normalized)
    pub fn subnet(&self) -> Option<Ipv4Net> {
        self.address.map(|a| a.trunc())
    }

    /// Returns the address, if the interface is active and addressed.
    pub fn active_address(&self) -> Option<Ipv4Net> {
        if self.active {
            self.address
        } else {
            None
        }
    }

    /// Delay in picoseconds. Derived from the bandwidth if not configured (10 microseconds at
    /// 1 Gbps).
    pub fn delay(&self) -> u64 {
        match self.delay {
            Some(d) => d,
            None => 10_000_000_000_000_000 / self.bandwidth.max(1),
        }
    }
}
