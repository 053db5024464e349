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

//! # Forwarding State
//!
//! Concrete packet tracing over the compiled FIBs. A trace starts at a VRF of a node and follows
//! every FIB action for the destination of the packet, branching on equal-cost paths. Interface
//! filters are applied on the way. Every branch ends with a [`Disposition`].

use super::config::{Configuration, Interface};
use super::fib::{Fib, FibAction};
use super::topology::Layer3Topology;
use super::types::{DataPlaneError, NodeInterfacePair, VrfId};
use crate::ipspace::{LineAction, Packet};

use log::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

/// Final outcome of a traced path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Disposition {
    /// The destination is an address of the last node
    Accepted,
    /// The packet is delivered to a host in the subnet of the outgoing interface
    Delivered,
    /// The packet leaves the modeled network
    ExitsNetwork,
    /// The packet is dropped by a discard route
    NullRouted,
    /// No route matches the destination
    NoRoute,
    /// Nobody answers the ARP request on the outgoing interface
    NeighborUnreachable,
    /// The packet is denied by the incoming filter of the neighbor interface
    DeniedIn(String),
    /// The packet is denied by the outgoing filter of the interface
    DeniedOut(String),
    /// The packet visits the same VRF twice
    Loop,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Delivered => write!(f, "delivered"),
            Self::ExitsNetwork => write!(f, "exits network"),
            Self::NullRouted => write!(f, "null routed"),
            Self::NoRoute => write!(f, "no route"),
            Self::NeighborUnreachable => write!(f, "neighbor unreachable"),
            Self::DeniedIn(filter) => write!(f, "denied in by {}", filter),
            Self::DeniedOut(filter) => write!(f, "denied out by {}", filter),
            Self::Loop => write!(f, "loop"),
        }
    }
}

/// A single hop of a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hop {
    /// Hostname of the node
    pub hostname: String,
    /// VRF the lookup was made in
    pub vrf: String,
    /// Interface the packet leaves the node, if it does
    pub out_interface: Option<String>,
}

/// One branch of a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trace {
    /// Visited virtual routers in order
    pub hops: Vec<Hop>,
    /// Outcome of the path
    pub disposition: Disposition,
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hop in self.hops.iter() {
            match hop.out_interface.as_ref() {
                Some(i) => write!(f, "{}:{}[{}] -> ", hop.hostname, hop.vrf, i)?,
                None => write!(f, "{}:{} -> ", hop.hostname, hop.vrf)?,
            }
        }
        write!(f, "{}", self.disposition)
    }
}

/// Read-only view on the FIBs of a computed data plane, used to trace concrete packets.
#[derive(Debug, Clone, Copy)]
pub struct ForwardingState<'a> {
    configs: &'a BTreeMap<String, Configuration>,
    fibs: &'a BTreeMap<VrfId, Fib>,
    layer3: &'a Layer3Topology,
}

impl<'a> ForwardingState<'a> {
    /// Create the forwarding state out of the FIBs of all virtual routers
    pub fn new(
        configs: &'a BTreeMap<String, Configuration>,
        fibs: &'a BTreeMap<VrfId, Fib>,
        layer3: &'a Layer3Topology,
    ) -> Self {
        Self { configs, fibs, layer3 }
    }

    /// Trace the packet starting at the VRF of the node. Returns one trace per equal-cost branch,
    /// sorted.
    pub fn trace(
        &self,
        hostname: &str,
        vrf: &str,
        packet: &Packet,
    ) -> Result<Vec<Trace>, DataPlaneError> {
        let config = self
            .configs
            .get(hostname)
            .ok_or_else(|| DataPlaneError::NodeNotFound(hostname.to_string()))?;
        if config.vrf(vrf).is_none() {
            return Err(DataPlaneError::VrfNotFound(hostname.to_string(), vrf.to_string()));
        }
        let mut traces = Vec::new();
        let mut visited = BTreeSet::new();
        self.step(hostname, vrf, packet, &mut Vec::new(), &mut visited, &mut traces);
        traces.sort();
        traces.dedup();
        Ok(traces)
    }

    fn step(
        &self,
        hostname: &str,
        vrf: &str,
        packet: &Packet,
        hops: &mut Vec<Hop>,
        visited: &mut BTreeSet<VrfId>,
        traces: &mut Vec<Trace>,
    ) {
        let key = (hostname.to_string(), vrf.to_string());
        let finish = |hops: &Vec<Hop>,
                      out: Option<&str>,
                      disposition: Disposition,
                      traces: &mut Vec<Trace>| {
            let mut hops = hops.clone();
            hops.push(Hop {
                hostname: hostname.to_string(),
                vrf: vrf.to_string(),
                out_interface: out.map(|s| s.to_string()),
            });
            trace!("trace ends with {}", disposition);
            traces.push(Trace { hops, disposition });
        };

        if visited.contains(&key) {
            finish(&*hops, None, Disposition::Loop, traces);
            return;
        }
        let (config, fib) = match (self.configs.get(hostname), self.fibs.get(&key)) {
            (Some(c), Some(f)) => (c, f),
            _ => {
                finish(&*hops, None, Disposition::NoRoute, traces);
                return;
            }
        };
        let actions = fib.actions(packet.dst_ip);
        if actions.is_empty() {
            finish(&*hops, None, Disposition::NoRoute, traces);
            return;
        }

        visited.insert(key.clone());
        for action in actions {
            match action {
                FibAction::Accept => finish(&*hops, None, Disposition::Accepted, traces),
                FibAction::Drop => finish(&*hops, None, Disposition::NullRouted, traces),
                FibAction::NextVrf(next) => {
                    hops.push(Hop {
                        hostname: hostname.to_string(),
                        vrf: vrf.to_string(),
                        out_interface: None,
                    });
                    self.step(hostname, next, packet, hops, visited, traces);
                    hops.pop();
                }
                FibAction::Forward { interface, arp_ip } => {
                    let out = Some(interface.as_str());
                    let iface = match config.interface(interface) {
                        Some(i) => i,
                        None => {
                            finish(&*hops, out, Disposition::NeighborUnreachable, traces);
                            continue;
                        }
                    };
                    let outgoing = iface.outgoing_filter.as_deref();
                    if let Some(filter) = denied_by(config, outgoing, packet) {
                        finish(&*hops, out, Disposition::DeniedOut(filter), traces);
                        continue;
                    }
                    let target = arp_ip.unwrap_or(packet.dst_ip);
                    let nip = NodeInterfacePair::new(hostname, interface.as_str());
                    match self.arp(config, &nip, iface, target) {
                        ArpResult::Neighbor(n_config, n_iface) => {
                            let incoming = n_iface.incoming_filter.as_deref();
                            if let Some(filter) = denied_by(n_config, incoming, packet) {
                                finish(&*hops, out, Disposition::DeniedIn(filter), traces);
                                continue;
                            }
                            hops.push(Hop {
                                hostname: hostname.to_string(),
                                vrf: vrf.to_string(),
                                out_interface: Some(interface.clone()),
                            });
                            let n_host = n_config.hostname.as_str();
                            self.step(n_host, &n_iface.vrf, packet, hops, visited, traces);
                            hops.pop();
                        }
                        ArpResult::Delivered => {
                            finish(&*hops, out, Disposition::Delivered, traces)
                        }
                        ArpResult::ExitsNetwork => {
                            finish(&*hops, out, Disposition::ExitsNetwork, traces)
                        }
                        ArpResult::Unreachable => {
                            finish(&*hops, out, Disposition::NeighborUnreachable, traces)
                        }
                    }
                }
            }
        }
        visited.remove(&key);
    }

    /// Find the answer to the ARP request for `target` sent out of the interface.
    fn arp(
        &self,
        config: &Configuration,
        nip: &NodeInterfacePair,
        iface: &Interface,
        target: Ipv4Addr,
    ) -> ArpResult<'a> {
        let neighbors = self.layer3.out_edges(nip);
        for (neighbor, _) in neighbors.iter() {
            let n_config = match self.configs.get(&neighbor.hostname) {
                Some(c) => c,
                None => continue,
            };
            let n_iface = match n_config.interface(&neighbor.interface) {
                Some(i) => i,
                None => continue,
            };
            let answers = n_iface.ip() == Some(target)
                || n_iface.additional_arp_ips.contains(target, &n_config.ip_spaces).unwrap_or(false)
                || (n_iface.proxy_arp
                    && self.routes_elsewhere(&neighbor.hostname, n_iface, target));
            if answers {
                return ArpResult::Neighbor(n_config, n_iface);
            }
        }

        if iface.static_neighbors.contains(target, &config.ip_spaces).unwrap_or(false) {
            return ArpResult::Delivered;
        }
        let owned = self
            .configs
            .values()
            .flat_map(|c| c.interfaces.values())
            .any(|i| i.ip() == Some(target));
        let in_subnet = iface.address.map(|a| a.contains(&target)).unwrap_or(false);
        if in_subnet && !owned && iface.ip() != Some(target) {
            ArpResult::Delivered
        } else if !in_subnet && !owned && neighbors.is_empty() {
            ArpResult::ExitsNetwork
        } else {
            ArpResult::Unreachable
        }
    }

    /// Returns `true` if the VRF of the interface forwards `target` out of a different interface.
    fn routes_elsewhere(&self, hostname: &str, iface: &Interface, target: Ipv4Addr) -> bool {
        match self.fibs.get(&(hostname.to_string(), iface.vrf.clone())) {
            Some(fib) => fib.actions(target).into_iter().any(|a| match a {
                FibAction::Forward { interface, .. } => *interface != iface.name,
                _ => false,
            }),
            None => false,
        }
    }
}

enum ArpResult<'a> {
    Neighbor(&'a Configuration, &'a Interface),
    Delivered,
    ExitsNetwork,
    Unreachable,
}

/// Name of the filter if it denies the packet. Filters that cannot be evaluated deny every packet;
/// undefined filters permit every packet.
fn denied_by(config: &Configuration, filter: Option<&str>, packet: &Packet) -> Option<String> {
    let name = filter?;
    let filter = match config.filters.get(name) {
        Some(f) => f,
        None => {
            debug!("{}: filter {} is not defined", config.hostname, name);
            return None;
        }
    };
    match filter.evaluate(packet, &config.filters, &config.ip_spaces) {
        Ok(LineAction::Permit) => None,
        Ok(LineAction::Deny) => Some(name.to_string()),
        Err(e) => {
            warn!("{}: cannot evaluate filter {}: {}", config.hostname, name, e);
            Some(name.to_string())
        }
    }
}
