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

//! # Forwarding Analysis
//!
//! Symbolic classification of all destination addresses by their forwarding outcome. The analysis
//! works in two passes:
//!
//! 1. Every FIB is partitioned by longest prefix match: each prefix only claims the addresses that
//!    no longer prefix has claimed before. The claimed addresses are accepted, null-routed,
//!    delegated to another VRF, or forwarded out of interfaces. Unclaimed addresses are not
//!    routable.
//! 2. Addresses forwarded out of an interface are split by the outcome of the ARP request of the
//!    node. The target is answered if it is a static neighbor of the interface, the address of a
//!    neighbor interface, an additional ARP address of a neighbor interface, or an address which a
//!    neighbor with proxy ARP routes out of another interface. Unanswered targets inside the
//!    subnet of the interface that belong to no node are delivered to a host of the subnet. Targets
//!    outside of the subnet that belong to no node leave the network, if the interface has no
//!    modeled neighbor. All other targets are unreachable.
//!
//! All predicates are [`Bdd`]s over the destination address of the shared [`BddPacket`].

use super::config::Configuration;
use super::fib::{Fib, FibAction};
use super::topology::Layer3Topology;
use super::types::{NodeInterfacePair, Prefix, VrfId};
use crate::ipspace::{ip_space_from_bdd, Bdd, BddPacket, HeaderField, IpSpace, IpSpaceToBdd};

use itertools::Itertools;
use log::*;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

/// Outcome of packets forwarded out of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ForwardingCategory {
    /// The packet reaches a neighbor or a host in the subnet of the interface
    Delivered,
    /// The packet leaves the modeled network
    ExitsNetwork,
    /// Nobody answers the ARP request
    NeighborUnreachable,
}

impl ForwardingCategory {
    /// All categories
    pub fn all() -> [ForwardingCategory; 3] {
        [Self::Delivered, Self::ExitsNetwork, Self::NeighborUnreachable]
    }
}

impl fmt::Display for ForwardingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::ExitsNetwork => write!(f, "exits network"),
            Self::NeighborUnreachable => write!(f, "neighbor unreachable"),
        }
    }
}

/// Result of the forwarding analysis of a single VRF of a node
#[derive(Debug, Clone)]
pub struct VrfForwardingAnalysis {
    packet: BddPacket,
    accepted: Bdd,
    null_routed: Bdd,
    not_routable: Bdd,
    next_vrf: BTreeMap<String, Bdd>,
    forwarded: BTreeMap<String, Bdd>,
    interfaces: BTreeMap<String, BTreeMap<ForwardingCategory, Bdd>>,
}

impl VrfForwardingAnalysis {
    /// Addresses of this node
    pub fn accepted(&self) -> &Bdd {
        &self.accepted
    }

    /// Addresses that are dropped by every matching FIB entry
    pub fn null_routed(&self) -> &Bdd {
        &self.null_routed
    }

    /// Addresses without any FIB entry
    pub fn not_routable(&self) -> &Bdd {
        &self.not_routable
    }

    /// Addresses with a FIB entry that is not only dropping
    pub fn routable(&self) -> Bdd {
        self.not_routable.not().diff(&self.null_routed)
    }

    /// Addresses whose lookup continues in `vrf`
    pub fn next_vrf(&self, vrf: &str) -> Option<&Bdd> {
        self.next_vrf.get(vrf)
    }

    /// All VRFs that receive delegated lookups
    pub fn next_vrfs(&self) -> impl Iterator<Item = (&String, &Bdd)> {
        self.next_vrf.iter()
    }

    /// Addresses forwarded out of the interface
    pub fn forwarded_out(&self, interface: &str) -> Option<&Bdd> {
        self.forwarded.get(interface)
    }

    /// Names of all interfaces which forward any address
    pub fn interfaces(&self) -> impl Iterator<Item = &String> {
        self.interfaces.keys()
    }

    /// Predicates of all categories of the interface
    pub fn interface_predicates(
        &self,
        interface: &str,
    ) -> Option<&BTreeMap<ForwardingCategory, Bdd>> {
        self.interfaces.get(interface)
    }

    /// Addresses forwarded out of the interface with the given outcome. Interfaces that forward
    /// nothing yield the empty set.
    pub fn predicate(&self, interface: &str, category: ForwardingCategory) -> Bdd {
        self.interfaces
            .get(interface)
            .and_then(|p| p.get(&category))
            .cloned()
            .unwrap_or_else(|| self.packet.zero())
    }

    /// Union of the category over all interfaces
    pub fn category(&self, category: ForwardingCategory) -> Bdd {
        let parts: Vec<&Bdd> = self.interfaces.values().filter_map(|p| p.get(&category)).collect();
        self.packet.factory().or_all(parts)
    }

    /// Express a predicate of this analysis as an [`IpSpace`]
    pub fn ip_space(&self, bdd: &Bdd) -> IpSpace {
        ip_space_from_bdd(&self.packet, bdd)
    }
}

/// Result of partitioning a FIB
struct FibPartition {
    accepted: Bdd,
    null_routed: Bdd,
    claimed: Bdd,
    next_vrf: BTreeMap<String, Bdd>,
    /// Addresses forwarded out of each interface, together with the ARP target
    out: BTreeMap<String, Vec<(Bdd, Option<Ipv4Addr>)>>,
    forwarded: BTreeMap<String, Bdd>,
}

fn partition(packet: &BddPacket, fib: &Fib) -> FibPartition {
    let mut p = FibPartition {
        accepted: packet.zero(),
        null_routed: packet.zero(),
        claimed: packet.zero(),
        next_vrf: BTreeMap::new(),
        out: BTreeMap::new(),
        forwarded: BTreeMap::new(),
    };
    let prefixes: Vec<(&Prefix, _)> = fib
        .entries()
        .sorted_by(|(a, _), (b, _)| b.prefix_len().cmp(&a.prefix_len()).then_with(|| a.cmp(b)))
        .collect();
    for (prefix, entries) in prefixes {
        let matched = packet.dst_prefix(prefix);
        let space = matched.diff(&p.claimed);
        p.claimed = p.claimed.or(&matched);
        if space.is_zero() {
            continue;
        }
        if entries.iter().all(|e| e.action == FibAction::Drop) {
            p.null_routed = p.null_routed.or(&space);
            continue;
        }
        for entry in entries {
            match &entry.action {
                FibAction::Accept => p.accepted = p.accepted.or(&space),
                FibAction::Drop => {}
                FibAction::NextVrf(vrf) => {
                    let acc = p.next_vrf.entry(vrf.clone()).or_insert_with(|| packet.zero());
                    *acc = acc.or(&space);
                }
                FibAction::Forward { interface, arp_ip } => {
                    p.out.entry(interface.clone()).or_default().push((space.clone(), *arp_ip));
                    let acc = p.forwarded.entry(interface.clone()).or_insert_with(|| packet.zero());
                    *acc = acc.or(&space);
                }
            }
        }
    }
    p
}

/// Compile an ip space of the configuration, treating invalid spaces as empty.
fn space_bdd(
    packet: &BddPacket,
    compiler: &mut IpSpaceToBdd,
    space: &IpSpace,
    what: &NodeInterfacePair,
) -> Bdd {
    match compiler.to_bdd(space) {
        Ok(bdd) => bdd,
        Err(e) => {
            warn!("{}: {}", what, e);
            packet.zero()
        }
    }
}

/// Compute the forwarding analysis of all VRFs out of their FIBs.
pub fn analyze(
    packet: &BddPacket,
    configs: &BTreeMap<String, Configuration>,
    fibs: &BTreeMap<VrfId, Fib>,
    layer3: &Layer3Topology,
) -> BTreeMap<VrfId, VrfForwardingAnalysis> {
    let partitions: BTreeMap<&VrfId, FibPartition> =
        fibs.iter().map(|(key, fib)| (key, partition(packet, fib))).collect();

    // every address configured on any interface, active or not
    let owned_ips: Vec<Bdd> = configs
        .values()
        .flat_map(|c| c.interfaces.values())
        .filter_map(|i| i.ip())
        .map(|ip| packet.dst_ip(ip))
        .collect();
    let owned = packet.factory().or_all(owned_ips.iter());

    let mut result = BTreeMap::new();
    for (key, part) in partitions.iter() {
        let config = match configs.get(&key.0) {
            Some(c) => c,
            None => continue,
        };
        let mut compiler = IpSpaceToBdd::new(packet, HeaderField::DstIp, &config.ip_spaces);
        let mut interfaces = BTreeMap::new();
        for (iface_name, forwarded) in part.out.iter() {
            let nip = NodeInterfacePair::new(&key.0, iface_name);
            let iface = match config.interface(iface_name) {
                Some(i) => i,
                None => {
                    debug!("{} forwards out of an unknown interface", nip);
                    continue;
                }
            };

            // addresses answered by a neighbor
            let mut answered = space_bdd(packet, &mut compiler, &iface.static_neighbors, &nip);
            let neighbors = layer3.out_edges(&nip);
            for (neighbor, _) in neighbors.iter() {
                let n_config = match configs.get(&neighbor.hostname) {
                    Some(c) => c,
                    None => continue,
                };
                let n_iface = match n_config.interface(&neighbor.interface) {
                    Some(i) => i,
                    None => continue,
                };
                if let Some(ip) = n_iface.ip() {
                    answered = answered.or(&packet.dst_ip(ip));
                }
                let mut n_compiler =
                    IpSpaceToBdd::new(packet, HeaderField::DstIp, &n_config.ip_spaces);
                let additional =
                    space_bdd(packet, &mut n_compiler, &n_iface.additional_arp_ips, neighbor);
                answered = answered.or(&additional);
                if n_iface.proxy_arp {
                    let n_key = (neighbor.hostname.clone(), n_iface.vrf.clone());
                    if let Some(n_part) = partitions.get(&n_key) {
                        for (other, space) in n_part.forwarded.iter() {
                            if *other != neighbor.interface {
                                answered = answered.or(space);
                            }
                        }
                    }
                }
            }

            let subnet = match iface.subnet() {
                Some(net) => packet.dst_prefix(&net),
                None => packet.zero(),
            };
            let own = match iface.ip() {
                Some(ip) => packet.dst_ip(ip),
                None => packet.zero(),
            };
            let delivered_targets = answered.or(&subnet.diff(&own).diff(&owned));
            let exit_targets = if neighbors.is_empty() {
                subnet.or(&owned).not().diff(&delivered_targets)
            } else {
                packet.zero()
            };

            let mut delivered = packet.zero();
            let mut exits = packet.zero();
            let mut unreachable = packet.zero();
            for (space, arp_ip) in forwarded.iter() {
                match arp_ip {
                    Some(target) => {
                        if packet.contains_dst(&delivered_targets, *target) {
                            delivered = delivered.or(space);
                        } else if packet.contains_dst(&exit_targets, *target) {
                            exits = exits.or(space);
                        } else {
                            unreachable = unreachable.or(space);
                        }
                    }
                    None => {
                        let d = space.and(&delivered_targets);
                        let e = space.and(&exit_targets).diff(&d);
                        unreachable = unreachable.or(&space.diff(&d).diff(&e));
                        delivered = delivered.or(&d);
                        exits = exits.or(&e);
                    }
                }
            }
            // ECMP may send an address out of the same interface with different targets
            let exits = exits.diff(&delivered);
            let unreachable = unreachable.diff(&delivered).diff(&exits);
            trace!("{}: {} delivered BDD nodes", nip, delivered.node_count());

            let mut predicates = BTreeMap::new();
            predicates.insert(ForwardingCategory::Delivered, delivered);
            predicates.insert(ForwardingCategory::ExitsNetwork, exits);
            predicates.insert(ForwardingCategory::NeighborUnreachable, unreachable);
            interfaces.insert(iface_name.clone(), predicates);
        }

        result.insert(
            (*key).clone(),
            VrfForwardingAnalysis {
                packet: packet.clone(),
                accepted: part.accepted.clone(),
                null_routed: part.null_routed.clone(),
                not_routable: part.claimed.not(),
                next_vrf: part.next_vrf.clone(),
                forwarded: part.forwarded.clone(),
                interfaces,
            },
        );
    }
    info!("Forwarding analysis done for {} VRFs", result.len());
    result
}
