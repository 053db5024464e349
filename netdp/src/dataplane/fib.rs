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

//! # Forwarding Information Base
//!
//! The FIB is compiled out of the main RIB of a converged virtual router. Every route is resolved
//! recursively until it reaches an interface, a discard next hop, or another VRF. Resolution uses
//! the longest prefix match over forwarding routes of the same RIB. A route whose resolution runs
//! into a cycle, or ends at an address without any matching route, is unresolved and does not
//! appear in the FIB.

use super::rib::Rib;
use super::route::{NextHop, Route, RoutingProtocol};
use super::types::Prefix;

use ipnet::Ipv4Net;
use log::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

/// Resolved forwarding action
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FibAction {
    /// The destination is an address of this node
    Accept,
    /// Forward the packet out of the interface. The node sends an ARP request for `arp_ip`, or for
    /// the destination address itself if `arp_ip` is `None`.
    Forward {
        /// Outgoing interface
        interface: String,
        /// Address resolved with ARP
        arp_ip: Option<Ipv4Addr>,
    },
    /// Drop the packet
    Drop,
    /// Continue the lookup in another VRF of the node
    NextVrf(String),
}

impl fmt::Display for FibAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Forward { interface, arp_ip: Some(ip) } => {
                write!(f, "forward {} (arp {})", interface, ip)
            }
            Self::Forward { interface, arp_ip: None } => {
                write!(f, "forward {} (arp dst)", interface)
            }
            Self::Drop => write!(f, "drop"),
            Self::NextVrf(v) => write!(f, "next vrf {}", v),
        }
    }
}

/// A route of the RIB together with one of its resolved actions
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FibEntry {
    /// The route of the main RIB
    pub route: Route,
    /// Resolved action
    pub action: FibAction,
}

/// Forwarding table of a virtual router
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fib {
    entries: BTreeMap<Prefix, Vec<FibEntry>>,
    unresolved: Vec<Route>,
    non_forwarding: Vec<Route>,
}

impl Fib {
    /// Compile the FIB out of all routes retained in the RIB. Non-forwarding routes are skipped.
    pub fn compile(rib: &Rib) -> Self {
        let mut entries: BTreeMap<Prefix, Vec<FibEntry>> = BTreeMap::new();
        let mut unresolved = Vec::new();
        let mut non_forwarding = Vec::new();
        for route in rib.routes() {
            if route.non_forwarding {
                non_forwarding.push(route.clone());
                continue;
            }
            let mut actions = BTreeSet::new();
            if route.protocol == RoutingProtocol::Local {
                actions.insert(FibAction::Accept);
            } else {
                let mut visited = BTreeSet::new();
                visited.insert(route.prefix);
                resolve(rib, route, None, &mut visited, &mut actions);
            }
            if actions.is_empty() {
                debug!("route {} is unresolved", route);
                unresolved.push(route.clone());
                continue;
            }
            let list = entries.entry(route.prefix).or_default();
            list.extend(
                actions.into_iter().map(|action| FibEntry { route: route.clone(), action }),
            );
            list.sort();
        }
        Self { entries, unresolved, non_forwarding }
    }

    /// All entries, ordered by prefix
    pub fn entries(&self) -> impl Iterator<Item = (&Prefix, &[FibEntry])> {
        self.entries.iter().map(|(p, e)| (p, e.as_slice()))
    }

    /// Entries of exactly this prefix
    pub fn get(&self, prefix: &Prefix) -> Option<&[FibEntry]> {
        self.entries.get(prefix).map(|e| e.as_slice())
    }

    /// Routes whose next hop could not be resolved
    pub fn unresolved(&self) -> &[Route] {
        &self.unresolved
    }

    /// Routes of the RIB which are never used for forwarding
    pub fn non_forwarding_routes(&self) -> &[Route] {
        &self.non_forwarding
    }

    /// Number of prefixes in the FIB
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the FIB contains no entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest prefix match of the address
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<(Prefix, &[FibEntry])> {
        (0..=32u8).rev().find_map(|len| {
            let net = Ipv4Net::new(ip, len).ok()?.trunc();
            self.entries.get(&net).map(|e| (net, e.as_slice()))
        })
    }

    /// Distinct actions for the address
    pub fn actions(&self, ip: Ipv4Addr) -> BTreeSet<&FibAction> {
        match self.lookup(ip) {
            Some((_, entries)) => entries.iter().map(|e| &e.action).collect(),
            None => BTreeSet::new(),
        }
    }
}

/// Resolve the next hop of `route`, adding every action it reaches. `arp_ip` is the last next hop
/// address seen on the way. Returns `true` if at least one action was found.
fn resolve(
    rib: &Rib,
    route: &Route,
    arp_ip: Option<Ipv4Addr>,
    visited: &mut BTreeSet<Prefix>,
    actions: &mut BTreeSet<FibAction>,
) -> bool {
    match &route.next_hop {
        NextHop::Interface(interface) => {
            actions.insert(FibAction::Forward { interface: interface.clone(), arp_ip });
            true
        }
        NextHop::InterfaceIp(interface, ip) => {
            actions.insert(FibAction::Forward { interface: interface.clone(), arp_ip: Some(*ip) });
            true
        }
        NextHop::Discard => {
            actions.insert(FibAction::Drop);
            true
        }
        NextHop::Vrf(vrf) => {
            actions.insert(FibAction::NextVrf(vrf.clone()));
            true
        }
        NextHop::Ip(ip) => {
            let (prefix, routes) = match rib.longest_prefix_match(*ip, |r| !r.non_forwarding) {
                Some(m) => m,
                None => {
                    trace!("next hop {} of {} has no route", ip, route.prefix);
                    return false;
                }
            };
            if !visited.insert(prefix) {
                trace!("resolution of {} runs into a cycle at {}", route.prefix, prefix);
                return false;
            }
            let mut resolved = false;
            for r in routes {
                if r.protocol == RoutingProtocol::Local {
                    // the next hop is an address of this node
                    continue;
                }
                resolved |= resolve(rib, r, Some(*ip), visited, actions);
            }
            visited.remove(&prefix);
            resolved
        }
    }
}
