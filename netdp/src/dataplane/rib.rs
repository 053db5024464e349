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

//! # Routing Information Base
//!
//! Map from destination prefix to the most preferred route(s). With multipath enabled, all
//! routes that are equally preferred (see [`RoutePreference`]) are kept. Otherwise, a single route
//! is chosen with [`compare_tie_break`]. The result of merging a set of routes does not depend on
//! the order in which they are merged.

use super::preference::{compare_tie_break, RoutePreference};
use super::route::Route;
use super::types::{is_normalized, Prefix};

use ipnet::Ipv4Net;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Routing information base of one protocol (or the main RIB) of a virtual router.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rib {
    multipath: bool,
    routes: BTreeMap<Prefix, BTreeSet<Route>>,
}

impl Rib {
    /// Create an empty RIB
    pub fn new(multipath: bool) -> Self {
        Self { multipath, routes: BTreeMap::new() }
    }

    /// Returns `true` if equally preferred routes are all kept
    pub fn multipath(&self) -> bool {
        self.multipath
    }

    /// Merge a candidate route. Returns `true` if the retained routes for the prefix changed.
    ///
    /// # Panics
    /// The function panics if the prefix of the route is not normalized.
    pub fn merge(&mut self, route: Route) -> bool {
        assert!(is_normalized(&route.prefix), "Route prefix {} is not normalized", route.prefix);
        let multipath = self.multipath;
        let best = self.routes.entry(route.prefix).or_insert_with(BTreeSet::new);
        let current = match best.iter().next() {
            Some(r) => r.clone(),
            None => {
                best.insert(route);
                return true;
            }
        };
        match route.compare_preference(&current) {
            Ordering::Less => false,
            Ordering::Greater => {
                best.clear();
                best.insert(route);
                true
            }
            Ordering::Equal if multipath => best.insert(route),
            Ordering::Equal => {
                if compare_tie_break(&route, &current) == Ordering::Greater {
                    best.clear();
                    best.insert(route);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Merge all routes, returning `true` if any merge changed the RIB.
    pub fn merge_all<I: IntoIterator<Item = Route>>(&mut self, routes: I) -> bool {
        routes.into_iter().fold(false, |changed, r| self.merge(r) || changed)
    }

    /// Remove exactly this route. Returns `true` if it was present.
    pub fn remove(&mut self, route: &Route) -> bool {
        let removed = match self.routes.get_mut(&route.prefix) {
            Some(set) => set.remove(route),
            None => false,
        };
        if removed && self.routes.get(&route.prefix).map(|s| s.is_empty()).unwrap_or(false) {
            self.routes.remove(&route.prefix);
        }
        removed
    }

    /// All retained routes for the prefix
    pub fn get(&self, prefix: &Prefix) -> Option<&BTreeSet<Route>> {
        self.routes.get(prefix)
    }

    /// The single best route for the prefix, using the tie-break among equally preferred routes.
    pub fn best(&self, prefix: &Prefix) -> Option<&Route> {
        self.routes.get(prefix)?.iter().max_by(|a, b| compare_tie_break(a, b))
    }

    /// Iterator over all retained routes, ordered by prefix
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().flat_map(|s| s.iter())
    }

    /// Iterator over the single best route of every prefix
    pub fn best_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().filter_map(|s| s.iter().max_by(|a, b| compare_tie_break(a, b)))
    }

    /// Iterator over all prefixes
    pub fn prefixes(&self) -> impl Iterator<Item = &Prefix> {
        self.routes.keys()
    }

    /// Number of prefixes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the RIB contains no route
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Longest prefix match for `ip`, considering only routes for which `filter` returns `true`.
    /// Returns the matching prefix and its routes that pass the filter.
    pub fn longest_prefix_match<F>(&self, ip: Ipv4Addr, filter: F) -> Option<(Prefix, Vec<&Route>)>
    where
        F: Fn(&Route) -> bool,
    {
        for len in (0..=32u8).rev() {
            let net = match Ipv4Net::new(ip, len) {
                Ok(net) => net.trunc(),
                Err(_) => continue,
            };
            if let Some(set) = self.routes.get(&net) {
                let routes: Vec<&Route> = set.iter().filter(|r| filter(r)).collect();
                if !routes.is_empty() {
                    return Some((net, routes));
                }
            }
        }
        None
    }
}
