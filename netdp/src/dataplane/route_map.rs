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

//! # Route-Maps
//!
//! A [`RoutePolicy`] is a named list of [`RouteMap`]s, checked by increasing order. The first route
//! map whose conditions all hold decides the fate of the route: a `deny` map drops it, a `permit`
//! map rewrites it with its set actions and lets it pass. A route no map matches is dropped.
//!
//! Policies are attached to BGP sessions (import and export) and to redistribution statements.

use super::route::{NextHop, Route, RouteAttributes, RoutingProtocol};
use super::types::{AsId, Prefix};

use itertools::Itertools;
use log::*;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// A single entry of a routing policy.
///
/// ```
/// # use netdp::dataplane::route_map::*;
/// # use std::net::Ipv4Addr;
/// let neighbor: Ipv4Addr = "10.0.0.1".parse().unwrap();
/// let map = RouteMapBuilder::new()
///     .order(10)
///     .allow()
///     .match_neighbor(neighbor)
///     .match_prefix("10.0.0.0/8".parse().unwrap())
///     .set_community(1)
///     .reset_local_pref()
///     .build();
/// assert_eq!(map.order(), 10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMap {
    /// Sequence number, lower numbers are checked first.
    pub(crate) order: usize,
    pub(crate) state: RouteMapState,
    /// Conjunction of conditions. An empty list matches every route.
    pub(crate) conds: Vec<RouteMapMatch>,
    pub(crate) set: Vec<RouteMapSet>,
}

impl RouteMap {
    /// Assemble a route map out of its parts
    pub(crate) fn new(
        order: usize,
        state: RouteMapState,
        conds: Vec<RouteMapMatch>,
        set: Vec<RouteMapSet>,
    ) -> Self {
        Self { order, state, conds, set }
    }

    /// Run the route through this map. Returns `(matched, result)`, where `result` is `None` only
    /// if a `deny` map matched. Unmatched routes are handed back untouched.
    pub fn apply(&self, mut route: Route) -> (bool, Option<Route>) {
        if !self.matches(&route) {
            return (false, Some(route));
        }
        match self.state {
            RouteMapState::Deny => (true, None),
            RouteMapState::Allow => {
                for action in self.set.iter() {
                    action.apply(&mut route);
                }
                (true, Some(route))
            }
        }
    }

    /// Sequence number of the map
    pub fn order(&self) -> usize {
        self.order
    }

    /// `Allow` or `Deny`
    pub fn state(&self) -> RouteMapState {
        self.state
    }

    /// Conditions, all of which must hold
    pub fn conds(&self) -> &Vec<RouteMapMatch> {
        &self.conds
    }

    /// Set actions applied to permitted routes
    pub fn actions(&self) -> &Vec<RouteMapSet> {
        &self.set
    }

    /// `true` if every condition holds for `route`.
    pub fn matches(&self, route: &Route) -> bool {
        self.conds.iter().all(|c| c.matches(route))
    }
}

impl fmt::Display for RouteMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.state.is_allow() { "permit" } else { "deny" };
        write!(f, "{} {}", state, self.order)?;
        if !self.conds.is_empty() {
            write!(f, " [{}]", self.conds.iter().join(", "))?;
        }
        if !self.set.is_empty() {
            write!(f, " {{{}}}", self.set.iter().join(", "))?;
        }
        Ok(())
    }
}

/// Ordered collection of route maps, referenced by name from the configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoutePolicy {
    maps: Vec<RouteMap>,
}

impl RoutePolicy {
    /// Build a policy. The maps are sorted by their order, so the input order is irrelevant.
    pub fn new(mut maps: Vec<RouteMap>) -> Self {
        maps.sort_by_key(|m| m.order);
        Self { maps }
    }

    /// Single catch-all `permit` map without actions.
    pub fn permit_all() -> Self {
        Self::new(vec![RouteMap::new(u16::MAX as usize, RouteMapState::Allow, vec![], vec![])])
    }

    /// Route maps in the order they are checked
    pub fn maps(&self) -> &[RouteMap] {
        &self.maps
    }

    /// Evaluate the policy on `route`. `None` means the route is rejected, either by a `deny` map
    /// or because no map matched.
    pub fn apply(&self, route: Route) -> Option<Route> {
        match self.maps.iter().find(|m| m.matches(&route)) {
            Some(map) => map.apply(route).1,
            None => None,
        }
    }
}

/// Look up and evaluate a policy referenced by name. Without a reference, the route passes
/// unchanged. A reference to a policy that does not exist rejects everything.
pub(crate) fn apply_policy(
    policies: &BTreeMap<String, RoutePolicy>,
    name: Option<&str>,
    route: Route,
) -> Option<Route> {
    let name = match name {
        Some(name) => name,
        None => return Some(route),
    };
    match policies.get(name) {
        Some(policy) => policy.apply(route),
        None => {
            warn!("Route policy {} is not defined! Denying {}", name, route.prefix);
            None
        }
    }
}

/// Chainable constructor for [`RouteMap`].
///
/// `order` and one of `allow`, `deny` or `state` are mandatory. Without any `match_*` call, the
/// resulting map matches every route. Set actions given to a `deny` map are dropped.
/// ```
/// # use netdp::dataplane::route_map::*;
/// let map = RouteMapBuilder::new()
///     .order(10)
///     .deny()
///     .match_prefix_range("10.0.0.0/8".parse().unwrap(), Some(24), None)
///     .build();
/// assert!(map.actions().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct RouteMapBuilder {
    order: Option<usize>,
    state: Option<RouteMapState>,
    conds: Vec<RouteMapMatch>,
    set: Vec<RouteMapSet>,
}

impl RouteMapBuilder {
    /// Builder without order, state, conditions or actions
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the map
    pub fn order(&mut self, order: usize) -> &mut Self {
        self.order = Some(order);
        self
    }

    /// Whether the map permits or denies matching routes
    pub fn state(&mut self, state: RouteMapState) -> &mut Self {
        self.state = Some(state);
        self
    }

    /// Shorthand for `state(RouteMapState::Allow)`
    pub fn allow(&mut self) -> &mut Self {
        self.state(RouteMapState::Allow)
    }

    /// Shorthand for `state(RouteMapState::Deny)`
    pub fn deny(&mut self) -> &mut Self {
        self.state(RouteMapState::Deny)
    }

    /// Append an arbitrary condition. All `match_*` methods end up here.
    pub fn cond(&mut self, cond: RouteMapMatch) -> &mut Self {
        self.conds.push(cond);
        self
    }

    /// Route was learned over the BGP session with this peer address
    pub fn match_neighbor(&mut self, neighbor: Ipv4Addr) -> &mut Self {
        self.cond(RouteMapMatch::Neighbor(neighbor))
    }

    /// Destination is exactly `prefix`
    pub fn match_prefix(&mut self, prefix: Prefix) -> &mut Self {
        self.cond(RouteMapMatch::Prefix(vec![PrefixListEntry::exact(prefix)]))
    }

    /// Destination lies within `prefix`, with a length bounded by `ge` and `le`
    pub fn match_prefix_range(
        &mut self,
        prefix: Prefix,
        ge: Option<u8>,
        le: Option<u8>,
    ) -> &mut Self {
        self.cond(RouteMapMatch::Prefix(vec![PrefixListEntry::new(prefix, ge, le)]))
    }

    /// Route was produced by `protocol`
    pub fn match_protocol(&mut self, protocol: RoutingProtocol) -> &mut Self {
        self.cond(RouteMapMatch::Protocol(protocol))
    }

    /// Route carries exactly this tag
    pub fn match_tag(&mut self, tag: u32) -> &mut Self {
        self.cond(RouteMapMatch::Tag(RouteMapMatchClause::Equal(tag)))
    }

    /// AS path traverses `as_id`
    pub fn match_as_path_contains(&mut self, as_id: AsId) -> &mut Self {
        self.cond(RouteMapMatch::AsPath(RouteMapMatchAsPath::Contains(as_id)))
    }

    /// AS path has exactly `len` entries
    pub fn match_as_path_length(&mut self, len: usize) -> &mut Self {
        let clause = RouteMapMatchClause::Equal(len);
        self.cond(RouteMapMatch::AsPath(RouteMapMatchAsPath::Length(clause)))
    }

    /// AS path length in `from..=to`
    pub fn match_as_path_length_range(&mut self, from: usize, to: usize) -> &mut Self {
        let clause = RouteMapMatchClause::Range(from, to);
        self.cond(RouteMapMatch::AsPath(RouteMapMatchAsPath::Length(clause)))
    }

    /// Route carries `community`
    pub fn match_community(&mut self, community: u32) -> &mut Self {
        self.cond(RouteMapMatch::Community(Some(RouteMapMatchClause::Equal(community))))
    }

    /// Append an arbitrary action. All `set_*`, `reset_*` and `prepend_*` methods end up here.
    pub fn add_set(&mut self, set: RouteMapSet) -> &mut Self {
        self.set.push(set);
        self
    }

    /// Overwrite the local preference
    pub fn set_local_pref(&mut self, local_pref: u32) -> &mut Self {
        self.add_set(RouteMapSet::LocalPref(Some(local_pref)))
    }

    /// Local preference back to 100
    pub fn reset_local_pref(&mut self) -> &mut Self {
        self.add_set(RouteMapSet::LocalPref(None))
    }

    /// Overwrite the MED, and with it the metric of BGP routes
    pub fn set_med(&mut self, med: u32) -> &mut Self {
        self.add_set(RouteMapSet::Med(Some(med)))
    }

    /// MED back to 0
    pub fn reset_med(&mut self) -> &mut Self {
        self.add_set(RouteMapSet::Med(None))
    }

    /// Overwrite the metric of routes of any protocol
    pub fn set_metric(&mut self, metric: u64) -> &mut Self {
        self.add_set(RouteMapSet::Metric(metric))
    }

    /// Overwrite the tag of routes of any protocol
    pub fn set_tag(&mut self, tag: u32) -> &mut Self {
        self.add_set(RouteMapSet::Tag(Some(tag)))
    }

    /// Add `community` to the existing ones
    pub fn set_community(&mut self, community: u32) -> &mut Self {
        self.add_set(RouteMapSet::Community(Some(community)))
    }

    /// Strip every community
    pub fn reset_community(&mut self) -> &mut Self {
        self.add_set(RouteMapSet::Community(None))
    }

    /// Put `path` in front of the AS path
    pub fn prepend_as_path(&mut self, path: Vec<AsId>) -> &mut Self {
        self.add_set(RouteMapSet::AsPathPrepend(path))
    }

    /// Finish the route map. The builder can be reused afterwards.
    ///
    /// # Panics
    /// Panics if the order or the state is missing. Both are programming errors in the code
    /// constructing the policy.
    pub fn build(&self) -> RouteMap {
        let (order, state) = match (self.order, self.state) {
            (Some(order), Some(state)) => (order, state),
            (None, _) => panic!("RouteMapBuilder::build called without an order"),
            (_, None) => panic!("RouteMapBuilder::build called without allow or deny"),
        };
        let set = match state {
            RouteMapState::Allow => self.set.clone(),
            RouteMapState::Deny => Vec::new(),
        };
        RouteMap::new(order, state, self.conds.clone(), set)
    }
}

/// Whether a matching route map lets the route pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMapState {
    /// Matching routes pass, after the set actions are applied
    Allow,
    /// Matching routes are dropped
    Deny,
}

impl RouteMapState {
    /// `true` for `Allow`
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// `true` for `Deny`
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny)
    }
}

/// Entry of a prefix list. Without `ge` and `le`, only the exact prefix matches. Otherwise, every
/// prefix covered by `prefix` whose length is in `ge..=le` matches (`ge` defaults to the length of
/// `prefix`, `le` to 32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefixListEntry {
    /// Covering prefix, with host bits cleared
    pub prefix: Prefix,
    /// Lower bound on the prefix length
    pub ge: Option<u8>,
    /// Upper bound on the prefix length
    pub le: Option<u8>,
}

impl PrefixListEntry {
    /// Entry with optional length bounds. Host bits of `prefix` are ignored.
    pub fn new(prefix: Prefix, ge: Option<u8>, le: Option<u8>) -> Self {
        Self { prefix: prefix.trunc(), ge, le }
    }

    /// Entry matching nothing but `prefix`
    pub fn exact(prefix: Prefix) -> Self {
        Self::new(prefix, None, None)
    }

    /// `true` if `prefix` is covered and its length is within the bounds
    pub fn matches(&self, prefix: &Prefix) -> bool {
        let len = prefix.prefix_len();
        let own = self.prefix.prefix_len();
        let (min, max) = match (self.ge, self.le) {
            (None, None) => (own, own),
            (ge, le) => (ge.unwrap_or(own), le.unwrap_or(32)),
        };
        len >= own.max(min) && len <= max && self.prefix.contains(prefix)
    }
}

impl fmt::Display for PrefixListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if let Some(ge) = self.ge {
            write!(f, " ge {}", ge)?;
        }
        if let Some(le) = self.le {
            write!(f, " le {}", le)?;
        }
        Ok(())
    }
}

/// Condition of a route map.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMapMatch {
    /// Peer address of the BGP session the route came from. Never matches non-BGP routes.
    Neighbor(Ipv4Addr),
    /// Prefix list, matching if any entry does
    Prefix(Vec<PrefixListEntry>),
    /// Protocol which produced the route
    Protocol(RoutingProtocol),
    /// Untagged routes never match
    Tag(RouteMapMatchClause<u32>),
    /// Metric of the route
    Metric(RouteMapMatchClause<u64>),
    /// Non-BGP routes are treated as having an empty AS path
    AsPath(RouteMapMatchAsPath),
    /// Only explicit next hop addresses can match
    NextHop(Ipv4Addr),
    /// `Some`: any community satisfies the clause. `None`: the route has no community.
    Community(Option<RouteMapMatchClause<u32>>),
}

impl RouteMapMatch {
    /// `true` if the condition holds for `route`
    pub fn matches(&self, route: &Route) -> bool {
        let bgp = route.bgp();
        match self {
            Self::Neighbor(n) => bgp.and_then(|a| a.received_from) == Some(*n),
            Self::Prefix(entries) => entries.iter().any(|e| e.matches(&route.prefix)),
            Self::Protocol(p) => route.protocol == *p,
            Self::Tag(clause) => matches!(route.tag, Some(t) if clause.matches(&t)),
            Self::Metric(clause) => clause.matches(&route.metric),
            Self::AsPath(clause) => {
                clause.matches(bgp.map(|a| a.as_path.as_slice()).unwrap_or(&[]))
            }
            Self::NextHop(nh) => route.next_hop.ip() == Some(*nh),
            Self::Community(Some(clause)) => {
                bgp.map_or(false, |a| a.communities.iter().any(|c| clause.matches(c)))
            }
            Self::Community(None) => bgp.map_or(true, |a| a.communities.is_empty()),
        }
    }
}

impl fmt::Display for RouteMapMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neighbor(n) => write!(f, "neighbor {}", n),
            Self::Prefix(entries) => write!(f, "prefix [{}]", entries.iter().join(" | ")),
            Self::Protocol(p) => write!(f, "protocol {:?}", p),
            Self::Tag(c) => write!(f, "tag {}", c),
            Self::Metric(c) => write!(f, "metric {}", c),
            Self::AsPath(RouteMapMatchAsPath::Contains(as_id)) => {
                write!(f, "as-path contains {}", as_id.0)
            }
            Self::AsPath(RouteMapMatchAsPath::Length(c)) => write!(f, "as-path length {}", c),
            Self::NextHop(nh) => write!(f, "next-hop {}", nh),
            Self::Community(Some(c)) => write!(f, "community {}", c),
            Self::Community(None) => write!(f, "no community"),
        }
    }
}

/// Comparison of a single value
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMapMatchClause<T> {
    /// `lo..=hi`
    Range(T, T),
    /// `lo..hi`
    RangeExclusive(T, T),
    /// Exactly this value
    Equal(T),
}

impl<T: PartialOrd> RouteMapMatchClause<T> {
    /// `true` if `val` satisfies the comparison
    pub fn matches(&self, val: &T) -> bool {
        match self {
            Self::Equal(x) => val == x,
            Self::Range(lo, hi) => lo <= val && val <= hi,
            Self::RangeExclusive(lo, hi) => lo <= val && val < hi,
        }
    }
}

impl<T: fmt::Display> fmt::Display for RouteMapMatchClause<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal(x) => write!(f, "{}", x),
            Self::Range(lo, hi) => write!(f, "{}..={}", lo, hi),
            Self::RangeExclusive(lo, hi) => write!(f, "{}..{}", lo, hi),
        }
    }
}

/// Condition on the AS path
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMapMatchAsPath {
    /// The AS appears anywhere on the path
    Contains(AsId),
    /// Number of entries on the path
    Length(RouteMapMatchClause<usize>),
}

impl RouteMapMatchAsPath {
    /// `true` if `path` satisfies the condition
    pub fn matches(&self, path: &[AsId]) -> bool {
        match self {
            Self::Contains(as_id) => path.contains(as_id),
            Self::Length(clause) => clause.matches(&path.len()),
        }
    }
}

/// Action of a permitting route map. BGP-only actions leave other routes untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMapSet {
    /// Replace the next hop by this address
    NextHop(Ipv4Addr),
    /// `None` restores the default of 100
    LocalPref(Option<u32>),
    /// `None` restores 0. Also updates the metric of the route.
    Med(Option<u32>),
    /// Replace the metric
    Metric(u64),
    /// `None` removes the tag
    Tag(Option<u32>),
    /// `Some` adds a community, `None` removes all of them
    Community(Option<u32>),
    /// Put these AS numbers in front of the path
    AsPathPrepend(Vec<AsId>),
}

impl RouteMapSet {
    /// Rewrite the route in place. Shared BGP attributes are cloned on write.
    pub fn apply(&self, route: &mut Route) {
        match self {
            Self::NextHop(nh) => route.next_hop = NextHop::Ip(*nh),
            Self::Metric(m) => route.metric = *m,
            Self::Tag(t) => route.tag = *t,
            _ => {
                let attrs = match &mut route.attributes {
                    RouteAttributes::Bgp(a) => Arc::make_mut(a),
                    _ => return,
                };
                match self {
                    Self::LocalPref(lp) => {
                        attrs.local_pref = lp.unwrap_or(super::bgp::DEFAULT_LOCAL_PREF)
                    }
                    Self::Med(med) => {
                        attrs.med = med.unwrap_or(0);
                        route.metric = attrs.med as u64;
                    }
                    Self::Community(Some(c)) => {
                        attrs.communities.insert(*c);
                    }
                    Self::Community(None) => attrs.communities.clear(),
                    Self::AsPathPrepend(path) => {
                        attrs.as_path.splice(0..0, path.iter().copied());
                    }
                    Self::NextHop(_) | Self::Metric(_) | Self::Tag(_) => {}
                }
            }
        }
    }
}

impl fmt::Display for RouteMapSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NextHop(nh) => write!(f, "next-hop {}", nh),
            Self::LocalPref(Some(lp)) => write!(f, "local-pref {}", lp),
            Self::LocalPref(None) => write!(f, "local-pref default"),
            Self::Med(Some(med)) => write!(f, "med {}", med),
            Self::Med(None) => write!(f, "med default"),
            Self::Metric(m) => write!(f, "metric {}", m),
            Self::Tag(Some(t)) => write!(f, "tag {}", t),
            Self::Tag(None) => write!(f, "no tag"),
            Self::Community(Some(c)) => write!(f, "community +{}", c),
            Self::Community(None) => write!(f, "no community"),
            Self::AsPathPrepend(path) => {
                write!(f, "as-path prepend {}", path.iter().map(|a| a.0).join(" "))
            }
        }
    }
}
