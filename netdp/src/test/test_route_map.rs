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

//! Test route maps and routing policies.

use crate::dataplane::bgp::{BgpAttributes, BgpSessionType, Origin};
use crate::dataplane::route::RouteAttributes;
use crate::dataplane::route_map::RouteMapMatch as Match;
use crate::dataplane::route_map::RouteMapMatchAsPath as AClause;
use crate::dataplane::route_map::RouteMapMatchClause as Clause;
use crate::dataplane::route_map::RouteMapSet as Set;
use crate::dataplane::route_map::RouteMapState::*;
use crate::dataplane::route_map::*;
use crate::dataplane::{AsId, NextHop, Prefix, Route, RoutingProtocol};
use lazy_static::lazy_static;
use std::net::Ipv4Addr;
use std::sync::Arc;

lazy_static! {
    static ref N1: Ipv4Addr = "10.0.0.1".parse().unwrap();
    static ref N2: Ipv4Addr = "10.0.0.2".parse().unwrap();
    static ref P1: Prefix = "192.168.0.0/16".parse().unwrap();
    static ref P2: Prefix = "192.168.1.0/24".parse().unwrap();
    static ref P3: Prefix = "172.16.0.0/12".parse().unwrap();
}

fn bgp_route(prefix: Prefix) -> Route {
    let mut attrs = BgpAttributes::local(Origin::Igp, 0);
    attrs.as_path = vec![AsId(1), AsId(2), AsId(3)];
    attrs.received_from = Some(*N1);
    attrs.session_type = Some(BgpSessionType::EBgp);
    attrs.communities.insert(10);
    Route::new(prefix, RoutingProtocol::Bgp, 0, NextHop::Ip(*N1))
        .with_attributes(RouteAttributes::Bgp(Arc::new(attrs)))
}

#[test]
fn simple_matches() {
    let default_route = bgp_route(*P2);

    // Match on Neighbor
    let map = RouteMap::new(10, Deny, vec![Match::Neighbor(*N1)], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, true);
    let map = RouteMap::new(10, Deny, vec![Match::Neighbor(*N2)], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, false);

    // Match on NextHop
    let map = RouteMap::new(10, Deny, vec![Match::NextHop(*N1)], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, true);
    let mut route = default_route.clone();
    route.next_hop = NextHop::Interface("eth0".to_string());
    assert_eq!(map.apply(route).0, false);

    // Match on Prefix, exact
    let exact = Match::Prefix(vec![PrefixListEntry::exact(*P2)]);
    let map = RouteMap::new(10, Deny, vec![exact], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, true);
    assert_eq!(map.apply(bgp_route(*P1)).0, false);

    // Match on Prefix with ge and le
    let entry = PrefixListEntry::new(*P1, Some(20), Some(24));
    let map = RouteMap::new(10, Deny, vec![Match::Prefix(vec![entry])], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, true);
    assert_eq!(map.apply(bgp_route(*P1)).0, false);
    assert_eq!(map.apply(bgp_route("192.168.1.0/25".parse().unwrap())).0, false);
    assert_eq!(map.apply(bgp_route(*P3)).0, false);

    // Match on Prefix with only le
    let entry = PrefixListEntry::new(*P1, None, Some(24));
    assert!(entry.matches(&P1));
    assert!(entry.matches(&P2));
    assert!(!entry.matches(&P3));

    // Match on Protocol
    let map = RouteMap::new(10, Deny, vec![Match::Protocol(RoutingProtocol::Bgp)], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, true);
    let map = RouteMap::new(10, Deny, vec![Match::Protocol(RoutingProtocol::Ospf)], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, false);

    // Match on Tag
    let map = RouteMap::new(10, Deny, vec![Match::Tag(Clause::Equal(5))], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, false);
    let mut route = default_route.clone();
    route.tag = Some(5);
    assert_eq!(map.apply(route).0, true);

    // Match on Metric
    let map = RouteMap::new(10, Deny, vec![Match::Metric(Clause::RangeExclusive(0, 10))], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, true);
    let map = RouteMap::new(10, Deny, vec![Match::Metric(Clause::Range(1, 10))], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, false);

    // Match on AsPath
    let map = RouteMap::new(10, Deny, vec![Match::AsPath(AClause::Contains(AsId(2)))], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, true);
    let map = RouteMap::new(10, Deny, vec![Match::AsPath(AClause::Contains(AsId(4)))], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, false);
    let short = Match::AsPath(AClause::Length(Clause::Range(0, 2)));
    let map = RouteMap::new(10, Deny, vec![short], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, false);
    // routes of other protocols have an empty path
    let ospf = Route::new(*P2, RoutingProtocol::Ospf, 10, NextHop::Ip(*N1));
    assert_eq!(map.apply(ospf.clone()).0, true);

    // Match on Community
    let map = RouteMap::new(10, Deny, vec![Match::Community(Some(Clause::Equal(10)))], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, true);
    assert_eq!(map.apply(ospf.clone()).0, false);
    let map = RouteMap::new(10, Deny, vec![Match::Community(None)], vec![]);
    assert_eq!(map.apply(default_route.clone()).0, false);
    assert_eq!(map.apply(ospf).0, true);
}

#[test]
fn complex_matches() {
    let default_route = bgp_route(*P2);

    // And of two conditions
    let map = RouteMap::new(
        10,
        Deny,
        vec![Match::Neighbor(*N1), Match::Protocol(RoutingProtocol::Bgp)],
        vec![],
    );
    assert_eq!(map.apply(default_route.clone()), (true, None));
    let map = RouteMap::new(
        10,
        Deny,
        vec![Match::Neighbor(*N1), Match::Protocol(RoutingProtocol::Ibgp)],
        vec![],
    );
    assert_eq!(map.apply(default_route.clone()), (false, Some(default_route.clone())));

    // no condition matches everything
    let map = RouteMap::new(10, Deny, vec![], vec![]);
    assert_eq!(map.apply(default_route), (true, None));
}

#[test]
fn overwrite() {
    let default_route = bgp_route(*P2);

    // overwrite next hop
    let map = RouteMap::new(10, Allow, vec![], vec![Set::NextHop(*N2)]);
    assert_eq!(map.apply(default_route.clone()).1.unwrap().next_hop, NextHop::Ip(*N2));

    // overwrite local pref, and reset it
    let map = RouteMap::new(10, Allow, vec![], vec![Set::LocalPref(Some(20))]);
    let changed = map.apply(default_route.clone()).1.unwrap();
    assert_eq!(changed.bgp().unwrap().local_pref, 20);
    let map = RouteMap::new(10, Allow, vec![], vec![Set::LocalPref(None)]);
    assert_eq!(map.apply(changed).1.unwrap().bgp().unwrap().local_pref, 100);

    // overwrite med, which is also the metric of BGP routes
    let map = RouteMap::new(10, Allow, vec![], vec![Set::Med(Some(42))]);
    let changed = map.apply(default_route.clone()).1.unwrap();
    assert_eq!(changed.bgp().unwrap().med, 42);
    assert_eq!(changed.metric, 42);

    // communities
    let map = RouteMap::new(10, Allow, vec![], vec![Set::Community(Some(20))]);
    let changed = map.apply(default_route.clone()).1.unwrap();
    let communities: Vec<_> = changed.bgp().unwrap().communities.iter().copied().collect();
    assert_eq!(communities, vec![10, 20]);
    let map = RouteMap::new(10, Allow, vec![], vec![Set::Community(None)]);
    assert!(map.apply(changed).1.unwrap().bgp().unwrap().communities.is_empty());

    // as path prepending
    let map = RouteMap::new(10, Allow, vec![], vec![Set::AsPathPrepend(vec![AsId(7), AsId(7)])]);
    let changed = map.apply(default_route.clone()).1.unwrap();
    assert_eq!(
        changed.bgp().unwrap().as_path,
        vec![AsId(7), AsId(7), AsId(1), AsId(2), AsId(3)]
    );

    // tag and metric on routes of any protocol
    let ospf = Route::new(*P2, RoutingProtocol::Ospf, 10, NextHop::Ip(*N1));
    let map = RouteMap::new(10, Allow, vec![], vec![Set::Tag(Some(3)), Set::Metric(99)]);
    let changed = map.apply(ospf.clone()).1.unwrap();
    assert_eq!(changed.tag, Some(3));
    assert_eq!(changed.metric, 99);
    // BGP only attributes are ignored
    let map = RouteMap::new(10, Allow, vec![], vec![Set::LocalPref(Some(20))]);
    assert_eq!(map.apply(ospf.clone()).1, Some(ospf));

    // the original route is not changed
    assert_eq!(default_route.bgp().unwrap().local_pref, 100);
    assert_eq!(default_route.bgp().unwrap().communities.len(), 1);
}

#[test]
fn builder() {
    let map = RouteMapBuilder::new()
        .order(10)
        .allow()
        .match_neighbor(*N1)
        .match_prefix(*P2)
        .set_community(1)
        .reset_local_pref()
        .build();
    assert_eq!(map.order(), 10);
    assert_eq!(map.state(), Allow);
    assert_eq!(
        map.conds(),
        &vec![Match::Neighbor(*N1), Match::Prefix(vec![PrefixListEntry::exact(*P2)])]
    );
    assert_eq!(map.actions(), &vec![Set::Community(Some(1)), Set::LocalPref(None)]);

    // deny maps drop their set actions
    let map = RouteMapBuilder::new().order(20).deny().match_tag(3).set_metric(10).build();
    assert_eq!(map.state(), Deny);
    assert!(map.actions().is_empty());
}

#[test]
fn builder_clauses() {
    let route = bgp_route(*P2);

    let map = RouteMapBuilder::new()
        .order(10)
        .allow()
        .match_protocol(RoutingProtocol::Bgp)
        .match_community(10)
        .match_as_path_contains(AsId(2))
        .match_as_path_length(3)
        .match_as_path_length_range(1, 3)
        .build();
    assert_eq!(
        map.conds(),
        &vec![
            Match::Protocol(RoutingProtocol::Bgp),
            Match::Community(Some(Clause::Equal(10))),
            Match::AsPath(AClause::Contains(AsId(2))),
            Match::AsPath(AClause::Length(Clause::Equal(3))),
            Match::AsPath(AClause::Length(Clause::Range(1, 3))),
        ]
    );
    assert!(map.matches(&route));
    let map = RouteMapBuilder::new().order(10).allow().match_as_path_length(2).build();
    assert!(!map.matches(&route));
    let map = RouteMapBuilder::new().order(10).allow().match_community(11).build();
    assert!(!map.matches(&route));

    // set and reset MED
    let map = RouteMapBuilder::new().order(10).allow().set_med(30).build();
    let changed = map.apply(route.clone()).1.unwrap();
    assert_eq!(changed.bgp().unwrap().med, 30);
    assert_eq!(changed.metric, 30);
    let map = RouteMapBuilder::new().order(10).allow().reset_med().build();
    let reset = map.apply(changed).1.unwrap();
    assert_eq!(reset.bgp().unwrap().med, 0);
    assert_eq!(reset.metric, 0);

    // tag, communities and AS path prepending
    let map = RouteMapBuilder::new()
        .order(10)
        .allow()
        .set_tag(4)
        .reset_community()
        .set_community(99)
        .prepend_as_path(vec![AsId(65000)])
        .build();
    assert_eq!(
        map.actions(),
        &vec![
            Set::Tag(Some(4)),
            Set::Community(None),
            Set::Community(Some(99)),
            Set::AsPathPrepend(vec![AsId(65000)]),
        ]
    );
    let changed = map.apply(route).1.unwrap();
    assert_eq!(changed.tag, Some(4));
    assert_eq!(changed.bgp().unwrap().communities.iter().copied().collect::<Vec<_>>(), vec![99]);
    assert_eq!(changed.bgp().unwrap().as_path, vec![AsId(65000), AsId(1), AsId(2), AsId(3)]);
}

#[test]
fn policy() {
    let policy = RoutePolicy::new(vec![
        RouteMapBuilder::new().order(30).allow().set_local_pref(50).build(),
        RouteMapBuilder::new().order(10).deny().match_prefix(*P1).build(),
        RouteMapBuilder::new()
            .order(20)
            .allow()
            .match_prefix_range(*P1, None, Some(24))
            .set_local_pref(200)
            .build(),
    ]);
    assert_eq!(policy.maps().iter().map(|m| m.order()).collect::<Vec<_>>(), vec![10, 20, 30]);

    assert_eq!(policy.apply(bgp_route(*P1)), None);
    assert_eq!(policy.apply(bgp_route(*P2)).unwrap().bgp().unwrap().local_pref, 200);
    assert_eq!(policy.apply(bgp_route(*P3)).unwrap().bgp().unwrap().local_pref, 50);

    // routes matched by no map are denied
    let only_p1 = RouteMapBuilder::new().order(10).allow().match_prefix(*P1).build();
    let strict = RoutePolicy::new(vec![only_p1]);
    assert_eq!(strict.apply(bgp_route(*P2)), None);
    assert!(strict.apply(bgp_route(*P1)).is_some());

    let all = RoutePolicy::permit_all();
    assert_eq!(all.apply(bgp_route(*P3)), Some(bgp_route(*P3)));
}
