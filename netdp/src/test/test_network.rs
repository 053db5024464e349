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

//! Test the computation of the data plane on small networks running the different protocols.

use crate::dataplane::eigrp::{EigrpInterfaceSettings, EigrpMetricVersion, EigrpProcess};
use crate::dataplane::isis::*;
use crate::dataplane::ospf::{OspfArea, OspfInterfaceSettings, OspfProcess};
use crate::dataplane::redistribution::{Redistribution, RedistributionSource};
use crate::dataplane::route_map::{RouteMapBuilder, RoutePolicy};
use crate::dataplane::*;
use crate::ipspace::Packet;
use crate::Error;
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

fn prefix(s: &str) -> Prefix {
    s.parse().unwrap()
}

fn iface(name: &str, addr: &str) -> Interface {
    Interface::new(name, Some(addr.parse().unwrap()))
}

fn network(list: Vec<Configuration>) -> BTreeMap<String, Configuration> {
    list.into_iter().map(|c| (c.hostname.clone(), c)).collect()
}

fn compute(configs: &BTreeMap<String, Configuration>) -> DataPlane {
    let _ = pretty_env_logger::try_init();
    let dp = compute_data_plane(configs.clone(), &EngineSettings::new()).unwrap();
    assert_eq!(dp.status(), ConvergenceStatus::Converged);
    dp
}

fn best(dp: &DataPlane, host: &str, p: &str) -> Option<Route> {
    dp.rib(host, DEFAULT_VRF).unwrap().best(&prefix(p)).cloned()
}

fn trace(dp: &DataPlane, host: &str, dst: &str) -> Vec<Trace> {
    dp.trace(host, DEFAULT_VRF, &Packet::new(ip("192.0.2.1"), ip(dst))).unwrap()
}

fn hops(t: &Trace) -> Vec<(&str, Option<&str>)> {
    t.hops.iter().map(|h| (h.hostname.as_str(), h.out_interface.as_deref())).collect()
}

lazy_static! {
    /// # OSPF chain
    ///
    /// ```text
    /// r1 ---- r2 ---- r3 (lo: 3.3.3.3/32)
    ///    .0.0/30  .0.4/30
    /// ```
    static ref OSPF_CHAIN: BTreeMap<String, Configuration> = {
        let area = || OspfInterfaceSettings::new(OspfArea::BACKBONE);
        let mut r1 = Configuration::new("r1");
        r1.add_interface(iface("eth0", "10.0.0.1/30").ospf(area()));
        r1.default_vrf_mut().ospf = Some(OspfProcess::new(ip("1.1.1.1")));
        let mut r2 = Configuration::new("r2");
        r2.add_interface(iface("eth0", "10.0.0.2/30").ospf(area()));
        r2.add_interface(iface("eth1", "10.0.0.5/30").ospf(area()));
        r2.default_vrf_mut().ospf = Some(OspfProcess::new(ip("2.2.2.2")));
        let mut r3 = Configuration::new("r3");
        r3.add_interface(iface("eth0", "10.0.0.6/30").ospf(area()));
        r3.add_interface(iface("lo", "3.3.3.3/32").ospf(area().passive()));
        r3.default_vrf_mut().ospf = Some(OspfProcess::new(ip("3.3.3.3")));
        network(vec![r1, r2, r3])
    };
}

#[test]
fn ospf_chain() {
    let dp = compute(&OSPF_CHAIN);
    let route = best(&dp, "r1", "3.3.3.3/32").unwrap();
    assert_eq!(route.protocol, RoutingProtocol::Ospf);
    // every link has cost 1 with the default bandwidth
    assert_eq!(route.metric, 3);
    assert_eq!(route.next_hop, NextHop::InterfaceIp("eth0".to_string(), ip("10.0.0.2")));
    assert_eq!(best(&dp, "r2", "3.3.3.3/32").unwrap().metric, 2);
    assert_eq!(best(&dp, "r1", "10.0.0.4/30").unwrap().metric, 2);
    // connected routes are preferred over the OSPF routes for the same subnet
    assert_eq!(best(&dp, "r1", "10.0.0.0/30").unwrap().protocol, RoutingProtocol::Connected);
    assert!(dp.router("r1", DEFAULT_VRF).unwrap().ospf_rib().get(&prefix("10.0.0.0/30")).is_some());

    let traces = trace(&dp, "r1", "3.3.3.3");
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].disposition, Disposition::Accepted);
    assert_eq!(hops(&traces[0]), vec![("r1", Some("eth0")), ("r2", Some("eth1")), ("r3", None)]);
}

#[test]
fn ospf_cost_from_bandwidth() {
    let mut configs = OSPF_CHAIN.clone();
    // 10 Mbps: cost 10
    let r2 = configs.get_mut("r2").unwrap();
    let slow = r2.interfaces["eth1"].clone().bandwidth(10_000_000);
    r2.add_interface(slow);
    let dp = compute(&configs);
    assert_eq!(best(&dp, "r1", "3.3.3.3/32").unwrap().metric, 12);
    // the cost is only applied on the receiving side
    assert_eq!(best(&dp, "r3", "10.0.0.0/30").unwrap().metric, 2);
}

#[test]
fn ospf_external_routes() {
    let mut configs = OSPF_CHAIN.clone();
    let r3 = configs.get_mut("r3").unwrap();
    r3.default_vrf_mut()
        .add_static_route(StaticRoute::new(prefix("172.16.0.0/16"), NextHop::Discard));
    let ospf = r3.default_vrf_mut().ospf.as_mut().unwrap();
    ospf.redistribute.push(Redistribution::new(RedistributionSource::Static));
    let dp = compute(&configs);

    let route = best(&dp, "r1", "172.16.0.0/16").unwrap();
    assert_eq!(route.protocol, RoutingProtocol::OspfE2);
    assert_eq!(route.metric, 20);
    assert_eq!(route.ospf().unwrap().cost_to_advertiser, 2);
    // the advertising router keeps its static route
    assert_eq!(best(&dp, "r3", "172.16.0.0/16").unwrap().protocol, RoutingProtocol::Static);
    let r3 = dp.router("r3", DEFAULT_VRF).unwrap();
    assert_eq!(r3.redistributed_routes(RoutingProtocol::OspfE2).len(), 1);

    let traces = trace(&dp, "r1", "172.16.1.1");
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].disposition, Disposition::NullRouted);
    assert_eq!(hops(&traces[0]).last(), Some(&("r3", None)));
}

/// # BGP with route reflection
///
/// ```text
///  AS 65001     AS 65002
///                     .3
///                 +--- r3 (lo: 3.3.3.3/32)
///  r1 ------ r2 --+ 10.0.1.0/24
///  (lo 1.1.1.1)   +--- r4
///                     .4
/// ```
///
/// r2 is a route reflector with the clients r3 and r4.
fn bgp_network() -> BTreeMap<String, Configuration> {
    let mut r1 = Configuration::new("r1");
    r1.add_interface(iface("eth0", "10.0.0.1/30"));
    r1.add_interface(iface("lo", "1.1.1.1/32"));
    let mut bgp = BgpProcess::new(ip("1.1.1.1"), AsId(65001));
    bgp.add_neighbor(BgpPeerConfig::new(ip("10.0.0.2"), AsId(65002)));
    bgp.add_network(prefix("1.1.1.1/32"));
    r1.default_vrf_mut().bgp = Some(bgp);

    let mut r2 = Configuration::new("r2");
    r2.add_interface(iface("eth0", "10.0.0.2/30"));
    r2.add_interface(iface("eth1", "10.0.1.1/24"));
    let mut bgp = BgpProcess::new(ip("2.2.2.2"), AsId(65002));
    bgp.add_neighbor(BgpPeerConfig::new(ip("10.0.0.1"), AsId(65001)));
    for client in ["10.0.1.3", "10.0.1.4"].iter() {
        let peer = BgpPeerConfig::new(ip(client), AsId(65002));
        bgp.add_neighbor(peer.route_reflector_client().next_hop_self());
    }
    r2.default_vrf_mut().bgp = Some(bgp);

    let mut r3 = Configuration::new("r3");
    r3.add_interface(iface("eth0", "10.0.1.3/24"));
    r3.add_interface(iface("lo", "3.3.3.3/32"));
    let mut bgp = BgpProcess::new(ip("3.3.3.3"), AsId(65002));
    bgp.add_neighbor(BgpPeerConfig::new(ip("10.0.1.1"), AsId(65002)));
    bgp.add_network(prefix("3.3.3.3/32"));
    r3.default_vrf_mut().bgp = Some(bgp);

    let mut r4 = Configuration::new("r4");
    r4.add_interface(iface("eth0", "10.0.1.4/24"));
    let mut bgp = BgpProcess::new(ip("4.4.4.4"), AsId(65002));
    bgp.add_neighbor(BgpPeerConfig::new(ip("10.0.1.1"), AsId(65002)));
    r4.default_vrf_mut().bgp = Some(bgp);

    network(vec![r1, r2, r3, r4])
}

#[test]
fn bgp_route_reflection() {
    let dp = compute(&bgp_network());

    // eBGP route at the reflector
    let route = best(&dp, "r2", "1.1.1.1/32").unwrap();
    assert_eq!(route.protocol, RoutingProtocol::Bgp);
    assert_eq!(route.next_hop, NextHop::Ip(ip("10.0.0.1")));
    assert_eq!(route.bgp().unwrap().as_path, vec![AsId(65001)]);

    // forwarded to both clients, with next-hop-self
    for client in ["r3", "r4"].iter() {
        let route = best(&dp, client, "1.1.1.1/32").unwrap();
        assert_eq!(route.protocol, RoutingProtocol::Ibgp);
        assert_eq!(route.next_hop, NextHop::Ip(ip("10.0.1.1")));
        assert_eq!(route.bgp().unwrap().as_path, vec![AsId(65001)]);
        assert_eq!(route.bgp().unwrap().local_pref, 100);
    }

    // reflected from r3 to r4
    let route = best(&dp, "r4", "3.3.3.3/32").unwrap();
    let attrs = route.bgp().unwrap();
    assert_eq!(attrs.originator_id, Some(ip("3.3.3.3")));
    assert_eq!(attrs.cluster_list, vec![ip("2.2.2.2")]);
    assert!(attrs.as_path.is_empty());

    // advertised to the eBGP neighbor with the AS prepended
    let route = best(&dp, "r1", "3.3.3.3/32").unwrap();
    assert_eq!(route.bgp().unwrap().as_path, vec![AsId(65002)]);
    assert_eq!(route.next_hop, NextHop::Ip(ip("10.0.0.2")));
    assert_eq!(route.bgp().unwrap().originator_id, None);

    // locally originated routes stay in the BGP RIB only
    let r1_bgp = dp.bgp_rib("r1", DEFAULT_VRF).unwrap();
    assert!(r1_bgp.best(&prefix("1.1.1.1/32")).unwrap().bgp().unwrap().is_local());
    assert_eq!(best(&dp, "r1", "1.1.1.1/32").unwrap().protocol, RoutingProtocol::Local);
    // a route is never advertised back to where it came from
    let r3_bgp = dp.bgp_rib("r3", DEFAULT_VRF).unwrap();
    let own = r3_bgp.get(&prefix("3.3.3.3/32")).unwrap();
    assert!(own.iter().all(|r| r.bgp().unwrap().is_local()));

    let traces = trace(&dp, "r4", "1.1.1.1");
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].disposition, Disposition::Accepted);
    assert_eq!(hops(&traces[0]), vec![("r4", Some("eth0")), ("r2", Some("eth0")), ("r1", None)]);

    let traces = trace(&dp, "r1", "3.3.3.3");
    assert_eq!(traces[0].disposition, Disposition::Accepted);
    assert_eq!(hops(&traces[0]).last(), Some(&("r3", None)));
}

#[test]
fn bgp_without_reflection() {
    // r3 and r4 are regular iBGP peers of r2: routes of r3 do not reach r4
    let mut configs = bgp_network();
    let bgp = configs.get_mut("r2").unwrap().default_vrf_mut().bgp.as_mut().unwrap();
    for n in bgp.neighbors.iter_mut() {
        n.route_reflector_client = false;
    }
    let dp = compute(&configs);
    assert!(best(&dp, "r4", "3.3.3.3/32").is_none());
    // eBGP routes are still sent to all iBGP peers
    assert!(best(&dp, "r4", "1.1.1.1/32").is_some());
    assert!(best(&dp, "r1", "3.3.3.3/32").is_some());
}

#[test]
fn bgp_policies() {
    let mut configs = bgp_network();
    let r4 = configs.get_mut("r4").unwrap();
    r4.add_route_policy(
        "from-rr",
        RoutePolicy::new(vec![
            RouteMapBuilder::new().order(10).deny().match_prefix(prefix("3.3.3.3/32")).build(),
            RouteMapBuilder::new().order(20).allow().set_local_pref(200).set_community(7).build(),
        ]),
    );
    let r4_bgp = r4.default_vrf_mut().bgp.as_mut().unwrap();
    r4_bgp.neighbors[0].import_policy = Some("from-rr".to_string());
    let dp = compute(&configs);
    assert!(best(&dp, "r4", "3.3.3.3/32").is_none());
    let route = best(&dp, "r4", "1.1.1.1/32").unwrap();
    assert_eq!(route.bgp().unwrap().local_pref, 200);
    assert!(route.bgp().unwrap().communities.contains(&7));
    // the policy of r4 does not change what the other clients receive
    assert_eq!(best(&dp, "r3", "1.1.1.1/32").unwrap().bgp().unwrap().local_pref, 100);

    // an undefined export policy denies everything
    let mut configs = bgp_network();
    let r1_bgp = configs.get_mut("r1").unwrap().default_vrf_mut().bgp.as_mut().unwrap();
    r1_bgp.neighbors[0].export_policy = Some("missing".to_string());
    let dp = compute(&configs);
    assert!(best(&dp, "r2", "1.1.1.1/32").is_none());
    assert!(best(&dp, "r4", "1.1.1.1/32").is_none());
    assert!(best(&dp, "r1", "3.3.3.3/32").is_some());
    assert_eq!(trace(&dp, "r4", "1.1.1.1")[0].disposition, Disposition::NoRoute);
}

#[test]
fn bgp_network_statement_requires_route() {
    let mut configs = bgp_network();
    configs
        .get_mut("r3")
        .unwrap()
        .default_vrf_mut()
        .bgp
        .as_mut()
        .unwrap()
        .add_network(prefix("33.0.0.0/8"));
    let dp = compute(&configs);
    assert!(dp.bgp_rib("r3", DEFAULT_VRF).unwrap().get(&prefix("33.0.0.0/8")).is_none());
    assert!(best(&dp, "r2", "33.0.0.0/8").is_none());
}

/// # ISIS areas
///
/// ```text
///   area 49.0001                 area 49.0002
/// r1 (L1) ------ r2 (L1L2) ------ r3 (L2)
/// lo 1.1.1.1                      lo 3.3.3.3
/// ```
fn isis_network() -> BTreeMap<String, Configuration> {
    let area1 = AreaAddr(vec![0x49, 0x00, 0x01]);
    let area2 = AreaAddr(vec![0x49, 0x00, 0x02]);
    let settings = IsisInterfaceSettings::level12;
    let process = |id, area: &AreaAddr, level| {
        Some(IsisProcess::new(SystemId([0, 0, 0, 0, 0, id]), area.clone(), level))
    };

    let mut r1 = Configuration::new("r1");
    r1.add_interface(iface("eth0", "10.0.0.1/30").isis(settings()));
    r1.add_interface(iface("lo", "1.1.1.1/32").isis(settings()));
    r1.default_vrf_mut().isis = process(1, &area1, IsisLevel::Level1);

    let mut r2 = Configuration::new("r2");
    r2.add_interface(iface("eth0", "10.0.0.2/30").isis(settings()));
    r2.add_interface(iface("eth1", "10.0.1.1/30").isis(settings()));
    r2.default_vrf_mut().isis = process(2, &area1, IsisLevel::Level12);

    let mut r3 = Configuration::new("r3");
    r3.add_interface(iface("eth0", "10.0.1.2/30").isis(settings()));
    r3.add_interface(iface("lo", "3.3.3.3/32").isis(settings()));
    r3.default_vrf_mut().isis = process(3, &area2, IsisLevel::Level2);

    network(vec![r1, r2, r3])
}

#[test]
fn isis_levels() {
    let dp = compute(&isis_network());
    let topo = dp.topologies();
    let nip = NodeInterfacePair::new;
    assert_eq!(topo.isis.edge(&nip("r1", "eth0"), &nip("r2", "eth0")), Some(&IsisLevel::Level1));
    assert_eq!(topo.isis.edge(&nip("r3", "eth0"), &nip("r2", "eth1")), Some(&IsisLevel::Level2));

    // level-1 routes of r1 are leaked into level 2 by r2
    let route = best(&dp, "r3", "1.1.1.1/32").unwrap();
    assert_eq!(route.protocol, RoutingProtocol::IsisL2);
    assert_eq!(route.metric, 30);
    let route = best(&dp, "r2", "1.1.1.1/32").unwrap();
    assert_eq!(route.protocol, RoutingProtocol::IsisL1);
    assert_eq!(route.metric, 20);
    let r2 = dp.router("r2", DEFAULT_VRF).unwrap();
    assert!(r2.isis_l1_rib().get(&prefix("1.1.1.1/32")).is_some());

    // level-2 routes never reach the level-1 router
    assert_eq!(best(&dp, "r2", "3.3.3.3/32").unwrap().protocol, RoutingProtocol::IsisL2);
    assert!(best(&dp, "r1", "3.3.3.3/32").is_none());
    assert!(dp.router("r1", DEFAULT_VRF).unwrap().isis_l2_rib().is_empty());

    let traces = trace(&dp, "r3", "1.1.1.1");
    assert_eq!(traces[0].disposition, Disposition::Accepted);
    assert_eq!(hops(&traces[0]), vec![("r3", Some("eth0")), ("r2", Some("eth0")), ("r1", None)]);
    assert_eq!(trace(&dp, "r1", "3.3.3.3")[0].disposition, Disposition::NoRoute);
}

/// # EIGRP with redistribution
///
/// ```text
/// r1 ------ r2 -- 172.16.0.0/16 (discard)
/// ```
fn eigrp_network() -> BTreeMap<String, Configuration> {
    let mut r1 = Configuration::new("r1");
    r1.add_interface(iface("eth0", "10.0.0.1/30").eigrp(EigrpInterfaceSettings::new(1)));
    let process = EigrpProcess::new(1, ip("1.1.1.1"), EigrpMetricVersion::Classic);
    r1.default_vrf_mut().eigrp = Some(process);

    let mut r2 = Configuration::new("r2");
    r2.add_interface(iface("eth0", "10.0.0.2/30").eigrp(EigrpInterfaceSettings::new(1)));
    let mut process = EigrpProcess::new(1, ip("2.2.2.2"), EigrpMetricVersion::Classic);
    process.redistribute.push(Redistribution::new(RedistributionSource::Static));
    r2.default_vrf_mut().eigrp = Some(process);
    r2.default_vrf_mut()
        .add_static_route(StaticRoute::new(prefix("172.16.0.0/16"), NextHop::Discard));

    network(vec![r1, r2])
}

#[test]
fn eigrp_redistribution() {
    let dp = compute(&eigrp_network());
    let route = best(&dp, "r1", "172.16.0.0/16").unwrap();
    assert_eq!(route.protocol, RoutingProtocol::EigrpExternal);
    assert_eq!(route.admin_distance, RoutingProtocol::EigrpExternal.default_admin_distance());
    assert_eq!(route.next_hop, NextHop::InterfaceIp("eth0".to_string(), ip("10.0.0.2")));
    // the static route stays preferred on the redistributing router
    assert_eq!(best(&dp, "r2", "172.16.0.0/16").unwrap().protocol, RoutingProtocol::Static);
    let r2 = dp.router("r2", DEFAULT_VRF).unwrap();
    assert_eq!(r2.redistributed_routes(RoutingProtocol::EigrpExternal).len(), 1);

    let traces = trace(&dp, "r1", "172.16.5.5");
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].disposition, Disposition::NullRouted);
    assert_eq!(hops(&traces[0]), vec![("r1", Some("eth0")), ("r2", None)]);
}

#[test]
fn eigrp_redistribution_policy() {
    let mut configs = eigrp_network();
    let r2 = configs.get_mut("r2").unwrap();
    r2.default_vrf_mut()
        .add_static_route(StaticRoute::new(prefix("172.17.0.0/16"), NextHop::Discard).tag(5));
    r2.add_route_policy(
        "tagged",
        RoutePolicy::new(vec![RouteMapBuilder::new().order(10).allow().match_tag(5).build()]),
    );
    r2.default_vrf_mut().eigrp.as_mut().unwrap().redistribute =
        vec![Redistribution::new(RedistributionSource::Static).policy("tagged")];

    let dp = compute(&configs);
    assert!(best(&dp, "r1", "172.16.0.0/16").is_none());
    let route = best(&dp, "r1", "172.17.0.0/16").unwrap();
    assert_eq!(route.tag, Some(5));

    // an undefined policy denies every route
    let r2 = configs.get_mut("r2").unwrap();
    r2.default_vrf_mut().eigrp.as_mut().unwrap().redistribute =
        vec![Redistribution::new(RedistributionSource::Static).policy("missing")];
    let dp = compute(&configs);
    assert!(best(&dp, "r1", "172.17.0.0/16").is_none());
}

#[test]
fn deterministic() {
    let _ = pretty_env_logger::try_init();
    for configs in vec![OSPF_CHAIN.clone(), bgp_network(), isis_network(), eigrp_network()] {
        let sequential =
            compute_data_plane(configs.clone(), EngineSettings::new().set_num_threads(1)).unwrap();
        let parallel =
            compute_data_plane(configs, EngineSettings::new().set_num_threads(4)).unwrap();
        assert_eq!(sequential.rounds(), parallel.rounds());
        assert_eq!(
            sequential.routers().collect::<Vec<_>>(),
            parallel.routers().collect::<Vec<_>>()
        );
    }
}

#[test]
fn convergence() {
    let _ = pretty_env_logger::try_init();
    let settings = *EngineSettings::new().set_max_rounds(1);
    let dp = compute_data_plane(OSPF_CHAIN.clone(), &settings).unwrap();
    assert_eq!(dp.status(), ConvergenceStatus::DidNotConverge(1));
    assert!(!dp.status().is_converged());
    // the partial result can still be queried
    assert!(best(&dp, "r1", "10.0.0.4/30").is_none());
    assert!(dp.router("r1", DEFAULT_VRF).unwrap().ospf_rib().get(&prefix("10.0.0.0/30")).is_some());

    // a network with connected routes only converges in the first round
    let mut r1 = Configuration::new("r1");
    r1.add_interface(iface("eth0", "10.0.0.1/30"));
    let dp = compute(&network(vec![r1]));
    assert_eq!(dp.rounds(), 1);
    assert_eq!(best(&dp, "r1", "10.0.0.0/30").unwrap().protocol, RoutingProtocol::Connected);
    assert_eq!(best(&dp, "r1", "10.0.0.1/32").unwrap().protocol, RoutingProtocol::Local);

    let dp = compute(&BTreeMap::new());
    assert_eq!(dp.rounds(), 1);
}

#[test]
fn errors() {
    let _ = pretty_env_logger::try_init();
    let mut configs = BTreeMap::new();
    configs.insert("a".to_string(), Configuration::new("b"));
    assert_eq!(
        compute_data_plane(configs, &EngineSettings::new()).unwrap_err(),
        Error::Config(ConfigError::HostnameMismatch("a".to_string(), "b".to_string()))
    );

    let mut r1 = Configuration::new("r1");
    r1.add_interface(iface("eth0", "10.0.0.1/30").vrf("blue"));
    assert_eq!(
        compute_data_plane(network(vec![r1]), &EngineSettings::new()).unwrap_err(),
        Error::Config(ConfigError::UndefinedVrf(
            NodeInterfacePair::new("r1", "eth0"),
            "blue".to_string()
        ))
    );

    // a static route leaking into a VRF which does not exist
    let mut r1 = Configuration::new("r1");
    r1.add_interface(iface("eth0", "10.0.0.1/30"));
    r1.default_vrf_mut()
        .add_static_route(StaticRoute::new(prefix("10.5.0.0/24"), NextHop::Vrf("red".to_string())));
    assert_eq!(
        compute_data_plane(network(vec![r1]), &EngineSettings::new()).unwrap_err(),
        Error::Config(ConfigError::UndefinedNextVrf(
            "r1".to_string(),
            prefix("10.5.0.0/24"),
            "red".to_string()
        ))
    );

    let dp = compute(&OSPF_CHAIN);
    assert_eq!(
        dp.interface_predicate("r1", "eth9", ForwardingCategory::Delivered).unwrap_err(),
        DataPlaneError::InterfaceNotFound(NodeInterfacePair::new("r1", "eth9"))
    );
    assert_eq!(
        dp.interface_predicate("r9", "eth0", ForwardingCategory::Delivered).unwrap_err(),
        DataPlaneError::NodeNotFound("r9".to_string())
    );
    assert_eq!(
        dp.rib("r9", DEFAULT_VRF).unwrap_err(),
        DataPlaneError::NodeNotFound("r9".to_string())
    );
    assert_eq!(
        dp.fib("r1", "blue").unwrap_err(),
        DataPlaneError::VrfNotFound("r1".to_string(), "blue".to_string())
    );
    assert_eq!(
        dp.trace("r9", DEFAULT_VRF, &Packet::new(ip("1.1.1.1"), ip("2.2.2.2"))).unwrap_err(),
        DataPlaneError::NodeNotFound("r9".to_string())
    );
    assert!(dp.forwarding_analysis("r1", "blue").is_err());
}
