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

//! Test the filter reducer against the concrete evaluation of filters.

use crate::filter::*;
use crate::ipspace::*;
use ipnet::Ipv4Net;
use maplit::btreemap;
use rand::prelude::*;
use std::net::Ipv4Addr;

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

fn random_prefix(rng: &mut StdRng) -> Ipv4Net {
    let addr = Ipv4Addr::new(10, rng.gen_range(0, 4), rng.gen_range(0, 4), rng.gen());
    Ipv4Net::new(addr, rng.gen_range(8, 33)).unwrap().trunc()
}

fn random_space(rng: &mut StdRng) -> IpSpace {
    match rng.gen_range(0, 4) {
        0 => IpSpace::prefix(random_prefix(rng)),
        1 => IpSpace::reference("servers"),
        2 => IpSpace::wildcard(Ipv4Addr::new(10, 0, 0, rng.gen()), ip("0.3.0.0")),
        _ => IpSpace::prefix(random_prefix(rng)).union(IpSpace::ip(ip("10.0.0.1"))),
    }
}

fn random_header_space(rng: &mut StdRng) -> HeaderSpace {
    let mut hs = HeaderSpace::default();
    if rng.gen_bool(0.7) {
        hs.dst_ips = Some(random_space(rng));
    }
    if rng.gen_bool(0.3) {
        hs.src_ips = Some(random_space(rng));
    }
    if rng.gen_bool(0.3) {
        hs.ip_protocols = vec![6, 17][..rng.gen_range(1, 3)].to_vec();
    }
    if rng.gen_bool(0.3) {
        let start = rng.gen_range(0, 100);
        hs.dst_ports = vec![PortRange::new(start, start + rng.gen_range(0, 50))];
    }
    if rng.gen_bool(0.2) {
        hs.src_ports = vec![PortRange::single(rng.gen_range(0, 100))];
    }
    hs
}

fn random_match(rng: &mut StdRng, depth: usize, refs: &[&str]) -> MatchExpr {
    let choice = if depth == 0 { 0 } else { rng.gen_range(0, 6) };
    match choice {
        0 | 1 => MatchExpr::HeaderSpace(random_header_space(rng)),
        2 | 3 => {
            let n = rng.gen_range(0, 3);
            let children = (0..n).map(|_| random_match(rng, depth - 1, refs)).collect();
            if choice == 2 {
                MatchExpr::And(children)
            } else {
                MatchExpr::Or(children)
            }
        }
        4 => MatchExpr::Not(Box::new(random_match(rng, depth - 1, refs))),
        _ => match refs.choose(rng) {
            Some(name) => MatchExpr::PermittedBy(name.to_string()),
            None => MatchExpr::True,
        },
    }
}

fn random_filter(rng: &mut StdRng, name: &str, refs: &[&str]) -> Filter {
    let lines = (0..rng.gen_range(1, 6))
        .map(|_| {
            let m = random_match(rng, 2, refs);
            if rng.gen_bool(0.5) {
                FilterLine::permit(m)
            } else {
                FilterLine::deny(m)
            }
        })
        .collect();
    Filter::new(name, lines)
}

fn random_packet(rng: &mut StdRng) -> Packet {
    Packet {
        dst_ip: Ipv4Addr::new(10, rng.gen_range(0, 4), rng.gen_range(0, 4), rng.gen()),
        src_ip: Ipv4Addr::new(10, rng.gen_range(0, 4), rng.gen_range(0, 4), rng.gen()),
        dst_port: rng.gen_range(0, 160),
        src_port: rng.gen_range(0, 120),
        ip_protocol: *[0u8, 6, 17].choose(rng).unwrap(),
    }
}

#[test]
fn reducer_agrees_with_evaluation() {
    let _ = pretty_env_logger::try_init();
    let mut rng = StdRng::seed_from_u64(42);
    let ip_spaces = btreemap! {
        "servers".to_string() =>
            IpSpace::prefix(net("10.1.0.0/16")).difference(IpSpace::ip(ip("10.1.0.1"))),
    };
    for _ in 0..40 {
        let base = random_filter(&mut rng, "base", &[]);
        let middle = random_filter(&mut rng, "middle", &["base"]);
        let top = random_filter(&mut rng, "top", &["base", "middle"]);
        let filters: NamedFilters =
            vec![base, middle, top].into_iter().map(|f| (f.name.clone(), f)).collect();

        let packet = BddPacket::new();
        let mut reducer = FilterReducer::new(&packet, &filters, &ip_spaces);
        let predicates = reducer.reduce_all();
        for (name, predicate) in predicates.iter() {
            let predicate = predicate.as_ref().unwrap();
            let filter = &filters[name];
            for _ in 0..100 {
                let p = random_packet(&mut rng);
                let expected = filter.evaluate(&p, &filters, &ip_spaces).unwrap().is_permit();
                assert_eq!(predicate.permits(&p), expected, "{} on {:?}", name, p);
            }
        }
    }
}

#[test]
fn first_match() {
    let filters = btreemap! {
        "acl".to_string() => Filter::new("acl", vec![
            FilterLine::deny(MatchExpr::dst(IpSpace::prefix(net("10.0.0.0/24")))),
            FilterLine::permit(MatchExpr::dst(IpSpace::prefix(net("10.0.0.0/8")))),
        ]),
    };
    let ip_spaces = NamedIpSpaces::new();
    let packet = BddPacket::new();
    let acl = FilterReducer::new(&packet, &filters, &ip_spaces).reduce("acl").unwrap();
    let expected =
        packet.dst_prefix(&net("10.0.0.0/8")).diff(&packet.dst_prefix(&net("10.0.0.0/24")));
    assert_eq!(*acl.bdd(), expected);
    assert!(!acl.permits(&Packet::new(ip("1.1.1.1"), ip("10.0.0.5"))));
    assert!(acl.permits(&Packet::new(ip("1.1.1.1"), ip("10.0.1.5"))));
    // packets matched by no line are denied
    assert!(!acl.permits(&Packet::new(ip("1.1.1.1"), ip("11.0.0.1"))));
    assert_eq!(acl.unmatchable_lines(), &[] as &[usize]);
}

#[test]
fn unmatchable_lines() {
    let filters = btreemap! {
        "acl".to_string() => Filter::new("acl", vec![
            FilterLine::permit(MatchExpr::dst(IpSpace::prefix(net("10.0.0.0/8")))),
            // shadowed by the first line
            FilterLine::deny(MatchExpr::dst(IpSpace::prefix(net("10.1.0.0/16")))),
            FilterLine::deny(MatchExpr::src(IpSpace::prefix(net("10.0.0.0/8")))),
            FilterLine::permit(MatchExpr::False),
            FilterLine::permit(MatchExpr::True),
            // nothing is left after a line matching everything
            FilterLine::deny(MatchExpr::dst(IpSpace::ip(ip("1.1.1.1")))),
        ]),
    };
    let ip_spaces = NamedIpSpaces::new();
    let packet = BddPacket::new();
    let acl = FilterReducer::new(&packet, &filters, &ip_spaces).reduce("acl").unwrap();
    assert_eq!(acl.unmatchable_lines(), &[1, 3, 5]);
}

#[test]
fn equivalence_and_witness() {
    let filters = btreemap! {
        "a".to_string() => Filter::new("a", vec![
            FilterLine::permit(MatchExpr::dst(IpSpace::prefix(net("10.0.0.0/8")))),
        ]),
        "b".to_string() => Filter::new("b", vec![
            FilterLine::permit(MatchExpr::dst(IpSpace::prefix(net("10.0.0.0/9")))),
            FilterLine::permit(MatchExpr::dst(IpSpace::prefix(net("10.128.0.0/9")))),
        ]),
        "c".to_string() => Filter::new("c", vec![
            FilterLine::deny(MatchExpr::HeaderSpace(HeaderSpace {
                dst_ports: vec![PortRange::single(22)],
                ..Default::default()
            })),
            FilterLine::permit(MatchExpr::PermittedBy("a".to_string())),
        ]),
    };
    let ip_spaces = NamedIpSpaces::new();
    let packet = BddPacket::new();
    let mut reducer = FilterReducer::new(&packet, &filters, &ip_spaces);
    let a = reducer.reduce("a").unwrap();
    let b = reducer.reduce("b").unwrap();
    let c = reducer.reduce("c").unwrap();

    assert!(a.equivalent(&b));
    assert_eq!(a.difference_witness(&b), None);
    assert!(!a.equivalent(&c));
    assert!(a.overlaps(&c));

    let witness = a.difference_witness(&c).unwrap();
    assert!(a.permits(&witness));
    assert!(!c.permits(&witness));
    assert_eq!(witness.dst_port, 22);
    assert_eq!(c.difference_witness(&a), None);
}

#[test]
fn errors() {
    let filters = btreemap! {
        "loop1".to_string() => Filter::new("loop1", vec![
            FilterLine::permit(MatchExpr::PermittedBy("loop2".to_string())),
        ]),
        "loop2".to_string() => Filter::new("loop2", vec![
            FilterLine::permit(MatchExpr::PermittedBy("loop1".to_string())),
        ]),
        "undefined".to_string() => Filter::new("undefined", vec![
            FilterLine::permit(MatchExpr::PermittedBy("missing".to_string())),
        ]),
        "bad_space".to_string() => Filter::new("bad_space", vec![
            FilterLine::permit(MatchExpr::dst(IpSpace::reference("nowhere"))),
        ]),
        "fine".to_string() => Filter::new("fine", vec![FilterLine::permit(MatchExpr::True)]),
    };
    let ip_spaces = NamedIpSpaces::new();
    let packet = BddPacket::new();
    let mut reducer = FilterReducer::new(&packet, &filters, &ip_spaces);
    let results = reducer.reduce_all();

    assert_eq!(
        results["loop1"],
        Err(FilterError::CircularReference(vec![
            "loop1".to_string(),
            "loop2".to_string(),
            "loop1".to_string()
        ]))
    );
    assert!(matches!(results["loop2"], Err(FilterError::CircularReference(_))));
    assert_eq!(results["undefined"], Err(FilterError::UndefinedReference("missing".to_string())));
    assert_eq!(results["bad_space"], Err(FilterError::UndefinedReference("nowhere".to_string())));
    assert!(results["fine"].as_ref().unwrap().bdd().is_one());

    // concrete evaluation reports the same problems
    let p = Packet::new(ip("1.1.1.1"), ip("2.2.2.2"));
    assert!(matches!(
        filters["loop1"].evaluate(&p, &filters, &ip_spaces),
        Err(FilterError::CircularReference(_))
    ));
    assert_eq!(
        filters["undefined"].evaluate(&p, &filters, &ip_spaces),
        Err(FilterError::UndefinedReference("missing".to_string()))
    );
}
