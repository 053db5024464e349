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

//! Test ip spaces, their compilation into BDDs, and the conversion back.

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

/// Random addresses, biased towards the 10.0.0.0/8 range used by the spaces below.
fn random_ips(rng: &mut StdRng, n: usize) -> Vec<Ipv4Addr> {
    (0..n)
        .map(|_| {
            if rng.gen_bool(0.8) {
                Ipv4Addr::new(10, rng.gen_range(0, 4), rng.gen_range(0, 4), rng.gen())
            } else {
                Ipv4Addr::from(rng.gen::<u32>())
            }
        })
        .collect()
}

fn env() -> NamedIpSpaces {
    btreemap! {
        "a".to_string() => IpSpace::prefix(net("10.0.0.0/16")),
        "b".to_string() => IpSpace::wildcard(ip("10.0.0.1"), ip("0.3.0.0")),
        "c".to_string() => IpSpace::reference("a").union(IpSpace::ip(ip("192.168.1.1"))),
        "d".to_string() => IpSpace::acl(vec![
            IpSpaceLine::deny(IpSpace::reference("b")),
            IpSpaceLine::permit(IpSpace::reference("c")),
        ]),
    }
}

#[test]
fn contains() {
    let env = env();
    let d = IpSpace::reference("d");
    assert!(d.contains(ip("10.0.3.4"), &env).unwrap());
    assert!(!d.contains(ip("10.0.0.1"), &env).unwrap());
    assert!(d.contains(ip("192.168.1.1"), &env).unwrap());
    assert!(!d.contains(ip("192.168.1.2"), &env).unwrap());
    assert!(IpSpace::universe().contains(ip("1.2.3.4"), &env).unwrap());
    assert!(!IpSpace::empty().contains(ip("1.2.3.4"), &env).unwrap());
    // an acl without a matching line does not contain the address
    assert!(!IpSpace::acl(vec![]).contains(ip("1.2.3.4"), &env).unwrap());
}

#[test]
fn set_laws() {
    let env = env();
    let mut rng = StdRng::seed_from_u64(1);
    let a = IpSpace::reference("a");
    let b = IpSpace::reference("b");
    for x in random_ips(&mut rng, 500) {
        let in_a = a.contains(x, &env).unwrap();
        let in_b = b.contains(x, &env).unwrap();
        assert_eq!(a.clone().union(b.clone()).contains(x, &env).unwrap(), in_a || in_b);
        assert_eq!(a.clone().intersection(b.clone()).contains(x, &env).unwrap(), in_a && in_b);
        assert_eq!(a.clone().difference(b.clone()).contains(x, &env).unwrap(), in_a && !in_b);
        assert_eq!(a.clone().complement().contains(x, &env).unwrap(), !in_a);
        assert_eq!(a.clone().complement().complement().contains(x, &env).unwrap(), in_a);
    }
}

#[test]
fn bdd_agrees_with_contains() {
    let _ = pretty_env_logger::try_init();
    let env = env();
    let packet = BddPacket::new();
    let mut compiler = IpSpaceToBdd::new(&packet, HeaderField::DstIp, &env);
    let mut rng = StdRng::seed_from_u64(2);
    let ips = random_ips(&mut rng, 500);
    for name in env.keys() {
        let bdd = compiler.named(name).unwrap();
        let space = IpSpace::reference(name.as_str());
        for x in ips.iter() {
            let expected = space.contains(*x, &env).unwrap();
            assert_eq!(packet.contains_dst(&bdd, *x), expected, "{} {}", name, x);
        }
    }
    // source address compilation only constrains the source field
    let mut src = IpSpaceToBdd::new(&packet, HeaderField::SrcIp, &env);
    let bdd = src.named("a").unwrap();
    assert!(packet.contains(&bdd, &Packet::new(ip("10.0.1.1"), ip("1.1.1.1"))));
    assert!(!packet.contains(&bdd, &Packet::new(ip("1.1.1.1"), ip("10.0.1.1"))));
}

#[test]
fn references() {
    let mut env = env();
    assert_eq!(IpSpace::reference("d").check_references(&env), Ok(()));
    assert_eq!(
        IpSpace::reference("x").contains(ip("1.1.1.1"), &env),
        Err(IpSpaceError::UndefinedReference("x".to_string()))
    );

    // introduce a cycle a -> c -> a
    env.insert("a".to_string(), IpSpace::reference("c"));
    match IpSpace::reference("d").check_references(&env) {
        Err(IpSpaceError::CircularReference(cycle)) => {
            assert_eq!(cycle.first(), cycle.last());
            assert!(cycle.contains(&"a".to_string()));
            assert!(cycle.contains(&"c".to_string()));
        }
        r => panic!("Unexpected result: {:?}", r),
    }
    // the cycle is reported, even if the address is decided before reaching it
    assert!(IpSpace::reference("d").contains(ip("10.0.0.1"), &env).is_err());

    let packet = BddPacket::new();
    let mut compiler = IpSpaceToBdd::new(&packet, HeaderField::DstIp, &env);
    assert!(matches!(compiler.named("c"), Err(IpSpaceError::CircularReference(_))));
    // spaces outside of the cycle still compile
    assert!(compiler.named("b").is_ok());
}

#[test]
fn from_bdd() {
    let env = env();
    let packet = BddPacket::new();
    let mut compiler = IpSpaceToBdd::new(&packet, HeaderField::DstIp, &env);

    assert_eq!(ip_space_from_bdd(&packet, &packet.zero()), IpSpace::Empty);
    assert_eq!(ip_space_from_bdd(&packet, &packet.one()), IpSpace::Universe);
    assert_eq!(
        ip_space_from_bdd(&packet, &packet.dst_prefix(&net("10.1.0.0/16"))),
        IpSpace::Prefix(net("10.1.0.0/16"))
    );
    let single = packet.dst_ip(ip("1.2.3.4"));
    assert_eq!(ip_space_from_bdd(&packet, &single), IpSpace::Ip(ip("1.2.3.4")));

    // the converted space describes the same set
    let bdd = compiler.named("d").unwrap();
    let space = ip_space_from_bdd(&packet, &bdd);
    let mut compiler = IpSpaceToBdd::new(&packet, HeaderField::DstIp, &env);
    assert_eq!(compiler.to_bdd(&space).unwrap(), bdd);
}

#[test]
fn packet_example() {
    let packet = BddPacket::new();
    let space = packet
        .dst_prefix(&net("10.0.0.0/8"))
        .and(&packet.field_range(HeaderField::DstPort, 80, 90))
        .and(&packet.field_value(HeaderField::IpProtocol, 6));
    let example = packet.example(&space).unwrap();
    assert!(packet.contains(&space, &example));
    assert_eq!(example.ip_protocol, 6);
    assert!((80..=90).contains(&example.dst_port));
    assert!(net("10.0.0.0/8").contains(&example.dst_ip));
    assert_eq!(packet.example(&packet.zero()), None);
}

#[test]
fn wildcard_display() {
    assert_eq!(IpSpace::Prefix(net("10.0.0.0/8")).to_string(), "10.0.0.0/8");
    assert_eq!(IpSpace::reference("a").to_string(), "$a");
    assert_eq!(IpSpace::ip(ip("1.1.1.1")).complement().to_string(), "[deny 1.1.1.1, permit *]");
}
