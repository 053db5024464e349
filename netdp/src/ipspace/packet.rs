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

//! Module containing the BDD variable layout of a packet header.

use super::bdd::{Bdd, BddFactory};

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Header fields which are encoded in a [`BddPacket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeaderField {
    /// Destination IPv4 address (32 bits)
    DstIp,
    /// Source IPv4 address (32 bits)
    SrcIp,
    /// Destination port (16 bits)
    DstPort,
    /// Source port (16 bits)
    SrcPort,
    /// IP protocol number (8 bits)
    IpProtocol,
}

impl HeaderField {
    /// Index of the most significant bit of this field.
    pub fn first_var(&self) -> u32 {
        match self {
            Self::DstIp => 0,
            Self::SrcIp => 32,
            Self::DstPort => 64,
            Self::SrcPort => 80,
            Self::IpProtocol => 96,
        }
    }

    /// Width of the field in bits.
    pub fn width(&self) -> u32 {
        match self {
            Self::DstIp | Self::SrcIp => 32,
            Self::DstPort | Self::SrcPort => 16,
            Self::IpProtocol => 8,
        }
    }

    /// All fields, in variable order
    pub fn all() -> [HeaderField; 5] {
        [Self::DstIp, Self::SrcIp, Self::DstPort, Self::SrcPort, Self::IpProtocol]
    }
}

/// Total number of variables used by a [`BddPacket`].
pub const NUM_PACKET_VARS: u32 = 104;

/// A concrete packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Packet {
    /// Destination address
    pub dst_ip: Ipv4Addr,
    /// Source address
    pub src_ip: Ipv4Addr,
    /// Destination port
    pub dst_port: u16,
    /// Source port
    pub src_port: u16,
    /// IP protocol number
    pub ip_protocol: u8,
}

impl Packet {
    /// Create a packet with the given addresses, with zero ports and protocol.
    pub fn new(src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Self {
        Self { dst_ip, src_ip, dst_port: 0, src_port: 0, ip_protocol: 0 }
    }

    /// Value of the given field
    pub fn field(&self, field: HeaderField) -> u64 {
        match field {
            HeaderField::DstIp => u32::from(self.dst_ip) as u64,
            HeaderField::SrcIp => u32::from(self.src_ip) as u64,
            HeaderField::DstPort => self.dst_port as u64,
            HeaderField::SrcPort => self.src_port as u64,
            HeaderField::IpProtocol => self.ip_protocol as u64,
        }
    }

    /// Value of the variable `var` of the packet layout.
    pub fn bit(&self, var: u32) -> bool {
        let field = HeaderField::all()
            .iter()
            .copied()
            .find(|f| var >= f.first_var() && var < f.first_var() + f.width());
        match field {
            Some(f) => {
                let shift = f.width() - 1 - (var - f.first_var());
                (self.field(f) >> shift) & 1 == 1
            }
            None => false,
        }
    }

    fn set_bit(&mut self, var: u32, value: bool) {
        let field = HeaderField::all()
            .iter()
            .copied()
            .find(|f| var >= f.first_var() && var < f.first_var() + f.width());
        let f = match field {
            Some(f) => f,
            None => return,
        };
        let shift = f.width() - 1 - (var - f.first_var());
        let mut x = self.field(f);
        if value {
            x |= 1 << shift;
        } else {
            x &= !(1 << shift);
        }
        match f {
            HeaderField::DstIp => self.dst_ip = Ipv4Addr::from(x as u32),
            HeaderField::SrcIp => self.src_ip = Ipv4Addr::from(x as u32),
            HeaderField::DstPort => self.dst_port = x as u16,
            HeaderField::SrcPort => self.src_port = x as u16,
            HeaderField::IpProtocol => self.ip_protocol = x as u8,
        }
    }
}

/// Symbolic packet: a [`BddFactory`] together with the variable layout of [`HeaderField`]. All
/// predicates of one analysis are built from the same `BddPacket`, such that they can be combined.
#[derive(Debug, Clone)]
pub struct BddPacket {
    factory: BddFactory,
}

impl Default for BddPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl BddPacket {
    /// Create a new symbolic packet with its own unique table.
    pub fn new() -> Self {
        Self { factory: BddFactory::new(NUM_PACKET_VARS) }
    }

    /// The underlying factory
    pub fn factory(&self) -> &BddFactory {
        &self.factory
    }

    /// The empty set of packets
    pub fn zero(&self) -> Bdd {
        self.factory.zero()
    }

    /// The set of all packets
    pub fn one(&self) -> Bdd {
        self.factory.one()
    }

    /// All packets whose `field` equals `value`.
    pub fn field_value(&self, field: HeaderField, value: u64) -> Bdd {
        self.factory.value(field.first_var(), field.width(), value)
    }

    /// All packets whose `field` lies in the inclusive range `lo..=hi`.
    pub fn field_range(&self, field: HeaderField, lo: u64, hi: u64) -> Bdd {
        self.factory.range(field.first_var(), field.width(), lo, hi)
    }

    /// All packets whose address `field` lies in `net`.
    pub fn ip_prefix(&self, field: HeaderField, net: &Ipv4Net) -> Bdd {
        let value = u32::from(net.network()) as u64;
        self.factory.prefix(field.first_var(), field.width(), value, net.prefix_len() as u32)
    }

    /// All packets whose address `field` matches `ip`, ignoring the bits set in `wildcard`.
    pub fn ip_wildcard(&self, field: HeaderField, ip: Ipv4Addr, wildcard: Ipv4Addr) -> Bdd {
        self.factory.wildcard(
            field.first_var(),
            field.width(),
            u32::from(ip) as u64,
            u32::from(wildcard) as u64,
        )
    }

    /// All packets destined to `ip`.
    pub fn dst_ip(&self, ip: Ipv4Addr) -> Bdd {
        self.field_value(HeaderField::DstIp, u32::from(ip) as u64)
    }

    /// All packets destined to an address in `net`.
    pub fn dst_prefix(&self, net: &Ipv4Net) -> Bdd {
        self.ip_prefix(HeaderField::DstIp, net)
    }

    /// Returns `true` if the concrete packet is contained in the set.
    pub fn contains(&self, bdd: &Bdd, packet: &Packet) -> bool {
        bdd.eval(|var| packet.bit(var))
    }

    /// Returns `true` if a set over destination addresses contains `ip`. All other fields are
    /// assumed to be zero.
    pub fn contains_dst(&self, bdd: &Bdd, ip: Ipv4Addr) -> bool {
        self.contains(bdd, &Packet::new(Ipv4Addr::UNSPECIFIED, ip))
    }

    /// Returns an example packet of the set, or `None` if the set is empty. Unconstrained bits are
    /// zero.
    pub fn example(&self, bdd: &Bdd) -> Option<Packet> {
        let assignment = bdd.satisfying_assignment()?;
        let mut packet = Packet::new(Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED);
        for (var, value) in assignment {
            packet.set_bit(var, value);
        }
        Some(packet)
    }
}
