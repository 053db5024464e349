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

//! Compilation of [`IpSpace`] expressions into [`Bdd`]s.

use super::{Bdd, BddPacket, HeaderField, IpSpace, IpSpaceError, NamedIpSpaces};

use log::*;
use std::collections::HashMap;

/// Compiles ip spaces into BDDs over one address field of a [`BddPacket`]. Named references are
/// compiled once and cached for the lifetime of the compiler.
#[derive(Debug)]
pub struct IpSpaceToBdd<'a> {
    packet: &'a BddPacket,
    field: HeaderField,
    env: &'a NamedIpSpaces,
    cache: HashMap<String, Bdd>,
    stack: Vec<String>,
}

impl<'a> IpSpaceToBdd<'a> {
    /// Create a compiler for the address field `field` (either [`HeaderField::DstIp`] or
    /// [`HeaderField::SrcIp`]).
    pub fn new(packet: &'a BddPacket, field: HeaderField, env: &'a NamedIpSpaces) -> Self {
        assert!(
            matches!(field, HeaderField::DstIp | HeaderField::SrcIp),
            "IpSpaces can only be compiled for address fields"
        );
        Self { packet, field, env, cache: HashMap::new(), stack: Vec::new() }
    }

    /// The field this compiler encodes addresses into
    pub fn field(&self) -> HeaderField {
        self.field
    }

    /// Compile `space` into a BDD.
    pub fn to_bdd(&mut self, space: &IpSpace) -> Result<Bdd, IpSpaceError> {
        match space {
            IpSpace::Empty => Ok(self.packet.zero()),
            IpSpace::Universe => Ok(self.packet.one()),
            IpSpace::Ip(ip) => Ok(self.packet.field_value(self.field, u32::from(*ip) as u64)),
            IpSpace::Prefix(net) => Ok(self.packet.ip_prefix(self.field, net)),
            IpSpace::Wildcard(w) => Ok(self.packet.ip_wildcard(self.field, w.ip(), w.wildcard())),
            IpSpace::Reference(name) => self.named(name),
            IpSpace::Acl(lines) => {
                // build from the last line upwards, such that earlier lines take precedence
                let mut acc = self.packet.zero();
                for line in lines.iter().rev() {
                    let m = self.to_bdd(&line.space)?;
                    let action = if line.action.is_permit() {
                        self.packet.one()
                    } else {
                        self.packet.zero()
                    };
                    acc = m.ite(&action, &acc);
                }
                Ok(acc)
            }
        }
    }

    /// Compile the named space `name` of the environment.
    pub fn named(&mut self, name: &str) -> Result<Bdd, IpSpaceError> {
        if let Some(bdd) = self.cache.get(name) {
            return Ok(bdd.clone());
        }
        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(IpSpaceError::CircularReference(cycle));
        }
        let env = self.env;
        let space = env
            .get(name)
            .ok_or_else(|| IpSpaceError::UndefinedReference(name.to_string()))?;
        trace!("compile named ip space {}", name);
        self.stack.push(name.to_string());
        let result = self.to_bdd(space);
        self.stack.pop();
        let bdd = result?;
        self.cache.insert(name.to_string(), bdd.clone());
        Ok(bdd)
    }
}
