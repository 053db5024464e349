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

//! Module containing the filter reducer, which collapses the lines of a filter into one predicate.

use super::{Filter, FilterError, HeaderSpace, MatchExpr, NamedFilters, PortRange};
use crate::ipspace::{Bdd, BddPacket, HeaderField, IpSpaceToBdd, LineAction, NamedIpSpaces, Packet};

use log::*;
use std::collections::{BTreeMap, HashMap};

/// The set of packets permitted by a filter, as a BDD over a [`BddPacket`].
#[derive(Debug, Clone)]
pub struct FilterPredicate {
    name: String,
    bdd: Bdd,
    packet: BddPacket,
    unmatchable_lines: Vec<usize>,
}

impl PartialEq for FilterPredicate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.bdd == other.bdd
            && self.unmatchable_lines == other.unmatchable_lines
    }
}

impl FilterPredicate {
    /// Name of the reduced filter
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The permitted packets
    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    /// Returns `true` if the filter permits the packet.
    pub fn permits(&self, packet: &Packet) -> bool {
        self.packet.contains(&self.bdd, packet)
    }

    /// Returns `true` if both filters permit exactly the same packets.
    pub fn equivalent(&self, other: &FilterPredicate) -> bool {
        self.bdd == other.bdd
    }

    /// Returns `true` if there is a packet permitted by both filters.
    pub fn overlaps(&self, other: &FilterPredicate) -> bool {
        self.bdd.intersects(&other.bdd)
    }

    /// Returns a packet which is permitted by `self` but not by `other`, if there is one.
    pub fn difference_witness(&self, other: &FilterPredicate) -> Option<Packet> {
        self.packet.example(&self.bdd.diff(&other.bdd))
    }

    /// Indices of all lines which can never be the first matching line of a packet.
    pub fn unmatchable_lines(&self) -> &[usize] {
        &self.unmatchable_lines
    }
}

/// Reduces filters to [`FilterPredicate`]s.
///
/// The reducer walks the lines in order. It keeps the set of packets not yet denied by a previous
/// deny line, and the set of packets not yet matched by any line. A permit line contributes its
/// match set restricted to the packets not yet denied, unless that term is empty or already covered
/// by the accumulated result. Referenced filters are reduced on demand and cached for the lifetime
/// of the reducer.
#[derive(Debug)]
pub struct FilterReducer<'a> {
    packet: &'a BddPacket,
    filters: &'a NamedFilters,
    src: IpSpaceToBdd<'a>,
    dst: IpSpaceToBdd<'a>,
    cache: HashMap<String, (Bdd, Vec<usize>)>,
    stack: Vec<String>,
}

impl<'a> FilterReducer<'a> {
    /// Create a new reducer for the given environment.
    pub fn new(
        packet: &'a BddPacket,
        filters: &'a NamedFilters,
        ip_spaces: &'a NamedIpSpaces,
    ) -> Self {
        Self {
            packet,
            filters,
            src: IpSpaceToBdd::new(packet, HeaderField::SrcIp, ip_spaces),
            dst: IpSpaceToBdd::new(packet, HeaderField::DstIp, ip_spaces),
            cache: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Reduce the named filter.
    pub fn reduce(&mut self, name: &str) -> Result<FilterPredicate, FilterError> {
        let (bdd, unmatchable_lines) = self.reduce_named(name)?;
        Ok(FilterPredicate {
            name: name.to_string(),
            bdd,
            packet: self.packet.clone(),
            unmatchable_lines,
        })
    }

    /// Reduce every filter of the environment. Errors are reported per filter.
    pub fn reduce_all(&mut self) -> BTreeMap<String, Result<FilterPredicate, FilterError>> {
        let filters = self.filters;
        filters
            .keys()
            .map(|name| {
                let result = self.reduce(name);
                if let Err(e) = result.as_ref() {
                    warn!("Cannot reduce filter {}: {}", name, e);
                }
                (name.clone(), result)
            })
            .collect()
    }

    fn reduce_named(&mut self, name: &str) -> Result<(Bdd, Vec<usize>), FilterError> {
        if let Some(result) = self.cache.get(name) {
            return Ok(result.clone());
        }
        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(FilterError::CircularReference(cycle));
        }
        let filters = self.filters;
        let filter =
            filters.get(name).ok_or_else(|| FilterError::UndefinedReference(name.to_string()))?;

        self.stack.push(name.to_string());
        let result = self.reduce_filter(filter);
        self.stack.pop();

        let result = result?;
        self.cache.insert(name.to_string(), result.clone());
        Ok(result)
    }

    fn reduce_filter(&mut self, filter: &Filter) -> Result<(Bdd, Vec<usize>), FilterError> {
        let mut result = self.packet.zero();
        let mut not_denied = self.packet.one();
        let mut unmatched = self.packet.one();
        let mut unmatchable_lines = Vec::new();

        for (idx, line) in filter.lines.iter().enumerate() {
            let m = self.match_to_bdd(&line.matches)?;
            if !m.intersects(&unmatched) {
                trace!("line {} of filter {} is shadowed", idx, filter.name);
                unmatchable_lines.push(idx);
            }
            match line.action {
                LineAction::Permit => {
                    let term = m.and(&not_denied);
                    if !term.is_zero() && !term.implies(&result) {
                        result = result.or(&term);
                    }
                }
                LineAction::Deny => not_denied = not_denied.diff(&m),
            }
            unmatched = unmatched.diff(&m);
        }

        debug!(
            "reduced filter {} with {} lines to {} BDD nodes",
            filter.name,
            filter.lines.len(),
            result.node_count()
        );
        Ok((result, unmatchable_lines))
    }

    fn match_to_bdd(&mut self, expr: &MatchExpr) -> Result<Bdd, FilterError> {
        Ok(match expr {
            MatchExpr::True => self.packet.one(),
            MatchExpr::False => self.packet.zero(),
            MatchExpr::HeaderSpace(hs) => self.header_space_to_bdd(hs)?,
            MatchExpr::And(exprs) => {
                let mut acc = self.packet.one();
                for e in exprs {
                    acc = acc.and(&self.match_to_bdd(e)?);
                    if acc.is_zero() {
                        break;
                    }
                }
                acc
            }
            MatchExpr::Or(exprs) => {
                let mut acc = self.packet.zero();
                for e in exprs {
                    acc = acc.or(&self.match_to_bdd(e)?);
                    if acc.is_one() {
                        break;
                    }
                }
                acc
            }
            MatchExpr::Not(e) => self.match_to_bdd(e)?.not(),
            MatchExpr::PermittedBy(name) => self.reduce_named(name)?.0,
        })
    }

    fn header_space_to_bdd(&mut self, hs: &HeaderSpace) -> Result<Bdd, FilterError> {
        let mut acc = self.packet.one();
        if let Some(space) = hs.src_ips.as_ref() {
            acc = acc.and(&self.src.to_bdd(space)?);
        }
        if let Some(space) = hs.dst_ips.as_ref() {
            acc = acc.and(&self.dst.to_bdd(space)?);
        }
        if !hs.ip_protocols.is_empty() {
            let protocols = hs
                .ip_protocols
                .iter()
                .map(|p| self.packet.field_value(HeaderField::IpProtocol, *p as u64))
                .collect::<Vec<_>>();
            acc = acc.and(&self.packet.factory().or_all(protocols.iter()));
        }
        if !hs.src_ports.is_empty() {
            acc = acc.and(&self.ports_to_bdd(HeaderField::SrcPort, &hs.src_ports));
        }
        if !hs.dst_ports.is_empty() {
            acc = acc.and(&self.ports_to_bdd(HeaderField::DstPort, &hs.dst_ports));
        }
        Ok(acc)
    }

    fn ports_to_bdd(&self, field: HeaderField, ranges: &[PortRange]) -> Bdd {
        ranges.iter().fold(self.packet.zero(), |acc, r| {
            acc.or(&self.packet.field_range(field, r.start as u64, r.end as u64))
        })
    }
}
