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

//! # Packet Filters
//!
//! A [`Filter`] is an ordered list of permit and deny lines. Each line is guarded by a
//! [`MatchExpr`], which may reference other named filters with [`MatchExpr::PermittedBy`]. The
//! first line whose expression matches a packet decides its fate; packets matched by no line are
//! denied.
//!
//! [`Filter::evaluate`] simulates a filter on a concrete [`Packet`], while the [`FilterReducer`]
//! compiles a filter into a single [`FilterPredicate`].

mod reducer;

pub use reducer::{FilterPredicate, FilterReducer};

use crate::ipspace::{IpSpace, IpSpaceError, LineAction, NamedIpSpaces, Packet};

use std::collections::BTreeMap;
use thiserror::Error;

/// Environment of named filters
pub type NamedFilters = BTreeMap<String, Filter>;

/// Inclusive range of transport ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRange {
    /// First port of the range
    pub start: u16,
    /// Last port of the range (inclusive)
    pub end: u16,
}

impl PortRange {
    /// Create a new range. `start` and `end` are swapped if necessary.
    pub fn new(start: u16, end: u16) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Range containing a single port
    pub fn single(port: u16) -> Self {
        Self { start: port, end: port }
    }

    /// Returns `true` if the port is part of the range.
    pub fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }
}

/// Constraints on the packet header. Absent address constraints and empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HeaderSpace {
    /// Source addresses
    pub src_ips: Option<IpSpace>,
    /// Destination addresses
    pub dst_ips: Option<IpSpace>,
    /// IP protocol numbers
    pub ip_protocols: Vec<u8>,
    /// Source ports
    pub src_ports: Vec<PortRange>,
    /// Destination ports
    pub dst_ports: Vec<PortRange>,
}

impl HeaderSpace {
    /// Returns `true` if the packet lies in the header space.
    pub fn matches(
        &self,
        packet: &Packet,
        ip_spaces: &NamedIpSpaces,
    ) -> Result<bool, IpSpaceError> {
        if let Some(space) = self.src_ips.as_ref() {
            if !space.contains(packet.src_ip, ip_spaces)? {
                return Ok(false);
            }
        }
        if let Some(space) = self.dst_ips.as_ref() {
            if !space.contains(packet.dst_ip, ip_spaces)? {
                return Ok(false);
            }
        }
        if !self.ip_protocols.is_empty() && !self.ip_protocols.contains(&packet.ip_protocol) {
            return Ok(false);
        }
        if !self.src_ports.is_empty() && !self.src_ports.iter().any(|r| r.contains(packet.src_port))
        {
            return Ok(false);
        }
        if !self.dst_ports.is_empty() && !self.dst_ports.iter().any(|r| r.contains(packet.dst_port))
        {
            return Ok(false);
        }
        Ok(true)
    }
}

/// Match expression of a filter line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchExpr {
    /// Matches every packet
    True,
    /// Matches no packet
    False,
    /// Matches packets in the header space
    HeaderSpace(HeaderSpace),
    /// Matches if all expressions match (`True` if empty)
    And(Vec<MatchExpr>),
    /// Matches if any expression matches (`False` if empty)
    Or(Vec<MatchExpr>),
    /// Negation
    Not(Box<MatchExpr>),
    /// Matches packets permitted by the named filter
    PermittedBy(String),
}

impl MatchExpr {
    /// Match on destination addresses only
    pub fn dst(space: IpSpace) -> Self {
        Self::HeaderSpace(HeaderSpace { dst_ips: Some(space), ..Default::default() })
    }

    /// Match on source addresses only
    pub fn src(space: IpSpace) -> Self {
        Self::HeaderSpace(HeaderSpace { src_ips: Some(space), ..Default::default() })
    }

    fn evaluate(
        &self,
        packet: &Packet,
        filters: &NamedFilters,
        ip_spaces: &NamedIpSpaces,
        stack: &mut Vec<String>,
    ) -> Result<bool, FilterError> {
        match self {
            Self::True => Ok(true),
            Self::False => Ok(false),
            Self::HeaderSpace(hs) => Ok(hs.matches(packet, ip_spaces)?),
            Self::And(exprs) => {
                for e in exprs {
                    if !e.evaluate(packet, filters, ip_spaces, stack)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(exprs) => {
                for e in exprs {
                    if e.evaluate(packet, filters, ip_spaces, stack)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(e) => Ok(!e.evaluate(packet, filters, ip_spaces, stack)?),
            Self::PermittedBy(name) => {
                let filter = enter(name, filters, stack)?;
                let result = filter.evaluate_rec(packet, filters, ip_spaces, stack);
                stack.pop();
                Ok(result?.is_permit())
            }
        }
    }
}

/// Push `name` on the stack and return the filter, or report a cycle or an undefined filter.
fn enter<'a>(
    name: &str,
    filters: &'a NamedFilters,
    stack: &mut Vec<String>,
) -> Result<&'a Filter, FilterError> {
    if let Some(pos) = stack.iter().position(|n| n == name) {
        let mut cycle = stack[pos..].to_vec();
        cycle.push(name.to_string());
        return Err(FilterError::CircularReference(cycle));
    }
    let filter =
        filters.get(name).ok_or_else(|| FilterError::UndefinedReference(name.to_string()))?;
    stack.push(name.to_string());
    Ok(filter)
}

/// One line of a filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterLine {
    /// Action for packets for which this is the first matching line
    pub action: LineAction,
    /// Guard of the line
    pub matches: MatchExpr,
}

impl FilterLine {
    /// Permit line
    pub fn permit(matches: MatchExpr) -> Self {
        Self { action: LineAction::Permit, matches }
    }

    /// Deny line
    pub fn deny(matches: MatchExpr) -> Self {
        Self { action: LineAction::Deny, matches }
    }
}

/// Named, ordered list of filter lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    /// Name of the filter
    pub name: String,
    /// Lines, evaluated in order
    pub lines: Vec<FilterLine>,
}

impl Filter {
    /// Create a new filter
    pub fn new<S: Into<String>>(name: S, lines: Vec<FilterLine>) -> Self {
        Self { name: name.into(), lines }
    }

    /// Simulate the filter on a concrete packet. Returns the action of the first matching line, or
    /// [`LineAction::Deny`] if no line matches.
    pub fn evaluate(
        &self,
        packet: &Packet,
        filters: &NamedFilters,
        ip_spaces: &NamedIpSpaces,
    ) -> Result<LineAction, FilterError> {
        let mut stack = vec![self.name.clone()];
        self.evaluate_rec(packet, filters, ip_spaces, &mut stack)
    }

    fn evaluate_rec(
        &self,
        packet: &Packet,
        filters: &NamedFilters,
        ip_spaces: &NamedIpSpaces,
        stack: &mut Vec<String>,
    ) -> Result<LineAction, FilterError> {
        for line in self.lines.iter() {
            if line.matches.evaluate(packet, filters, ip_spaces, stack)? {
                return Ok(line.action);
            }
        }
        Ok(LineAction::Deny)
    }
}

/// Errors of resolving filters and the ip spaces they reference
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// A referenced filter or ip space is not defined
    #[error("{0} is not defined")]
    UndefinedReference(String),
    /// The references form a cycle. The first and the last name of the list are the same.
    #[error("Circular reference: {}", .0.join(" -> "))]
    CircularReference(Vec<String>),
}

impl From<IpSpaceError> for FilterError {
    fn from(e: IpSpaceError) -> Self {
        match e {
            IpSpaceError::UndefinedReference(name) => Self::UndefinedReference(name),
            IpSpaceError::CircularReference(cycle) => Self::CircularReference(cycle),
        }
    }
}
