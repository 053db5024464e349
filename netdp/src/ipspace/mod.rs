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

//! # IpSpace Algebra
//!
//! Symbolic sets of IPv4 addresses. An [`IpSpace`] is an immutable expression tree: single
//! addresses, prefixes, wildcard patterns, the universal and the empty set, references to named
//! spaces, and ordered lists of permit/deny lines (first match wins). Named spaces are resolved in
//! an environment ([`NamedIpSpaces`]). Cyclic and undefined references are reported as
//! [`IpSpaceError`].
//!
//! For combination and comparison, spaces are compiled into canonical [`Bdd`]s with
//! [`IpSpaceToBdd`]. The [`bdd`] module contains the decision diagram engine, and [`packet`] the
//! variable layout of a packet header.

pub mod bdd;
pub mod packet;
mod to_bdd;

pub use bdd::{Bdd, BddFactory};
pub use packet::{BddPacket, HeaderField, Packet};
pub use to_bdd::IpSpaceToBdd;

use ipnet::Ipv4Net;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Environment of named ip spaces
pub type NamedIpSpaces = BTreeMap<String, IpSpace>;

/// Action of an [`IpSpaceLine`] or of a filter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineAction {
    /// Matching addresses (or packets) are permitted
    Permit,
    /// Matching addresses (or packets) are denied
    Deny,
}

impl LineAction {
    /// Returns `true` for [`LineAction::Permit`]
    pub fn is_permit(&self) -> bool {
        matches!(self, Self::Permit)
    }
}

/// Address with a wildcard mask. Bits set in the wildcard are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpWildcard {
    ip: Ipv4Addr,
    wildcard: Ipv4Addr,
}

impl IpWildcard {
    /// Create a new wildcard. The address bits covered by the wildcard are cleared.
    pub fn new(ip: Ipv4Addr, wildcard: Ipv4Addr) -> Self {
        let w = u32::from(wildcard);
        Self { ip: Ipv4Addr::from(u32::from(ip) & !w), wildcard }
    }

    /// Wildcard matching exactly the addresses of a prefix
    pub fn from_prefix(net: &Ipv4Net) -> Self {
        Self::new(net.network(), net.hostmask())
    }

    /// Base address
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Wildcard mask (set bits are ignored)
    pub fn wildcard(&self) -> Ipv4Addr {
        self.wildcard
    }

    /// Returns `true` if the address matches.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let w = u32::from(self.wildcard);
        u32::from(ip) & !w == u32::from(self.ip)
    }

    /// Returns the equivalent prefix, if the wildcard only ignores a contiguous block of low bits.
    pub fn as_prefix(&self) -> Option<Ipv4Net> {
        let w = u32::from(self.wildcard);
        // w + 1 must be a power of two (or w must be all ones)
        if w.wrapping_add(1) & w != 0 {
            return None;
        }
        let len = w.leading_zeros() as u8;
        Ipv4Net::new(self.ip, len).ok()
    }

    fn to_space(self) -> IpSpace {
        match self.as_prefix() {
            Some(net) if net.prefix_len() == 32 => IpSpace::Ip(net.addr()),
            Some(net) if net.prefix_len() == 0 => IpSpace::Universe,
            Some(net) => IpSpace::Prefix(net),
            None => IpSpace::Wildcard(self),
        }
    }
}

impl fmt::Display for IpWildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.wildcard)
    }
}

/// One line of an [`IpSpace::Acl`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpSpaceLine {
    /// Action taken for addresses matched by this line
    pub action: LineAction,
    /// Space matched by this line
    pub space: IpSpace,
}

impl IpSpaceLine {
    /// Permit line
    pub fn permit(space: IpSpace) -> Self {
        Self { action: LineAction::Permit, space }
    }

    /// Deny line
    pub fn deny(space: IpSpace) -> Self {
        Self { action: LineAction::Deny, space }
    }
}

/// Symbolic set of IPv4 addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IpSpace {
    /// No address at all
    Empty,
    /// Every address
    Universe,
    /// A single address
    Ip(Ipv4Addr),
    /// All addresses of a prefix
    Prefix(Ipv4Net),
    /// All addresses matching a wildcard
    Wildcard(IpWildcard),
    /// The named space in the environment
    Reference(String),
    /// Ordered lines, the first matching line decides. Addresses not matched by any line are not
    /// contained.
    Acl(Vec<IpSpaceLine>),
}

impl IpSpace {
    /// Space containing a single address
    pub fn ip(ip: Ipv4Addr) -> Self {
        Self::Ip(ip)
    }

    /// Space containing all addresses of a prefix. Host bits of `net` are cleared.
    pub fn prefix(net: Ipv4Net) -> Self {
        Self::Prefix(net.trunc())
    }

    /// Space containing all addresses matching `ip` when ignoring the bits of `wildcard`.
    pub fn wildcard(ip: Ipv4Addr, wildcard: Ipv4Addr) -> Self {
        Self::Wildcard(IpWildcard::new(ip, wildcard))
    }

    /// The universal set
    pub fn universe() -> Self {
        Self::Universe
    }

    /// The empty set
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Reference to a named space
    pub fn reference<S: Into<String>>(name: S) -> Self {
        Self::Reference(name.into())
    }

    /// First-match list of permit and deny lines
    pub fn acl(lines: Vec<IpSpaceLine>) -> Self {
        Self::Acl(lines)
    }

    /// All addresses contained in `self` or in `other`.
    pub fn union(self, other: IpSpace) -> Self {
        Self::Acl(vec![IpSpaceLine::permit(self), IpSpaceLine::permit(other)])
    }

    /// All addresses not contained in `self`.
    pub fn complement(self) -> Self {
        Self::Acl(vec![IpSpaceLine::deny(self), IpSpaceLine::permit(Self::Universe)])
    }

    /// All addresses contained both in `self` and in `other`.
    pub fn intersection(self, other: IpSpace) -> Self {
        Self::Acl(vec![IpSpaceLine::deny(self.complement()), IpSpaceLine::permit(other)])
    }

    /// All addresses contained in `self` but not in `other`.
    pub fn difference(self, other: IpSpace) -> Self {
        Self::Acl(vec![IpSpaceLine::deny(other), IpSpaceLine::permit(self)])
    }

    /// Returns `true` if `ip` is contained in the space. All references reachable from `self` are
    /// checked first, such that a cyclic environment is always reported, even if the cycle would
    /// not be evaluated for this address.
    pub fn contains(&self, ip: Ipv4Addr, env: &NamedIpSpaces) -> Result<bool, IpSpaceError> {
        self.check_references(env)?;
        Ok(self.contains_checked(ip, env))
    }

    fn contains_checked(&self, ip: Ipv4Addr, env: &NamedIpSpaces) -> bool {
        match self {
            Self::Empty => false,
            Self::Universe => true,
            Self::Ip(x) => *x == ip,
            Self::Prefix(net) => net.contains(&ip),
            Self::Wildcard(w) => w.contains(ip),
            Self::Reference(name) => {
                env.get(name).map(|space| space.contains_checked(ip, env)).unwrap_or(false)
            }
            Self::Acl(lines) => lines
                .iter()
                .find(|line| line.space.contains_checked(ip, env))
                .map(|line| line.action.is_permit())
                .unwrap_or(false),
        }
    }

    /// Check that every reference reachable from this space is defined and that the reference
    /// graph contains no cycle.
    pub fn check_references(&self, env: &NamedIpSpaces) -> Result<(), IpSpaceError> {
        let mut done = HashSet::new();
        let mut stack = Vec::new();
        self.check_rec(env, &mut stack, &mut done)
    }

    fn check_rec<'a>(
        &'a self,
        env: &'a NamedIpSpaces,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), IpSpaceError> {
        match self {
            Self::Empty | Self::Universe | Self::Ip(_) | Self::Prefix(_) | Self::Wildcard(_) => {
                Ok(())
            }
            Self::Reference(name) => {
                if let Some(pos) = stack.iter().position(|n| *n == name.as_str()) {
                    let mut cycle: Vec<String> =
                        stack[pos..].iter().map(|n| n.to_string()).collect();
                    cycle.push(name.clone());
                    return Err(IpSpaceError::CircularReference(cycle));
                }
                if done.contains(name.as_str()) {
                    return Ok(());
                }
                let space =
                    env.get(name).ok_or_else(|| IpSpaceError::UndefinedReference(name.clone()))?;
                stack.push(name.as_str());
                space.check_rec(env, stack, done)?;
                stack.pop();
                done.insert(name.as_str());
                Ok(())
            }
            Self::Acl(lines) => {
                lines.iter().try_for_each(|line| line.space.check_rec(env, stack, done))
            }
        }
    }

    /// Names of all spaces referenced directly by this expression
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::Reference(name) => vec![name.as_str()],
            Self::Acl(lines) => lines.iter().flat_map(|l| l.space.references()).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for IpSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "{{}}"),
            Self::Universe => write!(f, "*"),
            Self::Ip(ip) => write!(f, "{}", ip),
            Self::Prefix(net) => write!(f, "{}", net),
            Self::Wildcard(w) => write!(f, "{}", w),
            Self::Reference(name) => write!(f, "${}", name),
            Self::Acl(lines) => {
                write!(f, "[")?;
                for (i, line) in lines.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match line.action {
                        LineAction::Permit => write!(f, "permit {}", line.space)?,
                        LineAction::Deny => write!(f, "deny {}", line.space)?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

/// Convert a BDD over the destination-address variables of `packet` back into an [`IpSpace`]. The
/// result is a list of disjoint wildcard permit lines (simplified to addresses and prefixes where
/// possible).
///
/// # Panics
/// The function panics if `bdd` depends on a variable outside of the destination address.
pub fn ip_space_from_bdd(packet: &BddPacket, bdd: &Bdd) -> IpSpace {
    if bdd.is_zero() {
        return IpSpace::Empty;
    }
    if bdd.is_one() {
        return IpSpace::Universe;
    }
    let first = HeaderField::DstIp.first_var();
    let width = HeaderField::DstIp.width();
    debug_assert_eq!(bdd.factory().num_vars(), packet.factory().num_vars());
    let mut lines: Vec<IpSpaceLine> = bdd
        .paths()
        .into_iter()
        .map(|path| {
            let mut ip: u32 = 0;
            let mut wildcard: u32 = u32::MAX;
            for (var, value) in path {
                assert!(var >= first && var < first + width, "BDD depends on variable {}", var);
                let bit = 1u32 << (width - 1 - (var - first));
                wildcard &= !bit;
                if value {
                    ip |= bit;
                }
            }
            let wildcard = IpWildcard::new(Ipv4Addr::from(ip), Ipv4Addr::from(wildcard));
            IpSpaceLine::permit(wildcard.to_space())
        })
        .collect();
    lines.sort();
    if lines.len() == 1 {
        lines.remove(0).space
    } else {
        IpSpace::Acl(lines)
    }
}

/// Errors of resolving named ip spaces
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IpSpaceError {
    /// A referenced space is not defined
    #[error("IpSpace {0} is not defined")]
    UndefinedReference(String),
    /// The references form a cycle. The first and the last name of the list are the same.
    #[error("Circular IpSpace reference: {}", .0.join(" -> "))]
    CircularReference(Vec<String>),
}
