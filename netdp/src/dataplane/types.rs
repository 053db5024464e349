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

//! Module containing all type definitions shared by the data plane computation

use ipnet::Ipv4Net;
use std::fmt;
use thiserror::Error;

/// IP Prefix. Prefixes stored in a RIB are always normalized (host bits cleared).
pub type Prefix = Ipv4Net;

/// AS Number
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct AsId(pub u32);

impl fmt::Display for AsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

/// Hostname and VRF name identifying a virtual router
pub type VrfId = (String, String);

/// An interface of a node, identified by the hostname and the interface name.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
pub struct NodeInterfacePair {
    /// Hostname of the node
    pub hostname: String,
    /// Name of the interface
    pub interface: String,
}

impl NodeInterfacePair {
    /// Create a new pair
    pub fn new<S1: Into<String>, S2: Into<String>>(hostname: S1, interface: S2) -> Self {
        Self { hostname: hostname.into(), interface: interface.into() }
    }
}

impl fmt::Display for NodeInterfacePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.hostname, self.interface)
    }
}

/// Returns `true` if the prefix has no host bits set.
pub fn is_normalized(prefix: &Prefix) -> bool {
    prefix.addr() == prefix.network()
}

/// Structural errors of the configuration model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The key of the configuration map does not match the hostname of the configuration
    #[error("Configuration stored as {0} has hostname {1}")]
    HostnameMismatch(String, String),
    /// An interface is placed in a VRF which is not defined
    #[error("Interface {0} is placed in the undefined VRF {1}")]
    UndefinedVrf(NodeInterfacePair, String),
    /// A static route delegates the lookup to a VRF which is not defined
    #[error("Static route {1} on {0} points to the undefined VRF {2}")]
    UndefinedNextVrf(String, Prefix, String),
    /// A protocol references an interface which is not defined
    #[error("{0} references the undefined interface {1}")]
    UndefinedInterface(String, NodeInterfacePair),
}

/// Errors of querying a computed data plane
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataPlaneError {
    /// The node does not exist
    #[error("Node {0} was not found")]
    NodeNotFound(String),
    /// The VRF does not exist on the node
    #[error("VRF {1} was not found on node {0}")]
    VrfNotFound(String, String),
    /// The interface does not exist on the node
    #[error("Interface {0} was not found")]
    InterfaceNotFound(NodeInterfacePair),
}
