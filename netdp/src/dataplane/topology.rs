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

//! # Topology
//!
//! Protocol topologies are directed graphs backed by a [`StableGraph`]. Every edge carries the
//! session properties of the protocol (for instance the negotiated ISIS circuit type). Edges are
//! always computed from scratch out of the configurations.
//!
//! The [`Layer3Topology`] connects all pairs of active interfaces of different nodes which share
//! the same subnet. All routing protocol topologies are built on top of it.

use super::config::Configuration;
use super::types::NodeInterfacePair;

use itertools::Itertools;
use log::*;
use petgraph::prelude::*;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::IntoEdgeReferences;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use std::net::Ipv4Addr;

type IndexType = u32;

/// Directed edge. The tail sends routes to the head.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge<N> {
    /// Sending endpoint
    pub tail: N,
    /// Receiving endpoint
    pub head: N,
}

impl<N> Edge<N> {
    /// Create a new directed edge
    pub fn new(tail: N, head: N) -> Self {
        Self { tail, head }
    }
}

/// Undirected edge with canonically ordered endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UndirectedEdge<N> {
    first: N,
    second: N,
}

impl<N: Ord> UndirectedEdge<N> {
    /// Create the edge. The smaller endpoint always comes first.
    pub fn new(a: N, b: N) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// The smaller endpoint
    pub fn first(&self) -> &N {
        &self.first
    }

    /// The larger endpoint
    pub fn second(&self) -> &N {
        &self.second
    }
}

impl<N: Clone + Ord> From<Edge<N>> for UndirectedEdge<N> {
    fn from(e: Edge<N>) -> Self {
        Self::new(e.tail, e.head)
    }
}

/// Directed graph between endpoints of type `N`, with edge properties of type `E`.
#[derive(Debug, Clone)]
pub struct Topology<N, E> {
    graph: StableGraph<N, E, Directed, IndexType>,
    index: HashMap<N, NodeIndex<IndexType>>,
}

impl<N, E> Default for Topology<N, E>
where
    N: Clone + Eq + Hash + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> Topology<N, E>
where
    N: Clone + Eq + Hash + Ord,
{
    /// Create an empty topology
    pub fn new() -> Self {
        Self { graph: StableGraph::default(), index: HashMap::new() }
    }

    fn node(&mut self, n: &N) -> NodeIndex<IndexType> {
        if let Some(idx) = self.index.get(n) {
            return *idx;
        }
        let idx = self.graph.add_node(n.clone());
        self.index.insert(n.clone(), idx);
        idx
    }

    /// Add (or replace) the directed edge from `tail` to `head`.
    pub fn add_edge(&mut self, tail: N, head: N, props: E) {
        let t = self.node(&tail);
        let h = self.node(&head);
        match self.graph.find_edge(t, h) {
            Some(e) => self.graph[e] = props,
            None => {
                self.graph.add_edge(t, h, props);
            }
        }
    }

    /// Number of edges
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if the topology has no edge
    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    /// Properties of the edge from `tail` to `head`
    pub fn edge(&self, tail: &N, head: &N) -> Option<&E> {
        let t = self.index.get(tail)?;
        let h = self.index.get(head)?;
        self.graph.find_edge(*t, *h).map(|e| &self.graph[e])
    }

    /// Returns `true` if there is an edge from `tail` to `head`
    pub fn contains_edge(&self, tail: &N, head: &N) -> bool {
        self.edge(tail, head).is_some()
    }

    /// All edges, sorted
    pub fn edges(&self) -> Vec<(Edge<N>, &E)> {
        self.graph
            .edge_references()
            .map(|e| {
                let tail = self.graph[e.source()].clone();
                let head = self.graph[e.target()].clone();
                (Edge::new(tail, head), e.weight())
            })
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .collect()
    }

    /// All edges without direction, sorted
    pub fn undirected_edges(&self) -> BTreeSet<UndirectedEdge<N>> {
        self.edges().into_iter().map(|(e, _)| UndirectedEdge::from(e)).collect()
    }

    /// All edges towards `head`, sorted by their tail
    pub fn in_edges(&self, head: &N) -> Vec<(&N, &E)> {
        match self.index.get(head) {
            Some(h) => self
                .graph
                .edges_directed(*h, Incoming)
                .map(|e| (&self.graph[e.source()], e.weight()))
                .sorted_by(|a, b| a.0.cmp(b.0))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All edges starting at `tail`, sorted by their head
    pub fn out_edges(&self, tail: &N) -> Vec<(&N, &E)> {
        match self.index.get(tail) {
            Some(t) => self
                .graph
                .edges_directed(*t, Outgoing)
                .map(|e| (&self.graph[e.target()], e.weight()))
                .sorted_by(|a, b| a.0.cmp(b.0))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Layer-3 adjacencies: interfaces of different nodes in the same subnet
pub type Layer3Topology = Topology<NodeInterfacePair, ()>;

/// Infer the layer-3 topology out of the interface addresses. Only active interfaces with an
/// address participate, and /32 subnets never form an adjacency.
pub fn infer_layer3(configs: &BTreeMap<String, Configuration>) -> Layer3Topology {
    let mut subnets: BTreeMap<_, Vec<(NodeInterfacePair, Ipv4Addr)>> = BTreeMap::new();
    for (hostname, config) in configs.iter() {
        for iface in config.interfaces.values() {
            if let Some(addr) = iface.active_address() {
                if addr.prefix_len() < 32 {
                    subnets
                        .entry(addr.trunc())
                        .or_default()
                        .push((NodeInterfacePair::new(hostname, &iface.name), addr.addr()));
                }
            }
        }
    }

    let mut topo = Layer3Topology::new();
    for (subnet, members) in subnets.iter() {
        for ((a, a_ip), (b, b_ip)) in members.iter().tuple_combinations() {
            if a.hostname == b.hostname {
                continue;
            }
            if a_ip == b_ip {
                warn!("{} and {} share the address {} in {}", a, b, a_ip, subnet);
                continue;
            }
            topo.add_edge(a.clone(), b.clone(), ());
            topo.add_edge(b.clone(), a.clone(), ());
        }
    }
    debug!("Layer-3 topology has {} edges", topo.num_edges());
    topo
}

/// Map from interface address to the interfaces owning that address
#[derive(Debug, Clone, Default)]
pub struct IpOwners {
    owners: BTreeMap<Ipv4Addr, Vec<(NodeInterfacePair, String)>>,
}

impl IpOwners {
    /// Collect the addresses of all active interfaces
    pub fn new(configs: &BTreeMap<String, Configuration>) -> Self {
        let mut owners: BTreeMap<Ipv4Addr, Vec<(NodeInterfacePair, String)>> = BTreeMap::new();
        for (hostname, config) in configs.iter() {
            for iface in config.interfaces.values() {
                if let Some(addr) = iface.active_address() {
                    owners
                        .entry(addr.addr())
                        .or_default()
                        .push((NodeInterfacePair::new(hostname, &iface.name), iface.vrf.clone()));
                }
            }
        }
        Self { owners }
    }

    /// Interfaces (and their VRF) owning the address
    pub fn owners(&self, ip: &Ipv4Addr) -> &[(NodeInterfacePair, String)] {
        self.owners.get(ip).map(|v| v.as_slice()).unwrap_or(&[])
    }
}
