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

//! # Data Plane Computation
//!
//! The convergence controller. It builds all protocol topologies, seeds every virtual router, and
//! then runs bulk-synchronous rounds: in each round, every virtual router computes its next state
//! only out of the frozen state of the previous round. Virtual routers are distributed over worker
//! threads, and the new states replace the old ones only after all workers have finished. The
//! computation stops as soon as a round changes nothing, or when the round budget is exhausted.
//!
//! After the routing state is final, the FIBs are compiled, the forwarding analysis is computed,
//! and all filters are reduced to BDD predicates.
//!
//! ```
//! # use netdp::dataplane::*;
//! # use maplit::btreemap;
//! let mut r1 = Configuration::new("r1");
//! r1.add_interface(Interface::new("eth0", Some("10.0.0.0/31".parse().unwrap())));
//! let mut r2 = Configuration::new("r2");
//! r2.add_interface(Interface::new("eth0", Some("10.0.0.1/31".parse().unwrap())));
//!
//! let configs = btreemap! {"r1".to_string() => r1, "r2".to_string() => r2};
//! let dp = compute_data_plane(configs, &EngineSettings::new())?;
//! assert_eq!(dp.status(), ConvergenceStatus::Converged);
//! # Ok::<(), netdp::Error>(())
//! ```

use super::bgp::{bgp_topology, BgpPeerId, BgpSession};
use super::config::Configuration;
use super::eigrp::eigrp_topology;
use super::fib::Fib;
use super::forwarding_analysis::{analyze, ForwardingCategory, VrfForwardingAnalysis};
use super::forwarding_state::{ForwardingState, Trace};
use super::isis::{isis_topology, IsisLevel};
use super::ospf::{ospf_topology, OspfArea};
use super::rib::Rib;
use super::router::{RoundState, RouterContext, VirtualRouter};
use super::topology::{infer_layer3, IpOwners, Layer3Topology, Topology};
use super::types::{DataPlaneError, NodeInterfacePair, VrfId};
use crate::filter::{FilterError, FilterPredicate, FilterReducer};
use crate::ipspace::{Bdd, BddPacket, IpSpaceError, Packet};
use crate::Error;

use log::*;
use std::collections::BTreeMap;
use std::fmt;

/// Default round budget
pub static DEFAULT_MAX_ROUNDS: usize = 1_000;

/// Settings of the data plane computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    max_rounds: usize,
    num_threads: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSettings {
    /// Default settings: [`DEFAULT_MAX_ROUNDS`] rounds, one worker per CPU.
    pub fn new() -> Self {
        Self { max_rounds: DEFAULT_MAX_ROUNDS, num_threads: None }
    }

    /// Set the maximum number of rounds. If the routing state still changes in the last round, the
    /// result is marked as [`ConvergenceStatus::DidNotConverge`].
    pub fn set_max_rounds(&mut self, max_rounds: usize) -> &mut Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the number of worker threads. If not set, the number of CPUs is used.
    pub fn set_num_threads(&mut self, num_threads: usize) -> &mut Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Maximum number of rounds
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Number of worker threads
    pub fn num_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Outcome of the convergence loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvergenceStatus {
    /// A round did not change any routing state
    Converged,
    /// The routing state still changed in the last of the given number of rounds
    DidNotConverge(usize),
}

impl ConvergenceStatus {
    /// Returns `true` if the computation converged
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::DidNotConverge(rounds) => write!(f, "did not converge after {} rounds", rounds),
        }
    }
}

/// All realized protocol topologies
#[derive(Debug, Clone)]
pub struct ProtocolTopologies {
    /// Layer-3 adjacencies
    pub layer3: Layer3Topology,
    /// OSPF adjacencies with their area
    pub ospf: Topology<NodeInterfacePair, OspfArea>,
    /// ISIS adjacencies with their circuit type
    pub isis: Topology<NodeInterfacePair, IsisLevel>,
    /// EIGRP adjacencies with their AS number
    pub eigrp: Topology<NodeInterfacePair, u32>,
    /// BGP sessions
    pub bgp: Topology<BgpPeerId, BgpSession>,
    /// Owners of all active interface addresses
    pub ip_owners: IpOwners,
}

impl ProtocolTopologies {
    /// Build all topologies out of the configurations
    pub fn compute(configs: &BTreeMap<String, Configuration>) -> Self {
        let layer3 = infer_layer3(configs);
        let ip_owners = IpOwners::new(configs);
        Self {
            ospf: ospf_topology(configs, &layer3),
            isis: isis_topology(configs, &layer3),
            eigrp: eigrp_topology(configs, &layer3),
            bgp: bgp_topology(configs, &ip_owners),
            layer3,
            ip_owners,
        }
    }
}

/// Compute the data plane of the network. Fails only if the configurations are structurally
/// inconsistent; every other problem is reported on the individual entity of the result.
pub fn compute_data_plane(
    configs: BTreeMap<String, Configuration>,
    settings: &EngineSettings,
) -> Result<DataPlane, Error> {
    for (key, config) in configs.iter() {
        config.validate(key)?;
    }
    info!("Compute the data plane of {} nodes", configs.len());

    let topologies = ProtocolTopologies::compute(&configs);

    let mut routers: BTreeMap<VrfId, VirtualRouter> = configs
        .iter()
        .flat_map(|(hostname, config)| {
            config.vrfs.values().map(move |vrf| {
                ((hostname.clone(), vrf.name.clone()), VirtualRouter::new(config, vrf))
            })
        })
        .collect();

    let num_threads = settings.num_threads();
    let mut rounds = 0;
    let status = loop {
        if rounds >= settings.max_rounds {
            warn!("Data plane did not converge after {} rounds", rounds);
            break ConvergenceStatus::DidNotConverge(rounds);
        }
        rounds += 1;
        let next = run_round(&configs, &routers, &topologies, num_threads);
        let changed = next != routers;
        routers = next;
        info!("Round {} done, {}", rounds, if changed { "state changed" } else { "no change" });
        if !changed {
            break ConvergenceStatus::Converged;
        }
    };

    let fibs: BTreeMap<VrfId, Fib> = routers
        .iter()
        .map(|(key, router)| (key.clone(), Fib::compile(router.main_rib())))
        .collect();
    let unresolved: usize = fibs.values().map(|f| f.unresolved().len()).sum();
    if unresolved > 0 {
        info!("{} routes could not be resolved", unresolved);
    }

    let packet = BddPacket::new();
    let forwarding = analyze(&packet, &configs, &fibs, &topologies.layer3);

    let mut filter_predicates = BTreeMap::new();
    let mut ip_space_errors = BTreeMap::new();
    for (hostname, config) in configs.iter() {
        let mut reducer = FilterReducer::new(&packet, &config.filters, &config.ip_spaces);
        for (name, result) in reducer.reduce_all() {
            filter_predicates.insert((hostname.clone(), name), result);
        }
        let errors: Vec<(String, IpSpaceError)> = config
            .ip_spaces
            .iter()
            .filter_map(|(name, space)| {
                space.check_references(&config.ip_spaces).err().map(|e| (name.clone(), e))
            })
            .collect();
        for (name, e) in errors.iter() {
            warn!("{}: IpSpace {}: {}", hostname, name, e);
        }
        ip_space_errors.insert(hostname.clone(), errors);
    }

    Ok(DataPlane {
        configs,
        topologies,
        routers,
        fibs,
        status,
        rounds,
        packet,
        forwarding,
        filter_predicates,
        ip_space_errors,
    })
}

/// Run a single round. Every worker reads only the frozen state of the previous round.
fn run_round(
    configs: &BTreeMap<String, Configuration>,
    routers: &BTreeMap<VrfId, VirtualRouter>,
    topologies: &ProtocolTopologies,
    num_threads: usize,
) -> BTreeMap<VrfId, VirtualRouter> {
    let round = RoundState { configs, routers, topologies };
    let keys: Vec<&VrfId> = routers.keys().collect();
    if num_threads <= 1 || keys.len() <= 1 {
        return keys.into_iter().filter_map(|key| step_router(&round, key)).collect();
    }

    let chunk_size = (keys.len() + num_threads - 1) / num_threads;
    let results: Vec<Vec<(VrfId, VirtualRouter)>> = std::thread::scope(|s| {
        let handles: Vec<_> = keys
            .chunks(chunk_size)
            .map(|chunk| {
                let round = &round;
                s.spawn(move || {
                    chunk.iter().filter_map(|key| step_router(round, key)).collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(r) => r,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect()
    });
    results.into_iter().flatten().collect()
}

fn step_router(round: &RoundState, key: &VrfId) -> Option<(VrfId, VirtualRouter)> {
    let config = round.configs.get(&key.0)?;
    let vrf = config.vrf(&key.1)?;
    let state = round.routers.get(key)?;
    let ctx = RouterContext { hostname: &key.0, config, vrf, state, round };
    Some((key.clone(), state.step(&ctx)))
}

/// Computed data plane of a network
#[derive(Debug)]
pub struct DataPlane {
    configs: BTreeMap<String, Configuration>,
    topologies: ProtocolTopologies,
    routers: BTreeMap<VrfId, VirtualRouter>,
    fibs: BTreeMap<VrfId, Fib>,
    status: ConvergenceStatus,
    rounds: usize,
    packet: BddPacket,
    forwarding: BTreeMap<VrfId, VrfForwardingAnalysis>,
    filter_predicates: BTreeMap<(String, String), Result<FilterPredicate, FilterError>>,
    ip_space_errors: BTreeMap<String, Vec<(String, IpSpaceError)>>,
}

impl DataPlane {
    /// Convergence status
    pub fn status(&self) -> ConvergenceStatus {
        self.status
    }

    /// Number of rounds executed
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// The input configurations
    pub fn configs(&self) -> &BTreeMap<String, Configuration> {
        &self.configs
    }

    /// Realized protocol topologies
    pub fn topologies(&self) -> &ProtocolTopologies {
        &self.topologies
    }

    /// The symbolic packet all predicates are built with
    pub fn packet(&self) -> &BddPacket {
        &self.packet
    }

    fn node(&self, hostname: &str) -> Result<&Configuration, DataPlaneError> {
        self.configs.get(hostname).ok_or_else(|| DataPlaneError::NodeNotFound(hostname.to_string()))
    }

    fn missing_vrf(key: &VrfId) -> DataPlaneError {
        DataPlaneError::VrfNotFound(key.0.clone(), key.1.clone())
    }

    fn key(&self, hostname: &str, vrf: &str) -> Result<VrfId, DataPlaneError> {
        let config = self.node(hostname)?;
        if config.vrf(vrf).is_none() {
            return Err(DataPlaneError::VrfNotFound(hostname.to_string(), vrf.to_string()));
        }
        Ok((hostname.to_string(), vrf.to_string()))
    }

    /// Routing state of the VRF of the node
    pub fn router(&self, hostname: &str, vrf: &str) -> Result<&VirtualRouter, DataPlaneError> {
        let key = self.key(hostname, vrf)?;
        self.routers.get(&key).ok_or_else(|| Self::missing_vrf(&key))
    }

    /// Main RIB of the VRF of the node
    pub fn rib(&self, hostname: &str, vrf: &str) -> Result<&Rib, DataPlaneError> {
        Ok(self.router(hostname, vrf)?.main_rib())
    }

    /// BGP RIB of the VRF of the node
    pub fn bgp_rib(&self, hostname: &str, vrf: &str) -> Result<&Rib, DataPlaneError> {
        Ok(self.router(hostname, vrf)?.bgp_rib())
    }

    /// FIB of the VRF of the node
    pub fn fib(&self, hostname: &str, vrf: &str) -> Result<&Fib, DataPlaneError> {
        let key = self.key(hostname, vrf)?;
        self.fibs.get(&key).ok_or_else(|| Self::missing_vrf(&key))
    }

    /// Iterator over all virtual routers
    pub fn routers(&self) -> impl Iterator<Item = (&VrfId, &VirtualRouter)> {
        self.routers.iter()
    }

    /// Forwarding analysis of the VRF of the node
    pub fn forwarding_analysis(
        &self,
        hostname: &str,
        vrf: &str,
    ) -> Result<&VrfForwardingAnalysis, DataPlaneError> {
        let key = self.key(hostname, vrf)?;
        self.forwarding.get(&key).ok_or_else(|| Self::missing_vrf(&key))
    }

    /// Addresses forwarded out of the interface of the node with the given outcome. The VRF is the
    /// one the interface is placed in.
    pub fn interface_predicate(
        &self,
        hostname: &str,
        interface: &str,
        category: ForwardingCategory,
    ) -> Result<Bdd, DataPlaneError> {
        let iface = self.node(hostname)?.interface(interface).ok_or_else(|| {
            DataPlaneError::InterfaceNotFound(NodeInterfacePair::new(hostname, interface))
        })?;
        Ok(self.forwarding_analysis(hostname, &iface.vrf)?.predicate(interface, category))
    }

    /// Reduced predicate of the filter of the node, or the error that prevented the reduction.
    /// Returns `None` if the filter is not defined.
    pub fn filter_predicate(
        &self,
        hostname: &str,
        filter: &str,
    ) -> Option<&Result<FilterPredicate, FilterError>> {
        self.filter_predicates.get(&(hostname.to_string(), filter.to_string()))
    }

    /// Invalid named ip spaces of the node
    pub fn ip_space_errors(&self, hostname: &str) -> &[(String, IpSpaceError)] {
        self.ip_space_errors.get(hostname).map(|e| e.as_slice()).unwrap_or(&[])
    }

    /// Forwarding state used to trace concrete packets
    pub fn forwarding_state(&self) -> ForwardingState<'_> {
        ForwardingState::new(&self.configs, &self.fibs, &self.topologies.layer3)
    }

    /// Trace a concrete packet starting at the VRF of the node
    pub fn trace(
        &self,
        hostname: &str,
        vrf: &str,
        packet: &Packet,
    ) -> Result<Vec<Trace>, DataPlaneError> {
        self.forwarding_state().trace(hostname, vrf, packet)
    }
}
