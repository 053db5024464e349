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

//! # Data Plane
//!
//! Computation of the routing and forwarding state of a network out of the configurations of its
//! nodes. The entry point is [`compute_data_plane`], which returns a [`DataPlane`] containing the
//! RIBs and FIBs of every VRF, the result of the forwarding analysis, and the reduced filters.
//!
//! The computation is structured in the following way:
//!
//! - **[`topology`]**: Layer-3 adjacencies inferred from the interface subnets, and the generic
//!   [`Topology`] graph used by all protocols. Each protocol module builds its own topology on top
//!   of the layer-3 adjacencies ([`ospf`], [`isis`], [`eigrp`]) or out of the session
//!   configuration ([`bgp`]).
//! - **[`rib`]**: The RIB, where routes are merged according to [`RoutePreference`].
//! - **[`router`]**: The state of a single VRF of a node, and how it evolves from one round to the
//!   next.
//! - **[`network`]**: The convergence controller, running all rounds until a fixed point is
//!   reached.
//! - **[`fib`]** and **[`forwarding_analysis`]**: Compilation of the final RIBs into forwarding
//!   tables and symbolic predicates.
//! - **[`forwarding_state`]**: Tracing of concrete packets.

pub mod bgp;
pub mod config;
pub mod connected;
pub mod eigrp;
pub mod fib;
pub mod forwarding_analysis;
pub mod forwarding_state;
pub mod isis;
pub mod network;
pub mod ospf;
pub mod preference;
pub mod redistribution;
pub mod rib;
pub mod route;
pub mod route_map;
pub mod router;
pub mod topology;
mod types;

pub use bgp::{BgpAttributes, BgpPeerConfig, BgpProcess, BgpSessionType};
pub use config::{Configuration, Interface, StaticRoute, Vrf, DEFAULT_VRF};
pub use fib::{Fib, FibAction, FibEntry};
pub use forwarding_analysis::{ForwardingCategory, VrfForwardingAnalysis};
pub use forwarding_state::{Disposition, ForwardingState, Hop, Trace};
pub use network::{
    compute_data_plane, ConvergenceStatus, DataPlane, EngineSettings, ProtocolTopologies,
};
pub use preference::RoutePreference;
pub use rib::Rib;
pub use route::{NextHop, Route, RoutingProtocol};
pub use router::VirtualRouter;
pub use topology::Topology;
pub use types::*;
