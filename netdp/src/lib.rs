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

#![deny(missing_docs)]

//! # NetDP: Data Plane Computation for Network Configurations
//! This is a library for computing the steady-state forwarding behavior of a network out of the
//! vendor-neutral configurations of its nodes, and for describing that behavior symbolically.
//!
//! ## Structure
//!
//! This library is structured in the following way:
//!
//! - **[`IpSpace`](ipspace)**: Sets of IP addresses and the BDD engine they are compiled into.
//!   Every predicate of the library is a [`Bdd`](ipspace::Bdd) over the header fields of a
//!   [`BddPacket`](ipspace::BddPacket), and can be converted back into an
//!   [`IpSpace`](ipspace::IpSpace).
//!
//! - **[`Filter`](filter)**: Packet filters made of ordered permit and deny lines, and the
//!   [`FilterReducer`](filter::FilterReducer), which collapses a filter into a single predicate.
//!
//! - **[`DataPlane`](dataplane)**: The configuration model, the routing protocols (BGP, OSPF,
//!   ISIS, EIGRP, static and connected routes, redistribution), the convergence controller, the FIB
//!   compiler and the forwarding analysis.
//!
//! ## Usage
//!
//! Build a [`Configuration`](dataplane::Configuration) for every node, and compute the data plane
//! with [`compute_data_plane`](dataplane::compute_data_plane).
//!
//! ```
//! use netdp::dataplane::*;
//! use netdp::ipspace::Packet;
//! use netdp::Error;
//! # use maplit::btreemap;
//!
//! fn main() -> Result<(), Error> {
//!     let mut r1 = Configuration::new("r1");
//!     r1.add_interface(Interface::new("eth0", Some("10.0.0.0/31".parse().unwrap())));
//!     r1.default_vrf_mut().add_static_route(StaticRoute::new(
//!         "192.168.0.0/16".parse().unwrap(),
//!         NextHop::Ip("10.0.0.1".parse().unwrap()),
//!     ));
//!     let mut r2 = Configuration::new("r2");
//!     r2.add_interface(Interface::new("eth0", Some("10.0.0.1/31".parse().unwrap())));
//!     r2.add_interface(Interface::new("eth1", Some("192.168.1.1/24".parse().unwrap())));
//!
//!     let configs = btreemap! {"r1".to_string() => r1, "r2".to_string() => r2};
//!     let dp = compute_data_plane(configs, &EngineSettings::new())?;
//!
//!     let packet = Packet::new("10.0.0.0".parse().unwrap(), "192.168.1.20".parse().unwrap());
//!     let traces = dp.trace("r1", DEFAULT_VRF, &packet)?;
//!     assert_eq!(traces[0].disposition, Disposition::Delivered);
//!
//!     Ok(())
//! }
//! ```

pub mod dataplane;
mod error;
pub mod filter;
pub mod ipspace;

#[cfg(test)]
mod test;

pub use error::Error;
