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

//! # Connected, Local and Static Routes
//!
//! These routes are derived once from the configuration, before the first round, and never change
//! afterwards.

use super::config::{Configuration, Vrf};
use super::rib::Rib;
use super::route::Route;

use log::*;

/// Connected route for the subnet of every active interface in the VRF, and a local (/32) route for
/// its address. Interfaces with a /32 address only get the local route.
pub fn connected_routes(config: &Configuration, vrf: &Vrf) -> Rib {
    let mut rib = Rib::new(true);
    for iface in config.interfaces_in_vrf(&vrf.name) {
        if let Some(addr) = iface.active_address() {
            // the subnet of a /32 interface is its local address
            if addr.prefix_len() < 32 {
                rib.merge(Route::connected(&addr, &iface.name));
            }
            rib.merge(Route::local(addr.addr(), &iface.name));
        }
    }
    rib
}

/// Static routes of the VRF. Routes out of an inactive or missing interface are ignored.
pub fn static_routes(config: &Configuration, vrf: &Vrf) -> Rib {
    let mut rib = Rib::new(vrf.multipath);
    for sr in vrf.static_routes.iter() {
        if let Some(i) = sr.next_hop.interface() {
            if config.interface(i).map(|i| !i.active).unwrap_or(true) {
                debug!(
                    "{}: ignore static route {} out of inactive interface {}",
                    config.hostname, sr.prefix, i
                );
                continue;
            }
        }
        rib.merge(Route::from_static(sr));
    }
    rib
}
