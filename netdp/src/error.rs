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

//! Module containing the main error type

use crate::dataplane::{ConfigError, DataPlaneError};
use crate::filter::FilterError;
use crate::ipspace::IpSpaceError;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configurations are structurally inconsistent
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    /// A query on the computed data plane failed
    #[error("Data Plane Error: {0}")]
    DataPlane(#[from] DataPlaneError),
    /// A named ip space is invalid
    #[error("IpSpace Error: {0}")]
    IpSpace(#[from] IpSpaceError),
    /// A filter is invalid
    #[error("Filter Error: {0}")]
    Filter(#[from] FilterError),
}
