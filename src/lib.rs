// FleetCrab - GPL-3.0-or-later
// This file is part of FleetCrab.
//
// Copyright (C) 2025 The FleetCrab Authors
//
// FleetCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// FleetCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with FleetCrab.  If not, see <https://www.gnu.org/licenses/>.

//! `FleetCrab` correlates newline-delimited JSON agent logs across servers.
//!
//! Each server's logs are normalized into a [`SourceCollection`] once, at
//! load time. Filtering, single-source analysis and cross-source
//! correlation are then plain, recomputed-on-request functions over those
//! collections. A [`Fleet`] holds several collections behind per-source
//! locks for callers that load and query concurrently.

pub mod analysis;
pub mod config;
pub mod core;
pub mod correlation;
pub mod details;
pub mod export;
pub mod parser;

pub use crate::config::EngineConfig;
pub use crate::core::{Fleet, FilterSpec, SourceCollection, SourceError, SourceId};
pub use crate::parser::clock::DisplayClock;
pub use crate::parser::record::LogRecord;
