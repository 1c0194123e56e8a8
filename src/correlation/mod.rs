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

//! Cross-source correlation.
//!
//! Everything here is pairwise: callers ask for each pair of sources
//! explicitly (see [`Fleet::pairs`](crate::core::fleet::Fleet::pairs)).
//! Results are plain values recomputed per request; nothing is cached.

pub mod components;
pub mod report;
pub mod similarity;
pub mod timeline;

use crate::parser::clock::DisplayClock;
use crate::parser::record::LogRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use components::{compare_components, ComponentComparison};
pub use similarity::{find_similar_messages, similarity_ratio, ScanStrategy, SimilarityScan};
pub use timeline::find_timeline_correlations;

/// Two sources had error-level activity in buckets `offset_minutes` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineCorrelation {
    /// Minute-aligned bucket on the left-hand source.
    pub time_bucket: DateTime<Utc>,
    /// Right bucket = left bucket + this many minutes.
    pub offset_minutes: i64,
    pub left_events: usize,
    pub left_errors: usize,
    pub right_events: usize,
    pub right_errors: usize,
}

/// Two problem records from different sources with near-identical text.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SimilarityCorrelation<'a> {
    pub left: &'a LogRecord,
    pub right: &'a LogRecord,
    /// In `[0, 1]`.
    pub similarity: f64,
    pub time_diff_minutes: f64,
}

/// Caller-chosen knobs for one comparison run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationParams {
    pub window_minutes: f64,
    pub similarity_threshold: f64,
    pub scan: ScanStrategy,
    pub clock: DisplayClock,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            window_minutes: 5.0,
            similarity_threshold: 0.7,
            scan: ScanStrategy::default(),
            clock: DisplayClock::default(),
        }
    }
}

/// Absolute distance between two instants in fractional minutes.
#[must_use]
pub fn minutes_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let delta = (a - b).abs();
    delta
        .num_microseconds()
        .map_or(delta.num_seconds() as f64 / 60.0, |micros| {
            micros as f64 / 60_000_000.0
        })
}
