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

use crate::correlation::TimelineCorrelation;
use crate::parser::record::LogRecord;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    events: usize,
    errors: usize,
}

/// Truncate to the start of the minute.
#[must_use]
pub fn minute_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// Buckets in first-seen order. Unparsed records are dropped.
fn bucketize(records: &[LogRecord]) -> IndexMap<DateTime<Utc>, Tally> {
    let mut buckets: IndexMap<DateTime<Utc>, Tally> = IndexMap::new();
    for record in records {
        let Some(ts) = record.timestamp.instant() else {
            continue;
        };
        let tally = buckets.entry(minute_bucket(ts)).or_default();
        tally.events += 1;
        if record.is_error() {
            tally.errors += 1;
        }
    }
    buckets
}

/// Pair up minute buckets where both sides logged at least one error.
///
/// Every left bucket is checked against right buckets at each whole-minute
/// offset in `[-w, w]`, `w = floor(window_minutes)`. A bucket pair matching at
/// several offsets is reported once per offset. Output is in generation
/// order: left buckets by first appearance, then offset ascending.
///
/// Only offsets that land on an existing right bucket are visited, so the
/// cost does not grow with the window. A window reaching past the
/// representable date range is clamped to it.
#[must_use]
pub fn find_timeline_correlations(
    left: &[LogRecord],
    right: &[LogRecord],
    window_minutes: f64,
) -> Vec<TimelineCorrelation> {
    profiling::scope!("find_timeline_correlations");
    let reach = TimeDelta::try_minutes(window_minutes.trunc() as i64);
    let left_buckets = bucketize(left);
    let right_buckets = bucketize(right);

    let mut right_errors: Vec<(DateTime<Utc>, Tally)> = right_buckets
        .iter()
        .filter(|(_, tally)| tally.errors > 0)
        .map(|(&bucket, &tally)| (bucket, tally))
        .collect();
    right_errors.sort_unstable_by_key(|(bucket, _)| *bucket);

    let mut correlations = Vec::new();
    for (&bucket, left_tally) in left_buckets.iter().filter(|(_, t)| t.errors > 0) {
        let lowest = reach.and_then(|r| bucket.checked_sub_signed(r));
        let highest = reach.and_then(|r| bucket.checked_add_signed(r));
        let start = lowest.map_or(0, |lo| right_errors.partition_point(|(at, _)| *at < lo));
        let end = highest.map_or(right_errors.len(), |hi| {
            right_errors.partition_point(|(at, _)| *at <= hi)
        });

        for (right_bucket, right_tally) in &right_errors[start..end.max(start)] {
            correlations.push(TimelineCorrelation {
                time_bucket: bucket,
                offset_minutes: (*right_bucket - bucket).num_minutes(),
                left_events: left_tally.events,
                left_errors: left_tally.errors,
                right_events: right_tally.events,
                right_errors: right_tally.errors,
            });
        }
    }

    tracing::debug!(
        "Timeline correlation: {} left buckets, {} right buckets, {} matches",
        left_buckets.len(),
        right_buckets.len(),
        correlations.len()
    );
    correlations
}
