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

//! Fuzzy message matching between two sources.
//!
//! Only problem records (error / warn / warning) take part. Candidate pairs
//! come from a [`SimilarityScan`]; the plain [`PairwiseScan`] checks every
//! pair, [`WindowedScan`] sorts one side by time and only visits pairs that
//! can fall inside the window. Both produce the same pairs in the same order.

use crate::correlation::{minutes_between, SimilarityCorrelation};
use crate::parser::record::LogRecord;
use chrono::{DateTime, TimeDelta, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// Ratio
// ============================================================================

/// Ratcliff/Obershelp similarity: `2 * M / (len(a) + len(b))` where `M` is the
/// total length of matching blocks found by recursively taking the longest
/// common substring and matching what lies to its left and right.
///
/// Inputs are put in a canonical order first, so the result is exactly
/// symmetric. Two empty strings are identical (`1.0`).
#[must_use]
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let (first, second) = match a.len().cmp(&b.len()).then_with(|| a.cmp(b)) {
        Ordering::Greater => (b, a),
        Ordering::Less | Ordering::Equal => (a, b),
    };
    2.0 * matched_chars(first, second) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a`
/// and then earliest in `b` on ties. Returns `(i, j, size)`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // run[k + 1] = length of the common run ending at (i, blo + k)
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];
    for i in alo..ahi {
        for j in blo..bhi {
            let k = j - blo;
            cur[k + 1] = if a[i] == b[j] { prev[k] + 1 } else { 0 };
            let run = cur[k + 1];
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

// ============================================================================
// Candidate scans
// ============================================================================

/// A problem record prepared for matching.
#[derive(Debug)]
pub struct Candidate<'a> {
    pub record: &'a LogRecord,
    pub at: DateTime<Utc>,
    folded: Vec<char>,
}

impl<'a> Candidate<'a> {
    fn new(record: &'a LogRecord) -> Option<Self> {
        let at = record.timestamp.instant()?;
        record.severity().is_problem().then(|| Self {
            record,
            at,
            folded: record.message.to_lowercase().chars().collect(),
        })
    }
}

/// Strategy producing the `(left, right)` index pairs whose timestamps lie
/// within `window_minutes` of each other. Pairs must come out ordered by left
/// index, then right index.
pub trait SimilarityScan: Send + Sync {
    fn candidate_pairs(
        &self,
        left: &[Candidate<'_>],
        right: &[Candidate<'_>],
        window_minutes: f64,
    ) -> Vec<(usize, usize)>;
}

/// Check every pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairwiseScan;

impl SimilarityScan for PairwiseScan {
    fn candidate_pairs(
        &self,
        left: &[Candidate<'_>],
        right: &[Candidate<'_>],
        window_minutes: f64,
    ) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, l) in left.iter().enumerate() {
            for (j, r) in right.iter().enumerate() {
                if minutes_between(l.at, r.at) <= window_minutes {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

/// Index the right side by time and binary-search each left record's window.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowedScan;

impl SimilarityScan for WindowedScan {
    fn candidate_pairs(
        &self,
        left: &[Candidate<'_>],
        right: &[Candidate<'_>],
        window_minutes: f64,
    ) -> Vec<(usize, usize)> {
        let mut by_time: Vec<usize> = (0..right.len()).collect();
        by_time.sort_by_key(|&j| right[j].at);

        // One extra second of slack; the exact test below decides. A reach
        // past the representable range leaves that side of the slice open.
        let reach = TimeDelta::try_milliseconds((window_minutes.max(0.0) * 60_000.0) as i64)
            .and_then(|r| r.checked_add(&TimeDelta::seconds(1)));

        let mut pairs = Vec::new();
        for (i, l) in left.iter().enumerate() {
            let start = reach
                .and_then(|r| l.at.checked_sub_signed(r))
                .map_or(0, |lo| by_time.partition_point(|&j| right[j].at < lo));
            let end = reach
                .and_then(|r| l.at.checked_add_signed(r))
                .map_or(by_time.len(), |hi| {
                    by_time.partition_point(|&j| right[j].at <= hi)
                });
            let mut hits: Vec<usize> = by_time[start..end]
                .iter()
                .copied()
                .filter(|&j| minutes_between(l.at, right[j].at) <= window_minutes)
                .collect();
            hits.sort_unstable();
            pairs.extend(hits.into_iter().map(|j| (i, j)));
        }
        pairs
    }
}

/// Configurable choice of [`SimilarityScan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    #[default]
    Pairwise,
    Windowed,
}

impl ScanStrategy {
    #[must_use]
    pub fn scanner(self) -> Box<dyn SimilarityScan> {
        match self {
            Self::Pairwise => Box::new(PairwiseScan),
            Self::Windowed => Box::new(WindowedScan),
        }
    }
}

// ============================================================================
// Matching
// ============================================================================

/// Problem-record pairs at most `window_minutes` apart whose lower-cased
/// messages reach `threshold` similarity, best first. Ties keep scan order.
#[must_use]
pub fn find_similar_messages<'a>(
    left: &'a [LogRecord],
    right: &'a [LogRecord],
    threshold: f64,
    window_minutes: f64,
) -> Vec<SimilarityCorrelation<'a>> {
    find_similar_messages_with(&PairwiseScan, left, right, threshold, window_minutes)
}

#[must_use]
pub fn find_similar_messages_with<'a>(
    scan: &dyn SimilarityScan,
    left: &'a [LogRecord],
    right: &'a [LogRecord],
    threshold: f64,
    window_minutes: f64,
) -> Vec<SimilarityCorrelation<'a>> {
    profiling::scope!("find_similar_messages");
    let left: Vec<Candidate<'a>> = left.iter().filter_map(Candidate::new).collect();
    let right: Vec<Candidate<'a>> = right.iter().filter_map(Candidate::new).collect();

    let pairs = scan.candidate_pairs(&left, &right, window_minutes);
    tracing::debug!(
        "Similarity scan: {} x {} problem records, {} pairs in window",
        left.len(),
        right.len(),
        pairs.len()
    );

    let mut matches: Vec<SimilarityCorrelation<'a>> = pairs
        .par_iter()
        .filter_map(|&(i, j)| {
            let (l, r) = (&left[i], &right[j]);
            let similarity = ratio_chars(&l.folded, &r.folded);
            (similarity >= threshold).then(|| SimilarityCorrelation {
                left: l.record,
                right: r.record,
                similarity,
                time_diff_minutes: minutes_between(l.at, r.at),
            })
        })
        .collect();

    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::clock::DisplayClock;
    use crate::parser::ingest_lines;
    use proptest::prelude::*;

    fn records(lines: &[(&str, &str, &str)]) -> Vec<LogRecord> {
        let lines: Vec<String> = lines
            .iter()
            .map(|(ts, level, msg)| {
                format!(r#"{{"@timestamp":"{ts}","log.level":"{level}","message":"{msg}"}}"#)
            })
            .collect();
        ingest_lines("X", "x.ndjson", lines.iter().map(String::as_str), DisplayClock::Utc).records
    }

    #[test]
    fn test_ratio_known_values() {
        assert!((similarity_ratio("abcd", "bcde") - 0.75).abs() < 1e-12);
        assert!((similarity_ratio("abc", "abc") - 1.0).abs() < f64::EPSILON);
        assert!(similarity_ratio("abc", "xyz") < 0.5);
        assert!((similarity_ratio("", "") - 1.0).abs() < f64::EPSILON);
        assert!(similarity_ratio("", "abc").abs() < f64::EPSILON);
    }

    #[test]
    fn test_ratio_is_symmetric_where_block_order_matters() {
        let forward = similarity_ratio("tide", "diet");
        let backward = similarity_ratio("diet", "tide");
        assert!((forward - backward).abs() < f64::EPSILON);
    }

    #[test]
    fn test_identical_messages_one_minute_apart() {
        let a = records(&[("2024-01-15T10:00:00Z", "error", "connection refused")]);
        let b = records(&[("2024-01-15T10:01:00Z", "error", "connection refused")]);

        let found = find_similar_messages(&a, &b, 0.9, 5.0);
        assert_eq!(found.len(), 1);
        assert!((found[0].similarity - 1.0).abs() < f64::EPSILON);
        assert!((found[0].time_diff_minutes - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_only_problem_levels_inside_window() {
        let a = records(&[
            ("2024-01-15T10:00:00Z", "info", "connection refused"),
            ("2024-01-15T10:00:00Z", "WARNING", "Disk almost full"),
        ]);
        let b = records(&[
            ("2024-01-15T10:00:30Z", "error", "connection refused"),
            ("2024-01-15T10:03:00Z", "warn", "disk almost full"),
            ("2024-01-15T10:09:00Z", "warn", "disk almost full"),
        ]);

        let found = find_similar_messages(&a, &b, 0.9, 5.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].left.message, "Disk almost full");
        assert!((found[0].time_diff_minutes - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_and_threshold_are_inclusive() {
        let a = records(&[("2024-01-15T10:00:00Z", "error", "abcd")]);
        let b = records(&[("2024-01-15T10:05:00Z", "error", "bcde")]);
        assert_eq!(find_similar_messages(&a, &b, 0.75, 5.0).len(), 1);
        assert!(find_similar_messages(&a, &b, 0.76, 5.0).is_empty());
        assert!(find_similar_messages(&a, &b, 0.75, 4.99).is_empty());
    }

    #[test]
    fn test_sorted_by_similarity_descending() {
        let a = records(&[
            ("2024-01-15T10:00:00Z", "error", "failed to connect to fleet server"),
            ("2024-01-15T10:00:01Z", "error", "timeout reading config"),
        ]);
        let b = records(&[
            ("2024-01-15T10:00:02Z", "error", "failed to connect to fleet servers"),
            ("2024-01-15T10:00:03Z", "error", "timeout reading config"),
        ]);
        let found = find_similar_messages(&a, &b, 0.5, 1.0);
        assert!(found.len() >= 2);
        assert!(found
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
        assert_eq!(found[0].left.message, "timeout reading config");
    }

    #[test]
    fn test_windowed_scan_matches_pairwise() {
        let a = records(&[
            ("2024-01-15T10:00:00Z", "error", "upstream reset"),
            ("2024-01-15T10:04:00Z", "error", "upstream reset by peer"),
            ("2024-01-15T11:00:00Z", "error", "upstream reset"),
        ]);
        let b = records(&[
            ("2024-01-15T10:06:00Z", "error", "upstream reset"),
            ("2024-01-15T10:01:00Z", "warn", "upstream reset by peer"),
            ("2024-01-15T10:59:30Z", "error", "upstream reset"),
        ]);

        let pairwise = find_similar_messages_with(&PairwiseScan, &a, &b, 0.5, 2.0);
        let windowed = find_similar_messages_with(&WindowedScan, &a, &b, 0.5, 2.0);
        let key = |c: &SimilarityCorrelation<'_>| {
            (c.left.line_number, c.right.line_number, c.similarity.to_bits())
        };
        assert_eq!(
            pairwise.iter().map(key).collect::<Vec<_>>(),
            windowed.iter().map(key).collect::<Vec<_>>()
        );
        assert!(!pairwise.is_empty());
    }

    #[test]
    fn test_huge_window_reaches_every_record() {
        let a = records(&[("2024-01-15T10:00:00Z", "error", "disk full")]);
        let b = records(&[
            ("1990-06-01T00:00:00Z", "error", "disk full"),
            ("2024-01-15T10:00:30Z", "error", "disk full"),
        ]);

        for window in [1e13, 1e300, f64::MAX] {
            let windowed = find_similar_messages_with(&WindowedScan, &a, &b, 0.5, window);
            let pairwise = find_similar_messages_with(&PairwiseScan, &a, &b, 0.5, window);
            assert_eq!(windowed.len(), 2, "window {window}");
            assert_eq!(pairwise.len(), 2, "window {window}");
        }
    }

    proptest! {
        #[test]
        fn prop_reflexive(s in ".{0,40}") {
            prop_assert!((similarity_ratio(&s, &s) - 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn prop_symmetric_and_bounded(a in "[a-e ]{0,30}", b in "[a-e ]{0,30}") {
            let ab = similarity_ratio(&a, &b);
            let ba = similarity_ratio(&b, &a);
            prop_assert!((ab - ba).abs() < f64::EPSILON);
            prop_assert!((0.0..=1.0).contains(&ab));
        }
    }
}
