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

use crate::analysis::{require_records, AnalysisContext, AnalysisError, Analyzer};
use crate::core::source::SourceCollection;
use crate::parser::clock::format_span;
use crate::parser::record::LogRecord;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Silences longer than this are reported as logging gaps.
pub const GAP_THRESHOLD: TimeDelta = TimeDelta::minutes(2);
/// Silences longer than this count as potential outages in the summary.
pub const OUTAGE_THRESHOLD: TimeDelta = TimeDelta::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Gap {
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySpan {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub count: usize,
}

impl ActivitySpan {
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.last - self.first
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineSummary {
    /// Parsed timestamps only.
    pub span: Option<ActivitySpan>,
    pub gaps: Vec<Gap>,
    pub components: BTreeMap<String, ActivitySpan>,
}

/// Sorted parsed timestamps of `records`.
#[must_use]
pub fn sorted_instants(records: &[LogRecord]) -> Vec<DateTime<Utc>> {
    let mut instants: Vec<DateTime<Utc>> = records
        .iter()
        .filter_map(|record| record.timestamp.instant())
        .collect();
    instants.sort_unstable();
    instants
}

/// Consecutive pairs of `sorted` further apart than `longer_than`.
#[must_use]
pub fn find_gaps(sorted: &[DateTime<Utc>], longer_than: TimeDelta) -> Vec<Gap> {
    sorted
        .windows(2)
        .filter(|pair| pair[1] - pair[0] > longer_than)
        .map(|pair| Gap {
            start: pair[0],
            end: pair[1],
        })
        .collect()
}

#[must_use]
pub fn summarize_timeline(records: &[LogRecord]) -> TimelineSummary {
    profiling::scope!("summarize_timeline");
    let instants = sorted_instants(records);
    let span = match (instants.first(), instants.last()) {
        (Some(&first), Some(&last)) => Some(ActivitySpan {
            first,
            last,
            count: instants.len(),
        }),
        _ => None,
    };

    let mut components: BTreeMap<String, ActivitySpan> = BTreeMap::new();
    for record in records {
        let Some(ts) = record.timestamp.instant() else {
            continue;
        };
        components
            .entry(record.component.clone())
            .and_modify(|span| {
                span.first = span.first.min(ts);
                span.last = span.last.max(ts);
                span.count += 1;
            })
            .or_insert(ActivitySpan {
                first: ts,
                last: ts,
                count: 1,
            });
    }

    TimelineSummary {
        span,
        gaps: find_gaps(&instants, GAP_THRESHOLD),
        components,
    }
}

pub struct TimelineAnalyzer;

impl Analyzer for TimelineAnalyzer {
    fn name(&self) -> &'static str {
        "Timeline Analysis"
    }

    fn analyze(
        &self,
        source: &SourceCollection,
        ctx: &AnalysisContext,
    ) -> Result<String, AnalysisError> {
        require_records(source)?;
        let summary = summarize_timeline(source.records());
        let clock = ctx.clock;
        let mut out = String::new();

        let Some(span) = summary.span else {
            writeln!(out, "No valid timestamps found for analysis.")?;
            return Ok(out);
        };

        writeln!(out, "Timeline Overview:")?;
        writeln!(out, "  Start: {}", clock.render(span.first))?;
        writeln!(out, "  End: {}", clock.render(span.last))?;
        writeln!(out, "  Duration: {}", format_span(span.duration()))?;
        writeln!(out, "  Total Log Entries: {}\n", source.len())?;

        writeln!(out, "Logging Gaps (> 2 minutes):")?;
        if summary.gaps.is_empty() {
            writeln!(out, "  No significant gaps found.")?;
        }
        for gap in &summary.gaps {
            writeln!(
                out,
                "  Gap: {} to {} (Duration: {})",
                clock.render(gap.start),
                clock.render(gap.end),
                format_span(gap.duration())
            )?;
        }
        writeln!(out)?;

        writeln!(out, "Component Activity:")?;
        for (component, activity) in &summary.components {
            writeln!(out, "  {component}:")?;
            writeln!(out, "    First: {}", clock.render(activity.first))?;
            writeln!(out, "    Last:  {}", clock.render(activity.last))?;
            writeln!(out, "    Count: {} entries", activity.count)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::clock::DisplayClock;
    use crate::parser::ingest_lines;
    use chrono::TimeZone;

    fn source(lines: &[&str]) -> SourceCollection {
        let mut source = SourceCollection::new("web-01");
        source.load([ingest_lines("web-01", "f.ndjson", lines.iter().copied(), DisplayClock::Utc)]);
        source
    }

    #[test]
    fn test_single_gap_between_second_and_third() {
        let source = source(&[
            r#"{"@timestamp":"2024-01-15T10:00:00Z"}"#,
            r#"{"@timestamp":"2024-01-15T10:01:00Z"}"#,
            r#"{"@timestamp":"2024-01-15T10:05:00Z"}"#,
        ]);
        let summary = summarize_timeline(source.records());
        assert_eq!(summary.gaps.len(), 1);
        let gap = summary.gaps[0];
        assert_eq!(gap.start, Utc.with_ymd_and_hms(2024, 1, 15, 10, 1, 0).unwrap());
        assert_eq!(gap.duration(), TimeDelta::minutes(4));
    }

    #[test]
    fn test_gap_threshold_is_strict() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let exactly_two = [t0, t0 + TimeDelta::minutes(2)];
        assert!(find_gaps(&exactly_two, GAP_THRESHOLD).is_empty());
        let just_over = [t0, t0 + TimeDelta::minutes(2) + TimeDelta::seconds(1)];
        assert_eq!(find_gaps(&just_over, GAP_THRESHOLD).len(), 1);
    }

    #[test]
    fn test_component_spans_skip_unparsed() {
        let source = source(&[
            r#"{"@timestamp":"2024-01-15T10:00:00Z","component":"a"}"#,
            r#"{"@timestamp":"2024-01-15T10:03:00Z","component":"a"}"#,
            r#"{"component":"b"}"#,
        ]);
        let summary = summarize_timeline(source.records());
        assert_eq!(summary.components.len(), 1);
        assert_eq!(summary.components["a"].count, 2);
        assert_eq!(summary.components["a"].duration(), TimeDelta::minutes(3));
        assert_eq!(summary.span.map(|s| s.count), Some(2));
    }

    #[test]
    fn test_render() {
        let source = source(&[
            r#"{"@timestamp":"2024-01-15T10:00:00Z","component":"a"}"#,
            r#"{"@timestamp":"2024-01-15T10:04:00Z","component":"a"}"#,
        ]);
        let text = TimelineAnalyzer
            .analyze(&source, &AnalysisContext::default())
            .unwrap();
        assert!(text.contains("  Duration: 0:04:00"));
        assert!(text.contains(
            "  Gap: 2024-01-15 10:00:00 UTC to 2024-01-15 10:04:00 UTC (Duration: 0:04:00)"
        ));
        assert!(text.contains("    Count: 2 entries"));
    }

    #[test]
    fn test_no_valid_timestamps() {
        let source = source(&[r#"{"message":"x"}"#]);
        let text = TimelineAnalyzer
            .analyze(&source, &AnalysisContext::default())
            .unwrap();
        assert_eq!(text, "No valid timestamps found for analysis.\n");
    }

    #[test]
    fn test_empty_source_is_an_error() {
        let source = SourceCollection::new("web-01");
        let err = TimelineAnalyzer
            .analyze(&source, &AnalysisContext::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptySource(id) if id == "web-01"));
    }
}
