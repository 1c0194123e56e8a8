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
use crate::parser::record::{LogRecord, Severity};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Characters of a message used as its grouping key.
pub const MESSAGE_KEY_CHARS: usize = 100;
pub const TOP_MESSAGES: usize = 10;
pub const RECENT_PROBLEMS: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProblemCounts {
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentProblem {
    pub at: DateTime<Utc>,
    /// Lower-cased level label.
    pub level: String,
    pub component: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSummary {
    pub total_records: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Lower-cased level -> count, most common first.
    pub levels: Vec<(String, usize)>,
    /// Only components with at least one error or warning.
    pub by_component: BTreeMap<String, ProblemCounts>,
    /// Truncated problem messages, most common first.
    pub top_messages: Vec<(String, usize)>,
    /// Timestamped problems, most recent first.
    pub recent: Vec<RecentProblem>,
}

fn message_key(message: &str) -> String {
    message.chars().take(MESSAGE_KEY_CHARS).collect()
}

/// Count-descending; equal counts keep first-seen order.
fn most_common(counts: IndexMap<String, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

#[must_use]
pub fn summarize_errors(records: &[LogRecord]) -> ErrorSummary {
    profiling::scope!("summarize_errors");
    let mut levels: IndexMap<String, usize> = IndexMap::new();
    let mut messages: IndexMap<String, usize> = IndexMap::new();
    let mut by_component: BTreeMap<String, ProblemCounts> = BTreeMap::new();
    let mut recent = Vec::new();
    let mut summary = ErrorSummary {
        total_records: records.len(),
        ..ErrorSummary::default()
    };

    for record in records {
        let level = record.level.to_lowercase();
        *levels.entry(level.clone()).or_default() += 1;

        let severity = record.severity();
        match severity {
            Severity::Error => summary.errors += 1,
            Severity::Warning => summary.warnings += 1,
            Severity::Info | Severity::Other => continue,
        }

        let counts = by_component.entry(record.component.clone()).or_default();
        if severity == Severity::Error {
            counts.errors += 1;
        } else {
            counts.warnings += 1;
        }

        let key = message_key(&record.message);
        if let Some(at) = record.timestamp.instant() {
            recent.push(RecentProblem {
                at,
                level,
                component: record.component.clone(),
                message: key.clone(),
            });
        }
        *messages.entry(key).or_default() += 1;
    }

    recent.sort_by(|a, b| {
        (b.at, &b.level, &b.component, &b.message).cmp(&(a.at, &a.level, &a.component, &a.message))
    });
    recent.truncate(RECENT_PROBLEMS);

    let mut top_messages = most_common(messages);
    top_messages.truncate(TOP_MESSAGES);

    ErrorSummary {
        levels: most_common(levels),
        by_component,
        top_messages,
        recent,
        ..summary
    }
}

pub struct ErrorAnalyzer;

impl Analyzer for ErrorAnalyzer {
    fn name(&self) -> &'static str {
        "Error Analysis"
    }

    fn analyze(
        &self,
        source: &SourceCollection,
        ctx: &AnalysisContext,
    ) -> Result<String, AnalysisError> {
        require_records(source)?;
        let summary = summarize_errors(source.records());
        let mut out = String::new();

        writeln!(out, "Error Summary:")?;
        writeln!(out, "  Total Errors: {}", summary.errors)?;
        writeln!(out, "  Total Warnings: {}\n", summary.warnings)?;

        writeln!(out, "Log Levels:")?;
        for (level, count) in &summary.levels {
            let percentage = *count as f64 / summary.total_records as f64 * 100.0;
            writeln!(out, "  {}: {count} ({percentage:.1}%)", level.to_uppercase())?;
        }
        writeln!(out)?;

        writeln!(out, "Errors by Component:")?;
        for (component, counts) in &summary.by_component {
            writeln!(
                out,
                "  {component}: {} errors, {} warnings",
                counts.errors, counts.warnings
            )?;
        }
        writeln!(out)?;

        if !summary.top_messages.is_empty() {
            writeln!(out, "Most Common Error/Warning Messages:")?;
            for (message, count) in &summary.top_messages {
                writeln!(out, "  [{count}x] {message}...")?;
            }
        }

        if !summary.recent.is_empty() {
            writeln!(out, "\nRecent Errors/Warnings:")?;
            for problem in &summary.recent {
                writeln!(
                    out,
                    "  [{}] {} - {}: {}...",
                    ctx.clock.render_time(problem.at),
                    problem.level.to_uppercase(),
                    problem.component,
                    problem.message
                )?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::clock::DisplayClock;
    use crate::parser::ingest_lines;

    fn records(lines: &[&str]) -> Vec<LogRecord> {
        ingest_lines("A", "f.ndjson", lines.iter().copied(), DisplayClock::Utc).records
    }

    #[test]
    fn test_counts_levels_and_components() {
        let summary = summarize_errors(&records(&[
            r#"{"log.level":"ERROR","component":"filebeat","message":"boom"}"#,
            r#"{"log.level":"error","component":"filebeat","message":"boom"}"#,
            r#"{"log.level":"warn","component":"endpoint","message":"slow"}"#,
            r#"{"log.level":"info","component":"agent","message":"ok"}"#,
        ]));

        assert_eq!(summary.errors, 2);
        assert_eq!(summary.warnings, 1);
        assert_eq!(
            summary.levels,
            [
                ("error".to_string(), 2),
                ("warn".to_string(), 1),
                ("info".to_string(), 1)
            ]
        );
        assert_eq!(summary.by_component.len(), 2);
        assert_eq!(
            summary.by_component["filebeat"],
            ProblemCounts {
                errors: 2,
                warnings: 0
            }
        );
        assert_eq!(summary.top_messages[0], ("boom".to_string(), 2));
    }

    #[test]
    fn test_recent_is_most_recent_first_and_skips_unparsed() {
        let summary = summarize_errors(&records(&[
            r#"{"@timestamp":"2024-01-15T10:00:00Z","log.level":"error","message":"first"}"#,
            r#"{"@timestamp":"2024-01-15T10:05:00Z","log.level":"warning","message":"second"}"#,
            r#"{"log.level":"error","message":"no clock"}"#,
        ]));
        let order: Vec<&str> = summary.recent.iter().map(|p| p.message.as_str()).collect();
        assert_eq!(order, ["second", "first"]);
        assert_eq!(summary.top_messages.len(), 3);
    }

    #[test]
    fn test_top_messages_are_truncated_and_limited() {
        let long = "x".repeat(150);
        let mut lines: Vec<String> = (0..12)
            .map(|i| format!(r#"{{"log.level":"error","message":"distinct {i}"}}"#))
            .collect();
        lines.push(format!(r#"{{"log.level":"error","message":"{long}"}}"#));
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let summary = summarize_errors(&records(&refs));
        assert_eq!(summary.top_messages.len(), TOP_MESSAGES);
        let all = summarize_errors(&records(&refs[12..]));
        assert_eq!(all.top_messages[0].0.chars().count(), MESSAGE_KEY_CHARS);
    }

    #[test]
    fn test_render() {
        let mut source = SourceCollection::new("A");
        source.load([ingest_lines(
            "A",
            "f.ndjson",
            [r#"{"@timestamp":"2024-01-15T10:00:00Z","log.level":"error","component":"filebeat","message":"boom"}"#],
            DisplayClock::Utc,
        )]);
        let text = ErrorAnalyzer
            .analyze(&source, &AnalysisContext::default())
            .unwrap();
        assert!(text.contains("  ERROR: 1 (100.0%)"));
        assert!(text.contains("  filebeat: 1 errors, 0 warnings"));
        assert!(text.contains("  [1x] boom..."));
        assert!(text.contains("  [10:00:00 UTC] ERROR - filebeat: boom..."));
    }
}
