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
use crate::parser::record::{EventTime, LogRecord, Severity};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::{self, Write};

pub const STATUS_HISTORY: usize = 5;
/// Error share (percent of info+warning+error) above which a component is flagged.
pub const ERROR_RATE_WARNING: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Started,
    Stopped,
    Error,
}

impl Status {
    /// Classify a message by keyword. Start wins over stop, stop over error.
    #[must_use]
    pub fn detect(message: &str) -> Option<Self> {
        let message = message.to_lowercase();
        if message.contains("started") || message.contains("starting") {
            Some(Self::Started)
        } else if message.contains("stopped") || message.contains("stopping") {
            Some(Self::Stopped)
        } else if message.contains("failed") || message.contains("error") {
            Some(Self::Error)
        } else {
            None
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentProfile {
    pub total: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub info: usize,
    pub warnings: usize,
    pub errors: usize,
    /// Chronological, at most [`STATUS_HISTORY`] of the latest.
    pub status_changes: Vec<(EventTime, Status)>,
}

impl ComponentProfile {
    /// Errors as a percentage of info+warning+error records, if any.
    #[must_use]
    pub fn error_rate(&self) -> Option<f64> {
        let classified = self.info + self.warnings + self.errors;
        (classified > 0).then(|| self.errors as f64 / classified as f64 * 100.0)
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.error_rate().is_some() && self.errors == 0 && self.warnings == 0
    }

    fn observe(&mut self, record: &LogRecord) {
        self.total += 1;
        if let Some(ts) = record.timestamp.instant() {
            self.first_seen = Some(self.first_seen.map_or(ts, |first| first.min(ts)));
            self.last_seen = Some(self.last_seen.map_or(ts, |last| last.max(ts)));
        }
        match record.severity() {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.info += 1,
            Severity::Other => {}
        }
        if let Some(status) = Status::detect(&record.message) {
            self.status_changes.push((record.timestamp, status));
        }
    }
}

/// Per-component lifecycle profile, keyed and sorted by component name.
#[must_use]
pub fn profile_components(records: &[LogRecord]) -> BTreeMap<String, ComponentProfile> {
    profiling::scope!("profile_components");
    let mut profiles: BTreeMap<String, ComponentProfile> = BTreeMap::new();
    for record in records {
        profiles
            .entry(record.component.clone())
            .or_default()
            .observe(record);
    }
    for profile in profiles.values_mut() {
        profile.status_changes.sort_by_key(|(at, _)| *at);
        let excess = profile.status_changes.len().saturating_sub(STATUS_HISTORY);
        profile.status_changes.drain(..excess);
    }
    profiles
}

pub struct ComponentAnalyzer;

impl Analyzer for ComponentAnalyzer {
    fn name(&self) -> &'static str {
        "Component Analysis"
    }

    fn analyze(
        &self,
        source: &SourceCollection,
        ctx: &AnalysisContext,
    ) -> Result<String, AnalysisError> {
        require_records(source)?;
        let clock = ctx.clock;
        let mut out = String::new();

        for (component, profile) in profile_components(source.records()) {
            writeln!(out, "Component: {component}")?;
            writeln!(out, "  Total Logs: {}", profile.total)?;

            if let (Some(first), Some(last)) = (profile.first_seen, profile.last_seen) {
                writeln!(
                    out,
                    "  Active Period: {} to {}",
                    clock.render(first),
                    clock.render(last)
                )?;
                writeln!(out, "  Duration: {}", format_span(last - first))?;
            }

            if let Some(rate) = profile.error_rate() {
                writeln!(
                    out,
                    "  Log Levels: {} info, {} warnings, {} errors",
                    profile.info, profile.warnings, profile.errors
                )?;
                if rate > ERROR_RATE_WARNING {
                    writeln!(out, "  [!] High error rate: {rate:.1}%")?;
                } else if profile.is_clean() {
                    writeln!(out, "  [ok] Clean logs (no errors/warnings)")?;
                }
            }

            let timed: Vec<_> = profile
                .status_changes
                .iter()
                .filter_map(|(at, status)| at.instant().map(|ts| (ts, status)))
                .collect();
            if !timed.is_empty() {
                writeln!(out, "  Status Changes:")?;
                for (ts, status) in timed {
                    writeln!(out, "    {}: {status}", clock.render_time(ts))?;
                }
            }
            writeln!(out)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::clock::DisplayClock;
    use crate::parser::ingest_lines;

    fn records(lines: &[String]) -> Vec<LogRecord> {
        ingest_lines("A", "f.ndjson", lines.iter().map(String::as_str), DisplayClock::Utc).records
    }

    fn line(minute: u32, level: &str, message: &str) -> String {
        format!(
            r#"{{"@timestamp":"2024-01-15T10:{minute:02}:00Z","component":"filebeat","log.level":"{level}","message":"{message}"}}"#
        )
    }

    #[test]
    fn test_status_detection_priority() {
        assert_eq!(Status::detect("Harvester Started"), Some(Status::Started));
        assert_eq!(Status::detect("stopping after error"), Some(Status::Stopped));
        assert_eq!(Status::detect("connection FAILED"), Some(Status::Error));
        assert_eq!(Status::detect("all good"), None);
    }

    #[test]
    fn test_keeps_latest_five_status_changes_in_order() {
        let lines: Vec<String> = (0..7)
            .rev()
            .map(|minute| line(minute, "info", "input started"))
            .collect();
        let profiles = profile_components(&records(&lines));
        let changes = &profiles["filebeat"].status_changes;
        assert_eq!(changes.len(), STATUS_HISTORY);
        let minutes: Vec<u32> = changes
            .iter()
            .filter_map(|(at, _)| at.instant())
            .map(|ts| chrono::Timelike::minute(&ts))
            .collect();
        assert_eq!(minutes, [2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_error_rate_and_clean_marker() {
        let noisy = profile_components(&records(&[
            line(0, "error", "x"),
            line(1, "info", "y"),
            line(2, "debug", "z"),
        ]));
        let filebeat = &noisy["filebeat"];
        assert_eq!(filebeat.total, 3);
        assert!((filebeat.error_rate().unwrap() - 50.0).abs() < 1e-9);
        assert!(!filebeat.is_clean());

        let clean = profile_components(&records(&[line(0, "info", "y")]));
        assert!(clean["filebeat"].is_clean());

        let debug_only = profile_components(&records(&[line(0, "debug", "y")]));
        assert_eq!(debug_only["filebeat"].error_rate(), None);
        assert!(!debug_only["filebeat"].is_clean());
    }

    #[test]
    fn test_render() {
        let mut source = SourceCollection::new("A");
        source.load([ingest_lines(
            "A",
            "f.ndjson",
            [
                line(0, "info", "filebeat starting").as_str(),
                line(3, "error", "output failed").as_str(),
            ],
            DisplayClock::Utc,
        )]);
        let text = ComponentAnalyzer
            .analyze(&source, &AnalysisContext::default())
            .unwrap();
        assert!(text.contains("  Active Period: 2024-01-15 10:00:00 UTC to 2024-01-15 10:03:00 UTC"));
        assert!(text.contains("  Duration: 0:03:00"));
        assert!(text.contains("  [!] High error rate: 50.0%"));
        assert!(text.contains("  Status Changes:\n    10:00:00 UTC: started\n    10:03:00 UTC: error"));
    }

    #[test]
    fn test_untimed_status_changes_print_no_header() {
        let mut source = SourceCollection::new("A");
        source.load([ingest_lines(
            "A",
            "f.ndjson",
            [
                r#"{"component":"filebeat","log.level":"info","message":"filebeat starting"}"#,
                r#"{"@timestamp":"soon","component":"filebeat","message":"output failed"}"#,
            ],
            DisplayClock::Utc,
        )]);
        let profiles = profile_components(source.records());
        assert_eq!(profiles["filebeat"].status_changes.len(), 2);

        let text = ComponentAnalyzer
            .analyze(&source, &AnalysisContext::default())
            .unwrap();
        assert!(text.starts_with("Component: filebeat
  Total Logs: 2
"));
        assert!(!text.contains("Status Changes:"));
    }
}
