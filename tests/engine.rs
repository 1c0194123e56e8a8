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

//! End-to-end checks over newline-delimited JSON files on disk.

use chrono::{TimeDelta, TimeZone, Utc};
use fleetcrab::analysis::health::{assess_health, HealthIssue, HealthThresholds};
use fleetcrab::analysis::timeline::{find_gaps, sorted_instants, GAP_THRESHOLD};
use fleetcrab::analysis::{create_default_report, AnalysisContext};
use fleetcrab::core::filter::{apply, apply_all, refine};
use fleetcrab::core::fleet::read_source;
use fleetcrab::core::loader::file_name_of;
use fleetcrab::core::{load_file, Fleet, FilterSpec, SourceCollection, SourceError};
use fleetcrab::correlation::report::render_overview;
use fleetcrab::correlation::{
    find_similar_messages, find_timeline_correlations, similarity_ratio, CorrelationParams,
};
use fleetcrab::export::records_to_json;
use fleetcrab::parser::record::EventTime;
use fleetcrab::DisplayClock;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path
}

fn error_at(ts: &str, component: &str, message: &str) -> String {
    format!(
        r#"{{"@timestamp":"{ts}","log.level":"error","component":{{"binary":"{component}"}},"message":"{message}"}}"#
    )
}

fn fleet_with(dir: &Path, sources: &[(&str, &[String])]) -> Fleet {
    let mut fleet = Fleet::new(DisplayClock::Utc);
    for (id, lines) in sources {
        fleet.register(*id).unwrap();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let path = write_log(dir, &format!("{id}.ndjson"), &refs);
        let batch = load_file(&path, id, DisplayClock::Utc).unwrap();
        fleet.load_files(id, [batch]).unwrap();
    }
    fleet
}

#[test]
fn test_load_skips_bad_lines_and_sorts_sentinel_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(
        dir.path(),
        "agent.ndjson",
        &[
            r#"{"@timestamp":"2024-01-15T10:05:00Z","message":"late"}"#,
            "not json at all",
            "",
            r#"["an","array"]"#,
            r#"{"message":"no clock","component":{"binary":"metricbeat"},"service.name":"svc"}"#,
            r#"{"@timestamp":"2024-01-15T10:00:00Z","message":"early"}"#,
        ],
    );

    let batch = load_file(&path, "A", DisplayClock::Utc).unwrap();
    assert_eq!(batch.file_name, "agent.ndjson");
    assert_eq!(batch.failed_lines, 2);

    let mut source = SourceCollection::new("A");
    source.load([batch]);
    let messages: Vec<&str> = source.records().iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, ["no clock", "early", "late"]);
    assert_eq!(source.records()[0].timestamp, EventTime::Unparsed);
    assert_eq!(source.records()[0].component, "metricbeat");
    assert_eq!(source.records()[2].line_number, 1);
    assert_eq!(source.failed_lines(), 2);
}

#[test]
fn test_duplicate_file_leaves_source_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_log(
        dir.path(),
        "agent.ndjson",
        &[r#"{"@timestamp":"2024-01-15T10:00:00Z","component":"filebeat"}"#],
    );
    let other_dir = dir.path().join("other");
    std::fs::create_dir(&other_dir).unwrap();
    let second = write_log(
        &other_dir,
        "agent.ndjson",
        &[r#"{"@timestamp":"2024-01-15T09:00:00Z","component":"endpoint"}"#],
    );
    assert_eq!(file_name_of(&first), file_name_of(&second));

    let mut fleet = Fleet::new(DisplayClock::Utc);
    fleet.register("A").unwrap();
    fleet
        .load_files("A", [load_file(&first, "A", DisplayClock::Utc).unwrap()])
        .unwrap();

    let err = fleet
        .add_file("A", load_file(&second, "A", DisplayClock::Utc).unwrap())
        .unwrap_err();
    assert_eq!(
        err,
        SourceError::DuplicateFile {
            source_id: "A".to_string(),
            file_name: "agent.ndjson".to_string(),
        }
    );

    let handle = fleet.get("A").unwrap();
    let source = read_source(&handle);
    assert_eq!(source.len(), 1);
    assert_eq!(source.components_seen().len(), 1);
    assert!(source.components_seen().contains("filebeat"));
    assert_eq!(source.loaded_files().len(), 1);
}

#[test]
fn test_clear_then_empty_load_is_zero() {
    let dir = tempfile::tempdir().unwrap();
    let lines = [error_at("2024-01-15T10:00:00Z", "filebeat", "boom")];
    let fleet = fleet_with(dir.path(), &[("A", &lines)]);

    fleet.clear("A").unwrap();
    fleet.load_files("A", Vec::new()).unwrap();
    let handle = fleet.get("A").unwrap();
    let stats = read_source(&handle).stats();
    assert_eq!(stats, fleetcrab::core::SourceStats::default());
}

#[test]
fn test_filters_compose() {
    let dir = tempfile::tempdir().unwrap();
    let lines = [
        error_at("2024-01-15T10:00:00Z", "filebeat", "connection refused"),
        error_at("2024-01-15T10:01:00Z", "endpoint", "connection reset"),
        r#"{"@timestamp":"2024-01-15T10:02:00Z","log.level":"info","component":{"binary":"filebeat"},"message":"connection ok"}"#.to_string(),
    ];
    let fleet = fleet_with(dir.path(), &[("A", &lines)]);
    let handle = fleet.get("A").unwrap();
    let source = read_source(&handle);

    assert_eq!(apply(&source, &FilterSpec::new()).len(), 3);

    let by_level = FilterSpec::new().level("error");
    let by_component = FilterSpec::new().component("filebeat");
    let sequential = refine(&apply(&source, &by_level), &by_component);
    let conjunction = apply_all(&source, &[by_level, by_component]);
    assert_eq!(sequential.len(), 1);
    assert_eq!(sequential.len(), conjunction.len());
    assert!(sequential
        .iter()
        .zip(&conjunction)
        .all(|(a, b)| std::ptr::eq(*a, *b)));

    let bad_bound = FilterSpec::new().time_range_text(Some("whenever"), Some("2024-01-15T10:01:00Z"));
    assert_eq!(apply(&source, &bad_bound).len(), 2);
}

#[test]
fn test_timeline_correlation_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = fleet_with(
        dir.path(),
        &[
            ("A", &[error_at("2024-01-15T10:00:00Z", "filebeat", "x")]),
            ("B", &[error_at("2024-01-15T10:01:30Z", "filebeat", "y")]),
        ],
    );
    let pairs = fleet.pairs(&fleet.ids()).unwrap();
    assert_eq!(pairs.len(), 1);
    let (left, right) = &pairs[0];
    let (left, right) = (read_source(left), read_source(right));

    let found = find_timeline_correlations(left.records(), right.records(), 2.0);
    assert!(found.iter().any(|c| c.offset_minutes == 1 || c.offset_minutes == 2));
    assert!(find_timeline_correlations(left.records(), right.records(), 0.0).is_empty());
}

#[test]
fn test_identical_messages_correlate_once() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = fleet_with(
        dir.path(),
        &[
            ("A", &[error_at("2024-01-15T10:00:00Z", "filebeat", "connection refused")]),
            ("B", &[error_at("2024-01-15T10:01:00Z", "filebeat", "connection refused")]),
        ],
    );
    let (a, b) = (fleet.get("A").unwrap(), fleet.get("B").unwrap());
    let (a, b) = (read_source(&a), read_source(&b));

    let found = find_similar_messages(a.records(), b.records(), 0.9, 5.0);
    assert_eq!(found.len(), 1);
    assert!((found[0].similarity - 1.0).abs() < f64::EPSILON);
    assert!((found[0].time_diff_minutes - 1.0).abs() < 1e-9);

    assert!(similarity_ratio("abc", "xyz") < 0.5);
    assert!((similarity_ratio("", "") - 1.0).abs() < f64::EPSILON);

    let overview = render_overview(&[&*a, &*b], &CorrelationParams::default()).unwrap();
    assert!(overview.contains("A: 1 logs, 1 errors, 0 warnings"));
    assert!(overview.contains("  Similarity: 1.00 | Time diff: 1.0 min"));
}

#[test]
fn test_health_boundary_and_gap() {
    let memory = |mb: u64, ts: &str| {
        format!(
            r#"{{"@timestamp":"{ts}","monitoring":{{"metrics":{{"beat":{{"memstats":{{"memory_alloc":{}}}}}}}}}}}"#,
            mb * 1024 * 1024
        )
    };
    let dir = tempfile::tempdir().unwrap();
    let lines = [
        memory(400, "2024-01-15T10:00:00Z"),
        memory(600, "2024-01-15T10:01:00Z"),
        r#"{"@timestamp":"2024-01-15T10:05:00Z","message":"later"}"#.to_string(),
    ];
    let fleet = fleet_with(dir.path(), &[("A", &lines)]);
    let handle = fleet.get("A").unwrap();
    let source = read_source(&handle);

    let report = assess_health(source.records(), &HealthThresholds::default());
    assert!(report.issues.contains(&HealthIssue::HighMemory));

    let gaps = find_gaps(&sorted_instants(source.records()), GAP_THRESHOLD);
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].end - gaps[0].start, TimeDelta::minutes(4));
}

#[test]
fn test_report_and_export_use_display_clock() {
    let dir = tempfile::tempdir().unwrap();
    let lines = [error_at("2024-01-15T12:00:00Z", "filebeat", "boom")];
    let mut fleet = fleet_with(dir.path(), &[("web-01", &lines)]);
    fleet.set_display_clock(DisplayClock::EasternStandard);

    let handle = fleet.get("web-01").unwrap();
    let source = read_source(&handle);
    assert_eq!(source.records()[0].display_timestamp, "2024-01-15 07:00:00 EST");

    let ctx = AnalysisContext {
        clock: fleet.display_clock(),
        ..AnalysisContext::default()
    };
    let generated = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap();
    let report = create_default_report().render(&source, &ctx, generated).unwrap();
    assert!(report.contains("Generated: 2024-01-15 19:00:00 EST"));
    assert!(report.contains("OVERALL STATUS: ISSUES DETECTED"));

    let records: Vec<_> = source.records().iter().collect();
    let json: serde_json::Value =
        serde_json::from_str(&records_to_json("web-01", &records).unwrap()).unwrap();
    assert_eq!(json[0]["timestamp"], "2024-01-15 07:00:00 EST");
    assert_eq!(json[0]["parsed_timestamp"], "2024-01-15T12:00:00+00:00");
}
