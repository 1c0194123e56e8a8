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

//! Human-readable detail views for a single record.

use crate::parser::record::{field, scalar_text, LogRecord};
use serde_json::Value;
use std::fmt::{self, Write};

/// Multi-line description of one record followed by notable raw fields.
pub fn describe_record(record: &LogRecord) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Timestamp: {}", record.display_timestamp)?;
    writeln!(out, "Log Level: {}", record.level)?;
    writeln!(out, "Component: {}", record.component)?;
    writeln!(out, "Server: {}", record.source_id)?;
    writeln!(out, "File: {}", record.file_name)?;
    writeln!(out, "Message: {}", record.message)?;
    writeln!(out)?;

    let Value::Object(doc) = &record.raw else {
        return Ok(out);
    };
    for (label, name) in [("Event", "event"), ("Monitor", "monitor"), ("Service", "service.name")] {
        if let Some(value) = field(doc, name) {
            writeln!(out, "{label}: {}", text(value))?;
        }
    }
    if let Some(origin) = field(doc, "log.origin") {
        writeln!(
            out,
            "Origin: {} ({}:{})",
            lookup(origin, "function"),
            lookup(origin, "file.name"),
            lookup(origin, "file.line")
        )?;
    }
    Ok(out)
}

fn text(value: &Value) -> String {
    scalar_text(value).unwrap_or_else(|| value.to_string())
}

/// Dotted key on an object, literal spelling first.
fn lookup(value: &Value, name: &str) -> String {
    value
        .as_object()
        .and_then(|doc| field(doc, name))
        .map(text)
        .unwrap_or_default()
}

fn or_na(value: Option<&Value>) -> String {
    value.map_or_else(|| "N/A".to_string(), text)
}

fn count(value: Option<&Value>) -> String {
    value.map_or_else(
        || "0".to_string(),
        |v| v.as_i64().map_or_else(|| text(v), group_thousands),
    )
}

/// `1234567` -> `1,234,567`
fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Sectioned dump of the `monitoring.metrics` payload of a raw document.
pub fn describe_metrics(raw: &Value) -> Result<String, fmt::Error> {
    let Some(monitoring) = raw.get("monitoring") else {
        return Ok("No metrics data in this log entry".to_string());
    };
    let Some(metrics) = monitoring.get("metrics") else {
        return Ok("No metrics extracted".to_string());
    };

    let mut out = String::new();
    if let Some(system) = metrics.get("system") {
        writeln!(out, "=== SYSTEM METRICS ===")?;
        if let Some(load) = system.get("load") {
            writeln!(
                out,
                "Load Average: 1m={}, 5m={}, 15m={}",
                or_na(load.get("1")),
                or_na(load.get("5")),
                or_na(load.get("15"))
            )?;
        }
        writeln!(out)?;
    }

    if let Some(beat) = metrics.get("beat") {
        writeln!(out, "=== BEAT METRICS ===")?;
        if let Some(cpu) = beat.get("cpu") {
            let total = cpu.get("total").and_then(|t| t.get("value"));
            writeln!(out, "CPU - Total: {} ticks", or_na(total))?;
        }
        if let Some(mem) = beat.get("memstats") {
            writeln!(out, "Memory - Alloc: {} bytes", count(mem.get("memory_alloc")))?;
            writeln!(out, "Memory - Total: {} bytes", count(mem.get("memory_total")))?;
        }
        if let Some(runtime) = beat.get("runtime") {
            writeln!(out, "Workers: {}", or_na(runtime.get("goroutines")))?;
        }
        writeln!(out)?;
    }

    if let Some(libbeat) = metrics.get("libbeat") {
        writeln!(out, "=== LIBBEAT METRICS ===")?;
        if let Some(events) = libbeat.get("output").and_then(|o| o.get("events")) {
            writeln!(
                out,
                "Output Events - Acked: {}, Active: {}",
                count(events.get("acked")),
                count(events.get("active"))
            )?;
        }
        if let Some(events) = libbeat.get("pipeline").and_then(|p| p.get("events")) {
            writeln!(
                out,
                "Pipeline Events - Published: {}",
                count(events.get("published"))
            )?;
        }
    }

    if out.is_empty() {
        return Ok("No metrics extracted".to_string());
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::clock::DisplayClock;
    use crate::parser::ingest_lines;
    use serde_json::json;

    fn record(line: &str) -> LogRecord {
        let mut batch = ingest_lines("web-01", "agent.ndjson", [line], DisplayClock::Utc);
        batch.records.remove(0)
    }

    #[test]
    fn test_describe_record_basic_fields() {
        let text = describe_record(&record(
            r#"{"@timestamp":"2024-01-15T10:00:00Z","log.level":"info","message":"hello"}"#,
        ))
        .unwrap();
        assert_eq!(
            text,
            "Timestamp: 2024-01-15 10:00:00 UTC\nLog Level: info\nComponent: unknown\n\
             Server: web-01\nFile: agent.ndjson\nMessage: hello\n\n"
        );
    }

    #[test]
    fn test_describe_record_extra_fields() {
        let text = describe_record(&record(
            r#"{"service.name":"fleet-server","event":{"dataset":"elastic_agent"},"log.origin":{"function":"run","file.name":"main.go","file.line":42}}"#,
        ))
        .unwrap();
        assert!(text.contains("Service: fleet-server\n"));
        assert!(text.contains(r#"Event: {"dataset":"elastic_agent"}"#));
        assert!(text.contains("Origin: run (main.go:42)\n"));
        assert!(!text.contains("Monitor:"));
    }

    #[test]
    fn test_describe_metrics_sections() {
        let raw = json!({
            "monitoring": {"metrics": {
                "system": {"load": {"1": 0.5, "5": 0.25}},
                "beat": {
                    "cpu": {"total": {"value": 1200}},
                    "memstats": {"memory_alloc": 52_428_800, "memory_total": 1_234_567_890},
                    "runtime": {"goroutines": 64}
                },
                "libbeat": {
                    "output": {"events": {"acked": 1500, "active": 3}},
                    "pipeline": {"events": {"published": 1503}}
                }
            }}
        });
        let text = describe_metrics(&raw).unwrap();
        assert!(text.starts_with("=== SYSTEM METRICS ===\nLoad Average: 1m=0.5, 5m=0.25, 15m=N/A\n"));
        assert!(text.contains("CPU - Total: 1200 ticks"));
        assert!(text.contains("Memory - Alloc: 52,428,800 bytes"));
        assert!(text.contains("Memory - Total: 1,234,567,890 bytes"));
        assert!(text.contains("Workers: 64"));
        assert!(text.contains("Output Events - Acked: 1,500, Active: 3"));
        assert!(text.ends_with("Pipeline Events - Published: 1,503"));
    }

    #[test]
    fn test_describe_metrics_absent() {
        assert_eq!(
            describe_metrics(&json!({"message": "x"})).unwrap(),
            "No metrics data in this log entry"
        );
        assert_eq!(
            describe_metrics(&json!({"monitoring": {"metrics": {"other": 1}}})).unwrap(),
            "No metrics extracted"
        );
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-1_234_567), "-1,234,567");
    }
}
