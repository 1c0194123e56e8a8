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

//! Canonical log record and the normalizer that builds it.
//!
//! Agent log documents are untrusted and loosely shaped: `@timestamp` may be
//! missing or garbage, the component may be an object, a scalar or absent.
//! [`normalize`] decodes all of that once, up front, into a [`LogRecord`] so
//! everything downstream works against a fixed schema. It never fails.

use crate::parser::clock::DisplayClock;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Characters kept in [`LogRecord::message_preview`] before truncation.
pub const PREVIEW_CHARS: usize = 100;

/// Placeholder used for absent level/component values.
pub const UNKNOWN: &str = "unknown";

const WITH_OFFSET: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Record timestamp: either a real UTC instant or the "unparsed" sentinel.
///
/// `Unparsed` is declared first so the derived ordering puts it before every
/// real instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventTime {
    Unparsed,
    At(DateTime<Utc>),
}

impl EventTime {
    #[must_use]
    pub const fn instant(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unparsed => None,
            Self::At(ts) => Some(ts),
        }
    }

    #[must_use]
    pub const fn is_parsed(self) -> bool {
        matches!(self, Self::At(_))
    }
}

impl From<DateTime<Utc>> for EventTime {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::At(ts)
    }
}

impl Serialize for EventTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unparsed => serializer.serialize_none(),
            Self::At(ts) => serializer.serialize_some(&ts.to_rfc3339()),
        }
    }
}

/// Coarse severity derived from the free-text level label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Other,
}

impl Severity {
    /// Case-insensitive classification: `error`, `warn`/`warning`, `info`.
    #[must_use]
    pub fn of(level: &str) -> Self {
        if level.eq_ignore_ascii_case("error") {
            Self::Error
        } else if level.eq_ignore_ascii_case("warn") || level.eq_ignore_ascii_case("warning") {
            Self::Warning
        } else if level.eq_ignore_ascii_case("info") {
            Self::Info
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub const fn is_problem(self) -> bool {
        matches!(self, Self::Error | Self::Warning)
    }
}

/// One normalized log line. Immutable after creation except for the derived
/// display timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub source_id: String,
    pub file_name: String,
    pub line_number: usize,
    pub raw: Value,
    pub timestamp: EventTime,
    pub display_timestamp: String,
    pub level: String,
    pub component: String,
    pub message: String,
    pub message_preview: String,
}

impl LogRecord {
    #[must_use]
    pub fn severity(&self) -> Severity {
        Severity::of(&self.level)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    /// Re-derive the display timestamp for a new zone. Unparsed records keep
    /// their original text.
    pub fn retime(&mut self, clock: DisplayClock) {
        if let EventTime::At(ts) = self.timestamp {
            self.display_timestamp = clock.render(ts);
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {}: {}",
            self.display_timestamp, self.level, self.component, self.message_preview
        )
    }
}

/// Provenance of a document handed to [`normalize`].
#[derive(Debug, Clone, Copy)]
pub struct Provenance<'a> {
    pub source_id: &'a str,
    pub file_name: &'a str,
    pub line_number: usize,
}

/// Build a [`LogRecord`] from a decoded JSON object.
#[must_use]
pub fn normalize(doc: Map<String, Value>, origin: Provenance<'_>, clock: DisplayClock) -> LogRecord {
    let (timestamp, display_timestamp) = field(&doc, "@timestamp").map_or_else(
        || (EventTime::Unparsed, "N/A".to_string()),
        |value| {
            let text = scalar_text(value);
            text.as_deref().and_then(parse_timestamp).map_or_else(
                || {
                    (
                        EventTime::Unparsed,
                        text.unwrap_or_else(|| value.to_string()),
                    )
                },
                |ts| (EventTime::At(ts), clock.render(ts)),
            )
        },
    );

    let level = field(&doc, "log.level")
        .and_then(scalar_text)
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let component = resolve_component(&doc);

    let message = field(&doc, "message")
        .map(|value| scalar_text(value).unwrap_or_else(|| value.to_string()))
        .unwrap_or_default();
    let message_preview = preview(&message);

    LogRecord {
        source_id: origin.source_id.to_string(),
        file_name: origin.file_name.to_string(),
        line_number: origin.line_number,
        raw: Value::Object(doc),
        timestamp,
        display_timestamp,
        level,
        component,
        message,
        message_preview,
    }
}

/// Component resolution order: `component.binary`, `component.type`,
/// scalar `component`, `service.name`, then `unknown`.
fn resolve_component(doc: &Map<String, Value>) -> String {
    let resolved = match doc.get("component") {
        Some(Value::Object(inner)) => Some(
            inner
                .get("binary")
                .filter(|v| !v.is_null())
                .or_else(|| inner.get("type"))
                .and_then(scalar_text)
                .unwrap_or_else(|| UNKNOWN.to_string()),
        ),
        Some(Value::Null) | None => field(doc, "service.name").and_then(scalar_text),
        Some(other) => scalar_text(other).or_else(|| Some(other.to_string())),
    };

    resolved
        .filter(|component| !component.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Look up an ECS-style field. Agents write dotted keys literally
/// (`"log.level": "info"`); the nested spelling is accepted as a fallback.
pub(crate) fn field<'a>(doc: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    if let Some(value) = doc.get(name).filter(|v| !v.is_null()) {
        return Some(value);
    }
    if !name.contains('.') || name.starts_with('@') {
        return None;
    }
    let mut parts = name.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    (!current.is_null()).then_some(current)
}

/// Stringify a scalar JSON value; `None` for null, arrays and objects.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// First [`PREVIEW_CHARS`] characters plus `...` when truncated.
#[must_use]
pub fn preview(message: &str) -> String {
    message
        .char_indices()
        .nth(PREVIEW_CHARS)
        .map_or_else(|| message.to_string(), |(cut, _)| format!("{}...", &message[..cut]))
}

/// Parse an ISO-8601 timestamp. A trailing `Z` means UTC; timestamps without
/// an offset are taken as UTC.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in WITH_OFFSET {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive_text = text.strip_suffix('Z').unwrap_or(text);
    for format in NAIVE {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive_text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
