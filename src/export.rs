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

//! Export of filtered records and analysis text.

use crate::parser::clock::DisplayClock;
use crate::parser::record::{EventTime, LogRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Write};
use std::path::Path;

const HEADER_RULE: usize = 50;
const RECORD_RULE: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

impl ExportFormat {
    /// `.json` (any case) selects JSON, anything else is text.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Serialize)]
struct ExportedRecord<'a> {
    server_name: &'a str,
    file_name: &'a str,
    line_number: usize,
    timestamp: &'a str,
    parsed_timestamp: EventTime,
    level: &'a str,
    component: &'a str,
    message: &'a str,
    raw_log: &'a Value,
}

/// Pretty JSON array, one object per record, attributed to `source_name`.
pub fn records_to_json(
    source_name: &str,
    records: &[&LogRecord],
) -> Result<String, serde_json::Error> {
    let exported: Vec<ExportedRecord<'_>> = records
        .iter()
        .map(|record| ExportedRecord {
            server_name: source_name,
            file_name: &record.file_name,
            line_number: record.line_number,
            timestamp: &record.display_timestamp,
            parsed_timestamp: record.timestamp,
            level: &record.level,
            component: &record.component,
            message: &record.message,
            raw_log: &record.raw,
        })
        .collect();
    serde_json::to_string_pretty(&exported)
}

pub fn records_to_text(
    source_name: &str,
    records: &[&LogRecord],
    exported_at: DateTime<Utc>,
    clock: DisplayClock,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{source_name} Filtered Log Export")?;
    writeln!(out, "{}", "=".repeat(HEADER_RULE))?;
    writeln!(out, "Exported: {}", clock.render(exported_at))?;
    writeln!(out, "Total Entries: {}\n", records.len())?;

    for record in records {
        writeln!(
            out,
            "[{}] {} - {}",
            record.display_timestamp, record.level, record.component
        )?;
        writeln!(out, "File: {} (Line {})", record.file_name, record.line_number)?;
        writeln!(out, "Message: {}", record.message)?;
        writeln!(out, "{}", "-".repeat(RECORD_RULE))?;
    }
    Ok(out)
}

/// Wrap rendered analysis text with an export header.
pub fn analysis_to_text(
    source_name: &str,
    content: &str,
    exported_at: DateTime<Utc>,
    clock: DisplayClock,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{source_name} Analysis Export")?;
    writeln!(out, "{}", "=".repeat(HEADER_RULE))?;
    writeln!(out, "Exported: {}\n", clock.render(exported_at))?;
    out.push_str(content.trim());
    Ok(out)
}
