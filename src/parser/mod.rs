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

pub mod clock;
pub mod record;

use crate::parser::clock::DisplayClock;
use crate::parser::record::{normalize, LogRecord, Provenance};
use rayon::prelude::*;
use serde_json::{Map, Value};

/// Normalized records from one file, plus how many lines were rejected.
#[derive(Debug, Clone, Default)]
pub struct FileBatch {
    pub file_name: String,
    pub records: Vec<LogRecord>,
    pub failed_lines: usize,
}

impl FileBatch {
    #[must_use]
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            records: Vec::new(),
            failed_lines: 0,
        }
    }
}

/// Outcome of decoding one physical line.
enum Decoded {
    Blank,
    Document(Map<String, Value>),
    Rejected(String),
}

fn decode_line(line: &str) -> Decoded {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Decoded::Blank;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Decoded::Document(map),
        Ok(other) => Decoded::Rejected(format!("expected a JSON object, got {}", kind(&other))),
        Err(e) => Decoded::Rejected(e.to_string()),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode and normalize newline-delimited JSON for one file.
///
/// Blank lines are ignored. Lines that are not JSON objects are skipped and
/// counted in [`FileBatch::failed_lines`]. Line numbers are 1-based and count
/// every physical line, blank ones included. Output keeps file order.
pub fn ingest_lines<'a, I>(
    source_id: &str,
    file_name: &str,
    lines: I,
    clock: DisplayClock,
) -> FileBatch
where
    I: IntoIterator<Item = &'a str>,
{
    profiling::scope!("ingest_lines");
    let lines: Vec<&str> = lines.into_iter().collect();

    let decoded: Vec<(usize, Decoded)> = lines
        .par_iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, decode_line(line)))
        .collect();

    let mut batch = FileBatch::new(file_name);
    let mut documents = Vec::with_capacity(decoded.len());
    for (line_number, outcome) in decoded {
        match outcome {
            Decoded::Blank => {}
            Decoded::Document(doc) => documents.push((line_number, doc)),
            Decoded::Rejected(reason) => {
                tracing::debug!("Skipping line {line_number} in {file_name}: {reason}");
                batch.failed_lines += 1;
            }
        }
    }

    batch.records = documents
        .into_par_iter()
        .map(|(line_number, doc)| {
            normalize(
                doc,
                Provenance {
                    source_id,
                    file_name,
                    line_number,
                },
                clock,
            )
        })
        .collect();

    if batch.failed_lines > 0 {
        tracing::warn!(
            "{file_name}: {} malformed lines skipped ({} records kept)",
            batch.failed_lines,
            batch.records.len()
        );
    }
    batch
}
