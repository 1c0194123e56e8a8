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

//! Record filtering.
//!
//! A [`FilterSpec`] is built per query and evaluated against a source's
//! records in one order-preserving pass. Every field is optional; an absent
//! field places no constraint.

use crate::core::source::SourceCollection;
use crate::parser::record::{parse_timestamp, LogRecord};
use chrono::{DateTime, Utc};
use rayon::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub component: Option<String>,
    pub level: Option<String>,
    pub file: Option<String>,
    /// Case-insensitive substring of message + serialized raw document.
    pub search: Option<String>,
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl FilterSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    #[must_use]
    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Empty search text means "no constraint".
    #[must_use]
    pub fn search(mut self, text: &str) -> Self {
        self.search = (!text.is_empty()).then(|| text.to_lowercase());
        self
    }

    /// Set the time range from user-entered text. A bound that does not parse
    /// is dropped rather than reported.
    #[must_use]
    pub fn time_range_text(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start = start.and_then(parse_bound);
        self.end = end.and_then(parse_bound);
        self
    }

    #[must_use]
    pub const fn has_time_range(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Whether a single record passes every constraint.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        if self.component.as_ref().is_some_and(|c| *c != record.component) {
            return false;
        }
        if self.level.as_ref().is_some_and(|l| *l != record.level) {
            return false;
        }
        if self.file.as_ref().is_some_and(|f| *f != record.file_name) {
            return false;
        }

        if self.has_time_range() {
            let Some(ts) = record.timestamp.instant() else {
                return false;
            };
            if self.start.is_some_and(|start| ts < start) {
                return false;
            }
            if self.end.is_some_and(|end| ts > end) {
                return false;
            }
        }

        match &self.search {
            Some(term) => searchable_text(record).contains(term.as_str()),
            None => true,
        }
    }
}

/// Lower-cased message plus serialized raw document.
fn searchable_text(record: &LogRecord) -> String {
    let raw = serde_json::to_string(&record.raw).unwrap_or_default();
    let mut text = String::with_capacity(record.message.len() + raw.len() + 1);
    text.push_str(&record.message);
    text.push(' ');
    text.push_str(&raw);
    text.to_lowercase()
}

fn parse_bound(text: &str) -> Option<DateTime<Utc>> {
    let parsed = parse_timestamp(text);
    if parsed.is_none() && !text.trim().is_empty() {
        tracing::debug!("Ignoring unparseable time bound '{text}'");
    }
    parsed
}

/// Records of `source` passing `spec`, in collection order.
#[must_use]
pub fn apply<'a>(source: &'a SourceCollection, spec: &FilterSpec) -> Vec<&'a LogRecord> {
    profiling::scope!("filter::apply");
    source
        .records()
        .par_iter()
        .filter(|record| spec.matches(record))
        .collect()
}

/// Records of `source` passing every spec in `specs`, in one pass.
#[must_use]
pub fn apply_all<'a>(source: &'a SourceCollection, specs: &[FilterSpec]) -> Vec<&'a LogRecord> {
    profiling::scope!("filter::apply_all");
    source
        .records()
        .par_iter()
        .filter(|record| specs.iter().all(|spec| spec.matches(record)))
        .collect()
}

/// Narrow an already-filtered sequence further.
#[must_use]
pub fn refine<'a>(records: &[&'a LogRecord], spec: &FilterSpec) -> Vec<&'a LogRecord> {
    records
        .iter()
        .copied()
        .filter(|record| spec.matches(record))
        .collect()
}
