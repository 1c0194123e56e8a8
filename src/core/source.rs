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

//! Per-source record storage.
//!
//! A [`SourceCollection`] owns the normalized records of one server together
//! with the indexes the filter choices are built from. It has no internal
//! locking: callers must not read it while a `load`/`append` is running
//! (the [`Fleet`](crate::core::fleet::Fleet) registry enforces that with one
//! `RwLock` per collection).

use crate::parser::clock::DisplayClock;
use crate::parser::record::{LogRecord, Severity};
use crate::parser::FileBatch;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

/// Opaque, caller-assigned source identity.
pub type SourceId = String;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("file '{file_name}' is already loaded into source '{source_id}'")]
    DuplicateFile { source_id: SourceId, file_name: String },

    #[error("no source registered as '{0}'")]
    UnknownSource(SourceId),

    #[error("a source named '{0}' is already registered")]
    DuplicateSource(SourceId),
}

/// Summary counters shown in status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub total_logs: usize,
    pub component_count: usize,
    pub file_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SourceCollection {
    id: SourceId,
    /// Sorted ascending by timestamp; unparsed records first.
    records: Vec<LogRecord>,
    components_seen: BTreeSet<String>,
    levels_seen: BTreeSet<String>,
    loaded_files: BTreeSet<String>,
    failed_lines: usize,
}

impl SourceCollection {
    pub fn new(id: impl Into<SourceId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    #[must_use]
    pub const fn components_seen(&self) -> &BTreeSet<String> {
        &self.components_seen
    }

    #[must_use]
    pub const fn levels_seen(&self) -> &BTreeSet<String> {
        &self.levels_seen
    }

    #[must_use]
    pub const fn loaded_files(&self) -> &BTreeSet<String> {
        &self.loaded_files
    }

    /// Lines rejected by ingestion across every loaded file.
    #[must_use]
    pub const fn failed_lines(&self) -> usize {
        self.failed_lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains_file(&self, file_name: &str) -> bool {
        self.loaded_files.contains(file_name)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Replace everything with the given file batches. A batch whose file
    /// name was already taken by an earlier batch is dropped.
    pub fn load(&mut self, batches: impl IntoIterator<Item = FileBatch>) {
        profiling::scope!("SourceCollection::load");
        self.clear();
        for batch in batches {
            if self.contains_file(&batch.file_name) {
                tracing::warn!(
                    "Skipping repeated file '{}' for source {}",
                    batch.file_name,
                    self.id
                );
                continue;
            }
            self.ingest(batch);
        }
        self.sort_records();
        tracing::debug!(
            "Source {}: loaded {} records from {} files",
            self.id,
            self.records.len(),
            self.loaded_files.len()
        );
    }

    /// Add one more file. Rejected, leaving the collection untouched, when a
    /// file with the same name is already loaded.
    pub fn append(&mut self, batch: FileBatch) -> Result<usize, SourceError> {
        profiling::scope!("SourceCollection::append");
        if self.contains_file(&batch.file_name) {
            tracing::warn!(
                "File '{}' is already loaded to source {}",
                batch.file_name,
                self.id
            );
            return Err(SourceError::DuplicateFile {
                source_id: self.id.clone(),
                file_name: batch.file_name,
            });
        }
        let added = batch.records.len();
        self.ingest(batch);
        self.sort_records();
        Ok(added)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.components_seen.clear();
        self.levels_seen.clear();
        self.loaded_files.clear();
        self.failed_lines = 0;
    }

    /// Re-derive every record's display timestamp for a new zone.
    pub fn retime(&mut self, clock: DisplayClock) {
        profiling::scope!("SourceCollection::retime");
        self.records
            .par_iter_mut()
            .for_each(|record| record.retime(clock));
    }

    fn ingest(&mut self, batch: FileBatch) {
        self.loaded_files.insert(batch.file_name);
        self.failed_lines += batch.failed_lines;
        for record in &batch.records {
            if !self.components_seen.contains(&record.component) {
                self.components_seen.insert(record.component.clone());
            }
            if !self.levels_seen.contains(&record.level) {
                self.levels_seen.insert(record.level.clone());
            }
        }
        self.records.extend(batch.records);
    }

    fn sort_records(&mut self) {
        profiling::scope!("sort_records");
        // Stable, so records sharing a timestamp keep their load order.
        self.records.par_sort_by_key(|record| record.timestamp);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn stats(&self) -> SourceStats {
        let (error_count, warning_count) =
            self.records
                .iter()
                .fold((0, 0), |(errors, warnings), record| match record.severity() {
                    Severity::Error => (errors + 1, warnings),
                    Severity::Warning => (errors, warnings + 1),
                    Severity::Info | Severity::Other => (errors, warnings),
                });

        SourceStats {
            total_logs: self.records.len(),
            component_count: self.components_seen.len(),
            file_count: self.loaded_files.len(),
            error_count,
            warning_count,
        }
    }
}
