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

//! Registry of loaded sources.
//!
//! Every [`SourceCollection`] sits behind its own `RwLock`: a load or append
//! takes the write half, analysis and correlation take the read half, and two
//! different sources never contend with each other.

use crate::core::source::{SourceCollection, SourceError, SourceId};
use crate::parser::clock::DisplayClock;
use crate::parser::FileBatch;
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type SharedSource = Arc<RwLock<SourceCollection>>;

#[derive(Debug, Default)]
pub struct Fleet {
    sources: IndexMap<SourceId, SharedSource>,
    clock: DisplayClock,
}

/// Read access that survives a writer that panicked mid-update.
pub fn read_source(source: &SharedSource) -> RwLockReadGuard<'_, SourceCollection> {
    source.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write_source(source: &SharedSource) -> RwLockWriteGuard<'_, SourceCollection> {
    source.write().unwrap_or_else(PoisonError::into_inner)
}

impl Fleet {
    #[must_use]
    pub fn new(clock: DisplayClock) -> Self {
        Self {
            sources: IndexMap::new(),
            clock,
        }
    }

    pub fn register(&mut self, id: impl Into<SourceId>) -> Result<SharedSource, SourceError> {
        let id = id.into();
        if self.sources.contains_key(&id) {
            return Err(SourceError::DuplicateSource(id));
        }
        let source = Arc::new(RwLock::new(SourceCollection::new(id.clone())));
        tracing::debug!("Registered source {id}");
        self.sources.insert(id, Arc::clone(&source));
        Ok(source)
    }

    /// Remove a source. Outstanding handles stay valid until dropped.
    pub fn deregister(&mut self, id: &str) -> Result<SharedSource, SourceError> {
        self.sources
            .shift_remove(id)
            .ok_or_else(|| SourceError::UnknownSource(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Result<SharedSource, SourceError> {
        self.sources
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::UnknownSource(id.to_string()))
    }

    /// Source ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<SourceId> {
        self.sources.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Every unordered pair of `selected`, in selection order:
    /// `[A, B, C]` gives `(A, B), (A, C), (B, C)`.
    pub fn pairs(
        &self,
        selected: &[SourceId],
    ) -> Result<Vec<(SharedSource, SharedSource)>, SourceError> {
        let handles = selected
            .iter()
            .map(|id| self.get(id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut pairs = Vec::new();
        for (i, left) in handles.iter().enumerate() {
            for right in &handles[i + 1..] {
                pairs.push((Arc::clone(left), Arc::clone(right)));
            }
        }
        Ok(pairs)
    }

    #[must_use]
    pub const fn display_clock(&self) -> DisplayClock {
        self.clock
    }

    /// Switch display zone and re-render every loaded record.
    pub fn set_display_clock(&mut self, clock: DisplayClock) {
        profiling::scope!("Fleet::set_display_clock");
        if clock == self.clock {
            return;
        }
        tracing::info!("Display timezone changed to {clock}");
        self.clock = clock;
        for source in self.sources.values() {
            write_source(source).retime(clock);
        }
    }

    /// First unused spreadsheet-style label: A..Z, AA, AB, ...
    #[must_use]
    pub fn next_label(&self) -> SourceId {
        (0..)
            .map(spreadsheet_label)
            .find(|label| !self.sources.contains_key(label))
            .unwrap_or_default()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Replace a source's contents with the given files.
    pub fn load_files(
        &self,
        id: &str,
        batches: impl IntoIterator<Item = FileBatch>,
    ) -> Result<(), SourceError> {
        let source = self.get(id)?;
        write_source(&source).load(batches);
        Ok(())
    }

    /// Append one more file to a source.
    pub fn add_file(&self, id: &str, batch: FileBatch) -> Result<usize, SourceError> {
        let source = self.get(id)?;
        let added = write_source(&source).append(batch)?;
        Ok(added)
    }

    pub fn clear(&self, id: &str) -> Result<(), SourceError> {
        let source = self.get(id)?;
        write_source(&source).clear();
        Ok(())
    }

    /// One-line summary, e.g. `A: 120 logs (2 files) | B: 80 logs (1 files)`.
    #[must_use]
    pub fn status_line(&self) -> String {
        let mut loaded = 0;
        let parts: Vec<String> = self
            .sources
            .iter()
            .map(|(id, source)| {
                let source = read_source(source);
                if !source.is_empty() {
                    loaded += 1;
                }
                format!(
                    "{id}: {} logs ({} files)",
                    source.len(),
                    source.loaded_files().len()
                )
            })
            .collect();

        let mut line = parts.join(" | ");
        if loaded >= 2 {
            line.push_str(" | Ready for comparison");
        } else if line.is_empty() {
            line.push_str("No sources loaded");
        }
        line
    }
}

/// 0 -> A, 25 -> Z, 26 -> AA, 27 -> AB, ...
fn spreadsheet_label(mut index: usize) -> String {
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}
