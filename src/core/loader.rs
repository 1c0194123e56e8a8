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

use crate::core::source::SourceError;
use crate::parser::clock::DisplayClock;
use crate::parser::{ingest_lines, FileBatch};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Duplicate(#[from] SourceError),
}

/// Name a loaded file is tracked under: its final path component.
#[must_use]
pub fn file_name_of(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Name `path` will be tracked under, or [`LoadError::Duplicate`] when
/// `is_loaded` already knows that name for `source_id`. No I/O happens.
pub fn check_new_file(
    source_id: &str,
    path: &Path,
    is_loaded: impl Fn(&str) -> bool,
) -> Result<String, LoadError> {
    let file_name = file_name_of(path);
    if is_loaded(&file_name) {
        tracing::warn!("File '{file_name}' is already loaded to source {source_id}");
        return Err(LoadError::Duplicate(SourceError::DuplicateFile {
            source_id: source_id.to_string(),
            file_name,
        }));
    }
    Ok(file_name)
}

/// Read one newline-delimited JSON file and normalize it for `source_id`.
///
/// Invalid UTF-8 is replaced rather than rejected so a single corrupt byte
/// does not lose the whole file.
pub fn load_file(
    path: &Path,
    source_id: &str,
    clock: DisplayClock,
) -> Result<FileBatch, LoadError> {
    profiling::scope!("load_file");
    let start_time = Instant::now();
    tracing::debug!("Loading {} into source {source_id}", path.display());

    let read_start = Instant::now();
    let buffer = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        "File I/O took {:?} to read {} bytes",
        read_start.elapsed(),
        buffer.len()
    );

    let content = String::from_utf8_lossy(&buffer);
    let file_name = file_name_of(path);

    let parse_start = Instant::now();
    let batch = ingest_lines(source_id, &file_name, content.lines(), clock);
    tracing::info!(
        "Loaded {} records from {file_name} into source {source_id} (parse {:?}, total {:?})",
        batch.records.len(),
        parse_start.elapsed(),
        start_time.elapsed()
    );
    Ok(batch)
}
