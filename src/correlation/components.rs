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

use crate::core::source::SourceCollection;
use crate::parser::record::Severity;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Log-count spread across sources above which activity is called out.
pub const ACTIVITY_SPREAD: usize = 5;
/// Error-count spread across sources above which errors are called out.
pub const ERROR_SPREAD: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentActivity {
    pub source_id: String,
    pub logs: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// How one component behaves on each compared source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentComparison {
    pub component: String,
    /// One entry per source, in the order the sources were given.
    pub activity: Vec<ComponentActivity>,
    pub uneven_activity: bool,
    pub uneven_errors: bool,
    /// Set when exactly one of several sources logged this component.
    pub only_active_on: Option<String>,
}

fn spread(values: impl Iterator<Item = usize> + Clone) -> usize {
    let max = values.clone().max().unwrap_or(0);
    let min = values.min().unwrap_or(0);
    max - min
}

/// Compare every component seen on any of `sources`, sorted by name.
#[must_use]
pub fn compare_components(sources: &[&SourceCollection]) -> Vec<ComponentComparison> {
    profiling::scope!("compare_components");
    let components: BTreeSet<&String> = sources
        .iter()
        .flat_map(|source| source.components_seen())
        .collect();

    let per_source: Vec<HashMap<&str, ComponentActivity>> = sources
        .iter()
        .map(|source| {
            let mut counts: HashMap<&str, ComponentActivity> = HashMap::new();
            for record in source.records() {
                let entry = counts.entry(record.component.as_str()).or_default();
                entry.logs += 1;
                match record.severity() {
                    Severity::Error => entry.errors += 1,
                    Severity::Warning => entry.warnings += 1,
                    Severity::Info | Severity::Other => {}
                }
            }
            counts
        })
        .collect();

    components
        .into_iter()
        .map(|component| {
            let activity: Vec<ComponentActivity> = sources
                .iter()
                .zip(&per_source)
                .map(|(source, counts)| ComponentActivity {
                    source_id: source.id().to_string(),
                    ..counts.get(component.as_str()).cloned().unwrap_or_default()
                })
                .collect();

            let mut active = activity.iter().filter(|a| a.logs > 0);
            let only_active_on = match (active.next(), active.next()) {
                (Some(only), None) if sources.len() > 1 => Some(only.source_id.clone()),
                _ => None,
            };

            ComponentComparison {
                component: component.clone(),
                uneven_activity: spread(activity.iter().map(|a| a.logs)) > ACTIVITY_SPREAD,
                uneven_errors: spread(activity.iter().map(|a| a.errors)) > ERROR_SPREAD,
                only_active_on,
                activity,
            }
        })
        .collect()
}
