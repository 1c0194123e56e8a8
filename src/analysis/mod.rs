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

pub mod components;
pub mod errors;
pub mod health;
pub mod report;
pub mod timeline;

use crate::core::source::SourceCollection;
use crate::parser::clock::DisplayClock;
use components::ComponentAnalyzer;
use errors::ErrorAnalyzer;
use health::{HealthAnalyzer, HealthThresholds};
use report::ReportBuilder;
use std::fmt::Write;
use timeline::TimelineAnalyzer;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("source '{0}' has no records to analyze")]
    EmptySource(String),

    #[error("failed to render analysis text")]
    Render(#[from] std::fmt::Error),
}

/// Settings shared by every analyzer in one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisContext {
    pub clock: DisplayClock,
    pub thresholds: HealthThresholds,
}

/// A read-only, single-source report section.
pub trait Analyzer: Send + Sync {
    /// Section title, e.g. `Timeline Analysis`.
    fn name(&self) -> &'static str;

    /// Render this analyzer's body text for `source`.
    fn analyze(
        &self,
        source: &SourceCollection,
        ctx: &AnalysisContext,
    ) -> Result<String, AnalysisError>;
}

/// Fail fast on an empty source; every analyzer starts with this.
pub(crate) fn require_records(source: &SourceCollection) -> Result<(), AnalysisError> {
    if source.is_empty() {
        return Err(AnalysisError::EmptySource(source.id().to_string()));
    }
    Ok(())
}

/// Run one analyzer on its own, titled `<SOURCE> <NAME>`.
pub fn run_standalone(
    analyzer: &dyn Analyzer,
    source: &SourceCollection,
    ctx: &AnalysisContext,
) -> Result<String, AnalysisError> {
    profiling::scope!("run_standalone");
    let body = analyzer.analyze(source, ctx)?;
    let mut out = String::with_capacity(body.len() + 128);
    writeln!(
        out,
        "{} {}",
        source.id().to_uppercase(),
        analyzer.name().to_uppercase()
    )?;
    writeln!(out, "{}\n", "=".repeat(50))?;
    out.push_str(&body);
    Ok(out)
}

/// The four standard sections in report order.
#[must_use]
pub fn create_default_report() -> ReportBuilder {
    ReportBuilder::new()
        .add_analyzer(Box::new(TimelineAnalyzer))
        .add_analyzer(Box::new(ErrorAnalyzer))
        .add_analyzer(Box::new(HealthAnalyzer))
        .add_analyzer(Box::new(ComponentAnalyzer))
}
