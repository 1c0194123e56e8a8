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

use crate::analysis::timeline::{find_gaps, sorted_instants, OUTAGE_THRESHOLD};
use crate::analysis::{AnalysisContext, AnalysisError, Analyzer};
use crate::core::source::SourceCollection;
use crate::parser::clock::format_span;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt::{self, Write};

const RULE: usize = 70;
/// More warnings than this (with no errors or gaps) is no longer healthy.
const HEALTHY_WARNING_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    IssuesDetected,
    WarningsPresent,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "HEALTHY",
            Self::IssuesDetected => "ISSUES DETECTED",
            Self::WarningsPresent => "WARNINGS PRESENT",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutiveSummary {
    pub errors: usize,
    pub warnings: usize,
    pub components: usize,
    /// Span between first and last parsed timestamp.
    pub time_range: Option<TimeDelta>,
    /// Silences longer than five minutes.
    pub outages: usize,
    pub verdict: Verdict,
}

impl ExecutiveSummary {
    #[must_use]
    pub fn of(source: &SourceCollection) -> Self {
        let stats = source.stats();
        let instants = sorted_instants(source.records());
        let time_range = instants
            .first()
            .zip(instants.last())
            .map(|(first, last)| *last - *first);
        let outages = find_gaps(&instants, OUTAGE_THRESHOLD).len();

        let verdict = if stats.error_count == 0
            && stats.warning_count < HEALTHY_WARNING_LIMIT
            && outages == 0
        {
            Verdict::Healthy
        } else if stats.error_count > 0 || outages > 0 {
            Verdict::IssuesDetected
        } else {
            Verdict::WarningsPresent
        };

        Self {
            errors: stats.error_count,
            warnings: stats.warning_count,
            components: stats.component_count,
            time_range,
            outages,
            verdict,
        }
    }
}

/// Ordered list of analyzers assembled into one report.
pub struct ReportBuilder {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl ReportBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            analyzers: Vec::new(),
        }
    }

    #[must_use]
    pub fn add_analyzer(mut self, analyzer: Box<dyn Analyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    /// Header, executive summary, then each analyzer's section.
    ///
    /// An analyzer that fails is reported inline as
    /// `Error running <name>: <reason>` and the rest still run.
    pub fn render(
        &self,
        source: &SourceCollection,
        ctx: &AnalysisContext,
        generated_at: DateTime<Utc>,
    ) -> Result<String, AnalysisError> {
        profiling::scope!("ReportBuilder::render");
        let mut out = String::new();
        let summary = ExecutiveSummary::of(source);

        writeln!(
            out,
            "{} COMPREHENSIVE ANALYSIS REPORT",
            source.id().to_uppercase()
        )?;
        writeln!(out, "{}", "=".repeat(RULE))?;
        writeln!(out, "Generated: {}", ctx.clock.render(generated_at))?;
        writeln!(out, "Files Analyzed: {}", source.loaded_files().len())?;
        writeln!(out, "Total Log Entries: {}\n", source.len())?;

        writeln!(out, "EXECUTIVE SUMMARY")?;
        writeln!(out, "{}", "-".repeat(20))?;
        if let Some(range) = summary.time_range {
            writeln!(out, "Time Range: {}", format_span(range))?;
        }
        writeln!(out, "Components Active: {}", summary.components)?;
        writeln!(out, "Errors Found: {}", summary.errors)?;
        writeln!(out, "Warnings Found: {}", summary.warnings)?;
        writeln!(
            out,
            "Potential Outages: {} gaps > 5 minutes\n",
            summary.outages
        )?;
        writeln!(out, "OVERALL STATUS: {}", summary.verdict)?;
        writeln!(out, "\n{}\n", "=".repeat(RULE))?;

        for analyzer in &self.analyzers {
            let name = analyzer.name();
            writeln!(out, "\n{}", "=".repeat(RULE))?;
            writeln!(out, "{}", name.to_uppercase())?;
            writeln!(out, "{}", "=".repeat(RULE))?;
            match analyzer.analyze(source, ctx) {
                Ok(body) => out.push_str(&body),
                Err(e) => {
                    tracing::warn!("{name} failed for source {}: {e}", source.id());
                    writeln!(out, "Error running {name}: {e}")?;
                }
            }
        }
        Ok(out)
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
