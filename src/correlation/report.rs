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

//! Plain-text rendering of comparison results.

use crate::core::source::SourceCollection;
use crate::correlation::components::compare_components;
use crate::correlation::similarity::find_similar_messages_with;
use crate::correlation::timeline::find_timeline_correlations;
use crate::correlation::{CorrelationParams, TimelineCorrelation};
use std::fmt::{self, Write};

const OVERVIEW_TIMELINE_LIMIT: usize = 5;
const OVERVIEW_SIMILARITY_LIMIT: usize = 3;
const SIMILARITY_REPORT_LIMIT: usize = 5;
const OVERVIEW_MESSAGE_CHARS: usize = 80;

fn pairs<'s, 'a>(
    sources: &'s [&'a SourceCollection],
) -> impl Iterator<Item = (&'a SourceCollection, &'a SourceCollection)> + 's {
    sources
        .iter()
        .enumerate()
        .flat_map(move |(i, left)| sources[i + 1..].iter().map(move |right| (*left, *right)))
}

fn clip(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(cut, _)| &text[..cut])
}

fn heading(out: &mut String, title: &str, rule: usize) -> fmt::Result {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(rule))?;
    writeln!(out)
}

fn subheading(out: &mut String, title: &str, rule: usize) -> fmt::Result {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "-".repeat(rule))
}

/// Every selected source's counts, then the strongest timeline and message
/// matches per pair.
pub fn render_overview(
    sources: &[&SourceCollection],
    params: &CorrelationParams,
) -> Result<String, fmt::Error> {
    profiling::scope!("render_overview");
    let mut out = String::new();
    heading(&mut out, "MULTI-SERVER COMPARISON ANALYSIS", 60)?;

    subheading(&mut out, "SERVER COMPARISON OVERVIEW", 30)?;
    for source in sources {
        let stats = source.stats();
        writeln!(
            out,
            "{}: {} logs, {} errors, {} warnings",
            source.id(),
            stats.total_logs,
            stats.error_count,
            stats.warning_count
        )?;
    }
    writeln!(out)?;

    subheading(&mut out, "TIMELINE CORRELATIONS", 20)?;
    let mut any = false;
    for (left, right) in pairs(sources) {
        let found = find_timeline_correlations(left.records(), right.records(), params.window_minutes);
        if found.is_empty() {
            continue;
        }
        any = true;
        writeln!(out, "\n{} vs {}:", left.id(), right.id())?;
        for correlation in found.iter().take(OVERVIEW_TIMELINE_LIMIT) {
            writeln!(out, "  Time: {}", params.clock.render(correlation.time_bucket))?;
            writeln!(
                out,
                "    {}: {} events ({} errors)",
                left.id(),
                correlation.left_events,
                correlation.left_errors
            )?;
            writeln!(
                out,
                "    {}: {} events ({} errors)",
                right.id(),
                correlation.right_events,
                correlation.right_errors
            )?;
            if correlation.offset_minutes != 0 {
                writeln!(out, "    Time offset: {} minutes", correlation.offset_minutes)?;
            }
        }
    }
    if !any {
        writeln!(out, "No significant timeline correlations found.")?;
    }
    writeln!(out)?;

    subheading(&mut out, "MESSAGE SIMILARITY ANALYSIS", 30)?;
    let scan = params.scan.scanner();
    let mut any = false;
    for (left, right) in pairs(sources) {
        let found = find_similar_messages_with(
            scan.as_ref(),
            left.records(),
            right.records(),
            params.similarity_threshold,
            params.window_minutes,
        );
        if found.is_empty() {
            continue;
        }
        any = true;
        writeln!(out, "\n{} vs {}:", left.id(), right.id())?;
        for correlation in found.iter().take(OVERVIEW_SIMILARITY_LIMIT) {
            writeln!(
                out,
                "  Similarity: {:.2} | Time diff: {:.1} min",
                correlation.similarity, correlation.time_diff_minutes
            )?;
            writeln!(
                out,
                "    {}: {}...",
                left.id(),
                clip(&correlation.left.message, OVERVIEW_MESSAGE_CHARS)
            )?;
            writeln!(
                out,
                "    {}: {}...\n",
                right.id(),
                clip(&correlation.right.message, OVERVIEW_MESSAGE_CHARS)
            )?;
        }
    }
    if !any {
        writeln!(out, "No similar messages found above threshold.")?;
    }
    Ok(out)
}

fn timeline_entry(
    out: &mut String,
    index: usize,
    correlation: &TimelineCorrelation,
    left: &str,
    right: &str,
    params: &CorrelationParams,
) -> fmt::Result {
    writeln!(
        out,
        "{index}. Time Period: {}",
        params.clock.render(correlation.time_bucket)
    )?;
    writeln!(
        out,
        "   {left} Activity: {} events, {} errors",
        correlation.left_events, correlation.left_errors
    )?;
    writeln!(
        out,
        "   {right} Activity: {} events, {} errors",
        correlation.right_events, correlation.right_errors
    )?;
    if correlation.offset_minutes != 0 {
        writeln!(out, "   Time Offset: {} minutes", correlation.offset_minutes)?;
    }
    writeln!(out, "   Both servers had errors in this time period")?;
    writeln!(out)
}

/// Every timeline correlation for every pair, numbered.
pub fn render_timeline(
    sources: &[&SourceCollection],
    params: &CorrelationParams,
) -> Result<String, fmt::Error> {
    profiling::scope!("render_timeline");
    let mut out = String::new();
    heading(&mut out, "TIMELINE CORRELATION ANALYSIS", 40)?;

    let mut total = 0;
    for (left, right) in pairs(sources) {
        let found = find_timeline_correlations(left.records(), right.records(), params.window_minutes);
        if found.is_empty() {
            writeln!(out, "{} vs {}: No timeline correlations found.\n", left.id(), right.id())?;
            continue;
        }
        total += found.len();
        writeln!(
            out,
            "{} vs {} - Found {} correlations:\n",
            left.id(),
            right.id(),
            found.len()
        )?;
        for (index, correlation) in found.iter().enumerate() {
            timeline_entry(&mut out, index + 1, correlation, left.id(), right.id(), params)?;
        }
    }
    if total == 0 {
        writeln!(out, "No timeline correlations found between any selected servers.")?;
    }
    Ok(out)
}

/// The best message matches per pair, with full text.
pub fn render_similarity(
    sources: &[&SourceCollection],
    params: &CorrelationParams,
) -> Result<String, fmt::Error> {
    profiling::scope!("render_similarity");
    let mut out = String::new();
    heading(&mut out, "MESSAGE SIMILARITY ANALYSIS", 35)?;

    let scan = params.scan.scanner();
    let mut total = 0;
    for (left, right) in pairs(sources) {
        let found = find_similar_messages_with(
            scan.as_ref(),
            left.records(),
            right.records(),
            params.similarity_threshold,
            params.window_minutes,
        );
        if found.is_empty() {
            writeln!(
                out,
                "{} vs {}: No similar messages above threshold {}.\n",
                left.id(),
                right.id(),
                params.similarity_threshold
            )?;
            continue;
        }
        total += found.len();
        writeln!(
            out,
            "{} vs {} - Found {} similar message pairs:\n",
            left.id(),
            right.id(),
            found.len()
        )?;
        for (index, correlation) in found.iter().take(SIMILARITY_REPORT_LIMIT).enumerate() {
            writeln!(
                out,
                "{}. Similarity: {:.3} | Time diff: {:.1} min",
                index + 1,
                correlation.similarity,
                correlation.time_diff_minutes
            )?;
            for (id, record) in [(left.id(), correlation.left), (right.id(), correlation.right)] {
                writeln!(
                    out,
                    "   {id} [{}] {}",
                    record.component, record.display_timestamp
                )?;
                writeln!(out, "   {}", record.message)?;
            }
            writeln!(out, "{}\n", "-".repeat(60))?;
        }
    }
    if total == 0 {
        writeln!(out, "No similar messages found across selected servers.")?;
        writeln!(
            out,
            "Try lowering the similarity threshold or increasing the time window."
        )?;
    }
    Ok(out)
}

/// Per-component counts on each source with discrepancy flags.
pub fn render_components(sources: &[&SourceCollection]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    heading(&mut out, "COMPONENT COMPARISON ANALYSIS", 40)?;

    for comparison in compare_components(sources) {
        writeln!(out, "Component: {}", comparison.component)?;
        for activity in &comparison.activity {
            writeln!(
                out,
                "  {}: {} logs, {} errors, {} warnings",
                activity.source_id, activity.logs, activity.errors, activity.warnings
            )?;
        }
        if comparison.uneven_activity {
            writeln!(out, "  [!] Significant activity difference between servers")?;
        }
        if comparison.uneven_errors {
            writeln!(out, "  [!] Significant error count difference between servers")?;
        }
        if let Some(only) = &comparison.only_active_on {
            writeln!(out, "  [!] Component only active on {only}")?;
        }
        writeln!(out)?;
    }
    Ok(out)
}
