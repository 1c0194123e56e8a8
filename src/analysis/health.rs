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

//! Operational health from embedded monitoring metrics.
//!
//! Agents periodically log a `monitoring.metrics` payload. [`extract_metrics`]
//! is the only place that looks inside it; everything else works on the
//! typed [`HealthSample`].

use crate::analysis::{require_records, AnalysisContext, AnalysisError, Analyzer};
use crate::core::source::SourceCollection;
use crate::parser::record::LogRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Write};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Readings taken from one record. Absent or non-positive readings are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthSample {
    pub memory_mb: Option<f64>,
    pub load_1m: Option<f64>,
    pub workers: Option<f64>,
    pub cpu_ticks: Option<f64>,
    pub events_acked: Option<f64>,
    pub event_error_rate: Option<f64>,
}

impl HealthSample {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.memory_mb.is_none()
            && self.load_1m.is_none()
            && self.workers.is_none()
            && self.cpu_ticks.is_none()
            && self.events_acked.is_none()
            && self.event_error_rate.is_none()
    }

    #[must_use]
    pub const fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::MemoryMb => self.memory_mb,
            Metric::Load1m => self.load_1m,
            Metric::Workers => self.workers,
            Metric::CpuTicks => self.cpu_ticks,
            Metric::EventsAcked => self.events_acked,
            Metric::EventErrorRate => self.event_error_rate,
        }
    }
}

fn path<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(root, |value, key| value.get(key))
}

fn positive(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| *v > 0.0)
}

/// Pull the known metrics out of a raw log document.
#[must_use]
pub fn extract_metrics(raw: &Value) -> HealthSample {
    let Some(metrics) = path(raw, &["monitoring", "metrics"]) else {
        return HealthSample::default();
    };

    let (events_acked, event_error_rate) =
        match path(metrics, &["libbeat", "output", "events"]) {
            Some(events) => {
                let acked = events.get("acked").and_then(Value::as_f64).unwrap_or(0.0);
                match positive(events.get("total")) {
                    Some(total) => (
                        Some(acked),
                        Some(((total - acked) / total * 100.0).max(0.0)),
                    ),
                    None => (None, None),
                }
            }
            None => (None, None),
        };

    HealthSample {
        memory_mb: positive(path(metrics, &["beat", "memstats", "memory_alloc"]))
            .map(|bytes| bytes / BYTES_PER_MB),
        load_1m: positive(path(metrics, &["system", "load", "1"])),
        workers: positive(path(metrics, &["beat", "runtime", "goroutines"])),
        cpu_ticks: positive(path(metrics, &["beat", "cpu", "total", "value"])),
        events_acked,
        event_error_rate,
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; needs two or more values.
    pub stdev: Option<f64>,
}

impl MetricSummary {
    #[must_use]
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let stdev = (count >= 2).then(|| {
            let variance =
                sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        });

        Some(Self {
            count,
            mean,
            median,
            min: sorted[0],
            max: sorted[count - 1],
            stdev,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MemoryMb,
    Load1m,
    Workers,
    CpuTicks,
    EventsAcked,
    EventErrorRate,
}

impl Metric {
    pub const ALL: [Self; 6] = [
        Self::MemoryMb,
        Self::Load1m,
        Self::Workers,
        Self::CpuTicks,
        Self::EventsAcked,
        Self::EventErrorRate,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MemoryMb => "Memory Usage",
            Self::Load1m => "System Load (1m)",
            Self::Workers => "Workers",
            Self::CpuTicks => "CPU Ticks",
            Self::EventsAcked => "Events Processed",
            Self::EventErrorRate => "Event Error Rate",
        }
    }

    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::MemoryMb => " MB",
            Self::EventErrorRate => " %",
            Self::Load1m | Self::Workers | Self::CpuTicks | Self::EventsAcked => "",
        }
    }
}

/// Mean values at or above these are flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub memory_mb: f64,
    pub load_1m: f64,
    pub workers: f64,
    pub event_error_rate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            memory_mb: 500.0,
            load_1m: 2.0,
            workers: 200.0,
            event_error_rate: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthIssue {
    HighMemory,
    HighLoad,
    HighEventErrorRate,
    HighWorkerCount,
}

impl HealthIssue {
    const ALL: [Self; 4] = [
        Self::HighMemory,
        Self::HighLoad,
        Self::HighEventErrorRate,
        Self::HighWorkerCount,
    ];

    #[must_use]
    pub const fn metric(self) -> Metric {
        match self {
            Self::HighMemory => Metric::MemoryMb,
            Self::HighLoad => Metric::Load1m,
            Self::HighEventErrorRate => Metric::EventErrorRate,
            Self::HighWorkerCount => Metric::Workers,
        }
    }

    const fn limit(self, thresholds: &HealthThresholds) -> f64 {
        match self {
            Self::HighMemory => thresholds.memory_mb,
            Self::HighLoad => thresholds.load_1m,
            Self::HighEventErrorRate => thresholds.event_error_rate,
            Self::HighWorkerCount => thresholds.workers,
        }
    }
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HighMemory => "High memory usage",
            Self::HighLoad => "High system load",
            Self::HighEventErrorRate => "High event error rate",
            Self::HighWorkerCount => "High worker count",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub metrics: Vec<(Metric, Option<MetricSummary>)>,
    pub issues: Vec<HealthIssue>,
}

impl HealthReport {
    #[must_use]
    pub fn summary(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics
            .iter()
            .find(|(m, _)| *m == metric)
            .and_then(|(_, summary)| summary.as_ref())
    }

    fn issue_for(&self, metric: Metric) -> Option<HealthIssue> {
        self.issues
            .iter()
            .copied()
            .find(|issue| issue.metric() == metric)
    }
}

#[must_use]
pub fn assess_health(records: &[LogRecord], thresholds: &HealthThresholds) -> HealthReport {
    profiling::scope!("assess_health");
    let samples: Vec<HealthSample> = records
        .iter()
        .map(|record| extract_metrics(&record.raw))
        .filter(|sample| !sample.is_empty())
        .collect();

    let metrics: Vec<(Metric, Option<MetricSummary>)> = Metric::ALL
        .into_iter()
        .map(|metric| {
            let values: Vec<f64> = samples.iter().filter_map(|s| s.get(metric)).collect();
            (metric, MetricSummary::of(&values))
        })
        .collect();

    let mut report = HealthReport {
        metrics,
        issues: Vec::new(),
    };
    report.issues = HealthIssue::ALL
        .into_iter()
        .filter(|issue| {
            report
                .summary(issue.metric())
                .is_some_and(|s| s.mean >= issue.limit(thresholds))
        })
        .collect();
    report
}

pub struct HealthAnalyzer;

impl Analyzer for HealthAnalyzer {
    fn name(&self) -> &'static str {
        "Health Analysis"
    }

    fn analyze(
        &self,
        source: &SourceCollection,
        ctx: &AnalysisContext,
    ) -> Result<String, AnalysisError> {
        require_records(source)?;
        let report = assess_health(source.records(), &ctx.thresholds);
        let mut out = String::new();

        for (metric, summary) in &report.metrics {
            let (name, unit) = (metric.label(), metric.unit());
            match summary {
                None => writeln!(out, "{name}: No data available")?,
                Some(s) => {
                    if let Some(stdev) = s.stdev {
                        writeln!(out, "{name}:")?;
                        writeln!(out, "  Average: {:.2}{unit}", s.mean)?;
                        writeln!(out, "  Median:  {:.2}{unit}", s.median)?;
                        writeln!(out, "  Min/Max: {:.2} - {:.2}{unit}", s.min, s.max)?;
                        writeln!(out, "  Std Dev: {stdev:.2}{unit}")?;
                    } else {
                        writeln!(out, "{name}: {:.2}{unit}", s.mean)?;
                    }
                    if let Some(issue) = report.issue_for(*metric) {
                        writeln!(out, "  [!] {issue} detected")?;
                    }
                    writeln!(out)?;
                }
            }
        }

        writeln!(out, "Health Assessment:")?;
        if report.issues.is_empty() {
            writeln!(out, "  [ok] No significant issues detected")?;
        } else {
            let issues: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
            writeln!(out, "  [!] Issues detected: {}", issues.join(", "))?;
        }
        Ok(out)
    }
}
