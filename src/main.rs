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

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fleetcrab::analysis::components::ComponentAnalyzer;
use fleetcrab::analysis::errors::ErrorAnalyzer;
use fleetcrab::analysis::health::HealthAnalyzer;
use fleetcrab::analysis::timeline::TimelineAnalyzer;
use fleetcrab::analysis::{create_default_report, run_standalone, Analyzer};
use fleetcrab::core::filter::apply;
use fleetcrab::core::fleet::{read_source, SharedSource};
use fleetcrab::core::loader::check_new_file;
use fleetcrab::core::{load_file, Fleet, FilterSpec, LoadError, SourceCollection, SourceError};
use fleetcrab::correlation::report::{
    render_components, render_overview, render_similarity, render_timeline,
};
use fleetcrab::details::{describe_metrics, describe_record};
use fleetcrab::export::{analysis_to_text, records_to_json, records_to_text, ExportFormat};
use fleetcrab::parser::FileBatch;
use fleetcrab::EngineConfig;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "ram-profiling")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[derive(Parser, Debug)]
#[command(name = "fleetcrab")]
#[command(version)]
#[command(about = "Correlate Elastic Agent logs across servers", long_about = None)]
struct Cli {
    /// Config file to use instead of the per-user one
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Display timezone, e.g. `UTC`, `EST` or `Pacific (PDT)`
    #[arg(long, global = true, value_name = "TZ")]
    timezone: Option<String>,

    /// Log file for a named source; repeat to add files or sources
    #[arg(long = "source", global = true, value_name = "NAME=PATH", value_parser = parse_source)]
    sources: Vec<(String, PathBuf)>,

    /// Path for the DHAT heap profiling output (only used when built with --features ram-profiling)
    #[cfg(feature = "ram-profiling")]
    #[arg(long = "profile-output", value_name = "PROFILE_FILE", default_value = "dhat-heap.json")]
    profile_output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-source record counts
    Stats,
    /// Print or export the records of one source that match every criterion
    Filter(FilterArgs),
    /// Run a single-source analysis
    Analyze {
        #[arg(value_enum)]
        kind: AnalysisKind,
        /// Source to analyze; defaults to the first one given
        #[arg(long = "on", value_name = "NAME")]
        target: Option<String>,
        /// Write the analysis with an export header instead of printing it
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Correlate two or more sources
    Compare {
        #[arg(value_enum)]
        kind: CompareKind,
        /// Correlation window in minutes
        #[arg(long)]
        window: Option<f64>,
        /// Minimum message similarity in [0, 1]
        #[arg(long)]
        threshold: Option<f64>,
        /// Sources to compare; defaults to all of them
        #[arg(long = "select", value_name = "NAME")]
        selected: Vec<String>,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Source to filter; defaults to the first one given
    #[arg(long = "on", value_name = "NAME")]
    target: Option<String>,
    #[arg(long)]
    component: Option<String>,
    #[arg(long)]
    level: Option<String>,
    #[arg(long)]
    file: Option<String>,
    #[arg(long)]
    search: Option<String>,
    /// Inclusive lower bound, ISO-8601
    #[arg(long)]
    start: Option<String>,
    /// Inclusive upper bound, ISO-8601
    #[arg(long)]
    end: Option<String>,
    /// Print the full detail view of each match instead of a listing
    #[arg(long, conflicts_with_all = ["format", "output"])]
    details: bool,
    /// Defaults to the output file's extension, or text
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Write to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to the config file
    Init,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AnalysisKind {
    Timeline,
    Errors,
    Health,
    Components,
    Report,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CompareKind {
    Overview,
    Timeline,
    Similarity,
    Components,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Json,
    Text,
}

fn parse_source(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        Some(_) | None => Err(format!("expected NAME=PATH, got '{arg}'")),
    }
}

fn main() -> Result<()> {
    // RUST_LOG overrides, e.g. RUST_LOG=debug; stdout stays for report text
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    #[cfg(feature = "ram-profiling")]
    let _profiler = {
        tracing::info!("RAM profiling enabled, output: {:?}", cli.profile_output);
        dhat::Profiler::builder()
            .file_name(cli.profile_output.clone())
            .build()
    };

    #[cfg(feature = "cpu-profiling")]
    {
        tracing::info!("CPU profiling enabled with Tracy - run Tracy profiler to connect");
        tracy_client::Client::start();
    }

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load(),
    };
    if let Some(tz) = &cli.timezone {
        config.set_timezone(tz)?;
    }

    match cli.command {
        Command::Config { action } => run_config(&config, &action),
        Command::Stats => {
            let fleet = load_fleet(&cli.sources, &config)?;
            println!("{}", fleet.status_line());
            for id in fleet.ids() {
                let source = fleet.get(&id)?;
                let source = read_source(&source);
                let stats = source.stats();
                println!(
                    "{id}: {} logs, {} errors, {} warnings, {} components, {} files, {} unparseable lines",
                    stats.total_logs,
                    stats.error_count,
                    stats.warning_count,
                    stats.component_count,
                    stats.file_count,
                    source.failed_lines()
                );
            }
            Ok(())
        }
        Command::Filter(args) => {
            let fleet = load_fleet(&cli.sources, &config)?;
            run_filter(&fleet, &args)
        }
        Command::Analyze {
            kind,
            target,
            output,
        } => {
            let fleet = load_fleet(&cli.sources, &config)?;
            let handle = target_source(&fleet, target.as_deref())?;
            let source = read_source(&handle);
            let ctx = config.analysis_context();
            let text = match kind {
                AnalysisKind::Report => create_default_report().render(&source, &ctx, Utc::now())?,
                AnalysisKind::Timeline => analyze_one(&TimelineAnalyzer, &source, &config)?,
                AnalysisKind::Errors => analyze_one(&ErrorAnalyzer, &source, &config)?,
                AnalysisKind::Health => analyze_one(&HealthAnalyzer, &source, &config)?,
                AnalysisKind::Components => analyze_one(&ComponentAnalyzer, &source, &config)?,
            };
            match output {
                Some(path) => {
                    let wrapped = analysis_to_text(source.id(), &text, Utc::now(), config.timezone)?;
                    std::fs::write(&path, wrapped)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("Analysis exported to {}", path.display());
                }
                None => print!("{text}"),
            }
            Ok(())
        }
        Command::Compare {
            kind,
            window,
            threshold,
            selected,
        } => {
            if let Some(window) = window {
                config.window_minutes = window;
            }
            if let Some(threshold) = threshold {
                config.similarity_threshold = threshold;
            }
            config.validate()?;

            let fleet = load_fleet(&cli.sources, &config)?;
            let selected = if selected.is_empty() { fleet.ids() } else { selected };
            if selected.len() < 2 {
                bail!("Select at least 2 sources to compare");
            }
            let handles = selected
                .iter()
                .map(|id| fleet.get(id))
                .collect::<Result<Vec<SharedSource>, SourceError>>()?;
            let guards: Vec<_> = handles.iter().map(read_source).collect();
            let sources: Vec<&SourceCollection> = guards.iter().map(|guard| &**guard).collect();

            let params = config.correlation_params();
            let text = match kind {
                CompareKind::Overview => render_overview(&sources, &params)?,
                CompareKind::Timeline => render_timeline(&sources, &params)?,
                CompareKind::Similarity => render_similarity(&sources, &params)?,
                CompareKind::Components => render_components(&sources)?,
            };
            print!("{text}");
            Ok(())
        }
    }
}

fn analyze_one(
    analyzer: &dyn Analyzer,
    source: &SourceCollection,
    config: &EngineConfig,
) -> Result<String> {
    let text = run_standalone(analyzer, source, &config.analysis_context())?;
    Ok(text)
}

fn run_config(config: &EngineConfig, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            if let Some(path) = EngineConfig::config_path() {
                eprintln!("# {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Init => {
            let path = config.save().context("Failed to save config")?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn run_filter(fleet: &Fleet, args: &FilterArgs) -> Result<()> {
    let handle = target_source(fleet, args.target.as_deref())?;
    let source = read_source(&handle);

    let mut spec = FilterSpec::new().time_range_text(args.start.as_deref(), args.end.as_deref());
    if let Some(component) = &args.component {
        spec = spec.component(component.as_str());
    }
    if let Some(level) = &args.level {
        spec = spec.level(level.as_str());
    }
    if let Some(file) = &args.file {
        spec = spec.file(file.as_str());
    }
    if let Some(search) = &args.search {
        spec = spec.search(search);
    }

    let records = apply(&source, &spec);
    tracing::info!("Filter matched {} of {} records", records.len(), source.len());

    if args.details {
        for record in &records {
            println!("{}", describe_record(record)?);
            println!("{}\n", describe_metrics(&record.raw)?);
        }
        return Ok(());
    }

    let format = match (args.format, &args.output) {
        (Some(OutputFormat::Json), _) => ExportFormat::Json,
        (Some(OutputFormat::Text), _) | (None, None) => ExportFormat::Text,
        (None, Some(path)) => ExportFormat::from_path(path),
    };
    let text = match format {
        ExportFormat::Json => records_to_json(source.id(), &records)?,
        ExportFormat::Text => {
            records_to_text(source.id(), &records, Utc::now(), fleet.display_clock())?
        }
    };
    match &args.output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} logs to {}", records.len(), path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn target_source(fleet: &Fleet, target: Option<&str>) -> Result<SharedSource> {
    let id = match target {
        Some(id) => id.to_string(),
        None => fleet
            .ids()
            .into_iter()
            .next()
            .context("No sources given; pass --source NAME=PATH")?,
    };
    Ok(fleet.get(&id)?)
}

/// Register every named source and load its files in parallel.
///
/// The first file of a source replaces its contents, later ones are
/// appended; a file name already loaded into that source is skipped.
fn load_fleet(sources: &[(String, PathBuf)], config: &EngineConfig) -> Result<Fleet> {
    if sources.is_empty() {
        bail!("No sources given; pass --source NAME=PATH");
    }

    // Repeated file names are skipped here, before any file is read.
    let mut fleet = Fleet::new(config.timezone);
    let mut by_name: IndexMap<&str, (BTreeSet<String>, Vec<&PathBuf>)> = IndexMap::new();
    for (name, path) in sources {
        if !by_name.contains_key(name.as_str()) {
            fleet.register(name.as_str())?;
        }
        let handle = fleet.get(name)?;
        let loaded = read_source(&handle);
        let (names, paths) = by_name.entry(name.as_str()).or_default();
        match check_new_file(name, path, |file| {
            names.contains(file) || loaded.contains_file(file)
        }) {
            Ok(file_name) => {
                names.insert(file_name);
                paths.push(path);
            }
            Err(e @ LoadError::Duplicate(_)) => eprintln!("Skipped: {e}"),
            Err(e @ LoadError::Io { .. }) => return Err(e.into()),
        }
    }

    let clock = config.timezone;
    let pending: Vec<(&str, Vec<&PathBuf>)> = by_name
        .into_iter()
        .map(|(name, (_, paths))| (name, paths))
        .collect();
    let loaded: Vec<(&str, Vec<FileBatch>)> = pending
        .into_par_iter()
        .map(|(name, paths)| {
            let batches = paths
                .iter()
                .map(|path| {
                    load_file(path, name, clock)
                        .with_context(|| format!("Failed to load {} for {name}", path.display()))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((name, batches))
        })
        .collect::<Result<Vec<_>>>()?;

    for (name, batches) in loaded {
        fleet.load_files(name, batches)?;
    }

    tracing::info!("{}", fleet.status_line());
    Ok(fleet)
}
