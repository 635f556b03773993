//! `heartline fetch`: download the dataset from the first usable source
//! and write it as canonical CSV.

mod common;
mod http;

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use heartline_config::Settings;
use heartline_io::csv::{read_table, write_canonical_file};
use heartline_io::{IoError, RawSource};
use heartline_pipeline::profile::Comparison;
use heartline_pipeline::{ingest_training, LabeledBatch, PreprocessReport, SourceSchema};
use log::{info, warn};
use serde::Serialize;

use crate::schema::resolve_schema;
use crate::CliError;

pub(crate) use common::FetchClient;
pub(crate) use http::HttpSource;

#[derive(Args)]
#[command(after_help = "\
Examples:
  heartline fetch
  heartline fetch --source uci-cleveland
  heartline fetch --out data/heart.csv --json")]
pub struct FetchArgs {
    /// Only try this configured source
    #[arg(long)]
    source: Option<String>,

    /// Output CSV file (default: <data_dir>/<dataset> from settings)
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,

    /// Do not back up an existing dataset before overwriting it
    #[arg(long)]
    no_backup: bool,

    /// Print the fetch summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Suppress the summary on stderr
    #[arg(long, short = 'q')]
    quiet: bool,
}

/// A source plus the smallest clean row count it must yield.
pub(crate) struct Candidate<'a> {
    pub source: Box<dyn RawSource + 'a>,
    pub min_rows: usize,
}

pub(crate) struct Accepted {
    pub name: String,
    pub schema: SourceSchema,
    pub batch: LabeledBatch,
}

/// Try candidates in order; the first one that downloads, ingests and keeps
/// at least `min_rows` rows wins.
pub(crate) fn first_accepted(candidates: &[Candidate<'_>]) -> Result<Accepted, IoError> {
    let mut failures = Vec::new();

    for candidate in candidates {
        let name = candidate.source.name().to_string();
        info!("trying source '{name}'");

        let fetched = match candidate.source.fetch() {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("{e}; trying next source");
                failures.push(format!("{name}: {e}"));
                continue;
            }
        };

        let batch = match ingest_training(&fetched.schema, &fetched.table) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("source '{name}' rejected: {e}; trying next source");
                failures.push(format!("{name}: {e}"));
                continue;
            }
        };

        if batch.rows.len() < candidate.min_rows {
            warn!(
                "source '{name}' too small ({} clean rows, need {}); trying next source",
                batch.rows.len(),
                candidate.min_rows
            );
            failures.push(format!(
                "{name}: {} clean rows, need {}",
                batch.rows.len(),
                candidate.min_rows
            ));
            continue;
        }

        return Ok(Accepted {
            name,
            schema: fetched.schema,
            batch,
        });
    }

    Err(IoError::SourceUnavailable {
        name: "all sources".into(),
        reason: if failures.is_empty() {
            "no sources configured".into()
        } else {
            failures.join("; ")
        },
    })
}

#[derive(Debug, Serialize)]
struct FetchSummary {
    source: String,
    output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    backup: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
    report: PreprocessReport,
}

pub fn cmd_fetch(settings: &Settings, args: FetchArgs) -> Result<(), CliError> {
    let configured = settings.sources_by_priority();
    let selected: Vec<_> = match &args.source {
        Some(wanted) => configured.into_iter().filter(|s| &s.name == wanted).collect(),
        None => configured,
    };
    if selected.is_empty() {
        let known: Vec<&str> = settings.sources.iter().map(|s| s.name.as_str()).collect();
        let err = CliError::args(match &args.source {
            Some(wanted) => format!("unknown source '{wanted}'"),
            None => "no sources configured".to_string(),
        });
        return Err(if known.is_empty() {
            err.with_hint("add [[sources]] entries to heartline.toml")
        } else {
            err.with_hint(format!("configured sources: {}", known.join(", ")))
        });
    }

    let client = FetchClient::new(&settings.fetch).map_err(CliError::io)?;
    let mut candidates = Vec::with_capacity(selected.len());
    for source in selected {
        let schema = resolve_schema(&source.schema)?;
        candidates.push(Candidate {
            source: Box::new(HttpSource::new(&source.name, &source.url, schema, &client)),
            min_rows: source.min_rows,
        });
    }

    let accepted = first_accepted(&candidates)?;
    let output = args.out.unwrap_or_else(|| settings.dataset_path());
    let backup_path = output.with_file_name(&settings.backup);

    let previous_rows = previous_row_count(&output);
    let backup = if args.no_backup {
        None
    } else {
        backup_once(&output, &backup_path)?
    };

    write_canonical_file(&output, &accepted.batch.records())?;
    info!("wrote {} rows to {}", accepted.batch.rows.len(), output.display());

    let summary = FetchSummary {
        source: accepted.name,
        output,
        backup,
        comparison: previous_rows.map(|prev| Comparison::between(prev, accepted.batch.rows.len())),
        report: PreprocessReport::new(&accepted.schema, &accepted.batch),
    };

    if !args.quiet {
        print_summary(&summary);
    }
    if args.json {
        crate::print_json(&summary)?;
    }
    Ok(())
}

/// Copy the current dataset to `backup` unless a backup already exists.
fn backup_once(dataset: &Path, backup: &Path) -> Result<Option<PathBuf>, CliError> {
    if !dataset.is_file() || backup.exists() {
        return Ok(None);
    }
    fs::copy(dataset, backup).map_err(|source| IoError::Write {
        path: backup.to_path_buf(),
        source,
    })?;
    info!("backed up {} to {}", dataset.display(), backup.display());
    Ok(Some(backup.to_path_buf()))
}

fn previous_row_count(dataset: &Path) -> Option<usize> {
    if !dataset.is_file() {
        return None;
    }
    let schema = SourceSchema::builtin("canonical").ok()?;
    match read_table(dataset, &schema) {
        Ok(table) => Some(table.row_count()),
        Err(e) => {
            warn!("cannot read previous dataset: {e}");
            None
        }
    }
}

fn print_summary(summary: &FetchSummary) {
    let report = &summary.report;
    eprintln!("source:   {} (schema {})", summary.source, report.schema);
    eprintln!("output:   {}", summary.output.display());
    if let Some(backup) = &summary.backup {
        eprintln!("backup:   {}", backup.display());
    }
    eprintln!(
        "rows:     {} kept of {} ({} dropped)",
        report.kept_rows, report.input_rows, report.dropped_rows
    );
    eprintln!(
        "classes:  0={} 1={}",
        report.class_counts[0], report.class_counts[1]
    );
    if let Some(cmp) = &summary.comparison {
        match cmp.multiplier {
            Some(m) => eprintln!(
                "previous: {} rows -> {} rows ({:+}, x{:.1})",
                cmp.previous_rows, cmp.current_rows, cmp.increase, m
            ),
            None => eprintln!("previous: empty -> {} rows", cmp.current_rows),
        }
    }
}
