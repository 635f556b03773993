//! `heartline preprocess` and `heartline inspect`.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use heartline_config::Settings;
use heartline_io::csv::{read_table, write_canonical, write_canonical_file};
use heartline_pipeline::profile::{compare, profile, Comparison, DatasetProfile};
use heartline_pipeline::{ingest_training, PreprocessReport};
use log::info;
use serde::Serialize;

use crate::schema::resolve_schema;
use crate::CliError;

#[derive(Args)]
#[command(after_help = "\
Examples:
  heartline preprocess raw/heart.csv --schema heart_failure --out data/heart.csv
  heartline preprocess processed.cleveland.data --schema uci_cleveland > heart.csv
  heartline preprocess raw/heart.csv --schema canonical_remap_zero --json --out data/heart.csv")]
pub struct PreprocessArgs {
    /// Source CSV file
    input: PathBuf,

    /// Built-in schema name or schema file describing the source
    #[arg(long, short = 's', default_value = "canonical")]
    schema: String,

    /// Write canonical CSV here (default: stdout, unless --json)
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,

    /// Print the preprocessing report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Suppress the report on stderr
    #[arg(long, short = 'q')]
    quiet: bool,
}

pub fn cmd_preprocess(args: PreprocessArgs) -> Result<(), CliError> {
    let schema = resolve_schema(&args.schema)?;
    let table = read_table(&args.input, &schema)?;
    let batch = ingest_training(&schema, &table)?;
    let report = PreprocessReport::new(&schema, &batch);

    match &args.out {
        Some(out) => {
            write_canonical_file(out, &batch.records())?;
            info!("wrote {} rows to {}", batch.rows.len(), out.display());
        }
        None if !args.json => {
            let stdout = io::stdout();
            write_canonical(stdout.lock(), &batch.records())?;
        }
        None => {}
    }

    if !args.quiet {
        print_report(&report);
    }
    if args.json {
        crate::print_json(&report)?;
    }
    Ok(())
}

pub(crate) fn print_report(report: &PreprocessReport) {
    eprintln!("schema:   {}", report.schema);
    eprintln!(
        "rows:     {} kept of {} ({} dropped)",
        report.kept_rows, report.input_rows, report.dropped_rows
    );
    for (class, count) in &report.dropped_by_class {
        eprintln!("  dropped {class}: {count}");
    }
    for (field, count) in &report.repairs_by_field {
        eprintln!("  repaired {field}: {count}");
    }
    eprintln!("classes:  0={} 1={}", report.class_counts[0], report.class_counts[1]);
}

#[derive(Args)]
#[command(after_help = "\
Examples:
  heartline inspect
  heartline inspect data/heart.csv --compare data/heart_old_backup.csv
  heartline inspect raw.csv --schema heart_failure --json")]
pub struct InspectArgs {
    /// Dataset file (default: <data_dir>/<dataset> from settings)
    input: Option<PathBuf>,

    /// Built-in schema name or schema file used to read the file
    #[arg(long, short = 's', default_value = "canonical")]
    schema: String,

    /// Earlier version of the dataset to compare row counts against
    #[arg(long)]
    compare: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Inspection {
    path: PathBuf,
    profile: DatasetProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
}

pub fn cmd_inspect(settings: &Settings, args: InspectArgs) -> Result<(), CliError> {
    let schema = resolve_schema(&args.schema)?;
    let path = args.input.unwrap_or_else(|| settings.dataset_path());
    let table = read_table(&path, &schema)?;
    let current = profile(&table, &schema);
    let comparison = match &args.compare {
        Some(previous) => {
            let previous = profile(&read_table(previous, &schema)?, &schema);
            Some(compare(&previous, &current))
        }
        None => None,
    };

    let inspection = Inspection {
        path,
        profile: current,
        comparison,
    };
    if args.json {
        return crate::print_json(&inspection);
    }
    print_inspection(&inspection).map_err(|e| CliError::io(e.to_string()))
}

fn print_inspection(inspection: &Inspection) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let p = &inspection.profile;

    writeln!(out, "{}", inspection.path.display())?;
    writeln!(
        out,
        "shape: {} rows x {} columns, {} missing values, {} duplicate rows",
        p.rows,
        p.columns.len(),
        p.total_missing(),
        p.duplicate_rows
    )?;
    writeln!(out)?;
    writeln!(out, "{:<16} {:>8} {:>10} {:>10} {:>10}", "column", "missing", "min", "max", "mean")?;
    for col in &p.columns {
        let fmt = |v: Option<f64>| v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".into());
        writeln!(
            out,
            "{:<16} {:>8} {:>10} {:>10} {:>10}",
            col.name,
            col.missing,
            fmt(col.min),
            fmt(col.max),
            fmt(col.mean)
        )?;
    }

    for col in p.columns.iter().filter(|c| c.counts.is_some()) {
        if let Some(counts) = &col.counts {
            let values: Vec<String> = counts.iter().map(|(v, n)| format!("{v}={n}")).collect();
            writeln!(out, "values {}: {}", col.name, values.join(" "))?;
        }
    }

    if let Some(balance) = &p.class_balance {
        let total: usize = balance.values().sum();
        writeln!(out)?;
        for (class, n) in balance {
            let pct = if total > 0 { *n as f64 * 100.0 / total as f64 } else { 0.0 };
            writeln!(out, "class {class}: {n} ({pct:.1}%)")?;
        }
    }

    if let Some(cmp) = &inspection.comparison {
        writeln!(out)?;
        match cmp.multiplier {
            Some(m) => writeln!(
                out,
                "compared to previous: {} -> {} rows ({:+}, x{:.1})",
                cmp.previous_rows, cmp.current_rows, cmp.increase, m
            )?,
            None => writeln!(out, "compared to previous: empty -> {} rows", cmp.current_rows)?,
        }
    }
    Ok(())
}
