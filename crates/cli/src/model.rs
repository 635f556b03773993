//! `heartline train`, `heartline evaluate` and `heartline predict`.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Args;
use heartline_config::Settings;
use heartline_io::csv::read_table;
use heartline_io::json::parse_requests;
use heartline_io::{ArtifactStore, IoError};
use heartline_pipeline::{
    evaluate, ingest_training, stratified_split, CanonicalRecord, ClassifierArtifact, ConsistencyGuard,
    EvaluationMetrics, FeatureEncoder, FittedEncoder, LabeledBatch, LogisticRegression, PipelineArtifact,
    PipelineError, Predictor, TrainParams, TrainReport,
};
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use crate::exit_codes::pipeline_exit_code;
use crate::schema::resolve_schema;
use crate::CliError;

// ============================================================================
// train
// ============================================================================

#[derive(Args)]
#[command(after_help = "\
Examples:
  heartline train
  heartline train data/heart.csv --artifacts out/ --seed 7
  heartline train raw.csv --schema canonical_remap_zero --test-ratio 0.25 --json")]
pub struct TrainArgs {
    /// Canonical dataset (default: <data_dir>/<dataset> from settings)
    input: Option<PathBuf>,

    /// Schema the dataset is read under; stored with the pipeline
    #[arg(long, short = 's', default_value = "canonical")]
    schema: String,

    /// Artifact directory (default: artifact_dir from settings)
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Held-out fraction for evaluation
    #[arg(long)]
    test_ratio: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct TrainSummary {
    pipeline: PathBuf,
    model: PathBuf,
    fingerprint: String,
    train_rows: usize,
    test_rows: usize,
    dropped_rows: usize,
    report: TrainReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<EvaluationMetrics>,
}

/// Outcome of fitting a guard and a classifier on a labeled batch.
pub(crate) struct Trained {
    pub guard: ConsistencyGuard<FittedEncoder>,
    pub artifact: ClassifierArtifact,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Split `batch`, fit the encoder on the training part only, train the
/// classifier and score it on the held-out part.
pub(crate) fn fit_models(
    schema: heartline_pipeline::SourceSchema,
    batch: &LabeledBatch,
    params: TrainParams,
    test_ratio: f64,
    seed: u64,
) -> Result<Trained, PipelineError> {
    let labels: Vec<u8> = batch.rows.iter().map(|r| r.target).collect();
    let split = stratified_split(&labels, test_ratio, seed);
    info!("split: {} train / {} test rows", split.train.len(), split.test.len());

    let train_records: Vec<CanonicalRecord> = split.train.iter().map(|&i| batch.rows[i].record).collect();
    let guard = ConsistencyGuard::fit(schema, &train_records)?;

    let encode = |indices: &[usize]| -> Result<Vec<(Vec<f64>, u8)>, PipelineError> {
        indices
            .iter()
            .map(|&i| {
                let row = &batch.rows[i];
                Ok((guard.encoder().transform(&row.record)?, row.target))
            })
            .collect()
    };
    let train_set = encode(&split.train)?;
    let test_set = encode(&split.test)?;

    let (model, report) = LogisticRegression::fit(&as_samples(&train_set), &params)?;
    if !report.converged {
        warn!("training stopped after {} epochs without converging", report.epochs_run);
    }

    let mut artifact = ClassifierArtifact::new(&guard, model, params, report);
    if !test_set.is_empty() {
        let metrics = evaluate(&artifact.model, &as_samples(&test_set));
        info!("held-out {metrics}");
        artifact = artifact.with_metrics(metrics);
    }

    Ok(Trained {
        guard,
        artifact,
        train_rows: train_set.len(),
        test_rows: test_set.len(),
    })
}

fn as_samples(set: &[(Vec<f64>, u8)]) -> Vec<(&[f64], u8)> {
    set.iter().map(|(x, y)| (x.as_slice(), *y)).collect()
}

pub fn cmd_train(settings: &Settings, args: TrainArgs) -> Result<(), CliError> {
    let schema = resolve_schema(&args.schema)?;
    let path = args.input.unwrap_or_else(|| settings.dataset_path());
    let store = ArtifactStore::new(args.artifacts.unwrap_or_else(|| settings.artifact_dir.clone()));

    let t = &settings.train;
    let test_ratio = args.test_ratio.unwrap_or(t.test_ratio);
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(CliError::args(format!("--test-ratio must be in (0, 1), got {test_ratio}")));
    }
    let params = TrainParams {
        learning_rate: args.learning_rate.unwrap_or(t.learning_rate),
        epochs: args.epochs.unwrap_or(t.epochs),
        l2: t.l2,
        tolerance: t.tolerance,
    };
    if params.epochs == 0 {
        return Err(CliError::args("--epochs must be at least 1"));
    }
    if !(params.learning_rate.is_finite() && params.learning_rate > 0.0) {
        return Err(CliError::args(format!(
            "--learning-rate must be positive, got {}",
            params.learning_rate
        )));
    }

    let table = read_table(&path, &schema)?;
    let batch = ingest_training(&schema, &table)?;
    if !batch.dropped.is_empty() {
        warn!("{} of {} rows dropped during ingestion", batch.dropped.len(), batch.input_rows);
    }

    let trained = fit_models(schema, &batch, params, test_ratio, args.seed.unwrap_or(t.seed))?;
    let pipeline = store.save_pipeline(&PipelineArtifact::from_guard(&trained.guard))?;
    let model = store.save_classifier(&trained.artifact)?;

    let summary = TrainSummary {
        pipeline,
        model,
        fingerprint: trained.guard.fingerprint().to_string(),
        train_rows: trained.train_rows,
        test_rows: trained.test_rows,
        dropped_rows: batch.dropped.len(),
        report: trained.artifact.report.clone(),
        metrics: trained.artifact.metrics.clone(),
    };
    if args.json {
        return crate::print_json(&summary);
    }
    eprintln!(
        "trained on {} rows ({} held out, {} dropped) in {} epochs, loss {:.4}",
        summary.train_rows, summary.test_rows, summary.dropped_rows, summary.report.epochs_run, summary.report.final_loss
    );
    if let Some(metrics) = &summary.metrics {
        eprintln!("held-out: {metrics}");
    }
    eprintln!("pipeline: {}", summary.pipeline.display());
    eprintln!("model:    {}", summary.model.display());
    Ok(())
}

// ============================================================================
// evaluate / predict
// ============================================================================

fn load_predictor(store: &ArtifactStore) -> Result<Predictor<FittedEncoder, LogisticRegression>, CliError> {
    let guard = store.load_encoder()?;
    let artifact = store.load_classifier()?;
    Predictor::new(guard, artifact.model, &artifact.pipeline_fingerprint).map_err(|e| {
        CliError::from(e).with_hint(format!(
            "{} and {} come from different training runs; retrain",
            store.pipeline_path().display(),
            store.model_path().display()
        ))
    })
}

#[derive(Args)]
#[command(after_help = "\
Examples:
  heartline evaluate
  heartline evaluate holdout.csv --json")]
pub struct EvaluateArgs {
    /// Labeled dataset, read under the stored pipeline's schema
    /// (default: <data_dir>/<dataset> from settings)
    input: Option<PathBuf>,

    #[arg(long)]
    artifacts: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

pub fn cmd_evaluate(settings: &Settings, args: EvaluateArgs) -> Result<(), CliError> {
    let store = ArtifactStore::new(args.artifacts.unwrap_or_else(|| settings.artifact_dir.clone()));
    let predictor = load_predictor(&store)?;
    let path = args.input.unwrap_or_else(|| settings.dataset_path());

    let table = read_table(&path, predictor.guard().schema())?;
    let batch = predictor.guard().apply_table(&table)?;
    let samples = batch.labeled();
    if samples.is_empty() {
        return Err(CliError::from(PipelineError::Label {
            at: None,
            reason: format!("{} has no labeled rows to evaluate", path.display()),
        }));
    }
    let metrics = evaluate(predictor.classifier(), &samples);

    if args.json {
        return crate::print_json(&json!({
            "path": path,
            "input_rows": batch.input_rows,
            "dropped_rows": batch.dropped.len(),
            "metrics": metrics,
        }));
    }
    let c = &metrics.confusion;
    println!("{} ({} rows, {} dropped)", path.display(), batch.input_rows, batch.dropped.len());
    println!("{metrics}");
    println!("confusion: tn={} fp={} fn={} tp={}", c.tn, c.fp, c.fn_count, c.tp);
    Ok(())
}

#[derive(Args)]
#[command(after_help = "\
Examples:
  heartline predict request.json
  echo '{\"age\": 63, \"sex\": 1, ...}' | heartline predict
  heartline predict batch.json --artifacts out/")]
pub struct PredictArgs {
    /// JSON request: one object, an {\"id\", \"record\"} envelope, or an array
    /// of either (default or '-': stdin)
    input: Option<PathBuf>,

    #[arg(long)]
    artifacts: Option<PathBuf>,
}

fn read_input(input: Option<&Path>) -> Result<String, CliError> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path).map_err(|source| {
            CliError::from(IoError::Read {
                path: path.to_path_buf(),
                source,
            })
        }),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| CliError::io(format!("cannot read stdin: {e}")))?;
            Ok(text)
        }
    }
}

pub fn cmd_predict(settings: &Settings, args: PredictArgs) -> Result<(), CliError> {
    let store = ArtifactStore::new(args.artifacts.unwrap_or_else(|| settings.artifact_dir.clone()));
    let requests = parse_requests(&read_input(args.input.as_deref())?)?;
    let predictor = load_predictor(&store)?;

    if let [request] = requests.as_slice() {
        let id = request.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let prediction = predictor.predict_one(&id, &request.record)?;
        return crate::print_json(&prediction);
    }

    let mut first_failure: Option<u8> = None;
    let mut failed = 0usize;
    let mut results = Vec::with_capacity(requests.len());
    for request in &requests {
        let id = request.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        match predictor.predict_one(&id, &request.record) {
            Ok(prediction) => results.push(json!(prediction)),
            Err(e) => {
                warn!("{e}");
                failed += 1;
                first_failure.get_or_insert(pipeline_exit_code(&e));
                results.push(json!({
                    "request_id": id,
                    "error": { "class": e.class(), "message": e.to_string() },
                }));
            }
        }
    }
    crate::print_json(&results)?;

    match first_failure {
        None => Ok(()),
        Some(code) => Err(CliError {
            code,
            message: format!("{failed} of {} requests failed", requests.len()),
            hint: None,
        }),
    }
}
