use heartline_pipeline::{
    evaluate, ingest_training, stratified_split, Cell, CanonicalRecord, ClassifierArtifact, ConsistencyGuard,
    Field, LogisticRegression, PipelineArtifact, PipelineError, Predictor, RawRecord, RawTable, RecordRef,
    RepairRules, SourceSchema, TrainParams, CANONICAL_COLUMNS,
};

fn table(headers: &[&str], rows: &[&str]) -> RawTable {
    RawTable::from_rows(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter().map(|r| r.split(',').map(Cell::from).collect()).collect(),
    )
    .unwrap()
}

fn canonical_headers() -> Vec<&'static str> {
    CANONICAL_COLUMNS.iter().map(|f| f.name()).collect()
}

/// Twenty Cleveland-style rows, canonical names and codes.
fn cleveland_rows() -> Vec<&'static str> {
    vec![
        "63,1,1,145,233,1,2,150,0,2.3,3,0,6,0",
        "67,1,4,160,286,0,2,108,1,1.5,2,3,3,2",
        "67,1,4,120,229,0,2,129,1,2.6,2,2,7,1",
        "37,1,3,130,250,0,0,187,0,3.5,3,0,3,0",
        "41,0,2,130,204,0,2,172,0,1.4,1,0,3,0",
        "56,1,2,120,236,0,0,178,0,0.8,1,0,3,0",
        "62,0,4,140,268,0,2,160,0,3.6,3,2,3,3",
        "57,0,4,120,354,0,0,163,1,0.6,1,0,3,0",
        "63,1,4,130,254,0,2,147,0,1.4,2,1,7,2",
        "53,1,4,140,203,1,2,155,1,3.1,3,0,7,1",
        "57,1,4,140,192,0,0,148,0,0.4,2,0,6,0",
        "56,0,2,140,294,0,2,153,0,1.3,2,0,3,0",
        "56,1,3,130,256,1,2,142,1,0.6,2,1,6,2",
        "44,1,2,120,263,0,0,173,0,0.0,1,0,7,0",
        "52,1,3,172,199,1,0,162,0,0.5,1,0,7,0",
        "57,1,3,150,168,0,0,174,0,1.6,1,0,3,0",
        "48,1,2,110,229,0,0,168,0,1.0,3,0,7,1",
        "54,1,4,140,239,0,0,160,0,1.2,1,0,3,0",
        "48,0,3,130,275,0,0,139,0,0.2,1,0,3,0",
        "49,1,2,130,266,0,0,171,0,0.6,1,0,3,0",
    ]
}

fn scenario_request() -> RawRecord {
    RawRecord::new()
        .with("slope", 0i64)
        .with("thal", 0i64)
        .with("age", 18i64)
        .with("sex", 0i64)
        .with("cp", 2i64)
        .with("trestbps", 90i64)
        .with("chol", 120i64)
        .with("fbs", 0i64)
        .with("restecg", 0i64)
        .with("thalach", 200i64)
        .with("exang", 0i64)
        .with("oldpeak", 0.0)
        .with("ca", 0i64)
}

fn fit_guard(schema: SourceSchema) -> ConsistencyGuard {
    let batch = ingest_training(&schema, &table(&canonical_headers(), &cleveland_rows())).unwrap();
    let records: Vec<CanonicalRecord> = batch.rows.iter().map(|r| r.record).collect();
    ConsistencyGuard::fit(schema, &records).unwrap()
}

// -------------------------------------------------------------------------
// Zero slope / thal requests
// -------------------------------------------------------------------------

#[test]
fn zero_slope_without_remap_rules_is_rejected() {
    let guard = fit_guard(SourceSchema::canonical_with(RepairRules::canonical()).unwrap());
    let err = guard.apply_record("scenario-1", &scenario_request()).unwrap_err();
    match err {
        PipelineError::OutOfDistribution { at, field, value } => {
            assert_eq!(at, RecordRef::Request("scenario-1".into()));
            assert_eq!(field, Field::Slope);
            assert_eq!(value, "0");
        }
        other => panic!("expected out-of-distribution error, got {other}"),
    }
}

#[test]
fn zero_slope_and_thal_with_remap_rules_encode() {
    let rules = RepairRules::canonical()
        .with_remap(Field::Slope, 0, 1)
        .with_remap(Field::Thal, 0, 3);
    let guard = fit_guard(SourceSchema::canonical_with(rules).unwrap());
    let encoded = guard.apply_record("scenario-2", &scenario_request()).unwrap();
    assert_eq!(encoded.record.slope, 1);
    assert_eq!(encoded.record.thal, 3);
    assert_eq!(encoded.features.len(), guard.encoder().output_width());
    let fields: Vec<Field> = encoded.repairs.iter().map(|r| r.field).collect();
    assert_eq!(fields, vec![Field::Slope, Field::Thal]);
}

// -------------------------------------------------------------------------
// Heterogeneous sources
// -------------------------------------------------------------------------

#[test]
fn heart_failure_row_lands_on_canonical_codes() {
    let schema = SourceSchema::builtin("heart_failure").unwrap();
    let raw = table(
        &[
            "Age", "Sex", "ChestPainType", "RestingBP", "Cholesterol", "FastingBS", "RestingECG", "MaxHR",
            "ExerciseAngina", "Oldpeak", "ST_Slope", "target",
        ],
        &["40,M,ATA,140,289,0,Normal,172,N,0,Up,1"],
    );
    let batch = ingest_training(&schema, &raw).unwrap();
    assert_eq!(batch.rows.len(), 1);
    let row = &batch.rows[0];
    assert_eq!(row.record.cp, 1);
    assert_eq!(row.record.slope, 1);
    assert_eq!(row.record.ca, 0);
    assert_eq!(row.record.thal, 3);
    assert_eq!(row.record.age, 40);
    assert_eq!(row.target, 1);
}

#[test]
fn severity_labels_collapse_to_binary() {
    let schema = SourceSchema::builtin("canonical").unwrap();
    let rows = [
        "63,1,1,145,233,1,2,150,0,2.3,3,0,6,0",
        "63,1,1,145,233,1,2,150,0,2.3,3,0,6,1",
        "63,1,1,145,233,1,2,150,0,2.3,3,0,6,2",
        "63,1,1,145,233,1,2,150,0,2.3,3,0,6,3",
        "63,1,1,145,233,1,2,150,0,2.3,3,0,6,4",
    ];
    let batch = ingest_training(&schema, &table(&canonical_headers(), &rows)).unwrap();
    let targets: Vec<u8> = batch.rows.iter().map(|r| r.target).collect();
    assert_eq!(targets, vec![0, 1, 1, 1, 1]);
}

#[test]
fn malformed_label_fails_the_whole_batch() {
    let schema = SourceSchema::builtin("canonical").unwrap();
    let rows = ["63,1,1,145,233,1,2,150,0,2.3,3,0,6,0", "63,1,1,145,233,1,2,150,0,2.3,3,0,6,severe"];
    let err = ingest_training(&schema, &table(&canonical_headers(), &rows)).unwrap_err();
    assert!(matches!(err, PipelineError::Label { at: Some(RecordRef::Row(1)), .. }), "{err}");
}

// -------------------------------------------------------------------------
// Train → persist → reload → predict
// -------------------------------------------------------------------------

#[test]
fn training_and_prediction_vectors_are_identical() {
    let schema = SourceSchema::builtin("canonical_remap_zero").unwrap();
    let raw = table(&canonical_headers(), &cleveland_rows());
    let batch = ingest_training(&schema, &raw).unwrap();
    let labels: Vec<u8> = batch.rows.iter().map(|r| r.target).collect();
    let split = stratified_split(&labels, 0.25, 42);

    let train: Vec<CanonicalRecord> = split.train.iter().map(|&i| batch.rows[i].record).collect();
    let guard = ConsistencyGuard::fit(schema, &train).unwrap();

    let encoded = guard.apply_table(&raw).unwrap();
    assert_eq!(encoded.rows.len(), 20);
    let samples: Vec<(&[f64], u8)> = split
        .train
        .iter()
        .map(|&i| (encoded.rows[i].features.as_slice(), labels[i]))
        .collect();
    let params = TrainParams {
        epochs: 300,
        ..TrainParams::default()
    };
    let (model, report) = LogisticRegression::fit(&samples, &params).unwrap();
    let train_metrics = evaluate(&model, &samples);
    assert!(train_metrics.accuracy >= 0.7, "{train_metrics}");

    // Persist and reload both artifacts through JSON.
    let pipeline_json = serde_json::to_string(&PipelineArtifact::from_guard(&guard)).unwrap();
    let classifier_json =
        serde_json::to_string(&ClassifierArtifact::new(&guard, model, params, report)).unwrap();
    let reloaded: PipelineArtifact = serde_json::from_str(&pipeline_json).unwrap();
    let classifier: ClassifierArtifact = serde_json::from_str(&classifier_json).unwrap();
    classifier.check().unwrap();
    let reloaded_guard = reloaded.into_guard().unwrap();
    let predictor =
        Predictor::new(reloaded_guard, classifier.model.clone(), &classifier.pipeline_fingerprint).unwrap();

    for row in &encoded.rows {
        let single = predictor.guard().apply_record("replay", &row.record.to_raw()).unwrap();
        assert_eq!(single.features, row.features, "{}", row.at);
        let prediction = predictor.predict_one("replay", &row.record.to_raw()).unwrap();
        assert_eq!(prediction.label, heartline_pipeline::Classifier::predict(&classifier.model, &row.features));
    }

    let repaired = predictor.predict_one("zeros", &scenario_request()).unwrap();
    assert_eq!(repaired.repairs.len(), 2);
}

#[test]
fn classifier_from_another_pipeline_is_refused() {
    let guard = fit_guard(SourceSchema::builtin("canonical").unwrap());
    let other = fit_guard(SourceSchema::builtin("canonical_remap_zero").unwrap());
    let model = LogisticRegression {
        weights: vec![0.0; other.encoder().output_width()],
        bias: 0.0,
    };
    let err = Predictor::new(guard, model, other.fingerprint()).err().unwrap();
    assert!(matches!(err, PipelineError::SchemaVersionMismatch { .. }), "{err}");
}
