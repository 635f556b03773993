use std::path::PathBuf;

use heartline_io::csv::{read_table, write_canonical_file};
use heartline_io::{ArtifactStore, FileSource, RawSource};
use heartline_pipeline::{
    ingest_training, CanonicalRecord, ConsistencyGuard, Field, PipelineArtifact, PipelineError, PreprocessReport,
    SourceSchema,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn heart_failure_file_reconciles_to_canonical() {
    let schema = SourceSchema::builtin("heart_failure").unwrap();
    let table = read_table(&fixtures_dir().join("heart_failure_sample.csv"), &schema).unwrap();
    let batch = ingest_training(&schema, &table).unwrap();

    assert_eq!(batch.input_rows, 12);
    assert_eq!(batch.rows.len(), 10);
    assert_eq!(batch.class_counts(), [7, 3]);

    let first = &batch.rows[0].record;
    assert_eq!((first.cp, first.slope, first.ca, first.thal), (1, 1, 0, 3));
    assert_eq!(batch.rows[2].record.restecg, 1);

    let report = PreprocessReport::new(&schema, &batch);
    assert_eq!(report.dropped_by_class.get("missing_value"), Some(&2));
    let dropped_fields: Vec<Field> = batch
        .dropped
        .iter()
        .filter_map(|e| match e {
            PipelineError::MissingValue { field, .. } => Some(*field),
            _ => None,
        })
        .collect();
    assert_eq!(dropped_fields, vec![Field::Chol, Field::Chol]);
}

#[test]
fn headerless_cleveland_file_reconciles_to_canonical() {
    let source = FileSource::new(
        fixtures_dir().join("processed.cleveland.sample.data"),
        SourceSchema::builtin("uci_cleveland").unwrap(),
    );
    let fetched = source.fetch().unwrap();
    let batch = ingest_training(&fetched.schema, &fetched.table).unwrap();
    assert_eq!(batch.input_rows, 10);
    assert_eq!(batch.rows.len(), 8);
    assert_eq!(batch.class_counts(), [4, 4]);
    assert!(batch
        .dropped
        .iter()
        .all(|e| matches!(e, PipelineError::MissingValue { field: Field::Ca, .. })));
}

#[test]
fn zero_codes_depend_on_schema_rules() {
    let path = fixtures_dir().join("canonical_with_zeros.csv");

    let strict = SourceSchema::builtin("canonical").unwrap();
    let batch = ingest_training(&strict, &read_table(&path, &strict).unwrap()).unwrap();
    assert_eq!(batch.rows.len(), 2);
    assert!(matches!(batch.dropped[0], PipelineError::OutOfDistribution { field: Field::Slope, .. }));

    let lenient = SourceSchema::builtin("canonical_remap_zero").unwrap();
    let batch = ingest_training(&lenient, &read_table(&path, &lenient).unwrap()).unwrap();
    assert_eq!(batch.rows.len(), 3);
    assert_eq!(batch.repairs.len(), 2);
    assert_eq!((batch.rows[1].record.slope, batch.rows[1].record.thal), (1, 3));
}

#[test]
fn canonical_output_reads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let hf = SourceSchema::builtin("heart_failure").unwrap();
    let table = read_table(&fixtures_dir().join("heart_failure_sample.csv"), &hf).unwrap();
    let batch = ingest_training(&hf, &table).unwrap();

    let out = dir.path().join("heart.csv");
    write_canonical_file(&out, &batch.records()).unwrap();

    let canonical = SourceSchema::builtin("canonical").unwrap();
    let reread = ingest_training(&canonical, &read_table(&out, &canonical).unwrap()).unwrap();
    assert!(reread.dropped.is_empty());
    let before: Vec<(CanonicalRecord, u8)> = batch.rows.iter().map(|r| (r.record, r.target)).collect();
    let after: Vec<(CanonicalRecord, u8)> = reread.rows.iter().map(|r| (r.record, r.target)).collect();
    assert_eq!(before, after);
}

#[test]
fn stored_pipeline_encodes_like_the_fitted_one() {
    let dir = tempfile::tempdir().unwrap();
    let schema = SourceSchema::builtin("uci_cleveland").unwrap();
    let table = read_table(&fixtures_dir().join("processed.cleveland.sample.data"), &schema).unwrap();
    let batch = ingest_training(&schema, &table).unwrap();
    let records: Vec<CanonicalRecord> = batch.rows.iter().map(|r| r.record).collect();
    let guard = ConsistencyGuard::fit(schema, &records).unwrap();

    let store = ArtifactStore::new(dir.path());
    store.save_pipeline(&PipelineArtifact::from_guard(&guard)).unwrap();
    let loaded = store.load_encoder().unwrap();

    let fitted = guard.apply_table(&table).unwrap();
    let reloaded = loaded.apply_table(&table).unwrap();
    assert_eq!(fitted.rows.len(), 8);
    for (a, b) in fitted.rows.iter().zip(&reloaded.rows) {
        assert_eq!(a.features, b.features);
        assert_eq!(a.target, b.target);
    }
}
