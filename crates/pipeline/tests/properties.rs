// Property-based tests for the normalizer, repair engine and binarizer.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use heartline_pipeline::config::RepairRules;
use heartline_pipeline::repair::repair_categorical;
use heartline_pipeline::{
    binarize, normalize, Cell, ConsistencyGuard, Field, RawRecord, RawTable, RecordRef, SourceSchema,
    CANONICAL_COLUMNS, FEATURES,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_categorical() -> impl Strategy<Value = Field> {
    prop::sample::select(Field::categorical().collect::<Vec<_>>())
}

/// A categorical field and one of its canonical legal codes.
fn arb_legal() -> impl Strategy<Value = (Field, i64)> {
    arb_categorical().prop_flat_map(|f| (Just(f), prop::sample::select(f.canonical_codes().to_vec())))
}

/// A canonical row as text cells, every value within its domain.
fn arb_canonical_row() -> impl Strategy<Value = Vec<String>> {
    let pick = |f: Field| prop::sample::select(f.canonical_codes().to_vec()).prop_map(|c| c.to_string());
    (
        (29i64..78, pick(Field::Sex), pick(Field::Cp), 94i64..200, 126i64..564, pick(Field::Fbs)),
        (pick(Field::Restecg), 71i64..202, pick(Field::Exang), 0u32..62),
        (pick(Field::Slope), pick(Field::Ca), pick(Field::Thal), 0i64..5),
    )
        .prop_map(|((age, sex, cp, bp, chol, fbs), (ecg, hr, exang, peak), (slope, ca, thal, target))| {
            vec![
                age.to_string(),
                sex,
                cp,
                bp.to_string(),
                chol.to_string(),
                fbs,
                ecg,
                hr.to_string(),
                exang,
                format!("{:.1}", f64::from(peak) / 10.0),
                slope,
                ca,
                thal,
                target.to_string(),
            ]
        })
}

fn canonical_table(rows: Vec<Vec<String>>) -> RawTable {
    RawTable::from_rows(
        CANONICAL_COLUMNS.iter().map(|f| f.name().to_string()).collect(),
        rows.into_iter().map(|r| r.into_iter().map(Cell::from).collect()).collect(),
    )
    .unwrap()
}

fn remap_rules() -> RepairRules {
    RepairRules::canonical()
        .with_remap(Field::Slope, 0, 1)
        .with_remap(Field::Thal, 0, 3)
        .with_remap(Field::Thal, 1, 6)
        .with_remap(Field::Cp, 0, 4)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// Legal codes pass through unchanged and unlogged, with or without
    /// remap rules configured.
    #[test]
    fn repair_is_identity_on_legal_codes((field, code) in arb_legal(), text in any::<bool>()) {
        let cell = if text { Cell::from(code.to_string()) } else { Cell::from(code) };
        for rules in [RepairRules::canonical(), remap_rules()] {
            let (out, repair) = repair_categorical(&RecordRef::Row(0), field, &cell, &rules).unwrap();
            prop_assert_eq!(out, code);
            prop_assert!(repair.is_none());
        }
    }

    /// Applying the repair to an already-repaired code changes nothing.
    #[test]
    fn remaps_are_idempotent(idx in 0usize..4) {
        let rules = remap_rules();
        let (field, from, to) = rules.remaps().nth(idx).unwrap();
        let (once, first) = repair_categorical(&RecordRef::Row(0), field, &Cell::from(from), &rules).unwrap();
        prop_assert_eq!(once, to);
        prop_assert!(first.is_some());
        let (twice, second) = repair_categorical(&RecordRef::Row(0), field, &Cell::from(once), &rules).unwrap();
        prop_assert_eq!(twice, once);
        prop_assert!(second.is_none());
    }

    /// Codes that are neither legal nor remapped never get through.
    #[test]
    fn unknown_codes_are_rejected(field in arb_categorical(), code in -50i64..50) {
        let rules = remap_rules();
        prop_assume!(!rules.is_legal(field, code) && rules.remap_for(field, code).is_none());
        let result = repair_categorical(&RecordRef::Row(0), field, &Cell::from(code), &rules);
        prop_assert!(result.is_err());
    }

    #[test]
    fn binarize_is_zero_iff_grade_is_zero(grade in 0i64..1000) {
        prop_assert_eq!(binarize(grade) == 0, grade == 0);
        prop_assert!(binarize(grade) <= 1);
    }

    #[test]
    fn normalizing_a_canonical_table_is_identity(rows in prop::collection::vec(arb_canonical_row(), 1..20)) {
        let raw = canonical_table(rows);
        let schema = SourceSchema::builtin("canonical").unwrap();
        let normalized = normalize(&raw, &schema).unwrap();
        prop_assert_eq!(normalized.fields(), &CANONICAL_COLUMNS[..]);
        prop_assert_eq!(normalized.row_count(), raw.row_count());
        for col in raw.columns() {
            let field: Field = col.name.parse().unwrap();
            prop_assert_eq!(normalized.column(field).unwrap(), &col.values[..]);
        }
    }

    /// Every row encoded as part of a table encodes to the same vector when
    /// sent alone as a prediction request.
    #[test]
    fn table_and_request_encodings_agree(rows in prop::collection::vec(arb_canonical_row(), 2..12)) {
        let raw = canonical_table(rows.clone());
        let schema = SourceSchema::builtin("canonical").unwrap();
        let batch = heartline_pipeline::ingest_training(&schema, &raw).unwrap();
        let records: Vec<_> = batch.rows.iter().map(|r| r.record).collect();
        let guard = ConsistencyGuard::fit(schema, &records).unwrap();
        let encoded = guard.apply_table(&raw).unwrap();
        prop_assert_eq!(encoded.rows.len(), rows.len());

        for (row, values) in encoded.rows.iter().zip(&rows) {
            let request: RawRecord = FEATURES
                .iter()
                .zip(values)
                .map(|(f, v)| (f.name(), v.as_str()))
                .collect();
            let single = guard.apply_record("prop", &request).unwrap();
            prop_assert_eq!(&single.features, &row.features);
        }
    }
}
