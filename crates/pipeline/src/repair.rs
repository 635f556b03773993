//! Categorical repair engine and numeric coercion.
//!
//! Turns a normalized row into a [`CanonicalRecord`]: numeric fields are
//! coerced (placeholders and out-of-domain values become missing), and
//! categorical codes are checked against the schema's legal sets, with remap
//! rules applied to known-bad codes. Every rewrite is logged as a [`Repair`].

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::RepairRules;
use crate::error::{PipelineError, RecordRef};
use crate::field::{Field, FieldKind, FEATURES};
use crate::normalize::NormalizedTable;
use crate::record::CanonicalRecord;
use crate::table::Cell;

/// One applied remap rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repair {
    pub at: RecordRef,
    pub field: Field,
    pub from: i64,
    pub to: i64,
}

/// A row that passed repair, with its still-raw label cell (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedRow {
    pub at: RecordRef,
    pub record: CanonicalRecord,
    pub label: Option<Cell>,
}

/// Outcome of repairing a whole table: surviving rows, the repair log and
/// the per-row errors of dropped rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairedBatch {
    pub input_rows: usize,
    /// Whether the source table had a label column at all.
    pub has_label: bool,
    pub rows: Vec<RepairedRow>,
    pub repairs: Vec<Repair>,
    pub dropped: Vec<PipelineError>,
}

/// Error counts keyed by error class.
pub fn count_by_class(errors: &[PipelineError]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for err in errors {
        *counts.entry(err.class()).or_insert(0) += 1;
    }
    counts
}

/// Applied-repair counts keyed by field.
pub fn count_by_field(repairs: &[Repair]) -> BTreeMap<Field, usize> {
    let mut counts = BTreeMap::new();
    for r in repairs {
        *counts.entry(r.field).or_insert(0) += 1;
    }
    counts
}

/// Validate a categorical cell. Legal codes come back unchanged; illegal
/// codes with a remap rule come back rewritten together with the repair.
pub fn repair_categorical(
    at: &RecordRef,
    field: Field,
    cell: &Cell,
    rules: &RepairRules,
) -> Result<(i64, Option<Repair>), PipelineError> {
    if cell.is_placeholder(rules.missing_tokens()) {
        return Err(missing(at, field, cell));
    }
    let Some(code) = cell.as_integer() else {
        return Err(out_of_distribution(at, field, cell));
    };
    if rules.is_legal(field, code) {
        return Ok((code, None));
    }
    match rules.remap_for(field, code) {
        Some(to) => {
            let repair = Repair {
                at: at.clone(),
                field,
                from: code,
                to,
            };
            debug!("{at}: repaired {field} {code} -> {to}");
            Ok((to, Some(repair)))
        }
        None => Err(out_of_distribution(at, field, cell)),
    }
}

/// Coerce a numeric cell. Placeholders, unparseable text and values outside
/// the field's domain are all "missing".
pub fn coerce_numeric(
    at: &RecordRef,
    field: Field,
    cell: &Cell,
    rules: &RepairRules,
) -> Result<f64, PipelineError> {
    if cell.is_placeholder(rules.missing_tokens()) {
        return Err(missing(at, field, cell));
    }
    let in_domain = match field.kind() {
        FieldKind::PositiveInt => cell.as_integer().filter(|v| *v > 0).map(|v| v as f64),
        FieldKind::NonNegativeFloat => cell.as_number().filter(|v| *v >= 0.0),
        FieldKind::Categorical | FieldKind::Label => None,
    };
    in_domain.ok_or_else(|| missing(at, field, cell))
}

/// Repair one row of a normalized table.
pub fn repair_row(
    at: RecordRef,
    table: &NormalizedTable,
    row: usize,
    rules: &RepairRules,
) -> Result<(CanonicalRecord, Vec<Repair>), PipelineError> {
    let mut values = [0.0f64; FEATURES.len()];
    let mut repairs = Vec::new();

    for (slot, field) in values.iter_mut().zip(FEATURES) {
        let cell = table.cell(row, field).ok_or_else(|| {
            PipelineError::schema(field.name(), "not present in normalized table")
        })?;
        *slot = if field.is_categorical() {
            let (code, repair) = repair_categorical(&at, field, cell, rules)?;
            repairs.extend(repair);
            code as f64
        } else {
            coerce_numeric(&at, field, cell, rules)?
        };
    }

    let code = |f: Field| values[f.index()] as i64;
    let record = CanonicalRecord {
        age: code(Field::Age),
        sex: code(Field::Sex),
        cp: code(Field::Cp),
        trestbps: code(Field::Trestbps),
        chol: code(Field::Chol),
        fbs: code(Field::Fbs),
        restecg: code(Field::Restecg),
        thalach: code(Field::Thalach),
        exang: code(Field::Exang),
        oldpeak: values[Field::Oldpeak.index()],
        slope: code(Field::Slope),
        ca: code(Field::Ca),
        thal: code(Field::Thal),
    };
    Ok((record, repairs))
}

/// Repair every row. Rows failing with a per-row error are dropped and kept
/// in `dropped`; structural errors abort the batch.
pub fn repair_table(table: &NormalizedTable, rules: &RepairRules) -> Result<RepairedBatch, PipelineError> {
    let mut batch = RepairedBatch {
        input_rows: table.row_count(),
        has_label: table.has_target(),
        ..RepairedBatch::default()
    };
    let labels = table.column(Field::Target);

    for row in 0..table.row_count() {
        match repair_row(RecordRef::Row(row), table, row, rules) {
            Ok((record, repairs)) => {
                batch.repairs.extend(repairs);
                batch.rows.push(RepairedRow {
                    at: RecordRef::Row(row),
                    record,
                    label: labels.map(|col| col[row].clone()),
                });
            }
            Err(err) if err.is_row_recoverable() => {
                warn!("dropping {err}");
                batch.dropped.push(err);
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        "repair: {} rows in, {} kept, {} dropped, {} repairs",
        batch.input_rows,
        batch.rows.len(),
        batch.dropped.len(),
        batch.repairs.len()
    );
    Ok(batch)
}

/// Repair a single-row table for a prediction request. Any error is fatal.
pub fn repair_record(
    request: RecordRef,
    table: &NormalizedTable,
    rules: &RepairRules,
) -> Result<(CanonicalRecord, Vec<Repair>), PipelineError> {
    if table.row_count() != 1 {
        return Err(PipelineError::schema(
            "*",
            format!("{request}: expected exactly one row, got {}", table.row_count()),
        ));
    }
    repair_row(request, table, 0, rules)
}

fn raw_text(cell: &Cell) -> String {
    match cell {
        Cell::Missing => "null".to_string(),
        other => other.to_string(),
    }
}

fn missing(at: &RecordRef, field: Field, cell: &Cell) -> PipelineError {
    PipelineError::MissingValue {
        at: at.clone(),
        field,
        raw: raw_text(cell),
    }
}

fn out_of_distribution(at: &RecordRef, field: Field, cell: &Cell) -> PipelineError {
    PipelineError::OutOfDistribution {
        at: at.clone(),
        field,
        value: raw_text(cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceSchema;
    use crate::normalize::normalize;
    use crate::table::RawRecord;

    fn scenario_row() -> RawRecord {
        RawRecord::new()
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
            .with("slope", 0i64)
            .with("ca", 0i64)
            .with("thal", 0i64)
    }

    fn repair_with(rules: RepairRules, raw: &RawRecord) -> Result<(CanonicalRecord, Vec<Repair>), PipelineError> {
        let schema = SourceSchema::canonical_with(rules).unwrap();
        let table = normalize(&raw.to_table(), &schema).unwrap();
        repair_record(RecordRef::Request("t".into()), &table, schema.repair())
    }

    #[test]
    fn zero_slope_without_remap_is_out_of_distribution() {
        let err = repair_with(RepairRules::canonical(), &scenario_row()).unwrap_err();
        match err {
            PipelineError::OutOfDistribution { field, value, at } => {
                assert_eq!(field, Field::Slope);
                assert_eq!(value, "0");
                assert_eq!(at, RecordRef::Request("t".into()));
            }
            other => panic!("expected out-of-distribution, got {other:?}"),
        }
    }

    #[test]
    fn zero_slope_and_thal_with_remap_are_repaired() {
        let rules = RepairRules::canonical()
            .with_remap(Field::Slope, 0, 1)
            .with_remap(Field::Thal, 0, 3);
        let (record, repairs) = repair_with(rules, &scenario_row()).unwrap();
        assert_eq!(record.slope, 1);
        assert_eq!(record.thal, 3);
        assert_eq!(record.age, 18);
        assert_eq!(repairs.len(), 2);
        assert_eq!(repairs[0].field, Field::Slope);
        assert_eq!((repairs[0].from, repairs[0].to), (0, 1));
        assert_eq!(repairs[1].field, Field::Thal);
        assert_eq!((repairs[1].from, repairs[1].to), (0, 3));
    }

    #[test]
    fn textual_category_is_out_of_distribution() {
        let raw = scenario_row().with("slope", "Up").with("thal", 3i64);
        let err = repair_with(RepairRules::canonical(), &raw).unwrap_err();
        assert!(matches!(err, PipelineError::OutOfDistribution { field: Field::Slope, ref value, .. } if value == "Up"));
    }

    #[test]
    fn placeholder_numeric_is_missing() {
        let raw = scenario_row().with("slope", 1i64).with("thal", 3i64).with("chol", "?");
        let err = repair_with(RepairRules::canonical(), &raw).unwrap_err();
        assert!(matches!(err, PipelineError::MissingValue { field: Field::Chol, ref raw, .. } if raw == "?"));
    }

    #[test]
    fn zero_cholesterol_is_missing() {
        let raw = scenario_row().with("slope", 1i64).with("thal", 3i64).with("chol", "0");
        let err = repair_with(RepairRules::canonical(), &raw).unwrap_err();
        assert!(matches!(err, PipelineError::MissingValue { field: Field::Chol, .. }));
    }

    #[test]
    fn negative_oldpeak_is_missing() {
        let raw = scenario_row().with("slope", 1i64).with("thal", 3i64).with("oldpeak", -0.5);
        let err = repair_with(RepairRules::canonical(), &raw).unwrap_err();
        assert!(matches!(err, PipelineError::MissingValue { field: Field::Oldpeak, .. }));
    }

    #[test]
    fn placeholder_categorical_is_missing() {
        let raw = scenario_row().with("slope", 1i64).with("thal", "?");
        let err = repair_with(RepairRules::canonical(), &raw).unwrap_err();
        assert!(matches!(err, PipelineError::MissingValue { field: Field::Thal, .. }));
    }

    #[test]
    fn float_codes_are_accepted() {
        // UCI processed files write ca / thal as "0.0" / "6.0".
        let raw = scenario_row().with("slope", "2.0").with("thal", "6.0").with("ca", "1.0");
        let (record, repairs) = repair_with(RepairRules::canonical(), &raw).unwrap();
        assert_eq!((record.slope, record.thal, record.ca), (2, 6, 1));
        assert!(repairs.is_empty());
    }

    #[test]
    fn table_drops_bad_rows_and_keeps_labels() {
        let schema = SourceSchema::builtin("canonical").unwrap();
        let headers: Vec<String> = crate::field::CANONICAL_COLUMNS.iter().map(|f| f.name().to_string()).collect();
        let rows = vec![
            "63,1,1,145,233,1,2,150,0,2.3,3,0,6,0",
            "67,1,4,160,286,0,2,108,1,1.5,2,3,3,2",
            "67,1,4,120,229,0,2,129,1,2.6,2,2,7,1",
            "53,1,3,130,246,1,2,173,0,0.0,1,?,3,0",
            "52,1,3,172,199,1,0,162,0,0.5,1,0,0,0",
        ];
        let rows = rows
            .iter()
            .map(|r| r.split(',').map(Cell::from).collect())
            .collect();
        let raw = crate::table::RawTable::from_rows(headers, rows).unwrap();
        let table = normalize(&raw, &schema).unwrap();
        let batch = repair_table(&table, schema.repair()).unwrap();

        assert_eq!(batch.input_rows, 5);
        assert_eq!(batch.rows.len(), 3);
        assert_eq!(batch.dropped.len(), 2);
        assert_eq!(count_by_class(&batch.dropped).get("missing_value"), Some(&1));
        assert_eq!(count_by_class(&batch.dropped).get("out_of_distribution"), Some(&1));
        assert_eq!(batch.rows[1].label, Some(Cell::from("2")));
        assert_eq!(batch.rows[2].at, RecordRef::Row(2));
    }
}
