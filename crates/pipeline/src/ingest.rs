//! Training-time ingestion: raw source table → labeled canonical batch.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::SourceSchema;
use crate::error::PipelineError;
use crate::field::Field;
use crate::normalize::normalize;
use crate::repair::{count_by_class, count_by_field, repair_table};
use crate::table::RawTable;
use crate::target::{binarize_batch, LabeledBatch};

/// Normalize, repair and binarize a labeled source table.
///
/// The table must carry a label column. Rows with missing or
/// out-of-distribution values are dropped and listed in the batch.
pub fn ingest_training(schema: &SourceSchema, table: &RawTable) -> Result<LabeledBatch, PipelineError> {
    let normalized = normalize(table, schema)?;
    if !normalized.has_target() {
        return Err(PipelineError::Label {
            at: None,
            reason: format!("schema '{}' found no target column in the source", schema.name()),
        });
    }
    let repaired = repair_table(&normalized, schema.repair())?;
    binarize_batch(repaired, schema.repair().missing_tokens())
}

/// What ingestion did to a source table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessReport {
    pub schema: String,
    pub input_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
    pub dropped_by_class: BTreeMap<&'static str, usize>,
    pub repairs_by_field: BTreeMap<Field, usize>,
    /// `[negatives, positives]` among kept rows.
    pub class_counts: [usize; 2],
}

impl PreprocessReport {
    pub fn new(schema: &SourceSchema, batch: &LabeledBatch) -> Self {
        Self {
            schema: schema.name().to_string(),
            input_rows: batch.input_rows,
            kept_rows: batch.rows.len(),
            dropped_rows: batch.dropped.len(),
            dropped_by_class: count_by_class(&batch.dropped),
            repairs_by_field: count_by_field(&batch.repairs),
            class_counts: batch.class_counts(),
        }
    }
}
