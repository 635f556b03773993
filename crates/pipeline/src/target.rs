//! Target binarizer: severity grades 0..=4 collapse to "no disease" / "disease".

use log::{info, warn};

use crate::error::{PipelineError, RecordRef};
use crate::field::Field;
use crate::normalize::NormalizedTable;
use crate::record::{CanonicalRecord, LabeledRecord};
use crate::repair::{RepairedBatch, Repair};
use crate::table::Cell;

/// 0 stays 0, any other grade becomes 1.
pub fn binarize(grade: i64) -> u8 {
    u8::from(grade != 0)
}

/// Binarize one label cell.
///
/// A missing-value token is a per-row [`PipelineError::MissingValue`] on
/// `target`; anything that is not a non-negative integer grade is a
/// [`PipelineError::Label`].
pub fn binarize_cell(at: &RecordRef, cell: &Cell, missing_tokens: &[String]) -> Result<u8, PipelineError> {
    if cell.is_placeholder(missing_tokens) {
        return Err(PipelineError::MissingValue {
            at: at.clone(),
            field: Field::Target,
            raw: cell.to_string(),
        });
    }
    match cell.as_integer() {
        Some(grade) if grade >= 0 => Ok(binarize(grade)),
        _ => Err(PipelineError::Label {
            at: Some(at.clone()),
            reason: format!("'{cell}' is not a severity grade"),
        }),
    }
}

/// Binarize the whole label column of a normalized table. Rows whose label
/// is a placeholder come back as `None`.
pub fn binarize_column(table: &NormalizedTable, missing_tokens: &[String]) -> Result<Vec<Option<u8>>, PipelineError> {
    let column = table.column(Field::Target).ok_or_else(|| PipelineError::Label {
        at: None,
        reason: "source has no target column".into(),
    })?;
    column
        .iter()
        .enumerate()
        .map(|(row, cell)| match binarize_cell(&RecordRef::Row(row), cell, missing_tokens) {
            Ok(label) => Ok(Some(label)),
            Err(err) if err.is_row_recoverable() => Ok(None),
            Err(err) => Err(err),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub at: RecordRef,
    pub record: CanonicalRecord,
    pub target: u8,
}

impl LabeledRow {
    pub fn labeled(&self) -> LabeledRecord {
        LabeledRecord {
            record: self.record,
            target: self.target,
        }
    }
}

/// A repaired batch whose surviving rows all carry a binary label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledBatch {
    pub input_rows: usize,
    pub rows: Vec<LabeledRow>,
    pub repairs: Vec<Repair>,
    pub dropped: Vec<PipelineError>,
}

impl LabeledBatch {
    /// `[negatives, positives]`.
    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.rows.iter().filter(|r| r.target == 1).count();
        [self.rows.len() - positives, positives]
    }

    pub fn records(&self) -> Vec<LabeledRecord> {
        self.rows.iter().map(LabeledRow::labeled).collect()
    }
}

/// Attach binary labels to a repaired batch. Placeholder labels drop the
/// row; a malformed label (or no label column at all) fails the batch.
pub fn binarize_batch(batch: RepairedBatch, missing_tokens: &[String]) -> Result<LabeledBatch, PipelineError> {
    let RepairedBatch {
        input_rows,
        has_label,
        rows,
        repairs,
        mut dropped,
    } = batch;
    if !has_label {
        return Err(no_target_column());
    }

    let mut labeled = Vec::with_capacity(rows.len());
    for row in rows {
        let cell = row.label.ok_or_else(no_target_column)?;
        match binarize_cell(&row.at, &cell, missing_tokens) {
            Ok(target) => labeled.push(LabeledRow {
                at: row.at,
                record: row.record,
                target,
            }),
            Err(err) if err.is_row_recoverable() => {
                warn!("dropping {err}");
                dropped.push(err);
            }
            Err(err) => return Err(err),
        }
    }

    let out = LabeledBatch {
        input_rows,
        rows: labeled,
        repairs,
        dropped,
    };
    let [neg, pos] = out.class_counts();
    info!("labels: {neg} negative, {pos} positive");
    Ok(out)
}

fn no_target_column() -> PipelineError {
    PipelineError::Label {
        at: None,
        reason: "source has no target column".into(),
    }
}
