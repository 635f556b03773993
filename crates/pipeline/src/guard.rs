//! Consistency guard: the one pipeline definition used at training and at
//! prediction time.
//!
//! A guard owns a validated [`SourceSchema`] (rename map, value maps,
//! defaults, repair rules) and a fitted [`FeatureEncoder`]. Every input,
//! whether a training table or a single request, goes through the same
//! normalize → repair → (binarize) → encode sequence.

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::config::SourceSchema;
use crate::encoder::{EncoderLayout, FeatureEncoder, FittedEncoder};
use crate::error::{PipelineError, RecordRef};
use crate::field::{Field, FEATURES};
use crate::normalize::normalize;
use crate::record::CanonicalRecord;
use crate::repair::{repair_record, repair_table, Repair};
use crate::table::{RawRecord, RawTable};
use crate::target::binarize_batch;

pub enum PipelineInput<'a> {
    /// One prediction request.
    Record { id: &'a str, record: &'a RawRecord },
    /// A training or scoring table.
    Table(&'a RawTable),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub at: RecordRef,
    pub record: CanonicalRecord,
    pub features: Vec<f64>,
    pub target: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedBatch {
    pub input_rows: usize,
    pub rows: Vec<EncodedRow>,
    pub repairs: Vec<Repair>,
    pub dropped: Vec<PipelineError>,
}

impl EncodedBatch {
    /// Rows that carry a label, as `(features, target)` pairs.
    pub fn labeled(&self) -> Vec<(&[f64], u8)> {
        self.rows
            .iter()
            .filter_map(|r| r.target.map(|t| (r.features.as_slice(), t)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub request: RecordRef,
    pub record: CanonicalRecord,
    pub features: Vec<f64>,
    pub repairs: Vec<Repair>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    Record(EncodedRecord),
    Batch(EncodedBatch),
}

#[derive(Debug, Clone)]
pub struct ConsistencyGuard<E = FittedEncoder> {
    schema: SourceSchema,
    encoder: E,
    fingerprint: String,
}

impl ConsistencyGuard<FittedEncoder> {
    /// Fit an encoder on already-repaired training records and bind it to
    /// `schema`.
    pub fn fit(schema: SourceSchema, records: &[CanonicalRecord]) -> Result<Self, PipelineError> {
        let layout = EncoderLayout::from_rules(schema.repair());
        let encoder = FittedEncoder::fit(layout, records)?;
        info!(
            "fitted encoder on {} rows under schema '{}' ({} output columns)",
            records.len(),
            schema.name(),
            encoder.output_width()
        );
        Self::new(schema, encoder)
    }
}

impl<E: FeatureEncoder> ConsistencyGuard<E> {
    /// Bind an encoder to a schema. The encoder must have been fitted on the
    /// canonical feature order and on exactly the schema's categorical code
    /// space.
    pub fn new(schema: SourceSchema, encoder: E) -> Result<Self, PipelineError> {
        check_layout(&schema, encoder.layout())?;
        let fingerprint = pipeline_fingerprint(&schema, &encoder);
        Ok(Self {
            schema,
            encoder,
            fingerprint,
        })
    }

    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// `sha256:<hex>` identifying schema, repair rules and fitted encoder
    /// together. Classifier artifacts record the fingerprint they were
    /// trained against.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Fail unless a classifier was trained against this exact pipeline.
    pub fn check_classifier(&self, trained_against: &str) -> Result<(), PipelineError> {
        if trained_against == self.fingerprint {
            Ok(())
        } else {
            Err(PipelineError::mismatch(
                "classifier pipeline fingerprint",
                &self.fingerprint,
                trained_against,
            ))
        }
    }

    pub fn apply(&self, input: PipelineInput<'_>) -> Result<PipelineOutput, PipelineError> {
        match input {
            PipelineInput::Record { id, record } => self.apply_record(id, record).map(PipelineOutput::Record),
            PipelineInput::Table(table) => self.apply_table(table).map(PipelineOutput::Batch),
        }
    }

    /// Encode one prediction request. Any data error is fatal; a `target`
    /// entry in the request is ignored.
    pub fn apply_record(&self, id: &str, record: &RawRecord) -> Result<EncodedRecord, PipelineError> {
        let request = RecordRef::Request(id.to_string());
        let normalized = normalize(&record.to_table(), &self.schema)?;
        if normalized.has_target() {
            debug!("{request}: ignoring target value in prediction request");
        }
        let (canonical, repairs) = repair_record(request.clone(), &normalized, self.schema.repair())?;
        let features = self.encoder.transform(&canonical)?;
        Ok(EncodedRecord {
            request,
            record: canonical,
            features,
            repairs,
        })
    }

    /// Encode a table. Rows with data errors are dropped and listed; a label
    /// column, when present, is binarized.
    pub fn apply_table(&self, table: &RawTable) -> Result<EncodedBatch, PipelineError> {
        let normalized = normalize(table, &self.schema)?;
        let repaired = repair_table(&normalized, self.schema.repair())?;

        let mut batch = EncodedBatch {
            input_rows: repaired.input_rows,
            ..EncodedBatch::default()
        };

        if normalized.has_target() {
            let labeled = binarize_batch(repaired, self.schema.repair().missing_tokens())?;
            batch.repairs = labeled.repairs;
            batch.dropped = labeled.dropped;
            for row in labeled.rows {
                let features = self.encoder.transform(&row.record)?;
                batch.rows.push(EncodedRow {
                    at: row.at,
                    record: row.record,
                    features,
                    target: Some(row.target),
                });
            }
        } else {
            batch.repairs = repaired.repairs;
            batch.dropped = repaired.dropped;
            for row in repaired.rows {
                let features = self.encoder.transform(&row.record)?;
                batch.rows.push(EncodedRow {
                    at: row.at,
                    record: row.record,
                    features,
                    target: None,
                });
            }
        }
        Ok(batch)
    }
}

fn check_layout(schema: &SourceSchema, layout: &EncoderLayout) -> Result<(), PipelineError> {
    if layout.columns != FEATURES {
        return Err(PipelineError::mismatch(
            "encoder column order",
            join(&FEATURES),
            join(&layout.columns),
        ));
    }
    for field in Field::categorical() {
        let expected: Vec<i64> = schema
            .repair()
            .legal(field)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        let found = layout.codes(field).unwrap_or_default();
        if found != expected.as_slice() {
            return Err(PipelineError::mismatch(
                format!("encoder code space for '{field}'"),
                format!("{expected:?}"),
                format!("{found:?}"),
            ));
        }
    }
    Ok(())
}

fn pipeline_fingerprint<E: FeatureEncoder>(schema: &SourceSchema, encoder: &E) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema.fingerprint().as_bytes());
    hasher.update(b"\n");
    hasher.update(encoder.fingerprint().as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

fn join(fields: &[Field]) -> String {
    fields.iter().map(|f| f.name()).collect::<Vec<_>>().join(",")
}
