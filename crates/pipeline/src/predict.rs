//! Single-record prediction through a guard and a classifier.

use log::info;
use serde::Serialize;

use crate::classifier::Classifier;
use crate::encoder::FeatureEncoder;
use crate::error::PipelineError;
use crate::guard::ConsistencyGuard;
use crate::record::CanonicalRecord;
use crate::repair::Repair;
use crate::table::RawRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub request_id: String,
    pub label: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<[f64; 2]>,
    /// The record as the classifier saw it, after repair.
    pub record: CanonicalRecord,
    pub repairs: Vec<Repair>,
}

/// A guard paired with a classifier that was trained on its vectors.
pub struct Predictor<E, C> {
    guard: ConsistencyGuard<E>,
    classifier: C,
}

impl<E: FeatureEncoder, C: Classifier> Predictor<E, C> {
    /// Pair a guard with a classifier trained against `trained_against`.
    /// Fails on a fingerprint or feature-width mismatch.
    pub fn new(guard: ConsistencyGuard<E>, classifier: C, trained_against: &str) -> Result<Self, PipelineError> {
        guard.check_classifier(trained_against)?;
        let width = guard.encoder().layout().output_width();
        if let Some(expected) = classifier.input_width() {
            if expected != width {
                return Err(PipelineError::mismatch("classifier input width", expected, width));
            }
        }
        Ok(Self { guard, classifier })
    }

    pub fn guard(&self) -> &ConsistencyGuard<E> {
        &self.guard
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn predict_one(&self, request_id: &str, record: &RawRecord) -> Result<Prediction, PipelineError> {
        predict_one(&self.guard, &self.classifier, request_id, record)
    }
}

/// Run one request through `guard` and `classifier`. Any data error in the
/// request is returned, never silently patched.
pub fn predict_one<E: FeatureEncoder, C: Classifier + ?Sized>(
    guard: &ConsistencyGuard<E>,
    classifier: &C,
    request_id: &str,
    record: &RawRecord,
) -> Result<Prediction, PipelineError> {
    let encoded = guard.apply_record(request_id, record)?;
    let label = classifier.predict(&encoded.features);
    let probabilities = classifier.predict_probability(&encoded.features);
    info!(
        "{}: label={label}{}",
        encoded.request,
        if encoded.repairs.is_empty() {
            String::new()
        } else {
            format!(" after {} repair(s)", encoded.repairs.len())
        }
    );
    Ok(Prediction {
        request_id: request_id.to_string(),
        label,
        probabilities,
        record: encoded.record,
        repairs: encoded.repairs,
    })
}
