//! Serializable forms of the fitted pipeline and the trained classifier.
//!
//! Both documents are plain serde structs; where and how they are stored is
//! up to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{LogisticRegression, TrainParams, TrainReport};
use crate::config::{SchemaSpec, SourceSchema};
use crate::encoder::FittedEncoder;
use crate::error::PipelineError;
use crate::evaluate::EvaluationMetrics;
use crate::guard::ConsistencyGuard;

pub const FORMAT_VERSION: u32 = 1;

/// Schema document + fitted encoder, identified by the pipeline fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub schema: SchemaSpec,
    pub encoder: FittedEncoder,
    pub fingerprint: String,
}

impl PipelineArtifact {
    pub fn from_guard(guard: &ConsistencyGuard<FittedEncoder>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            schema: guard.schema().spec().clone(),
            encoder: guard.encoder().clone(),
            fingerprint: guard.fingerprint().to_string(),
        }
    }

    /// Rebuild the guard. The recomputed fingerprint must match the stored
    /// one, so an edited schema or encoder is caught here.
    pub fn into_guard(self) -> Result<ConsistencyGuard<FittedEncoder>, PipelineError> {
        check_format("pipeline artifact", self.format_version)?;
        let schema = SourceSchema::from_spec(self.schema)?;
        let guard = ConsistencyGuard::new(schema, self.encoder)?;
        if guard.fingerprint() != self.fingerprint {
            return Err(PipelineError::mismatch(
                "pipeline artifact fingerprint",
                self.fingerprint,
                guard.fingerprint(),
            ));
        }
        Ok(guard)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub format_version: u32,
    /// Fingerprint of the pipeline whose vectors the model was trained on.
    pub pipeline_fingerprint: String,
    pub kind: String,
    pub feature_names: Vec<String>,
    pub model: LogisticRegression,
    pub trained_at: DateTime<Utc>,
    pub params: TrainParams,
    pub report: TrainReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EvaluationMetrics>,
}

impl ClassifierArtifact {
    pub const KIND: &'static str = "logistic_regression";

    pub fn new(
        guard: &ConsistencyGuard<FittedEncoder>,
        model: LogisticRegression,
        params: TrainParams,
        report: TrainReport,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            pipeline_fingerprint: guard.fingerprint().to_string(),
            kind: Self::KIND.to_string(),
            feature_names: guard.encoder().feature_names(),
            model,
            trained_at: Utc::now(),
            params,
            report,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: EvaluationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Format and kind checks that do not need the pipeline.
    pub fn check(&self) -> Result<(), PipelineError> {
        check_format("classifier artifact", self.format_version)?;
        if self.kind != Self::KIND {
            return Err(PipelineError::mismatch("classifier kind", Self::KIND, &self.kind));
        }
        if self.feature_names.len() != self.model.weights.len() {
            return Err(PipelineError::mismatch(
                "classifier weight count",
                self.feature_names.len(),
                self.model.weights.len(),
            ));
        }
        Ok(())
    }
}

fn check_format(what: &str, found: u32) -> Result<(), PipelineError> {
    if found == FORMAT_VERSION {
        Ok(())
    } else {
        Err(PipelineError::mismatch(format!("{what} format version"), FORMAT_VERSION, found))
    }
}
