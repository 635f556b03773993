//! Feature encoder: canonical record → numeric feature vector.
//!
//! Numeric fields are standardized with the mean and population standard
//! deviation seen at fit time. Categorical fields are one-hot encoded over
//! the code space the encoder was fitted with, in ascending code order.

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::RepairRules;
use crate::error::PipelineError;
use crate::field::{Field, FEATURES};
use crate::record::CanonicalRecord;

/// Legal codes of one categorical field, as fitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpace {
    pub field: Field,
    pub codes: Vec<i64>,
}

/// The encoder's input contract: which columns, in which order, and which
/// categorical codes each one-hot block covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderLayout {
    pub columns: Vec<Field>,
    pub categories: Vec<CategorySpace>,
}

impl EncoderLayout {
    /// Canonical feature order with the code spaces of `rules`.
    pub fn from_rules(rules: &RepairRules) -> Self {
        let categories = Field::categorical()
            .map(|field| CategorySpace {
                field,
                codes: rules
                    .legal(field)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            columns: FEATURES.to_vec(),
            categories,
        }
    }

    pub fn codes(&self, field: Field) -> Option<&[i64]> {
        self.categories
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.codes.as_slice())
    }

    /// Width of the encoded vector.
    pub fn output_width(&self) -> usize {
        self.columns
            .iter()
            .map(|f| if f.is_categorical() { self.codes(*f).map_or(0, <[i64]>::len) } else { 1 })
            .sum()
    }

    /// Output column names: `age`, `cp_1`, `cp_2`, ...
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.output_width());
        for field in &self.columns {
            match self.codes(*field) {
                Some(codes) if field.is_categorical() => {
                    names.extend(codes.iter().map(|c| format!("{field}_{c}")));
                }
                _ => names.push(field.name().to_string()),
            }
        }
        names
    }
}

/// A fitted transformation from canonical records to feature vectors.
pub trait FeatureEncoder: Send + Sync {
    fn layout(&self) -> &EncoderLayout;

    fn transform(&self, record: &CanonicalRecord) -> Result<Vec<f64>, PipelineError>;

    /// Stable digest of the fitted state; two encoders with equal
    /// fingerprints produce equal vectors.
    fn fingerprint(&self) -> String;
}

/// Per-numeric-column standardization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub field: Field,
    pub mean: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedEncoder {
    layout: EncoderLayout,
    scalers: Vec<Scaler>,
}

impl FittedEncoder {
    /// Fit scaling parameters on `records`. The code spaces come from the
    /// layout, not from the data, so a code that happens to be absent from
    /// the training rows still gets its one-hot column.
    pub fn fit(layout: EncoderLayout, records: &[CanonicalRecord]) -> Result<Self, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::Label {
                at: None,
                reason: "no labeled rows left to fit the encoder on".into(),
            });
        }
        let n = records.len() as f64;
        let scalers = layout
            .columns
            .iter()
            .filter(|f| f.is_numeric())
            .map(|&field| {
                let mean = records.iter().map(|r| r.value(field)).sum::<f64>() / n;
                let var = records
                    .iter()
                    .map(|r| (r.value(field) - mean).powi(2))
                    .sum::<f64>()
                    / n;
                let std = var.sqrt();
                let scale = if std > f64::EPSILON { std } else { 1.0 };
                debug!("encoder: {field} mean={mean:.3} scale={scale:.3}");
                Scaler { field, mean, scale }
            })
            .collect();
        Ok(Self { layout, scalers })
    }

    pub fn scalers(&self) -> &[Scaler] {
        &self.scalers
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.layout.feature_names()
    }

    pub fn output_width(&self) -> usize {
        self.layout.output_width()
    }

    fn scaler(&self, field: Field) -> Option<&Scaler> {
        self.scalers.iter().find(|s| s.field == field)
    }
}

impl FeatureEncoder for FittedEncoder {
    fn layout(&self) -> &EncoderLayout {
        &self.layout
    }

    fn transform(&self, record: &CanonicalRecord) -> Result<Vec<f64>, PipelineError> {
        let mut out = Vec::with_capacity(self.output_width());
        for &field in &self.layout.columns {
            if field.is_categorical() {
                let codes = self.layout.codes(field).ok_or_else(|| {
                    PipelineError::mismatch("encoder layout", format!("code space for '{field}'"), "none")
                })?;
                let code = record.code(field).unwrap_or_default();
                if !codes.contains(&code) {
                    return Err(PipelineError::mismatch(
                        format!("encoder code space for '{field}'"),
                        format!("{codes:?}"),
                        code,
                    ));
                }
                out.extend(codes.iter().map(|c| if *c == code { 1.0 } else { 0.0 }));
            } else {
                let scaler = self.scaler(field).ok_or_else(|| {
                    PipelineError::mismatch("encoder layout", format!("scaler for '{field}'"), "none")
                })?;
                out.push((record.value(field) - scaler.mean) / scaler.scale);
            }
        }
        Ok(out)
    }

    fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("sha256:{:x}", Sha256::digest(&bytes))
    }
}
