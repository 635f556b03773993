use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::field::Field;

/// Where a failing value came from: a row of a batch or a prediction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordRef {
    /// Zero-based data row index in the source table (header excluded).
    Row(usize),
    /// Caller-supplied request identifier.
    Request(String),
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(i) => write!(f, "row {i}"),
            Self::Request(id) => write!(f, "request '{id}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// TOML parse / deserialization error in a schema document.
    #[error("schema config parse error: {0}")]
    ConfigParse(String),

    /// Schema document parsed but is inconsistent (unknown field, illegal remap target, ...).
    #[error("schema config validation error: {0}")]
    ConfigValidation(String),

    /// Structural problem with the source table.
    #[error("schema error: column '{column}': {reason}")]
    Schema { column: String, reason: String },

    /// Categorical value outside the legal set with no remap rule.
    #[error("{at}: field '{field}' has out-of-distribution value '{value}'")]
    OutOfDistribution {
        at: RecordRef,
        field: Field,
        value: String,
    },

    /// Numeric value absent, a placeholder, or outside the field's domain.
    #[error("{at}: field '{field}' has no usable value (raw '{raw}')")]
    MissingValue { at: RecordRef, field: Field, raw: String },

    /// Label column missing or holding non-label values.
    #[error("label error{}: {reason}", .at.as_ref().map(|a| format!(" at {a}")).unwrap_or_default())]
    Label { at: Option<RecordRef>, reason: String },

    /// Encoder / classifier contract differs from what the pipeline feeds it.
    #[error("schema version mismatch in {what}: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        what: String,
        expected: String,
        found: String,
    },
}

impl PipelineError {
    /// Per-row data errors: a batch drops the row and counts it, a single
    /// prediction request fails.
    pub fn is_row_recoverable(&self) -> bool {
        matches!(self, Self::OutOfDistribution { .. } | Self::MissingValue { .. })
    }

    pub fn schema(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn mismatch(
        what: impl Into<String>,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        Self::SchemaVersionMismatch {
            what: what.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Short stable name of the error class, used in reports.
    pub fn class(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) | Self::ConfigValidation(_) => "config",
            Self::Schema { .. } => "schema",
            Self::OutOfDistribution { .. } => "out_of_distribution",
            Self::MissingValue { .. } => "missing_value",
            Self::Label { .. } => "label",
            Self::SchemaVersionMismatch { .. } => "schema_version_mismatch",
        }
    }
}
