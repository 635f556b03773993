use std::path::PathBuf;

use heartline_pipeline::PipelineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV (unbalanced quotes, bad UTF-8 after decoding, ...).
    #[error("csv error in {origin}: {reason}")]
    Csv { origin: String, reason: String },

    /// Malformed prediction request.
    #[error("invalid request: {0}")]
    Request(String),

    /// Missing, unreadable or inconsistent artifact file.
    #[error("artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    /// A raw data source could not produce a table.
    #[error("source '{name}' unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IoError {
    pub fn csv(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::Csv {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
