//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                     |
//! |------|-------------------------------------------------------------|
//! | 0    | Success                                                     |
//! | 1    | General error (unspecified)                                 |
//! | 2    | Usage error (bad args, missing input file)                  |
//! | 3    | Invalid configuration (settings file or schema document)    |
//! | 4    | Source table does not fit its schema                        |
//! | 5    | Categorical value outside the legal set, no remap rule      |
//! | 6    | Required value missing or outside its domain                |
//! | 7    | Label column missing or malformed                           |
//! | 8    | Pipeline/classifier version or fingerprint mismatch         |
//! | 9    | Artifact missing, unreadable or inconsistent                |
//! | 10   | Every dataset source failed                                 |
//! | 11   | Filesystem or CSV I/O failure                               |
//! | 12   | Malformed prediction request                                |

use heartline_config::ConfigError;
use heartline_io::IoError;
use heartline_pipeline::PipelineError;

pub const EXIT_SUCCESS: u8 = 0;

/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

pub const EXIT_USAGE: u8 = 2;

pub const EXIT_CONFIG: u8 = 3;

pub const EXIT_SCHEMA: u8 = 4;

pub const EXIT_OUT_OF_DISTRIBUTION: u8 = 5;

pub const EXIT_MISSING_VALUE: u8 = 6;

pub const EXIT_LABEL: u8 = 7;

pub const EXIT_VERSION_MISMATCH: u8 = 8;

pub const EXIT_ARTIFACT: u8 = 9;

pub const EXIT_SOURCE_UNAVAILABLE: u8 = 10;

pub const EXIT_IO: u8 = 11;

pub const EXIT_REQUEST: u8 = 12;

pub fn pipeline_exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::ConfigParse(_) | PipelineError::ConfigValidation(_) => EXIT_CONFIG,
        PipelineError::Schema { .. } => EXIT_SCHEMA,
        PipelineError::OutOfDistribution { .. } => EXIT_OUT_OF_DISTRIBUTION,
        PipelineError::MissingValue { .. } => EXIT_MISSING_VALUE,
        PipelineError::Label { .. } => EXIT_LABEL,
        PipelineError::SchemaVersionMismatch { .. } => EXIT_VERSION_MISMATCH,
    }
}

pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Read { .. } | IoError::Write { .. } | IoError::Csv { .. } => EXIT_IO,
        IoError::Request(_) => EXIT_REQUEST,
        IoError::Artifact { .. } => EXIT_ARTIFACT,
        IoError::SourceUnavailable { .. } => EXIT_SOURCE_UNAVAILABLE,
        IoError::Pipeline(e) => pipeline_exit_code(e),
    }
}

pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Read { .. } => EXIT_USAGE,
        ConfigError::Write { .. } => EXIT_IO,
        ConfigError::Parse { .. } | ConfigError::Invalid(_) => EXIT_CONFIG,
    }
}
