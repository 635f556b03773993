// Raw data sources

use std::path::{Path, PathBuf};

use heartline_pipeline::{RawTable, SourceSchema};
use log::info;

use crate::csv::{decode, parse_table, read_file_as_utf8};
use crate::error::IoError;

/// A table fetched from somewhere, with the schema it should be read under.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub name: String,
    pub schema: SourceSchema,
    pub table: RawTable,
}

/// Anything that can produce a raw table. Every retrieval failure is a
/// single [`IoError::SourceUnavailable`].
pub trait RawSource {
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<SourceTable, IoError>;
}

/// A source file on local disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    schema: SourceSchema,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, schema: SourceSchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawSource for FileSource {
    fn name(&self) -> &str {
        self.path.to_str().unwrap_or("<file>")
    }

    fn fetch(&self) -> Result<SourceTable, IoError> {
        let unavailable = |reason: String| IoError::SourceUnavailable {
            name: self.path.display().to_string(),
            reason,
        };
        let content = read_file_as_utf8(&self.path).map_err(|e| unavailable(e.to_string()))?;
        let table = parse_table(&content, &self.path.display().to_string(), &self.schema)
            .map_err(|e| unavailable(e.to_string()))?;
        info!(
            "{}: {} rows under schema '{}'",
            self.path.display(),
            table.row_count(),
            self.schema.name()
        );
        Ok(SourceTable {
            name: self.path.display().to_string(),
            schema: self.schema.clone(),
            table,
        })
    }
}

/// Parse fetched bytes (any origin) under `schema`.
pub fn table_from_bytes(name: &str, bytes: Vec<u8>, schema: &SourceSchema) -> Result<RawTable, IoError> {
    parse_table(&decode(bytes), name, schema).map_err(|e| IoError::SourceUnavailable {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
