//! Remote CSV sources.

use heartline_io::source::table_from_bytes;
use heartline_io::{IoError, RawSource, SourceTable};
use heartline_pipeline::SourceSchema;
use log::info;

use super::common::FetchClient;

/// A CSV document behind a URL, read under a fixed schema.
pub(crate) struct HttpSource<'a> {
    name: String,
    url: String,
    schema: SourceSchema,
    client: &'a FetchClient,
}

impl<'a> HttpSource<'a> {
    pub(crate) fn new(name: impl Into<String>, url: impl Into<String>, schema: SourceSchema, client: &'a FetchClient) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            schema,
            client,
        }
    }
}

impl RawSource for HttpSource<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<SourceTable, IoError> {
        let bytes = self.client.get_bytes(&self.url).map_err(|reason| IoError::SourceUnavailable {
            name: self.name.clone(),
            reason: format!("{}: {reason}", self.url),
        })?;
        let table = table_from_bytes(&self.name, bytes, &self.schema)?;
        info!("{}: downloaded {} rows from {}", self.name, table.row_count(), self.url);
        Ok(SourceTable {
            name: self.name.clone(),
            schema: self.schema.clone(),
            table,
        })
    }
}
