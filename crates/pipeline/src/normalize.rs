//! Schema normalizer: raw source columns → canonical fields in canonical order.

use std::collections::BTreeMap;

use log::debug;

use crate::config::SourceSchema;
use crate::error::PipelineError;
use crate::field::{Field, CANONICAL_COLUMNS};
use crate::table::{Cell, RawTable};

/// Where a normalized column's values came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnOrigin {
    /// Renamed from this (whitespace-trimmed) source column.
    Source(String),
    /// Synthesized from the schema's default.
    Default(f64),
}

/// A table whose columns are exactly the canonical fields, in canonical
/// order. `target` is present only when the source carried a label column.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    fields: Vec<Field>,
    columns: Vec<Vec<Cell>>,
    origins: Vec<ColumnOrigin>,
    rows: usize,
}

impl NormalizedTable {
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Feature columns, i.e. every field except `target`.
    pub fn feature_fields(&self) -> Vec<Field> {
        self.fields.iter().copied().filter(|f| *f != Field::Target).collect()
    }

    pub fn has_target(&self) -> bool {
        self.fields.contains(&Field::Target)
    }

    pub fn column(&self, field: Field) -> Option<&[Cell]> {
        let pos = self.fields.iter().position(|f| *f == field)?;
        Some(&self.columns[pos])
    }

    pub fn origin(&self, field: Field) -> Option<&ColumnOrigin> {
        let pos = self.fields.iter().position(|f| *f == field)?;
        Some(&self.origins[pos])
    }

    pub fn cell(&self, row: usize, field: Field) -> Option<&Cell> {
        self.column(field).and_then(|col| col.get(row))
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }
}

/// Normalize `table` under `schema`:
///
/// 1. strip whitespace from column names;
/// 2. rename per the schema (case-insensitive; canonical names map to themselves);
/// 3. translate textual categories through the schema's value maps;
/// 4. synthesize default columns for canonical fields the source lacks;
/// 5. order columns canonically.
///
/// Fails if two source columns land on the same field, or a feature is
/// absent with no default. The input table is not modified.
pub fn normalize(table: &RawTable, schema: &SourceSchema) -> Result<NormalizedTable, PipelineError> {
    let mut resolved: BTreeMap<Field, (String, Vec<Cell>)> = BTreeMap::new();

    for col in table.columns() {
        let name = col.name.trim();
        let Some(field) = schema.resolve_column(name) else {
            debug!("schema '{}': dropping unmapped column '{name}'", schema.name());
            continue;
        };

        if let Some((previous, _)) = resolved.get(&field) {
            return Err(PipelineError::schema(
                name,
                format!("both '{previous}' and '{name}' map to canonical field '{field}'"),
            ));
        }

        let values = match schema.value_map(field) {
            Some(map) => col.values.iter().map(|cell| map_category(cell, map)).collect(),
            None => col.values.clone(),
        };
        resolved.insert(field, (name.to_string(), values));
    }

    let rows = table.row_count();
    let mut fields = Vec::with_capacity(CANONICAL_COLUMNS.len());
    let mut columns = Vec::with_capacity(CANONICAL_COLUMNS.len());
    let mut origins = Vec::with_capacity(CANONICAL_COLUMNS.len());

    for field in CANONICAL_COLUMNS {
        if let Some((source, values)) = resolved.remove(&field) {
            fields.push(field);
            columns.push(values);
            origins.push(ColumnOrigin::Source(source));
        } else if let Some(default) = schema.default_for(field) {
            debug!("schema '{}': synthesizing {field} = {default}", schema.name());
            fields.push(field);
            columns.push(vec![Cell::Number(default); rows]);
            origins.push(ColumnOrigin::Default(default));
        } else if field != Field::Target {
            return Err(PipelineError::schema(
                field.name(),
                format!(
                    "absent from source (schema '{}') and no default is configured",
                    schema.name()
                ),
            ));
        }
    }

    Ok(NormalizedTable {
        fields,
        columns,
        origins,
        rows,
    })
}

/// Exact match on the trimmed token first, then case-insensitive.
/// Cells with no mapping pass through for the repair engine to judge.
fn map_category(cell: &Cell, map: &BTreeMap<String, i64>) -> Cell {
    let Cell::Text(text) = cell else {
        return cell.clone();
    };
    let token = text.trim();
    let code = map.get(token).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(token))
            .map(|(_, v)| v)
    });
    match code {
        Some(code) => Cell::Number(*code as f64),
        None => cell.clone(),
    }
}
