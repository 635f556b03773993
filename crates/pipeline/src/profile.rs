//! Dataset inspection: shape, missing values, per-column statistics,
//! categorical value counts, duplicates and class balance.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::SourceSchema;
use crate::field::{Field, FieldKind};
use crate::table::RawTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub missing: usize,
    /// Cells with a finite numeric reading.
    pub numeric: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    /// Value counts, kept for columns the schema maps to a categorical or
    /// label field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
    pub duplicate_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_balance: Option<BTreeMap<String, usize>>,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }
}

/// Row-count comparison against an earlier version of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub previous_rows: usize,
    pub current_rows: usize,
    pub increase: i64,
    /// `current / previous`; absent when the previous dataset was empty.
    pub multiplier: Option<f64>,
}

/// Profile a raw table. Column names are resolved through `schema`, so a
/// source's own label column (e.g. `HeartDisease`) yields the class balance.
pub fn profile(table: &RawTable, schema: &SourceSchema) -> DatasetProfile {
    let missing_tokens = schema.repair().missing_tokens();
    let mut label_column = None;
    let columns: Vec<ColumnProfile> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let name = col.name.trim().to_string();
            let field = schema.resolve_column(&name);
            if field == Some(Field::Target) && label_column.is_none() {
                label_column = Some(i);
            }
            let keep_counts = field.is_some_and(|f| matches!(f.kind(), FieldKind::Categorical | FieldKind::Label));

            let mut missing = 0;
            let mut values = Vec::new();
            let mut counts = BTreeMap::new();
            for cell in &col.values {
                if cell.is_placeholder(missing_tokens) {
                    missing += 1;
                    continue;
                }
                if let Some(n) = cell.as_number() {
                    values.push(n);
                }
                if keep_counts {
                    *counts.entry(cell.to_string().trim().to_string()).or_insert(0) += 1;
                }
            }

            let (min, max, mean) = if values.is_empty() {
                (None, None, None)
            } else {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                (Some(min), Some(max), Some(mean))
            };

            ColumnProfile {
                name,
                missing,
                numeric: values.len(),
                min,
                max,
                mean,
                counts: keep_counts.then_some(counts),
            }
        })
        .collect();

    let class_balance = label_column.and_then(|i| columns[i].counts.clone());

    DatasetProfile {
        rows: table.row_count(),
        duplicate_rows: count_duplicates(table),
        columns,
        class_balance,
    }
}

impl Comparison {
    pub fn between(previous_rows: usize, current_rows: usize) -> Self {
        Self {
            previous_rows,
            current_rows,
            increase: current_rows as i64 - previous_rows as i64,
            multiplier: (previous_rows > 0).then(|| current_rows as f64 / previous_rows as f64),
        }
    }
}

pub fn compare(previous: &DatasetProfile, current: &DatasetProfile) -> Comparison {
    Comparison::between(previous.rows, current.rows)
}

fn count_duplicates(table: &RawTable) -> usize {
    let mut seen = HashSet::new();
    (0..table.row_count())
        .filter(|&row| {
            let key: Vec<String> = table
                .columns()
                .iter()
                .map(|c| c.values[row].to_string().trim().to_string())
                .collect();
            !seen.insert(key)
        })
        .count()
}
