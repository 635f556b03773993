//! Loosely-typed input tables, exactly as a source delivered them.

use std::fmt;

use crate::error::PipelineError;

/// One raw value. CSV sources only ever produce `Text`; JSON requests may
/// carry numbers and explicit nulls.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    /// True when the cell holds no usable value: an explicit null, a NaN,
    /// or a text token listed in `tokens` (compared after trimming).
    pub fn is_placeholder(&self, tokens: &[String]) -> bool {
        match self {
            Self::Missing => true,
            Self::Number(n) => n.is_nan(),
            Self::Text(s) => {
                let t = s.trim();
                tokens.iter().any(|tok| tok.trim() == t)
            }
        }
    }

    /// Finite numeric reading of the cell, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Missing => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Integer reading; `"3.0"` is 3, `"2.5"` is not an integer.
    pub fn as_integer(&self) -> Option<i64> {
        let n = self.as_number()?;
        (n.fract() == 0.0 && n.abs() < i64::MAX as f64).then_some(n as i64)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Missing => Ok(()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<Cell>,
}

/// Column-oriented raw table. Column names are kept verbatim (whitespace
/// included); the normalizer is responsible for cleaning them up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<RawColumn>,
    rows: usize,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from row-major data. Short rows are padded with `Cell::Missing`;
    /// rows longer than the header are a schema error.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, PipelineError> {
        let width = headers.len();
        let mut columns: Vec<RawColumn> = headers
            .into_iter()
            .map(|name| RawColumn {
                name,
                values: Vec::with_capacity(rows.len()),
            })
            .collect();

        let row_count = rows.len();
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(PipelineError::schema(
                    format!("#{}", row.len()),
                    format!("row {i} has {} fields but the header has {width}", row.len()),
                ));
            }
            let mut cells = row.into_iter();
            for col in columns.iter_mut() {
                col.values.push(cells.next().unwrap_or(Cell::Missing));
            }
        }

        Ok(Self {
            columns,
            rows: row_count,
        })
    }

    /// Append a column. The first column fixes the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Cell>) -> Result<(), PipelineError> {
        let name = name.into();
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(PipelineError::schema(
                name,
                format!("has {} values, table has {} rows", values.len(), self.rows),
            ));
        }
        self.rows = values.len();
        self.columns.push(RawColumn { name, values });
        Ok(())
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// A single raw observation (one prediction request), in field order as given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    entries: Vec<(String, Cell)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing an earlier entry with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Cell>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn entries(&self) -> &[(String, Cell)] {
        &self.entries
    }

    /// One-row table with the record's entries as columns.
    pub fn to_table(&self) -> RawTable {
        let columns = self
            .entries
            .iter()
            .map(|(name, cell)| RawColumn {
                name: name.clone(),
                values: vec![cell.clone()],
            })
            .collect();
        RawTable { columns, rows: 1 }
    }
}

impl<K: Into<String>, V: Into<Cell>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}
