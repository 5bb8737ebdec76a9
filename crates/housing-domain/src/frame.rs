//! Column-oriented in-memory table used between pipeline stages.
//!
//! A [`Frame`] is deliberately small: named columns of dynamically typed
//! [`Cell`]s with a fixed row count. Readers and writers of the on-disk
//! snapshot formats live in the persistence crate; the statistics code only
//! ever pulls typed vectors out through [`Frame::column_f64`] and
//! [`Frame::column_text`].

use crate::error::{DomainError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// CELL
// =============================================================================

/// A single value in a [`Frame`]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the cell. Text is parsed leniently (surrounding
    /// whitespace ignored) since CBS payloads occasionally quote numbers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) if f.is_nan() => None,
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Owned textual form, `None` for null.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Convert a JSON scalar into a cell. Nested values are kept as their
    /// JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::from))
                .unwrap_or(Self::Null),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Self::Null
        } else {
            Self::Float(value)
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// FRAME
// =============================================================================

/// Named columns of equal length
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Vec<Cell>>,
    height: usize,
}

impl Frame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty frame with the given column names and no rows.
    #[must_use]
    pub fn with_columns<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let columns = vec![Vec::new(); names.len()];
        Self {
            names,
            columns,
            height: 0,
        }
    }

    /// Build a frame from `(name, values)` pairs. All columns must have the
    /// same length.
    pub fn from_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, Vec<Cell>)>,
    ) -> Result<Self> {
        let mut frame = Self::new();
        for (name, values) in columns {
            frame.set_column(name, values)?;
        }
        Ok(frame)
    }

    /// Build a frame from JSON row objects. Column order follows first
    /// appearance; keys missing from a row become nulls.
    pub fn from_json_rows(rows: &[Value]) -> Result<Self> {
        let mut frame = Self::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for row in rows {
            let Value::Object(object) = row else {
                return Err(DomainError::NotAnObject(row.to_string()));
            };
            for (key, value) in object {
                let position = match index.get(key) {
                    Some(&position) => position,
                    None => {
                        let position = frame.names.len();
                        frame.names.push(key.clone());
                        frame.columns.push(vec![Cell::Null; frame.height]);
                        index.insert(key.clone(), position);
                        position
                    }
                };
                frame.columns[position].push(Cell::from_json(value));
            }
            frame.height += 1;
            for column in &mut frame.columns {
                if column.len() < frame.height {
                    column.push(Cell::Null);
                }
            }
        }

        Ok(frame)
    }

    /// Build a frame from serializable records, one row per record, columns in
    /// field declaration order.
    pub fn from_records<T: Serialize>(records: &[T]) -> Result<Self> {
        let rows = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_json_rows(&rows)
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.height == 0
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    /// Fail with the full list of available columns when any required column
    /// is absent.
    pub fn require(&self, required: &[&str], dataset: &str) -> Result<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| (*c).to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(DomainError::MissingColumns {
            dataset: dataset.to_string(),
            missing,
            available: self.names.clone(),
        })
    }

    #[must_use]
    pub fn column_f64(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name)
            .map(|cells| cells.iter().map(Cell::as_f64).collect())
    }

    #[must_use]
    pub fn column_text(&self, name: &str) -> Option<Vec<Option<String>>> {
        self.column(name)
            .map(|cells| cells.iter().map(Cell::to_text).collect())
    }

    #[must_use]
    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        self.column(name).and_then(|cells| cells.get(row))
    }

    /// Insert or replace a column. The first column of an empty frame sets
    /// the row count.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<Cell>) -> Result<()> {
        let name = name.into();
        if self.names.is_empty() {
            self.height = values.len();
        } else if values.len() != self.height {
            return Err(DomainError::RaggedColumn {
                column: name,
                expected: self.height,
                found: values.len(),
            });
        }
        match self.position(&name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Vec<Cell>> {
        let i = self.position(name)?;
        self.names.remove(i);
        let values = self.columns.remove(i);
        if self.names.is_empty() {
            self.height = 0;
        }
        Some(values)
    }

    /// Rename columns in place; pairs naming an absent column are ignored.
    pub fn rename_columns(&mut self, mapping: &[(&str, &str)]) {
        for (from, to) in mapping {
            if let Some(i) = self.position(from) {
                self.names[i] = (*to).to_string();
            }
        }
    }

    /// Append one row. Cells are matched to columns by position.
    pub fn push_row(&mut self, cells: Vec<Cell>) -> Result<()> {
        if cells.len() != self.names.len() {
            return Err(DomainError::RaggedColumn {
                column: format!("row {}", self.height),
                expected: self.names.len(),
                found: cells.len(),
            });
        }
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.push(cell);
        }
        self.height += 1;
        Ok(())
    }

    /// Iterate rows as cell references in column order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        (0..self.height).map(move |r| self.columns.iter().map(|c| &c[r]).collect())
    }

    /// Append the rows of `other`. Columns are matched by name; columns
    /// present on only one side are filled with nulls.
    #[must_use]
    pub fn vstack(mut self, other: Self) -> Self {
        if self.names.is_empty() {
            return other;
        }
        for name in &other.names {
            if !self.has_column(name) {
                self.names.push(name.clone());
                self.columns.push(vec![Cell::Null; self.height]);
            }
        }
        for (i, name) in self.names.iter().enumerate() {
            match other.position(name) {
                Some(j) => self.columns[i].extend(other.columns[j].iter().cloned()),
                None => self.columns[i].extend(std::iter::repeat_n(Cell::Null, other.height)),
            }
        }
        self.height += other.height;
        self
    }

    /// Null count per column, in column order.
    #[must_use]
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(name, cells)| (name.clone(), cells.iter().filter(|c| c.is_null()).count()))
            .collect()
    }

    /// Share of null cells across the whole frame, 0.0 for an empty frame.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn null_fraction(&self) -> f64 {
        let total = self.height * self.names.len();
        if total == 0 {
            return 0.0;
        }
        let nulls: usize = self.null_counts().iter().map(|(_, n)| n).sum();
        nulls as f64 / total as f64
    }
}
