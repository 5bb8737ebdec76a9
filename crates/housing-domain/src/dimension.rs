//! Code-to-label lookup tables.

use crate::frame::{Cell, Frame};
use std::collections::HashMap;

/// A dimension table reduced to its `key -> title` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionTable {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl DimensionTable {
    #[must_use]
    pub fn new(name: impl Into<String>, entries: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            entries: entries
                .into_iter()
                .map(|(k, t)| (k.trim().to_string(), t))
                .collect(),
        }
    }

    /// Read `Key`/`Title` columns (any case). Rows without a key are skipped;
    /// a frame lacking either column yields an empty table.
    #[must_use]
    pub fn from_frame(name: impl Into<String>, frame: &Frame) -> Self {
        let find = |wanted: &str| {
            frame
                .column_names()
                .iter()
                .find(|c| c.eq_ignore_ascii_case(wanted))
                .and_then(|c| frame.column(c))
        };
        let (Some(keys), Some(titles)) = (find("key"), find("title")) else {
            return Self::new(name, Vec::new());
        };

        let entries = keys
            .iter()
            .zip(titles)
            .filter_map(|(k, t)| {
                let key = k.to_text()?;
                Some((key, t.to_text().unwrap_or_default()))
            })
            .collect();
        Self::new(name, entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Lookup keyed by trimmed code. Later duplicates win.
    #[must_use]
    pub fn lookup(&self) -> HashMap<&str, &str> {
        self.entries
            .iter()
            .map(|(k, t)| (k.as_str(), t.as_str()))
            .collect()
    }

    /// Resolve each code of `codes` to its title; unmatched or null codes
    /// become null.
    #[must_use]
    pub fn resolve(&self, codes: &[Cell]) -> Vec<Cell> {
        let lookup = self.lookup();
        codes
            .iter()
            .map(|code| {
                code.to_text()
                    .and_then(|c| lookup.get(c.trim()).map(|t| Cell::from(t.trim())))
                    .unwrap_or(Cell::Null)
            })
            .collect()
    }
}
