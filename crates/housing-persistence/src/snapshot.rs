//! Tabular snapshot files (CSV and Parquet) backed by an in-memory DuckDB.
//!
//! Frames are staged into a temporary DuckDB table and exported with
//! `COPY ... TO`; reading goes through `read_csv_auto` / `read_parquet`.

use crate::error::{PersistenceError, Result};
use duckdb::types::Value;
use duckdb::{params_from_iter, Connection};
use housing_domain::{Cell, Frame};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Rows per multi-row INSERT when staging a frame.
const INSERT_CHUNK_ROWS: usize = 256;

/// On-disk encoding of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    Csv,
    Parquet,
}

impl SnapshotFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }

    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Snapshot directory layout rooted at the data directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub const RAW_DIR: &'static str = "raw";
    pub const PROCESSED_DIR: &'static str = "processed";

    /// Open a store, creating `raw/` and `processed/` when missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(Self::RAW_DIR))?;
        fs::create_dir_all(root.join(Self::PROCESSED_DIR))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Write `frame` once per format as `<stem>.<ext>`. Returns the written
    /// paths relative to the store root.
    pub fn write(
        &self,
        stem: &Path,
        frame: &Frame,
        formats: &[SnapshotFormat],
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(formats.len());
        for &format in formats {
            let relative = stem.with_extension(format.extension());
            write_frame(&self.resolve(&relative), frame, format)?;
            written.push(relative);
        }
        Ok(written)
    }

    /// Write a single file, format taken from the extension.
    pub fn write_file(&self, relative: &Path, frame: &Frame) -> Result<()> {
        let format = SnapshotFormat::from_path(relative)
            .ok_or_else(|| PersistenceError::UnsupportedFormat(relative.to_path_buf()))?;
        write_frame(&self.resolve(relative), frame, format)
    }

    pub fn read(&self, relative: &Path) -> Result<Frame> {
        read_frame(&self.resolve(relative))
    }
}

// =============================================================================
// CODEC
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SqlType {
    Boolean,
    BigInt,
    Double,
    Varchar,
}

impl SqlType {
    const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::BigInt => "BIGINT",
            Self::Double => "DOUBLE",
            Self::Varchar => "VARCHAR",
        }
    }

    fn infer(cells: &[Cell]) -> Self {
        let mut ty: Option<Self> = None;
        for cell in cells {
            let cell_ty = match cell {
                Cell::Null => continue,
                Cell::Bool(_) => Self::Boolean,
                Cell::Int(_) => Self::BigInt,
                Cell::Float(_) => Self::Double,
                Cell::Text(_) => return Self::Varchar,
            };
            ty = Some(match (ty, cell_ty) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(Self::BigInt | Self::Double), Self::BigInt | Self::Double) => Self::Double,
                _ => return Self::Varchar,
            });
        }
        ty.unwrap_or(Self::Varchar)
    }

    fn value(self, cell: &Cell) -> Value {
        let value = match self {
            Self::Boolean => match cell {
                Cell::Bool(b) => Some(Value::Boolean(*b)),
                _ => None,
            },
            Self::BigInt => cell.as_i64().map(Value::BigInt),
            Self::Double => cell.as_f64().map(Value::Double),
            Self::Varchar => cell.to_text().map(Value::Text),
        };
        value.unwrap_or(Value::Null)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_path(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

/// Export `frame` to `path`. A frame without columns produces an empty file.
pub fn write_frame(path: &Path, frame: &Frame, format: SnapshotFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if frame.width() == 0 {
        fs::write(path, b"")?;
        return Ok(());
    }

    let conn = Connection::open_in_memory()?;
    let types: Vec<SqlType> = frame
        .column_names()
        .iter()
        .map(|name| frame.column(name).map_or(SqlType::Varchar, SqlType::infer))
        .collect();

    let definition = frame
        .column_names()
        .iter()
        .zip(&types)
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.name()))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!("CREATE TABLE snapshot ({definition})"))?;

    let rows: Vec<Vec<&Cell>> = frame.rows().collect();
    conn.execute_batch("BEGIN TRANSACTION")?;
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let placeholders = format!("({})", vec!["?"; types.len()].join(", "));
        let sql = format!(
            "INSERT INTO snapshot VALUES {}",
            vec![placeholders; chunk.len()].join(", ")
        );
        let values: Vec<Value> = chunk
            .iter()
            .flat_map(|row| row.iter().zip(&types).map(|(cell, ty)| ty.value(cell)))
            .collect();
        conn.execute(&sql, params_from_iter(values.iter()))?;
    }
    conn.execute_batch("COMMIT")?;

    let options = match format {
        SnapshotFormat::Csv => "(HEADER, DELIMITER ',')",
        SnapshotFormat::Parquet => "(FORMAT PARQUET)",
    };
    conn.execute_batch(&format!("COPY snapshot TO {} {options}", quote_path(path)))?;

    tracing::debug!(path = %path.display(), rows = frame.height(), "snapshot written");
    Ok(())
}

/// Load a snapshot, format taken from the extension. An empty file reads as
/// an empty frame.
pub fn read_frame(path: &Path) -> Result<Frame> {
    let format = SnapshotFormat::from_path(path)
        .ok_or_else(|| PersistenceError::UnsupportedFormat(path.to_path_buf()))?;
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PersistenceError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    if metadata.len() == 0 {
        return Ok(Frame::new());
    }

    let source = match format {
        SnapshotFormat::Csv => format!("read_csv_auto({}, header = true)", quote_path(path)),
        SnapshotFormat::Parquet => format!("read_parquet({})", quote_path(path)),
    };

    let conn = Connection::open_in_memory()?;
    let names: Vec<String> = {
        let mut stmt = conn.prepare(&format!("DESCRIBE SELECT * FROM {source}"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<std::result::Result<_, _>>()?
    };

    let width = names.len();
    let mut frame = Frame::with_columns(names);
    let mut stmt = conn.prepare(&format!("SELECT * FROM {source}"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let cells = (0..width)
            .map(|i| row.get::<_, Value>(i).map(cell_from_value))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        frame.push_row(cells)?;
    }

    tracing::debug!(path = %path.display(), rows = frame.height(), "snapshot read");
    Ok(frame)
}

#[allow(clippy::cast_precision_loss)]
fn cell_from_value(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Boolean(b) => Cell::Bool(b),
        Value::TinyInt(i) => Cell::Int(i64::from(i)),
        Value::SmallInt(i) => Cell::Int(i64::from(i)),
        Value::Int(i) => Cell::Int(i64::from(i)),
        Value::BigInt(i) => Cell::Int(i),
        Value::UTinyInt(i) => Cell::Int(i64::from(i)),
        Value::USmallInt(i) => Cell::Int(i64::from(i)),
        Value::UInt(i) => Cell::Int(i64::from(i)),
        Value::UBigInt(i) => i64::try_from(i).map_or(Cell::Float(i as f64), Cell::Int),
        Value::HugeInt(i) => i64::try_from(i).map_or(Cell::Float(i as f64), Cell::Int),
        Value::Float(f) => Cell::from(f64::from(f)),
        Value::Double(f) => Cell::from(f),
        Value::Decimal(d) => d.to_string().parse::<f64>().map_or(Cell::Null, Cell::from),
        Value::Text(s) => Cell::Text(s),
        other => Cell::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Frame {
        Frame::from_columns([
            ("Regiokenmerken", vec![Cell::from("NL01"), Cell::from("PV20")]),
            ("Perioden", vec![Cell::from("2019KW01"), Cell::from("2019KW02")]),
            ("Jaar", vec![Cell::Int(2019), Cell::Int(2019)]),
            ("Doorlooptijd_Mediaan", vec![Cell::Float(14.5), Cell::Null]),
            ("Mixed", vec![Cell::Int(3), Cell::Float(2.5)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_csv_and_parquet_preserve_values() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let written = store
            .write(
                Path::new("raw/fact_sample"),
                &sample(),
                &[SnapshotFormat::Csv, SnapshotFormat::Parquet],
            )
            .unwrap();
        assert_eq!(written.len(), 2);

        for relative in &written {
            let frame = store.read(relative).unwrap();
            assert_eq!(frame.height(), 2);
            assert_eq!(frame.column_names(), sample().column_names());
            assert_eq!(frame.cell(1, "Regiokenmerken"), Some(&Cell::from("PV20")));
            assert_eq!(frame.cell(0, "Jaar").and_then(Cell::as_i64), Some(2019));
            assert_eq!(frame.cell(0, "Doorlooptijd_Mediaan").and_then(Cell::as_f64), Some(14.5));
            assert!(frame.cell(1, "Doorlooptijd_Mediaan").unwrap().is_null());
            assert_eq!(frame.cell(1, "Mixed").and_then(Cell::as_f64), Some(2.5));
        }
    }

    #[test]
    fn test_empty_frame_round_trips_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dim_empty.csv");
        write_frame(&path, &Frame::new(), SnapshotFormat::Csv).unwrap();
        assert!(read_frame(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_frame(&dir.path().join("absent.parquet")).unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
    }

    #[test]
    fn test_path_with_quote() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("o'brien.csv");
        write_frame(&path, &sample(), SnapshotFormat::Csv).unwrap();
        assert_eq!(read_frame(&path).unwrap().height(), 2);
    }

    #[test]
    fn test_infer_types() {
        assert_eq!(SqlType::infer(&[Cell::Null, Cell::Int(1)]), SqlType::BigInt);
        assert_eq!(SqlType::infer(&[Cell::Int(1), Cell::Float(1.5)]), SqlType::Double);
        assert_eq!(SqlType::infer(&[Cell::Int(1), Cell::from("x")]), SqlType::Varchar);
        assert_eq!(SqlType::infer(&[Cell::Null]), SqlType::Varchar);
    }
}
