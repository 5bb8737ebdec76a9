//! Star-schema load into a DuckDB database file.
//!
//! Every load is a full replace: the versioned DDL drops and recreates all
//! tables, dimensions and facts are inserted, and the indexes are built last.
//! All of it runs in one transaction, so a failed load leaves the previous
//! database untouched.

use crate::error::{AnalyticsError, Result};
use crate::transform::preferred_file;
use duckdb::types::Value;
use duckdb::{params_from_iter, Connection};
use housing_domain::{Cell, DimensionTable, Frame, PeriodCode};
use housing_persistence::{Manifest, ManifestStore, SnapshotStore};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const TABLES_DDL: &str = "01_create_tables.sql";
pub const INDEXES_DDL: &str = "02_create_indexes.sql";

const DOORLOOPTIJDEN_COLUMNS: &[(&str, &str)] = &[
    ("ID", "id"),
    ("Regiokenmerken", "regiokenmerk_code"),
    ("Gebruiksfunctie", "gebruiksfunctie_code"),
    ("Woningtype", "woningtype_code"),
    ("Perioden", "periode_code"),
    ("Jaar", "jaar"),
    ("Kwartaal", "kwartaal"),
    ("Doorlooptijd_Mediaan", "doorlooptijd_mediaan"),
    ("Doorlooptijd_Gemiddelde", "doorlooptijd_gemiddelde"),
    ("Doorlooptijd_P10", "doorlooptijd_p10"),
    ("Doorlooptijd_P25", "doorlooptijd_p25"),
    ("Doorlooptijd_P75", "doorlooptijd_p75"),
    ("Doorlooptijd_P90", "doorlooptijd_p90"),
    ("Doorlooptijd_IQR", "doorlooptijd_iqr"),
    ("Doorlooptijd_P10_P90_Range", "doorlooptijd_p10_p90_range"),
    ("Doorlooptijd_CV", "doorlooptijd_cv"),
    ("Nieuwbouw_Aantal", "nieuwbouw_aantal"),
    ("Hoge_Variabiliteit", "hoge_variabiliteit"),
];

const PIJPLIJN_COLUMNS: &[(&str, &str)] = &[
    ("ID", "id"),
    ("RegioS", "regio_code"),
    ("Gebruiksfunctie", "gebruiksfunctie_code"),
    ("Perioden", "periode_code"),
    ("Jaar", "jaar"),
    ("Maand", "maand"),
    ("Pijplijn_Totaal", "pijplijn_totaal"),
    ("Pijplijn_BouwGestart", "pijplijn_bouw_gestart"),
    ("Pijplijn_Vergunning", "pijplijn_vergunning"),
    ("Pijplijn_Vast_2Jaar", "pijplijn_vast_2jaar"),
    ("Pijplijn_BouwGestart_2Jaar", "pijplijn_bouw_gestart_2jaar"),
    ("Pijplijn_Vergunning_2Jaar", "pijplijn_vergunning_2jaar"),
    ("Pijplijn_Vast_5Jaar", "pijplijn_vast_5jaar"),
    ("Bottleneck_2Jaar_Pct", "bottleneck_2jaar_pct"),
    ("Bottleneck_5Jaar_Pct", "bottleneck_5jaar_pct"),
    ("Vergunning_Bottleneck_Pct", "vergunning_bottleneck_pct"),
    ("Bouw_Bottleneck_Pct", "bouw_bottleneck_pct"),
    ("Vergunning_Fase_Pct", "vergunning_fase_pct"),
    ("Bouw_Fase_Pct", "bouw_fase_pct"),
    ("Crisis_Regio", "crisis_regio"),
];

/// Rows bound for one table
#[derive(Debug)]
struct Staged {
    table: &'static str,
    columns: Vec<&'static str>,
    rows: Vec<Vec<Value>>,
}

/// Row count per loaded table, in load order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub db_path: PathBuf,
    pub tables: Vec<(String, usize)>,
}

impl LoadSummary {
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|(t, _)| t == table).map(|(_, n)| *n)
    }
}

pub struct SqlLoader<'a> {
    store: &'a SnapshotStore,
    manifest: &'a ManifestStore,
    schema_dir: PathBuf,
}

impl<'a> SqlLoader<'a> {
    pub fn new(store: &'a SnapshotStore, manifest: &'a ManifestStore, schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            manifest,
            schema_dir: schema_dir.into(),
        }
    }

    /// Replace the star schema in `db_path` with the current processed
    /// snapshots and the dimension snapshots of their extractions.
    pub fn load(&self, db_path: &Path) -> Result<LoadSummary> {
        let tables_sql = self.read_ddl(TABLES_DDL)?;
        let indexes_sql = self.read_ddl(INDEXES_DDL)?;

        let manifest = self.manifest.load()?;
        let mut staged = self.stage_dimensions(&manifest)?;
        staged.push(self.stage_fact("doorlooptijden", "fact_doorlooptijden", DOORLOOPTIJDEN_COLUMNS)?);
        staged.push(self.stage_fact("woningen_pijplijn", "fact_woningen_pijplijn", PIJPLIJN_COLUMNS)?);

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        tracing::info!(path = %db_path.display(), "loading star schema");

        let mut conn = Connection::open(db_path)?;
        let tx = conn.transaction()?;
        tx.execute_batch(&tables_sql)?;

        let mut summary = LoadSummary {
            db_path: db_path.to_path_buf(),
            tables: Vec::with_capacity(staged.len()),
        };
        for table in &staged {
            let count = insert(&tx, table)?;
            tracing::info!(table = table.table, rows = count, "loaded table");
            summary.tables.push((table.table.to_string(), count));
        }

        tx.execute_batch(&indexes_sql)?;
        tx.commit()?;
        tracing::info!(path = %db_path.display(), tables = summary.tables.len(), "star schema loaded");
        Ok(summary)
    }

    fn read_ddl(&self, file: &str) -> Result<String> {
        let path = self.schema_dir.join(file);
        fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AnalyticsError::MissingInput(format!("schema file {}", path.display()))
            } else {
                e.into()
            }
        })
    }

    fn stage_fact(
        &self,
        dataset: &str,
        table: &'static str,
        mapping: &[(&str, &'static str)],
    ) -> Result<Staged> {
        let path = self.manifest.latest_processed(dataset).map_err(AnalyticsError::from_read)?;
        let frame = self.store.read(&path).map_err(AnalyticsError::from_read)?;

        let present: Vec<(&str, &'static str)> = mapping
            .iter()
            .copied()
            .filter(|(source, _)| frame.has_column(source))
            .collect();
        if present.len() < mapping.len() {
            let absent: Vec<&str> = mapping
                .iter()
                .filter(|(source, _)| !frame.has_column(source))
                .map(|(source, _)| *source)
                .collect();
            tracing::warn!(dataset, table, ?absent, "processed snapshot lacks columns, left null");
        }

        let columns: Vec<&[Cell]> = present
            .iter()
            .filter_map(|(source, _)| frame.column(source))
            .collect();
        let rows = (0..frame.height())
            .map(|row| columns.iter().map(|c| sql_value(&c[row])).collect())
            .collect();
        Ok(Staged {
            table,
            columns: present.into_iter().map(|(_, target)| target).collect(),
            rows,
        })
    }

    fn stage_dimensions(&self, manifest: &Manifest) -> Result<Vec<Staged>> {
        let regiokenmerken = self.dimension(manifest, "doorlooptijden", "Regiokenmerken")?;
        let regios = self.dimension(manifest, "woningen_pijplijn", "RegioS")?;
        let woningtype = self.dimension(manifest, "doorlooptijden", "Woningtype")?;
        let gebruiksfunctie = [
            self.dimension(manifest, "doorlooptijden", "Gebruiksfunctie")?,
            self.dimension(manifest, "woningen_pijplijn", "Gebruiksfunctie")?,
        ];
        let perioden = [
            self.dimension(manifest, "doorlooptijden", "Perioden")?,
            self.dimension(manifest, "woningen_pijplijn", "Perioden")?,
        ];

        Ok(vec![
            Staged {
                table: "dim_regiokenmerken",
                columns: vec!["code", "naam", "type"],
                rows: unique_entries(&[regiokenmerken])
                    .map(|(code, naam)| vec![text(code), text(naam), text("regio")])
                    .collect(),
            },
            Staged {
                table: "dim_regios",
                columns: vec!["code", "naam", "provincie"],
                rows: unique_entries(&[regios])
                    .map(|(code, naam)| vec![text(code), text(naam), Value::Null])
                    .collect(),
            },
            Staged {
                table: "dim_gebruiksfunctie",
                columns: vec!["code", "naam"],
                rows: unique_entries(&gebruiksfunctie)
                    .map(|(code, naam)| vec![text(code), text(naam)])
                    .collect(),
            },
            Staged {
                table: "dim_woningtype",
                columns: vec!["code", "naam"],
                rows: unique_entries(&[woningtype])
                    .map(|(code, naam)| vec![text(code), text(naam)])
                    .collect(),
            },
            Staged {
                table: "dim_perioden",
                columns: vec!["code", "naam", "jaar", "kwartaal", "maand"],
                rows: unique_entries(&perioden).map(period_row).collect(),
            },
        ])
    }

    /// The named dimension from the extraction the dataset's processed
    /// snapshot was built from; `None` with a warning when it was never
    /// extracted or its file is gone.
    fn dimension(&self, manifest: &Manifest, dataset: &str, name: &str) -> Result<Option<DimensionTable>> {
        let Some(file) = manifest
            .processed
            .get(dataset)
            .and_then(|processed| manifest.extraction(processed.extraction_id))
            .and_then(|e| e.dimension(dataset, name))
            .and_then(preferred_file)
        else {
            tracing::warn!(dataset, dimension = name, "no dimension snapshot, table left empty");
            return Ok(None);
        };
        match self.store.read(file).map_err(AnalyticsError::from_read) {
            Ok(frame) => Ok(Some(DimensionTable::from_frame(name, &frame))),
            Err(AnalyticsError::MissingInput(what)) => {
                tracing::warn!(dataset, dimension = name, missing = %what, "dimension snapshot missing on disk");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Entries of all given tables, first occurrence of each code wins.
fn unique_entries(tables: &[Option<DimensionTable>]) -> impl Iterator<Item = (&str, &str)> {
    let mut seen = HashSet::new();
    tables
        .iter()
        .flatten()
        .flat_map(DimensionTable::entries)
        .map(|(code, naam)| (code.as_str(), naam.trim()))
        .filter(move |(code, _)| seen.insert(*code))
}

fn period_row((code, naam): (&str, &str)) -> Vec<Value> {
    let parsed = PeriodCode::parse(code).ok();
    let part = |index: Option<u32>| {
        index
            .and_then(|i| i32::try_from(i).ok())
            .map_or(Value::Null, Value::Int)
    };
    vec![
        text(code),
        text(naam),
        PeriodCode::year_of(code).map_or(Value::Null, Value::Int),
        part(parsed.and_then(PeriodCode::quarter)),
        part(parsed.and_then(PeriodCode::month)),
    ]
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Boolean(*b),
        Cell::Int(i) => Value::BigInt(*i),
        Cell::Float(f) => Value::Double(*f),
        Cell::Text(s) => Value::Text(s.clone()),
    }
}

fn insert(conn: &Connection, table: &Staged) -> Result<usize> {
    if table.rows.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.table,
        table.columns.join(", "),
        vec!["?"; table.columns.len()].join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    for row in &table.rows {
        stmt.execute(params_from_iter(row.iter()))?;
    }
    Ok(table.rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::latest_path;
    use chrono::{TimeZone, Utc};
    use housing_persistence::{
        ExtractionRecord, ProcessedRecord, SnapshotEntry, SnapshotFormat, SnapshotKind,
    };
    use tempfile::TempDir;

    fn schema_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../sql/schema")
    }

    fn dim(keys: &[(&str, &str)]) -> Frame {
        Frame::from_columns([
            ("Key", keys.iter().map(|(k, _)| Cell::from(*k)).collect()),
            ("Title", keys.iter().map(|(_, t)| Cell::from(*t)).collect()),
        ])
        .unwrap()
    }

    fn seed(dir: &Path) -> (SnapshotStore, ManifestStore) {
        let store = SnapshotStore::open(dir).unwrap();
        let manifest = ManifestStore::in_dir(dir);
        let record = ExtractionRecord::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        manifest.begin_extraction(&record).unwrap();

        let dims = [
            ("doorlooptijden", "Regiokenmerken", dim(&[("NL01", "Nederland"), ("PV20", "Groningen")])),
            ("doorlooptijden", "Perioden", dim(&[("2020KW01", "2020 1e kwartaal")])),
            ("doorlooptijden", "Gebruiksfunctie", dim(&[("A045364", "Woning")])),
            ("woningen_pijplijn", "Gebruiksfunctie", dim(&[("A045364", "Woning"), ("A1", "Overig")])),
            ("woningen_pijplijn", "Perioden", dim(&[("2020KW01", "dubbel"), ("2020MM02", "2020 februari")])),
        ];
        for (dataset, name, frame) in dims {
            let stem = PathBuf::from(format!("raw/dim_{}_{dataset}", name.to_lowercase()));
            let files = store.write(&stem, &frame, &[SnapshotFormat::Csv]).unwrap();
            manifest
                .record_snapshot(
                    record.extraction_id,
                    SnapshotEntry {
                        dataset: dataset.into(),
                        table_id: "T".into(),
                        kind: SnapshotKind::Dimension { name: name.into() },
                        files,
                    },
                )
                .unwrap();
        }
        for (dataset, frame) in [
            (
                "doorlooptijden",
                Frame::from_columns([
                    ("ID", vec![Cell::from(0_i64), Cell::from(1_i64)]),
                    ("Regiokenmerken", vec![Cell::from("NL01"), Cell::from("PV20")]),
                    ("Perioden", vec![Cell::from("2020KW01"), Cell::from("2020KW01")]),
                    ("Jaar", vec![Cell::from(2020), Cell::from(2020)]),
                    ("Kwartaal", vec![Cell::from(1), Cell::from(1)]),
                    ("Doorlooptijd_Mediaan", vec![Cell::from(14.5), Cell::Null]),
                    ("Hoge_Variabiliteit", vec![Cell::from(1), Cell::Null]),
                ])
                .unwrap(),
            ),
            (
                "woningen_pijplijn",
                Frame::from_columns([
                    ("RegioS", vec![Cell::from("GM0363")]),
                    ("Perioden", vec![Cell::from("2020MM02")]),
                    ("Pijplijn_Totaal", vec![Cell::from(1000.0)]),
                    ("Crisis_Regio", vec![Cell::from(0)]),
                ])
                .unwrap(),
            ),
        ] {
            let latest = latest_path(dataset);
            store.write_file(&latest, &frame).unwrap();
            manifest
                .record_processed(
                    dataset,
                    ProcessedRecord {
                        extraction_id: record.extraction_id,
                        created_at: Utc::now(),
                        files: vec![latest.clone()],
                        latest,
                    },
                )
                .unwrap();
        }
        (store, manifest)
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_load_star_schema() {
        let dir = TempDir::new().unwrap();
        let (store, manifest) = seed(dir.path());
        let db_path = dir.path().join("db/housing.duckdb");

        let summary = SqlLoader::new(&store, &manifest, schema_dir()).load(&db_path).unwrap();
        assert_eq!(summary.rows("fact_doorlooptijden"), Some(2));
        assert_eq!(summary.rows("dim_regios"), Some(0));
        // shared codes are deduplicated across both datasets
        assert_eq!(summary.rows("dim_gebruiksfunctie"), Some(2));
        assert_eq!(summary.rows("dim_perioden"), Some(2));

        let conn = Connection::open(&db_path).unwrap();
        assert_eq!(count(&conn, "fact_woningen_pijplijn"), 1);
        let (naam, kwartaal, maand): (String, Option<i32>, Option<i32>) = conn
            .query_row(
                "SELECT naam, kwartaal, maand FROM dim_perioden WHERE code = '2020KW01'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!((naam.as_str(), kwartaal, maand), ("2020 1e kwartaal", Some(1), None));

        let mediaan: Option<f64> = conn
            .query_row(
                "SELECT doorlooptijd_mediaan FROM fact_doorlooptijden WHERE regiokenmerk_code = 'PV20'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(mediaan, None);
        let kind: String = conn
            .query_row("SELECT type FROM dim_regiokenmerken LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kind, "regio");
    }

    #[test]
    fn test_reload_replaces_tables() {
        let dir = TempDir::new().unwrap();
        let (store, manifest) = seed(dir.path());
        let db_path = dir.path().join("housing.duckdb");
        let loader = SqlLoader::new(&store, &manifest, schema_dir());

        loader.load(&db_path).unwrap();
        loader.load(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        assert_eq!(count(&conn, "fact_doorlooptijden"), 2);
        assert_eq!(count(&conn, "dim_regiokenmerken"), 2);
    }

    #[test]
    fn test_dimensions_follow_processed_extraction() {
        let dir = TempDir::new().unwrap();
        let (store, manifest) = seed(dir.path());

        // extracted again but never transformed
        let newer = ExtractionRecord::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        manifest.begin_extraction(&newer).unwrap();
        for (kind, stem, frame) in [
            (
                SnapshotKind::Fact,
                "raw/doorlooptijden_newer",
                Frame::from_columns([("Regiokenmerken", vec![Cell::from("NL01")])]).unwrap(),
            ),
            (
                SnapshotKind::Dimension { name: "Regiokenmerken".into() },
                "raw/dim_regiokenmerken_newer",
                dim(&[("NL01", "Nederland (nieuw)")]),
            ),
        ] {
            let files = store.write(Path::new(stem), &frame, &[SnapshotFormat::Csv]).unwrap();
            manifest
                .record_snapshot(
                    newer.extraction_id,
                    SnapshotEntry {
                        dataset: "doorlooptijden".into(),
                        table_id: "T".into(),
                        kind,
                        files,
                    },
                )
                .unwrap();
        }

        let db_path = dir.path().join("housing.duckdb");
        let summary = SqlLoader::new(&store, &manifest, schema_dir()).load(&db_path).unwrap();
        assert_eq!(summary.rows("dim_regiokenmerken"), Some(2));

        let conn = Connection::open(&db_path).unwrap();
        let naam: String = conn
            .query_row("SELECT naam FROM dim_regiokenmerken WHERE code = 'NL01'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(naam, "Nederland");
    }

    #[test]
    fn test_missing_schema_file() {
        let dir = TempDir::new().unwrap();
        let (store, manifest) = seed(dir.path());
        let err = SqlLoader::new(&store, &manifest, dir.path().join("nowhere"))
            .load(&dir.path().join("housing.duckdb"))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingInput(_)));
    }

    #[test]
    fn test_missing_processed_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let manifest = ManifestStore::in_dir(dir.path());
        let err = SqlLoader::new(&store, &manifest, schema_dir())
            .load(&dir.path().join("housing.duckdb"))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingInput(_)));
    }
}
