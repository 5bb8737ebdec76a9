//! Raw snapshots through transformation, analysis and the star-schema load.

use chrono::{TimeZone, Utc};
use housing_analytics::analyzer::seasonal::{decompose, DOORLOOPTIJD_SERIES};
use housing_analytics::analyzer::Analysis;
use housing_analytics::{Analyzer, SqlLoader, Transformer};
use housing_domain::dataset::{DOORLOOPTIJDEN, WONINGEN_PIJPLIJN};
use housing_domain::{Cell, Frame, QualityRules};
use housing_persistence::{
    read_frame, ExtractionRecord, ManifestStore, SnapshotEntry, SnapshotFormat, SnapshotKind,
    SnapshotStore,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

struct Workspace {
    _dir: TempDir,
    root: PathBuf,
    store: SnapshotStore,
    manifest: ManifestStore,
    extraction_id: Uuid,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let store = SnapshotStore::open(&root).unwrap();
        let manifest = ManifestStore::in_dir(&root);
        let record = ExtractionRecord::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
        manifest.begin_extraction(&record).unwrap();
        Self {
            _dir: dir,
            root,
            store,
            manifest,
            extraction_id: record.extraction_id,
        }
    }

    fn register(&self, dataset: &str, table_id: &str, kind: SnapshotKind, stem: &str, frame: &Frame) {
        let files = self
            .store
            .write(Path::new(stem), frame, &[SnapshotFormat::Csv, SnapshotFormat::Parquet])
            .unwrap();
        self.manifest
            .record_snapshot(
                self.extraction_id,
                SnapshotEntry {
                    dataset: dataset.into(),
                    table_id: table_id.into(),
                    kind,
                    files,
                },
            )
            .unwrap();
    }

    fn dimension(&self, dataset: &str, table_id: &str, name: &str, entries: &[(String, String)]) {
        let frame = Frame::from_columns([
            ("Key", entries.iter().map(|(k, _)| Cell::from(k.as_str())).collect()),
            ("Title", entries.iter().map(|(_, t)| Cell::from(t.as_str())).collect()),
        ])
        .unwrap();
        let stem = format!("raw/dim_{}_{table_id}_20240601_090000", name.to_lowercase());
        self.register(
            dataset,
            table_id,
            SnapshotKind::Dimension { name: name.into() },
            &stem,
            &frame,
        );
    }

    fn transformer(&self) -> Transformer<'_> {
        Transformer::new(&self.store, &self.manifest, QualityRules::default())
    }
}

fn quarters(years: std::ops::RangeInclusive<i32>) -> Vec<String> {
    years
        .flat_map(|y| (1..=4).map(move |q| format!("{y}KW{q:02}")))
        .collect()
}

fn months(years: std::ops::RangeInclusive<i32>) -> Vec<String> {
    years
        .flat_map(|y| (1..=12).map(move |m| format!("{y}MM{m:02}")))
        .collect()
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(k, t)| ((*k).to_string(), (*t).to_string())).collect()
}

/// One lead-time fact row per (region, type, quarter).
fn lead_time_facts(rows: &[(&str, &str, &str, f64)]) -> Frame {
    let col = |f: &dyn Fn(&(&str, &str, &str, f64)) -> Cell| rows.iter().map(f).collect::<Vec<_>>();
    Frame::from_columns([
        ("ID", (0..rows.len()).map(|i| Cell::from(i64::try_from(i).unwrap())).collect()),
        ("Regiokenmerken", col(&|r| Cell::from(r.0))),
        ("Gebruiksfunctie", col(&|_| Cell::from("A045364"))),
        ("Woningtype", col(&|r| Cell::from(r.1))),
        ("Perioden", col(&|r| Cell::from(r.2))),
        ("NieuwbouwTotaal_1", col(&|_| Cell::from(100_i64))),
        ("k_10KwantielDoorlooptijdMaanden_2", col(&|r| Cell::from(r.3 - 4.0))),
        ("k_25KwantielDoorlooptijdMaanden_3", col(&|r| Cell::from(r.3 - 2.0))),
        ("MediaanDoorlooptijdMaanden_4", col(&|r| Cell::from(r.3))),
        ("k_75KwantielDoorlooptijdMaanden_5", col(&|r| Cell::from(r.3 + 3.0))),
        ("k_90KwantielDoorlooptijdMaanden_6", col(&|r| Cell::from(r.3 + 6.0))),
        ("GemiddeldeDoorlooptijdMaanden_7", col(&|r| Cell::from(r.3 + 1.0))),
    ])
    .unwrap()
}

/// One pipeline fact row per (region, month) with stage counts derived from
/// `(total, stuck_2y, permit)`.
fn pipeline_facts(rows: &[(&str, &str, f64, f64, f64)]) -> Frame {
    let col = |f: &dyn Fn(&(&str, &str, f64, f64, f64)) -> Cell| rows.iter().map(f).collect::<Vec<_>>();
    Frame::from_columns([
        ("ID", (0..rows.len()).map(|i| Cell::from(i64::try_from(i).unwrap())).collect()),
        ("Gebruiksfunctie", col(&|_| Cell::from("A045364"))),
        ("RegioS", col(&|r| Cell::from(r.0))),
        ("Perioden", col(&|r| Cell::from(r.1))),
        ("VerblijfsobjectenInDePijplijnTotaal_1", col(&|r| Cell::from(r.2))),
        ("BouwGestartPijplijn_2", col(&|r| Cell::from(r.2 - r.4))),
        ("Vergunningspijplijn_3", col(&|r| Cell::from(r.4))),
        ("TotaalInDePijplijn2Jaar_4", col(&|r| Cell::from(r.3))),
        ("BouwGestartPijplijn2Jaar_5", col(&|r| Cell::from(r.3 * 0.4))),
        ("Vergunningspijplijn2Jaar_6", col(&|r| Cell::from(r.3 * 0.6))),
        ("TotaalInDePijplijn5Jaar_7", col(&|r| Cell::from(r.3 * 0.2))),
    ])
    .unwrap()
}

#[test]
fn test_rising_quarterly_lead_time_has_significant_positive_trend() {
    let ws = Workspace::new();
    let periods = quarters(2022..=2023);
    let rows: Vec<(&str, &str, &str, f64)> = periods
        .iter()
        .zip(10..)
        .map(|(p, m)| ("NL01", "ZW25805", p.as_str(), f64::from(m)))
        .collect();
    ws.register(
        "doorlooptijden",
        "86260NED",
        SnapshotKind::Fact,
        "raw/fact_doorlooptijden_2022_2023_86260NED_20240601_090000",
        &lead_time_facts(&rows),
    );

    let summary = ws.transformer().transform(&DOORLOOPTIJDEN).unwrap();
    assert_eq!(summary.rows, 8);
    let processed = ws.store.read(&summary.latest).unwrap();

    let results = ws.root.join("results");
    let analyzer = Analyzer::new(processed, Frame::new(), &results);
    let written = analyzer.run(Analysis::TemporalTrend).unwrap();
    let table = read_frame(&written[0]).unwrap();

    let value = |metric: &str| {
        let row = table
            .column_text("metric")
            .unwrap()
            .iter()
            .position(|m| m.as_deref() == Some(metric))
            .unwrap();
        table.cell(row, "value").and_then(Cell::as_f64).unwrap()
    };
    assert!(value("slope") > 0.0);
    assert!(value("p_value") < 0.05);
    assert!((value("significant") - 1.0).abs() < f64::EPSILON);

    // 8 quarters is below the 9 needed for a quarterly decomposition
    let frame = ws.store.read(&summary.latest).unwrap();
    let seasonal = decompose(&frame, &DOORLOOPTIJD_SERIES).unwrap();
    assert_eq!(seasonal.height(), 8);
    assert!(seasonal.column("Trend").unwrap().iter().all(Cell::is_null));
    assert_eq!(seasonal.cell(7, "Observed").and_then(Cell::as_f64), Some(17.0));
}

#[test]
fn test_full_pipeline_after_extraction() {
    let ws = Workspace::new();

    // lead times: 2 regions x 2 housing types x 8 quarters
    let periods = quarters(2020..=2021);
    let mut lead_rows = Vec::new();
    for (region, region_offset) in [("GM0363", 6.0), ("GM0344", 0.0)] {
        for (kind, kind_offset) in [("ZW25805", 0.0), ("ZW25806", 8.0)] {
            for (i, period) in periods.iter().enumerate() {
                let trend = f64::from(u32::try_from(i).unwrap()) * 0.5;
                let wobble = if i % 2 == 0 { 0.3 } else { -0.3 };
                lead_rows.push((region, kind, period.as_str(), 12.0 + region_offset + kind_offset + trend + wobble));
            }
        }
    }
    ws.register(
        "doorlooptijden",
        "86260NED",
        SnapshotKind::Fact,
        "raw/fact_doorlooptijden_2020_2021_86260NED_20240601_090000",
        &lead_time_facts(&lead_rows),
    );
    ws.dimension(
        "doorlooptijden",
        "86260NED",
        "Regiokenmerken",
        &pairs(&[("GM0363", "Amsterdam"), ("GM0344", "Utrecht")]),
    );
    ws.dimension(
        "doorlooptijden",
        "86260NED",
        "Woningtype",
        &pairs(&[("ZW25805", "Eengezinswoning"), ("ZW25806", "Meergezinswoning")]),
    );
    ws.dimension("doorlooptijden", "86260NED", "Gebruiksfunctie", &pairs(&[("A045364", "Woning")]));
    let quarter_labels: Vec<(String, String)> = periods
        .iter()
        .map(|p| (p.clone(), format!("{} {}e kwartaal", &p[..4], &p[7..])))
        .collect();
    ws.dimension("doorlooptijden", "86260NED", "Perioden", &quarter_labels);

    // pipeline: 3 regions x 24 months
    let month_codes = months(2020..=2021);
    let mut pipe_rows = Vec::new();
    for (region, stuck_base) in [("GM0363", 300.0), ("GM0344", 150.0), ("GM0599", 60.0)] {
        for (i, period) in month_codes.iter().enumerate() {
            let step = f64::from(u32::try_from(i).unwrap());
            let total = 1000.0 + 10.0 * step;
            let stuck = stuck_base + 2.0 * step + if i % 3 == 0 { 5.0 } else { 0.0 };
            let permit = 400.0 + stuck * 0.5;
            pipe_rows.push((region, period.as_str(), total, stuck, permit));
        }
    }
    ws.register(
        "woningen_pijplijn",
        "82211NED",
        SnapshotKind::Fact,
        "raw/fact_woningen_pijplijn_2020_2021_82211NED_20240601_090000",
        &pipeline_facts(&pipe_rows),
    );
    ws.dimension(
        "woningen_pijplijn",
        "82211NED",
        "RegioS",
        &pairs(&[("GM0363", "Amsterdam"), ("GM0344", "Utrecht"), ("GM0599", "Rotterdam")]),
    );
    ws.dimension("woningen_pijplijn", "82211NED", "Gebruiksfunctie", &pairs(&[("A045364", "Woning")]));

    // transform
    for definition in [&DOORLOOPTIJDEN, &WONINGEN_PIJPLIJN] {
        let summary = ws.transformer().transform(definition).unwrap();
        assert_eq!(summary.extraction_id, ws.extraction_id);
        assert!(summary.quality.year_range.is_some());
    }

    // analyze
    let results = ws.root.join("results");
    let analyzer = Analyzer::load(&ws.store, &ws.manifest, &results).unwrap();
    let written = analyzer.run_all().unwrap();
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "1_temporal_regression.csv",
            "2_regional_anova.csv",
            "2_regional_anova_posthoc.csv",
            "3_bottleneck_summary.csv",
            "3_bottleneck_top10_crisis.csv",
            "4_woningtype_ttest.csv",
            "5_correlation_matrix.csv",
            "6_seasonal_decomposition_doorlooptijd.csv",
            "6_seasonal_decomposition_pijplijn.csv",
        ]
    );

    let ttest = read_frame(&results.join("4_woningtype_ttest.csv")).unwrap();
    assert_eq!(
        ttest.cell(0, "interpretation").and_then(Cell::as_str),
        Some("Meergezins significant langer (large effect size)")
    );

    let ranking = read_frame(&results.join("3_bottleneck_summary.csv")).unwrap();
    assert_eq!(ranking.cell(0, "Regio_Naam").and_then(Cell::as_str), Some("Amsterdam"));
    assert_eq!(ranking.height(), 3);

    let correlations = read_frame(&results.join("5_correlation_matrix.csv")).unwrap();
    assert_eq!(correlations.height(), 3);

    let monthly = read_frame(&results.join("6_seasonal_decomposition_pijplijn.csv")).unwrap();
    assert_eq!(monthly.height(), 24);
    assert_eq!(
        monthly.column_names(),
        &["Jaar", "Maand", "Periode_Naam", "Observed", "Trend", "Seasonal", "Residual"]
    );

    // load
    let schema_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../sql/schema");
    let db_path = ws.root.join("housing.duckdb");
    let loaded = SqlLoader::new(&ws.store, &ws.manifest, schema_dir).load(&db_path).unwrap();
    assert_eq!(loaded.rows("fact_doorlooptijden"), Some(32));
    assert_eq!(loaded.rows("fact_woningen_pijplijn"), Some(72));
    assert_eq!(loaded.rows("dim_regiokenmerken"), Some(2));
    assert_eq!(loaded.rows("dim_gebruiksfunctie"), Some(1));
    assert_eq!(loaded.rows("dim_perioden"), Some(8));
}
