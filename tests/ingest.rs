//! End-to-end loading tests over real files.
//!
//! Each test writes a fixture into a temporary directory, loads it through
//! the public API and checks what ended up in the table.

use flate2::write::GzEncoder;
use flate2::Compression;
use ftv::config::{FreezeMode, LoadOptions};
use ftv::ingest::{load, spawn_load, Input};
use ftv::query::{FilterOperator, FilterSet, FilterSpec};
use ftv::table::{ColumnType, TableBuffer};
use ftv::TableError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_fixture(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write fixture");
    path
}

fn people_csv(rows: usize) -> String {
    let mut out = String::from("id,name,city,joined\n");
    let cities = ["Boston", "Denver", "Austin"];
    for i in 0..rows {
        out.push_str(&format!(
            "{i},person {i},{},2023-01-{:02}\n",
            cities[i % cities.len()],
            i % 28 + 1
        ));
    }
    out
}

fn load_sync(path: &Path, options: &LoadOptions) -> (TableBuffer, ftv::Result<ftv::ingest::LoadSummary>) {
    let buffer = TableBuffer::new();
    let input = Input::open(path).expect("Failed to open fixture");
    let result = load(input, options, &buffer);
    (buffer, result)
}

fn load_async(path: &Path, options: LoadOptions) -> (Arc<TableBuffer>, ftv::Result<ftv::ingest::LoadSummary>) {
    let buffer = Arc::new(TableBuffer::new());
    let input = Input::open(path).expect("Failed to open fixture");
    let handle = spawn_load(input, options, Arc::clone(&buffer)).expect("Failed to spawn load");
    let result = handle.wait();
    (buffer, result)
}

#[test]
fn test_csv_file_loads_with_types() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "people.csv", &people_csv(50));

    let (buffer, result) = load_sync(&path, &LoadOptions::default());
    let summary = result.unwrap();

    assert_eq!(summary.separator, ',');
    assert_eq!(summary.rows, 51);
    assert_eq!(buffer.row_count(), 51);
    assert_eq!(buffer.column_count(), 4);
    assert_eq!(
        buffer.column_types(),
        vec![ColumnType::Numeric, ColumnType::String, ColumnType::String, ColumnType::Date]
    );
    assert_eq!(buffer.frozen_rows(), 1);
    assert_eq!(buffer.frozen_cols(), 1);
}

#[test]
fn test_async_matches_sync_on_large_file() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "big.csv", &people_csv(30_000));

    let (sync_buf, sync_result) = load_sync(&path, &LoadOptions::default());
    sync_result.unwrap();

    let options = LoadOptions {
        workers: 4,
        ..LoadOptions::default()
    };
    let (async_buf, async_result) = load_async(&path, options);
    let summary = async_result.unwrap();

    assert!(!summary.cancelled);
    assert_eq!(async_buf.row_count(), 30_001);
    assert_eq!(async_buf.rows_snapshot(), sync_buf.rows_snapshot());
    assert_eq!(async_buf.column_types(), sync_buf.column_types());
}

#[test]
fn test_tsv_extension_picks_tab() {
    let dir = TempDir::new().unwrap();
    // a comma-heavy payload that detection alone would misjudge
    let path = write_fixture(&dir, "notes.tsv", "a,b\tc\n1,2\t3\n4,5\t6\n");

    let (buffer, result) = load_sync(&path, &LoadOptions::default());
    assert_eq!(result.unwrap().separator, '\t');
    assert_eq!(buffer.row(1).unwrap()[0].as_ref(), "1,2");
}

#[test]
fn test_gzip_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.csv.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(people_csv(100).as_bytes()).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();

    let (buffer, result) = load_async(&path, LoadOptions::default());
    result.unwrap();
    assert_eq!(buffer.row_count(), 101);
    assert_eq!(buffer.cell(100, 1).unwrap().as_ref(), "person 99");
}

#[test]
fn test_directory_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = Input::open(dir.path()).unwrap_err();
    assert!(matches!(err, TableError::Io(_)));
    assert!(err.to_string().contains("is a directory"));
}

#[test]
fn test_skip_rules_and_blank_lines() {
    let dir = TempDir::new().unwrap();
    let content = "generated by exporter\nversion 2\n\
                   name;score\r\n# comment\r\nann;3\r\n\r\nbo;4\r\n";
    let path = write_fixture(&dir, "scores.txt", content);

    let options = LoadOptions {
        skip_lines: 2,
        skip_prefixes: vec!["#".to_string()],
        ..LoadOptions::default()
    };
    let (buffer, result) = load_sync(&path, &options);
    assert_eq!(result.unwrap().separator, ';');

    let rows: Vec<Vec<String>> = buffer
        .rows_snapshot()
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
    assert_eq!(rows, vec![vec!["name", "score"], vec!["ann", "3"], vec!["bo", "4"]]);
}

#[test]
fn test_column_projection_both_pipelines() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "people.csv", &people_csv(3_000));

    let show = LoadOptions {
        show_columns: vec![4, 2],
        ..LoadOptions::default()
    };
    let (buffer, result) = load_async(&path, show.clone());
    result.unwrap();
    // file order is kept regardless of the order requested
    let header: Vec<String> = buffer.row(0).unwrap().iter().map(|c| c.to_string()).collect();
    assert_eq!(header, vec!["name", "joined"]);
    assert_eq!(buffer.column_count(), 2);

    let hide = LoadOptions {
        hide_columns: vec![1],
        async_load: false,
        ..LoadOptions::default()
    };
    let (buffer, result) = load_sync(&path, &hide);
    result.unwrap();
    assert_eq!(buffer.row(2999).unwrap()[0].as_ref(), "person 2998");
}

#[test]
fn test_strict_mismatch_reports_row() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "ragged.csv", "a,b,c\n1,2,3\n4,5\n");

    let options = LoadOptions {
        strict: true,
        ..LoadOptions::default()
    };
    let (buffer, result) = load_sync(&path, &options);
    match result {
        Err(TableError::SchemaMismatch { expected, found, .. }) => {
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("expected schema mismatch, got {other:?}"),
    }
    assert_eq!(buffer.row_count(), 2);
}

#[test]
fn test_lenient_ragged_rows_are_padded() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "ragged.csv", "a,b,c\n1,2,3\n4,5\n6,7,8,9\n");

    let (buffer, result) = load_sync(&path, &LoadOptions::default());
    result.unwrap();
    assert_eq!(buffer.column_count(), 4);
    assert_eq!(buffer.cell(2, 2).unwrap().as_ref(), "NaN");
    assert_eq!(buffer.cell(0, 3).unwrap().as_ref(), "NaN");
}

#[test]
fn test_memory_limit_keeps_partial_table() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "big.csv", &people_csv(40_000));

    let options = LoadOptions {
        memory_mb: 1,
        ..LoadOptions::default()
    };
    let (buffer, result) = load_async(&path, options);
    let err = result.unwrap_err();
    assert!(matches!(err, TableError::MemoryLimitExceeded { .. }));
    assert!(err.is_recoverable());

    let rows = buffer.row_count();
    assert!(rows > 1 && rows < 40_001);
    assert!(buffer.memory_usage() <= 1024 * 1024);
    assert_eq!(buffer.column_type(0), ColumnType::Numeric);
    // whatever was kept is still in file order
    assert_eq!(buffer.cell(rows - 1, 0).unwrap().as_ref(), (rows - 2).to_string());
}

#[test]
fn test_freeze_mode_from_options() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "people.csv", &people_csv(5));

    let options = LoadOptions {
        freeze: FreezeMode::Column,
        ..LoadOptions::default()
    };
    let (buffer, result) = load_sync(&path, &options);
    result.unwrap();
    assert_eq!(buffer.frozen_rows(), 0);
    assert_eq!(buffer.frozen_cols(), 1);

    // without a header row the first line is data and gets sorted too
    assert!(buffer.sort_by_column(0, true));
    assert_eq!(buffer.cell(0, 0).unwrap().as_ref(), "id");
}

#[test]
fn test_queries_over_loaded_file() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "people.csv", &people_csv(300));

    let (buffer, result) = load_async(&path, LoadOptions::default());
    result.unwrap();

    let mut filters = FilterSet::new();
    filters.set(2, FilterSpec::new(FilterOperator::Equals, "boston"));
    filters.set(0, FilterSpec::new(FilterOperator::GreaterOrEqual, "150"));
    let view = filters.apply(&buffer);

    // ids 150..300 where id % 3 == 0
    assert_eq!(view.data_row_count(), 50);
    assert_eq!(view.cell(0, 0).unwrap().as_ref(), "id");

    assert!(view.sort_by_column(0, true));
    assert_eq!(view.cell(1, 0).unwrap().as_ref(), "297");
    // the original is untouched by sorting the view
    assert_eq!(buffer.cell(1, 0).unwrap().as_ref(), "0");

    let hits = buffer.search("person 29", false, false);
    // person 29 and person 290..=299
    assert_eq!(hits.len(), 11);
    assert!(hits.iter().all(|h| h.col == 1));
}

#[test]
fn test_config_layering_from_env() {
    let mut options = LoadOptions::default();
    options.apply_env(|key| match key {
        "FTV_MEMORY_MB" => Some("64".to_string()),
        "FTV_ASYNC" => Some("false".to_string()),
        "FTV_WORKERS" => Some("not a number".to_string()),
        _ => None,
    });
    assert_eq!(options.memory_mb, 64);
    assert!(!options.async_load);
    assert_eq!(options.workers, 0);
    assert_eq!(options.memory_limit_bytes(), 64 * 1024 * 1024);
}
