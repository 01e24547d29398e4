//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;
use std::path::{Path, PathBuf};

use sightline_core::{parse_csv, AnalyticType, Dispatcher, StatOp, TaskResponse};

use crate::commands::{self, truncate, ExploreOptions};

fn sales_csv() -> String {
    let mut csv = String::from("region,channel,sales,units\n");
    for i in 0..45 {
        let region = ["north", "south", "west"][i % 3];
        let sales = if region == "north" { 800 + i } else { 20 + i };
        csv.push_str(&format!("{},c{},{},{}\n", region, i % 2, sales, sales / 10));
    }
    csv
}

fn write_csv(dir: &Path) -> PathBuf {
    let path = dir.join("sales.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(sales_csv().as_bytes()).unwrap();
    path
}

fn explore_options(data: PathBuf, save: Option<PathBuf>) -> ExploreOptions {
    ExploreOptions {
        data,
        dimensions: Vec::new(),
        measures: Vec::new(),
        max_dimensions: None,
        max_measures: None,
        top: 5,
        json: false,
        save,
        cube: "memory".to_string(),
    }
}

fn keys(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ========== Helper Tests ==========

#[test]
fn test_split_list() {
    assert_eq!(commands::split_list(Some("a, b,,c ")), keys(&["a", "b", "c"]));
    assert!(commands::split_list(None).is_empty());
    assert!(commands::split_list(Some(" , ")).is_empty());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a rather long name", 10), "a rathe...");
}

#[test]
fn test_parse_ops() {
    assert_eq!(commands::parse_ops("mean", 3).unwrap(), vec![StatOp::Mean; 3]);
    assert_eq!(
        commands::parse_ops("sum,max", 2).unwrap(),
        vec![StatOp::Sum, StatOp::Max]
    );
    assert!(commands::parse_ops("sum,max", 3).is_err());
    assert!(commands::parse_ops("median", 1).is_err());
}

// ========== Field Resolution Tests ==========

#[test]
fn test_resolve_fields_inferred() {
    let dataset = parse_csv(sales_csv().as_bytes()).unwrap();
    let fields = commands::resolve_fields(&dataset, &[], &[]).unwrap();
    let roles: Vec<(&str, AnalyticType)> = fields.iter().map(|f| (f.key.as_str(), f.analytic_type)).collect();
    assert_eq!(
        roles,
        vec![
            ("region", AnalyticType::Dimension),
            ("channel", AnalyticType::Dimension),
            ("sales", AnalyticType::Measure),
            ("units", AnalyticType::Measure),
        ]
    );
}

#[test]
fn test_resolve_fields_explicit_dimensions() {
    let dataset = parse_csv(sales_csv().as_bytes()).unwrap();
    // units as a dimension; measures still inferred
    let fields = commands::resolve_fields(&dataset, &keys(&["units"]), &[]).unwrap();
    let dims: Vec<&str> = fields
        .iter()
        .filter(|f| f.analytic_type == AnalyticType::Dimension)
        .map(|f| f.key.as_str())
        .collect();
    let measures: Vec<&str> = fields
        .iter()
        .filter(|f| f.analytic_type == AnalyticType::Measure)
        .map(|f| f.key.as_str())
        .collect();
    assert_eq!(dims, vec!["units"]);
    assert_eq!(measures, vec!["sales"]);
}

#[test]
fn test_resolve_fields_rejects_bad_columns() {
    let dataset = parse_csv(sales_csv().as_bytes()).unwrap();
    assert!(commands::resolve_fields(&dataset, &keys(&["missing"]), &[]).is_err());
    assert!(commands::resolve_fields(&dataset, &keys(&["sales"]), &keys(&["sales"])).is_err());
}

// ========== Command Tests ==========

#[test]
fn test_cmd_explore_and_snapshot_queries() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_csv(dir.path());
    let snapshot = dir.path().join("engine.json.gz");

    commands::cmd_explore(None, &explore_options(data, Some(snapshot.clone()))).unwrap();
    assert!(snapshot.exists());

    commands::cmd_associate(&snapshot, keys(&["region"]), keys(&["sales"]), false).unwrap();
    commands::cmd_associate(&snapshot, keys(&["region"]), keys(&["sales"]), true).unwrap();
    commands::cmd_aggregate(&snapshot, keys(&["region"]), keys(&["sales", "units"]), "sum").unwrap();
    commands::cmd_outliers(&snapshot, keys(&["region"]), keys(&["sales"]), 3).unwrap();

    assert!(commands::cmd_aggregate(&snapshot, keys(&["nowhere"]), keys(&["sales"]), "sum").is_err());
    assert!(commands::cmd_outliers(&snapshot, vec![], keys(&["sales"]), 3).is_err());
}

#[test]
fn test_cmd_explore_disk_cube_json() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_csv(dir.path());
    let mut options = explore_options(data, None);
    options.cube = "disk".to_string();
    options.json = true;
    options.max_dimensions = Some(1);
    commands::cmd_explore(None, &options).unwrap();
}

#[test]
fn test_cmd_explore_rejects_unknown_cube() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_csv(dir.path());
    let mut options = explore_options(data, None);
    options.cube = "warehouse".to_string();
    assert!(commands::cmd_explore(None, &options).is_err());
}

#[test]
fn test_cmd_explore_missing_file() {
    let options = explore_options(PathBuf::from("/nonexistent/data.csv"), None);
    assert!(commands::cmd_explore(None, &options).is_err());
}

#[test]
fn test_cmd_config_show_with_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "[limits]\ndimension = 1\n").unwrap();
    commands::cmd_config_show(Some(&path)).unwrap();

    std::fs::write(&path, "[limits]\ndimension = 0\n").unwrap();
    assert!(commands::cmd_config_show(Some(&path)).is_err());
}

// ========== Serve Tests ==========

#[test]
fn test_serve_lines_answers_each_request() {
    let rows = serde_json::to_string(
        &parse_csv(sales_csv().as_bytes()).unwrap().rows,
    )
    .unwrap();
    let input = format!(
        concat!(
            r#"{{"task":"init","props":{{"mode":"memory"}}}}"#,
            "\n\n",
            r#"{{"task":"infermeta","props":{{"data_source":{}}}}}"#,
            "\n",
            r#"{{"task":"unknown"}}"#,
            "\n"
        ),
        rows
    );

    let mut dispatcher = Dispatcher::default();
    let mut output = Vec::new();
    let handled = commands::serve_lines(&mut dispatcher, input.as_bytes(), &mut output).unwrap();
    assert_eq!(handled, 3);

    let responses: Vec<TaskResponse> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(responses[0].success);
    assert!(responses[1].success);
    assert_eq!(responses[1].data.as_ref().unwrap().as_array().unwrap().len(), 4);
    assert!(!responses[2].success);
    assert!(dispatcher.engine().is_some());
}
