//! Explore command: load a CSV, run the pipeline, print ranked views

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use sightline_core::{
    parse_csv, AnalyticType, CsvDataset, CubeMode, Engine, EngineConfig, Field, ViewLimits,
};

use super::{join_keys, truncate};

/// Arguments of `sightline explore`
#[derive(Debug, Clone)]
pub struct ExploreOptions {
    pub data: PathBuf,
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    pub max_dimensions: Option<usize>,
    pub max_measures: Option<usize>,
    pub top: usize,
    pub json: bool,
    pub save: Option<PathBuf>,
    pub cube: String,
}

/// Field roles for a dataset: inferred, with explicit lists taking priority.
///
/// When only one list is given the other role is filled from inference,
/// skipping columns already claimed.
pub fn resolve_fields(dataset: &CsvDataset, dimensions: &[String], measures: &[String]) -> Result<Vec<Field>> {
    let inferred = dataset.infer_fields();
    if dimensions.is_empty() && measures.is_empty() {
        return Ok(inferred);
    }

    for key in dimensions.iter().chain(measures) {
        if !dataset.columns.contains(key) {
            bail!("Unknown column '{}' (columns: {})", key, dataset.columns.join(", "));
        }
    }
    if let Some(key) = dimensions.iter().find(|k| measures.contains(*k)) {
        bail!("Column '{}' cannot be both a dimension and a measure", key);
    }

    let claimed: HashSet<&String> = dimensions.iter().chain(measures).collect();
    let mut fields: Vec<Field> = dimensions.iter().map(|k| Field::dimension(k.as_str())).collect();
    fields.extend(measures.iter().map(|k| Field::measure(k.as_str())));

    for field in inferred {
        if claimed.contains(&field.key) {
            continue;
        }
        let fill = match field.analytic_type {
            AnalyticType::Dimension => dimensions.is_empty(),
            AnalyticType::Measure => measures.is_empty(),
        };
        if fill {
            fields.push(field);
        }
    }
    Ok(fields)
}

pub fn cmd_explore(config_path: Option<&Path>, options: &ExploreOptions) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    let mode = CubeMode::from_str(&options.cube).map_err(anyhow::Error::msg)?;

    let file = File::open(&options.data)
        .with_context(|| format!("Failed to open {}", options.data.display()))?;
    let dataset = parse_csv(file).context("Failed to parse CSV")?;
    let fields = resolve_fields(&dataset, &options.dimensions, &options.measures)?;

    let limits = ViewLimits {
        dimension: options.max_dimensions.unwrap_or(config.limits.dimension),
        measure: options.max_measures.unwrap_or(config.limits.measure),
    };
    if limits.dimension == 0 || limits.measure == 0 {
        bail!("View limits must be at least 1");
    }

    let mut engine = Engine::new(config, mode);
    let output = engine.start(dataset.rows, fields, Some(limits))?;

    if let Some(path) = &options.save {
        engine
            .serialize()?
            .save(path)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    }

    let top: Vec<_> = output.insight_spaces.iter().take(options.top).collect();
    if options.json {
        let payload = serde_json::json!({
            "insight_spaces": top,
            "fields": output.fields,
            "timing": output.timing,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!();
    println!(
        "🔎 {} rows, {} dimensions, {} measures analysed",
        output.data_source.len(),
        engine.dimensions().len(),
        engine.measures().len()
    );
    println!();
    if top.is_empty() {
        println!("No informative views found.");
    } else {
        println!("{:>4}  {:>8}  {:<36}  MEASURES", "#", "SCORE", "DIMENSIONS");
        println!("{}", "─".repeat(72));
        for (i, space) in top.iter().enumerate() {
            println!(
                "{:>4}  {:>8.4}  {:<36}  {}",
                i + 1,
                space.score,
                truncate(&join_keys(&space.dimensions), 36),
                join_keys(&space.measures)
            );
        }
        if output.insight_spaces.len() > top.len() {
            println!();
            println!("   ({} more views, use --top to show more)", output.insight_spaces.len() - top.len());
        }
    }

    println!();
    let timing: Vec<String> = output
        .timing
        .iter()
        .map(|t| format!("{} {:.1}ms", t.stage, t.millis))
        .collect();
    println!("   Timing: {}", timing.join(" · "));
    if let Some(path) = &options.save {
        println!("   Snapshot: {}", path.display());
    }
    println!();
    Ok(())
}
