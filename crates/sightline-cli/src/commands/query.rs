//! Snapshot query commands (associate, aggregate, outliers)

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Result};
use sightline_core::{AggregateValue, RelatedView, Scalar, StatOp, ViewSpace};

use super::{join_keys, open_snapshot, truncate};

/// Parse an ops list: one op per measure, or a single op for every measure
pub fn parse_ops(ops: &str, measure_count: usize) -> Result<Vec<StatOp>> {
    let parsed = super::split_list(Some(ops))
        .iter()
        .map(|s| StatOp::from_str(s).map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;
    match parsed.len() {
        1 => Ok(vec![parsed[0]; measure_count]),
        n if n == measure_count => Ok(parsed),
        n => bail!("Got {} ops for {} measures", n, measure_count),
    }
}

fn format_value(value: &AggregateValue) -> String {
    match value {
        AggregateValue::Value(Some(v)) => format!("{:.4}", v),
        AggregateValue::Value(None) => "-".to_string(),
        AggregateValue::Dist(bins) => format!("{:?}", bins),
    }
}

fn format_group<'a>(values: impl Iterator<Item = (&'a String, &'a Scalar)>) -> String {
    values
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_related(title: &str, related: &[RelatedView]) {
    println!();
    println!("{} ({})", title, related.len());
    println!("{}", "─".repeat(72));
    if related.is_empty() {
        println!("   (none)");
        return;
    }
    for item in related {
        let view = &item.association.view;
        println!(
            "   {:>8.4}  {:<30}  {}",
            item.association.score,
            truncate(&join_keys(&view.dimensions), 30),
            join_keys(&view.measures)
        );
    }
}

pub fn cmd_associate(snapshot: &Path, dimensions: Vec<String>, measures: Vec<String>, json: bool) -> Result<()> {
    if measures.is_empty() {
        bail!("At least one measure is required");
    }
    let engine = open_snapshot(snapshot)?;
    let view = ViewSpace::new(dimensions, measures);
    let result = engine.associate(&view)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!(
        "🔗 Views related to [{}] / [{}]",
        join_keys(&view.dimensions),
        join_keys(&view.measures)
    );
    print_related("By measure", &result.related_by_measure);
    print_related("By dimension", &result.related_by_dimension);
    println!();
    Ok(())
}

pub fn cmd_aggregate(snapshot: &Path, dimensions: Vec<String>, measures: Vec<String>, ops: &str) -> Result<()> {
    if measures.is_empty() {
        bail!("At least one measure is required");
    }
    let ops = parse_ops(ops, measures.len())?;
    let engine = open_snapshot(snapshot)?;
    let rows = engine.aggregate(&dimensions, &measures, &ops)?;

    for row in &rows {
        let values: Vec<String> = measures
            .iter()
            .zip(&ops)
            .map(|(m, op)| {
                let value = row.values.get(m).map(format_value).unwrap_or_default();
                format!("{}({})={}", op, m, value)
            })
            .collect();
        let group = format_group(row.dimensions.iter());
        if group.is_empty() {
            println!("{}", values.join("  "));
        } else {
            println!("{}  {}", group, values.join("  "));
        }
    }
    Ok(())
}

pub fn cmd_outliers(snapshot: &Path, dimensions: Vec<String>, measures: Vec<String>, top: usize) -> Result<()> {
    if dimensions.is_empty() || measures.is_empty() {
        bail!("Outliers need at least one dimension and one measure");
    }
    let engine = open_snapshot(snapshot)?;
    let view = ViewSpace::new(dimensions, measures);
    let points = engine.search_point_interests(&view)?;

    println!();
    println!(
        "📍 Groups of [{}] by divergence of [{}]",
        join_keys(&view.dimensions),
        join_keys(&view.measures)
    );
    println!("{}", "─".repeat(72));
    for point in points.iter().take(top) {
        println!("   {:>8.4}  {}", point.kl, format_group(point.dimensions.iter()));
    }
    if points.is_empty() {
        println!("   (no groups)");
    }
    println!();
    Ok(())
}
