//! Engine configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/sightline/config/engine.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Every key is optional; a missing key keeps its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::ViewLimits;

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Correlation clustering thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub dimension_threshold: f64,
    pub measure_threshold: f64,
    /// Below this many dimensions the dimension threshold accepts everything
    pub small_schema_dimensions: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            dimension_threshold: 0.6,
            measure_threshold: 0.8,
            small_schema_dimensions: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub relative_gain_cutoff: f64,
    pub progress_interval: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            relative_gain_cutoff: 0.005,
            progress_interval: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssociationConfig {
    pub measure_threshold: f64,
    pub dimension_threshold: f64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            measure_threshold: 0.7,
            dimension_threshold: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub insight_limit: usize,
    pub specification_sample_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            insight_limit: 10_000,
            specification_sample_limit: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub drop_identifier_dimensions: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            drop_identifier_dimensions: true,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub limits: ViewLimits,
    pub graph: GraphConfig,
    pub scoring: ScoringConfig,
    pub association: AssociationConfig,
    pub output: OutputConfig,
    pub selection: SelectionConfig,
}

impl EngineConfig {
    /// Load from `path` if given, else the data-dir override, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_config(path)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("sightline").join("config").join("engine.toml"))
}

/// Load configuration (explicit path, then override, then default)
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let content = match path {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?,
        None => match default_config_path() {
            Some(default_path) if default_path.exists() => {
                tracing::debug!(path = %default_path.display(), "Using config override");
                fs::read_to_string(&default_path)
                    .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
            }
            _ => DEFAULT_CONFIG.to_string(),
        },
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    limits: Option<RawLimits>,
    graph: Option<RawGraph>,
    scoring: Option<RawScoring>,
    association: Option<RawAssociation>,
    output: Option<RawOutput>,
    selection: Option<RawSelection>,
}

#[derive(Debug, Deserialize)]
struct RawLimits {
    dimension: Option<usize>,
    measure: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawGraph {
    dimension_threshold: Option<f64>,
    measure_threshold: Option<f64>,
    small_schema_dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawScoring {
    relative_gain_cutoff: Option<f64>,
    progress_interval: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawAssociation {
    measure_threshold: Option<f64>,
    dimension_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    insight_limit: Option<usize>,
    specification_sample_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawSelection {
    drop_identifier_dimensions: Option<bool>,
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = EngineConfig::default();

    if let Some(limits) = raw.limits {
        if let Some(dimension) = limits.dimension {
            config.limits.dimension = dimension;
        }
        if let Some(measure) = limits.measure {
            config.limits.measure = measure;
        }
    }

    if let Some(graph) = raw.graph {
        if let Some(threshold) = graph.dimension_threshold {
            config.graph.dimension_threshold = threshold;
        }
        if let Some(threshold) = graph.measure_threshold {
            config.graph.measure_threshold = threshold;
        }
        if let Some(count) = graph.small_schema_dimensions {
            config.graph.small_schema_dimensions = count;
        }
    }

    if let Some(scoring) = raw.scoring {
        if let Some(cutoff) = scoring.relative_gain_cutoff {
            config.scoring.relative_gain_cutoff = cutoff;
        }
        if let Some(interval) = scoring.progress_interval {
            config.scoring.progress_interval = interval;
        }
    }

    if let Some(association) = raw.association {
        if let Some(threshold) = association.measure_threshold {
            config.association.measure_threshold = threshold;
        }
        if let Some(threshold) = association.dimension_threshold {
            config.association.dimension_threshold = threshold;
        }
    }

    if let Some(output) = raw.output {
        if let Some(limit) = output.insight_limit {
            config.output.insight_limit = limit;
        }
        if let Some(limit) = output.specification_sample_limit {
            config.output.specification_sample_limit = limit;
        }
    }

    if let Some(selection) = raw.selection {
        if let Some(drop) = selection.drop_identifier_dimensions {
            config.selection.drop_identifier_dimensions = drop;
        }
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &EngineConfig) -> Result<()> {
    if config.limits.dimension == 0 || config.limits.measure == 0 {
        return Err(Error::Config(
            "view limits must allow at least one field of each kind".to_string(),
        ));
    }
    if config.scoring.progress_interval == 0 {
        return Err(Error::Config("progress_interval must be positive".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
            [limits]
            dimension = 3

            [association]
            dimension_threshold = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.dimension, 3);
        assert_eq!(config.limits.measure, 3);
        assert_eq!(config.association.dimension_threshold, 0.3);
        assert_eq!(config.association.measure_threshold, 0.7);
        assert_eq!(config.graph, GraphConfig::default());
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse_config("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(parse_config("[limits"), Err(Error::Config(_))));
        assert!(matches!(
            parse_config("[limits]\nmeasure = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[scoring]\nprogress_interval = 0"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "[output]\ninsight_limit = 5\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.output.insight_limit, 5);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(load_config(Some(&missing)), Err(Error::Config(_))));
    }
}
