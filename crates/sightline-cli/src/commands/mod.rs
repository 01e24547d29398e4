//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `config` - Config path and effective config
//! - `explore` - CSV loading and the full pipeline
//! - `query` - Snapshot queries (associate, aggregate, outliers)
//! - `serve` - Newline-delimited JSON task loop over stdin/stdout

pub mod config;
pub mod explore;
pub mod query;
pub mod serve;

// Re-export command functions for main.rs
pub use config::*;
pub use explore::*;
pub use query::*;
pub use serve::*;

use std::path::Path;

use anyhow::{Context, Result};
use sightline_core::{CubeMode, Engine, EngineSnapshot};

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Restore a scored engine from a snapshot file
pub fn open_snapshot(path: &Path) -> Result<Engine> {
    let snapshot = EngineSnapshot::load(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    let engine = Engine::deserialize(snapshot, CubeMode::Memory)?;
    Ok(engine)
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Render a key list for tables, `-` when empty
pub fn join_keys(keys: &[String]) -> String {
    if keys.is_empty() {
        "-".to_string()
    } else {
        keys.join(", ")
    }
}
