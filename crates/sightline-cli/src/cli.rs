//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sightline - Find the interesting views in a table
#[derive(Parser)]
#[command(name = "sightline")]
#[command(about = "Automated insight discovery over tabular data", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine config file (defaults to the data-dir override, then built-in)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline over a CSV file and rank views
    Explore {
        /// CSV file to analyse
        #[arg(short, long)]
        data: PathBuf,

        /// Comma-separated dimension columns (inferred if not specified)
        #[arg(long)]
        dimensions: Option<String>,

        /// Comma-separated measure columns (inferred if not specified)
        #[arg(long)]
        measures: Option<String>,

        /// Maximum dimensions per view
        #[arg(long)]
        max_dimensions: Option<usize>,

        /// Maximum measures per view
        #[arg(long)]
        max_measures: Option<usize>,

        /// Number of views to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Print the pipeline output as JSON
        #[arg(long)]
        json: bool,

        /// Write an engine snapshot for later queries
        #[arg(long)]
        save: Option<PathBuf>,

        /// Cube backend: memory, disk
        #[arg(long, default_value = "memory")]
        cube: String,
    },

    /// Find views related to one view in a snapshot
    Associate {
        /// Snapshot written by `explore --save`
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Comma-separated dimensions of the reference view
        #[arg(long)]
        dimensions: Option<String>,

        /// Comma-separated measures of the reference view
        #[arg(long)]
        measures: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print aggregated rows of one cuboid in a snapshot
    Aggregate {
        /// Snapshot written by `explore --save`
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Comma-separated group-by dimensions
        #[arg(long)]
        dimensions: Option<String>,

        /// Comma-separated measures
        #[arg(long)]
        measures: String,

        /// Comma-separated ops, one per measure or one for all: sum, count, mean, min, max, dist
        #[arg(long, default_value = "sum")]
        ops: String,
    },

    /// Rank the groups of one view by divergence from the global distribution
    Outliers {
        /// Snapshot written by `explore --save`
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Comma-separated dimensions of the view
        #[arg(long)]
        dimensions: String,

        /// Comma-separated measures of the view
        #[arg(long)]
        measures: String,

        /// Number of groups to show
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// Serve JSON task requests on stdin, one per line
    ServeStdio,

    /// Engine configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show where the config override should be placed
    Path,
    /// Print the effective configuration
    Show,
}
