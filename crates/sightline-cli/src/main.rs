//! Sightline CLI - Automated insight discovery
//!
//! Usage:
//!   sightline explore --data CSV --save engine.json.gz   Rank views of a dataset
//!   sightline associate --snapshot FILE --measures m      Related views
//!   sightline outliers --snapshot FILE --dimensions d --measures m
//!   sightline serve-stdio                                 JSON task loop

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so stdout stays clean for JSON output
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Explore {
            data,
            dimensions,
            measures,
            max_dimensions,
            max_measures,
            top,
            json,
            save,
            cube,
        } => commands::cmd_explore(
            config,
            &commands::ExploreOptions {
                data,
                dimensions: commands::split_list(dimensions.as_deref()),
                measures: commands::split_list(measures.as_deref()),
                max_dimensions,
                max_measures,
                top,
                json,
                save,
                cube,
            },
        ),
        Commands::Associate {
            snapshot,
            dimensions,
            measures,
            json,
        } => commands::cmd_associate(
            &snapshot,
            commands::split_list(dimensions.as_deref()),
            commands::split_list(Some(&measures)),
            json,
        ),
        Commands::Aggregate {
            snapshot,
            dimensions,
            measures,
            ops,
        } => commands::cmd_aggregate(
            &snapshot,
            commands::split_list(dimensions.as_deref()),
            commands::split_list(Some(&measures)),
            &ops,
        ),
        Commands::Outliers {
            snapshot,
            dimensions,
            measures,
            top,
        } => commands::cmd_outliers(
            &snapshot,
            commands::split_list(Some(&dimensions)),
            commands::split_list(Some(&measures)),
            top,
        ),
        Commands::ServeStdio => commands::cmd_serve_stdio(config),
        Commands::Config { action } => match action {
            ConfigAction::Path => commands::cmd_config_path(),
            ConfigAction::Show => commands::cmd_config_show(config),
        },
    }
}
