//! Config commands

use std::path::Path;

use anyhow::Result;
use sightline_core::{default_config_path, EngineConfig};

/// Show the path where the config override should be placed
pub fn cmd_config_path() -> Result<()> {
    match default_config_path() {
        Some(path) => {
            println!("{}", path.display());

            if !path.exists() {
                eprintln!();
                eprintln!("Note: This file does not exist yet.");
                eprintln!("Create it to override the built-in engine settings.");
            }
        }
        None => {
            eprintln!("Could not determine config location.");
            eprintln!("The data directory is not available on this system.");
        }
    }

    Ok(())
}

/// Print the configuration the engine would run with
pub fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
