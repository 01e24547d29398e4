//! Task loop over stdin/stdout

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sightline_core::{Dispatcher, EngineConfig, MemoryProgressStore};
use tracing::info;

/// Answer each non-blank request line with one response line.
/// Returns the number of requests handled.
pub fn serve_lines<R: BufRead, W: Write>(dispatcher: &mut Dispatcher, reader: R, mut writer: W) -> Result<usize> {
    let mut handled = 0;
    for line in reader.lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = dispatcher.handle_json(&line);
        writeln!(writer, "{}", response).context("Failed to write response")?;
        writer.flush()?;
        handled += 1;
    }
    Ok(handled)
}

pub fn cmd_serve_stdio(config_path: Option<&Path>) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    let mut dispatcher = Dispatcher::new(config).with_progress(Arc::new(MemoryProgressStore::new()));

    info!("Serving task requests on stdin");
    let stdin = io::stdin();
    let stdout = io::stdout();
    let handled = serve_lines(&mut dispatcher, stdin.lock(), stdout.lock())?;
    info!(handled, "Input closed, shutting down");
    Ok(())
}
