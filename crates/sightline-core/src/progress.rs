//! Progress reporting for long enumerations
//!
//! The scorer publishes a fraction in `[0, 1]` under `EXPLORE_PROGRESS_KEY`
//! every few candidate views. Writes are best effort: a failing store is
//! logged and ignored, never surfaced to the caller.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Key under which view exploration progress is published
pub const EXPLORE_PROGRESS_KEY: &str = "explore_progress";

/// Key-value sink for progress values
pub trait ProgressStore: Send + Sync {
    fn set(&self, key: &str, value: f64) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<f64>>;
}

/// Discards every write
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressStore;

impl ProgressStore for NoopProgressStore {
    fn set(&self, _key: &str, _value: f64) -> Result<()> {
        Ok(())
    }

    fn get(&self, _key: &str) -> Result<Option<f64>> {
        Ok(None)
    }
}

/// Keeps the latest value per key
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    values: Mutex<HashMap<String, f64>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn set(&self, key: &str, value: f64) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| Error::Progress(e.to_string()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<f64>> {
        let values = self
            .values
            .lock()
            .map_err(|e| Error::Progress(e.to_string()))?;
        Ok(values.get(key).copied())
    }
}

/// Write a progress value, swallowing failures
pub fn report(store: &dyn ProgressStore, key: &str, value: f64) {
    if let Err(e) = store.set(key, value) {
        tracing::warn!(key, error = %e, "Failed to publish progress");
    }
}
