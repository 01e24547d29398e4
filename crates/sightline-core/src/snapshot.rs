//! Engine snapshots for pause/resume
//!
//! A snapshot carries everything a scored engine computed: dataset, field
//! summaries, correlation graph, every materialized cuboid, candidate views
//! and the ranked insight spaces. Restoring one skips all recomputation.
//!
//! # Format
//!
//! JSON, optionally gzip compressed on disk. `checksum` is the hex SHA-256 of
//! the serialized dataset and is verified on load together with `version`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::EngineConfig;
use crate::cube::{CubeSchema, Cuboid};
use crate::error::{Error, Result};
use crate::fields::FieldSummary;
use crate::graph::CorrelationGraph;
use crate::models::{Field, InsightSpace, Row, ViewSpace};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Computed state of a scored engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub config: EngineConfig,
    pub fields: Vec<Field>,
    pub data: Vec<Row>,
    pub summaries: Vec<FieldSummary>,
    /// Dimensions kept by univariate selection
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    pub graph: CorrelationGraph,
    pub schema: CubeSchema,
    pub cuboids: Vec<Cuboid>,
    pub measure_views: Vec<ViewSpace>,
    pub subspaces: Vec<ViewSpace>,
    pub insight_spaces: Vec<InsightSpace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Hex SHA-256 of the serialized dataset
    pub checksum: String,
    pub state: EngineState,
}

/// Hex SHA-256 of the JSON form of the rows
pub fn dataset_checksum(data: &[Row]) -> Result<String> {
    let bytes = serde_json::to_vec(data)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

impl EngineSnapshot {
    pub fn new(state: EngineState) -> Result<Self> {
        Ok(Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            checksum: dataset_checksum(&state.data)?,
            state,
        })
    }

    /// Check version and dataset integrity
    pub fn verify(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        let actual = dataset_checksum(&self.state.data)?;
        if actual != self.checksum {
            return Err(Error::Snapshot(format!(
                "dataset checksum mismatch: expected {}, got {}",
                self.checksum, actual
            )));
        }
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read and verify a JSON snapshot
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let snapshot: Self = serde_json::from_reader(reader)?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    /// Write a gzip-compressed snapshot file
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        self.to_writer(&mut encoder)?;
        encoder.finish()?.flush()?;
        tracing::info!(
            path = %path.display(),
            insights = self.state.insight_spaces.len(),
            cuboids = self.state.cuboids.len(),
            "Saved engine snapshot"
        );
        Ok(())
    }

    /// Read and verify a gzip-compressed snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(GzDecoder::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scalar;

    fn state() -> EngineState {
        let mut row = Row::new();
        row.insert("region".to_string(), Scalar::from("north"));
        row.insert("sales".to_string(), Scalar::Number(12.5));
        let data = vec![row];
        EngineState {
            config: EngineConfig::default(),
            fields: vec![Field::dimension("region"), Field::measure("sales")],
            schema: CubeSchema::from_rows(vec!["region".to_string()], vec!["sales".to_string()], &data, 2),
            data,
            summaries: Vec::new(),
            dimensions: vec!["region".to_string()],
            measures: vec!["sales".to_string()],
            graph: CorrelationGraph::new(vec!["region".to_string()], vec!["sales".to_string()]),
            cuboids: Vec::new(),
            measure_views: Vec::new(),
            subspaces: Vec::new(),
            insight_spaces: Vec::new(),
        }
    }

    #[test]
    fn test_checksum_is_stable_hex() {
        let state = state();
        let a = dataset_checksum(&state.data).unwrap();
        let b = dataset_checksum(&state.data).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_tampered_dataset_is_rejected() {
        let mut snapshot = EngineSnapshot::new(state()).unwrap();
        snapshot.verify().unwrap();
        snapshot.state.data[0].insert("sales".to_string(), Scalar::Number(99.0));
        assert!(matches!(snapshot.verify(), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut snapshot = EngineSnapshot::new(state()).unwrap();
        snapshot.version = 99;
        assert!(matches!(snapshot.verify(), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json.gz");
        let snapshot = EngineSnapshot::new(state()).unwrap();
        snapshot.save(&path).unwrap();

        let loaded = EngineSnapshot::load(&path).unwrap();
        assert_eq!(loaded.checksum, snapshot.checksum);
        assert_eq!(loaded.saved_at, snapshot.saved_at);
        assert_eq!(loaded.state.data, snapshot.state.data);
        assert_eq!(loaded.state.fields, snapshot.state.fields);
    }
}
