//! Disk-backed cuboid cache
//!
//! Each cuboid is written to its own gzip-compressed JSON file and read back
//! on every access, so only the cuboids in use are held in memory.
//!
//! File naming: `cuboid-<i>-<j>.json.gz` from the key's dimension positions,
//! `cuboid-global.json.gz` for the global cuboid.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rustc_hash::FxHashMap;
use tempfile::TempDir;
use tracing::info;

use super::{AggregationCube, CubeSchema, Cuboid, CuboidKey};
use crate::error::{Error, Result};

/// Spills cuboids to a directory
pub struct DiskCube {
    schema: CubeSchema,
    dir: PathBuf,
    index: FxHashMap<CuboidKey, PathBuf>,
    /// Owns the directory when it is temporary; removed on drop
    _temp: Option<TempDir>,
}

impl DiskCube {
    /// Create a cube spilling into `dir`, creating it if needed
    pub fn new(schema: CubeSchema, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::InvalidData(format!(
                    "Failed to create cube directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            info!("Created cube directory: {}", dir.display());
        }
        Ok(Self {
            schema,
            dir,
            index: FxHashMap::default(),
            _temp: None,
        })
    }

    /// Create a cube spilling into a fresh temporary directory
    pub fn temporary(schema: CubeSchema) -> Result<Self> {
        let temp = tempfile::Builder::new().prefix("sightline-cube-").tempdir()?;
        let mut cube = Self::new(schema, temp.path())?;
        cube._temp = Some(temp);
        Ok(cube)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(key: &CuboidKey) -> String {
        if key.is_global() {
            return "cuboid-global.json.gz".to_string();
        }
        let parts: Vec<String> = key.indices().iter().map(|i| i.to_string()).collect();
        format!("cuboid-{}.json.gz", parts.join("-"))
    }

    fn write_cuboid(path: &Path, cuboid: &Cuboid) -> Result<()> {
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::fast());
        serde_json::to_writer(&mut encoder, cuboid)?;
        encoder.finish()?.flush()?;
        Ok(())
    }

    fn read_cuboid(path: &Path) -> Result<Cuboid> {
        let file = File::open(path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        Ok(serde_json::from_reader(decoder)?)
    }
}

impl AggregationCube for DiskCube {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn schema(&self) -> &CubeSchema {
        &self.schema
    }

    fn register(&mut self, cuboid: Cuboid) -> Result<bool> {
        if self.index.contains_key(&cuboid.key) {
            return Ok(false);
        }
        let path = self.dir.join(Self::file_name(&cuboid.key));
        Self::write_cuboid(&path, &cuboid)?;
        self.index.insert(cuboid.key, path);
        Ok(true)
    }

    fn fetch(&self, key: &CuboidKey) -> Result<Option<Arc<Cuboid>>> {
        match self.index.get(key) {
            Some(path) => Ok(Some(Arc::new(Self::read_cuboid(path)?))),
            None => Ok(None),
        }
    }

    fn contains(&self, key: &CuboidKey) -> bool {
        self.index.contains_key(key)
    }

    fn keys(&self) -> Vec<CuboidKey> {
        let mut keys: Vec<CuboidKey> = self.index.keys().cloned().collect();
        keys.sort();
        keys
    }
}
