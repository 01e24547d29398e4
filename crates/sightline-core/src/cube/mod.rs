//! Aggregation cube with pluggable cuboid storage
//!
//! # Architecture
//!
//! - `AggregationCube` trait defines the cache contract shared by backends
//! - `MemoryCube` keeps every cuboid in a hash map
//! - `DiskCube` spills each cuboid to a gzip JSON file and loads it on access
//!
//! Only the base cuboid is aggregated from raw rows. Every other cuboid is a
//! rollup of a cuboid over a superset of its dimensions, so cluster builds
//! never rescan the dataset.
//!
//! # Keys
//!
//! A cuboid key is the sorted list of dimension positions in the cube schema,
//! so `[b, a]` and `[a, b]` address the same cuboid.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Row;
use crate::statistics::{combinations_in_range, DEFAULT_BIN_NUM};

mod cuboid;
mod disk;
mod memory;

pub use cuboid::{AggregateValue, AggregatedRow, Cuboid, CuboidGroup, GroupKey, MeasureStats};
pub use disk::DiskCube;
pub use memory::MemoryCube;

/// Canonical, order-independent identity of a dimension subset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CuboidKey(Vec<usize>);

impl CuboidKey {
    /// Key of the cuboid with no dimensions
    pub fn global() -> Self {
        Self(Vec::new())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_global(&self) -> bool {
        self.0.is_empty()
    }
}

/// Field layout and value ranges shared by every cuboid of one cube
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeSchema {
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    /// Global `(min, max)` of each measure, aligned with `measures`
    pub ranges: Vec<(f64, f64)>,
    /// Largest dimension subset materialized below a cluster cuboid
    pub subset_limit: usize,
}

impl CubeSchema {
    pub fn from_rows(
        dimensions: Vec<String>,
        measures: Vec<String>,
        rows: &[Row],
        subset_limit: usize,
    ) -> Self {
        let ranges = measures
            .iter()
            .map(|m| {
                rows.iter()
                    .filter_map(|r| r.get(m).and_then(|v| v.as_f64()))
                    .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                        None => Some((v, v)),
                    })
                    .unwrap_or((0.0, 0.0))
            })
            .collect();
        Self {
            dimensions,
            measures,
            ranges,
            subset_limit,
        }
    }

    /// Key of the cuboid over every dimension
    pub fn base_key(&self) -> CuboidKey {
        CuboidKey((0..self.dimensions.len()).collect())
    }

    /// Canonical key for a set of dimension names
    pub fn key_for(&self, dimensions: &[String]) -> Result<CuboidKey> {
        let mut indices = BTreeSet::new();
        for name in dimensions {
            let idx = self
                .dimensions
                .iter()
                .position(|d| d == name)
                .ok_or_else(|| Error::UnknownField(name.clone()))?;
            indices.insert(idx);
        }
        Ok(CuboidKey(indices.into_iter().collect()))
    }

    pub fn dimension_names(&self, key: &CuboidKey) -> Vec<String> {
        key.0
            .iter()
            .filter_map(|&i| self.dimensions.get(i).cloned())
            .collect()
    }

    /// Human-readable key, used in errors and file names
    pub fn label(&self, key: &CuboidKey) -> String {
        self.dimension_names(key).join(",")
    }

    /// Histogram bin of a value of measure `m`
    pub fn bin_of(&self, m: usize, value: f64) -> usize {
        let (lo, hi) = self.ranges.get(m).copied().unwrap_or((0.0, 0.0));
        if hi <= lo {
            return 0;
        }
        let pos = ((value - lo) / (hi - lo) * DEFAULT_BIN_NUM as f64).floor();
        if pos <= 0.0 {
            0
        } else {
            (pos as usize).min(DEFAULT_BIN_NUM - 1)
        }
    }
}

/// Cache of materialized cuboids
///
/// Implementations only store and fetch; building, rollup planning and key
/// resolution are provided on top of those primitives. Inserts are
/// append-only: registering an existing key keeps the stored cuboid.
pub trait AggregationCube: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    fn schema(&self) -> &CubeSchema;

    /// Store a cuboid unless its key is already present. Returns whether
    /// the cuboid was inserted.
    fn register(&mut self, cuboid: Cuboid) -> Result<bool>;

    /// Load a stored cuboid
    fn fetch(&self, key: &CuboidKey) -> Result<Option<Arc<Cuboid>>>;

    fn contains(&self, key: &CuboidKey) -> bool;

    /// Keys of every stored cuboid, sorted
    fn keys(&self) -> Vec<CuboidKey>;

    /// Whether the base and global cuboids exist
    fn is_built(&self) -> bool {
        self.contains(&self.schema().base_key()) && self.contains(&CuboidKey::global())
    }

    /// Aggregate the rows over every dimension, then roll up the global
    /// cuboid from it.
    fn build_base_cuboid(&mut self, rows: &[Row]) -> Result<()> {
        let base = Cuboid::from_rows(self.schema(), rows);
        let global = base.rollup(&CuboidKey::global(), self.schema())?;
        tracing::debug!(
            backend = self.name(),
            groups = base.size(),
            rows = rows.len(),
            "Built base cuboid"
        );
        self.register(base)?;
        self.register(global)?;
        Ok(())
    }

    /// Materialize one cluster cuboid and its subsets
    fn build_cuboid_on_cluster(&mut self, dimensions: &[String]) -> Result<usize> {
        self.build_cuboids_on_clusters(&[dimensions.to_vec()])
    }

    /// Materialize the cuboid of every cluster plus each non-empty subset of
    /// the cluster up to `subset_limit` dimensions. Clusters are rolled up in
    /// parallel; results are registered afterwards. Returns the number of
    /// newly registered cuboids.
    fn build_cuboids_on_clusters(&mut self, clusters: &[Vec<String>]) -> Result<usize> {
        if !self.is_built() {
            return Err(Error::CubeNotBuilt);
        }
        let schema = self.schema().clone();
        let base = self
            .fetch(&schema.base_key())?
            .ok_or(Error::CubeNotBuilt)?;

        let mut planned: FxHashSet<CuboidKey> = self.keys().into_iter().collect();
        let mut plans: Vec<(CuboidKey, Vec<CuboidKey>)> = Vec::new();
        for cluster in clusters {
            let cluster_key = schema.key_for(cluster)?;
            let mut targets = Vec::new();
            if planned.insert(cluster_key.clone()) {
                targets.push(cluster_key.clone());
            }
            for subset in combinations_in_range(cluster_key.indices(), 1, schema.subset_limit) {
                let key = CuboidKey(subset);
                if planned.insert(key.clone()) {
                    targets.push(key);
                }
            }
            if !targets.is_empty() {
                plans.push((cluster_key, targets));
            }
        }

        let built: Vec<Vec<Cuboid>> = plans
            .par_iter()
            .map(|(cluster_key, targets)| {
                let cluster = base.rollup(cluster_key, &schema)?;
                targets
                    .iter()
                    .map(|t| {
                        if t == cluster_key {
                            Ok(cluster.clone())
                        } else {
                            cluster.rollup(t, &schema)
                        }
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<_>>()?;

        let mut inserted = 0;
        for cuboid in built.into_iter().flatten() {
            if self.register(cuboid)? {
                inserted += 1;
            }
        }
        tracing::debug!(
            backend = self.name(),
            clusters = clusters.len(),
            inserted,
            "Built cluster cuboids"
        );
        Ok(inserted)
    }

    /// Cached cuboid for exactly this dimension set
    fn get_cuboid(&self, dimensions: &[String]) -> Result<Arc<Cuboid>> {
        if !self.is_built() {
            return Err(Error::CubeNotBuilt);
        }
        let key = self.schema().key_for(dimensions)?;
        self.fetch(&key)?
            .ok_or_else(|| Error::CuboidMissing(self.schema().label(&key)))
    }

    /// Dimension names of every stored cuboid
    fn registered_dimension_sets(&self) -> Vec<Vec<String>> {
        self.keys()
            .iter()
            .map(|k| self.schema().dimension_names(k))
            .collect()
    }

    /// Copies of every stored cuboid, in key order
    fn export_cuboids(&self) -> Result<Vec<Cuboid>> {
        let mut out = Vec::new();
        for key in self.keys() {
            if let Some(cuboid) = self.fetch(&key)? {
                out.push(cuboid.as_ref().clone());
            }
        }
        Ok(out)
    }
}

/// Cube backend selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CubeMode {
    #[default]
    Memory,
    Disk {
        /// Spill directory; a temporary directory when absent
        #[serde(default)]
        dir: Option<PathBuf>,
    },
}

impl CubeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CubeMode::Memory => "memory",
            CubeMode::Disk { .. } => "disk",
        }
    }

    /// Create an empty cube for this backend
    pub fn create(&self, schema: CubeSchema) -> Result<Box<dyn AggregationCube>> {
        match self {
            CubeMode::Memory => Ok(Box::new(MemoryCube::new(schema))),
            CubeMode::Disk { dir: Some(dir) } => Ok(Box::new(DiskCube::new(schema, dir.clone())?)),
            CubeMode::Disk { dir: None } => Ok(Box::new(DiskCube::temporary(schema)?)),
        }
    }
}

impl fmt::Display for CubeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CubeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "memory" => Ok(CubeMode::Memory),
            "disk" => Ok(CubeMode::Disk { dir: None }),
            _ => Err(format!("Unknown cube mode: {} (expected memory or disk)", s)),
        }
    }
}
