//! In-memory cuboid cache

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{AggregationCube, CubeSchema, Cuboid, CuboidKey};
use crate::error::Result;

/// Keeps every cuboid in a hash map of shared tables
pub struct MemoryCube {
    schema: CubeSchema,
    cuboids: FxHashMap<CuboidKey, Arc<Cuboid>>,
}

impl MemoryCube {
    pub fn new(schema: CubeSchema) -> Self {
        Self {
            schema,
            cuboids: FxHashMap::default(),
        }
    }
}

impl AggregationCube for MemoryCube {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn schema(&self) -> &CubeSchema {
        &self.schema
    }

    fn register(&mut self, cuboid: Cuboid) -> Result<bool> {
        if self.cuboids.contains_key(&cuboid.key) {
            return Ok(false);
        }
        self.cuboids.insert(cuboid.key.clone(), Arc::new(cuboid));
        Ok(true)
    }

    fn fetch(&self, key: &CuboidKey) -> Result<Option<Arc<Cuboid>>> {
        Ok(self.cuboids.get(key).cloned())
    }

    fn contains(&self, key: &CuboidKey) -> bool {
        self.cuboids.contains_key(key)
    }

    fn keys(&self) -> Vec<CuboidKey> {
        let mut keys: Vec<CuboidKey> = self.cuboids.keys().cloned().collect();
        keys.sort();
        keys
    }
}
