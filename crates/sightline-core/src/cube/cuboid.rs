//! Materialized group-by tables
//!
//! A cuboid holds one group per distinct combination of its dimension
//! values. Each group keeps mergeable per-measure statistics (sum, count,
//! min, max and a histogram), so any cuboid can be rolled up into a cuboid
//! over a subset of its dimensions without touching the raw rows.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{CubeSchema, CuboidKey};
use crate::error::{Error, Result};
use crate::models::{Row, Scalar, StatOp};
use crate::statistics::DEFAULT_BIN_NUM;

/// Dimension values identifying one group, in cuboid dimension order.
pub type GroupKey = SmallVec<[Scalar; 4]>;

/// Mergeable statistics of one measure within one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureStats {
    pub sum: f64,
    /// Number of non-null values
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Histogram over the measure's global range
    pub bins: [u64; DEFAULT_BIN_NUM],
}

impl Default for MeasureStats {
    fn default() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: None,
            max: None,
            bins: [0; DEFAULT_BIN_NUM],
        }
    }
}

impl MeasureStats {
    fn push(&mut self, value: f64, bin: usize) {
        self.sum += value;
        self.count += 1;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.bins[bin] += 1;
    }

    fn merge(&mut self, other: &MeasureStats) {
        self.sum += other.sum;
        self.count += other.count;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        for (bin, add) in self.bins.iter_mut().zip(other.bins.iter()) {
            *bin += add;
        }
    }

    fn value(&self, op: StatOp) -> AggregateValue {
        match op {
            StatOp::Sum => AggregateValue::Value(Some(self.sum)),
            StatOp::Count => AggregateValue::Value(Some(self.count as f64)),
            StatOp::Mean => AggregateValue::Value(if self.count > 0 {
                Some(self.sum / self.count as f64)
            } else {
                None
            }),
            StatOp::Min => AggregateValue::Value(self.min),
            StatOp::Max => AggregateValue::Value(self.max),
            StatOp::Dist => AggregateValue::Dist(self.bins.to_vec()),
        }
    }
}

/// One group of a cuboid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuboidGroup {
    pub values: GroupKey,
    /// Number of source rows in the group
    pub rows: u64,
    /// Aligned with the cube's measures
    pub stats: Vec<MeasureStats>,
}

impl CuboidGroup {
    fn empty(values: GroupKey, measure_count: usize) -> Self {
        Self {
            values,
            rows: 0,
            stats: vec![MeasureStats::default(); measure_count],
        }
    }

    fn merge(&mut self, other: &CuboidGroup) {
        self.rows += other.rows;
        for (stats, add) in self.stats.iter_mut().zip(other.stats.iter()) {
            stats.merge(add);
        }
    }
}

/// Result of one aggregated measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    /// Scalar aggregate; `None` when undefined (mean/min/max of no values)
    Value(Option<f64>),
    /// Histogram of `DEFAULT_BIN_NUM` bins
    Dist(Vec<u64>),
}

impl AggregateValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AggregateValue::Value(v) => *v,
            AggregateValue::Dist(_) => None,
        }
    }

    pub fn as_dist(&self) -> Option<&[u64]> {
        match self {
            AggregateValue::Dist(bins) => Some(bins),
            AggregateValue::Value(_) => None,
        }
    }
}

/// One group of a cuboid, with the requested measures aggregated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub dimensions: BTreeMap<String, Scalar>,
    pub values: BTreeMap<String, AggregateValue>,
}

/// Materialized aggregate table for one dimension subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    pub key: CuboidKey,
    /// Dimension names in canonical order
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    groups: Vec<CuboidGroup>,
}

impl Cuboid {
    /// Aggregate raw rows over every dimension of the schema
    pub fn from_rows(schema: &CubeSchema, rows: &[Row]) -> Self {
        let key = schema.base_key();
        let measure_count = schema.measures.len();
        let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();
        let mut groups: Vec<CuboidGroup> = Vec::new();

        for row in rows {
            let values: GroupKey = schema
                .dimensions
                .iter()
                .map(|d| row.get(d).cloned().unwrap_or_default())
                .collect();
            let slot = match index.get(&values) {
                Some(&slot) => slot,
                None => {
                    groups.push(CuboidGroup::empty(values.clone(), measure_count));
                    index.insert(values, groups.len() - 1);
                    groups.len() - 1
                }
            };
            let group = &mut groups[slot];
            group.rows += 1;
            for (m, measure) in schema.measures.iter().enumerate() {
                if let Some(value) = row.get(measure).and_then(Scalar::as_f64) {
                    group.stats[m].push(value, schema.bin_of(m, value));
                }
            }
        }

        Self {
            dimensions: schema.dimension_names(&key),
            measures: schema.measures.clone(),
            key,
            groups,
        }
    }

    /// Merge groups into a cuboid over `target`, which must be a subset of
    /// this cuboid's key. Group order follows first appearance.
    pub fn rollup(&self, target: &CuboidKey, schema: &CubeSchema) -> Result<Cuboid> {
        let positions: Vec<usize> = target
            .indices()
            .iter()
            .map(|idx| {
                self.key
                    .indices()
                    .iter()
                    .position(|own| own == idx)
                    .ok_or_else(|| Error::CuboidMissing(schema.label(target)))
            })
            .collect::<Result<_>>()?;

        let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();
        let mut groups: Vec<CuboidGroup> = Vec::new();
        for group in &self.groups {
            let values: GroupKey = positions.iter().map(|&p| group.values[p].clone()).collect();
            match index.get(&values) {
                Some(&slot) => groups[slot].merge(group),
                None => {
                    let mut merged = CuboidGroup::empty(values.clone(), self.measures.len());
                    merged.merge(group);
                    groups.push(merged);
                    index.insert(values, groups.len() - 1);
                }
            }
        }

        Ok(Cuboid {
            key: target.clone(),
            dimensions: schema.dimension_names(target),
            measures: self.measures.clone(),
            groups,
        })
    }

    pub fn groups(&self) -> &[CuboidGroup] {
        &self.groups
    }

    /// Number of groups
    pub fn size(&self) -> usize {
        self.groups.len()
    }

    fn measure_index(&self, measure: &str) -> Result<usize> {
        self.measures
            .iter()
            .position(|m| m == measure)
            .ok_or_else(|| Error::UnknownField(measure.to_string()))
    }

    /// One row per group, each measure aggregated with the op at the same
    /// position in `ops`.
    pub fn aggregated_rows(&self, measures: &[String], ops: &[StatOp]) -> Result<Vec<AggregatedRow>> {
        if measures.len() != ops.len() {
            return Err(Error::InvalidData(format!(
                "{} measures but {} aggregation ops",
                measures.len(),
                ops.len()
            )));
        }
        let slots: Vec<usize> = measures
            .iter()
            .map(|m| self.measure_index(m))
            .collect::<Result<_>>()?;

        Ok(self
            .groups
            .iter()
            .map(|group| AggregatedRow {
                dimensions: self
                    .dimensions
                    .iter()
                    .cloned()
                    .zip(group.values.iter().cloned())
                    .collect(),
                values: measures
                    .iter()
                    .zip(slots.iter().zip(ops))
                    .map(|(name, (&slot, &op))| (name.clone(), group.stats[slot].value(op)))
                    .collect(),
            })
            .collect())
    }

    /// Histogram of `measure` for every group, in group order
    pub fn distributions(&self, measure: &str) -> Result<Vec<[u64; DEFAULT_BIN_NUM]>> {
        let slot = self.measure_index(measure)?;
        Ok(self.groups.iter().map(|g| g.stats[slot].bins).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(region: &str, product: &str, sales: f64) -> Row {
        let mut r = Row::new();
        r.insert("region".to_string(), region.into());
        r.insert("product".to_string(), product.into());
        r.insert("sales".to_string(), sales.into());
        r
    }

    fn dataset() -> Vec<Row> {
        vec![
            row("north", "a", 10.0),
            row("north", "b", 20.0),
            row("south", "a", 30.0),
            row("north", "a", 40.0),
        ]
    }

    fn schema(rows: &[Row]) -> CubeSchema {
        CubeSchema::from_rows(
            vec!["region".to_string(), "product".to_string()],
            vec!["sales".to_string()],
            rows,
            2,
        )
    }

    #[test]
    fn test_from_rows_groups_by_all_dimensions() {
        let rows = dataset();
        let schema = schema(&rows);
        let base = Cuboid::from_rows(&schema, &rows);
        assert_eq!(base.size(), 3);
        assert_eq!(base.groups()[0].rows, 2);
        assert_eq!(base.groups()[0].stats[0].sum, 50.0);
    }

    #[test]
    fn test_rollup_merges_groups() {
        let rows = dataset();
        let schema = schema(&rows);
        let base = Cuboid::from_rows(&schema, &rows);
        let region = schema.key_for(&["region".to_string()]).unwrap();
        let cuboid = base.rollup(&region, &schema).unwrap();

        let out = cuboid
            .aggregated_rows(
                &["sales".to_string(), "sales".to_string()],
                &[StatOp::Sum, StatOp::Count],
            )
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].dimensions["region"], Scalar::from("north"));
        // second op wins for a repeated measure
        assert_eq!(out[0].values["sales"].as_f64(), Some(3.0));

        let sums = cuboid
            .aggregated_rows(&["sales".to_string()], &[StatOp::Mean])
            .unwrap();
        assert_eq!(sums[1].values["sales"].as_f64(), Some(30.0));
    }

    #[test]
    fn test_global_rollup_histogram_spans_range() {
        let rows = dataset();
        let schema = schema(&rows);
        let base = Cuboid::from_rows(&schema, &rows);
        let global = base.rollup(&CuboidKey::global(), &schema).unwrap();
        assert_eq!(global.size(), 1);

        let dist = global.distributions("sales").unwrap();
        assert_eq!(dist[0].iter().sum::<u64>(), 4);
        assert_eq!(dist[0][0], 1);
        assert_eq!(dist[0][DEFAULT_BIN_NUM - 1], 1);
    }

    #[test]
    fn test_rollup_to_non_subset_fails() {
        let rows = dataset();
        let schema = schema(&rows);
        let base = Cuboid::from_rows(&schema, &rows);
        let region = schema.key_for(&["region".to_string()]).unwrap();
        let by_region = base.rollup(&region, &schema).unwrap();
        let product = schema.key_for(&["product".to_string()]).unwrap();
        assert!(matches!(
            by_region.rollup(&product, &schema),
            Err(Error::CuboidMissing(_))
        ));
    }

    #[test]
    fn test_aggregated_rows_validates_input() {
        let rows = dataset();
        let schema = schema(&rows);
        let base = Cuboid::from_rows(&schema, &rows);
        assert!(matches!(
            base.aggregated_rows(&["sales".to_string()], &[]),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            base.aggregated_rows(&["profit".to_string()], &[StatOp::Sum]),
            Err(Error::UnknownField(_))
        ));
    }

    #[test]
    fn test_missing_values_are_not_counted() {
        let mut rows = dataset();
        let mut blank = row("south", "b", 0.0);
        blank.insert("sales".to_string(), Scalar::Null);
        rows.push(blank);
        let schema = schema(&rows);
        let base = Cuboid::from_rows(&schema, &rows);
        let out = base
            .aggregated_rows(&["sales".to_string()], &[StatOp::Mean])
            .unwrap();
        assert_eq!(out[3].values["sales"], AggregateValue::Value(None));
        assert_eq!(base.groups()[3].rows, 1);
    }
}
