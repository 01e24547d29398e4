//! Correlation graph over dimensions and measures
//!
//! Holds the dimension matrix `dg`, the measure matrix `mg` and the clusters
//! derived from them. Both the pairwise coefficient and the clustering rule
//! are strategy objects chosen at construction:
//!
//! - `CramersV` for dimension pairs (contingency based, in `[0, 1]`)
//! - `AbsPearson` for measure pairs (`|r|` over rows where both are numeric)
//! - `ThresholdNeighborhood` for clusters: one candidate per field holding
//!   every field at or above the threshold, set-equal candidates dropped

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::models::{Row, Scalar};

static NULL: Scalar = Scalar::Null;

/// Symmetric, bounded association between two columns
pub trait Coefficient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Association in `[0, 1]`; columns are aligned by row
    fn coefficient(&self, left: &[&Scalar], right: &[&Scalar]) -> f64;
}

/// Cramér's V over the contingency table of two categorical columns.
///
/// Nulls form their own category. A column with at most one category is
/// fully associated with anything (`1.0`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CramersV;

fn encode<'a>(column: &[&'a Scalar]) -> (Vec<u32>, usize) {
    let mut ids: FxHashMap<&'a Scalar, u32> = FxHashMap::default();
    let codes = column
        .iter()
        .map(|v| {
            let next = ids.len() as u32;
            *ids.entry(*v).or_insert(next)
        })
        .collect();
    (codes, ids.len())
}

impl Coefficient for CramersV {
    fn name(&self) -> &'static str {
        "cramers_v"
    }

    fn coefficient(&self, left: &[&Scalar], right: &[&Scalar]) -> f64 {
        let (a, rows) = encode(left);
        let (b, cols) = encode(right);
        if rows <= 1 || cols <= 1 {
            return 1.0;
        }
        let n = a.len().min(b.len());
        if n == 0 {
            return 0.0;
        }

        let mut row_sums = vec![0u64; rows];
        let mut col_sums = vec![0u64; cols];
        let mut cells: FxHashMap<(u32, u32), u64> = FxHashMap::default();
        for (&x, &y) in a.iter().zip(b.iter()) {
            row_sums[x as usize] += 1;
            col_sums[y as usize] += 1;
            *cells.entry((x, y)).or_insert(0) += 1;
        }

        // chi2 = n * (sum(obs^2 / (row * col)) - 1)
        let mut ratio = 0.0;
        for (&(x, y), &obs) in &cells {
            let expected = row_sums[x as usize] as f64 * col_sums[y as usize] as f64;
            ratio += (obs as f64).powi(2) / expected;
        }
        let chi2 = n as f64 * (ratio - 1.0);
        let k = (rows.min(cols) - 1) as f64;
        (chi2 / (n as f64 * k)).max(0.0).sqrt().min(1.0)
    }
}

/// Absolute Pearson correlation over rows where both values are numeric.
/// Zero variance (or fewer than two rows) scores `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsPearson;

impl Coefficient for AbsPearson {
    fn name(&self) -> &'static str {
        "abs_pearson"
    }

    fn coefficient(&self, left: &[&Scalar], right: &[&Scalar]) -> f64 {
        let pairs: Vec<(f64, f64)> = left
            .iter()
            .zip(right.iter())
            .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
            .collect();
        if pairs.len() < 2 {
            return 0.0;
        }
        let n = pairs.len() as f64;
        let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
        let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
        for (x, y) in &pairs {
            let dx = x - mean_x;
            let dy = y - mean_y;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }
        if var_x <= 0.0 || var_y <= 0.0 {
            return 0.0;
        }
        (cov / (var_x.sqrt() * var_y.sqrt())).abs().min(1.0)
    }
}

/// Turns a correlation matrix into field clusters
pub trait ClusterStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Clusters of positions into `matrix`; no two clusters are set-equal
    fn cluster(&self, matrix: &[Vec<f64>], threshold: f64) -> Vec<Vec<usize>>;
}

/// For each field `i`, the cluster `{ j : matrix[i][j] >= threshold }`.
/// Duplicates keep their first occurrence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdNeighborhood;

impl ClusterStrategy for ThresholdNeighborhood {
    fn name(&self) -> &'static str {
        "threshold_neighborhood"
    }

    fn cluster(&self, matrix: &[Vec<f64>], threshold: f64) -> Vec<Vec<usize>> {
        let mut seen: FxHashSet<Vec<usize>> = FxHashSet::default();
        let mut clusters = Vec::new();
        for row in matrix {
            let members: Vec<usize> = row
                .iter()
                .enumerate()
                .filter(|(_, &v)| v >= threshold)
                .map(|(j, _)| j)
                .collect();
            // members are ascending, so set equality is vec equality
            if seen.insert(members.clone()) {
                clusters.push(members);
            }
        }
        clusters
    }
}

/// Coefficients and clustering used to build a graph
#[derive(Clone)]
pub struct GraphStrategy {
    pub dimension_coefficient: Arc<dyn Coefficient>,
    pub measure_coefficient: Arc<dyn Coefficient>,
    pub clustering: Arc<dyn ClusterStrategy>,
}

impl Default for GraphStrategy {
    fn default() -> Self {
        Self {
            dimension_coefficient: Arc::new(CramersV),
            measure_coefficient: Arc::new(AbsPearson),
            clustering: Arc::new(ThresholdNeighborhood),
        }
    }
}

impl fmt::Debug for GraphStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphStrategy")
            .field("dimension_coefficient", &self.dimension_coefficient.name())
            .field("measure_coefficient", &self.measure_coefficient.name())
            .field("clustering", &self.clustering.name())
            .finish()
    }
}

/// Pairwise association matrices and the clusters derived from them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationGraph {
    #[serde(skip)]
    strategy: GraphStrategy,
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    pub dg: Vec<Vec<f64>>,
    pub mg: Vec<Vec<f64>>,
    pub d_clusters: Vec<Vec<String>>,
    pub m_clusters: Vec<Vec<String>>,
}

impl CorrelationGraph {
    pub fn new(dimensions: Vec<String>, measures: Vec<String>) -> Self {
        Self::with_strategy(dimensions, measures, GraphStrategy::default())
    }

    pub fn with_strategy(dimensions: Vec<String>, measures: Vec<String>, strategy: GraphStrategy) -> Self {
        Self {
            strategy,
            dimensions,
            measures,
            dg: Vec::new(),
            mg: Vec::new(),
            d_clusters: Vec::new(),
            m_clusters: Vec::new(),
        }
    }

    pub fn compute_dgraph(&mut self, rows: &[Row]) -> &[Vec<f64>] {
        self.dg = correlation_matrix(rows, &self.dimensions, self.strategy.dimension_coefficient.as_ref());
        tracing::debug!(
            coefficient = self.strategy.dimension_coefficient.name(),
            fields = self.dimensions.len(),
            "Computed dimension graph"
        );
        &self.dg
    }

    pub fn compute_mgraph(&mut self, rows: &[Row]) -> &[Vec<f64>] {
        self.mg = correlation_matrix(rows, &self.measures, self.strategy.measure_coefficient.as_ref());
        tracing::debug!(
            coefficient = self.strategy.measure_coefficient.name(),
            fields = self.measures.len(),
            "Computed measure graph"
        );
        &self.mg
    }

    pub fn cluster_dimensions(&mut self, threshold: f64) -> &[Vec<String>] {
        let clusters = self.strategy.clustering.cluster(&self.dg, threshold);
        self.d_clusters = to_keys(&clusters, &self.dimensions);
        tracing::debug!(threshold, clusters = self.d_clusters.len(), "Clustered dimensions");
        &self.d_clusters
    }

    pub fn cluster_measures(&mut self, threshold: f64) -> &[Vec<String>] {
        let clusters = self.strategy.clustering.cluster(&self.mg, threshold);
        self.m_clusters = to_keys(&clusters, &self.measures);
        tracing::debug!(threshold, clusters = self.m_clusters.len(), "Clustered measures");
        &self.m_clusters
    }

    /// `dg` entry for two dimension keys
    pub fn dimension_correlation(&self, a: &str, b: &str) -> Option<f64> {
        lookup(&self.dg, &self.dimensions, a, b)
    }

    /// `mg` entry for two measure keys
    pub fn measure_correlation(&self, a: &str, b: &str) -> Option<f64> {
        lookup(&self.mg, &self.measures, a, b)
    }
}

fn lookup(matrix: &[Vec<f64>], keys: &[String], a: &str, b: &str) -> Option<f64> {
    let i = keys.iter().position(|k| k == a)?;
    let j = keys.iter().position(|k| k == b)?;
    matrix.get(i)?.get(j).copied()
}

fn to_keys(clusters: &[Vec<usize>], keys: &[String]) -> Vec<Vec<String>> {
    clusters
        .iter()
        .map(|c| c.iter().filter_map(|&i| keys.get(i).cloned()).collect())
        .collect()
}

/// Symmetric matrix with a unit diagonal; pairs are computed in parallel.
/// Non-finite coefficients are stored as 0.
fn correlation_matrix(rows: &[Row], keys: &[String], coefficient: &dyn Coefficient) -> Vec<Vec<f64>> {
    let columns: Vec<Vec<&Scalar>> = keys
        .iter()
        .map(|k| rows.iter().map(|r| r.get(k).unwrap_or(&NULL)).collect())
        .collect();

    let n = keys.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    let values: Vec<f64> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let value = coefficient.coefficient(&columns[i], &columns[j]);
            if value.is_finite() {
                value.clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();

    let mut matrix = vec![vec![0.0; n]; n];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    for ((i, j), value) in pairs.into_iter().zip(values) {
        matrix[i][j] = value;
        matrix[j][i] = value;
    }
    matrix
}
