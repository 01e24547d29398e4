//! Candidate view enumeration
//!
//! Views are drawn from the same clusters the cube was materialized for:
//! dimension sets come from the cube's registered cuboids and measure sets
//! from the measure clusters. Each measure cluster contributes every subset
//! of at most `limits.measure` measures, so oversized clusters are expanded
//! rather than truncated.

use rustc_hash::FxHashSet;

use crate::models::{ViewLimits, ViewSpace};
use crate::statistics::{combinations, combinations_in_range};

#[derive(Debug, Clone, Copy, Default)]
pub struct SubspaceEnumerator {
    limits: ViewLimits,
}

impl SubspaceEnumerator {
    pub fn new(limits: ViewLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ViewLimits {
        self.limits
    }

    /// Measure sets for views without dimensions. Clusters larger than the
    /// measure limit are split into all subsets of exactly that size.
    pub fn measure_only_views(&self, m_clusters: &[Vec<String>]) -> Vec<ViewSpace> {
        let mut out = Vec::new();
        for cluster in m_clusters {
            if cluster.is_empty() {
                continue;
            }
            if cluster.len() > self.limits.measure {
                out.extend(
                    combinations(cluster, self.limits.measure)
                        .into_iter()
                        .map(|measures| ViewSpace::new(Vec::new(), measures)),
                );
            } else {
                out.push(ViewSpace::new(Vec::new(), cluster.clone()));
            }
        }
        dedup_views(out)
    }

    /// Cross product of dimension sets and measure subsets, within limits and
    /// without duplicate keys. Empty dimension sets are skipped; those views
    /// are covered by `measure_only_views`.
    pub fn enumerate(&self, dimension_sets: &[Vec<String>], m_clusters: &[Vec<String>]) -> Vec<ViewSpace> {
        let measure_sets: Vec<Vec<String>> = m_clusters
            .iter()
            .flat_map(|cluster| combinations_in_range(cluster, 1, self.limits.measure))
            .collect();

        let mut views = Vec::new();
        for dimensions in dimension_sets {
            if dimensions.is_empty() || dimensions.len() > self.limits.dimension {
                continue;
            }
            for measures in &measure_sets {
                views.push(ViewSpace::new(dimensions.clone(), measures.clone()));
            }
        }
        let views = dedup_views(views);
        tracing::debug!(
            dimension_sets = dimension_sets.len(),
            measure_sets = measure_sets.len(),
            views = views.len(),
            "Enumerated subspaces"
        );
        views
    }
}

/// Drop views whose key was already seen, keeping the first
pub fn dedup_views(views: Vec<ViewSpace>) -> Vec<ViewSpace> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    views.into_iter().filter(|v| seen.insert(v.key())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_measure_only_views_expand_large_clusters() {
        let enumerator = SubspaceEnumerator::new(ViewLimits {
            dimension: 2,
            measure: 2,
        });
        let views = enumerator.measure_only_views(&[keys(&["a", "b", "c"]), keys(&["d"])]);
        let measures: Vec<Vec<String>> = views.into_iter().map(|v| v.measures).collect();
        assert_eq!(
            measures,
            vec![
                keys(&["a", "b"]),
                keys(&["a", "c"]),
                keys(&["b", "c"]),
                keys(&["d"])
            ]
        );
    }

    #[test]
    fn test_enumerate_respects_limits_and_dedups() {
        let enumerator = SubspaceEnumerator::new(ViewLimits {
            dimension: 1,
            measure: 2,
        });
        let dimension_sets = vec![keys(&[]), keys(&["x"]), keys(&["x", "y"]), keys(&["x"])];
        let m_clusters = vec![keys(&["m1", "m2"]), keys(&["m2"])];
        let views = enumerator.enumerate(&dimension_sets, &m_clusters);

        // [m1], [m2], [m1, m2] under dimension x only
        assert_eq!(views.len(), 3);
        assert!(views.iter().all(|v| v.dimensions == keys(&["x"])));
        assert!(views.iter().all(|v| v.fits(&enumerator.limits())));

        let unique: FxHashSet<String> = views.iter().map(|v| v.key()).collect();
        assert_eq!(unique.len(), views.len());
    }

    #[test]
    fn test_enumerate_without_measures_is_empty() {
        let enumerator = SubspaceEnumerator::default();
        assert!(enumerator.enumerate(&[keys(&["x"])], &[]).is_empty());
    }
}
