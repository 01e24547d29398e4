//! Related-view search over the correlation graph
//!
//! Two passes over the ranked insight spaces, relative to a reference view:
//!
//! - by measure: candidates anchored on the same dimensions (or, for a
//!   reference without dimensions, on a shared measure) whose measures are
//!   strongly correlated with the reference's but not the same set
//! - by dimension: candidates sharing any field whose dimension set differs
//!   and is correlated with the reference's
//!
//! Scores are penalized by candidate cardinality so high-cardinality
//! dimensions do not dominate. The measure pass also divides by the
//! candidate's measure count, favoring focused views.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::AssociationConfig;
use crate::graph::CorrelationGraph;
use crate::models::{intersects, is_set_equal, InsightSpace, ViewSpace};

/// A related view with its post-penalty score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub view: ViewSpace,
    /// Average correlation with the reference view
    pub proximity: f64,
    /// Cardinality penalty the proximity was divided by
    pub card: f64,
    pub score: f64,
}

pub struct AssociationSearch<'a> {
    graph: &'a CorrelationGraph,
    /// Distinct values per dimension
    cardinality: &'a FxHashMap<String, usize>,
    config: AssociationConfig,
}

impl<'a> AssociationSearch<'a> {
    pub fn new(
        graph: &'a CorrelationGraph,
        cardinality: &'a FxHashMap<String, usize>,
        config: AssociationConfig,
    ) -> Self {
        Self {
            graph,
            cardinality,
            config,
        }
    }

    fn known_cards(&self, dimensions: &[String]) -> Vec<f64> {
        dimensions
            .iter()
            .filter_map(|d| self.cardinality.get(d))
            .map(|&c| c as f64)
            .collect()
    }

    /// Views whose measures are correlated with the reference's
    pub fn related_by_measure(&self, reference: &ViewSpace, spaces: &[InsightSpace]) -> Vec<Association> {
        let mut out = Vec::new();
        if reference.measures.is_empty() {
            return out;
        }
        let anchored_on_dimensions = !reference.dimensions.is_empty();

        for space in spaces {
            if space.measures.is_empty() || is_set_equal(&space.measures, &reference.measures) {
                continue;
            }
            let anchored = if anchored_on_dimensions {
                intersects(&space.dimensions, &reference.dimensions)
            } else {
                intersects(&space.measures, &reference.measures)
            };
            if !anchored {
                continue;
            }

            let proximity = average_pairwise(&reference.measures, &space.measures, |a, b| {
                self.graph.measure_correlation(a, b)
            });
            if proximity <= self.config.measure_threshold {
                continue;
            }
            let card: f64 = if anchored_on_dimensions {
                1.0
            } else {
                self.known_cards(&space.dimensions).iter().product()
            };
            if card <= 0.0 {
                continue;
            }
            out.push(Association {
                view: space.view(),
                proximity,
                card,
                score: proximity / card / space.measures.len() as f64,
            });
        }
        sort_associations(&mut out);
        out
    }

    /// Views whose dimensions are correlated with the reference's
    pub fn related_by_dimension(&self, reference: &ViewSpace, spaces: &[InsightSpace]) -> Vec<Association> {
        let mut out = Vec::new();
        for space in spaces {
            if space.dimensions.is_empty() {
                continue;
            }
            if !intersects(&space.measures, &reference.measures)
                && !intersects(&space.dimensions, &reference.dimensions)
            {
                continue;
            }
            if is_set_equal(&space.dimensions, &reference.dimensions) {
                continue;
            }

            // without reference dimensions every candidate is equally close
            let proximity = if reference.dimensions.is_empty() {
                1.0
            } else {
                average_pairwise(&reference.dimensions, &space.dimensions, |a, b| {
                    self.graph.dimension_correlation(a, b)
                })
            };
            if proximity <= self.config.dimension_threshold {
                continue;
            }
            let card: f64 = self.known_cards(&space.dimensions).iter().sum();
            if card <= 0.0 {
                continue;
            }
            out.push(Association {
                view: space.view(),
                proximity,
                card,
                score: proximity / card,
            });
        }
        sort_associations(&mut out);
        out
    }
}

/// Mean of `lookup` over every (left, right) pair; unknown pairs count as 0
fn average_pairwise<F>(left: &[String], right: &[String], lookup: F) -> f64
where
    F: Fn(&str, &str) -> Option<f64>,
{
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for a in left {
        for b in right {
            total += lookup(a, b).unwrap_or(0.0);
        }
    }
    total / (left.len() * right.len()) as f64
}

fn sort_associations(items: &mut [Association]) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn graph() -> CorrelationGraph {
        let mut graph = CorrelationGraph::new(keys(&["d1", "d2", "d3"]), keys(&["m1", "m2", "m3"]));
        graph.dg = vec![
            vec![1.0, 0.5, 0.1],
            vec![0.5, 1.0, 0.1],
            vec![0.1, 0.1, 1.0],
        ];
        graph.mg = vec![
            vec![1.0, 0.9, 0.2],
            vec![0.9, 1.0, 0.2],
            vec![0.2, 0.2, 1.0],
        ];
        graph
    }

    fn cards() -> FxHashMap<String, usize> {
        [("d1", 2usize), ("d2", 3), ("d3", 10)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn space(dims: &[&str], meas: &[&str], score: f64) -> InsightSpace {
        InsightSpace::new(ViewSpace::new(keys(dims), keys(meas)), score)
    }

    #[test]
    fn test_measure_pass_excludes_equal_measure_set() {
        let graph = graph();
        let cards = cards();
        let search = AssociationSearch::new(&graph, &cards, AssociationConfig::default());
        let reference = ViewSpace::new(keys(&["d1"]), keys(&["m1"]));
        let spaces = vec![
            space(&["d1"], &["m1"], 0.9),
            space(&["d1", "d2"], &["m1"], 0.8),
            space(&["d1"], &["m2"], 0.7),
            space(&["d1"], &["m3"], 0.6),
            space(&["d3"], &["m2"], 0.5),
        ];
        let related = search.related_by_measure(&reference, &spaces);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].view.measures, keys(&["m2"]));
        assert!((related[0].score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_measure_pass_without_dimensions_penalizes_product() {
        let graph = graph();
        let cards = cards();
        let search = AssociationSearch::new(&graph, &cards, AssociationConfig::default());
        let reference = ViewSpace::new(vec![], keys(&["m1"]));
        let spaces = vec![
            space(&["d1", "d2"], &["m1", "m2"], 0.9),
            space(&[], &["m1", "m2"], 0.8),
            space(&["d1"], &["m2"], 0.7),
        ];
        let related = search.related_by_measure(&reference, &spaces);
        // [d1]/[m2] shares no measure; the other two average 0.95 over two measures
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].view.dimensions, Vec::<String>::new());
        assert!((related[0].proximity - 0.95).abs() < 1e-12);
        assert!((related[0].score - 0.95 / 2.0).abs() < 1e-12);
        assert!((related[1].score - 0.95 / 6.0 / 2.0).abs() < 1e-12);
        assert_eq!(related[1].card, 6.0);
    }

    #[test]
    fn test_measure_pass_skips_zero_cardinality_candidates() {
        let graph = graph();
        let mut cards = cards();
        // a dimension whose values are all null
        cards.insert("d0".to_string(), 0);
        let search = AssociationSearch::new(&graph, &cards, AssociationConfig::default());
        let reference = ViewSpace::new(vec![], keys(&["m1"]));
        let spaces = vec![
            space(&["d0"], &["m1", "m2"], 0.9),
            space(&["d1"], &["m1", "m2"], 0.8),
        ];
        let related = search.related_by_measure(&reference, &spaces);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].view.dimensions, keys(&["d1"]));
        assert!(related.iter().all(|a| a.score.is_finite()));
    }

    #[test]
    fn test_dimension_pass_penalizes_sum_and_sorts() {
        let graph = graph();
        let cards = cards();
        let search = AssociationSearch::new(&graph, &cards, AssociationConfig::default());
        let reference = ViewSpace::new(keys(&["d1"]), keys(&["m1"]));
        let spaces = vec![
            space(&["d1"], &["m2"], 0.9),
            space(&["d2"], &["m1"], 0.8),
            space(&["d1", "d2"], &["m3"], 0.7),
            space(&["d3"], &["m1"], 0.6),
            space(&[], &["m1"], 0.5),
        ];
        let related = search.related_by_dimension(&reference, &spaces);
        assert_eq!(related.len(), 2);
        // d2: 0.5 / 3; [d1,d2]: 0.75 / 5
        assert_eq!(related[0].view.dimensions, keys(&["d2"]));
        assert!((related[0].score - 0.5 / 3.0).abs() < 1e-12);
        assert!((related[1].score - 0.15).abs() < 1e-12);
        for pair in related.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_dimension_pass_without_reference_dimensions() {
        let graph = graph();
        let cards = cards();
        let search = AssociationSearch::new(&graph, &cards, AssociationConfig::default());
        let reference = ViewSpace::new(vec![], keys(&["m1"]));
        let spaces = vec![space(&["d1"], &["m1"], 0.9), space(&["d3"], &["m2"], 0.8)];
        let related = search.related_by_dimension(&reference, &spaces);
        assert_eq!(related.len(), 1);
        assert!((related[0].score - 0.5).abs() < 1e-12);
    }
}
