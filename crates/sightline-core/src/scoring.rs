//! Entropy-based view scoring
//!
//! A view is interesting when conditioning its measures on its dimensions
//! removes entropy from their histograms. For each measure:
//!
//! ```text
//! gain  = H(global) - sum_g (freq_g / total) * H(group g)
//! score = gain / log2(min(16, groups))
//! ```
//!
//! Only the 15 most frequent groups are weighed individually; the remaining
//! groups are merged into one noise group, so a view costs at most 16
//! sub-entropies whatever its cardinality. A measure whose relative gain
//! `gain / H(global)` is below the cutoff drops the whole view.

use rustc_hash::FxHashMap;

use crate::config::ScoringConfig;
use crate::cube::AggregationCube;
use crate::error::Result;
use crate::models::{InsightSpace, ViewLimits, ViewSpace};
use crate::progress::{report, ProgressStore, EXPLORE_PROGRESS_KEY};
use crate::statistics::{entropy_acc, DEFAULT_BIN_NUM};

type Histogram = [u64; DEFAULT_BIN_NUM];

fn histogram_entropy(bins: &[u64]) -> f64 {
    let frequencies: Vec<f64> = bins.iter().map(|&b| b as f64).collect();
    entropy_acc(&frequencies)
}

/// Whether a relative information gain is too small to keep a view.
/// The comparison is strict, so a gain exactly at the cutoff survives.
pub fn is_negligible_gain(relative_gain: f64, cutoff: f64) -> bool {
    relative_gain < cutoff
}

/// Frequency-weighted entropy of the groups' histograms.
///
/// Groups are ordered by frequency, largest first; groups past the first
/// `DEFAULT_BIN_NUM - 1` are summed into a single noise histogram. `total`
/// is the number of non-null values of the measure.
pub fn conditional_entropy(mut groups: Vec<Histogram>, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let freq = |h: &Histogram| h.iter().sum::<u64>();
    groups.sort_by_key(|h| std::cmp::Reverse(freq(h)));

    let mut conditional = 0.0;
    let mut noise: Histogram = [0; DEFAULT_BIN_NUM];
    let mut noise_freq = 0u64;
    for (i, group) in groups.iter().enumerate() {
        if i < DEFAULT_BIN_NUM - 1 {
            conditional += freq(group) as f64 / total * histogram_entropy(group);
        } else {
            for (bin, add) in noise.iter_mut().zip(group.iter()) {
                *bin += add;
            }
            noise_freq += freq(group);
        }
    }
    if noise_freq > 0 {
        conditional += noise_freq as f64 / total * histogram_entropy(&noise);
    }
    conditional
}

/// Global histogram of every measure, from the global cuboid
#[derive(Debug, Clone, Default)]
pub struct GlobalDistributions {
    histograms: FxHashMap<String, Histogram>,
}

impl GlobalDistributions {
    pub fn from_cube(cube: &dyn AggregationCube, measures: &[String]) -> Result<Self> {
        let global = cube.get_cuboid(&[])?;
        let mut histograms = FxHashMap::default();
        for measure in measures {
            let bins = global
                .distributions(measure)?
                .into_iter()
                .next()
                .unwrap_or([0; DEFAULT_BIN_NUM]);
            histograms.insert(measure.clone(), bins);
        }
        Ok(Self { histograms })
    }

    pub fn histogram(&self, measure: &str) -> Histogram {
        self.histograms
            .get(measure)
            .copied()
            .unwrap_or([0; DEFAULT_BIN_NUM])
    }

    pub fn entropy(&self, measure: &str) -> f64 {
        histogram_entropy(&self.histogram(measure))
    }

    /// Non-null values of the measure
    pub fn total(&self, measure: &str) -> f64 {
        self.histogram(measure).iter().sum::<u64>() as f64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImpurityScorer {
    limits: ViewLimits,
    relative_gain_cutoff: f64,
    progress_interval: usize,
}

impl ImpurityScorer {
    pub fn new(limits: ViewLimits, config: ScoringConfig) -> Self {
        Self {
            limits,
            relative_gain_cutoff: config.relative_gain_cutoff,
            progress_interval: config.progress_interval.max(1),
        }
    }

    /// Score measure-only views by how concentrated their measures are,
    /// `(log2(16) - H) / log2(16)` averaged over the view, then keep views
    /// greedily (best first) while they add a measure not yet covered.
    pub fn score_measure_views(
        &self,
        global: &GlobalDistributions,
        views: &[ViewSpace],
        measure_count: usize,
    ) -> Vec<InsightSpace> {
        let max_entropy = (DEFAULT_BIN_NUM as f64).log2();
        let mut scored: Vec<InsightSpace> = views
            .iter()
            .filter(|v| !v.measures.is_empty())
            .map(|v| {
                let total: f64 = v
                    .measures
                    .iter()
                    .map(|m| (max_entropy - global.entropy(m)) / max_entropy)
                    .sum();
                InsightSpace::new(v.clone(), total / v.measures.len() as f64)
            })
            .collect();
        sort_by_score(&mut scored);

        let mut covered: Vec<&str> = Vec::new();
        let mut selected = Vec::new();
        for space in &scored {
            if space.measures.iter().all(|m| covered.contains(&m.as_str())) {
                continue;
            }
            for m in &space.measures {
                if !covered.contains(&m.as_str()) {
                    covered.push(m);
                }
            }
            selected.push(space.clone());
            if covered.len() >= measure_count {
                break;
            }
        }
        selected
    }

    /// Information-gain score of one view, `None` when the view is dropped
    /// for negligible gain.
    pub fn score_view(
        &self,
        cube: &dyn AggregationCube,
        global: &GlobalDistributions,
        view: &ViewSpace,
    ) -> Result<Option<f64>> {
        let cuboid = cube.get_cuboid(&view.dimensions)?;
        let normalizer = (cuboid.size().min(DEFAULT_BIN_NUM) as f64).log2();

        let mut total_gain = 0.0;
        for measure in &view.measures {
            let entropy = global.entropy(measure);
            let conditional = conditional_entropy(cuboid.distributions(measure)?, global.total(measure));
            let gain = entropy - conditional;
            if entropy > 0.0 && is_negligible_gain(gain / entropy, self.relative_gain_cutoff) {
                return Ok(None);
            }
            total_gain += gain / normalizer;
        }
        Ok(Some(total_gain / view.measures.len() as f64))
    }

    /// Score measure-only views and every candidate view, drop negligible
    /// and non-finite results, and sort best first.
    pub fn explore_views(
        &self,
        cube: &dyn AggregationCube,
        measures: &[String],
        measure_views: &[ViewSpace],
        views: &[ViewSpace],
        progress: &dyn ProgressStore,
    ) -> Result<Vec<InsightSpace>> {
        let global = GlobalDistributions::from_cube(cube, measures)?;
        let mut spaces = self.score_measure_views(&global, measure_views, measures.len());

        let mut dropped = 0usize;
        for (i, view) in views.iter().enumerate() {
            let done = i + 1;
            if done % self.progress_interval == 0 {
                report(progress, EXPLORE_PROGRESS_KEY, done as f64 / views.len() as f64);
            }
            if !view.fits(&self.limits) || view.measures.is_empty() {
                continue;
            }
            match self.score_view(cube, &global, view)? {
                Some(score) => spaces.push(InsightSpace::new(view.clone(), score)),
                None => dropped += 1,
            }
        }
        if !views.is_empty() {
            report(progress, EXPLORE_PROGRESS_KEY, 1.0);
        }

        let before = spaces.len();
        spaces.retain(|s| s.score.is_finite());
        sort_by_score(&mut spaces);
        tracing::debug!(
            candidates = views.len(),
            dropped,
            undefined = before - spaces.len(),
            kept = spaces.len(),
            "Explored views"
        );
        Ok(spaces)
    }
}

/// Stable descending sort by score
pub fn sort_by_score(spaces: &mut [InsightSpace]) {
    spaces.sort_by(|a, b| b.score.total_cmp(&a.score));
}
