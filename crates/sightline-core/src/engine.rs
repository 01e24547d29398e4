//! Insight discovery pipeline
//!
//! An `Engine` owns one dataset and walks it through a fixed sequence of
//! stages:
//!
//! ```text
//! Empty -> Loaded -> GraphBuilt -> Clustered -> CubeBuilt -> SubspacesBuilt -> Scored
//! ```
//!
//! Each stage has one operation that must run after its precursor; calling
//! it early fails with `Error::PrecursorNotReady`. Re-running an earlier
//! stage discards everything computed after it. Once `Scored`, association,
//! specification, aggregation and point-interest queries are repeatable
//! reads. A scored engine can be snapshotted and restored without
//! recomputation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::association::{Association, AssociationSearch};
use crate::config::EngineConfig;
use crate::cube::{AggregatedRow, AggregationCube, CubeMode, CubeSchema};
use crate::error::{Error, Result};
use crate::fields::{summarize_fields, univariate_selection, FieldSummary};
use crate::graph::{CorrelationGraph, GraphStrategy};
use crate::models::{AnalyticType, Field, InsightSpace, Row, Scalar, StatOp, ViewLimits, ViewSpace};
use crate::progress::{NoopProgressStore, ProgressStore};
use crate::scoring::ImpurityScorer;
use crate::snapshot::{EngineSnapshot, EngineState};
use crate::statistics::{kl_divergence, to_probabilities};
use crate::subspace::{dedup_views, SubspaceEnumerator};

/// Dimension threshold that admits every pair
const ACCEPT_ALL_THRESHOLD: f64 = -100.0;

/// Pipeline stage, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStage {
    Empty,
    Loaded,
    GraphBuilt,
    Clustered,
    CubeBuilt,
    SubspacesBuilt,
    Scored,
}

impl EngineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStage::Empty => "empty",
            EngineStage::Loaded => "loaded",
            EngineStage::GraphBuilt => "graph_built",
            EngineStage::Clustered => "clustered",
            EngineStage::CubeBuilt => "cube_built",
            EngineStage::SubspacesBuilt => "subspaces_built",
            EngineStage::Scored => "scored",
        }
    }
}

impl fmt::Display for EngineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wall-clock duration of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: String,
    pub millis: f64,
}

/// Result of a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Ranked insight spaces, capped at `output.insight_limit`
    pub insight_spaces: Vec<InsightSpace>,
    pub fields: Vec<FieldSummary>,
    pub data_source: Vec<Row>,
    pub timing: Vec<StageTiming>,
}

/// Chart-ready sample of one view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSpecification {
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    /// Summaries of the view's fields
    pub fields: Vec<FieldSummary>,
    /// The view's cuboid, measures summed, truncated to the sample limit
    pub data_view: Vec<AggregatedRow>,
}

/// A related view together with its sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedView {
    #[serde(flatten)]
    pub association: Association,
    pub specification: ViewSpecification,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssociateResult {
    pub related_by_measure: Vec<RelatedView>,
    pub related_by_dimension: Vec<RelatedView>,
}

/// One group of a view ranked by how far its distribution is from the global one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointInterest {
    pub dimensions: BTreeMap<String, Scalar>,
    /// KL divergence (bits) from the global histogram, averaged over measures
    pub kl: f64,
}

/// Snapshot of the data an engine currently holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSync {
    pub fields: Vec<FieldSummary>,
    pub data_source: Vec<Row>,
    pub insight_spaces: Vec<InsightSpace>,
}

pub struct Engine {
    config: EngineConfig,
    mode: CubeMode,
    strategy: GraphStrategy,
    progress: Arc<dyn ProgressStore>,
    stage: EngineStage,
    has_data: bool,
    fields: Vec<Field>,
    data: Vec<Row>,
    summaries: Vec<FieldSummary>,
    dimensions: Vec<String>,
    measures: Vec<String>,
    graph: Option<CorrelationGraph>,
    cube: Option<Box<dyn AggregationCube>>,
    measure_views: Vec<ViewSpace>,
    subspaces: Vec<ViewSpace>,
    insight_spaces: Vec<InsightSpace>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.mode)
            .field("stage", &self.stage)
            .field("rows", &self.data.len())
            .field("dimensions", &self.dimensions)
            .field("measures", &self.measures)
            .field("insight_spaces", &self.insight_spaces.len())
            .finish()
    }
}

impl Engine {
    pub fn new(config: EngineConfig, mode: CubeMode) -> Self {
        Self {
            config,
            mode,
            strategy: GraphStrategy::default(),
            progress: Arc::new(NoopProgressStore),
            stage: EngineStage::Empty,
            has_data: false,
            fields: Vec::new(),
            data: Vec::new(),
            summaries: Vec::new(),
            dimensions: Vec::new(),
            measures: Vec::new(),
            graph: None,
            cube: None,
            measure_views: Vec::new(),
            subspaces: Vec::new(),
            insight_spaces: Vec::new(),
        }
    }

    /// Replace the correlation coefficients and clustering rule
    pub fn with_strategy(mut self, strategy: GraphStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Publish exploration progress to `store`
    pub fn with_progress(mut self, store: Arc<dyn ProgressStore>) -> Self {
        self.progress = store;
        self
    }

    pub fn stage(&self) -> EngineStage {
        self.stage
    }

    pub fn mode(&self) -> &CubeMode {
        &self.mode
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_limits(&mut self, limits: ViewLimits) {
        self.config.limits = limits;
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn data(&self) -> &[Row] {
        &self.data
    }

    pub fn summaries(&self) -> &[FieldSummary] {
        &self.summaries
    }

    /// Dimensions kept for analysis
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn measures(&self) -> &[String] {
        &self.measures
    }

    pub fn graph(&self) -> Option<&CorrelationGraph> {
        self.graph.as_ref()
    }

    pub fn cube(&self) -> Option<&dyn AggregationCube> {
        self.cube.as_deref()
    }

    pub fn subspaces(&self) -> &[ViewSpace] {
        &self.subspaces
    }

    pub fn insight_spaces(&self) -> &[InsightSpace] {
        &self.insight_spaces
    }

    fn require(&self, operation: &'static str, required: EngineStage) -> Result<()> {
        if self.stage < required {
            return Err(Error::PrecursorNotReady {
                operation,
                required: required.as_str(),
                current: self.stage.as_str(),
            });
        }
        Ok(())
    }

    /// Drop state computed after `stage` and move back to it
    fn rewind(&mut self, stage: EngineStage) {
        if stage < EngineStage::Scored {
            self.insight_spaces.clear();
        }
        if stage < EngineStage::SubspacesBuilt {
            self.measure_views.clear();
            self.subspaces.clear();
        }
        if stage < EngineStage::CubeBuilt {
            self.cube = None;
        }
        if stage < EngineStage::GraphBuilt {
            self.graph = None;
        }
        self.stage = stage;
    }

    pub fn set_data(&mut self, rows: Vec<Row>) -> Result<()> {
        self.data = rows;
        self.has_data = true;
        self.reload()
    }

    pub fn set_fields(&mut self, fields: Vec<Field>) -> Result<()> {
        check_unique_keys(&fields)?;
        self.fields = fields;
        self.reload()
    }

    /// Install a dataset together with its fields, validating them as a pair
    fn load(&mut self, rows: Vec<Row>, fields: Vec<Field>) -> Result<()> {
        check_unique_keys(&fields)?;
        self.data = rows;
        self.has_data = true;
        self.fields = fields;
        self.reload()
    }

    /// Recompute summaries and univariate selection once both data and
    /// fields are present.
    fn reload(&mut self) -> Result<()> {
        self.rewind(EngineStage::Empty);
        self.summaries.clear();
        self.dimensions.clear();
        self.measures.clear();
        if !self.has_data || self.fields.is_empty() {
            return Ok(());
        }
        for field in &self.fields {
            if field.analytic_type == AnalyticType::Measure {
                let non_numeric = self
                    .data
                    .iter()
                    .filter_map(|r| r.get(&field.key))
                    .any(|v| !v.is_null() && v.as_f64().is_none());
                if non_numeric {
                    return Err(Error::InvalidData(format!(
                        "Measure '{}' holds non-numeric values",
                        field.key
                    )));
                }
            }
        }

        self.summaries = summarize_fields(&self.fields, &self.data);
        let (dimensions, measures) = univariate_selection(
            &self.summaries,
            self.data.len(),
            self.config.selection.drop_identifier_dimensions,
        );
        self.dimensions = dimensions;
        self.measures = measures;
        self.stage = EngineStage::Loaded;
        debug!(
            rows = self.data.len(),
            dimensions = self.dimensions.len(),
            measures = self.measures.len(),
            "Loaded dataset"
        );
        Ok(())
    }

    pub fn build_graph(&mut self) -> Result<&CorrelationGraph> {
        self.require("build_graph", EngineStage::Loaded)?;
        self.rewind(EngineStage::Loaded);
        let mut graph = CorrelationGraph::with_strategy(
            self.dimensions.clone(),
            self.measures.clone(),
            self.strategy.clone(),
        );
        graph.compute_dgraph(&self.data);
        graph.compute_mgraph(&self.data);
        self.stage = EngineStage::GraphBuilt;
        Ok(&*self.graph.insert(graph))
    }

    /// Dimension threshold in effect: small schemas accept every pair
    pub fn dimension_threshold(&self) -> f64 {
        if self.dimensions.len() < self.config.graph.small_schema_dimensions {
            ACCEPT_ALL_THRESHOLD
        } else {
            self.config.graph.dimension_threshold
        }
    }

    pub fn cluster_fields(&mut self) -> Result<&CorrelationGraph> {
        self.require("cluster_fields", EngineStage::GraphBuilt)?;
        self.rewind(EngineStage::GraphBuilt);
        let dimension_threshold = self.dimension_threshold();
        let measure_threshold = self.config.graph.measure_threshold;
        let graph = self.graph.as_mut().ok_or(Error::PrecursorNotReady {
            operation: "cluster_fields",
            required: EngineStage::GraphBuilt.as_str(),
            current: EngineStage::Loaded.as_str(),
        })?;
        graph.cluster_dimensions(dimension_threshold);
        graph.cluster_measures(measure_threshold);
        self.stage = EngineStage::Clustered;
        Ok(&*graph)
    }

    pub fn build_cube(&mut self) -> Result<&dyn AggregationCube> {
        self.require("build_cube", EngineStage::Clustered)?;
        self.rewind(EngineStage::Clustered);
        let clusters = self
            .graph
            .as_ref()
            .map(|g| g.d_clusters.clone())
            .unwrap_or_default();

        let schema = CubeSchema::from_rows(
            self.dimensions.clone(),
            self.measures.clone(),
            &self.data,
            self.config.limits.dimension,
        );
        let mut cube = self.mode.create(schema)?;
        cube.build_base_cuboid(&self.data)?;
        cube.build_cuboids_on_clusters(&clusters)?;
        debug!(
            backend = cube.name(),
            cuboids = cube.keys().len(),
            clusters = clusters.len(),
            "Built cube"
        );
        self.stage = EngineStage::CubeBuilt;
        Ok(&**self.cube.insert(cube))
    }

    pub fn build_subspaces(&mut self) -> Result<&[ViewSpace]> {
        self.require("build_subspaces", EngineStage::CubeBuilt)?;
        self.rewind(EngineStage::CubeBuilt);
        let m_clusters = self
            .graph
            .as_ref()
            .map(|g| g.m_clusters.clone())
            .unwrap_or_default();
        let dimension_sets = self
            .cube
            .as_ref()
            .map(|c| c.registered_dimension_sets())
            .unwrap_or_default();

        let enumerator = SubspaceEnumerator::new(self.config.limits);
        self.measure_views = enumerator.measure_only_views(&m_clusters);
        self.subspaces = enumerator.enumerate(&dimension_sets, &m_clusters);
        self.stage = EngineStage::SubspacesBuilt;
        Ok(&self.subspaces)
    }

    /// Score the enumerated views (deduplicated by key) into the ranked list
    pub fn create_insight_spaces(&mut self) -> Result<&[InsightSpace]> {
        self.require("create_insight_spaces", EngineStage::SubspacesBuilt)?;
        self.rewind(EngineStage::SubspacesBuilt);
        let cube = self.cube.as_deref().ok_or(Error::CubeNotBuilt)?;
        let views = dedup_views(self.subspaces.clone());
        let scorer = ImpurityScorer::new(self.config.limits, self.config.scoring);
        self.insight_spaces = scorer.explore_views(
            cube,
            &self.measures,
            &self.measure_views,
            &views,
            self.progress.as_ref(),
        )?;
        self.stage = EngineStage::Scored;
        Ok(&self.insight_spaces)
    }

    /// Load a dataset and run every stage through scoring
    pub fn start(&mut self, rows: Vec<Row>, fields: Vec<Field>, limits: Option<ViewLimits>) -> Result<PipelineOutput> {
        if let Some(limits) = limits {
            if limits.dimension == 0 || limits.measure == 0 {
                return Err(Error::InvalidData(format!(
                    "view limits must be positive, got {} dimensions and {} measures",
                    limits.dimension, limits.measure
                )));
            }
            self.set_limits(limits);
        }
        let mut timing = Vec::new();

        let mut clock = Instant::now();
        let mut lap = |stage: &str, timing: &mut Vec<StageTiming>| {
            let millis = clock.elapsed().as_secs_f64() * 1000.0;
            info!(stage, millis, "Pipeline stage complete");
            timing.push(StageTiming {
                stage: stage.to_string(),
                millis,
            });
            clock = Instant::now();
        };

        self.load(rows, fields)?;
        lap("init&univar", &mut timing);
        self.build_graph()?;
        lap("co-graph", &mut timing);
        self.cluster_fields()?;
        lap("clusters", &mut timing);
        self.build_cube()?;
        lap("cube", &mut timing);
        self.build_subspaces()?;
        lap("subspaces", &mut timing);
        self.create_insight_spaces()?;
        lap("insights", &mut timing);

        Ok(PipelineOutput {
            insight_spaces: self
                .insight_spaces
                .iter()
                .take(self.config.output.insight_limit)
                .cloned()
                .collect(),
            fields: self.summaries.clone(),
            data_source: self.data.clone(),
            timing,
        })
    }

    fn cube_for(&self, operation: &'static str) -> Result<&dyn AggregationCube> {
        self.require(operation, EngineStage::CubeBuilt)?;
        self.cube.as_deref().ok_or(Error::CubeNotBuilt)
    }

    /// Bounded sample of a view, measures summed per group
    pub fn specification(&self, view: &ViewSpace) -> Result<ViewSpecification> {
        let cube = self.cube_for("specification")?;
        let cuboid = cube.get_cuboid(&view.dimensions)?;
        let ops = vec![StatOp::Sum; view.measures.len()];
        let mut data_view = cuboid.aggregated_rows(&view.measures, &ops)?;
        data_view.truncate(self.config.output.specification_sample_limit);

        let fields = view
            .dimensions
            .iter()
            .chain(view.measures.iter())
            .filter_map(|k| self.summaries.iter().find(|s| &s.key == k).cloned())
            .collect();
        Ok(ViewSpecification {
            dimensions: view.dimensions.clone(),
            measures: view.measures.clone(),
            fields,
            data_view,
        })
    }

    /// Raw cuboid rows for a dimension set
    pub fn aggregate(&self, dimensions: &[String], measures: &[String], ops: &[StatOp]) -> Result<Vec<AggregatedRow>> {
        let cube = self.cube_for("aggregate")?;
        cube.get_cuboid(dimensions)?.aggregated_rows(measures, ops)
    }

    /// Views related to `view` by measure and by dimension correlation.
    /// Candidates whose sample cannot be produced are skipped.
    pub fn associate(&self, view: &ViewSpace) -> Result<AssociateResult> {
        self.require("associate", EngineStage::Scored)?;
        let graph = self.graph.as_ref().ok_or(Error::PrecursorNotReady {
            operation: "associate",
            required: EngineStage::GraphBuilt.as_str(),
            current: self.stage.as_str(),
        })?;
        let cardinality: FxHashMap<String, usize> = self
            .summaries
            .iter()
            .filter(|s| s.is_dimension())
            .map(|s| (s.key.clone(), s.distinct))
            .collect();
        let search = AssociationSearch::new(graph, &cardinality, self.config.association);

        let by_measure = search.related_by_measure(view, &self.insight_spaces);
        let by_dimension = search.related_by_dimension(view, &self.insight_spaces);
        let result = AssociateResult {
            related_by_measure: self.attach_specifications(by_measure),
            related_by_dimension: self.attach_specifications(by_dimension),
        };
        debug!(
            by_measure = result.related_by_measure.len(),
            by_dimension = result.related_by_dimension.len(),
            "Associated views"
        );
        Ok(result)
    }

    fn attach_specifications(&self, associations: Vec<Association>) -> Vec<RelatedView> {
        associations
            .into_iter()
            .filter_map(|association| match self.specification(&association.view) {
                Ok(specification) => Some(RelatedView {
                    association,
                    specification,
                }),
                Err(e) => {
                    tracing::warn!(view = %association.view.key(), error = %e, "Skipping related view");
                    None
                }
            })
            .collect()
    }

    /// Groups of a view ranked by KL divergence of their measure histograms
    /// from the global histograms. Empty for a view without dimensions.
    pub fn search_point_interests(&self, view: &ViewSpace) -> Result<Vec<PointInterest>> {
        let cube = self.cube_for("search_point_interests")?;
        if view.dimensions.is_empty() || view.measures.is_empty() {
            return Ok(Vec::new());
        }
        let global = cube.get_cuboid(&[])?;
        let local = cube.get_cuboid(&view.dimensions)?;

        let mut global_probs = Vec::with_capacity(view.measures.len());
        let mut local_dists = Vec::with_capacity(view.measures.len());
        for measure in &view.measures {
            let bins = global.distributions(measure)?.into_iter().next();
            match bins {
                Some(bins) => global_probs.push(to_probabilities(&bins)),
                None => return Ok(Vec::new()),
            }
            local_dists.push(local.distributions(measure)?);
        }

        let mut out: Vec<PointInterest> = local
            .groups()
            .iter()
            .enumerate()
            .map(|(g, group)| {
                let total: f64 = global_probs
                    .iter()
                    .zip(local_dists.iter())
                    .map(|(probs, dists)| kl_divergence(&dists[g], probs))
                    .sum();
                PointInterest {
                    dimensions: local
                        .dimensions
                        .iter()
                        .cloned()
                        .zip(group.values.iter().cloned())
                        .collect(),
                    kl: total / view.measures.len() as f64,
                }
            })
            .collect();
        out.sort_by(|a, b| b.kl.total_cmp(&a.kl));
        Ok(out)
    }

    /// Fields, dataset and insight spaces currently held
    pub fn sync(&self) -> EngineSync {
        EngineSync {
            fields: self.summaries.clone(),
            data_source: self.data.clone(),
            insight_spaces: self.insight_spaces.clone(),
        }
    }

    /// Capture a scored engine
    pub fn serialize(&self) -> Result<EngineSnapshot> {
        self.require("serialize", EngineStage::Scored)?;
        let graph = self.graph.clone().ok_or(Error::CubeNotBuilt)?;
        let cube = self.cube.as_deref().ok_or(Error::CubeNotBuilt)?;
        EngineSnapshot::new(EngineState {
            config: self.config,
            fields: self.fields.clone(),
            data: self.data.clone(),
            summaries: self.summaries.clone(),
            dimensions: self.dimensions.clone(),
            measures: self.measures.clone(),
            graph,
            schema: cube.schema().clone(),
            cuboids: cube.export_cuboids()?,
            measure_views: self.measure_views.clone(),
            subspaces: self.subspaces.clone(),
            insight_spaces: self.insight_spaces.clone(),
        })
    }

    /// Restore a scored engine from a snapshot into a cube of `mode`
    pub fn deserialize(snapshot: EngineSnapshot, mode: CubeMode) -> Result<Self> {
        snapshot.verify()?;
        let state = snapshot.state;

        let mut cube = mode.create(state.schema)?;
        for cuboid in state.cuboids {
            cube.register(cuboid)?;
        }
        if !cube.is_built() {
            return Err(Error::Snapshot("snapshot holds no base cuboid".to_string()));
        }

        let mut engine = Engine::new(state.config, mode);
        engine.has_data = true;
        engine.fields = state.fields;
        engine.data = state.data;
        engine.summaries = state.summaries;
        engine.dimensions = state.dimensions;
        engine.measures = state.measures;
        engine.graph = Some(state.graph);
        engine.cube = Some(cube);
        engine.measure_views = state.measure_views;
        engine.subspaces = state.subspaces;
        engine.insight_spaces = state.insight_spaces;
        engine.stage = EngineStage::Scored;
        info!(
            rows = engine.data.len(),
            insights = engine.insight_spaces.len(),
            "Restored engine from snapshot"
        );
        Ok(engine)
    }
}

fn check_unique_keys(fields: &[Field]) -> Result<()> {
    let mut seen = FxHashSet::default();
    if let Some(dup) = fields.iter().find(|f| !seen.insert(f.key.as_str())) {
        return Err(Error::InvalidData(format!("Duplicate field key: {}", dup.key)));
    }
    Ok(())
}
