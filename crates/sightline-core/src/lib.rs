//! Sightline Core Library
//!
//! Automated insight discovery over tabular data:
//! - Field summaries and univariate selection
//! - Correlation graph and field clustering
//! - Aggregation cube with memory and disk backends
//! - Candidate view enumeration and impurity scoring
//! - Related-view search and point-level outliers
//! - Engine snapshots and a task dispatch surface

pub mod association;
pub mod config;
pub mod cube;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fields;
pub mod graph;
pub mod import;
pub mod models;
pub mod progress;
pub mod scoring;
pub mod snapshot;
pub mod statistics;
pub mod subspace;

pub use association::{Association, AssociationSearch};
pub use config::{
    default_config_path, AssociationConfig, EngineConfig, GraphConfig, OutputConfig, ScoringConfig,
    SelectionConfig,
};
pub use cube::{
    AggregateValue, AggregatedRow, AggregationCube, CubeMode, CubeSchema, Cuboid, CuboidKey,
    DiskCube, MemoryCube,
};
pub use dispatch::{Dispatcher, TaskRequest, TaskResponse};
pub use engine::{
    AssociateResult, Engine, EngineStage, EngineSync, PipelineOutput, PointInterest, RelatedView,
    StageTiming, ViewSpecification,
};
pub use error::{Error, Result};
pub use fields::{infer_fields, summarize_fields, univariate_selection, FieldSummary};
pub use graph::{
    AbsPearson, ClusterStrategy, Coefficient, CorrelationGraph, CramersV, GraphStrategy,
    ThresholdNeighborhood,
};
pub use import::{parse_csv, CsvDataset};
pub use models::{
    AnalyticType, DataType, Field, InsightSpace, Row, Scalar, SemanticType, StatOp, ViewLimits,
    ViewSpace,
};
pub use progress::{MemoryProgressStore, NoopProgressStore, ProgressStore, EXPLORE_PROGRESS_KEY};
pub use scoring::{GlobalDistributions, ImpurityScorer};
pub use snapshot::{EngineSnapshot, EngineState, SNAPSHOT_VERSION};
pub use subspace::{dedup_views, SubspaceEnumerator};
