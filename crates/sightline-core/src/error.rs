//! Error types for Sightline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("'{operation}' requires stage '{required}', engine is at '{current}'")]
    PrecursorNotReady {
        operation: &'static str,
        required: &'static str,
        current: &'static str,
    },

    #[error("Cube is not built: the base cuboid must be materialized first")]
    CubeNotBuilt,

    #[error("Cuboid not materialized: [{0}]")]
    CuboidMissing(String),

    #[error("Unknown task: \"{0}\"")]
    UnknownTask(String),

    #[error("Engine is not created")]
    EngineNotCreated,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Progress store error: {0}")]
    Progress(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
