//! Task dispatch surface
//!
//! Requests are `{ "task": <name>, "props": { .. } }`; responses are
//! `{ "success": true, "data": .. }` or `{ "success": false, "message": .. }`.
//! Every engine error is caught here and rendered as `[task] error` followed
//! by its source chain.
//!
//! | task            | props                                          |
//! |-----------------|------------------------------------------------|
//! | `init`          | `mode` (`memory`/`disk`), optional `dir`       |
//! | `destroy`       |                                                |
//! | `start`         | `data_source`, `fields`, optional `limits`     |
//! | `specification` | `dimensions`, `measures`                       |
//! | `associate`     | `dimensions`, `measures`                       |
//! | `aggregate`     | `dimensions`, `measures`, `ops` (alias `cube`) |
//! | `download`      |                                                |
//! | `upload`        | an engine snapshot                             |
//! | `sync`          |                                                |
//! | `subinsight`    | `dimensions`, `measures`                       |
//! | `infermeta`     | `data_source`                                  |

use std::error::Error as StdError;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::cube::CubeMode;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::fields::infer_fields;
use crate::models::{Field, Row, StatOp, ViewLimits, ViewSpace};
use crate::progress::{NoopProgressStore, ProgressStore};
use crate::snapshot::EngineSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task: String,
    #[serde(default)]
    pub props: Value,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>, props: Value) -> Self {
        Self {
            task: task.into(),
            props,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(task: &str, error: &(dyn StdError + 'static)) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(format!("[{}] {}", task, error_chain(error))),
        }
    }
}

/// The error followed by each of its sources, colon separated
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[derive(Debug, Default, Deserialize)]
struct InitProps {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct StartProps {
    data_source: Vec<Row>,
    fields: Vec<Field>,
    #[serde(default)]
    limits: Option<ViewLimits>,
}

#[derive(Debug, Deserialize)]
struct ViewProps {
    #[serde(default)]
    dimensions: Vec<String>,
    #[serde(default)]
    measures: Vec<String>,
}

impl From<ViewProps> for ViewSpace {
    fn from(props: ViewProps) -> Self {
        ViewSpace::new(props.dimensions, props.measures)
    }
}

#[derive(Debug, Deserialize)]
struct AggregateProps {
    #[serde(default)]
    dimensions: Vec<String>,
    measures: Vec<String>,
    ops: Vec<StatOp>,
}

#[derive(Debug, Deserialize)]
struct InferProps {
    data_source: Vec<Row>,
}

/// Routes task requests to one engine instance
pub struct Dispatcher {
    config: EngineConfig,
    progress: Arc<dyn ProgressStore>,
    engine: Option<Engine>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Dispatcher {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            progress: Arc::new(NoopProgressStore),
            engine: None,
        }
    }

    pub fn with_progress(mut self, store: Arc<dyn ProgressStore>) -> Self {
        self.progress = store;
        self
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    /// Handle one request; failures become a `success: false` response
    pub fn handle(&mut self, request: TaskRequest) -> TaskResponse {
        debug!(task = %request.task, "Dispatching task");
        match self.route(&request.task, request.props) {
            Ok(data) => TaskResponse::ok(data),
            Err(e) => {
                warn!(task = %request.task, error = %e, "Task failed");
                TaskResponse::failure(&request.task, &e)
            }
        }
    }

    /// Handle one JSON-encoded request and return the JSON response
    pub fn handle_json(&mut self, line: &str) -> String {
        let response = match serde_json::from_str::<TaskRequest>(line) {
            Ok(request) => self.handle(request),
            Err(e) => TaskResponse::failure("request", &Error::from(e)),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"message":"[response] {}"}}"#, e)
        })
    }

    fn engine_ref(&self) -> Result<&Engine> {
        self.engine.as_ref().ok_or(Error::EngineNotCreated)
    }

    fn engine_mut(&mut self) -> Result<&mut Engine> {
        self.engine.as_mut().ok_or(Error::EngineNotCreated)
    }

    fn new_engine(&self, mode: CubeMode) -> Engine {
        Engine::new(self.config, mode).with_progress(self.progress.clone())
    }

    fn route(&mut self, task: &str, props: Value) -> Result<Value> {
        match task {
            "init" => {
                let props: InitProps = if props.is_null() {
                    InitProps::default()
                } else {
                    serde_json::from_value(props)?
                };
                let mode = match props.mode.as_deref() {
                    None => CubeMode::default(),
                    Some(name) => CubeMode::from_str(name).map_err(Error::InvalidData)?,
                };
                let mode = match (mode, props.dir) {
                    (CubeMode::Disk { .. }, Some(dir)) => CubeMode::Disk { dir: Some(dir) },
                    (mode, _) => mode,
                };
                self.engine = Some(self.new_engine(mode));
                Ok(Value::Bool(true))
            }
            "destroy" => {
                self.engine = None;
                Ok(Value::Bool(true))
            }
            "start" => {
                let props: StartProps = serde_json::from_value(props)?;
                let output = self
                    .engine_mut()?
                    .start(props.data_source, props.fields, props.limits)?;
                Ok(serde_json::to_value(output)?)
            }
            "specification" => {
                let view: ViewSpace = serde_json::from_value::<ViewProps>(props)?.into();
                Ok(serde_json::to_value(self.engine_ref()?.specification(&view)?)?)
            }
            "associate" => {
                let view: ViewSpace = serde_json::from_value::<ViewProps>(props)?.into();
                Ok(serde_json::to_value(self.engine_ref()?.associate(&view)?)?)
            }
            "aggregate" | "cube" => {
                let props: AggregateProps = serde_json::from_value(props)?;
                let rows = self
                    .engine_ref()?
                    .aggregate(&props.dimensions, &props.measures, &props.ops)?;
                Ok(serde_json::to_value(rows)?)
            }
            "download" => Ok(serde_json::to_value(self.engine_ref()?.serialize()?)?),
            "upload" => {
                let snapshot: EngineSnapshot = serde_json::from_value(props)?;
                let mode = self
                    .engine
                    .as_ref()
                    .map(|e| e.mode().clone())
                    .unwrap_or_default();
                let engine = Engine::deserialize(snapshot, mode)?.with_progress(self.progress.clone());
                self.engine = Some(engine);
                Ok(Value::Bool(true))
            }
            "sync" => Ok(serde_json::to_value(self.engine_ref()?.sync())?),
            "subinsight" => {
                let view: ViewSpace = serde_json::from_value::<ViewProps>(props)?.into();
                Ok(serde_json::to_value(self.engine_ref()?.search_point_interests(&view)?)?)
            }
            "infermeta" => {
                let props: InferProps = serde_json::from_value(props)?;
                Ok(serde_json::to_value(infer_fields(&props.data_source))?)
            }
            other => Err(Error::UnknownTask(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Value {
        let rows: Vec<Value> = (0..30)
            .map(|i| {
                json!({
                    "city": (["oslo", "rome", "lima"][i % 3]),
                    "temp": if i % 3 == 0 { -5.0 + i as f64 } else { 20.0 + i as f64 },
                    "rain": (i % 7) as f64,
                })
            })
            .collect();
        Value::Array(rows)
    }

    fn started() -> Dispatcher {
        let mut dispatcher = Dispatcher::default();
        assert!(dispatcher.handle(TaskRequest::new("init", json!({ "mode": "memory" }))).success);
        let fields = dispatcher.handle(TaskRequest::new("infermeta", json!({ "data_source": rows() })));
        assert!(fields.success);
        let response = dispatcher.handle(TaskRequest::new(
            "start",
            json!({ "data_source": rows(), "fields": fields.data.unwrap() }),
        ));
        assert!(response.success, "{:?}", response.message);
        dispatcher
    }

    #[test]
    fn test_unknown_task() {
        let mut dispatcher = Dispatcher::default();
        let response = dispatcher.handle(TaskRequest::new("explode", Value::Null));
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("[explode] Unknown task: \"explode\""));
    }

    #[test]
    fn test_engine_must_be_created() {
        let mut dispatcher = Dispatcher::default();
        let response = dispatcher.handle(TaskRequest::new("sync", Value::Null));
        assert_eq!(response.message.as_deref(), Some("[sync] Engine is not created"));
    }

    #[test]
    fn test_precursor_error_is_reported() {
        let mut dispatcher = Dispatcher::default();
        dispatcher.handle(TaskRequest::new("init", Value::Null));
        let response = dispatcher.handle(TaskRequest::new(
            "associate",
            json!({ "dimensions": ["city"], "measures": ["temp"] }),
        ));
        assert!(!response.success);
        let message = response.message.unwrap();
        assert!(message.starts_with("[associate] 'associate' requires stage 'scored'"));
    }

    #[test]
    fn test_infermeta_needs_no_engine() {
        let mut dispatcher = Dispatcher::default();
        let response = dispatcher.handle(TaskRequest::new("infermeta", json!({ "data_source": rows() })));
        let fields: Vec<Field> = serde_json::from_value(response.data.unwrap()).unwrap();
        assert_eq!(fields.len(), 3);
        assert!(dispatcher.engine().is_none());
    }

    #[test]
    fn test_start_and_queries() {
        let mut dispatcher = started();

        let sync = dispatcher.handle(TaskRequest::new("sync", Value::Null));
        let data = sync.data.unwrap();
        assert_eq!(data["data_source"].as_array().unwrap().len(), 30);
        assert!(!data["insight_spaces"].as_array().unwrap().is_empty());

        let spec = dispatcher.handle(TaskRequest::new(
            "specification",
            json!({ "dimensions": ["city"], "measures": ["temp"] }),
        ));
        assert_eq!(spec.data.unwrap()["data_view"].as_array().unwrap().len(), 3);

        let cube = dispatcher.handle(TaskRequest::new(
            "cube",
            json!({ "dimensions": ["city"], "measures": ["rain"], "ops": ["count"] }),
        ));
        assert!(cube.success);

        let outliers = dispatcher.handle(TaskRequest::new(
            "subinsight",
            json!({ "dimensions": ["city"], "measures": ["temp"] }),
        ));
        assert_eq!(outliers.data.unwrap().as_array().unwrap().len(), 3);

        let related = dispatcher.handle(TaskRequest::new(
            "associate",
            json!({ "dimensions": ["city"], "measures": ["temp"] }),
        ));
        assert!(related.success);
    }

    #[test]
    fn test_download_upload_round_trip() {
        let mut dispatcher = started();
        let snapshot = dispatcher.handle(TaskRequest::new("download", Value::Null)).data.unwrap();
        let before = dispatcher.handle(TaskRequest::new("sync", Value::Null)).data;

        let mut other = Dispatcher::default();
        let response = other.handle(TaskRequest::new("upload", snapshot));
        assert!(response.success, "{:?}", response.message);
        let after = other.handle(TaskRequest::new("sync", Value::Null)).data;
        assert_eq!(before, after);
    }

    #[test]
    fn test_destroy_drops_engine() {
        let mut dispatcher = started();
        dispatcher.handle(TaskRequest::new("destroy", Value::Null));
        assert!(dispatcher.engine().is_none());
    }

    #[test]
    fn test_handle_json_rejects_malformed_request() {
        let mut dispatcher = Dispatcher::default();
        let out = dispatcher.handle_json("{not json");
        let response: TaskResponse = serde_json::from_str(&out).unwrap();
        assert!(!response.success);
        assert!(response.message.unwrap().starts_with("[request] JSON error"));

        let out = dispatcher.handle_json(r#"{"task":"destroy"}"#);
        let response: TaskResponse = serde_json::from_str(&out).unwrap();
        assert!(response.success);
    }
}
