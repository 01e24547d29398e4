//! Data models for Sightline

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A single cell value.
///
/// Serialized untagged so rows read and write as plain JSON objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view of the value. NaN counts as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Parse a raw text cell: empty is null, numbers and booleans are typed.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Scalar::Null;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Scalar::Number(n);
            }
        }
        match trimmed {
            "true" | "TRUE" | "True" => Scalar::Bool(true),
            "false" | "FALSE" | "False" => Scalar::Bool(false),
            _ => Scalar::Text(trimmed.to_string()),
        }
    }
}

// NaN equals NaN and -0.0 equals 0.0 so numbers can key hash maps.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Number(a), Scalar::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::Null => {}
            Scalar::Bool(b) => b.hash(state),
            Scalar::Number(n) => {
                if n.is_nan() {
                    u64::MAX.hash(state);
                } else if *n == 0.0 {
                    0u64.hash(state);
                } else {
                    n.to_bits().hash(state);
                }
            }
            Scalar::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// One dataset row: field key to value.
pub type Row = BTreeMap<String, Scalar>;

/// Role of a field in the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticType {
    /// Partitions rows into groups
    Dimension,
    /// Numeric quantity to aggregate
    Measure,
}

impl AnalyticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticType::Dimension => "dimension",
            AnalyticType::Measure => "measure",
        }
    }
}

impl fmt::Display for AnalyticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalyticType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dimension" => Ok(AnalyticType::Dimension),
            "measure" => Ok(AnalyticType::Measure),
            _ => Err(format!("Unknown analytic type: {}", s)),
        }
    }
}

/// Semantic type of a field, as a chart layer would encode it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Nominal,
    Ordinal,
    Temporal,
    Quantitative,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Nominal => "nominal",
            SemanticType::Ordinal => "ordinal",
            SemanticType::Temporal => "temporal",
            SemanticType::Quantitative => "quantitative",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nominal" => Ok(SemanticType::Nominal),
            "ordinal" => Ok(SemanticType::Ordinal),
            "temporal" => Ok(SemanticType::Temporal),
            "quantitative" => Ok(SemanticType::Quantitative),
            _ => Err(format!("Unknown semantic type: {}", s)),
        }
    }
}

/// Physical type of the values in a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Number,
    String,
    Boolean,
    #[default]
    Unknown,
}

/// Field metadata supplied with a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    pub analytic_type: AnalyticType,
    pub semantic_type: SemanticType,
    #[serde(default)]
    pub data_type: DataType,
}

impl Field {
    pub fn dimension(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            analytic_type: AnalyticType::Dimension,
            semantic_type: SemanticType::Nominal,
            data_type: DataType::String,
        }
    }

    pub fn measure(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            analytic_type: AnalyticType::Measure,
            semantic_type: SemanticType::Quantitative,
            data_type: DataType::Number,
        }
    }
}

/// Aggregation operator applied to a measure within a cuboid group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatOp {
    Sum,
    Count,
    Mean,
    Min,
    Max,
    /// Fixed-length histogram over `DEFAULT_BIN_NUM` bins
    Dist,
}

impl StatOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatOp::Sum => "sum",
            StatOp::Count => "count",
            StatOp::Mean => "mean",
            StatOp::Min => "min",
            StatOp::Max => "max",
            StatOp::Dist => "dist",
        }
    }
}

impl fmt::Display for StatOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StatOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(StatOp::Sum),
            "count" => Ok(StatOp::Count),
            "mean" => Ok(StatOp::Mean),
            "min" => Ok(StatOp::Min),
            "max" => Ok(StatOp::Max),
            "dist" => Ok(StatOp::Dist),
            _ => Err(format!("Unknown aggregation op: {}", s)),
        }
    }
}

/// Maximum number of fields of each kind in one view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewLimits {
    pub dimension: usize,
    pub measure: usize,
}

impl Default for ViewLimits {
    fn default() -> Self {
        Self {
            dimension: 2,
            measure: 3,
        }
    }
}

/// A candidate combination of dimensions and measures
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ViewSpace {
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
}

impl ViewSpace {
    pub fn new(dimensions: Vec<String>, measures: Vec<String>) -> Self {
        Self {
            dimensions,
            measures,
        }
    }

    /// Deduplication key: joined dimensions and joined measures
    pub fn key(&self) -> String {
        format!("{}||{}", self.dimensions.join("-"), self.measures.join("-"))
    }

    pub fn fits(&self, limits: &ViewLimits) -> bool {
        self.dimensions.len() <= limits.dimension && self.measures.len() <= limits.measure
    }
}

/// A scored view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSpace {
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    /// Normalized information gain, higher is more interesting
    pub score: f64,
    pub significance: f64,
    /// Recorded identically to `score`
    pub impurity: f64,
}

impl InsightSpace {
    pub fn new(view: ViewSpace, score: f64) -> Self {
        Self {
            dimensions: view.dimensions,
            measures: view.measures,
            score,
            significance: 1.0,
            impurity: score,
        }
    }

    pub fn view(&self) -> ViewSpace {
        ViewSpace::new(self.dimensions.clone(), self.measures.clone())
    }

    pub fn key(&self) -> String {
        format!("{}||{}", self.dimensions.join("-"), self.measures.join("-"))
    }
}

/// Order-independent equality of two key lists
pub fn is_set_equal(a: &[String], b: &[String]) -> bool {
    let left: HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    left == right
}

/// Whether two key lists share at least one member
pub fn intersects(a: &[String], b: &[String]) -> bool {
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.iter().any(|k| right.contains(k.as_str()))
}
