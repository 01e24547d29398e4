//! Field summaries, metadata inference and univariate selection

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::models::{AnalyticType, DataType, Field, Row, Scalar, SemanticType};
use crate::statistics::{entropy_acc, DEFAULT_BIN_NUM};

/// Per-field statistics computed once per load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub key: String,
    pub analytic_type: AnalyticType,
    pub semantic_type: SemanticType,
    pub data_type: DataType,
    /// Number of distinct non-null values
    pub distinct: usize,
    /// Number of non-null values
    pub size: usize,
    /// Entropy (bits) of the value frequency distribution
    pub entropy: f64,
    /// `log2(distinct)`
    pub max_entropy: f64,
}

impl FieldSummary {
    pub fn is_dimension(&self) -> bool {
        self.analytic_type == AnalyticType::Dimension
    }

    pub fn is_measure(&self) -> bool {
        self.analytic_type == AnalyticType::Measure
    }
}

/// Summarize one field over the dataset
pub fn summarize_field(field: &Field, rows: &[Row]) -> FieldSummary {
    let mut counter: FxHashMap<&Scalar, usize> = FxHashMap::default();
    let mut size = 0;
    for row in rows {
        match row.get(&field.key) {
            Some(value) if !value.is_null() => {
                size += 1;
                *counter.entry(value).or_insert(0) += 1;
            }
            _ => {}
        }
    }
    let frequencies: Vec<f64> = counter.values().map(|&c| c as f64).collect();
    let distinct = counter.len();
    FieldSummary {
        key: field.key.clone(),
        analytic_type: field.analytic_type,
        semantic_type: field.semantic_type,
        data_type: field.data_type,
        distinct,
        size,
        entropy: entropy_acc(&frequencies),
        max_entropy: if distinct > 0 {
            (distinct as f64).log2()
        } else {
            0.0
        },
    }
}

pub fn summarize_fields(fields: &[Field], rows: &[Row]) -> Vec<FieldSummary> {
    fields.iter().map(|f| summarize_field(f, rows)).collect()
}

/// Infer field metadata from the rows.
///
/// Columns whose non-null values are all numeric become quantitative
/// measures; everything else is a nominal dimension. Column order follows
/// first appearance.
pub fn infer_fields(rows: &[Row]) -> Vec<Field> {
    let mut order: Vec<&str> = Vec::new();
    let mut kinds: FxHashMap<&str, (bool, bool, bool)> = FxHashMap::default();
    for row in rows {
        for (key, value) in row {
            let entry = kinds.entry(key.as_str()).or_insert_with(|| {
                order.push(key.as_str());
                // (all numeric, all boolean, seen a value)
                (true, true, false)
            });
            match value {
                Scalar::Null => {}
                Scalar::Number(_) => {
                    entry.1 = false;
                    entry.2 = true;
                }
                Scalar::Bool(_) => {
                    entry.0 = false;
                    entry.2 = true;
                }
                Scalar::Text(_) => {
                    entry.0 = false;
                    entry.1 = false;
                    entry.2 = true;
                }
            }
        }
    }

    order
        .into_iter()
        .map(|key| {
            let (numeric, boolean, seen) = kinds.get(key).copied().unwrap_or((false, false, false));
            if seen && numeric {
                Field::measure(key)
            } else {
                let mut field = Field::dimension(key);
                field.data_type = if seen && boolean {
                    DataType::Boolean
                } else {
                    DataType::String
                };
                field
            }
        })
        .collect()
}

/// Split summaries into analysed dimension and measure keys.
///
/// Identifier-like dimensions (every non-null value distinct) are left out
/// when `drop_identifiers` is set and the dataset is larger than one
/// histogram. Single-valued dimensions are always kept.
pub fn univariate_selection(
    summaries: &[FieldSummary],
    row_count: usize,
    drop_identifiers: bool,
) -> (Vec<String>, Vec<String>) {
    let mut dimensions = Vec::new();
    let mut measures = Vec::new();
    for summary in summaries {
        match summary.analytic_type {
            AnalyticType::Dimension => {
                let identifier = drop_identifiers
                    && row_count > DEFAULT_BIN_NUM
                    && summary.distinct > 1
                    && summary.distinct == summary.size;
                if identifier {
                    tracing::debug!(field = %summary.key, distinct = summary.distinct, "Dropping identifier-like dimension");
                    continue;
                }
                dimensions.push(summary.key.clone());
            }
            AnalyticType::Measure => measures.push(summary.key.clone()),
        }
    }
    (dimensions, measures)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Scalar)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_summarize_counts_distinct_and_size() {
        let rows = vec![
            row(&[("city", "Oslo".into())]),
            row(&[("city", "Oslo".into())]),
            row(&[("city", "Bergen".into())]),
            row(&[("city", Scalar::Null)]),
        ];
        let summary = summarize_field(&Field::dimension("city"), &rows);
        assert_eq!(summary.distinct, 2);
        assert_eq!(summary.size, 3);
        assert!((summary.max_entropy - 1.0).abs() < 1e-12);
        assert!(summary.entropy > 0.9 && summary.entropy < 1.0);
    }

    #[test]
    fn test_infer_fields() {
        let rows = vec![
            row(&[("a", 1.0.into()), ("b", "x".into()), ("c", Scalar::Bool(true))]),
            row(&[("a", Scalar::Null), ("b", "y".into()), ("c", Scalar::Bool(false))]),
        ];
        let fields = infer_fields(&rows);
        assert_eq!(fields.len(), 3);
        let a = fields.iter().find(|f| f.key == "a").unwrap();
        assert_eq!(a.analytic_type, AnalyticType::Measure);
        let b = fields.iter().find(|f| f.key == "b").unwrap();
        assert_eq!(b.analytic_type, AnalyticType::Dimension);
        let c = fields.iter().find(|f| f.key == "c").unwrap();
        assert_eq!(c.data_type, DataType::Boolean);
    }

    #[test]
    fn test_infer_all_null_column_is_dimension() {
        let rows = vec![row(&[("empty", Scalar::Null)])];
        let fields = infer_fields(&rows);
        assert_eq!(fields[0].analytic_type, AnalyticType::Dimension);
    }

    #[test]
    fn test_selection_drops_identifier_dimensions() {
        let rows: Vec<Row> = (0..40)
            .map(|i| {
                row(&[
                    ("id", Scalar::Text(format!("row-{}", i))),
                    ("group", Scalar::Text(format!("g{}", i % 3))),
                    ("value", Scalar::Number(i as f64)),
                ])
            })
            .collect();
        let fields = vec![
            Field::dimension("id"),
            Field::dimension("group"),
            Field::measure("value"),
        ];
        let summaries = summarize_fields(&fields, &rows);

        let (dims, meas) = univariate_selection(&summaries, rows.len(), true);
        assert_eq!(dims, vec!["group".to_string()]);
        assert_eq!(meas, vec!["value".to_string()]);

        let (dims, _) = univariate_selection(&summaries, rows.len(), false);
        assert_eq!(dims.len(), 2);
    }

    #[test]
    fn test_selection_keeps_single_valued_dimensions() {
        let rows: Vec<Row> = (0..40)
            .map(|_| row(&[("constant", "same".into())]))
            .collect();
        let summaries = summarize_fields(&[Field::dimension("constant")], &rows);
        let (dims, _) = univariate_selection(&summaries, rows.len(), true);
        assert_eq!(dims, vec!["constant".to_string()]);
    }
}
