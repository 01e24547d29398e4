//! CSV dataset loading

use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fields::infer_fields;
use crate::models::{Field, Row, Scalar};

/// Rows of a CSV file plus its column order
#[derive(Debug, Clone)]
pub struct CsvDataset {
    /// Header names in file order
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl CsvDataset {
    /// Inferred field metadata, in column order
    pub fn infer_fields(&self) -> Vec<Field> {
        let mut fields = infer_fields(&self.rows);
        fields.sort_by_key(|f| {
            self.columns
                .iter()
                .position(|c| *c == f.key)
                .unwrap_or(usize::MAX)
        });
        fields
    }
}

/// Convert a CSV record to a row using headers as keys
fn record_to_row(headers: &StringRecord, record: &StringRecord) -> Row {
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let value = record.get(i).map(Scalar::parse).unwrap_or_default();
            (header.to_string(), value)
        })
        .collect()
}

/// Parse a headed CSV file into rows.
///
/// Empty cells become nulls, numeric cells numbers and `true`/`false`
/// booleans. Short records are padded with nulls.
pub fn parse_csv<R: Read>(reader: R) -> Result<CsvDataset> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(Error::InvalidData("CSV has no header row".to_string()));
    }
    if let Some(dup) = duplicate_header(&headers) {
        return Err(Error::InvalidData(format!("Duplicate CSV column: {}", dup)));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record_to_row(&headers, &record));
    }

    debug!(rows = rows.len(), columns = headers.len(), "Parsed CSV dataset");
    Ok(CsvDataset {
        columns: headers.iter().map(String::from).collect(),
        rows,
    })
}

fn duplicate_header(headers: &StringRecord) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    headers
        .iter()
        .find(|h| !seen.insert(*h))
        .map(|h| h.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_types_cells() {
        let data = "region,sales,active\nnorth,10.5,true\nsouth,,false\n";
        let rows = parse_csv(data.as_bytes()).unwrap().rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["region"], Scalar::from("north"));
        assert_eq!(rows[0]["sales"], Scalar::Number(10.5));
        assert_eq!(rows[0]["active"], Scalar::Bool(true));
        assert!(rows[1]["sales"].is_null());
    }

    #[test]
    fn test_parse_csv_pads_short_records() {
        let data = "a,b\n1\n";
        let rows = parse_csv(data.as_bytes()).unwrap().rows;
        assert!(rows[0]["b"].is_null());
    }

    #[test]
    fn test_inferred_fields_follow_column_order() {
        let data = "zone,amount,city\nx,1,Oslo\ny,2,Bergen\n";
        let dataset = parse_csv(data.as_bytes()).unwrap();
        let keys: Vec<String> = dataset.infer_fields().into_iter().map(|f| f.key).collect();
        assert_eq!(keys, vec!["zone", "amount", "city"]);
    }

    #[test]
    fn test_parse_csv_rejects_duplicate_columns() {
        let data = "a,a\n1,2\n";
        assert!(matches!(
            parse_csv(data.as_bytes()),
            Err(Error::InvalidData(_))
        ));
    }
}
