//! Data loader: turns a `DataReference` into a typed `Table`.
//!
//! Remote references are fetched over HTTP (redirects followed, non-2xx is
//! failure); payloads are parsed as CSV or JSON and normalized into the same
//! columnar shape. Column types are inferred per column: numeric coercion is
//! attempted on every value, text is the fallback, and nested JSON values
//! mark a column as complex.

use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use crate::errors::LoadError;
use crate::table::{Column, ColumnValues, DataReference, Table};

/// Format hint derived from the URL, content type, or payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatHint {
    Csv,
    Json,
    Unknown,
}

pub struct Loader {
    http: reqwest::Client,
}

impl Loader {
    pub fn new(timeout: Duration) -> Result<Loader> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("tabula")
            .build()?;
        Ok(Loader { http })
    }

    /// Load the referenced data into a `Table`.
    pub async fn load(&self, reference: &DataReference) -> Result<Table, LoadError> {
        let (text, hint) = match reference {
            DataReference::InlineText(text) => {
                let hint = if text.starts_with('{') || text.starts_with('[') {
                    FormatHint::Json
                } else {
                    FormatHint::Unknown
                };
                (text.clone(), hint)
            }
            DataReference::LocalPath(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    LoadError::UnreachableSource {
                        url: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                (text, hint_from_url(&path.display().to_string(), None))
            }
            DataReference::RemoteUrl(url) => self.fetch(url).await?,
            DataReference::GoogleSheet(_) => {
                // fetch_url rewrites the edit link to the CSV export endpoint.
                match reference.fetch_url() {
                    Some(url) => self.fetch(&url).await?,
                    None => return Err(LoadError::UnsupportedFormat(
                        "not a fetchable reference".to_string(),
                    )),
                }
            }
        };

        let columns = parse_payload(&text, hint)?;
        let table = Table::new(reference.display(), columns);
        if table.rows() == 0 {
            return Err(LoadError::EmptyDataset);
        }
        Ok(table)
    }

    async fn fetch(&self, url: &str) -> Result<(String, FormatHint), LoadError> {
        let unreachable = |reason: String| LoadError::UnreachableSource {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("HTTP status {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());
        let hint = hint_from_url(url, content_type.as_deref());

        let text = response
            .text()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        Ok((text, hint))
    }
}

fn hint_from_url(url: &str, content_type: Option<&str>) -> FormatHint {
    let content_type = content_type.unwrap_or("");
    if content_type.contains("csv") || url.ends_with(".csv") || url.contains("format=csv") {
        FormatHint::Csv
    } else if content_type.contains("json") || url.ends_with(".json") {
        FormatHint::Json
    } else {
        FormatHint::Unknown
    }
}

/// Parse a payload into typed columns, using the hint to pick the parser.
/// With no hint, CSV is tried first, then JSON.
fn parse_payload(text: &str, hint: FormatHint) -> Result<Vec<Column>, LoadError> {
    match hint {
        FormatHint::Csv => parse_csv(text),
        FormatHint::Json => parse_json(text),
        FormatHint::Unknown => parse_csv(text).or_else(|_| {
            parse_json(text).map_err(|_| {
                LoadError::UnsupportedFormat(
                    "payload did not parse as CSV or as JSON".to_string(),
                )
            })
        }),
    }
}

fn parse_csv(text: &str) -> Result<Vec<Column>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::UnsupportedFormat(format!("invalid CSV header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err(LoadError::UnsupportedFormat("CSV has no header row".to_string()));
    }

    let mut cells: Vec<Vec<Option<Value>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record =
            record.map_err(|e| LoadError::UnsupportedFormat(format!("invalid CSV row: {}", e)))?;
        for (i, column) in cells.iter_mut().enumerate() {
            let raw = record.get(i).unwrap_or("");
            if raw.is_empty() {
                column.push(None);
            } else {
                column.push(Some(Value::String(raw.to_string())));
            }
        }
    }

    Ok(headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| infer_column(name, values))
        .collect())
}

fn parse_json(text: &str) -> Result<Vec<Column>, LoadError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| LoadError::UnsupportedFormat(format!("invalid JSON: {}", e)))?;

    match value {
        Value::Array(items) => columns_from_rows(items),
        Value::Object(map) => {
            // A mapping of column-name to list-of-values becomes one column
            // per key; otherwise fall back to the first embedded list of rows,
            // or treat the object itself as a single row.
            if !map.is_empty() && map.values().all(|v| v.is_array()) {
                let rows = map
                    .values()
                    .map(|v| v.as_array().map(Vec::len).unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                let columns = map
                    .into_iter()
                    .map(|(name, value)| {
                        let mut list = match value {
                            Value::Array(items) => {
                                items.into_iter().map(normalize_cell).collect::<Vec<_>>()
                            }
                            _ => Vec::new(),
                        };
                        list.resize(rows, None);
                        infer_column(name, list)
                    })
                    .collect();
                return Ok(columns);
            }
            let mut map = map;
            if let Some(rows) = map.iter().find_map(|(k, v)| match v {
                Value::Array(_) => Some(k.clone()),
                _ => None,
            }) {
                if let Some(Value::Array(items)) = map.remove(&rows) {
                    return columns_from_rows(items);
                }
            }
            // No embedded list: the object itself is a single row.
            columns_from_rows(vec![Value::Object(map)])
        }
        _ => Err(LoadError::UnsupportedFormat(
            "JSON payload is not an array or object".to_string(),
        )),
    }
}

/// Normalize a list of flat JSON mappings (rows) into columns. Column order
/// follows first encounter across rows; cells absent from a row are missing.
fn columns_from_rows(rows: Vec<Value>) -> Result<Vec<Column>, LoadError> {
    let mut names: Vec<String> = Vec::new();
    let mut cells: Vec<Vec<Option<Value>>> = Vec::new();

    for (row_idx, row) in rows.iter().enumerate() {
        let Value::Object(map) = row else {
            return Err(LoadError::UnsupportedFormat(
                "JSON array items must be objects".to_string(),
            ));
        };
        for (key, _) in map {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
                // Backfill rows seen before this column appeared.
                cells.push(vec![None; row_idx]);
            }
        }
        for (i, name) in names.iter().enumerate() {
            let cell = map.get(name).cloned().map(normalize_cell).unwrap_or(None);
            cells[i].push(cell);
        }
    }

    Ok(names
        .into_iter()
        .zip(cells)
        .map(|(name, values)| infer_column(name, values))
        .collect())
}

/// Null and empty-string cells are missing.
fn normalize_cell(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(other),
    }
}

/// Infer a column's type from its cells.
///
/// Any nested value marks the column complex. Otherwise numeric coercion is
/// attempted on every present value; one uncoercible value demotes the whole
/// column to text.
fn infer_column(name: String, cells: Vec<Option<Value>>) -> Column {
    let has_nested = cells
        .iter()
        .flatten()
        .any(|v| v.is_object() || v.is_array());
    if has_nested {
        return Column {
            name,
            values: ColumnValues::Complex(cells),
        };
    }

    let numeric: Vec<Option<f64>> = cells.iter().map(|c| c.as_ref().and_then(coerce_f64)).collect();
    let all_numeric = cells
        .iter()
        .zip(&numeric)
        .all(|(cell, parsed)| cell.is_none() || parsed.is_some());
    let any_present = numeric.iter().any(|v| v.is_some());

    if all_numeric && any_present {
        return Column {
            name,
            values: ColumnValues::Numeric(numeric),
        };
    }

    let text = cells
        .into_iter()
        .map(|cell| cell.map(value_to_text))
        .collect();
    Column {
        name,
        values: ColumnValues::Text(text),
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnKind;

    fn load_inline(text: &str) -> Result<Table, LoadError> {
        let loader = Loader::new(Duration::from_secs(5)).unwrap();
        let reference = DataReference::InlineText(text.to_string());
        tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(loader.load(&reference))
    }

    #[test]
    fn csv_row_and_column_counts_preserved() {
        let table = load_inline("Product,Category,Sales\nLaptop,Electronics,1500\nPhone,Electronics,2000\n").unwrap();
        assert_eq!(table.shape(), (2, 3));
    }

    #[test]
    fn csv_types_inferred() {
        let table =
            load_inline("Product,Category,Sales\nLaptop,Electronics,1500\nPhone,Electronics,2000\n")
                .unwrap();
        let kinds: Vec<ColumnKind> = table.columns().iter().map(Column::kind).collect();
        assert_eq!(
            kinds,
            vec![ColumnKind::Text, ColumnKind::Text, ColumnKind::Numeric]
        );
        assert_eq!(table.columns()[2].numeric_values(), vec![1500.0, 2000.0]);
    }

    #[test]
    fn csv_empty_cells_are_missing() {
        let table = load_inline("a,b\n1,\n2,x\n").unwrap();
        assert_eq!(table.columns()[1].missing_count(), 1);
    }

    #[test]
    fn csv_mixed_column_falls_back_to_text() {
        let table = load_inline("a,b\n1,2\nx,3\n").unwrap();
        assert_eq!(table.columns()[0].kind(), ColumnKind::Text);
        assert_eq!(table.columns()[1].kind(), ColumnKind::Numeric);
    }

    #[test]
    fn csv_with_header_only_is_empty_dataset() {
        let result = load_inline("a,b,c\n");
        assert!(matches!(result, Err(LoadError::EmptyDataset)));
    }

    #[test]
    fn json_list_of_rows() {
        let table = load_inline(r#"[{"name": "a", "n": 1}, {"name": "b", "n": 2}]"#).unwrap();
        assert_eq!(table.shape(), (2, 2));
        let n = table
            .columns()
            .iter()
            .find(|c| c.name == "n")
            .unwrap();
        assert_eq!(n.numeric_values(), vec![1.0, 2.0]);
    }

    #[test]
    fn json_rows_with_ragged_keys() {
        let table = load_inline(r#"[{"a": 1}, {"a": 2, "b": "x"}]"#).unwrap();
        assert_eq!(table.shape(), (2, 2));
        let b = table.columns().iter().find(|c| c.name == "b").unwrap();
        assert_eq!(b.missing_count(), 1);
    }

    #[test]
    fn json_column_mapping() {
        let table = load_inline(r#"{"sales": [10, 20, 30], "region": ["n", "s", "n"]}"#).unwrap();
        assert_eq!(table.shape(), (3, 2));
        let sales = table.columns().iter().find(|c| c.name == "sales").unwrap();
        assert_eq!(sales.numeric_values(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn json_single_object_is_one_row() {
        let table = load_inline(r#"{"name": "only", "n": 5}"#).unwrap();
        assert_eq!(table.shape(), (1, 2));
    }

    #[test]
    fn json_object_with_embedded_row_list() {
        let table =
            load_inline(r#"{"results": [{"a": 1}, {"a": 2}], "count": 2}"#).unwrap();
        assert_eq!(table.shape(), (2, 1));
        assert_eq!(table.columns()[0].name, "a");
    }

    #[test]
    fn json_nested_values_mark_complex() {
        let table =
            load_inline(r#"[{"id": 1, "meta": {"x": 1}}, {"id": 2, "meta": {"x": 2}}]"#).unwrap();
        let meta = table.columns().iter().find(|c| c.name == "meta").unwrap();
        assert_eq!(meta.kind(), ColumnKind::Complex);
    }

    #[test]
    fn invalid_json_with_json_shape_is_unsupported() {
        let result = load_inline("{definitely not json");
        assert!(matches!(result, Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn empty_json_array_is_empty_dataset() {
        let result = load_inline("[]");
        assert!(matches!(result, Err(LoadError::EmptyDataset)));
    }

    #[test]
    fn local_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n3,4\n").unwrap();

        let loader = Loader::new(Duration::from_secs(5)).unwrap();
        let reference = DataReference::LocalPath(path);
        let table = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(loader.load(&reference))
            .unwrap();
        assert_eq!(table.shape(), (2, 2));
    }

    #[test]
    fn missing_local_file_is_unreachable() {
        let loader = Loader::new(Duration::from_secs(5)).unwrap();
        let reference = DataReference::LocalPath("/no/such/file.csv".into());
        let result = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(loader.load(&reference));
        assert!(matches!(result, Err(LoadError::UnreachableSource { .. })));
    }

    #[test]
    fn unreachable_host_reports_url() {
        let loader = Loader::new(Duration::from_secs(1)).unwrap();
        let reference =
            DataReference::RemoteUrl("http://127.0.0.1:1/data.csv".to_string());
        let result = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(loader.load(&reference));
        match result {
            Err(LoadError::UnreachableSource { url, .. }) => {
                assert_eq!(url, "http://127.0.0.1:1/data.csv");
            }
            other => panic!("Expected UnreachableSource, got {:?}", other),
        }
    }

    #[test]
    fn hint_from_url_variants() {
        assert_eq!(hint_from_url("https://x/y.csv", None), FormatHint::Csv);
        assert_eq!(
            hint_from_url("https://x/export?format=csv&gid=0", None),
            FormatHint::Csv
        );
        assert_eq!(hint_from_url("https://x/y.json", None), FormatHint::Json);
        assert_eq!(
            hint_from_url("https://x/y", Some("application/json; charset=utf-8")),
            FormatHint::Json
        );
        assert_eq!(hint_from_url("https://x/y", Some("text/csv")), FormatHint::Csv);
        assert_eq!(hint_from_url("https://x/y", None), FormatHint::Unknown);
    }

    #[test]
    fn numeric_strings_coerce() {
        assert_eq!(coerce_f64(&Value::String(" 12.5 ".to_string())), Some(12.5));
        assert_eq!(coerce_f64(&Value::String("abc".to_string())), None);
        assert_eq!(coerce_f64(&serde_json::json!(3)), Some(3.0));
        assert_eq!(coerce_f64(&Value::Bool(true)), None);
    }
}
