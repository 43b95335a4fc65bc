//! The in-memory tabular data model and the data-reference grammar.
//!
//! A `DataReference` is parsed once from user input and is immutable after
//! that; a `Table` is created once by the loader and read-only afterwards.

use std::path::PathBuf;

use regex::Regex;

/// A reference to tabular data, as extracted from a chat message or CLI
/// argument.
#[derive(Debug, Clone, PartialEq)]
pub enum DataReference {
    /// An HTTP(S) URL to a CSV or JSON document.
    RemoteUrl(String),
    /// A Google Sheets link. Rewritten to its CSV-export equivalent before
    /// fetching; the original URL is kept for display.
    GoogleSheet(String),
    /// A path to a local CSV/JSON file.
    LocalPath(PathBuf),
    /// Raw CSV or JSON text pasted directly into the message.
    InlineText(String),
}

impl DataReference {
    /// Classify a raw input string.
    ///
    /// Mirrors the precedence a user expects: URLs win, then inline JSON/CSV
    /// shapes, then existing local files. Anything else is treated as a URL
    /// attempt and will surface as `UnreachableSource` at fetch time.
    pub fn parse(input: &str) -> DataReference {
        let trimmed = input.trim();

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            if trimmed.contains("docs.google.com") && trimmed.contains("/spreadsheets/") {
                return DataReference::GoogleSheet(trimmed.to_string());
            }
            return DataReference::RemoteUrl(trimmed.to_string());
        }

        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return DataReference::InlineText(trimmed.to_string());
        }

        if trimmed.contains(',') && trimmed.contains('\n') {
            return DataReference::InlineText(trimmed.to_string());
        }

        let path = PathBuf::from(trimmed);
        if path.is_file() {
            return DataReference::LocalPath(path);
        }

        DataReference::RemoteUrl(trimmed.to_string())
    }

    /// The URL to actually fetch, with Google Sheets edit links rewritten to
    /// their CSV-export endpoint (same document id, same sheet tab).
    pub fn fetch_url(&self) -> Option<String> {
        match self {
            DataReference::RemoteUrl(url) => Some(url.clone()),
            DataReference::GoogleSheet(url) => Some(sheet_export_url(url)),
            _ => None,
        }
    }

    /// Short display form for reports and log lines. Inline text is truncated.
    pub fn display(&self) -> String {
        match self {
            DataReference::RemoteUrl(url) | DataReference::GoogleSheet(url) => url.clone(),
            DataReference::LocalPath(path) => path.display().to_string(),
            DataReference::InlineText(text) => {
                if text.len() > 100 {
                    let cut = text
                        .char_indices()
                        .take_while(|(i, _)| *i < 100)
                        .last()
                        .map(|(i, c)| i + c.len_utf8())
                        .unwrap_or(0);
                    format!("{}...", &text[..cut])
                } else {
                    text.clone()
                }
            }
        }
    }
}

/// Rewrite a Google Sheets URL to its CSV-export equivalent.
///
/// `https://docs.google.com/spreadsheets/d/XYZ/edit#gid=7` becomes
/// `https://docs.google.com/spreadsheets/d/XYZ/export?format=csv&gid=7`.
/// URLs that already point at the export endpoint pass through untouched.
fn sheet_export_url(url: &str) -> String {
    if url.contains("/export?format=csv") {
        return url.to_string();
    }

    let gid = url
        .split("gid=")
        .nth(1)
        .map(|rest| {
            rest.split(['&', '#'])
                .next()
                .unwrap_or("0")
                .to_string()
        })
        .unwrap_or_else(|| "0".to_string());

    let id = url
        .split("/spreadsheets/d/")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .map(str::to_string)
        .or_else(|| {
            // Fallback for nonstandard sheet links.
            Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)")
                .ok()
                .and_then(|re| re.captures(url))
                .map(|caps| caps[1].to_string())
        });

    match id {
        Some(id) => format!(
            "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
            id, gid
        ),
        None => url.to_string(),
    }
}

/// How a column participates in analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
    /// Nested structures (JSON objects/arrays). Recognized but excluded from
    /// numeric and categorical analysis.
    Complex,
}

/// A homogeneous-typed column. `None` marks a missing cell (absent in the
/// source, or an empty string).
#[derive(Debug, Clone)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Complex(Vec<Option<serde_json::Value>>),
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        match self.values {
            ColumnValues::Numeric(_) => ColumnKind::Numeric,
            ColumnValues::Text(_) => ColumnKind::Text,
            ColumnValues::Complex(_) => ColumnKind::Complex,
        }
    }

    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
            ColumnValues::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_count(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Complex(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Present numeric values, in row order. Empty for non-numeric columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().filter_map(|x| *x).collect(),
            _ => Vec::new(),
        }
    }

    /// Numeric cells including missing slots, in row order.
    pub fn numeric_cells(&self) -> &[Option<f64>] {
        match &self.values {
            ColumnValues::Numeric(v) => v,
            _ => &[],
        }
    }

    /// Present text values, in row order. Empty for non-text columns.
    pub fn text_values(&self) -> Vec<&str> {
        match &self.values {
            ColumnValues::Text(v) => v.iter().filter_map(|x| x.as_deref()).collect(),
            _ => Vec::new(),
        }
    }
}

/// An ordered sequence of named, typed columns. Created once by the loader;
/// read-only thereafter.
#[derive(Debug, Clone)]
pub struct Table {
    /// Display form of the reference this table was loaded from.
    pub source: String,
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn new(source: String, columns: Vec<Column>) -> Table {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        debug_assert!(columns.iter().all(|c| c.len() == rows));
        Table {
            source,
            columns,
            rows,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns.len())
    }

    /// Numeric columns in source order.
    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.kind() == ColumnKind::Numeric)
            .collect()
    }

    /// Text (categorical) columns in source order.
    pub fn categorical_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.kind() == ColumnKind::Text)
            .collect()
    }
}
