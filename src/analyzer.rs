//! Descriptive statistics over a loaded `Table`.
//!
//! The analyzer never hard-fails: a table with nothing to summarize simply
//! produces a narrower `Analysis`. Standard deviation is the sample standard
//! deviation (ddof = 1) throughout.

use std::collections::HashMap;

use serde::Serialize;

use crate::table::{Column, ColumnKind, Table};

/// How many distinct values a categorical summary reports.
pub const TOP_K: usize = 5;

/// Per-column statistical digest.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    Complex(ComplexSummary),
}

impl ColumnSummary {
    pub fn name(&self) -> &str {
        match self {
            ColumnSummary::Numeric(s) => &s.name,
            ColumnSummary::Categorical(s) => &s.name,
            ColumnSummary::Complex(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub name: String,
    /// Present (non-missing) values.
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (ddof = 1); 0.0 when fewer than two values.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Bias-corrected sample skewness; 0.0 when fewer than three values or
    /// the column is constant.
    pub skew: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoricalSummary {
    pub name: String,
    pub unique_values: usize,
    /// Top-K most frequent values with counts, ties broken by
    /// first-encountered order.
    pub top_values: Vec<(String, usize)>,
}

impl CategoricalSummary {
    pub fn most_common(&self) -> Option<&str> {
        self.top_values.first().map(|(v, _)| v.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplexSummary {
    pub name: String,
    /// Present nested values; the column is otherwise excluded from analysis.
    pub sample_count: usize,
}

/// Missing-value report across all columns.
#[derive(Debug, Clone, Serialize)]
pub struct MissingReport {
    pub entries: Vec<MissingEntry>,
    pub total_missing: usize,
    pub total_cells: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingEntry {
    pub column: String,
    pub count: usize,
    pub fraction: f64,
}

impl MissingReport {
    /// Overall missing percentage across all cells.
    pub fn overall_percentage(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.total_missing as f64 / self.total_cells as f64 * 100.0
        }
    }
}

/// Pearson correlation over numeric columns. Present only when the table has
/// at least two numeric columns.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    /// Row-major, `labels.len()` square. Undefined pairs (a constant column)
    /// are NaN, as a dataframe library would report them.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }
}

/// The full analyzer output for one table.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub summaries: Vec<ColumnSummary>,
    pub missing: MissingReport,
    pub correlation: Option<CorrelationMatrix>,
}

impl Analysis {
    pub fn numeric_summaries(&self) -> impl Iterator<Item = &NumericSummary> {
        self.summaries.iter().filter_map(|s| match s {
            ColumnSummary::Numeric(n) => Some(n),
            _ => None,
        })
    }

    /// The numeric column with the largest sample standard deviation.
    pub fn highest_variance_column(&self) -> Option<&NumericSummary> {
        self.numeric_summaries()
            .max_by(|a, b| a.std.total_cmp(&b.std))
    }
}

/// Compute summaries, the missing report, and (when ≥2 numeric columns) the
/// correlation matrix.
pub fn analyze(table: &Table) -> Analysis {
    let summaries = table.columns().iter().map(summarize_column).collect();
    let missing = missing_report(table);
    let correlation = correlation_matrix(table);
    Analysis {
        summaries,
        missing,
        correlation,
    }
}

fn summarize_column(column: &Column) -> ColumnSummary {
    match column.kind() {
        ColumnKind::Numeric => ColumnSummary::Numeric(numeric_summary(column)),
        ColumnKind::Text => ColumnSummary::Categorical(categorical_summary(column)),
        ColumnKind::Complex => ColumnSummary::Complex(ComplexSummary {
            name: column.name.clone(),
            sample_count: column.len() - column.missing_count(),
        }),
    }
}

fn numeric_summary(column: &Column) -> NumericSummary {
    let values = column.numeric_values();
    NumericSummary {
        name: column.name.clone(),
        count: values.len(),
        mean: mean(&values),
        median: median(&values),
        std: sample_std(&values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        skew: sample_skewness(&values),
    }
}

fn categorical_summary(column: &Column) -> CategoricalSummary {
    let values = column.text_values();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (i, value) in values.iter().enumerate() {
        *counts.entry(value).or_insert(0) += 1;
        first_seen.entry(value).or_insert(i);
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by_key(|(value, count)| (std::cmp::Reverse(*count), first_seen[value]));

    CategoricalSummary {
        name: column.name.clone(),
        unique_values: ranked.len(),
        top_values: ranked
            .into_iter()
            .take(TOP_K)
            .map(|(value, count)| (value.to_string(), count))
            .collect(),
    }
}

fn missing_report(table: &Table) -> MissingReport {
    let rows = table.rows();
    let entries: Vec<MissingEntry> = table
        .columns()
        .iter()
        .map(|column| {
            let count = column.missing_count();
            MissingEntry {
                column: column.name.clone(),
                count,
                fraction: if rows == 0 {
                    0.0
                } else {
                    count as f64 / rows as f64
                },
            }
        })
        .collect();
    let total_missing = entries.iter().map(|e| e.count).sum();
    MissingReport {
        entries,
        total_missing,
        total_cells: rows * table.columns().len(),
    }
}

fn correlation_matrix(table: &Table) -> Option<CorrelationMatrix> {
    let numeric = table.numeric_columns();
    if numeric.len() < 2 {
        return None;
    }

    let labels: Vec<String> = numeric.iter().map(|c| c.name.clone()).collect();
    let n = numeric.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        values[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(numeric[i].numeric_cells(), numeric[j].numeric_cells());
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Some(CorrelationMatrix { labels, values })
}

/// Pearson correlation over pairwise-complete observations. NaN when fewer
/// than two complete pairs exist or either side is constant.
fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 { f64::NAN } else { cov / denom }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation (ddof = 1). 0.0 for fewer than two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Adjusted Fisher-Pearson sample skewness, the dataframe-library default:
/// `n / ((n-1)(n-2)) * sum(((x - mean) / s)^3)` with s the sample std.
/// 0.0 for fewer than three values or a constant column.
fn sample_skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let s = sample_std(values);
    if s == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let n = n as f64;
    let sum_cubed: f64 = values.iter().map(|v| ((v - m) / s).powi(3)).sum();
    n / ((n - 1.0) * (n - 2.0)) * sum_cubed
}
