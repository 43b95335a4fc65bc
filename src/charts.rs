//! Chart rendering: histograms, bar charts, and a correlation heatmap.
//!
//! Charts are drawn with plotters' SVG backend and delivered as base64 data
//! URIs ready to embed in an `<img>` tag. Rendering failure on one chart
//! (e.g. a single-valued column) is logged and skipped; it never aborts the
//! other charts.

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use plotters::prelude::*;
use serde::Serialize;

use crate::analyzer::{Analysis, CorrelationMatrix};
use crate::table::{Column, Table};

/// Buckets per histogram.
const HISTOGRAM_BINS: usize = 30;
/// Bars per categorical chart.
const BAR_TOP_N: usize = 10;

const CHART_WIDTH: u32 = 640;
const CHART_HEIGHT: u32 = 400;

/// Bar fill, matching the report's steelblue accent.
const BAR_COLOR: RGBColor = RGBColor(70, 130, 180);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    BarChart,
    Heatmap,
}

/// A rendered chart: a title plus an image payload encoded as a
/// `data:image/svg+xml;base64,...` URI.
#[derive(Debug, Clone, Serialize)]
pub struct ChartArtifact {
    pub kind: ChartKind,
    pub title: String,
    pub payload: String,
}

/// Render the standard chart set for a table, in deterministic order:
/// histograms for numeric columns (source order), bar charts for categorical
/// columns (source order), then the correlation heatmap when present.
pub fn render(table: &Table, analysis: &Analysis) -> Vec<ChartArtifact> {
    let mut artifacts = Vec::new();

    for column in table.numeric_columns() {
        let title = format!("Distribution of {}", column.name);
        match render_histogram(column) {
            Ok(svg) => artifacts.push(artifact(ChartKind::Histogram, title, svg)),
            Err(e) => tracing::warn!(column = %column.name, error = %e, "skipping histogram"),
        }
    }

    for column in table.categorical_columns() {
        let title = format!("Top Values in {}", column.name);
        match render_bar_chart(column) {
            Ok(svg) => artifacts.push(artifact(ChartKind::BarChart, title, svg)),
            Err(e) => tracing::warn!(column = %column.name, error = %e, "skipping bar chart"),
        }
    }

    if let Some(correlation) = &analysis.correlation {
        match render_heatmap(correlation) {
            Ok(svg) => artifacts.push(artifact(
                ChartKind::Heatmap,
                "Correlation Heatmap".to_string(),
                svg,
            )),
            Err(e) => tracing::warn!(error = %e, "skipping correlation heatmap"),
        }
    }

    artifacts
}

fn artifact(kind: ChartKind, title: String, svg: String) -> ChartArtifact {
    ChartArtifact {
        kind,
        title,
        payload: format!("data:image/svg+xml;base64,{}", BASE64.encode(svg)),
    }
}

fn render_histogram(column: &Column) -> Result<String> {
    let values = column.numeric_values();
    if values.is_empty() {
        return Err(anyhow!("no values to chart"));
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > min) {
        return Err(anyhow!("column is single-valued"));
    }

    let width = (max - min) / HISTOGRAM_BINS as f64;
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for v in &values {
        let bin = (((v - min) / width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    let y_max = *counts.iter().max().unwrap_or(&1) as f64;

    let mut svg = String::new();
    {
        let root =
            SVGBackend::with_string(&mut svg, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("fill error: {}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Distribution of {}", column.name), ("sans-serif", 22))
            .margin(16)
            .x_label_area_size(36)
            .y_label_area_size(48)
            .build_cartesian_2d(min..max, 0.0..y_max * 1.05)
            .map_err(|e| anyhow!("chart build error: {}", e))?;

        chart
            .configure_mesh()
            .x_desc(column.name.as_str())
            .y_desc("Frequency")
            .draw()
            .map_err(|e| anyhow!("mesh error: {}", e))?;

        chart
            .draw_series(counts.iter().enumerate().map(|(i, count)| {
                let x0 = min + i as f64 * width;
                let x1 = x0 + width;
                Rectangle::new([(x0, 0.0), (x1, *count as f64)], BAR_COLOR.filled())
            }))
            .map_err(|e| anyhow!("series error: {}", e))?;

        root.present().map_err(|e| anyhow!("present error: {}", e))?;
    }
    Ok(svg)
}

fn render_bar_chart(column: &Column) -> Result<String> {
    let values = column.text_values();
    if values.is_empty() {
        return Err(anyhow!("no values to chart"));
    }

    // Count in first-encountered order so ties are stable.
    let mut ranked: Vec<(String, usize)> = Vec::new();
    for value in values {
        match ranked.iter_mut().find(|(v, _)| v == value) {
            Some((_, count)) => *count += 1,
            None => ranked.push((value.to_string(), 1)),
        }
    }
    ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    ranked.truncate(BAR_TOP_N);

    let labels: Vec<String> = ranked.iter().map(|(v, _)| truncate_label(v, 14)).collect();
    let y_max = ranked.iter().map(|(_, c)| *c).max().unwrap_or(1) as f64;
    let n = ranked.len();

    let mut svg = String::new();
    {
        let root =
            SVGBackend::with_string(&mut svg, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("fill error: {}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Top Values in {}", column.name), ("sans-serif", 22))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(48)
            .build_cartesian_2d(0.0..n as f64, 0.0..y_max * 1.1)
            .map_err(|e| anyhow!("chart build error: {}", e))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&|x| {
                labels
                    .get(x.floor() as usize)
                    .cloned()
                    .unwrap_or_default()
            })
            .y_desc("Count")
            .draw()
            .map_err(|e| anyhow!("mesh error: {}", e))?;

        chart
            .draw_series(ranked.iter().enumerate().map(|(i, (_, count))| {
                Rectangle::new(
                    [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, *count as f64)],
                    BAR_COLOR.filled(),
                )
            }))
            .map_err(|e| anyhow!("series error: {}", e))?;

        root.present().map_err(|e| anyhow!("present error: {}", e))?;
    }
    Ok(svg)
}

fn render_heatmap(correlation: &CorrelationMatrix) -> Result<String> {
    let n = correlation.labels.len();
    if n < 2 {
        return Err(anyhow!("heatmap needs at least two numeric columns"));
    }
    let labels: Vec<String> = correlation
        .labels
        .iter()
        .map(|l| truncate_label(l, 12))
        .collect();

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (CHART_WIDTH, CHART_WIDTH))
            .into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("fill error: {}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Correlation Heatmap", ("sans-serif", 22))
            .margin(16)
            .x_label_area_size(56)
            .y_label_area_size(72)
            .build_cartesian_2d(0.0..n as f64, 0.0..n as f64)
            .map_err(|e| anyhow!("chart build error: {}", e))?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n)
            .y_labels(n)
            .x_label_formatter(&|x| label_at(&labels, *x))
            .y_label_formatter(&|y| label_at(&labels, *y))
            .draw()
            .map_err(|e| anyhow!("mesh error: {}", e))?;

        for i in 0..n {
            for j in 0..n {
                let r = correlation.get(i, j);
                // Row 0 at the top.
                let y = (n - 1 - i) as f64;
                let x = j as f64;
                let cell = Rectangle::new(
                    [(x + 0.02, y + 0.02), (x + 0.98, y + 0.98)],
                    correlation_color(r).filled(),
                );
                chart
                    .draw_series(std::iter::once(cell))
                    .map_err(|e| anyhow!("cell error: {}", e))?;

                let text = if r.is_nan() {
                    "n/a".to_string()
                } else {
                    format!("{:.2}", r)
                };
                let label = Text::new(
                    text,
                    (x + 0.5, y + 0.5),
                    ("sans-serif", 14).into_font().color(&BLACK),
                );
                chart
                    .draw_series(std::iter::once(label))
                    .map_err(|e| anyhow!("label error: {}", e))?;
            }
        }

        root.present().map_err(|e| anyhow!("present error: {}", e))?;
    }
    Ok(svg)
}

fn label_at(labels: &[String], position: f64) -> String {
    // Tick positions land on cell boundaries; attribute each to the cell
    // below it.
    let idx = position.floor() as usize;
    labels.get(idx).cloned().unwrap_or_default()
}

/// Map a correlation in [-1, 1] onto a blue-white-red ramp. NaN renders as
/// neutral gray.
fn correlation_color(r: f64) -> RGBColor {
    if r.is_nan() {
        return RGBColor(224, 224, 224);
    }
    let r = r.clamp(-1.0, 1.0);
    if r >= 0.0 {
        let t = r;
        RGBColor(
            255,
            (255.0 * (1.0 - t * 0.7)) as u8,
            (255.0 * (1.0 - t * 0.8)) as u8,
        )
    } else {
        let t = -r;
        RGBColor(
            (255.0 * (1.0 - t * 0.8)) as u8,
            (255.0 * (1.0 - t * 0.6)) as u8,
            255,
        )
    }
}

fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        label.to_string()
    } else {
        let head: String = label.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
