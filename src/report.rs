//! Report builder: one self-contained HTML document plus a minimal serving
//! program that exposes it on the fixed report port.
//!
//! The document embeds every chart inline, so the serving program has no
//! static assets and no server-side behavior beyond returning the page. The
//! serving program is Python/Flask source text: the sandbox is a bare Linux
//! environment where `pip install` plus one script is the cheapest thing that
//! serves HTTP.

use serde_json::json;

use crate::analyzer::{Analysis, ColumnSummary};
use crate::charts::ChartArtifact;
use crate::table::{DataReference, Table};

/// Columns missing more than this fraction of values get a key-insights
/// callout.
const MISSING_CALLOUT_FRACTION: f64 = 0.3;

/// Packages the serving program needs installed in the sandbox.
pub const SERVER_DEPENDENCIES: &[&str] = &["flask"];

/// The built report: the document and the program that serves it.
#[derive(Debug, Clone)]
pub struct ReportBundle {
    /// Self-contained HTML document with all charts embedded.
    pub html: String,
    /// Source text of the serving program (`app.py`).
    pub serving_app: String,
}

/// Assemble the report document and its serving program.
pub fn build(
    table: &Table,
    analysis: &Analysis,
    charts: &[ChartArtifact],
    reference: &DataReference,
    port: u16,
) -> ReportBundle {
    let html = render_document(table, analysis, charts, reference);
    let serving_app = render_serving_app(&html, port);
    ReportBundle { html, serving_app }
}

fn render_document(
    table: &Table,
    analysis: &Analysis,
    charts: &[ChartArtifact],
    reference: &DataReference,
) -> String {
    let (rows, cols) = table.shape();
    let column_names: Vec<String> = table
        .columns()
        .iter()
        .map(|c| escape_html(&c.name))
        .collect();

    let mut body = String::new();

    body.push_str(&format!(
        "<div class=\"data-source\"><strong>Data Source:</strong> {}</div>\n",
        data_source_display(reference)
    ));

    body.push_str(&format!(
        "<div class=\"report-section\">\n<h2>Data Overview</h2>\n\
         <p><strong>Total Rows:</strong> {}</p>\n\
         <p><strong>Total Columns:</strong> {}</p>\n\
         <p><strong>Columns:</strong> {}</p>\n</div>\n",
        rows,
        cols,
        column_names.join(", ")
    ));

    body.push_str(&stats_section(analysis));
    body.push_str(&missing_section(analysis));
    body.push_str(&insights_section(table, analysis));
    body.push_str(&charts_section(charts));

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>Data Analysis Report</title>\n<style>{}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n\
         <div class=\"header\"><h1>Data Analysis Report</h1>\
         <p>Automated data summarization</p></div>\n\
         {}\
         <div class=\"footer\">\n\
         <p>Generated by Tabula.</p>\n\
         <p>Tip: if the page shows a 502, the report server is still starting — wait a few seconds and refresh.</p>\n\
         </div>\n</div>\n</body>\n</html>\n",
        STYLE, body
    )
}

/// Statistics table over numeric columns, values rounded to two decimals.
fn stats_section(analysis: &Analysis) -> String {
    let mut rows = String::new();
    for summary in analysis.numeric_summaries() {
        rows.push_str(&format!(
            "<tr><td><strong>{}</strong></td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td></tr>\n",
            escape_html(&summary.name),
            summary.mean,
            summary.median,
            summary.std,
            summary.min,
            summary.max
        ));
    }

    if rows.is_empty() {
        return "<div class=\"report-section\">\n<h2>Summary Statistics</h2>\n\
                <p>No numeric columns found for statistical analysis.</p>\n</div>\n"
            .to_string();
    }

    format!(
        "<div class=\"report-section\">\n<h2>Summary Statistics</h2>\n\
         <table class=\"stats-table\"><thead><tr>\
         <th>Column</th><th>Mean</th><th>Median</th><th>Std Dev</th><th>Min</th><th>Max</th>\
         </tr></thead>\n<tbody>\n{}</tbody></table>\n</div>\n",
        rows
    )
}

fn missing_section(analysis: &Analysis) -> String {
    let affected: Vec<_> = analysis
        .missing
        .entries
        .iter()
        .filter(|e| e.count > 0)
        .collect();
    if affected.is_empty() {
        return String::new();
    }

    let mut rows = String::new();
    for entry in affected {
        rows.push_str(&format!(
            "<tr><td><strong>{}</strong></td><td>{}</td><td>{:.1}%</td></tr>\n",
            escape_html(&entry.column),
            entry.count,
            entry.fraction * 100.0
        ));
    }

    format!(
        "<div class=\"report-section\">\n<h2>Missing Values</h2>\n\
         <table class=\"stats-table\"><thead><tr>\
         <th>Column</th><th>Missing Count</th><th>Missing</th>\
         </tr></thead>\n<tbody>\n{}</tbody></table>\n</div>\n",
        rows
    )
}

/// Templated "key insights": one line per column, plus dataset-level notes.
fn insights_section(table: &Table, analysis: &Analysis) -> String {
    let mut items = Vec::new();

    for summary in &analysis.summaries {
        let name = escape_html(summary.name());
        match summary {
            ColumnSummary::Numeric(s) => items.push(format!(
                "<li><strong>{}:</strong> Mean = {:.2}, Median = {:.2}, Range = {:.2} to {:.2}, Skew = {:.2}</li>",
                name, s.mean, s.median, s.min, s.max, s.skew
            )),
            ColumnSummary::Categorical(s) => {
                let most_common = s
                    .most_common()
                    .map(escape_html)
                    .unwrap_or_else(|| "n/a".to_string());
                items.push(format!(
                    "<li><strong>{}:</strong> {} unique values. Most common: {}</li>",
                    name, s.unique_values, most_common
                ));
            }
            ColumnSummary::Complex(s) => items.push(format!(
                "<li><strong>{}:</strong> Contains nested data ({} samples)</li>",
                name, s.sample_count
            )),
        }
    }

    if let Some(top) = analysis.highest_variance_column() {
        items.push(format!(
            "<li><strong>Highest variance:</strong> {} (std dev {:.2})</li>",
            escape_html(&top.name),
            top.std
        ));
    }

    for entry in &analysis.missing.entries {
        if entry.fraction > MISSING_CALLOUT_FRACTION {
            items.push(format!(
                "<li><strong>{}</strong> is missing {:.0}% of its values</li>",
                escape_html(&entry.column),
                entry.fraction * 100.0
            ));
        }
    }

    let (rows, cols) = table.shape();
    items.push(format!(
        "<li><strong>Dataset:</strong> {} rows × {} columns. Missing data: {:.2}%</li>",
        rows,
        cols,
        analysis.missing.overall_percentage()
    ));

    format!(
        "<div class=\"report-section\">\n<h2>Key Insights</h2>\n\
         <ul class=\"insights-list\">\n{}\n</ul>\n</div>\n",
        items.join("\n")
    )
}

fn charts_section(charts: &[ChartArtifact]) -> String {
    if charts.is_empty() {
        return String::new();
    }

    let mut containers = String::new();
    for chart in charts {
        containers.push_str(&format!(
            "<div class=\"chart-container\"><h3>{}</h3>\
             <img src=\"{}\" alt=\"{}\" class=\"chart-image\"></div>\n",
            escape_html(&chart.title),
            chart.payload,
            escape_html(&chart.title)
        ));
    }

    format!(
        "<div class=\"report-section\">\n<h2>Visualizations</h2>\n{}</div>\n",
        containers
    )
}

fn data_source_display(reference: &DataReference) -> String {
    match reference {
        DataReference::RemoteUrl(url) | DataReference::GoogleSheet(url) => {
            let escaped = escape_html(url);
            format!(
                "<a href=\"{}\" target=\"_blank\">{}</a>",
                escaped, escaped
            )
        }
        other => format!("<span class=\"inline-source\">{}</span>", escape_html(&other.display())),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Generate the Flask serving program. The document is embedded as a JSON
/// string literal, which is also a valid Python string literal.
fn render_serving_app(html: &str, port: u16) -> String {
    let literal = json!(html).to_string();
    format!(
        "from flask import Flask\nimport os\n\napp = Flask(__name__)\n\nHTML = {literal}\n\n\n\
         @app.route('/callback')\ndef callback():\n    return 'ok', 200\n\n\n\
         @app.route('/healthz')\ndef healthz():\n    return 'ok', 200\n\n\n\
         @app.route('/')\ndef report():\n    return HTML\n\n\n\
         if __name__ == '__main__':\n    port = int(os.environ.get('PORT', '{port}'))\n    app.run(host='0.0.0.0', port=port)\n"
    )
}

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif;
    background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
    min-height: 100vh;
    padding: 20px;
    line-height: 1.6;
}
.container { max-width: 1200px; margin: 0 auto; }
.header {
    background: white;
    border-radius: 16px;
    padding: 32px;
    margin-bottom: 24px;
    box-shadow: 0 8px 32px rgba(0,0,0,0.1);
}
.header h1 { font-size: 2.4em; color: #4c51bf; margin-bottom: 8px; }
.header p { color: #666; }
.data-source {
    background: white;
    padding: 18px;
    border-radius: 12px;
    margin-bottom: 24px;
    border-left: 5px solid #2196f3;
    box-shadow: 0 4px 6px rgba(0,0,0,0.1);
    word-break: break-all;
}
.inline-source { font-family: monospace; font-size: 0.9em; }
.report-section {
    background: white;
    border-radius: 12px;
    padding: 28px;
    margin: 18px 0;
    box-shadow: 0 4px 6px rgba(0,0,0,0.1);
}
.report-section h2 {
    color: #333;
    border-bottom: 3px solid #667eea;
    padding-bottom: 12px;
    margin-bottom: 18px;
}
.stats-table { width: 100%; border-collapse: collapse; margin: 16px 0; }
.stats-table thead { background: #667eea; color: white; }
.stats-table th { padding: 12px; text-align: left; }
.stats-table td { padding: 10px 12px; border-bottom: 1px solid #e0e0e0; }
.insights-list { list-style-type: none; }
.insights-list li {
    padding: 12px;
    margin: 10px 0;
    background: #f8f9fa;
    border-left: 5px solid #667eea;
    border-radius: 8px;
}
.chart-container {
    text-align: center;
    padding: 20px 0;
    border-bottom: 1px solid #eee;
}
.chart-container h3 { color: #333; margin-bottom: 12px; }
.chart-image { max-width: 100%; height: auto; border-radius: 8px; }
.footer {
    background: white;
    border-radius: 12px;
    padding: 24px;
    margin-top: 24px;
    text-align: center;
    color: #666;
    box-shadow: 0 4px 6px rgba(0,0,0,0.1);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::charts;
    use crate::table::{Column, ColumnValues, Table};

    fn sales_table() -> Table {
        Table::new(
            "inline".to_string(),
            vec![
                Column {
                    name: "Product".to_string(),
                    values: ColumnValues::Text(vec![
                        Some("Laptop".to_string()),
                        Some("Phone".to_string()),
                    ]),
                },
                Column {
                    name: "Category".to_string(),
                    values: ColumnValues::Text(vec![
                        Some("Electronics".to_string()),
                        Some("Electronics".to_string()),
                    ]),
                },
                Column {
                    name: "Sales".to_string(),
                    values: ColumnValues::Numeric(vec![Some(1500.0), Some(2000.0)]),
                },
            ],
        )
    }

    fn build_sales_report() -> ReportBundle {
        let table = sales_table();
        let analysis = analyze(&table);
        let artifacts = charts::render(&table, &analysis);
        let reference = DataReference::InlineText("Product,Category,Sales\n...".to_string());
        build(&table, &analysis, &artifacts, &reference, 3000)
    }

    #[test]
    fn document_contains_shape_and_sections() {
        let bundle = build_sales_report();
        assert!(bundle.html.contains("<strong>Total Rows:</strong> 2"));
        assert!(bundle.html.contains("<strong>Total Columns:</strong> 3"));
        assert!(bundle.html.contains("Summary Statistics"));
        assert!(bundle.html.contains("Key Insights"));
        assert!(bundle.html.contains("Visualizations"));
    }

    #[test]
    fn stats_table_round_trips_summary_values() {
        let table = sales_table();
        let analysis = analyze(&table);
        let bundle = build(
            &table,
            &analysis,
            &[],
            &DataReference::InlineText("x".to_string()),
            3000,
        );

        // Parse the Sales row back out of the rendered table.
        let row_re = regex::Regex::new(
            r"<tr><td><strong>Sales</strong></td><td>([\d.]+)</td><td>([\d.]+)</td><td>([\d.]+)</td><td>([\d.]+)</td><td>([\d.]+)</td></tr>",
        )
        .unwrap();
        let caps = row_re.captures(&bundle.html).expect("Sales row present");

        let summary = analysis
            .numeric_summaries()
            .find(|s| s.name == "Sales")
            .unwrap();
        assert_eq!(&caps[1], format!("{:.2}", summary.mean).as_str());
        assert_eq!(&caps[2], format!("{:.2}", summary.median).as_str());
        assert_eq!(&caps[3], format!("{:.2}", summary.std).as_str());
        assert_eq!(&caps[4], format!("{:.2}", summary.min).as_str());
        assert_eq!(&caps[5], format!("{:.2}", summary.max).as_str());
    }

    #[test]
    fn numeric_insight_reports_skew() {
        let table = Table::new(
            "t".to_string(),
            vec![Column {
                name: "v".to_string(),
                values: ColumnValues::Numeric(vec![Some(1.0), Some(2.0), Some(10.0)]),
            }],
        );
        let analysis = analyze(&table);
        let bundle = build(
            &table,
            &analysis,
            &[],
            &DataReference::InlineText("x".to_string()),
            3000,
        );
        assert!(bundle.html.contains("Skew = 1.65"));
    }

    #[test]
    fn missing_section_omitted_when_complete() {
        let bundle = build_sales_report();
        assert!(!bundle.html.contains("Missing Values"));
    }

    #[test]
    fn missing_section_lists_affected_columns() {
        let table = Table::new(
            "t".to_string(),
            vec![Column {
                name: "v".to_string(),
                values: ColumnValues::Numeric(vec![Some(1.0), None, None]),
            }],
        );
        let analysis = analyze(&table);
        let bundle = build(
            &table,
            &analysis,
            &[],
            &DataReference::InlineText("x".to_string()),
            3000,
        );
        assert!(bundle.html.contains("Missing Values"));
        assert!(bundle.html.contains("<td>2</td>"));
        assert!(bundle.html.contains("66.7%"));
        // >30% missing also earns a key-insights callout.
        assert!(bundle.html.contains("is missing 67% of its values"));
    }

    #[test]
    fn url_reference_rendered_as_link() {
        let table = sales_table();
        let analysis = analyze(&table);
        let bundle = build(
            &table,
            &analysis,
            &[],
            &DataReference::RemoteUrl("https://example.com/d.csv".to_string()),
            3000,
        );
        assert!(bundle
            .html
            .contains("<a href=\"https://example.com/d.csv\""));
    }

    #[test]
    fn inline_reference_is_escaped() {
        let table = sales_table();
        let analysis = analyze(&table);
        let bundle = build(
            &table,
            &analysis,
            &[],
            &DataReference::InlineText("<script>alert(1)</script>,x\n1,2".to_string()),
            3000,
        );
        assert!(!bundle.html.contains("<script>alert(1)"));
        assert!(bundle.html.contains("&lt;script&gt;"));
    }

    #[test]
    fn charts_embedded_as_data_uris() {
        let bundle = build_sales_report();
        assert!(bundle.html.contains("data:image/svg+xml;base64,"));
    }

    #[test]
    fn serving_app_embeds_document_and_port() {
        let bundle = build_sales_report();
        assert!(bundle.serving_app.contains("from flask import Flask"));
        assert!(bundle.serving_app.contains("'3000'"));
        assert!(bundle.serving_app.contains("@app.route('/healthz')"));
        assert!(bundle.serving_app.contains("@app.route('/callback')"));
        // The embedded literal carries the report title.
        assert!(bundle.serving_app.contains("Data Analysis Report"));
    }

    #[test]
    fn serving_app_literal_is_one_line() {
        // JSON-escaped embedding must not introduce raw newlines into the
        // Python string literal.
        let bundle = build_sales_report();
        let html_line = bundle
            .serving_app
            .lines()
            .find(|l| l.starts_with("HTML = "))
            .expect("HTML assignment present");
        assert!(html_line.ends_with('"'));
    }

    #[test]
    fn no_numeric_columns_message() {
        let table = Table::new(
            "t".to_string(),
            vec![Column {
                name: "city".to_string(),
                values: ColumnValues::Text(vec![Some("Oslo".to_string())]),
            }],
        );
        let analysis = analyze(&table);
        let bundle = build(
            &table,
            &analysis,
            &[],
            &DataReference::InlineText("x".to_string()),
            3000,
        );
        assert!(bundle
            .html
            .contains("No numeric columns found for statistical analysis."));
    }
}
