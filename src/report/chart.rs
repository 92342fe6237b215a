use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use super::{ChartData, ReportSink, TraceMode};
use crate::Result;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.27.0.min.js";

/// Writes the chart as a standalone Plotly HTML page
pub struct HtmlChart {
    path: PathBuf,
}

impl HtmlChart {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Plotly figure with one row per panel sharing the x axis
pub fn plotly_figure(chart: &ChartData) -> Value {
    let rows = chart.panels.len().max(1);
    let mut traces = Vec::new();
    let mut annotations = Vec::new();

    for (row, (panel, series)) in chart.panels.iter().enumerate() {
        let axis = if row == 0 {
            "y".to_string()
        } else {
            format!("y{}", row + 1)
        };

        for s in series {
            let mut trace = json!({
                "type": "scatter",
                "name": s.name,
                "x": s.x,
                "y": s.y,
                "mode": s.mode,
                "showlegend": s.show_legend,
                "xaxis": "x",
                "yaxis": axis,
            });
            if s.mode == TraceMode::Markers {
                let symbol = if s.name == "Sell" { "triangle-down" } else { "triangle-up" };
                trace["marker"] = json!({ "size": 10, "symbol": symbol });
            }
            traces.push(trace);
        }

        // Row title on the right edge, centred on the row
        let centre = 1.0 - (row as f64 + 0.5) / rows as f64;
        annotations.push(json!({
            "text": panel.title(),
            "xref": "paper",
            "yref": "paper",
            "x": 1.02,
            "y": centre,
            "xanchor": "left",
            "textangle": 90,
            "showarrow": false,
        }));
    }

    json!({
        "data": traces,
        "layout": {
            "title": { "text": chart.title },
            "grid": { "rows": rows, "columns": 1, "pattern": "coupled" },
            "annotations": annotations,
            "hovermode": "x unified",
        }
    })
}

/// Standalone HTML document embedding `figure`
pub fn render_html(title: &str, figure: &Value) -> Result<String> {
    // Keep "</script>" inside string values from closing the tag
    let figure_json = serde_json::to_string(figure)?.replace("</", "<\\/");

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:95vh;"></div>
<script>
const figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout, {{responsive: true}});
</script>
</body>
</html>
"#,
        title = html_escape(title),
        cdn = PLOTLY_CDN,
        figure = figure_json,
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl ReportSink for HtmlChart {
    fn render_chart(&mut self, chart: &ChartData) -> Result<()> {
        if chart.panels.is_empty() {
            tracing::warn!("All chart panels disabled, not writing {}", self.path.display());
            return Ok(());
        }

        let html = render_html(&chart.title, &plotly_figure(chart))?;
        std::fs::write(&self.path, html)?;

        tracing::info!("Chart written to {}", self.path.display());
        Ok(())
    }
}
