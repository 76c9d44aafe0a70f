//! Chart boundary.
//!
//! The dashboard does not draw charts. It produces a `ChartView`: a canvas id
//! and size plus a Chart.js-shaped JSON config that the page's charting
//! library consumes as-is.

use serde::Serialize;
use serde_json::{json, Value};

use crate::types::ResumenAnual;

pub const SUMMARY_CHART_ID: &str = "annual-summary-chart";
pub const SUMMARY_LABEL: &str = "Promedio de Cumplimiento";

/// One labelled value of a single-series chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub kind: String,
    pub dataset_label: String,
    pub background_color: String,
    pub y_min: f64,
    pub y_max: Option<f64>,
    pub responsive: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            kind: "bar".to_string(),
            dataset_label: String::new(),
            background_color: "rgba(54, 162, 235, 0.5)".to_string(),
            y_min: 0.0,
            y_max: None,
            responsive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub element_id: String,
    pub width: u32,
    pub height: u32,
    pub config: Value,
}

pub fn render_chart(points: &[ChartPoint], element_id: &str, config: &ChartConfig) -> ChartView {
    let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();

    let mut y_axis = json!({ "beginAtZero": config.y_min == 0.0, "min": config.y_min });
    if let Some(max) = config.y_max {
        y_axis["max"] = json!(max);
    }

    ChartView {
        element_id: element_id.to_string(),
        width: 400,
        height: 200,
        config: json!({
            "type": config.kind,
            "data": {
                "labels": labels,
                "datasets": [{
                    "label": config.dataset_label,
                    "data": values,
                    "backgroundColor": config.background_color,
                }],
            },
            "options": {
                "responsive": config.responsive,
                "scales": { "y": y_axis },
            },
        }),
    }
}

/// Bar chart of average compliance per period, on a 0–100 axis.
pub fn summary_chart(resumen: &[ResumenAnual]) -> ChartView {
    let points: Vec<ChartPoint> = resumen
        .iter()
        .map(|r| ChartPoint {
            label: r.periodo.to_string(),
            value: r.promedio_cumplimiento,
        })
        .collect();
    let config = ChartConfig {
        dataset_label: SUMMARY_LABEL.to_string(),
        y_max: Some(100.0),
        ..ChartConfig::default()
    };
    render_chart(&points, SUMMARY_CHART_ID, &config)
}
