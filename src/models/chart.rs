use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Doughnut,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
        }
    }

    /// Fixed palette per chart kind. Selection never depends on data
    /// values, so neither do the colors.
    pub fn palette(&self) -> &'static [&'static str] {
        match self {
            ChartKind::Bar => BAR_PALETTE,
            ChartKind::Line => LINE_PALETTE,
            ChartKind::Pie => PIE_PALETTE,
            ChartKind::Doughnut => DOUGHNUT_PALETTE,
        }
    }
}

const BAR_PALETTE: &[&str] = &[
    "#36a2eb", "#4bc0c0", "#9966ff", "#36a2eb", "#4bc0c0", "#9966ff",
];
const LINE_PALETTE: &[&str] = &["#ff6384", "#36a2eb"];
const PIE_PALETTE: &[&str] = &[
    "#ff6384", "#36a2eb", "#ffce56", "#4bc0c0", "#9966ff", "#ff9f40",
];
const DOUGHNUT_PALETTE: &[&str] = &[
    "#4bc0c0", "#ff9f40", "#9966ff", "#ff6384", "#36a2eb", "#ffce56",
];

/// Rendering options carried with each recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    pub show_legend: bool,
    /// Zero-based value axis; meaningful for bar and line only.
    pub begin_at_zero: bool,
}

/// A declarative description of one proposed visualization.
///
/// `label_column` and `value_column` name columns of the shaped result
/// table; the rendering layer binds them to literal values at draw time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRecommendation {
    pub kind: ChartKind,
    pub title: String,
    pub label_column: String,
    pub value_column: String,
    pub palette: Vec<String>,
    pub options: ChartOptions,
}

impl ChartRecommendation {
    pub fn new(kind: ChartKind, title: String, label_column: String, value_column: String) -> Self {
        let options = match kind {
            ChartKind::Bar | ChartKind::Line => ChartOptions {
                show_legend: false,
                begin_at_zero: true,
            },
            ChartKind::Pie | ChartKind::Doughnut => ChartOptions {
                show_legend: true,
                begin_at_zero: false,
            },
        };
        Self {
            kind,
            title,
            label_column,
            value_column,
            palette: kind.palette().iter().map(|c| c.to_string()).collect(),
            options,
        }
    }

    /// Chart.js-style configuration. Column names stand in for the data
    /// arrays, matching the contract that configs never embed literal
    /// values.
    pub fn to_config(&self) -> Value {
        json!({
            "type": self.kind.as_str(),
            "data": {
                "labels": [self.label_column],
                "datasets": [{
                    "label": self.value_column,
                    "data": [self.value_column],
                    "backgroundColor": self.palette,
                }]
            },
            "options": {
                "plugins": {
                    "title": { "display": true, "text": self.title },
                    "legend": { "display": self.options.show_legend },
                },
                "scales": if self.options.begin_at_zero {
                    json!({ "y": { "beginAtZero": true } })
                } else {
                    json!({})
                },
            }
        })
    }
}
