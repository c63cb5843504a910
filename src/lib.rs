// Library exports for gdxgraph

pub mod axes;
pub mod chart;
pub mod cluster;
pub mod config;
pub mod container;
pub mod csv_reader;
pub mod data;
pub mod graph;
pub mod pivot;
pub mod render;
pub mod style;
pub mod validate;

pub use axes::{Axes, Figure};
pub use config::ChartConfig;
pub use chart::{
    graph_scenarios_three_variables, graph_scenarios_two_variables, graph_three_variables,
    graph_two_variables, stacked_bar_graph, Baseline, ComparisonRequest, Dimension,
    SeriesOptions, StackedBarOptions,
};
pub use container::{describe_container, Container, MemoryContainer, Symbol, SymbolKind};
pub use data::{Measure, RecordTable, Scenario};
pub use pivot::{RowKey, SeriesKey, WideTable};
pub use render::ChartKind;
pub use style::{ChartStyles, Color, LineDash, Marker, StyleMap};
pub use validate::{verify, Diagnostic, Selection};
pub use graph::render_figure;

use serde::Deserialize;

/// Hard failures raised while building a chart.
///
/// These travel inside `anyhow::Error`; use `downcast_ref::<ChartError>()`
/// to recover the class.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("No {map} entry for key '{key}'")]
    StyleKeyMissing { map: &'static str, key: String },

    #[error("Ambiguous pivot: more than one row for axis value '{axis}' and series '{series}'")]
    AmbiguousPivot { axis: String, series: String },

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Table has neither a 'value' nor a 'level' column")]
    MissingMeasurement,

    #[error("Failed to parse '{value}' as number in column '{column}'")]
    InvalidMeasurement { column: String, value: String },
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
    #[serde(default)]
    pub title: Option<String>,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
            title: None,
        }
    }
}
