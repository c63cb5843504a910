//! JSON chart descriptions for the command-line tool.
//!
//! ```json
//! {
//!   "chart": "stacked_bar",
//!   "scenarios": [{"label": "Reference", "path": "reference.csv"}],
//!   "x_var": "year", "y_var": "tech",
//!   "years": ["2020", "2030"], "data": ["coal", "wind"],
//!   "labels": {"coal": "Coal", "wind": "Wind"},
//!   "colors": {"coal": "black", "wind": "#2ca02c"}
//! }
//! ```
//!
//! Style map keys name a category combination joined with `|`, e.g.
//! `"coal|QC|High"`. Relative scenario paths are resolved against the
//! directory of the description file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::axes::Axes;
use crate::chart::{
    graph_scenarios_three_variables, graph_scenarios_two_variables, graph_three_variables,
    graph_two_variables, stacked_bar_graph, SeriesOptions, StackedBarOptions,
};
use crate::csv_reader::read_csv_file;
use crate::data::Scenario;
use crate::pivot::{Baseline, ComparisonRequest, Dimension, WideTable};
use crate::render::ChartKind;
use crate::style::{ChartStyles, Color, LineDash, Marker, StyleMap};
use crate::RenderOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    StackedBar,
    Line,
    Area,
    Bar,
    Barh,
}

impl ChartType {
    fn series_kind(self) -> Option<ChartKind> {
        match self {
            ChartType::StackedBar => None,
            ChartType::Line => Some(ChartKind::Line),
            ChartType::Area => Some(ChartKind::Area),
            ChartType::Bar => Some(ChartKind::Bar),
            ChartType::Barh => Some(ChartKind::Barh),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioSource {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DimensionConfig {
    pub column: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NarrowConfig {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BaselineConfig {
    pub scenario: String,
    pub year: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    pub chart: ChartType,
    pub scenarios: Vec<ScenarioSource>,
    pub x_var: String,
    pub y_var: String,
    pub years: Vec<String>,
    pub data: Vec<String>,
    #[serde(default)]
    pub z: Option<DimensionConfig>,
    #[serde(default)]
    pub narrow: Option<NarrowConfig>,
    #[serde(default)]
    pub baseline: Option<BaselineConfig>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub colors: HashMap<String, Color>,
    #[serde(default)]
    pub line_styles: Option<HashMap<String, LineDash>>,
    #[serde(default)]
    pub line_widths: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub markers: Option<HashMap<String, Marker>>,
    #[serde(default)]
    pub legend_position: Option<(f64, f64)>,
    #[serde(default = "default_year_height")]
    pub year_height: f64,
    #[serde(default)]
    pub render: RenderOptions,
}

fn default_year_height() -> f64 {
    3.0
}

impl ChartConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse chart description")
    }

    /// Load a description and resolve its scenario paths.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        let mut config = Self::from_json_str(&json)
            .with_context(|| format!("Invalid chart description '{}'", path.display()))?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for source in &mut self.scenarios {
            if source.path.is_relative() {
                source.path = base.join(&source.path);
            }
        }
    }

    pub fn request(&self) -> ComparisonRequest {
        let mut request =
            ComparisonRequest::new(&self.x_var, &self.y_var, &self.years, &self.data);
        request.z = self
            .z
            .as_ref()
            .map(|z| Dimension { column: z.column.clone(), values: z.values.clone() });
        if let Some(narrow) = &self.narrow {
            request = request.narrowed_to(&narrow.column, &narrow.value);
        }
        request
    }

    pub fn styles(&self) -> ChartStyles {
        let mut styles = ChartStyles::new(StyleMap::from_joined("color", self.colors.clone()));
        if let Some(map) = &self.line_styles {
            styles = styles.with_line_styles(StyleMap::from_joined("line style", map.clone()));
        }
        if let Some(map) = &self.line_widths {
            styles = styles.with_line_widths(StyleMap::from_joined("line width", map.clone()));
        }
        if let Some(map) = &self.markers {
            styles = styles.with_markers(StyleMap::from_joined("marker", map.clone()));
        }
        styles
    }

    pub fn load_scenarios(&self) -> Result<Vec<Scenario>> {
        self.scenarios
            .iter()
            .map(|source| {
                let table = read_csv_file(&source.path)
                    .with_context(|| format!("Failed to load scenario '{}'", source.label))?;
                Ok(Scenario::new(source.label.clone(), table))
            })
            .collect()
    }

    /// Draw the described chart from already loaded scenarios.
    ///
    /// One scenario uses the single-scenario variants, several use the
    /// multi-scenario ones.
    pub fn draw(&self, ax: &mut dyn Axes, scenarios: &[Scenario]) -> Result<WideTable> {
        if scenarios.is_empty() {
            bail!("A chart needs at least one scenario");
        }
        let request = self.request();

        let Some(kind) = self.chart.series_kind() else {
            let options = StackedBarOptions {
                baseline: self.baseline.as_ref().map(|b| Baseline {
                    scenario: b.scenario.clone(),
                    axis_value: b.year.clone(),
                }),
                legend_position: self.legend_position,
                year_height: self.year_height,
            };
            let colors = StyleMap::from_joined("color", self.colors.clone());
            return stacked_bar_graph(ax, scenarios, &request, &self.labels, &colors, &options);
        };

        let mut options = SeriesOptions::new(kind, self.styles());
        options.legend_position = self.legend_position;

        match (scenarios, &self.z) {
            ([single], None) => {
                graph_two_variables(ax, &single.table, &request, &self.labels, &options)
            }
            ([single], Some(z)) => graph_three_variables(
                ax,
                &single.table,
                &request,
                &self.labels,
                &z.labels,
                &options,
            ),
            (_, None) => {
                graph_scenarios_two_variables(ax, scenarios, &request, &self.labels, &options)
            }
            (_, Some(z)) => graph_scenarios_three_variables(
                ax,
                scenarios,
                &request,
                &self.labels,
                &z.labels,
                &options,
            ),
        }
    }
}
