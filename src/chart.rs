//! Comparison chart builders.
//!
//! Every builder filters and pivots its source tables, draws the result on
//! the given surface, decorates it and returns the pivoted table.

use anyhow::{bail, Result};
use std::collections::HashMap;

use crate::axes::{Axes, BarSegment, HAlign, Legend, LegendEntry, XTicks};
use crate::cluster::cluster_layout;
use crate::data::{RecordTable, Scenario};
use crate::pivot::{reshape, ScenarioPlacement, WideTable};
use crate::render::{render_series, ChartKind};
use crate::style::{lookup_label, ChartStyles, Color, StyleMap};
use crate::ChartError;

pub use crate::pivot::{Baseline, ComparisonRequest, Dimension};

/// Width of one stacked bar.
pub const BAR_WIDTH: f64 = 0.5;

/// Options of `stacked_bar_graph`.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedBarOptions {
    pub baseline: Option<Baseline>,
    pub legend_position: Option<(f64, f64)>,
    /// Axis labels sit at `(ylim.bottom - ylim.top) / year_height`.
    pub year_height: f64,
}

impl Default for StackedBarOptions {
    fn default() -> Self {
        Self { baseline: None, legend_position: None, year_height: 3.0 }
    }
}

/// Options shared by the line/area/bar builders.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesOptions {
    pub kind: ChartKind,
    pub styles: ChartStyles,
    pub legend_position: Option<(f64, f64)>,
}

impl SeriesOptions {
    pub fn new(kind: ChartKind, styles: ChartStyles) -> Self {
        Self { kind, styles, legend_position: None }
    }

    pub fn with_legend_position(mut self, x: f64, y: f64) -> Self {
        self.legend_position = Some((x, y));
        self
    }
}

/// Filter, pivot, draw, then add the reversed legend.
///
/// `draw` returns the legend labels, or `None` to keep the handle labels.
fn compare<F>(
    ax: &mut dyn Axes,
    sources: &[(&str, &RecordTable)],
    request: &ComparisonRequest,
    placement: ScenarioPlacement,
    baseline: Option<&Baseline>,
    legend_position: Option<(f64, f64)>,
    draw: F,
) -> Result<WideTable>
where
    F: FnOnce(&mut dyn Axes, &WideTable) -> Result<Option<Vec<String>>>,
{
    let wide = reshape(sources, request, placement, baseline)?;
    log::debug!(
        "pivoted {} source(s) into {} rows x {} columns",
        sources.len(),
        wide.row_count(),
        wide.columns.len()
    );

    let labels = draw(&mut *ax, &wide)?;
    decorate_legend(ax, labels, legend_position)?;
    Ok(wide)
}

fn decorate_legend(
    ax: &mut dyn Axes,
    labels: Option<Vec<String>>,
    anchor: Option<(f64, f64)>,
) -> Result<()> {
    let mut handles = ax.legend_handles();
    let labels = match labels {
        // Labels belong to the most recently drawn handles
        Some(labels) => {
            handles = handles.split_off(handles.len().saturating_sub(labels.len()));
            labels
        }
        None => handles.iter().map(|h| h.label.clone()).collect(),
    };
    let entries = handles
        .into_iter()
        .rev()
        .zip(labels.into_iter().rev())
        .map(|(handle, label)| LegendEntry { handle, label })
        .collect();
    ax.legend(Legend { entries, anchor })
}

/// Legend text of one column: category label, then dimension label, then
/// the scenario name.
fn compose_label(
    key: &[String],
    labels: &HashMap<String, String>,
    z_labels: Option<&HashMap<String, String>>,
) -> Result<String, ChartError> {
    let Some((head, rest)) = key.split_first() else {
        return Ok(String::new());
    };
    let mut parts = vec![lookup_label(labels, "label", head)?.to_string()];
    let mut rest = rest.iter();
    if let Some(z_labels) = z_labels {
        if let Some(z) = rest.next() {
            parts.push(lookup_label(z_labels, "z label", z)?.to_string());
        }
    }
    parts.extend(rest.cloned());
    Ok(parts.join(" "))
}

fn series_chart(
    ax: &mut dyn Axes,
    sources: &[(&str, &RecordTable)],
    request: &ComparisonRequest,
    placement: ScenarioPlacement,
    labels: &HashMap<String, String>,
    z_labels: Option<&HashMap<String, String>>,
    options: &SeriesOptions,
) -> Result<WideTable> {
    compare(ax, sources, request, placement, None, options.legend_position, |ax, wide| {
        let legend = wide
            .columns
            .iter()
            .map(|key| compose_label(key, labels, z_labels))
            .collect::<Result<Vec<_>, _>>()?;
        render_series(ax, wide, options.kind, &options.styles)?;
        Ok(Some(legend))
    })
}

fn without_z(request: &ComparisonRequest) -> ComparisonRequest {
    ComparisonRequest { z: None, ..request.clone() }
}

fn require_z(request: &ComparisonRequest) -> Result<()> {
    if request.z.is_none() {
        bail!("A three-variable chart needs a second dimension (ComparisonRequest::with_z)");
    }
    Ok(())
}

fn scenario_sources(scenarios: &[Scenario]) -> Vec<(&str, &RecordTable)> {
    scenarios.iter().map(|s| (s.label.as_str(), &s.table)).collect()
}

/// Stacked bars clustered by axis value, one bar per scenario.
///
/// Layers follow `request.data` from bottom to top. Colors are keyed by
/// category value. With a baseline, only the baseline scenario keeps its
/// bar for the baseline axis value.
pub fn stacked_bar_graph(
    ax: &mut dyn Axes,
    scenarios: &[Scenario],
    request: &ComparisonRequest,
    labels: &HashMap<String, String>,
    colors: &StyleMap<Color>,
    options: &StackedBarOptions,
) -> Result<WideTable> {
    if !(options.year_height.is_finite() && options.year_height != 0.0) {
        bail!("year_height must be a non-zero number, got {}", options.year_height);
    }
    let request = without_z(request);
    let sources = scenario_sources(scenarios);

    compare(
        ax,
        &sources,
        &request,
        ScenarioPlacement::Rows,
        options.baseline.as_ref(),
        options.legend_position,
        |ax, wide| {
            let mut layers = Vec::with_capacity(wide.columns.len());
            for key in &wide.columns {
                let color = *colors.get(key)?;
                let label = match key.first() {
                    Some(category) => lookup_label(labels, "label", category)?,
                    None => "",
                };
                layers.push((color, label));
            }

            let layout = cluster_layout(&wide.rows);
            let mut bottom = vec![0.0; wide.row_count()];
            for (col, (color, label)) in layers.into_iter().enumerate() {
                for (row, &slot) in layout.slots.iter().enumerate() {
                    let height = wide.values[row][col];
                    ax.bar(BarSegment {
                        x: slot,
                        height,
                        width: BAR_WIDTH,
                        bottom: bottom[row],
                        color,
                        label: (row == 0).then(|| label.to_string()),
                    })?;
                    bottom[row] += height;
                }
            }

            let (lo, hi) = ax.ylim();
            let label_y = (lo - hi) / options.year_height;
            for (axis, position) in &layout.labels {
                ax.text(*position, label_y, axis, HAlign::Center)?;
            }
            for &separator in &layout.separators {
                ax.connector((separator, 0.0), (separator, label_y), Color::LIGHT_GRAY)?;
            }
            ax.set_xticks(XTicks {
                positions: layout.slots,
                labels: wide
                    .rows
                    .iter()
                    .map(|r| r.scenario.clone().unwrap_or_default())
                    .collect(),
                rotation: 90.0,
            })?;
            Ok(None)
        },
    )
}

/// One scenario, one series per category value.
pub fn graph_two_variables(
    ax: &mut dyn Axes,
    table: &RecordTable,
    request: &ComparisonRequest,
    labels: &HashMap<String, String>,
    options: &SeriesOptions,
) -> Result<WideTable> {
    let request = without_z(request);
    series_chart(ax, &[("", table)], &request, ScenarioPlacement::Omitted, labels, None, options)
}

/// One scenario, one series per (category, dimension) pair.
pub fn graph_three_variables(
    ax: &mut dyn Axes,
    table: &RecordTable,
    request: &ComparisonRequest,
    labels: &HashMap<String, String>,
    z_labels: &HashMap<String, String>,
    options: &SeriesOptions,
) -> Result<WideTable> {
    require_z(request)?;
    series_chart(
        ax,
        &[("", table)],
        request,
        ScenarioPlacement::Omitted,
        labels,
        Some(z_labels),
        options,
    )
}

/// Several scenarios, one series per (category, scenario) pair.
pub fn graph_scenarios_two_variables(
    ax: &mut dyn Axes,
    scenarios: &[Scenario],
    request: &ComparisonRequest,
    labels: &HashMap<String, String>,
    options: &SeriesOptions,
) -> Result<WideTable> {
    let request = without_z(request);
    let sources = scenario_sources(scenarios);
    series_chart(ax, &sources, &request, ScenarioPlacement::Columns, labels, None, options)
}

/// Several scenarios, one series per (category, dimension, scenario) triple.
pub fn graph_scenarios_three_variables(
    ax: &mut dyn Axes,
    scenarios: &[Scenario],
    request: &ComparisonRequest,
    labels: &HashMap<String, String>,
    z_labels: &HashMap<String, String>,
    options: &SeriesOptions,
) -> Result<WideTable> {
    require_z(request)?;
    let sources = scenario_sources(scenarios);
    series_chart(
        ax,
        &sources,
        request,
        ScenarioPlacement::Columns,
        labels,
        Some(z_labels),
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axes::{DrawCommand, Figure};
    use crate::data::fixtures::table;

    fn generation(scale: f64) -> RecordTable {
        let mut rows = Vec::new();
        for (i, year) in ["2020", "2030", "2040", "2050"].iter().enumerate() {
            for (tech, base) in [("coal", 10.0), ("wind", 2.0)] {
                for region in ["QC", "ON"] {
                    let v = (base + i as f64) * scale;
                    rows.push(vec![
                        year.to_string(),
                        tech.to_string(),
                        region.to_string(),
                        v.to_string(),
                    ]);
                }
            }
        }
        RecordTable::new(
            vec!["year".into(), "tech".into(), "region".into(), "value".into()],
            rows,
        )
    }

    fn scenarios() -> Vec<Scenario> {
        vec![
            Scenario::new("Reference", generation(1.0)),
            Scenario::new("High", generation(2.0)),
            Scenario::new("Low", generation(0.5)),
        ]
    }

    fn labels() -> HashMap<String, String> {
        [("coal", "Coal"), ("wind", "Wind")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn legend_labels(fig: &Figure) -> Vec<String> {
        fig.current_legend()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.label.clone())
            .collect()
    }

    fn texts(fig: &Figure) -> Vec<(f64, f64, String)> {
        fig.commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { x, y, text, .. } => Some((*x, *y, text.clone())),
                _ => None,
            })
            .collect()
    }

    fn connectors(fig: &Figure) -> Vec<f64> {
        fig.commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Connector { from, .. } => Some(from.0),
                _ => None,
            })
            .collect()
    }

    fn stacked_colors() -> StyleMap<Color> {
        StyleMap::new("color")
            .with(["coal"], Color::BLACK)
            .with(["wind"], Color::rgb(0, 128, 0))
    }

    #[test]
    fn test_stacked_bar_clusters() {
        let mut fig = Figure::new();
        let request = ComparisonRequest::new(
            "year",
            "tech",
            ["2020", "2030", "2040", "2050"],
            ["coal", "wind"],
        )
        .narrowed_to("region", "QC");
        let wide = stacked_bar_graph(
            &mut fig,
            &scenarios(),
            &request,
            &labels(),
            &stacked_colors(),
            &StackedBarOptions::default(),
        )
        .unwrap();

        assert_eq!(wide.row_count(), 12);
        // Two layers over twelve bars
        assert_eq!(fig.bars().count(), 24);
        assert_eq!(connectors(&fig), vec![3.0, 7.0, 11.0]);

        let texts = texts(&fig);
        let years: Vec<&str> = texts.iter().map(|(_, _, t)| t.as_str()).collect();
        assert_eq!(years, vec!["2020", "2030", "2040", "2050"]);
        let (lo, hi) = fig.ylim();
        assert!(texts.iter().all(|(_, y, _)| *y == (lo - hi) / 3.0));

        let ticks = fig.xticks().unwrap();
        assert_eq!(ticks.rotation, 90.0);
        assert_eq!(&ticks.labels[..3], &["Reference", "High", "Low"]);

        // Only the first bar of each layer is labelled; legend is reversed
        assert_eq!(fig.legend_handles().len(), 2);
        assert_eq!(legend_labels(&fig), vec!["Wind", "Coal"]);
    }

    #[test]
    fn test_stacked_bar_segments_stack() {
        let mut fig = Figure::new();
        let request = ComparisonRequest::new("year", "tech", ["2020"], ["coal", "wind"])
            .narrowed_to("region", "ON");
        stacked_bar_graph(
            &mut fig,
            &scenarios()[..1],
            &request,
            &labels(),
            &stacked_colors(),
            &StackedBarOptions::default(),
        )
        .unwrap();

        let bars: Vec<_> = fig.bars().collect();
        assert_eq!(bars.len(), 2);
        assert_eq!((bars[0].bottom, bars[0].height), (0.0, 10.0));
        assert_eq!((bars[1].bottom, bars[1].height), (10.0, 2.0));
        assert_eq!(bars[1].width, 0.5);
    }

    #[test]
    fn test_stacked_bar_baseline() {
        let mut fig = Figure::new();
        let request = ComparisonRequest::new("year", "tech", ["2020", "2030"], ["coal"])
            .narrowed_to("region", "QC");
        let options = StackedBarOptions {
            baseline: Some(Baseline { scenario: "Reference".into(), axis_value: "2020".into() }),
            legend_position: Some((1.0, 0.5)),
            ..StackedBarOptions::default()
        };
        let colors = StyleMap::new("color").with(["coal"], Color::BLACK);
        let wide =
            stacked_bar_graph(&mut fig, &scenarios(), &request, &labels(), &colors, &options)
                .unwrap();

        assert_eq!(wide.row_count(), 4);
        assert_eq!(fig.xticks().unwrap().positions, vec![0.0, 2.0, 3.0, 4.0]);
        assert_eq!(connectors(&fig), vec![1.0]);
        let label_x: Vec<f64> = texts(&fig).iter().map(|(x, _, _)| *x).collect();
        assert_eq!(label_x, vec![0.0, 3.0]);
        assert_eq!(fig.current_legend().unwrap().anchor, Some((1.0, 0.5)));
    }

    #[test]
    fn test_stacked_bar_missing_color_draws_nothing() {
        let mut fig = Figure::new();
        let request = ComparisonRequest::new("year", "tech", ["2020"], ["coal", "wind"])
            .narrowed_to("region", "QC");
        let colors = StyleMap::new("color").with(["coal"], Color::BLACK);
        let err = stacked_bar_graph(
            &mut fig,
            &scenarios(),
            &request,
            &labels(),
            &colors,
            &StackedBarOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ChartError>(),
            Some(ChartError::StyleKeyMissing { map: "color", .. })
        ));
        assert!(fig.commands().is_empty());
        assert!(fig.current_legend().is_none());
    }

    #[test]
    fn test_stacked_bar_rejects_zero_year_height() {
        let mut fig = Figure::new();
        let request = ComparisonRequest::new("year", "tech", ["2020"], ["coal"]);
        let options = StackedBarOptions { year_height: 0.0, ..StackedBarOptions::default() };
        let result =
            stacked_bar_graph(&mut fig, &scenarios(), &request, &labels(), &stacked_colors(), &options);
        assert!(result.is_err());
    }

    #[test]
    fn test_two_variables_legend() {
        let mut fig = Figure::new();
        let t = generation(1.0);
        let request = ComparisonRequest::new("year", "tech", ["2020", "2030"], ["coal", "wind"])
            .narrowed_to("region", "QC");
        let options = SeriesOptions::new(ChartKind::Line, ChartStyles::new(stacked_colors()));
        let wide = graph_two_variables(&mut fig, &t, &request, &labels(), &options).unwrap();

        assert_eq!(wide.columns, vec![vec!["coal".to_string()], vec!["wind".to_string()]]);
        assert_eq!(legend_labels(&fig), vec!["Wind", "Coal"]);
        assert_eq!(fig.current_legend().unwrap().anchor, None);
    }

    #[test]
    fn test_second_chart_on_same_axes_labels_its_own_series() {
        let mut fig = Figure::new();
        let t = generation(1.0);
        let options = SeriesOptions::new(ChartKind::Line, ChartStyles::new(stacked_colors()));
        for tech in ["coal", "wind"] {
            let request = ComparisonRequest::new("year", "tech", ["2020", "2030"], [tech])
                .narrowed_to("region", "QC");
            graph_two_variables(&mut fig, &t, &request, &labels(), &options).unwrap();
        }

        let entries = &fig.current_legend().unwrap().entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "Wind");
        assert_eq!(entries[0].handle.label, "wind");
        assert_eq!(entries[0].handle.color, Color::rgb(0, 128, 0));
    }

    #[test]
    fn test_three_variables_legend() {
        let mut fig = Figure::new();
        let t = generation(1.0);
        let request = ComparisonRequest::new("year", "tech", ["2020", "2030"], ["coal"])
            .with_z("region", ["QC", "ON"]);
        let colors = StyleMap::new("color")
            .with(["coal", "QC"], Color::BLACK)
            .with(["coal", "ON"], Color::WHITE);
        let z_labels: HashMap<String, String> = [("QC", "Québec"), ("ON", "Ontario")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let options = SeriesOptions::new(ChartKind::Area, ChartStyles::new(colors))
            .with_legend_position(0.5, 1.1);
        graph_three_variables(&mut fig, &t, &request, &labels(), &z_labels, &options).unwrap();

        assert_eq!(legend_labels(&fig), vec!["Coal Ontario", "Coal Québec"]);
        assert_eq!(fig.current_legend().unwrap().anchor, Some((0.5, 1.1)));
    }

    #[test]
    fn test_three_variables_requires_dimension() {
        let mut fig = Figure::new();
        let t = generation(1.0);
        let request = ComparisonRequest::new("year", "tech", ["2020"], ["coal"]);
        let options = SeriesOptions::new(ChartKind::Line, ChartStyles::new(stacked_colors()));
        let result =
            graph_three_variables(&mut fig, &t, &request, &labels(), &HashMap::new(), &options);
        assert!(result.is_err());
        assert!(fig.commands().is_empty());
    }

    #[test]
    fn test_scenarios_two_variables() {
        let mut fig = Figure::new();
        let request = ComparisonRequest::new("year", "tech", ["2020", "2050"], ["wind"])
            .narrowed_to("region", "ON");
        let colors = StyleMap::new("color")
            .with(["wind", "Reference"], Color::BLACK)
            .with(["wind", "High"], Color::rgb(255, 0, 0))
            .with(["wind", "Low"], Color::rgb(0, 0, 255));
        let options = SeriesOptions::new(ChartKind::Bar, ChartStyles::new(colors));
        let wide =
            graph_scenarios_two_variables(&mut fig, &scenarios(), &request, &labels(), &options)
                .unwrap();

        assert_eq!(wide.row_count(), 2);
        assert_eq!(wide.values[1], vec![5.0, 10.0, 2.5]);
        assert_eq!(legend_labels(&fig), vec!["Wind Low", "Wind High", "Wind Reference"]);
    }

    #[test]
    fn test_scenarios_three_variables_missing_key() {
        let mut fig = Figure::new();
        let request = ComparisonRequest::new("year", "tech", ["2020"], ["coal"])
            .with_z("region", ["QC"]);
        let mut colors = StyleMap::new("color");
        for scenario in ["Reference", "High"] {
            colors.insert(["coal", "QC", scenario], Color::BLACK);
        }
        let z_labels: HashMap<String, String> =
            [("QC".to_string(), "Québec".to_string())].into_iter().collect();
        let options = SeriesOptions::new(ChartKind::Line, ChartStyles::new(colors));
        let err = graph_scenarios_three_variables(
            &mut fig,
            &scenarios(),
            &request,
            &labels(),
            &z_labels,
            &options,
        )
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<ChartError>(),
            Some(&ChartError::StyleKeyMissing { map: "color", key: "coal|QC|Low".into() })
        );
        assert!(fig.commands().is_empty());
    }

    #[test]
    fn test_missing_label_draws_nothing() {
        let mut fig = Figure::new();
        let t = table(&["year", "tech", "value"], &[&["2020", "gas", "1"]]);
        let request = ComparisonRequest::new("year", "tech", ["2020"], ["gas"]);
        let colors = StyleMap::new("color").with(["gas"], Color::BLACK);
        let options = SeriesOptions::new(ChartKind::Line, ChartStyles::new(colors));
        let err = graph_two_variables(&mut fig, &t, &request, &labels(), &options).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChartError>(),
            Some(ChartError::StyleKeyMissing { map: "label", .. })
        ));
        assert!(fig.commands().is_empty());
    }
}
