use anyhow::Result;
use serde::Deserialize;

use crate::axes::{Axes, ScatterSeries, Series, SeriesGroup, XTicks};
use crate::pivot::WideTable;
use crate::style::{join_key, ChartStyles};

/// Marker area used for the scatter overlay of line charts.
pub const MARKER_SIZE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Area,
    Bar,
    Barh,
}

impl ChartKind {
    fn is_bar(self) -> bool {
        matches!(self, ChartKind::Bar | ChartKind::Barh)
    }
}

/// Numeric axis values when all of them parse, else their positions.
///
/// Bar kinds are always ordinal.
fn x_positions(wide: &WideTable, kind: ChartKind) -> (Vec<f64>, bool) {
    if !kind.is_bar() {
        let parsed: Option<Vec<f64>> = wide
            .rows
            .iter()
            .map(|r| r.axis.trim().parse::<f64>().ok())
            .collect();
        if let Some(x) = parsed {
            return (x, false);
        }
    }
    ((0..wide.row_count()).map(|i| i as f64).collect(), true)
}

/// Draw every column of `wide` onto `ax`.
///
/// Style coverage is checked before the first draw call, so a missing key
/// leaves the surface untouched.
pub(crate) fn render_series(
    ax: &mut dyn Axes,
    wide: &WideTable,
    kind: ChartKind,
    styles: &ChartStyles,
) -> Result<()> {
    styles.check_coverage(&wide.columns, kind)?;

    let (x, ordinal) = x_positions(wide, kind);
    let x_labels: Vec<String> = wide.rows.iter().map(|r| r.axis.clone()).collect();

    let mut series = Vec::with_capacity(wide.columns.len());
    for (idx, key) in wide.columns.iter().enumerate() {
        let line = kind == ChartKind::Line;
        let dash = match (&styles.line_styles, line) {
            (Some(map), true) => Some(*map.get(key)?),
            _ => None,
        };
        let width = match (&styles.line_widths, line) {
            (Some(map), true) => Some(*map.get(key)?),
            _ => None,
        };
        series.push(Series {
            name: join_key(key),
            values: wide.values.iter().map(|row| row[idx]).collect(),
            color: *styles.colors.get(key)?,
            dash,
            width,
        });
    }

    if kind == ChartKind::Line {
        if let Some(markers) = &styles.markers {
            for (key, s) in wide.columns.iter().zip(&series) {
                ax.scatter(ScatterSeries {
                    x: x.clone(),
                    y: s.values.clone(),
                    color: s.color,
                    marker: *markers.get(key)?,
                    size: MARKER_SIZE,
                })?;
            }
        }
    }

    let per_series = kind == ChartKind::Line && styles.has_line_overrides();
    log::debug!(
        "rendering {} series as {:?} ({})",
        series.len(),
        kind,
        if per_series { "one call per series" } else { "single call" }
    );

    if per_series {
        for s in series {
            ax.plot(SeriesGroup {
                kind,
                x: x.clone(),
                x_labels: x_labels.clone(),
                series: vec![s],
            })?;
        }
    } else {
        ax.plot(SeriesGroup { kind, x: x.clone(), x_labels: x_labels.clone(), series })?;
    }

    if ordinal {
        ax.set_xticks(XTicks {
            positions: x,
            labels: x_labels,
            rotation: if kind == ChartKind::Bar { 90.0 } else { 0.0 },
        })?;
    }
    Ok(())
}
