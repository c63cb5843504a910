use anyhow::{bail, Result};

use crate::render::ChartKind;
use crate::style::{Color, LineDash, Marker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// One stacked-bar segment.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSegment {
    pub x: f64,
    pub height: f64,
    pub width: f64,
    pub bottom: f64,
    pub color: Color,
    /// Only labelled segments show up in the legend.
    pub label: Option<String>,
}

/// One plotted column of a wide table.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
    pub color: Color,
    pub dash: Option<LineDash>,
    pub width: Option<f64>,
}

/// Series drawn together, sharing one x axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesGroup {
    pub kind: ChartKind,
    pub x: Vec<f64>,
    pub x_labels: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub color: Color,
    pub marker: Marker,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XTicks {
    pub positions: Vec<f64>,
    pub labels: Vec<String>,
    /// Degrees, counter-clockwise.
    pub rotation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandleKind {
    Patch,
    Line(Option<LineDash>),
}

/// A drawn artist that can appear in a legend.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendHandle {
    pub label: String,
    pub color: Color,
    pub kind: HandleKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub handle: LegendHandle,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
    /// Upper-left corner in axes fractions, values past 1 land outside the
    /// plot area; `None` lets the surface choose.
    pub anchor: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Bar(BarSegment),
    Plot(SeriesGroup),
    Scatter(ScatterSeries),
    Text {
        x: f64,
        y: f64,
        text: String,
        align: HAlign,
    },
    Connector {
        from: (f64, f64),
        to: (f64, f64),
        color: Color,
    },
}

/// The drawing surface chart builders write onto.
pub trait Axes {
    fn bar(&mut self, bar: BarSegment) -> Result<()>;

    fn plot(&mut self, group: SeriesGroup) -> Result<()>;

    fn scatter(&mut self, points: ScatterSeries) -> Result<()>;

    fn text(&mut self, x: f64, y: f64, text: &str, align: HAlign) -> Result<()>;

    /// Unadorned line annotation between two data points.
    fn connector(&mut self, from: (f64, f64), to: (f64, f64), color: Color) -> Result<()>;

    fn set_xticks(&mut self, ticks: XTicks) -> Result<()>;

    /// Current (bottom, top) of the value axis.
    fn ylim(&self) -> (f64, f64);

    /// Labelled artists in draw order.
    fn legend_handles(&self) -> Vec<LegendHandle>;

    fn legend(&mut self, legend: Legend) -> Result<()>;
}

/// An `Axes` that records every call. Rasterize it with `graph::render_figure`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Figure {
    commands: Vec<DrawCommand>,
    xticks: Option<XTicks>,
    legend: Option<Legend>,
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    min: f64,
    max: f64,
    sticky_zero: bool,
}

impl Extent {
    fn empty() -> Self {
        Self { min: f64::INFINITY, max: f64::NEG_INFINITY, sticky_zero: false }
    }

    fn add(&mut self, v: f64) {
        if v.is_finite() {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
    }

    fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Pad by 5% per side; a zero baseline of bars or areas is not padded.
    fn padded(&self) -> (f64, f64) {
        if self.is_empty() {
            return (0.0, 1.0);
        }
        if self.min == self.max {
            return (self.min - 1.0, self.max + 1.0);
        }
        let pad = (self.max - self.min) * 0.05;
        let lo = if self.sticky_zero && self.min == 0.0 { 0.0 } else { self.min - pad };
        let hi = if self.sticky_zero && self.max == 0.0 { 0.0 } else { self.max + pad };
        (lo, hi)
    }
}

impl Figure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn xticks(&self) -> Option<&XTicks> {
        self.xticks.as_ref()
    }

    pub fn current_legend(&self) -> Option<&Legend> {
        self.legend.as_ref()
    }

    pub fn bars(&self) -> impl Iterator<Item = &BarSegment> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Bar(b) => Some(b),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &SeriesGroup> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Plot(g) => Some(g),
            _ => None,
        })
    }

    pub fn scatters(&self) -> impl Iterator<Item = &ScatterSeries> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Scatter(s) => Some(s),
            _ => None,
        })
    }

    /// Whether any horizontal bar group was drawn; it swaps the axes.
    pub fn is_horizontal(&self) -> bool {
        self.groups().any(|g| g.kind == ChartKind::Barh)
    }

    /// Extent along the category axis (x, or y for horizontal bars), annotations included.
    pub fn category_limits(&self) -> (f64, f64) {
        let mut extent = Extent::empty();
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Bar(b) => {
                    extent.add(b.x - b.width / 2.0);
                    extent.add(b.x + b.width / 2.0);
                }
                DrawCommand::Plot(g) => {
                    let half = match g.kind {
                        ChartKind::Bar | ChartKind::Barh => 0.5,
                        _ => 0.0,
                    };
                    for &x in &g.x {
                        extent.add(x - half);
                        extent.add(x + half);
                    }
                }
                DrawCommand::Scatter(s) => s.x.iter().for_each(|&x| extent.add(x)),
                DrawCommand::Text { x, .. } => extent.add(*x),
                DrawCommand::Connector { from, to, .. } => {
                    extent.add(from.0);
                    extent.add(to.0);
                }
            }
        }
        if let Some(ticks) = &self.xticks {
            ticks.positions.iter().for_each(|&x| extent.add(x));
        }
        if extent.is_empty() {
            return (0.0, 1.0);
        }
        if extent.min == extent.max {
            return (extent.min - 1.0, extent.max + 1.0);
        }
        let pad = (extent.max - extent.min) * 0.05;
        (extent.min - pad, extent.max + pad)
    }

    /// Value-axis extent of the plotted data only.
    fn value_extent(&self) -> Extent {
        let mut extent = Extent::empty();
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Bar(b) => {
                    extent.sticky_zero = true;
                    extent.add(b.bottom);
                    extent.add(b.bottom + b.height);
                }
                DrawCommand::Plot(g) => match g.kind {
                    ChartKind::Line => {
                        g.series.iter().flat_map(|s| s.values.iter()).for_each(|&v| extent.add(v));
                    }
                    ChartKind::Area => {
                        extent.sticky_zero = true;
                        extent.add(0.0);
                        for (lower, upper) in stacked_bounds(g) {
                            lower.iter().chain(upper.iter()).for_each(|&v| extent.add(v));
                        }
                    }
                    ChartKind::Bar | ChartKind::Barh => {
                        extent.sticky_zero = true;
                        extent.add(0.0);
                        g.series.iter().flat_map(|s| s.values.iter()).for_each(|&v| extent.add(v));
                    }
                },
                DrawCommand::Scatter(s) => s.y.iter().for_each(|&v| extent.add(v)),
                DrawCommand::Text { .. } | DrawCommand::Connector { .. } => {}
            }
        }
        extent
    }

    /// Plot-space (x, y) limits with annotations included, for rasterizing.
    ///
    /// Horizontal bars put the category axis on y.
    pub fn plot_limits(&self) -> ((f64, f64), (f64, f64)) {
        if self.is_horizontal() {
            return (self.value_extent().padded(), self.category_limits());
        }
        (self.category_limits(), self.value_limits())
    }

    fn value_limits(&self) -> (f64, f64) {
        let (mut lo, mut hi) = self.ylim();
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Text { y, .. } => {
                    lo = lo.min(*y);
                    hi = hi.max(*y);
                }
                DrawCommand::Connector { from, to, .. } => {
                    lo = lo.min(from.1).min(to.1);
                    hi = hi.max(from.1).max(to.1);
                }
                _ => {}
            }
        }
        (lo, hi)
    }
}

/// Lower and upper edge of each series of a stacked area group.
pub fn stacked_bounds(group: &SeriesGroup) -> Vec<(Vec<f64>, Vec<f64>)> {
    let mut running = vec![0.0; group.x.len()];
    group
        .series
        .iter()
        .map(|s| {
            let lower = running.clone();
            for (acc, v) in running.iter_mut().zip(s.values.iter()) {
                *acc += v;
            }
            (lower, running.clone())
        })
        .collect()
}

impl Axes for Figure {
    fn bar(&mut self, bar: BarSegment) -> Result<()> {
        self.commands.push(DrawCommand::Bar(bar));
        Ok(())
    }

    fn plot(&mut self, group: SeriesGroup) -> Result<()> {
        if let Some(s) = group.series.iter().find(|s| s.values.len() != group.x.len()) {
            bail!(
                "Series '{}' has {} values for {} x positions",
                s.name,
                s.values.len(),
                group.x.len()
            );
        }
        self.commands.push(DrawCommand::Plot(group));
        Ok(())
    }

    fn scatter(&mut self, points: ScatterSeries) -> Result<()> {
        if points.x.len() != points.y.len() {
            bail!(
                "X and Y data must have the same length (x: {}, y: {})",
                points.x.len(),
                points.y.len()
            );
        }
        self.commands.push(DrawCommand::Scatter(points));
        Ok(())
    }

    fn text(&mut self, x: f64, y: f64, text: &str, align: HAlign) -> Result<()> {
        self.commands.push(DrawCommand::Text { x, y, text: text.to_string(), align });
        Ok(())
    }

    fn connector(&mut self, from: (f64, f64), to: (f64, f64), color: Color) -> Result<()> {
        self.commands.push(DrawCommand::Connector { from, to, color });
        Ok(())
    }

    fn set_xticks(&mut self, ticks: XTicks) -> Result<()> {
        if ticks.positions.len() != ticks.labels.len() {
            bail!(
                "Tick positions and labels must have the same length (positions: {}, labels: {})",
                ticks.positions.len(),
                ticks.labels.len()
            );
        }
        self.xticks = Some(ticks);
        Ok(())
    }

    fn ylim(&self) -> (f64, f64) {
        if self.is_horizontal() {
            let n = self.groups().map(|g| g.x.len()).max().unwrap_or(1);
            return (-0.5, n as f64 - 0.5);
        }
        self.value_extent().padded()
    }

    fn legend_handles(&self) -> Vec<LegendHandle> {
        let mut handles = Vec::new();
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Bar(b) => {
                    if let Some(label) = &b.label {
                        handles.push(LegendHandle {
                            label: label.clone(),
                            color: b.color,
                            kind: HandleKind::Patch,
                        });
                    }
                }
                DrawCommand::Plot(g) => {
                    for s in &g.series {
                        let kind = match g.kind {
                            ChartKind::Line => HandleKind::Line(s.dash),
                            _ => HandleKind::Patch,
                        };
                        handles.push(LegendHandle { label: s.name.clone(), color: s.color, kind });
                    }
                }
                _ => {}
            }
        }
        handles
    }

    fn legend(&mut self, legend: Legend) -> Result<()> {
        self.legend = Some(legend);
        Ok(())
    }
}
