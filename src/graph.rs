use anyhow::{bail, Context, Result};
use image::ImageEncoder;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::ops::Range;

use crate::axes::{
    stacked_bounds, DrawCommand, Figure, HAlign, HandleKind, Legend, ScatterSeries, SeriesGroup,
    XTicks,
};
use crate::render::ChartKind;
use crate::style::{self, LineDash, Marker};
use crate::{OutputFormat, RenderOptions};

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Total width of one category's bars in grouped bar charts.
const GROUP_WIDTH: f64 = 0.5;

const LEGEND_PAD: i32 = 6;
const LEGEND_ROW: i32 = 18;
const LEGEND_HANDLE: i32 = 20;
const LEGEND_CHAR: i32 = 7;

fn rgb(c: style::Color) -> RGBColor {
    RGBColor(c.r, c.g, c.b)
}

fn line_style(color: RGBColor, width: Option<f64>) -> ShapeStyle {
    color.stroke_width(width.unwrap_or(1.5).round().max(1.0) as u32)
}

/// Rasterize a recorded figure to PNG or SVG bytes.
pub fn render_figure(fig: &Figure, options: &RenderOptions) -> Result<Vec<u8>> {
    if options.width == 0 || options.height == 0 {
        bail!("Image size must be positive (got {}x{})", options.width, options.height);
    }
    match options.format {
        OutputFormat::Png => render_png(fig, options),
        OutputFormat::Svg => render_svg(fig, options).map(String::into_bytes),
    }
}

/// Bytes of an RGB8 bitmap, sized in `usize` so large images do not wrap.
fn rgb_buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

fn render_png(fig: &Figure, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    let mut buffer = vec![0u8; rgb_buffer_len(width, height)];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_figure(&root, fig, options.title.as_deref())?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }
    Ok(png_bytes)
}

fn render_svg(fig: &Figure, options: &RenderOptions) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        draw_figure(&root, fig, options.title.as_deref())?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg)
}

fn draw_figure<DB>(root: &DrawingArea<DB, Shift>, fig: &Figure, title: Option<&str>) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    let horizontal = fig.is_horizontal();
    let ((x_lo, x_hi), (y_lo, y_hi)) = fig.plot_limits();
    let ticks = fig.xticks();
    let rotated = ticks.map_or(false, |t| t.rotation != 0.0);

    // Room on the right for a legend anchored past the plot area
    let right_margin = match fig.current_legend() {
        Some(legend) if legend.anchor.map_or(false, |(x, _)| x >= 1.0) => {
            legend_box(legend).0 + 20
        }
        _ => 10,
    };

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .margin_right(right_margin)
        .caption(title.unwrap_or(""), ("sans-serif", 20))
        .x_label_area_size(if rotated && !horizontal { 90 } else { 40 })
        .y_label_area_size(if ticks.is_some() && horizontal { 90 } else { 50 })
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .context("Failed to build chart")?;

    // Explicit ticks replace the mesh labels of the category axis
    let blank = |_: &f64| String::new();
    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh();
    if ticks.is_some() {
        if horizontal {
            mesh.y_label_formatter(&blank);
        } else {
            mesh.x_label_formatter(&blank);
        }
    }
    mesh.draw().context("Failed to draw mesh")?;

    for cmd in fig.commands() {
        match cmd {
            DrawCommand::Bar(bar) => {
                let x0 = bar.x - bar.width / 2.0;
                let x1 = bar.x + bar.width / 2.0;
                chart
                    .draw_series(std::iter::once(Rectangle::new(
                        [(x0, bar.bottom), (x1, bar.bottom + bar.height)],
                        rgb(bar.color).filled(),
                    )))
                    .context("Failed to draw bar")?;
            }
            DrawCommand::Plot(group) => draw_group(&mut chart, group)?,
            DrawCommand::Scatter(points) => draw_scatter(&mut chart, points)?,
            DrawCommand::Text { x, y, text, align } => {
                let hpos = match align {
                    HAlign::Left => HPos::Left,
                    HAlign::Center => HPos::Center,
                    HAlign::Right => HPos::Right,
                };
                let style = TextStyle::from(("sans-serif", 14).into_font())
                    .pos(Pos::new(hpos, VPos::Top));
                chart
                    .draw_series(std::iter::once(Text::new(text.clone(), (*x, *y), style)))
                    .context("Failed to draw text")?;
            }
            DrawCommand::Connector { from, to, color } => {
                chart
                    .draw_series(LineSeries::new(vec![*from, *to], rgb(*color).stroke_width(1)))
                    .context("Failed to draw connector")?;
            }
        }
    }

    if let Some(ticks) = ticks {
        draw_ticks(root, &chart, ticks, horizontal)?;
    }
    if let Some(legend) = fig.current_legend() {
        draw_legend(root, &mut chart, legend)?;
    }
    Ok(())
}

fn draw_group<DB>(chart: &mut Chart<'_, DB>, group: &SeriesGroup) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    match group.kind {
        ChartKind::Line => {
            for s in &group.series {
                let points: Vec<(f64, f64)> =
                    group.x.iter().copied().zip(s.values.iter().copied()).collect();
                let style = line_style(rgb(s.color), s.width);
                let (size, spacing) = match s.dash {
                    None | Some(LineDash::Solid) => {
                        chart
                            .draw_series(LineSeries::new(points, style))
                            .context("Failed to draw line series")?;
                        continue;
                    }
                    Some(LineDash::Dashed) => (10, 6),
                    Some(LineDash::DashDot) => (8, 4),
                    Some(LineDash::Dotted) => (2, 3),
                };
                chart
                    .draw_series(DashedLineSeries::new(points, size, spacing, style))
                    .context("Failed to draw dashed line series")?;
            }
        }
        ChartKind::Area => {
            for (s, (lower, upper)) in group.series.iter().zip(stacked_bounds(group)) {
                let outline: Vec<(f64, f64)> = group
                    .x
                    .iter()
                    .copied()
                    .zip(upper)
                    .chain(group.x.iter().copied().zip(lower).rev())
                    .collect();
                chart
                    .draw_series(std::iter::once(Polygon::new(outline, rgb(s.color).filled())))
                    .context("Failed to draw area")?;
            }
        }
        ChartKind::Bar | ChartKind::Barh => {
            let n = group.series.len().max(1) as f64;
            let bar_width = GROUP_WIDTH / n;
            for (i, s) in group.series.iter().enumerate() {
                let offset = (i as f64 - (n - 1.0) / 2.0) * bar_width;
                let style = rgb(s.color).filled();
                let bars = group.x.iter().zip(&s.values).map(|(&x, &v)| {
                    let c0 = x + offset - bar_width / 2.0;
                    let c1 = x + offset + bar_width / 2.0;
                    if group.kind == ChartKind::Barh {
                        Rectangle::new([(0.0, c0), (v, c1)], style)
                    } else {
                        Rectangle::new([(c0, 0.0), (c1, v)], style)
                    }
                });
                chart.draw_series(bars).context("Failed to draw bars")?;
            }
        }
    }
    Ok(())
}

fn draw_scatter<DB>(chart: &mut Chart<'_, DB>, points: &ScatterSeries) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    // Marker size is an area, as in matplotlib's `s`
    let r = (points.size.sqrt() * 0.75).round().max(2.0) as i32;
    let color = rgb(points.color);
    let style = color.filled();
    let stroke = color.stroke_width(1);
    let coords = points.x.iter().copied().zip(points.y.iter().copied());

    let drawn = match points.marker {
        Marker::Point => chart.draw_series(coords.map(|c| Circle::new(c, (r / 2).max(1), style))),
        Marker::Circle => chart.draw_series(coords.map(|c| Circle::new(c, r, style))),
        Marker::Square => chart.draw_series(
            coords.map(|c| EmptyElement::at(c) + Rectangle::new([(-r, -r), (r, r)], style)),
        ),
        Marker::TriangleUp => chart.draw_series(coords.map(|c| TriangleMarker::new(c, r, style))),
        Marker::TriangleDown => chart.draw_series(coords.map(|c| {
            EmptyElement::at(c) + Polygon::new(vec![(-r, -r), (r, -r), (0, r)], style)
        })),
        Marker::Diamond => chart.draw_series(coords.map(|c| {
            EmptyElement::at(c) + Polygon::new(vec![(0, -r), (r, 0), (0, r), (-r, 0)], style)
        })),
        Marker::Cross => chart.draw_series(coords.map(|c| Cross::new(c, r, stroke))),
        Marker::Plus => chart.draw_series(coords.map(|c| {
            EmptyElement::at(c)
                + PathElement::new(vec![(-r, 0), (r, 0)], stroke)
                + PathElement::new(vec![(0, -r), (0, r)], stroke)
        })),
        Marker::Star => chart.draw_series(coords.map(|c| {
            EmptyElement::at(c)
                + Cross::new((0, 0), r, stroke)
                + PathElement::new(vec![(-r, 0), (r, 0)], stroke)
        })),
    };
    drawn.context("Failed to draw markers")?;
    Ok(())
}

/// Tick labels at arbitrary positions, drawn next to the category axis.
fn draw_ticks<DB>(
    root: &DrawingArea<DB, Shift>,
    chart: &Chart<'_, DB>,
    ticks: &XTicks,
    horizontal: bool,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_range, y_range) = (chart.x_range(), chart.y_range());
    for (&position, label) in ticks.positions.iter().zip(&ticks.labels) {
        let (coord, style) = if horizontal {
            let (px, py) = chart.backend_coord(&(x_range.start, position));
            let style = TextStyle::from(("sans-serif", 12).into_font())
                .pos(Pos::new(HPos::Right, VPos::Center));
            ((px - 5, py), style)
        } else if ticks.rotation != 0.0 {
            let (px, py) = chart.backend_coord(&(position, y_range.start));
            let style = TextStyle::from(
                ("sans-serif", 12).into_font().transform(FontTransform::Rotate270),
            )
            .pos(Pos::new(HPos::Right, VPos::Center));
            ((px, py + 5), style)
        } else {
            let (px, py) = chart.backend_coord(&(position, y_range.start));
            let style = TextStyle::from(("sans-serif", 12).into_font())
                .pos(Pos::new(HPos::Center, VPos::Top));
            ((px, py + 5), style)
        };
        root.draw(&Text::new(label.clone(), coord, style))
            .context("Failed to draw tick label")?;
    }
    Ok(())
}

fn draw_legend<'a, DB>(
    root: &DrawingArea<DB, Shift>,
    chart: &mut Chart<'a, DB>,
    legend: &Legend,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
{
    if legend.entries.is_empty() {
        return Ok(());
    }
    match legend.anchor {
        Some(anchor) => draw_anchored_legend(root, chart, legend, anchor),
        None => draw_series_labels(chart, legend),
    }
}

fn draw_series_labels<'a, DB>(chart: &mut Chart<'a, DB>, legend: &Legend) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
{
    for entry in &legend.entries {
        let color = rgb(entry.handle.color);
        let anno = chart
            .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())
            .context("Failed to add legend entry")?
            .label(entry.label.clone());
        match entry.handle.kind {
            HandleKind::Patch => {
                anno.legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled())
                });
            }
            HandleKind::Line(_) => {
                anno.legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            }
        }
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .context("Failed to draw legend")?;
    Ok(())
}

/// Pixel size of an anchored legend box.
fn legend_box(legend: &Legend) -> (i32, i32) {
    let chars = legend.entries.iter().map(|e| e.label.chars().count()).max().unwrap_or(0) as i32;
    (
        2 * LEGEND_PAD + LEGEND_HANDLE + 5 + chars * LEGEND_CHAR,
        2 * LEGEND_PAD + LEGEND_ROW * legend.entries.len() as i32,
    )
}

/// Upper-left corner of an anchored legend, the anchor given in plot-area
/// fractions (0..1 inside, beyond 1 past the right or top edge).
fn anchored_origin(anchor: (f64, f64), x: Range<i32>, y: Range<i32>) -> (i32, i32) {
    let (w, h) = ((x.end - x.start) as f64, (y.end - y.start) as f64);
    (
        x.start + (anchor.0 * w).round() as i32,
        y.start + ((1.0 - anchor.1) * h).round() as i32,
    )
}

/// Drawn on the whole image so anchors outside the plot area stay visible.
fn draw_anchored_legend<'a, DB>(
    root: &DrawingArea<DB, Shift>,
    chart: &Chart<'a, DB>,
    legend: &Legend,
    anchor: (f64, f64),
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
{
    let (x_px, y_px) = chart.plotting_area().get_pixel_range();
    let (x0, y0) = anchored_origin(anchor, x_px, y_px);
    let (w, h) = legend_box(legend);

    root.draw(&Rectangle::new([(x0, y0), (x0 + w, y0 + h)], WHITE.mix(0.8).filled()))
        .context("Failed to draw legend background")?;
    root.draw(&Rectangle::new([(x0, y0), (x0 + w, y0 + h)], BLACK.stroke_width(1)))
        .context("Failed to draw legend border")?;

    let text_style =
        TextStyle::from(("sans-serif", 12).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    for (i, entry) in legend.entries.iter().enumerate() {
        let color = rgb(entry.handle.color);
        let hx = x0 + LEGEND_PAD;
        let cy = y0 + LEGEND_PAD + LEGEND_ROW * i as i32 + LEGEND_ROW / 2;
        let handle = match entry.handle.kind {
            HandleKind::Patch => root.draw(&Rectangle::new(
                [(hx, cy - 5), (hx + LEGEND_HANDLE, cy + 5)],
                color.filled(),
            )),
            HandleKind::Line(_) => root.draw(&PathElement::new(
                vec![(hx, cy), (hx + LEGEND_HANDLE, cy)],
                color.stroke_width(2),
            )),
        };
        handle.context("Failed to draw legend handle")?;
        root.draw(&Text::new(
            entry.label.clone(),
            (hx + LEGEND_HANDLE + 5, cy),
            text_style.clone(),
        ))
        .context("Failed to draw legend label")?;
    }
    Ok(())
}
