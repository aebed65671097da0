use std::panic;
use std::path::Path;

use anyhow::Result;
use pg_curve::{chart_segments, ChartSegment, CumulativePoint};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};

const CHART_SIZE: (u32, u32) = (1200, 800);
const REAL_COLOR: RGBColor = RGBColor(0, 102, 204);
const EXTRAPOLATED_COLOR: RGBColor = RGBColor(230, 126, 34);

#[derive(Clone, Copy, Debug)]
pub enum ChartKind {
    Png,
    Svg,
}

/// Render the all-time curve, turning a backend panic (missing fonts and the
/// like) into an error the caller can log and skip.
pub fn render_chart_guard(
    points: &[CumulativePoint],
    path: &Path,
    kind: ChartKind,
) -> Result<(), String> {
    let render = || render_chart(points, path, kind).map_err(|e| format!("plotting error: {}", e));
    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_chart(points: &[CumulativePoint], path: &Path, kind: ChartKind) -> Result<()> {
    if points.is_empty() {
        return Ok(());
    }
    let segments = chart_segments(points);
    let (x_range, y_range) = chart_ranges(points);

    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
            draw_chart(root, &segments, x_range, y_range)?;
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
            draw_chart(root, &segments, x_range, y_range)?;
        }
    }
    Ok(())
}

/// Axis ranges with a little headroom; the y range always includes zero.
fn chart_ranges(points: &[CumulativePoint]) -> ((f64, f64), (f64, f64)) {
    let x_max = points
        .iter()
        .map(|p| p.cum_game)
        .fold(f64::MIN, f64::max)
        .max(1.0);
    let (y_min, y_max) = points
        .iter()
        .fold((0.0f64, 0.0f64), |(lo, hi), p| (lo.min(p.cum_diff), hi.max(p.cum_diff)));
    let pad = ((y_max - y_min) * 0.05).max(100.0);
    ((0.0, x_max), (y_min - pad, y_max + pad))
}

pub fn format_thousands(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let k = value / 1000.0;
    if (k - k.round()).abs() < 1e-9 {
        format!("{:.0}K", k)
    } else {
        format!("{:.1}K", k)
    }
}

fn draw_chart<DB>(
    area: DrawingArea<DB, plotters::coord::Shift>,
    segments: &[ChartSegment],
    x_range: (f64, f64),
    y_range: (f64, f64),
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    area.fill(&WHITE)?;
    let title_font = FontDesc::new(FontFamily::SansSerif, 24.0, FontStyle::Normal);
    let mut chart = ChartBuilder::on(&area)
        .margin(25)
        .caption("All-time balance", title_font)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)?;

    let axis_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal);
    chart
        .configure_mesh()
        .light_line_style(&BLACK.mix(0.05))
        .bold_line_style(&BLACK.mix(0.15))
        .x_desc("Cumulative games")
        .y_desc("Cumulative balance")
        .x_label_formatter(&|v| format_thousands(*v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font.color(&BLACK.mix(0.85)))
        .draw()?;

    chart.draw_series(LineSeries::new(
        vec![(x_range.0, 0.0), (x_range.1, 0.0)],
        &BLACK.mix(0.3),
    ))?;

    let mut real_labelled = false;
    let mut extrapolated_labelled = false;
    for segment in segments {
        let color = if segment.extrapolated {
            EXTRAPOLATED_COLOR
        } else {
            REAL_COLOR
        };
        let style = ShapeStyle {
            color: color.to_rgba(),
            filled: false,
            stroke_width: 2,
        };
        let anno = chart.draw_series(LineSeries::new(segment.points.iter().copied(), style))?;

        let label = if segment.extrapolated && !extrapolated_labelled {
            extrapolated_labelled = true;
            Some("Extrapolated")
        } else if !segment.extrapolated && !real_labelled {
            real_labelled = true;
            Some("Recorded")
        } else {
            None
        };
        if let Some(label) = label {
            anno.label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));
        }
    }

    let legend_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal);
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(legend_font.color(&BLACK))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    area.present()?;
    Ok(())
}
