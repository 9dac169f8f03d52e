use crate::config::{ChartConfig, ChartStyle};
use crate::model::PlotSeries;
use cache_bench_telemetry_model::LifecycleEvent;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FONT: &str = "sans-serif";
const FONT_SIZE: u32 = 22;
const TITLE_FONT_SIZE: u32 = 30;

const SUCCESS_COLOR: RGBColor = RGBColor(31, 119, 180);
const FAILURE_COLOR: RGBColor = RGBColor(255, 127, 14);

/// Fraction of the data span left empty on each side of the plot.
const MARGIN: f64 = 0.03;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RenderError {
    #[error("Unsupported chart format {extension:?} for {path:?}, expected svg or png")]
    UnsupportedFormat {
        path: PathBuf,
        extension: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    /// Pick the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, RenderError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some("svg") => Ok(OutputFormat::Svg),
            Some("png") => Ok(OutputFormat::Png),
            _ => Err(RenderError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Draw the series to `path`.
///
/// If drawing fails the partially written file is removed.
pub fn render_chart(series: &PlotSeries, config: &ChartConfig, path: &Path) -> anyhow::Result<()> {
    let format = OutputFormat::from_path(path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    log::debug!("Rendering {:?} chart to {}", format, path.display());

    let size = (config.width, config.height);
    let result = match format {
        OutputFormat::Svg => draw_chart(
            SVGBackend::new(path, size).into_drawing_area(),
            series,
            config,
        ),
        OutputFormat::Png => draw_chart(
            BitMapBackend::new(path, size).into_drawing_area(),
            series,
            config,
        ),
    };

    if let Err(e) = result {
        if path.exists() {
            if let Err(remove_err) = std::fs::remove_file(path) {
                log::warn!(
                    "Failed to remove partial chart {}: {remove_err}",
                    path.display()
                );
            }
        }
        return Err(e);
    }

    Ok(())
}

/// The ranges the chart axes cover.
///
/// Both axes are padded by [`MARGIN`] of their span. The y axis always starts at zero.
pub fn axis_ranges(series: &PlotSeries) -> (Range<f64>, Range<f64>) {
    let x_range = match series.time_steps.iter().copied().reduce(f64::min) {
        None => 0.0..1.0,
        Some(min) => {
            let max = series
                .time_steps
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            if max > min {
                let pad = (max - min) * MARGIN;
                (min - pad)..(max + pad)
            } else {
                (min - 0.5)..(max + 0.5)
            }
        }
    };

    let y_max = series
        .moving_average
        .values
        .iter()
        .copied()
        .chain(series.failure_total.iter().map(|&v| v as f64))
        .fold(0.0, f64::max);
    let y_range = if y_max > 0.0 {
        0.0..y_max * (1.0 + MARGIN)
    } else {
        0.0..1.0
    };

    (x_range, y_range)
}

fn marker_color(kind: LifecycleEvent) -> RGBColor {
    match kind {
        LifecycleEvent::StartServer => GREEN,
        LifecycleEvent::StopServer => RED,
        LifecycleEvent::StartClient | LifecycleEvent::StopProgram => BLACK,
    }
}

fn draw_error(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("Failed to draw chart: {e}")
}

fn draw_chart<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    series: &PlotSeries,
    config: &ChartConfig,
) -> anyhow::Result<()> {
    let labels = &config.labels;
    let (x_range, y_range) = axis_ranges(series);

    root.fill(&WHITE).map_err(draw_error)?;

    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80);
    if let Some(title) = &labels.title {
        builder.caption(title, (FONT, TITLE_FONT_SIZE));
    }
    let mut chart = builder
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(draw_error)?;

    let y_label_formatter = |y: &f64| format!("{:.0}", y);
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(labels.x_axis.as_str())
        .y_desc(labels.y_axis.as_str())
        .axis_desc_style((FONT, FONT_SIZE))
        .label_style((FONT, FONT_SIZE - 4))
        .y_label_formatter(&y_label_formatter);
    if config.style == ChartStyle::Axes {
        mesh.light_line_style(WHITE)
            .bold_line_style(BLACK.mix(0.1));
    }
    mesh.draw().map_err(draw_error)?;

    if config.style == ChartStyle::Boxed {
        chart
            .plotting_area()
            .draw(&Rectangle::new(
                [(x_range.start, y_range.start), (x_range.end, y_range.end)],
                BLACK.stroke_width(1),
            ))
            .map_err(draw_error)?;
    }

    chart
        .draw_series(LineSeries::new(
            series.moving_average.points(),
            SUCCESS_COLOR.stroke_width(3),
        ))
        .map_err(draw_error)?
        .label(labels.successful.as_str())
        .legend(|(x, y)| {
            PathElement::new(vec![(x, y), (x + 20, y)], SUCCESS_COLOR.stroke_width(3))
        });

    chart
        .draw_series(LineSeries::new(
            series.failure_points(),
            FAILURE_COLOR.stroke_width(3),
        ))
        .map_err(draw_error)?
        .label(labels.unsuccessful.as_str())
        .legend(|(x, y)| {
            PathElement::new(vec![(x, y), (x + 20, y)], FAILURE_COLOR.stroke_width(3))
        });

    for kind in LifecycleEvent::TRACKED {
        let color = marker_color(kind);
        let time_steps = series.event_markers.time_steps(kind);
        for (i, time_step) in time_steps.into_iter().enumerate() {
            let anno = chart
                .draw_series(DashedLineSeries::new(
                    vec![(time_step, y_range.start), (time_step, y_range.end)],
                    10,
                    6,
                    color.mix(0.5).stroke_width(2),
                ))
                .map_err(draw_error)?;

            // One legend entry per kind, however many times it occurred
            if let Some(label) = labels.marker(kind).filter(|_| i == 0) {
                anno.label(label).legend(move |(x, y)| {
                    PathElement::new(
                        vec![(x, y), (x + 20, y)],
                        color.mix(0.5).stroke_width(2),
                    )
                });
            }
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .label_font((FONT, FONT_SIZE - 4))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(draw_error)?;

    root.present().map_err(draw_error)?;

    Ok(())
}
