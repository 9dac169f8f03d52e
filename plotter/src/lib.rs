use crate::config::ChartConfig;
use crate::model::PlotSeries;
use anyhow::Context;
use std::path::Path;

pub mod config;
pub mod frame;
pub mod model;
pub mod render;
pub mod transform;

/// Load and transform the telemetry table for a chart without drawing it.
pub fn derive_series(config: &ChartConfig) -> anyhow::Result<PlotSeries> {
    let frame = frame::load_telemetry_frame(&config.input, config.truncate)
        .context("Load telemetry table")?;

    transform::transform(&frame, config.window).context("Transform telemetry series")
}

/// Render one chart: load the table, derive the series and draw them.
///
/// The output format is checked before anything is read so a bad output path fails without
/// touching the input.
pub fn execute_chart(config: &ChartConfig) -> anyhow::Result<PlotSeries> {
    let output = config.output_path();
    render::OutputFormat::from_path(&output)?;

    log::debug!(
        "Charting {} to {}",
        config.input.display(),
        output.display()
    );

    let series = derive_series(config)?;

    if let Some(series_out) = &config.series_out {
        write_series(&series, series_out).context("Write derived series")?;
    }

    render::render_chart(&series, config, &output)
        .with_context(|| format!("Render chart to {output:?}"))?;

    Ok(series)
}

/// Write the derived series as pretty-printed JSON.
pub fn write_series(series: &PlotSeries, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, series)?;

    log::debug!("Wrote derived series to {}", path.display());

    Ok(())
}
