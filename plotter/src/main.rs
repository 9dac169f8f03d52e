use anyhow::anyhow;
use cache_bench_telemetry_model::LifecycleEvent;
use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = cli::PlotterCli::parse();
    let ignore_errors = cli.ignore_errors;
    let config = cli.into_plotter_config()?;

    if config.charts.is_empty() {
        return Err(anyhow!("No charts configured"));
    }

    let total_charts = config.charts.len();
    let mut errors = vec![];

    for chart in &config.charts {
        match cache_bench_plotter::execute_chart(chart) {
            Ok(series) => {
                log::info!(
                    "Wrote {} ({} rows, {} smoothed points, {} server starts, {} server stops, {} client starts)",
                    chart.output_path().display(),
                    series.len(),
                    series.moving_average.len(),
                    series.event_markers.get(LifecycleEvent::StartServer).len(),
                    series.event_markers.get(LifecycleEvent::StopServer).len(),
                    series.event_markers.get(LifecycleEvent::StartClient).len(),
                );
            }
            Err(e) => {
                log::error!("Failed to chart {}: {e:?}", chart.input.display());
                errors.push(e);
            }
        }
    }

    // If any of the charts failed and errors should not explicitly be ignored, return an error
    if !errors.is_empty() {
        let error_message = format!(
            "{} out of {} charts failed:\n{:#?}",
            errors.len(),
            total_charts,
            errors
        );

        if ignore_errors {
            log::warn!("{}", error_message);
        } else {
            return Err(anyhow!(error_message));
        }
    }

    Ok(())
}
