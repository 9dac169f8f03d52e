use cache_bench_plotter::config::{ChartConfig, ChartStyle, PlotterConfig};
use cache_bench_plotter::transform::DEFAULT_WINDOW;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
pub struct PlotterCli {
    /// The telemetry table to plot
    #[clap(required_unless_present = "config")]
    pub input: Option<PathBuf>,

    /// Where to write the chart. The extension selects the format, `svg` or `png`.
    ///
    /// Defaults to `plots/<input file stem>.svg`.
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// The number of rows averaged for the successful operations series
    #[clap(short, long, default_value_t = DEFAULT_WINDOW)]
    pub window: usize,

    /// Only plot the first N rows of the table
    #[clap(long)]
    pub truncate: Option<usize>,

    /// Title drawn above the chart
    #[clap(long)]
    pub title: Option<String>,

    #[clap(long, value_enum, default_value_t = ChartStyle::Axes)]
    pub style: ChartStyle,

    /// Also write the derived series as JSON to this path
    #[clap(long)]
    pub series_out: Option<PathBuf>,

    /// Render the charts listed in a TOML config file instead of a single chart from the
    /// command line.
    #[clap(short, long, conflicts_with = "input")]
    pub config: Option<PathBuf>,

    /// Exit successfully even if some of the configured charts failed.
    #[clap(long, default_value = "false")]
    pub ignore_errors: bool,
}

impl PlotterCli {
    pub fn into_plotter_config(self) -> anyhow::Result<PlotterConfig> {
        if let Some(config) = self.config {
            return PlotterConfig::load(&config);
        }

        let input = self
            .input
            .ok_or_else(|| anyhow::anyhow!("No telemetry table given"))?;

        let mut chart = ChartConfig::new(input);
        chart.output = self.output;
        chart.window = self.window;
        chart.truncate = self.truncate;
        chart.style = self.style;
        chart.labels.title = self.title;
        chart.series_out = self.series_out;

        Ok(PlotterConfig::single(chart))
    }
}
