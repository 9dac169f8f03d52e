use crate::transform::DEFAULT_WINDOW;
use anyhow::Context;
use cache_bench_telemetry_model::LifecycleEvent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory charts are written to when no output path is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "plots";

/// How the chart is decorated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    /// Left and bottom axes over a faint grid
    #[default]
    Axes,
    /// Framed plot area with a full grid
    Boxed,
}

/// Text drawn on the chart. Passed through to the renderer unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartLabels {
    pub title: Option<String>,
    pub x_axis: String,
    pub y_axis: String,
    pub successful: String,
    pub unsuccessful: String,
    pub server_start: String,
    pub server_stop: String,
    pub client_start: String,
}

impl Default for ChartLabels {
    fn default() -> Self {
        Self {
            title: None,
            x_axis: "Time (s)".to_string(),
            y_axis: "Operations".to_string(),
            successful: "Successful ops.".to_string(),
            unsuccessful: "Unsuccessful ops.".to_string(),
            server_start: "Server start".to_string(),
            server_stop: "Server stop".to_string(),
            client_start: "Client start".to_string(),
        }
    }
}

impl ChartLabels {
    /// The legend entry for a lifecycle event marker, or `None` for events that are not drawn.
    pub fn marker(&self, kind: LifecycleEvent) -> Option<&str> {
        match kind {
            LifecycleEvent::StartServer => Some(self.server_start.as_str()),
            LifecycleEvent::StopServer => Some(self.server_stop.as_str()),
            LifecycleEvent::StartClient => Some(self.client_start.as_str()),
            LifecycleEvent::StopProgram => None,
        }
    }
}

/// Everything needed to turn one telemetry table into one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    /// The telemetry table to read
    pub input: PathBuf,
    /// Where to write the chart, `.svg` or `.png`
    ///
    /// Defaults to `plots/<input stem>.svg`.
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Moving average window for the successful operations series
    #[serde(default = "default_window")]
    pub window: usize,
    /// Only plot the first `truncate` rows
    #[serde(default)]
    pub truncate: Option<usize>,
    #[serde(default)]
    pub style: ChartStyle,
    #[serde(default)]
    pub labels: ChartLabels,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Also write the derived series as JSON to this path
    #[serde(default)]
    pub series_out: Option<PathBuf>,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_width() -> u32 {
    1200
}

fn default_height() -> u32 {
    700
}

impl ChartConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            window: DEFAULT_WINDOW,
            truncate: None,
            style: ChartStyle::default(),
            labels: ChartLabels::default(),
            width: default_width(),
            height: default_height(),
            series_out: None,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(output) => output.clone(),
            None => {
                let stem = self
                    .input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "chart".to_string());
                Path::new(DEFAULT_OUTPUT_DIR).join(format!("{stem}.svg"))
            }
        }
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &Path| {
            if path.is_relative() {
                base.join(path)
            } else {
                path.to_path_buf()
            }
        };

        self.input = resolve(&self.input);
        self.output = Some(resolve(&self.output_path()));
        self.series_out = self.series_out.as_deref().map(resolve);
    }
}

/// A set of charts to render in one invocation.
///
/// In TOML each chart is a `[[chart]]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotterConfig {
    #[serde(rename = "chart", default)]
    pub charts: Vec<ChartConfig>,
}

impl PlotterConfig {
    pub fn single(chart: ChartConfig) -> Self {
        Self {
            charts: vec![chart],
        }
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse plotter config")
    }

    /// Load a config file. Relative paths in it are resolved against the file's directory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        log::debug!("Loading plotter config from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plotter config: {path:?}"))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("In plotter config: {path:?}"))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for chart in &mut config.charts {
            chart.resolve_relative_to(base);
        }

        Ok(config)
    }
}
