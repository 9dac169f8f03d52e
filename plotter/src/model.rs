use cache_bench_telemetry_model::LifecycleEvent;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a chart needs, derived from one telemetry table.
///
/// All vectors are index-aligned with the source table except [`PlotSeries::moving_average`],
/// which starts at row `window - 1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotSeries {
    /// The moving average window the series was derived with
    pub window: usize,
    /// The `timeStep` column, in seconds since the start of the run
    pub time_steps: Vec<f64>,
    /// Successful operations, smoothed
    pub moving_average: SmoothedSeries,
    /// Failed get, put and delete operations per row
    pub failure_total: Vec<u64>,
    /// Lifecycle events found in the `event` column
    pub event_markers: EventMarkers,
}

impl PlotSeries {
    pub fn len(&self) -> usize {
        self.time_steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_steps.is_empty()
    }

    /// Failure totals paired with their time step.
    pub fn failure_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time_steps
            .iter()
            .copied()
            .zip(self.failure_total.iter().map(|&v| v as f64))
    }
}

/// A moving average, each value placed at the time step that closes its window.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SmoothedSeries {
    pub time_steps: Vec<f64>,
    pub values: Vec<f64>,
}

impl SmoothedSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time_steps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}

/// A lifecycle event located on the time axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Marker {
    /// Index of the source row
    pub row: usize,
    pub time_step: f64,
}

/// Markers for each tracked [`LifecycleEvent`], in row order.
///
/// Every tracked event has an entry, possibly empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EventMarkers(BTreeMap<LifecycleEvent, Vec<Marker>>);

impl Default for EventMarkers {
    fn default() -> Self {
        Self(
            LifecycleEvent::TRACKED
                .iter()
                .map(|&kind| (kind, Vec::new()))
                .collect(),
        )
    }
}

impl EventMarkers {
    pub fn insert(&mut self, kind: LifecycleEvent, markers: Vec<Marker>) {
        self.0.insert(kind, markers);
    }

    pub fn get(&self, kind: LifecycleEvent) -> &[Marker] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// The time steps at which `kind` occurred.
    pub fn time_steps(&self, kind: LifecycleEvent) -> Vec<f64> {
        self.get(kind).iter().map(|m| m.time_step).collect()
    }

    /// Source rows of every marker, across all kinds, in table order.
    pub fn rows(&self) -> Vec<usize> {
        self.0
            .values()
            .map(|markers| markers.iter().map(|m| m.row))
            .kmerge()
            .collect()
    }

    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}
