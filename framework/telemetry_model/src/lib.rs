use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

pub const TIME_STEP: &str = "timeStep";
pub const EVENT: &str = "event";
pub const TOTAL_SUCC: &str = "totalSucc";
pub const GET_FAIL_COUNT: &str = "getFailCount";
pub const PUT_FAIL_COUNT: &str = "putFailCount";
pub const DELETE_FAIL_COUNT: &str = "deleteFailCount";

/// Columns that must be present for a table to be plotted.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    TIME_STEP,
    EVENT,
    TOTAL_SUCC,
    GET_FAIL_COUNT,
    PUT_FAIL_COUNT,
    DELETE_FAIL_COUNT,
];

/// The full header written by the benchmarking harness, in column order.
pub const TELEMETRY_COLUMNS: [&str; 12] = [
    TIME_STEP,
    "getCount",
    GET_FAIL_COUNT,
    "getTime",
    "putCount",
    PUT_FAIL_COUNT,
    "putTime",
    "deleteCount",
    DELETE_FAIL_COUNT,
    "deleteTime",
    TOTAL_SUCC,
    EVENT,
];

/// Lifecycle events the harness can signal during a run.
///
/// The label written to the `event` column is the `SCREAMING_SNAKE_CASE` name of the variant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    #[display("START_SERVER")]
    StartServer,
    #[display("STOP_SERVER")]
    StopServer,
    #[display("START_CLIENT")]
    StartClient,
    /// Ends the run. Written by the harness but never drawn as a marker.
    #[display("STOP_PROGRAM")]
    StopProgram,
}

impl LifecycleEvent {
    /// The events that are drawn as markers on a chart, in legend order.
    pub const TRACKED: [LifecycleEvent; 3] = [
        LifecycleEvent::StartServer,
        LifecycleEvent::StopServer,
        LifecycleEvent::StartClient,
    ];

    /// The label used for this event in the `event` column.
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleEvent::StartServer => "START_SERVER",
            LifecycleEvent::StopServer => "STOP_SERVER",
            LifecycleEvent::StartClient => "START_CLIENT",
            LifecycleEvent::StopProgram => "STOP_PROGRAM",
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("Unknown lifecycle event label: {label:?}")]
pub struct UnknownEventLabel {
    label: String,
}

impl FromStr for LifecycleEvent {
    type Err = UnknownEventLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START_SERVER" => Ok(LifecycleEvent::StartServer),
            "STOP_SERVER" => Ok(LifecycleEvent::StopServer),
            "START_CLIENT" => Ok(LifecycleEvent::StartClient),
            "STOP_PROGRAM" => Ok(LifecycleEvent::StopProgram),
            _ => Err(UnknownEventLabel {
                label: s.to_string(),
            }),
        }
    }
}

/// Operation counts for one kind of operation over a single time step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OperationCounts {
    /// Number of operations issued
    pub count: u64,
    /// Number of those operations that failed
    pub fail_count: u64,
    /// Total time spent on the operations, in seconds
    pub time: f64,
}

impl OperationCounts {
    pub fn new(count: u64, fail_count: u64, time: f64) -> Self {
        Self {
            count,
            fail_count,
            time,
        }
    }

    /// Successful operations, saturating at zero if the counters are inconsistent.
    pub fn succeeded(&self) -> u64 {
        self.count.saturating_sub(self.fail_count)
    }
}

/// One row of a telemetry table, in the format written by the benchmarking harness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Seconds since the start of the run
    pub time_step: i64,
    pub get_count: u64,
    pub get_fail_count: u64,
    pub get_time: f64,
    pub put_count: u64,
    pub put_fail_count: u64,
    pub put_time: f64,
    pub delete_count: u64,
    pub delete_fail_count: u64,
    pub delete_time: f64,
    /// Successful operations across all operation kinds
    pub total_succ: u64,
    /// The lifecycle event signalled during this time step, or an empty string
    pub event: String,
}

impl TelemetryRecord {
    /// Build a record from per-operation counts, deriving `total_succ` the way the harness does.
    pub fn new(
        time_step: i64,
        get: OperationCounts,
        put: OperationCounts,
        delete: OperationCounts,
        event: Option<LifecycleEvent>,
    ) -> Self {
        Self {
            time_step,
            get_count: get.count,
            get_fail_count: get.fail_count,
            get_time: get.time,
            put_count: put.count,
            put_fail_count: put.fail_count,
            put_time: put.time,
            delete_count: delete.count,
            delete_fail_count: delete.fail_count,
            delete_time: delete.time,
            total_succ: get.succeeded() + put.succeeded() + delete.succeeded(),
            event: event.map(|e| e.label().to_string()).unwrap_or_default(),
        }
    }

    /// The lifecycle event for this row, if the label is one the harness knows about.
    pub fn lifecycle_event(&self) -> Option<LifecycleEvent> {
        self.event.parse().ok()
    }

    pub fn failure_total(&self) -> u64 {
        self.get_fail_count + self.put_fail_count + self.delete_fail_count
    }
}

/// Serialize a telemetry table to a writer.
///
/// The header is always written, so an empty slice produces a header-only table.
pub fn store_telemetry_table<W: Write>(
    records: &[TelemetryRecord],
    writer: W,
) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(TELEMETRY_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a telemetry table to a file, replacing any existing content.
pub fn write_telemetry_table(
    records: &[TelemetryRecord],
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    store_telemetry_table(records, file)
}
