use anyhow::Context;
use cache_bench_telemetry_model::{
    DELETE_FAIL_COUNT, EVENT, GET_FAIL_COUNT, PUT_FAIL_COUNT, REQUIRED_COLUMNS, TIME_STEP,
    TOTAL_SUCC,
};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Telemetry table not found: {path:?}")]
    SourceNotFound { path: PathBuf },
    #[error("Telemetry table {path:?} is missing required columns: {missing:?}")]
    MalformedTable { path: PathBuf, missing: Vec<String> },
}

/// Load a telemetry table written by the benchmarking harness.
///
/// Columns other than the ones in [`REQUIRED_COLUMNS`] are kept but not normalised. When
/// `truncate` is set only the first `truncate` rows are returned.
pub fn load_telemetry_frame(path: &Path, truncate: Option<usize>) -> anyhow::Result<DataFrame> {
    if !path.is_file() {
        return Err(LoadError::SourceNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    log::debug!("Loading telemetry table from {}", path.display());

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Failed to read telemetry table: {path:?}"))?;

    check_required_columns(&frame, path)?;

    let mut frame = normalise_columns(frame)?;
    if let Some(truncate) = truncate {
        log::debug!(
            "Truncating telemetry table from {} to {} rows",
            frame.height(),
            truncate
        );
        frame = frame.head(Some(truncate));
    }

    log::trace!("Loaded frame: {}", frame);

    Ok(frame)
}

fn check_required_columns(frame: &DataFrame, path: &Path) -> Result<(), LoadError> {
    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|&&column| frame.get_column_index(column).is_none())
        .map(|column| column.to_string())
        .collect::<Vec<_>>();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::MalformedTable {
            path: path.to_path_buf(),
            missing,
        })
    }
}

/// Give the required columns a fixed type regardless of what the CSV reader inferred.
///
/// A header-only table is read with every column as a string, and an `event` column with no
/// labels is read as all nulls, so neither can be relied on to arrive typed.
fn normalise_columns(frame: DataFrame) -> anyhow::Result<DataFrame> {
    let frame = frame
        .lazy()
        .with_columns([
            col(TIME_STEP).cast(DataType::Float64),
            col(TOTAL_SUCC).cast(DataType::Float64),
            col(GET_FAIL_COUNT).cast(DataType::UInt64).fill_null(zero_count()),
            col(PUT_FAIL_COUNT).cast(DataType::UInt64).fill_null(zero_count()),
            col(DELETE_FAIL_COUNT).cast(DataType::UInt64).fill_null(zero_count()),
            col(EVENT).cast(DataType::String),
        ])
        .collect()
        .context("Normalise telemetry columns")?;

    Ok(frame)
}

/// A zero typed as a counter. A bare `lit(0u64)` is a dynamic literal and does not coerce to
/// `UInt64` in `fill_null`.
fn zero_count() -> Expr {
    lit(Scalar::new(DataType::UInt64, AnyValue::UInt64(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::transform;
    use cache_bench_telemetry_model::{
        write_telemetry_table, LifecycleEvent, OperationCounts, TelemetryRecord,
    };
    use std::fs;

    fn write_table(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn write_records(dir: &tempfile::TempDir, name: &str, records: &[TelemetryRecord]) -> PathBuf {
        let path = dir.path().join(name);
        write_telemetry_table(records, &path).unwrap();
        path
    }

    fn record(
        time_step: i64,
        get: (u64, u64),
        put: (u64, u64),
        delete: (u64, u64),
        event: Option<LifecycleEvent>,
    ) -> TelemetryRecord {
        TelemetryRecord::new(
            time_step,
            OperationCounts::new(get.0, get.1, 0.5),
            OperationCounts::new(put.0, put.1, 0.25),
            OperationCounts::new(delete.0, delete.1, 0.1),
            event,
        )
    }

    fn sample_records() -> Vec<TelemetryRecord> {
        vec![
            record(1, (10, 0), (5, 1), (2, 0), Some(LifecycleEvent::StartServer)),
            record(2, (12, 2), (5, 0), (2, 1), None),
            record(3, (12, 1), (6, 0), (2, 0), Some(LifecycleEvent::StartClient)),
            record(4, (14, 0), (6, 2), (3, 0), None),
        ]
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_telemetry_frame(&dir.path().join("absent.csv"), None).unwrap_err();

        match err.downcast_ref::<LoadError>() {
            Some(LoadError::SourceNotFound { path }) => {
                assert!(path.ends_with("absent.csv"))
            }
            other => panic!("Expected SourceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn missing_columns_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            &dir,
            "partial.csv",
            "timeStep,event,totalSucc,getFailCount\n1,,5,0\n",
        );

        let err = load_telemetry_frame(&path, None).unwrap_err();
        match err.downcast_ref::<LoadError>() {
            Some(LoadError::MalformedTable { missing, .. }) => {
                assert_eq!(
                    missing,
                    &vec![PUT_FAIL_COUNT.to_string(), DELETE_FAIL_COUNT.to_string()]
                )
            }
            other => panic!("Expected MalformedTable, got {other:?}"),
        }
    }

    #[test]
    fn required_columns_are_typed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_records(&dir, "sample.csv", &sample_records());

        let frame = load_telemetry_frame(&path, None)?;

        assert_eq!(frame.height(), 4);
        assert_eq!(frame.column(TIME_STEP)?.dtype(), &DataType::Float64);
        assert_eq!(frame.column(TOTAL_SUCC)?.dtype(), &DataType::Float64);
        assert_eq!(frame.column(PUT_FAIL_COUNT)?.dtype(), &DataType::UInt64);
        assert_eq!(frame.column(EVENT)?.dtype(), &DataType::String);

        let time_steps: Vec<f64> = frame.column(TIME_STEP)?.f64()?.into_no_null_iter().collect();
        assert_eq!(time_steps, vec![1.0, 2.0, 3.0, 4.0]);
        let total_succ: Vec<f64> = frame.column(TOTAL_SUCC)?.f64()?.into_no_null_iter().collect();
        assert_eq!(total_succ, vec![16.0, 16.0, 19.0, 21.0]);

        Ok(())
    }

    #[test]
    fn truncation_keeps_leading_rows() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_records(&dir, "sample.csv", &sample_records());

        let frame = load_telemetry_frame(&path, Some(2))?;
        assert_eq!(frame.height(), 2);
        let time_steps: Vec<f64> = frame.column(TIME_STEP)?.f64()?.into_no_null_iter().collect();
        assert_eq!(time_steps, vec![1.0, 2.0]);

        // Truncating past the end is not an error
        let frame = load_telemetry_frame(&path, Some(100))?;
        assert_eq!(frame.height(), 4);

        Ok(())
    }

    #[test]
    fn header_only_table_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_records(&dir, "empty.csv", &[]);

        let frame = load_telemetry_frame(&path, None)?;
        assert_eq!(frame.height(), 0);
        assert_eq!(frame.column(TIME_STEP)?.dtype(), &DataType::Float64);

        Ok(())
    }

    #[test]
    fn table_without_events_has_string_event_column() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_records(
            &dir,
            "quiet.csv",
            &[
                record(1, (1, 0), (0, 0), (0, 0), None),
                record(2, (1, 1), (0, 0), (0, 0), None),
            ],
        );

        let frame = load_telemetry_frame(&path, None)?;
        assert_eq!(frame.column(EVENT)?.dtype(), &DataType::String);
        assert_eq!(frame.column(EVENT)?.null_count(), 2);

        Ok(())
    }

    #[test]
    fn empty_counter_cells_read_as_zero() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_table(
            &dir,
            "gaps.csv",
            "timeStep,event,totalSucc,getFailCount,putFailCount,deleteFailCount\n\
             1,,5,,2,\n\
             2,START_SERVER,6,1,,3\n",
        );

        let frame = load_telemetry_frame(&path, None)?;

        let get: Vec<u64> = frame.column(GET_FAIL_COUNT)?.u64()?.into_no_null_iter().collect();
        let put: Vec<u64> = frame.column(PUT_FAIL_COUNT)?.u64()?.into_no_null_iter().collect();
        let delete: Vec<u64> = frame
            .column(DELETE_FAIL_COUNT)?
            .u64()?
            .into_no_null_iter()
            .collect();
        assert_eq!(get, vec![0, 1]);
        assert_eq!(put, vec![2, 0]);
        assert_eq!(delete, vec![0, 3]);
        assert_eq!(frame.column(GET_FAIL_COUNT)?.null_count(), 0);

        Ok(())
    }

    #[test]
    fn identical_rows_average_to_their_value() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let records = (0..10)
            .map(|t| {
                let event = (t == 9).then_some(LifecycleEvent::StartServer);
                record(t, (5, 0), (0, 0), (0, 0), event)
            })
            .collect::<Vec<_>>();
        let path = write_records(&dir, "identical.csv", &records);

        let series = transform(&load_telemetry_frame(&path, None)?, 10)?;

        assert_eq!(series.moving_average.values, vec![5.0]);
        assert_eq!(series.moving_average.time_steps, vec![9.0]);
        assert_eq!(series.failure_total, vec![0; 10]);
        assert_eq!(
            series.event_markers.time_steps(LifecycleEvent::StartServer),
            vec![9.0]
        );
        assert_eq!(series.event_markers.get(LifecycleEvent::StartServer)[0].row, 9);
        assert!(series.event_markers.get(LifecycleEvent::StopServer).is_empty());
        assert!(series.event_markers.get(LifecycleEvent::StartClient).is_empty());

        Ok(())
    }

    #[test]
    fn first_event_after_a_long_quiet_run_is_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let records = (1..=300)
            .map(|t| {
                let event = (t == 300).then_some(LifecycleEvent::StopServer);
                record(t, (3, 1), (0, 0), (0, 0), event)
            })
            .collect::<Vec<_>>();
        let path = write_records(&dir, "late.csv", &records);

        let frame = load_telemetry_frame(&path, None)?;
        assert_eq!(frame.column(EVENT)?.dtype(), &DataType::String);

        let series = transform(&frame, 10)?;
        assert_eq!(
            series.event_markers.time_steps(LifecycleEvent::StopServer),
            vec![300.0]
        );
        assert_eq!(series.event_markers.get(LifecycleEvent::StopServer)[0].row, 299);
        assert_eq!(series.moving_average.len(), 291);

        Ok(())
    }

    #[test]
    fn extra_row_column_does_not_disturb_markers() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_table(
            &dir,
            "indexed.csv",
            "row,timeStep,event,totalSucc,getFailCount,putFailCount,deleteFailCount\n\
             0,1,START_SERVER,5,0,0,0\n\
             1,2,,6,1,0,0\n\
             2,3,START_CLIENT,7,0,0,2\n",
        );

        let frame = load_telemetry_frame(&path, None)?;
        assert!(frame.get_column_index("row").is_some());

        let series = transform(&frame, 1)?;
        assert_eq!(
            series.event_markers.time_steps(LifecycleEvent::StartServer),
            vec![1.0]
        );
        assert_eq!(
            series.event_markers.time_steps(LifecycleEvent::StartClient),
            vec![3.0]
        );
        assert_eq!(series.event_markers.rows(), vec![0, 2]);
        assert_eq!(series.failure_total, vec![0, 1, 2]);

        Ok(())
    }
}
