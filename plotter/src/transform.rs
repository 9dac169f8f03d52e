use crate::model::{EventMarkers, Marker, PlotSeries, SmoothedSeries};
use anyhow::Context;
use cache_bench_telemetry_model::{
    LifecycleEvent, DELETE_FAIL_COUNT, EVENT, GET_FAIL_COUNT, PUT_FAIL_COUNT, TIME_STEP,
    TOTAL_SUCC,
};
use polars::prelude::*;
use thiserror::Error;

/// Window used for the successful operations series unless configured otherwise.
pub const DEFAULT_WINDOW: usize = 10;

const ROW_INDEX: &str = "row";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransformError {
    #[error("Moving average window must be at least 1")]
    InvalidWindow,
    #[error("Failure counters differ in length: get={get}, put={put}, delete={delete}")]
    LengthMismatch { get: usize, put: usize, delete: usize },
}

/// Derive the plottable series from a loaded telemetry table.
pub fn transform(frame: &DataFrame, window: usize) -> anyhow::Result<PlotSeries> {
    if window == 0 {
        return Err(TransformError::InvalidWindow.into());
    }

    log::debug!(
        "Transforming {} telemetry rows with window {}",
        frame.height(),
        window
    );

    let time_steps = f64_values(frame, TIME_STEP)?;
    let total_succ = f64_values(frame, TOTAL_SUCC)?;

    let moving_average = SmoothedSeries {
        time_steps: time_steps.iter().skip(window - 1).copied().collect(),
        values: moving_average(&total_succ, window)?,
    };
    if moving_average.is_empty() {
        log::debug!(
            "Window {} is larger than the {} row table, moving average is empty",
            window,
            frame.height()
        );
    }

    let failure_total = failure_total(
        &u64_values(frame, GET_FAIL_COUNT)?,
        &u64_values(frame, PUT_FAIL_COUNT)?,
        &u64_values(frame, DELETE_FAIL_COUNT)?,
    )?;

    let event_markers = event_markers(frame).context("Extract lifecycle event markers")?;

    Ok(PlotSeries {
        window,
        time_steps,
        moving_average,
        failure_total,
        event_markers,
    })
}

/// Mean of each full trailing window of `window` values.
///
/// Returns one value per window, so `values.len() - window + 1` values, or none when there are
/// fewer than `window` values.
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<f64>, TransformError> {
    if window == 0 {
        return Err(TransformError::InvalidWindow);
    }

    Ok(values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect())
}

/// Pointwise sum of the three failure counters.
pub fn failure_total(
    get: &[u64],
    put: &[u64],
    delete: &[u64],
) -> Result<Vec<u64>, TransformError> {
    if get.len() != put.len() || get.len() != delete.len() {
        return Err(TransformError::LengthMismatch {
            get: get.len(),
            put: put.len(),
            delete: delete.len(),
        });
    }

    Ok(itertools::izip!(get, put, delete)
        .map(|(get, put, delete)| get + put + delete)
        .collect())
}

/// Collect the time steps of each tracked lifecycle event, in row order.
///
/// Labels that are not tracked, including empty ones, are ignored.
pub fn event_markers(frame: &DataFrame) -> anyhow::Result<EventMarkers> {
    // Only the indexed columns are kept so the row index cannot clash with a table column
    let indexed = frame
        .clone()
        .lazy()
        .select([col(TIME_STEP), col(EVENT)])
        .with_row_index(ROW_INDEX, None);

    let mut markers = EventMarkers::default();
    for kind in LifecycleEvent::TRACKED {
        let matching = indexed
            .clone()
            .filter(col(EVENT).eq(lit(kind.label())))
            .select([col(ROW_INDEX).cast(DataType::UInt64), col(TIME_STEP)])
            .collect()?;

        let rows = matching.column(ROW_INDEX)?.u64()?.into_no_null_iter();
        let time_steps = matching.column(TIME_STEP)?.f64()?.into_no_null_iter();

        let found = rows
            .zip(time_steps)
            .map(|(row, time_step)| Marker {
                row: row as usize,
                time_step,
            })
            .collect::<Vec<_>>();
        log::debug!("Found {} {} markers", found.len(), kind);

        markers.insert(kind, found);
    }

    Ok(markers)
}

fn f64_values(frame: &DataFrame, column: &str) -> anyhow::Result<Vec<f64>> {
    frame
        .column(column)?
        .f64()?
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .with_context(|| format!("Null value in column {column}"))
}

fn u64_values(frame: &DataFrame, column: &str) -> anyhow::Result<Vec<u64>> {
    frame
        .column(column)?
        .u64()?
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .with_context(|| format!("Null value in column {column}"))
}
