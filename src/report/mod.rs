//! Reporting utilities: per-point rows and formatted terminal output.

use crate::domain::{CenterMode, Quantity};
use crate::error::AppError;
use crate::measurement::Measurement;

pub mod format;

pub use format::*;

/// One line of the datapoint table.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRow {
    pub index: usize,
    pub temperature: f64,
    pub field: f64,
    pub value: f64,
    pub error: f64,
    pub center: f64,
    pub jump_corrected: bool,
}

/// Table rows for `quantity` (not inverted) under `center`.
pub fn compute_point_rows(
    measurement: &Measurement,
    quantity: Quantity,
    center: CenterMode,
) -> Result<Vec<PointRow>, AppError> {
    let values = measurement.quantity(quantity, center, false, None)?;
    let errors = measurement.quantity_errors(quantity, center, None)?;

    Ok(measurement
        .datapoints()
        .iter()
        .zip(values.into_iter().zip(errors))
        .enumerate()
        .map(|(index, (point, (value, error)))| PointRow {
            index,
            temperature: point.temperature(),
            field: point.field(),
            value,
            error,
            center: point.combined().center(center),
            jump_corrected: point.is_jump_corrected(),
        })
        .collect())
}
