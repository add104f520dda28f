//! Read/write curve JSON files.
//!
//! A curve file is a portable snapshot of one magnetization curve:
//! - which measurement it came from and when it was exported
//! - the x axis, quantity, center mode and inversion used
//! - the x/y values (and y uncertainties) for quick plotting

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CenterMode, Quantity, XAxis};
use crate::error::AppError;
use crate::measurement::Measurement;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub measurement: String,
    pub created: DateTime<Utc>,
    pub x_axis: XAxis,
    pub quantity: Quantity,
    pub center: CenterMode,
    pub inverse: bool,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(default)]
    pub y_err: Vec<f64>,
}

impl CurveFile {
    /// Snapshot the curve of `measurement` for the given selection.
    pub fn from_measurement(
        measurement: &Measurement,
        x_axis: XAxis,
        quantity: Quantity,
        center: CenterMode,
        inverse: bool,
    ) -> Result<Self, AppError> {
        let x = measurement.x_values(x_axis, None)?;
        let y = measurement.quantity(quantity, center, inverse, None)?;
        let y_err = if inverse {
            Vec::new()
        } else {
            measurement.quantity_errors(quantity, center, None)?
        };

        Ok(Self {
            tool: "sqs".to_string(),
            measurement: measurement.name().to_string(),
            created: Utc::now(),
            x_axis,
            quantity,
            center,
            inverse,
            x,
            y,
            y_err,
        })
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &CurveFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    serde_json::to_writer_pretty(file, curve)?;
    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    let curve: CurveFile = serde_json::from_reader(file)?;
    if curve.x.len() != curve.y.len() {
        return Err(AppError::InvalidArgument(format!(
            "curve '{}' has {} x values but {} y values",
            path.display(),
            curve.x.len(),
            curve.y.len()
        )));
    }
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_json_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.json");
        let curve = CurveFile {
            tool: "sqs".to_string(),
            measurement: "m.rw.dat".to_string(),
            created: Utc::now(),
            x_axis: XAxis::Temperature,
            quantity: Quantity::MassSusceptibility,
            center: CenterMode::Fixed,
            inverse: true,
            x: vec![2.0, 5.0],
            y: vec![10.0, 25.0],
            y_err: Vec::new(),
        };

        write_curve_json(&path, &curve).unwrap();
        assert_eq!(read_curve_json(&path).unwrap(), curve);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"mass-susceptibility\""));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"tool":"sqs","measurement":"m","created":"2024-01-01T00:00:00Z","x_axis":"field",
               "quantity":"moment","center":"free","inverse":false,"x":[1.0],"y":[]}"#,
        )
        .unwrap();
        assert!(read_curve_json(&path).is_err());
    }
}
