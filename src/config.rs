//! Instrument constants.
//!
//! The coil geometry and calibration factors are fixed for a given magnetometer.
//! They are carried as an explicit value (never a global) so that tests and
//! callers can fit against more than one coil configuration in one process.
//!
//! Defaults can be overridden from the environment (or a `.env` file):
//!
//! - `SQS_COIL_RADIUS` (mm)
//! - `SQS_COIL_DISTANCE` (mm)
//! - `SQS_SYSTEM_CALIBRATION`
//! - `SQS_DC_CALIBRATION_FACTOR`

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const ENV_COIL_RADIUS: &str = "SQS_COIL_RADIUS";
pub const ENV_COIL_DISTANCE: &str = "SQS_COIL_DISTANCE";
pub const ENV_SYSTEM_CALIBRATION: &str = "SQS_SYSTEM_CALIBRATION";
pub const ENV_DC_CALIBRATION_FACTOR: &str = "SQS_DC_CALIBRATION_FACTOR";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConstants {
    /// Pickup coil radius in mm.
    pub coil_radius: f64,
    /// Distance between the center coil pair and the outer coils in mm.
    pub coil_distance: f64,
    pub system_calibration: f64,
    pub dc_calibration_factor: f64,
}

impl Default for InstrumentConstants {
    fn default() -> Self {
        Self {
            coil_radius: 9.7,
            coil_distance: 15.19,
            system_calibration: 14.7029,
            dc_calibration_factor: 0.00285897,
        }
    }
}

impl InstrumentConstants {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build constants from an arbitrary key lookup (environment, test maps, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let constants = Self {
            coil_radius: read_override(&lookup, ENV_COIL_RADIUS, defaults.coil_radius)?,
            coil_distance: read_override(&lookup, ENV_COIL_DISTANCE, defaults.coil_distance)?,
            system_calibration: read_override(
                &lookup,
                ENV_SYSTEM_CALIBRATION,
                defaults.system_calibration,
            )?,
            dc_calibration_factor: read_override(
                &lookup,
                ENV_DC_CALIBRATION_FACTOR,
                defaults.dc_calibration_factor,
            )?,
        };
        constants.validate()?;
        Ok(constants)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.coil_radius.is_finite() && self.coil_radius > 0.0) {
            return Err(AppError::Config(format!(
                "coil radius must be finite and > 0 (got {})",
                self.coil_radius
            )));
        }
        if !(self.coil_distance.is_finite() && self.coil_distance > 0.0) {
            return Err(AppError::Config(format!(
                "coil distance must be finite and > 0 (got {})",
                self.coil_distance
            )));
        }
        if !(self.system_calibration.is_finite() && self.dc_calibration_factor.is_finite()) {
            return Err(AppError::Config("calibration factors must be finite".to_string()));
        }
        Ok(())
    }

    /// Convert a fitted amplitude (V) to a magnetic moment (emu).
    pub fn amplitude_to_moment(&self, amplitude: f64) -> f64 {
        -self.system_calibration * self.dc_calibration_factor * amplitude / 1000.0
    }
}

fn read_override<F>(lookup: &F, key: &str, default: f64) -> Result<f64, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::Config(format!("{key}='{raw}' is not a number"))),
    }
}
