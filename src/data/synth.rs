//! Synthetic gradiometer scans.
//!
//! Voltages come from the model itself plus Gaussian noise, so fits on the
//! generated data have a known answer. Used by tests and `sqs simulate`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::config::InstrumentConstants;
use crate::data::file::{MetadataKey, RawDataFile};
use crate::data::scan::{RawScanPoint, ScanInfo, ScanRow};
use crate::error::AppError;
use crate::math::linspace;
use crate::models::Gradiometer;

/// True model parameters of one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanParams {
    pub amplitude: f64,
    pub shift: f64,
    pub slope: f64,
    pub center: f64,
}

/// Model voltages at `position` plus `N(0, noise²)` noise.
pub fn synthetic_voltages(
    coil: &Gradiometer,
    position: &[f64],
    params: &ScanParams,
    noise: f64,
    seed: u64,
) -> Result<Vec<f64>, AppError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, noise)
        .map_err(|e| AppError::InvalidArgument(format!("noise level {noise}: {e}")))?;

    Ok(position
        .iter()
        .map(|&z| {
            coil.voltage(z, params.amplitude, params.shift, params.slope, params.center)
                + normal.sample(&mut rng)
        })
        .collect())
}

/// Settings for a simulated temperature sweep.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub path: PathBuf,
    pub scans: usize,
    pub points_per_scan: usize,
    pub temp_start: f64,
    pub temp_end: f64,
    pub field: f64,
    /// Amplitude at 1 K; the sweep follows `A(T) = curie / T`.
    pub curie: f64,
    pub center: f64,
    pub background: f64,
    pub noise: f64,
    pub squid_range: f64,
    pub travel: f64,
    pub sample_mass: Option<f64>,
    pub seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("simulated.rw.dat"),
            scans: 20,
            points_per_scan: 64,
            temp_start: 2.0,
            temp_end: 300.0,
            field: 1000.0,
            curie: 10.0,
            center: 35.0,
            background: 0.0,
            noise: 1e-3,
            squid_range: 1.0,
            travel: 70.0,
            sample_mass: None,
            seed: 42,
        }
    }
}

/// A temperature sweep of alternating up/down scans.
pub fn simulate_sweep(
    constants: &InstrumentConstants,
    config: &SweepConfig,
) -> Result<RawDataFile, AppError> {
    if config.scans == 0 || config.points_per_scan < 5 {
        return Err(AppError::InvalidArgument(
            "need at least one scan with 5 or more points".to_string(),
        ));
    }
    if !(config.squid_range.is_finite() && config.squid_range > 0.0) {
        return Err(AppError::InvalidArgument(format!(
            "squid range must be positive, got {}",
            config.squid_range
        )));
    }

    let coil = Gradiometer::from_constants(constants);
    let temps = linspace(config.temp_start, config.temp_end, config.scans);
    let positions = linspace(0.0, config.travel, config.points_per_scan);
    let mut clock = 0.0;
    let mut scans = Vec::with_capacity(config.scans);

    for (k, &temp) in temps.iter().enumerate() {
        let params = ScanParams {
            amplitude: config.curie / temp.max(1e-3),
            shift: config.background,
            slope: 0.0,
            center: config.center,
        };
        let volts = synthetic_voltages(&coil, &positions, &params, config.noise, config.seed + k as u64)?;

        let mut rows: Vec<ScanRow> = positions
            .iter()
            .zip(&volts)
            .map(|(&position, &v)| ScanRow {
                timestamp: 0.0,
                position,
                voltage: v / config.squid_range,
                processed: v / config.squid_range - params.shift,
            })
            .collect();
        if k % 2 == 1 {
            rows.reverse();
        }
        for row in &mut rows {
            clock += 0.5;
            row.timestamp = clock;
        }

        let info = ScanInfo {
            low_temp: temp - 0.01,
            high_temp: temp + 0.01,
            avg_temp: temp,
            low_field: config.field,
            high_field: config.field,
            drift: 0.0,
            slope: 0.0,
            squid_range: config.squid_range,
            given_center: config.center,
            calculated_center: config.center,
            amp_fixed: params.amplitude,
            amp_free: params.amplitude,
        };
        let scan = RawScanPoint::new(info, rows)
            .map_err(|msg| AppError::malformed(&config.path, 0, msg))?;
        scans.push(scan);
        clock += 10.0;
    }

    let mut metadata = BTreeMap::new();
    metadata.insert(MetadataKey::Appname, "sqs simulate".to_string());
    if let Some(mass) = config.sample_mass {
        metadata.insert(MetadataKey::SampleMass, format!("{mass}"));
    }

    RawDataFile::from_parts(
        config.path.clone(),
        format!("Simulated sweep {}-{} K at {} Oe", config.temp_start, config.temp_end, config.field),
        scans,
        metadata,
    )
}
