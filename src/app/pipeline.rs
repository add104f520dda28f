//! Shared "fit pipeline" logic used by the `fit` and `scan` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load files -> pair scans -> fit pairs -> derived quantities -> table rows
//!
//! The command handlers can then focus on presentation (printing, plotting, exports).

use crate::cli::{FitArgs, MeasurementArgs};
use crate::config::InstrumentConstants;
use crate::error::AppError;
use crate::io::CurveFile;
use crate::measurement::Measurement;
use crate::report::{PointRow, compute_point_rows};

/// All computed outputs of a single `sqs fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub measurement: Measurement,
    pub rows: Vec<PointRow>,
    pub curve: CurveFile,
}

/// Load and fit the files named on the command line.
pub fn load_measurement(
    args: &MeasurementArgs,
    constants: InstrumentConstants,
) -> Result<Measurement, AppError> {
    if args.sample.is_none() && args.background.is_none() {
        return Err(AppError::InvalidArgument(
            "pass --sample and/or --background".to_string(),
        ));
    }
    Measurement::load(
        args.sample.as_deref(),
        args.background.as_deref(),
        args.mode,
        constants,
    )
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(args: &FitArgs, constants: InstrumentConstants) -> Result<RunOutput, AppError> {
    let measurement = load_measurement(&args.measurement, constants)?;
    run_fit_with_measurement(args, measurement)
}

/// Derive the table and the curve from an already fitted measurement.
pub fn run_fit_with_measurement(
    args: &FitArgs,
    measurement: Measurement,
) -> Result<RunOutput, AppError> {
    // Metadata is checked here, before any table is printed.
    let rows = compute_point_rows(&measurement, args.quantity, args.center)?;
    let curve = CurveFile::from_measurement(
        &measurement,
        args.axis,
        args.quantity,
        args.center,
        args.inverse,
    )?;

    Ok(RunOutput {
        measurement,
        rows,
        curve,
    })
}

/// Resolve the datapoint a `scan` command refers to.
///
/// An explicit index wins; otherwise the point closest in temperature; otherwise
/// the first point.
pub fn pick_datapoint(
    measurement: &Measurement,
    index: Option<usize>,
    temperature: Option<f64>,
) -> Result<usize, AppError> {
    if measurement.is_empty() {
        return Err(AppError::IndexOutOfRange { index: index.unwrap_or(0), len: 0 });
    }
    if let Some(index) = index {
        measurement.datapoint(index)?;
        return Ok(index);
    }
    let Some(target) = temperature else {
        return Ok(0);
    };

    let temps = measurement.temperatures(None)?;
    let mut best = 0;
    for (i, t) in temps.iter().enumerate() {
        if (t - target).abs() < (temps[best] - target).abs() {
            best = i;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SweepConfig, simulate_sweep};
    use crate::domain::{CenterMode, MappingMode, Quantity, XAxis};
    use crate::io::write_raw_file;

    fn fit_args(measurement: MeasurementArgs, quantity: Quantity) -> FitArgs {
        FitArgs {
            measurement,
            axis: XAxis::Temperature,
            quantity,
            center: CenterMode::Free,
            inverse: false,
            plot: false,
            width: 80,
            height: 20,
            export_dat: None,
            export_raw: None,
            export_curve: None,
            debug: None,
        }
    }

    fn simulated(dir: &std::path::Path, mass: Option<f64>) -> std::path::PathBuf {
        let config = SweepConfig {
            path: dir.join("sim.rw.dat"),
            scans: 4,
            points_per_scan: 40,
            noise: 0.0,
            sample_mass: mass,
            ..SweepConfig::default()
        };
        let file = simulate_sweep(&InstrumentConstants::default(), &config).unwrap();
        write_raw_file(&config.path, &file).unwrap();
        config.path
    }

    #[test]
    fn fit_pipeline_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = simulated(dir.path(), Some(12.0));
        let args = fit_args(
            MeasurementArgs {
                sample: Some(path),
                background: None,
                mode: MappingMode::Direct,
            },
            Quantity::MassMagnetization,
        );

        let run = run_fit(&args, InstrumentConstants::default()).unwrap();
        assert_eq!(run.rows.len(), 4);
        assert_eq!(run.curve.x.len(), 4);
        assert_eq!(run.curve.measurement, "sim.rw.dat");
    }

    #[test]
    fn missing_mass_fails_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = simulated(dir.path(), None);
        let args = fit_args(
            MeasurementArgs {
                sample: Some(path),
                background: None,
                mode: MappingMode::Direct,
            },
            Quantity::MassMagnetization,
        );
        let err = run_fit(&args, InstrumentConstants::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn no_files_is_a_usage_error() {
        let args = MeasurementArgs {
            sample: None,
            background: None,
            mode: MappingMode::Direct,
        };
        let err = load_measurement(&args, InstrumentConstants::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn pick_by_temperature_or_index() {
        let config = SweepConfig {
            scans: 5,
            temp_start: 10.0,
            temp_end: 50.0,
            noise: 0.0,
            ..SweepConfig::default()
        };
        let constants = InstrumentConstants::default();
        let file = simulate_sweep(&constants, &config).unwrap();
        let m = Measurement::new(Some(file), None, MappingMode::Direct, constants).unwrap();

        assert_eq!(pick_datapoint(&m, None, Some(29.0)).unwrap(), 2);
        assert_eq!(pick_datapoint(&m, Some(4), None).unwrap(), 4);
        assert_eq!(pick_datapoint(&m, None, None).unwrap(), 0);
        assert!(pick_datapoint(&m, Some(9), None).is_err());
    }
}
