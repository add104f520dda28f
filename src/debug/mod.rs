//! Debug bundle writer for inspecting scans and their fits.

use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::{CenterMode, FitTarget};
use crate::error::AppError;
use crate::measurement::{Measurement, MeasurementDataPoint};
use crate::models::Gradiometer;

/// Write a markdown bundle with every datapoint's signals, fitted curves and
/// residuals into `dir`. Returns the path of the new file.
pub fn write_debug_bundle(measurement: &Measurement, dir: &Path) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let stem = measurement
        .name()
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("measurement");
    let path = dir.join(format!("sqs_debug_{stem}_{ts}.md"));

    let file = File::create(&path).map_err(|e| AppError::io(&path, e))?;
    let mut out = BufWriter::new(file);
    write_bundle(&mut out, measurement)
        .and_then(|()| out.flush())
        .map_err(|e| AppError::io(&path, e))?;

    log::info!("wrote debug bundle {}", path.display());
    Ok(path)
}

fn write_bundle<W: Write>(out: &mut W, measurement: &Measurement) -> std::io::Result<()> {
    let constants = measurement.constants();
    writeln!(out, "# sqs debug bundle")?;
    writeln!(out, "- generated: {}", Local::now().to_rfc3339())?;
    writeln!(out, "- measurement: {}", measurement.name())?;
    writeln!(out, "- mapping: {:?}", measurement.mapping_mode())?;
    writeln!(
        out,
        "- coil: radius={} mm, distance={} mm, calibration={} / {}",
        constants.coil_radius,
        constants.coil_distance,
        constants.system_calibration,
        constants.dc_calibration_factor
    )?;
    writeln!(
        out,
        "- datapoints={}, non_matching={}, fit_failures={}",
        measurement.len(),
        measurement.non_matching(),
        measurement.fit_failures().len()
    )?;

    if !measurement.fit_failures().is_empty() {
        writeln!(out, "\n## Fit failures")?;
        writeln!(out, "| sample | background | error |")?;
        writeln!(out, "| - | - | - |")?;
        for failure in measurement.fit_failures() {
            writeln!(
                out,
                "| {:?} | {:?} | {} |",
                failure.pair.sample, failure.pair.background, failure.error
            )?;
        }
    }

    let coil = Gradiometer::from_constants(constants);
    for (index, point) in measurement.datapoints().iter().enumerate() {
        write_point(out, &coil, index, point)?;
    }
    Ok(())
}

fn write_point<W: Write>(
    out: &mut W,
    coil: &Gradiometer,
    index: usize,
    point: &MeasurementDataPoint,
) -> std::io::Result<()> {
    writeln!(
        out,
        "\n## Datapoint {index}: T={:.3} K, H={:.2} Oe",
        point.temperature(),
        point.field()
    )?;
    if point.is_jump_corrected() {
        writeln!(out, "Jump-corrected.")?;
    }

    for target in [FitTarget::Sample, FitTarget::Background, FitTarget::Combined] {
        let Some(fit) = point.fit(target) else {
            continue;
        };
        writeln!(out, "\n### {target:?}")?;
        writeln!(
            out,
            "free: coefficients={:?}, std={:?}, moment={:.6e}±{:.3e}",
            fit.free.coefficients,
            fit.free.std_errors(),
            fit.moment,
            fit.moment_err
        )?;
        writeln!(
            out,
            "fixed (C={:.3}): coefficients={:?}, std={:?}, moment={:.6e}±{:.3e}",
            fit.fixed_center,
            fit.fixed.coefficients,
            fit.fixed.std_errors(),
            fit.moment_fixed,
            fit.moment_fixed_err
        )?;

        let signal = match point.signal(target) {
            Ok(Some(signal)) => signal,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "signal unavailable: {e}")?;
                continue;
            }
        };
        writeln!(out, "\n| z (mm) | V | free fit | fixed fit | residual (free) |")?;
        writeln!(out, "| - | - | - | - | - |")?;
        for (&z, &v) in signal.0.iter().zip(&signal.1) {
            let free = fit.predict(coil, z, CenterMode::Free);
            let fixed = fit.predict(coil, z, CenterMode::Fixed);
            writeln!(
                out,
                "| {z:.3} | {v:.6e} | {free:.6e} | {fixed:.6e} | {:.3e} |",
                v - free
            )?;
        }
    }
    Ok(())
}
