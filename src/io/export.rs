//! File exports.
//!
//! - `.rw.dat`: the scans themselves, in the instrument's own layout, so that
//!   `RawDataFile::load` reads them back unchanged
//! - measurement `.rw.dat`: every datapoint's sample, background and subtracted
//!   scans with their fitted curves, still readable by `RawDataFile::load`
//! - `.dat`: one CSV row per fitted datapoint

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;

use crate::data::{RawDataFile, ScanInfo};
use crate::domain::{CenterMode, FitTarget};
use crate::error::AppError;
use crate::fit::ScanFitResult;
use crate::io::ingest::DATA_MARKER;
use crate::measurement::{Measurement, MeasurementDataPoint};
use crate::models::Gradiometer;

const RAW_COLUMNS: &str = "Comment,Time Stamp (sec),Raw Position (mm),Raw Voltage (V),Processed Voltage (V)";

/// Fitted curve lines follow each scan block; the parser skips them.
const FIT_COLUMNS: &str = "Fit,Raw Position (mm),Fixed C. Fitted (V),Free C. Fitted (V)";

const DAT_COLUMNS: [&str; 15] = [
    "Comment",
    "Time Stamp (sec)",
    "Temperature (K)",
    "Magnetic Field (Oe)",
    "Moment (emu)",
    "M. Std. Err. (emu)",
    "Moment Avg. (emu)",
    "M. Std. Err. Avg. (emu)",
    "Fixed C. Moment (emu)",
    "Fixed C. M. Std. Err. (emu)",
    "Fixed C. Moment Avg. (emu)",
    "Fixed C. M. Std. Err. Avg. (emu)",
    "Center (mm)",
    "Fixed Center (mm)",
    "Jump Corrected",
];

fn write_header<W: Write>(out: &mut W, file: &RawDataFile) -> std::io::Result<()> {
    writeln!(out, "[Header]")?;
    writeln!(out, "TITLE,{}", file.title())?;
    for (key, value) in file.metadata_entries() {
        writeln!(out, "INFO,{value},{}", key.key())?;
    }
    Ok(())
}

fn number(v: f64) -> String {
    if v.is_nan() { String::new() } else { format!("{v}") }
}

fn write_scans<W: Write>(out: &mut W, file: &RawDataFile) -> std::io::Result<()> {
    write_header(out, file)?;
    writeln!(out, "{DATA_MARKER}")?;
    writeln!(out, "{RAW_COLUMNS}")?;
    for scan in file.scans() {
        writeln!(out, "{}", scan.info().to_line())?;
        for row in scan.rows_in_acquisition_order() {
            writeln!(
                out,
                ",{},{},{},{}",
                row.timestamp,
                row.position,
                row.voltage,
                number(row.processed)
            )?;
        }
    }
    out.flush()
}

/// Write every scan of `file` as a detailed `.rw.dat`.
pub fn write_raw_file(path: &Path, file: &RawDataFile) -> Result<(), AppError> {
    let handle = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut out = BufWriter::new(handle);
    write_scans(&mut out, file).map_err(|e| AppError::io(path, e))?;

    log::info!("wrote {} scans to '{}'", file.len(), path.display());
    Ok(())
}

/// `info` with the fitted center and amplitudes of `fit`.
fn fitted_info(info: &ScanInfo, fit: &ScanFitResult) -> ScanInfo {
    ScanInfo {
        calculated_center: fit.center(CenterMode::Free),
        amp_fixed: fit.fixed.amplitude(),
        amp_free: fit.free.amplitude(),
        ..*info
    }
}

fn write_fitted_curves<W: Write>(
    out: &mut W,
    coil: &Gradiometer,
    fit: &ScanFitResult,
    positions: &[f64],
) -> std::io::Result<()> {
    for &z in positions {
        writeln!(
            out,
            "fit,{z},{},{}",
            fit.predict(coil, z, CenterMode::Fixed),
            fit.predict(coil, z, CenterMode::Free)
        )?;
    }
    Ok(())
}

fn write_point_blocks<W: Write>(
    out: &mut W,
    coil: &Gradiometer,
    index: usize,
    point: &MeasurementDataPoint,
) -> std::io::Result<()> {
    let sides = [
        ("sample", point.sample(), FitTarget::Sample),
        ("background", point.background(), FitTarget::Background),
    ];
    for (label, scan, target) in sides {
        let (Some(scan), Some(fit)) = (scan, point.fit(target)) else {
            continue;
        };
        writeln!(
            out,
            "{};datapoint = {index};signal = {label}",
            fitted_info(scan.info(), fit).to_line()
        )?;
        for row in scan.rows_in_acquisition_order() {
            writeln!(
                out,
                ",{},{},{},{}",
                row.timestamp,
                row.position,
                row.voltage,
                number(row.processed)
            )?;
        }
        write_fitted_curves(out, coil, fit, &scan.positions())?;
    }

    if point.sample().is_none() || point.background().is_none() {
        return Ok(());
    }
    let Some((positions, voltages)) = point
        .signal(FitTarget::Combined)
        .map_err(std::io::Error::other)?
    else {
        return Ok(());
    };

    // The difference is already range-scaled.
    let fit = point.combined();
    let info = ScanInfo {
        squid_range: 1.0,
        given_center: fit.fixed_center,
        ..fitted_info(point.primary_scan().info(), fit)
    };
    writeln!(out, "{};datapoint = {index};signal = subtracted", info.to_line())?;
    let t = point.timestamp();
    for (z, v) in positions.iter().zip(&voltages) {
        writeln!(out, ",{t},{z},{v},")?;
    }
    write_fitted_curves(out, coil, fit, &positions)
}

fn write_measurement_blocks<W: Write>(out: &mut W, measurement: &Measurement) -> std::io::Result<()> {
    let coil = Gradiometer::from_constants(measurement.constants());
    write_dat_header(out, measurement)?;
    writeln!(out, "{RAW_COLUMNS}")?;
    writeln!(out, "{FIT_COLUMNS}")?;
    for (index, point) in measurement.datapoints().iter().enumerate() {
        write_point_blocks(out, &coil, index, point)?;
    }
    out.flush()
}

/// Write every datapoint of `measurement` as a detailed `.rw.dat`: the sample
/// and background scans, their difference, and the fitted free- and
/// fixed-center curves after each of them.
pub fn write_measurement_raw(path: &Path, measurement: &Measurement) -> Result<(), AppError> {
    let handle = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut out = BufWriter::new(handle);
    write_measurement_blocks(&mut out, measurement).map_err(|e| AppError::io(path, e))?;

    log::info!(
        "wrote {} datapoints with fitted curves to '{}'",
        measurement.len(),
        path.display()
    );
    Ok(())
}

/// Mean of two moments and the error of that mean.
fn averaged(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, 0.5 * (a.1 * a.1 + b.1 * b.1).sqrt())
}

fn write_dat_header<W: Write>(out: &mut W, measurement: &Measurement) -> std::io::Result<()> {
    match measurement.metadata_file() {
        Some(file) => write_header(out, file)?,
        None => writeln!(out, "[Header]")?,
    }
    writeln!(out, "INFO,{},EXPORT_TIME", Utc::now().to_rfc3339())?;
    writeln!(out, "{DATA_MARKER}")
}

/// Write the aggregated per-datapoint table of `measurement` as `.dat`.
pub fn write_measurement_dat(path: &Path, measurement: &Measurement) -> Result<(), AppError> {
    let handle = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut out = BufWriter::new(handle);

    write_dat_header(&mut out, measurement).map_err(|e| AppError::io(path, e))?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(DAT_COLUMNS)?;
    let points = measurement.datapoints();
    for (i, point) in points.iter().enumerate() {
        let fit = point.combined();
        // Up and down legs at the same temperature and field are averaged.
        let next = points
            .get(i + 1)
            .filter(|n| n.temperature() == point.temperature() && n.field() == point.field());
        let avg = |center: CenterMode| -> [String; 2] {
            match next {
                Some(n) => {
                    let (m, e) = averaged(
                        (point.moment(center), point.moment_err(center)),
                        (n.moment(center), n.moment_err(center)),
                    );
                    [number(m), number(e)]
                }
                None => [String::new(), String::new()],
            }
        };
        let [free_avg, free_avg_err] = avg(CenterMode::Free);
        let [fixed_avg, fixed_avg_err] = avg(CenterMode::Fixed);

        writer.write_record([
            String::new(),
            number(point.timestamp()),
            number(point.temperature()),
            number(point.field()),
            number(fit.moment(CenterMode::Free)),
            number(fit.moment_err(CenterMode::Free)),
            free_avg,
            free_avg_err,
            number(fit.moment(CenterMode::Fixed)),
            number(fit.moment_err(CenterMode::Fixed)),
            fixed_avg,
            fixed_avg_err,
            number(fit.center(CenterMode::Free)),
            number(fit.center(CenterMode::Fixed)),
            if point.is_jump_corrected() { "1" } else { "0" }.to_string(),
        ])?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;

    log::info!("wrote {} datapoints to '{}'", measurement.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstrumentConstants;
    use crate::data::{MetadataKey, SweepConfig, simulate_sweep};
    use crate::domain::MappingMode;
    use crate::io::parse_raw_file;

    fn sweep() -> RawDataFile {
        let config = SweepConfig {
            scans: 5,
            points_per_scan: 40,
            sample_mass: Some(12.5),
            ..SweepConfig::default()
        };
        simulate_sweep(&InstrumentConstants::default(), &config).unwrap()
    }

    #[test]
    fn raw_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.rw.dat");
        let original = sweep();

        write_raw_file(&path, &original).unwrap();
        let reloaded = RawDataFile::load(&path).unwrap();

        assert_eq!(reloaded.title(), original.title());
        assert_eq!(reloaded.metadata(MetadataKey::SampleMass), Some("12.5"));
        assert_eq!(reloaded.len(), original.len());
        for (a, b) in original.scans().iter().zip(reloaded.scans()) {
            assert_eq!(a.info(), b.info());
            assert_eq!(a.direction(), b.direction());
            assert_eq!(a.rows(), b.rows());
        }
    }

    #[test]
    fn dat_has_one_row_per_datapoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.dat");
        let m = Measurement::new(Some(sweep()), None, MappingMode::Direct, InstrumentConstants::default())
            .unwrap();

        write_measurement_dat(&path, &m).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let data = text.split("[Data]\n").nth(1).unwrap();

        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), m.len());
        assert_eq!(rows[0].len(), DAT_COLUMNS.len());
        assert_eq!(&rows[0][0], "");
        let t: f64 = rows[0][2].parse().unwrap();
        assert_eq!(t, m.temperatures(None).unwrap()[0]);
        assert!(text.contains("INFO,12.5,SAMPLE_MASS"));
    }

    #[test]
    fn dat_averages_consecutive_legs_at_equal_temperature_and_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legs.dat");
        let config = SweepConfig {
            scans: 3,
            points_per_scan: 40,
            noise: 0.0,
            ..SweepConfig::default()
        };
        let constants = InstrumentConstants::default();
        let sweep = simulate_sweep(&constants, &config).unwrap();
        let legs = sweep
            .scans()
            .iter()
            .flat_map(|s| [(**s).clone(), (**s).clone()])
            .collect();
        let file = RawDataFile::from_parts("legs.rw.dat", "legs", legs, Default::default()).unwrap();
        let m = Measurement::new(Some(file), None, MappingMode::Direct, constants).unwrap();
        assert_eq!(m.len(), 6);

        write_measurement_dat(&path, &m).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let data = text.split("[Data]\n").nth(1).unwrap();
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 6);

        let value = |r: usize, c: usize| -> f64 { rows[r][c].parse().unwrap() };
        let moment = m.moments(CenterMode::Free, None).unwrap()[0];
        let err = m.moment_errors(CenterMode::Free, None).unwrap()[0];
        assert!((value(0, 6) - moment).abs() <= 1e-12 * moment.abs());
        assert!((value(0, 7) - 0.5 * 2f64.sqrt() * err).abs() <= 1e-12 * err.abs().max(1e-30));
        let fixed = m.moments(CenterMode::Fixed, None).unwrap()[0];
        assert!((value(0, 10) - fixed).abs() <= 1e-12 * fixed.abs());

        // A leg followed by a different temperature, and the last row, have no average.
        for r in [1, 3, 5] {
            assert_eq!(&rows[r][6], "");
            assert_eq!(&rows[r][7], "");
            assert_eq!(&rows[r][10], "");
            assert_eq!(&rows[r][11], "");
        }
        assert_ne!(&rows[2][6], "");
    }

    #[test]
    fn measurement_raw_export_keeps_every_signal_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.rw.dat");
        let constants = InstrumentConstants::default();
        let config = SweepConfig {
            scans: 3,
            points_per_scan: 40,
            noise: 0.0,
            sample_mass: Some(12.5),
            ..SweepConfig::default()
        };
        let sample = simulate_sweep(&constants, &config).unwrap();
        let background = simulate_sweep(
            &constants,
            &SweepConfig {
                curie: 0.5,
                background: 0.01,
                sample_mass: None,
                ..config
            },
        )
        .unwrap();
        let m = Measurement::new(Some(sample), Some(background), MappingMode::Direct, constants).unwrap();
        assert_eq!(m.len(), 3);

        write_measurement_raw(&path, &m).unwrap();

        let parsed = parse_raw_file(&path).unwrap();
        assert_eq!(parsed.blocks.len(), 9);
        assert!(parsed.blocks[0].info.contains("signal = sample"));
        assert!(parsed.blocks[1].info.contains("signal = background"));
        assert!(parsed.blocks[2].info.contains("signal = subtracted"));
        assert!(parsed.blocks[8].info.contains("datapoint = 2"));

        let text = std::fs::read_to_string(&path).unwrap();
        let fitted = text.lines().filter(|l| l.starts_with("fit,")).count();
        let rows: usize = parsed.blocks.iter().map(|b| b.rows.len()).sum();
        assert_eq!(fitted, rows);
        assert!(text.contains("INFO,12.5,SAMPLE_MASS"));

        let reloaded = RawDataFile::load(&path).unwrap();
        assert_eq!(reloaded.len(), 9);
        let point = m.datapoint(0).unwrap();
        let sample_scan = point.sample().unwrap();
        assert_eq!(reloaded.scans()[0].rows(), sample_scan.rows());
        let fit = point.fit(FitTarget::Sample).unwrap();
        assert_eq!(reloaded.scans()[0].info().amp_free, fit.free.amplitude());
        assert_eq!(reloaded.scans()[0].info().calculated_center, fit.center(CenterMode::Free));

        let (positions, _) = point.signal(FitTarget::Combined).unwrap().unwrap();
        assert_eq!(reloaded.scans()[2].len(), positions.len());
        assert_eq!(reloaded.scans()[2].info().given_center, point.combined().fixed_center);
    }
}
