//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use clap::ValueEnum;

use crate::config::InstrumentConstants;
use crate::data::RawScanPoint;
use crate::domain::{CenterMode, FitTarget, Quantity};
use crate::fit::{ScanFitResult, SignalFit};
use crate::measurement::{Measurement, MeasurementDataPoint, sample_properties};
use crate::report::PointRow;

/// Header block: files, pairing outcome and sample metadata.
pub fn format_measurement_summary(measurement: &Measurement) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== sqs - {} ===\n", measurement.name()));
    if let Some(file) = measurement.sample_file() {
        out.push_str(&format!(
            "Sample: {} ({} scans) \"{}\"\n",
            file.path().display(),
            file.len(),
            file.title()
        ));
    }
    if let Some(file) = measurement.background_file() {
        out.push_str(&format!("Background: {} ({} scans)\n", file.path().display(), file.len()));
    }
    out.push_str(&format!(
        "Mapping: {:?} | datapoints={} | non-matching={} | fit failures={} | jump-corrected scans={}\n",
        measurement.mapping_mode(),
        measurement.len(),
        measurement.non_matching(),
        measurement.fit_failures().len(),
        measurement.jump_corrected_count()
    ));

    if let Some(file) = measurement.metadata_file() {
        let entries: Vec<String> = file
            .metadata_entries()
            .map(|(k, v)| format!("{}={v}", k.key()))
            .collect();
        if !entries.is_empty() {
            out.push_str(&format!("Metadata: {}\n", entries.join(", ")));
        }

        // Quantities whose metadata is present, by their `--quantity` names.
        let available: Vec<String> = Quantity::ALL
            .into_iter()
            .filter(|&q| sample_properties(file, q).is_ok())
            .filter_map(|q| q.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        out.push_str(&format!("Quantities: {}\n", available.join(", ")));
    }

    for failure in measurement.fit_failures() {
        out.push_str(&format!(
            "  (dropped sample={} background={}) {}\n",
            fmt_index(failure.pair.sample),
            fmt_index(failure.pair.background),
            failure.error
        ));
    }
    out.push('\n');
    out
}

/// Datapoint table.
pub fn format_point_table(rows: &[PointRow], quantity: Quantity, center: CenterMode) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} ({:?} center)\n", quantity.label(false), center));
    out.push_str(
        format!(
            "{:>5} {:>10} {:>12} {:>14} {:>12} {:>10} {:<4}\n",
            "#", "T [K]", "H [Oe]", "value", "error", "C [mm]", "jump"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<5} {:-<10} {:-<12} {:-<14} {:-<12} {:-<10} {:-<4}\n",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>5} {:>10.3} {:>12.2} {:>14.6e} {:>12.3e} {:>10.3} {:<4}\n",
                r.index,
                r.temperature,
                r.field,
                r.value,
                r.error,
                r.center,
                if r.jump_corrected { "yes" } else { "" }
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Scan info and fit coefficients of one datapoint.
pub fn format_point_details(index: usize, point: &MeasurementDataPoint) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Datapoint {index}: T={:.3} K, H={:.2} Oe, t={}\n",
        point.temperature(),
        point.field(),
        point.timestamp()
    ));

    if let Some(scan) = point.sample() {
        out.push_str(&format_scan("sample", scan));
    }
    if let Some(scan) = point.background() {
        out.push_str(&format_scan("background", scan));
    }

    for target in [FitTarget::Sample, FitTarget::Background, FitTarget::Combined] {
        if let Some(fit) = point.fit(target) {
            out.push_str(&format_fit(target, fit));
        }
    }
    out
}

fn format_scan(label: &str, scan: &RawScanPoint) -> String {
    let info = scan.info();
    format!(
        "- {label} scan: {} rows, {}, squid range={}, given center={:.3} mm, calculated center={:.3} mm{}\n",
        scan.len(),
        scan.direction().label(),
        info.squid_range,
        info.given_center,
        info.calculated_center,
        if scan.is_jump_corrected() { ", jump-corrected" } else { "" }
    )
}

fn format_fit(target: FitTarget, fit: &ScanFitResult) -> String {
    let mut out = format!("\n{target:?} fit (p0 = {}):\n", fmt_vec(&fit.initial_params));
    out.push_str(&format!(
        "  free : moment={:.6e} ± {:.3e} emu | {}\n",
        fit.moment,
        fit.moment_err,
        fmt_coefficients(&fit.free, &["A", "S", "m", "C"])
    ));
    out.push_str(&format!(
        "  fixed: moment={:.6e} ± {:.3e} emu | {} | C={:.3}\n",
        fit.moment_fixed,
        fit.moment_fixed_err,
        fmt_coefficients(&fit.fixed, &["A", "S", "m"]),
        fit.fixed_center
    ));
    out
}

fn fmt_coefficients(fit: &SignalFit, names: &[&str]) -> String {
    let errs = fit.std_errors();
    let parts: Vec<String> = names
        .iter()
        .zip(fit.coefficients.iter().zip(errs))
        .map(|(name, (v, e))| format!("{name}={v:.5e}±{e:.2e}"))
        .collect();
    parts.join(" ")
}

/// Instrument constants, one per line.
pub fn format_constants(constants: &InstrumentConstants) -> String {
    format!(
        "coil radius          : {} mm\ncoil distance        : {} mm\nsystem calibration   : {}\nDC calibration factor: {}\n",
        constants.coil_radius, constants.coil_distance, constants.system_calibration, constants.dc_calibration_factor
    )
}

fn fmt_index(i: Option<usize>) -> String {
    i.map_or_else(|| "-".to_string(), |i| i.to_string())
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_header_rule_and_rows() {
        let rows = vec![
            PointRow {
                index: 0,
                temperature: 2.0,
                field: 1000.0,
                value: -1.5e-4,
                error: 2e-7,
                center: 35.1,
                jump_corrected: false,
            },
            PointRow {
                index: 1,
                temperature: 5.0,
                field: 1000.0,
                value: -6e-5,
                error: 1e-7,
                center: 35.0,
                jump_corrected: true,
            },
        ];
        let txt = format_point_table(&rows, Quantity::Moment, CenterMode::Free);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("magnetisation [emu]"));
        assert!(lines[2].starts_with("-----"));
        assert!(lines[3].contains("2.000"));
        assert!(lines[4].ends_with("yes"));
        assert!(!lines[3].ends_with(' '));
    }

    #[test]
    fn summary_lists_quantities_the_metadata_allows() {
        use crate::data::{SweepConfig, simulate_sweep};
        use crate::domain::MappingMode;

        let constants = InstrumentConstants::default();
        let config = SweepConfig {
            scans: 2,
            points_per_scan: 20,
            noise: 0.0,
            sample_mass: Some(12.0),
            ..SweepConfig::default()
        };
        let file = simulate_sweep(&constants, &config).unwrap();
        let m = Measurement::new(Some(file), None, MappingMode::Direct, constants).unwrap();

        let txt = format_measurement_summary(&m);
        let line = txt.lines().find(|l| l.starts_with("Quantities: ")).unwrap();
        assert_eq!(line, "Quantities: moment, mass-magnetization, mass-susceptibility");
    }

    #[test]
    fn constants_list_every_value() {
        let txt = format_constants(&InstrumentConstants::default());
        assert!(txt.contains("9.7 mm"));
        assert!(txt.contains("0.00285897"));
    }
}
