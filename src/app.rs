//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads instrument constants
//! - loads, pairs and fits scan files
//! - prints reports/plots
//! - writes optional exports and metadata edits

use clap::Parser;

use crate::cli::{Command, FitArgs, MetadataArgs, PlotArgs, ScanArgs, SimulateArgs};
use crate::config::InstrumentConstants;
use crate::data::{MetadataKey, RawDataFile, simulate_sweep};
use crate::domain::FitTarget;
use crate::error::AppError;
use crate::math::linspace;
use crate::models::Gradiometer;

pub mod pipeline;

/// Points of the fitted overlay in `sqs scan`.
const OVERLAY_POINTS: usize = 200;

/// Entry point for the `sqs` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Scan(args) => handle_scan(args),
        Command::Plot(args) => handle_plot(args),
        Command::SetDensity(args) => handle_set_metadata(
            args,
            MetadataKey::SampleDensity,
            RawDataFile::set_sample_density,
        ),
        Command::SetMolarMass(args) => handle_set_metadata(
            args,
            MetadataKey::SampleMolarMass,
            RawDataFile::set_sample_molar_mass,
        ),
        Command::Simulate(args) => handle_simulate(args),
        Command::Constants => handle_constants(),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let constants = InstrumentConstants::from_env()?;
    let run = pipeline::run_fit(&args, constants)?;

    println!("{}", crate::report::format_measurement_summary(&run.measurement));
    println!(
        "{}",
        crate::report::format_point_table(&run.rows, args.quantity, args.center)
    );

    if args.plot {
        println!(
            "{}",
            crate::plot::render_curve_file_plot(&run.curve, args.width, args.height)
        );
    }

    // Optional exports.
    if let Some(path) = &args.export_dat {
        crate::io::write_measurement_dat(path, &run.measurement)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &args.export_raw {
        crate::io::write_measurement_raw(path, &run.measurement)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &args.export_curve {
        crate::io::write_curve_json(path, &run.curve)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(dir) = &args.debug {
        let path = crate::debug::write_debug_bundle(&run.measurement, dir)?;
        println!("Debug bundle: {}", path.display());
    }

    Ok(())
}

fn handle_scan(args: ScanArgs) -> Result<(), AppError> {
    let constants = InstrumentConstants::from_env()?;
    let measurement = pipeline::load_measurement(&args.measurement, constants)?;
    let index = pipeline::pick_datapoint(&measurement, args.index, args.temperature)?;
    let point = measurement.datapoint(index)?;

    println!("{}", crate::report::format_point_details(index, point));

    let fit = point.fit(args.target).ok_or_else(|| {
        AppError::InvalidArgument(format!("datapoint {index} has no {:?} scan", args.target))
    })?;
    let (positions, voltages) = point
        .signal(args.target)
        .map_err(|e| AppError::InvalidArgument(e.to_string()))?
        .ok_or_else(|| {
            AppError::InvalidArgument(format!("datapoint {index} has no {:?} scan", args.target))
        })?;

    let lo = positions.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = positions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let coil = Gradiometer::from_constants(&constants);
    let fitted: Vec<(f64, f64)> = if lo < hi {
        linspace(lo, hi, OVERLAY_POINTS)
            .into_iter()
            .map(|z| (z, fit.predict(&coil, z, args.center)))
            .collect()
    } else {
        Vec::new()
    };

    let title = match args.target {
        FitTarget::Combined => "sample - background",
        FitTarget::Sample => "sample",
        FitTarget::Background => "background",
    };
    println!("Voltage vs position ({title}, {:?} center fit)", args.center);
    println!(
        "{}",
        crate::plot::render_scan_plot(
            &positions,
            &voltages,
            Some(fitted.as_slice()),
            args.width,
            args.height,
        )
    );
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let curve = crate::io::read_curve_json(&args.curve)?;
    let plot = crate::plot::render_curve_file_plot(&curve, args.width, args.height);

    println!("{plot}");
    Ok(())
}

fn handle_set_metadata(
    args: MetadataArgs,
    key: MetadataKey,
    set: fn(&mut RawDataFile, f64) -> Result<(), AppError>,
) -> Result<(), AppError> {
    let mut file = RawDataFile::load(&args.file)?;
    set(&mut file, args.value)?;
    println!("{}: {} = {:.3}", file.file_name(), key.label(), args.value);
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let constants = InstrumentConstants::from_env()?;
    let config = args.sweep_config();
    let file = simulate_sweep(&constants, &config)?;
    crate::io::write_raw_file(&config.path, &file)?;
    println!("Wrote {} scans to {}", file.len(), config.path.display());
    Ok(())
}

fn handle_constants() -> Result<(), AppError> {
    let constants = InstrumentConstants::from_env()?;
    print!("{}", crate::report::format_constants(&constants));
    Ok(())
}
