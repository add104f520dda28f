//! Command-line parsing for the SQUID scan fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::SweepConfig;
use crate::domain::{CenterMode, FitTarget, MappingMode, Quantity, XAxis};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sqs", version, about = "Gradiometer SQUID magnetometer scan fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every scan of a measurement, print the point table, and optionally plot/export.
    Fit(FitArgs),
    /// Inspect one datapoint: scan info, fit coefficients and a voltage plot.
    Scan(ScanArgs),
    /// Plot a previously exported curve JSON.
    Plot(PlotArgs),
    /// Store the sample density (g/cm^3) in a raw data file.
    SetDensity(MetadataArgs),
    /// Store the sample molar mass (g/mol) in a raw data file.
    SetMolarMass(MetadataArgs),
    /// Write a synthetic temperature sweep as a `.rw.dat` file.
    Simulate(SimulateArgs),
    /// Print the instrument constants in effect.
    Constants,
}

/// Files and pairing shared by `fit` and `scan`.
#[derive(Debug, Args, Clone)]
pub struct MeasurementArgs {
    /// Sample `.rw.dat` file.
    #[arg(short = 's', long, value_name = "RW_DAT")]
    pub sample: Option<PathBuf>,

    /// Background `.rw.dat` file.
    #[arg(short = 'b', long, value_name = "RW_DAT")]
    pub background: Option<PathBuf>,

    /// How sample scans are matched to background scans.
    #[arg(short = 'm', long, value_enum, default_value_t = MappingMode::Direct)]
    pub mode: MappingMode,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub measurement: MeasurementArgs,

    /// Independent variable of the curve.
    #[arg(short = 'x', long, value_enum, default_value_t = XAxis::Temperature)]
    pub axis: XAxis,

    /// Quantity on the y axis.
    #[arg(short = 'q', long, value_enum, default_value_t = Quantity::Moment)]
    pub quantity: Quantity,

    /// Use the free-center or the fixed-center fit.
    #[arg(short = 'c', long, value_enum, default_value_t = CenterMode::Free)]
    pub center: CenterMode,

    /// Plot 1/y instead of y.
    #[arg(long)]
    pub inverse: bool,

    /// Render an ASCII plot of the curve.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export one row per datapoint to a `.dat` file.
    #[arg(long = "export-dat", value_name = "DAT")]
    pub export_dat: Option<PathBuf>,

    /// Export every datapoint's sample, background and subtracted scans with
    /// their fitted curves to a `.rw.dat` file.
    #[arg(long = "export-raw", value_name = "RW_DAT")]
    pub export_raw: Option<PathBuf>,

    /// Export the plotted curve to JSON.
    #[arg(long = "export-curve", value_name = "JSON")]
    pub export_curve: Option<PathBuf>,

    /// Write a markdown debug bundle into this directory.
    #[arg(long, value_name = "DIR")]
    pub debug: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub measurement: MeasurementArgs,

    /// Datapoint index (0-based).
    #[arg(short = 'i', long)]
    pub index: Option<usize>,

    /// Pick the datapoint closest to this temperature (K) instead of by index.
    #[arg(long, conflicts_with = "index")]
    pub temperature: Option<f64>,

    /// Which signal to plot.
    #[arg(short = 't', long, value_enum, default_value_t = FitTarget::Combined)]
    pub target: FitTarget,

    /// Overlay the free-center or the fixed-center fit.
    #[arg(short = 'c', long, value_enum, default_value_t = CenterMode::Free)]
    pub center: CenterMode,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for plotting a saved curve.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Curve JSON file produced by `sqs fit --export-curve`.
    #[arg(long, value_name = "JSON")]
    pub curve: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct MetadataArgs {
    /// Raw data file to update in place.
    #[arg(value_name = "RW_DAT")]
    pub file: PathBuf,

    /// New value.
    pub value: f64,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output `.rw.dat` path.
    #[arg(short = 'o', long, value_name = "RW_DAT")]
    pub output: PathBuf,

    /// Number of scans.
    #[arg(long, default_value_t = 20)]
    pub scans: usize,

    /// Points per scan.
    #[arg(long, default_value_t = 64)]
    pub points: usize,

    /// First temperature (K).
    #[arg(long, default_value_t = 2.0)]
    pub temp_start: f64,

    /// Last temperature (K).
    #[arg(long, default_value_t = 300.0)]
    pub temp_end: f64,

    /// Applied field (Oe).
    #[arg(long, default_value_t = 1000.0)]
    pub field: f64,

    /// Amplitude at 1 K; the signal follows `curie / T`.
    #[arg(long, default_value_t = 10.0)]
    pub curie: f64,

    /// Sample center (mm).
    #[arg(long, default_value_t = 35.0)]
    pub center: f64,

    /// Constant voltage offset.
    #[arg(long, default_value_t = 0.0)]
    pub offset: f64,

    /// Gaussian noise sigma (V).
    #[arg(long, default_value_t = 1e-3)]
    pub noise: f64,

    /// SQUID range the raw voltages are divided by.
    #[arg(long, default_value_t = 1.0)]
    pub squid_range: f64,

    /// Scan length (mm).
    #[arg(long, default_value_t = 70.0)]
    pub travel: f64,

    /// Sample mass (mg) stored in the header.
    #[arg(long)]
    pub mass: Option<f64>,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl SimulateArgs {
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            path: self.output.clone(),
            scans: self.scans,
            points_per_scan: self.points,
            temp_start: self.temp_start,
            temp_end: self.temp_end,
            field: self.field,
            curie: self.curie,
            center: self.center,
            background: self.offset,
            noise: self.noise,
            squid_range: self.squid_range,
            travel: self.travel,
            sample_mass: self.mass,
            seed: self.seed,
        }
    }
}
