//! Shared domain types.
//!
//! These are small closed enumerations used by the measurement layer, the CLI
//! (via `clap::ValueEnum`) and the JSON exports (via `serde`).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Direction of the sample motion during one scan leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanDirection {
    Up,
    Down,
}

impl ScanDirection {
    pub fn label(self) -> &'static str {
        match self {
            ScanDirection::Up => "up",
            ScanDirection::Down => "down",
        }
    }
}

/// How sample scans are matched to background scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// Pair the i-th sample scan with the i-th background scan.
    Direct,
    /// Pair each sample scan with the closest background scan in
    /// temperature/field that was taken in the same direction.
    Indirect,
}

/// Which of the two fits of a scan a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CenterMode {
    Free,
    Fixed,
}

/// Independent variable of a magnetization curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XAxis {
    Temperature,
    Field,
}

impl XAxis {
    pub fn label(self) -> &'static str {
        match self {
            XAxis::Temperature => "Temperature [K]",
            XAxis::Field => "Field [Oe]",
        }
    }
}

/// Which fit record of a datapoint to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitTarget {
    Sample,
    Background,
    /// Background-subtracted signal (or the single available side).
    Combined,
}

/// Physical quantity derived from a fitted moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Quantity {
    /// Raw moment in emu.
    Moment,
    /// Moment in Bohr magnetons per formula unit.
    MomentBohr,
    /// emu/g
    MassMagnetization,
    /// emu/mol
    MolarMagnetization,
    /// emu/(cm^3 Oe)
    VolumeSusceptibility,
    /// emu/(g Oe)
    MassSusceptibility,
    /// emu/(mol Oe)
    MolarSusceptibility,
}

impl Quantity {
    pub const ALL: [Quantity; 7] = [
        Quantity::Moment,
        Quantity::MomentBohr,
        Quantity::MassMagnetization,
        Quantity::MolarMagnetization,
        Quantity::VolumeSusceptibility,
        Quantity::MassSusceptibility,
        Quantity::MolarSusceptibility,
    ];

    /// Axis label, optionally for the inverted quantity.
    pub fn label(self, inverse: bool) -> &'static str {
        match (self, inverse) {
            (Quantity::Moment, false) => "magnetisation [emu]",
            (Quantity::Moment, true) => "inverse magnetisation [1/emu]",
            (Quantity::MomentBohr, false) => "magnetisation [mu_B/f.u.]",
            (Quantity::MomentBohr, true) => "inverse magnetisation [f.u./mu_B]",
            (Quantity::MassMagnetization, false) => "magnetisation [emu/g]",
            (Quantity::MassMagnetization, true) => "inverse magnetisation [g/emu]",
            (Quantity::MolarMagnetization, false) => "magnetisation [emu/mol]",
            (Quantity::MolarMagnetization, true) => "inverse magnetisation [mol/emu]",
            (Quantity::VolumeSusceptibility, false) => "susceptibility [emu/cm^3]",
            (Quantity::VolumeSusceptibility, true) => "inverse susceptibility [cm^3/emu]",
            (Quantity::MassSusceptibility, false) => "susceptibility [emu/g]",
            (Quantity::MassSusceptibility, true) => "inverse susceptibility [g/emu]",
            (Quantity::MolarSusceptibility, false) => "susceptibility [emu/mol]",
            (Quantity::MolarSusceptibility, true) => "inverse susceptibility [mol/emu]",
        }
    }
}
