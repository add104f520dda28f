//! Conversion of fitted moments into derived physical quantities.

use crate::data::{MetadataKey, RawDataFile};
use crate::domain::Quantity;
use crate::error::AppError;

/// Bohr magneton in emu, scaled so that `1000·m·M/(mass·BOHR)` gives μB/f.u.
pub const BOHR_MAGNETON_EMU: f64 = 5585.0;

/// Sample properties a conversion may need; unset when not required.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleProperties {
    /// mg
    pub mass: Option<f64>,
    /// g/mol
    pub molar_mass: Option<f64>,
    /// g/cm³
    pub density: Option<f64>,
}

/// Metadata a quantity cannot be computed without.
pub fn required_metadata(quantity: Quantity) -> &'static [MetadataKey] {
    use MetadataKey::*;
    match quantity {
        Quantity::Moment => &[],
        Quantity::MomentBohr | Quantity::MolarMagnetization | Quantity::MolarSusceptibility => {
            &[SampleMass, SampleMolarMass]
        }
        Quantity::MassMagnetization | Quantity::MassSusceptibility => &[SampleMass],
        Quantity::VolumeSusceptibility => &[SampleMass, SampleDensity],
    }
}

/// Collect (and validate) the properties `quantity` needs from `file`.
pub fn sample_properties(file: &RawDataFile, quantity: Quantity) -> Result<SampleProperties, AppError> {
    let mut props = SampleProperties::default();
    for &key in required_metadata(quantity) {
        let value = file.require_number(key)?;
        match key {
            MetadataKey::SampleMass => props.mass = Some(value),
            MetadataKey::SampleMolarMass => props.molar_mass = Some(value),
            MetadataKey::SampleDensity => props.density = Some(value),
            _ => {}
        }
    }
    Ok(props)
}

/// `quantity` for one point with moment `moment` (emu) at `field` (Oe).
///
/// Missing properties yield `NaN`; check them with `sample_properties` first.
pub fn convert(quantity: Quantity, moment: f64, field: f64, props: &SampleProperties) -> f64 {
    let mass = props.mass.unwrap_or(f64::NAN);
    let molar = props.molar_mass.unwrap_or(f64::NAN);
    let density = props.density.unwrap_or(f64::NAN);

    match quantity {
        Quantity::Moment => moment,
        Quantity::MomentBohr => 1000.0 * moment * molar / (mass * BOHR_MAGNETON_EMU),
        Quantity::MassMagnetization => 1000.0 * moment / mass,
        Quantity::MolarMagnetization => moment / (mass / (1000.0 * molar)),
        Quantity::VolumeSusceptibility => moment / (mass / (1000.0 * density) * field),
        Quantity::MassSusceptibility => 1000.0 * moment / (mass * field),
        Quantity::MolarSusceptibility => molar * 1000.0 * moment / (mass * field),
    }
}
