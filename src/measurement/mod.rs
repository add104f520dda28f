//! Measurements: paired, fitted scans of one sample file.
//!
//! Responsibilities:
//!
//! - pair sample scans with background scans (`pairing`)
//! - fit every pair in parallel while keeping pairing order (`datapoint`)
//! - expose temperatures, fields, moments and derived quantities, for all
//!   points or an index subset (`quantity`)
//! - nearest-point lookup on a normalized curve
//! - hold several measurements (`container`)

use std::path::Path;

use rayon::prelude::*;

use crate::config::InstrumentConstants;
use crate::data::RawDataFile;
use crate::domain::{CenterMode, MappingMode, Quantity, XAxis};
use crate::error::AppError;

pub mod container;
pub mod datapoint;
pub mod pairing;
pub mod quantity;

pub use container::*;
pub use datapoint::*;
pub use pairing::*;
pub use quantity::*;

/// A pair that could not be turned into a datapoint.
#[derive(Debug, Clone)]
pub struct FitFailure {
    pub pair: ScanPair,
    pub error: DatapointError,
}

#[derive(Debug, Clone)]
pub struct Measurement {
    name: String,
    sample: Option<RawDataFile>,
    background: Option<RawDataFile>,
    mode: MappingMode,
    constants: InstrumentConstants,
    points: Vec<MeasurementDataPoint>,
    pairs: Vec<ScanPair>,
    non_matching: usize,
    fit_failures: Vec<FitFailure>,
}

impl Measurement {
    /// Pair and fit. At least one of the two files is required.
    pub fn new(
        sample: Option<RawDataFile>,
        background: Option<RawDataFile>,
        mode: MappingMode,
        constants: InstrumentConstants,
    ) -> Result<Self, AppError> {
        let name = match (&sample, &background) {
            (Some(s), _) => s.file_name(),
            (None, Some(b)) => b.file_name(),
            (None, None) => {
                return Err(AppError::InvalidArgument(
                    "a measurement needs a sample or a background file".to_string(),
                ));
            }
        };
        constants.validate()?;

        let mut measurement = Self {
            name,
            sample,
            background,
            mode,
            constants,
            points: Vec::new(),
            pairs: Vec::new(),
            non_matching: 0,
            fit_failures: Vec::new(),
        };
        measurement.rebuild();
        Ok(measurement)
    }

    /// Load the files from disk, then pair and fit.
    pub fn load(
        sample: Option<&Path>,
        background: Option<&Path>,
        mode: MappingMode,
        constants: InstrumentConstants,
    ) -> Result<Self, AppError> {
        let sample = sample.map(RawDataFile::load).transpose()?;
        let background = background.map(RawDataFile::load).transpose()?;
        Self::new(sample, background, mode, constants)
    }

    fn rebuild(&mut self) {
        let sample_keys: Option<Vec<ScanKey>> = self
            .sample
            .as_ref()
            .map(|f| f.scans().iter().map(|s| ScanKey::from(s.as_ref())).collect());
        let background_keys: Option<Vec<ScanKey>> = self
            .background
            .as_ref()
            .map(|f| f.scans().iter().map(|s| ScanKey::from(s.as_ref())).collect());
        let pairing = pair_scans(sample_keys.as_deref(), background_keys.as_deref(), self.mode);

        let sample = self.sample.as_ref();
        let background = self.background.as_ref();
        let constants = &self.constants;

        // Each pair is independent; collect keeps pairing order.
        let results: Vec<(ScanPair, Result<MeasurementDataPoint, DatapointError>)> = pairing
            .pairs
            .par_iter()
            .map(|pair| {
                let s = pair.sample.and_then(|i| sample.map(|f| f.scans()[i].clone()));
                let b = pair.background.and_then(|i| background.map(|f| f.scans()[i].clone()));
                (*pair, MeasurementDataPoint::build(s, b, constants))
            })
            .collect();

        self.points.clear();
        self.pairs.clear();
        self.fit_failures.clear();
        for (pair, result) in results {
            match result {
                Ok(point) => {
                    self.points.push(point);
                    self.pairs.push(pair);
                }
                Err(error) => {
                    log::warn!(
                        "{}: dropping pair (sample {:?}, background {:?}): {error}",
                        self.name,
                        pair.sample,
                        pair.background
                    );
                    self.fit_failures.push(FitFailure { pair, error });
                }
            }
        }
        self.non_matching = pairing.non_matching;

        log::info!(
            "{}: {} datapoints, {} non-matching, {} fit failures",
            self.name,
            self.points.len(),
            self.non_matching,
            self.fit_failures.len()
        );
    }

    /// Replace (or remove) the background; re-pairs and re-fits everything.
    pub fn set_background(&mut self, background: Option<RawDataFile>) -> Result<(), AppError> {
        if self.sample.is_none() && background.is_none() {
            return Err(AppError::InvalidArgument(
                "cannot remove the background of a background-only measurement".to_string(),
            ));
        }
        self.background = background;
        if let (None, Some(b)) = (&self.sample, &self.background) {
            self.name = b.file_name();
        }
        self.rebuild();
        Ok(())
    }

    pub fn set_mapping_mode(&mut self, mode: MappingMode) {
        if mode != self.mode {
            self.mode = mode;
            self.rebuild();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_file(&self) -> Option<&RawDataFile> {
        self.sample.as_ref()
    }

    pub fn sample_file_mut(&mut self) -> Option<&mut RawDataFile> {
        self.sample.as_mut()
    }

    pub fn background_file(&self) -> Option<&RawDataFile> {
        self.background.as_ref()
    }

    /// The file whose metadata describes the sample.
    pub fn metadata_file(&self) -> Option<&RawDataFile> {
        self.sample.as_ref().or(self.background.as_ref())
    }

    pub fn mapping_mode(&self) -> MappingMode {
        self.mode
    }

    pub fn constants(&self) -> &InstrumentConstants {
        &self.constants
    }

    pub fn datapoints(&self) -> &[MeasurementDataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn datapoint(&self, index: usize) -> Result<&MeasurementDataPoint, AppError> {
        self.points.get(index).ok_or(AppError::IndexOutOfRange {
            index,
            len: self.points.len(),
        })
    }

    /// Scan indices behind each datapoint.
    pub fn pairs(&self) -> &[ScanPair] {
        &self.pairs
    }

    pub fn non_matching(&self) -> usize {
        self.non_matching
    }

    pub fn fit_failures(&self) -> &[FitFailure] {
        &self.fit_failures
    }

    /// Jump-corrected scans behind the datapoints, counting the sample and the
    /// background scan of each point separately.
    pub fn jump_corrected_count(&self) -> usize {
        self.points
            .iter()
            .map(|p| {
                let sample = p.sample().is_some_and(|s| s.is_jump_corrected());
                let background = p.background().is_some_and(|b| b.is_jump_corrected());
                usize::from(sample) + usize::from(background)
            })
            .sum()
    }

    /// Datapoints at `indices` (all of them for `None`).
    pub fn select(&self, indices: Option<&[usize]>) -> Result<Vec<&MeasurementDataPoint>, AppError> {
        match indices {
            None => Ok(self.points.iter().collect()),
            Some(idx) => idx.iter().map(|&i| self.datapoint(i)).collect(),
        }
    }

    fn map_points<F>(&self, indices: Option<&[usize]>, f: F) -> Result<Vec<f64>, AppError>
    where
        F: Fn(&MeasurementDataPoint) -> f64,
    {
        Ok(self.select(indices)?.into_iter().map(f).collect())
    }

    pub fn temperatures(&self, indices: Option<&[usize]>) -> Result<Vec<f64>, AppError> {
        self.map_points(indices, MeasurementDataPoint::temperature)
    }

    pub fn fields(&self, indices: Option<&[usize]>) -> Result<Vec<f64>, AppError> {
        self.map_points(indices, MeasurementDataPoint::field)
    }

    pub fn timestamps(&self, indices: Option<&[usize]>) -> Result<Vec<f64>, AppError> {
        self.map_points(indices, MeasurementDataPoint::timestamp)
    }

    pub fn x_values(&self, axis: XAxis, indices: Option<&[usize]>) -> Result<Vec<f64>, AppError> {
        match axis {
            XAxis::Temperature => self.temperatures(indices),
            XAxis::Field => self.fields(indices),
        }
    }

    pub fn moments(&self, center: CenterMode, indices: Option<&[usize]>) -> Result<Vec<f64>, AppError> {
        self.map_points(indices, |p| p.moment(center))
    }

    pub fn moment_errors(&self, center: CenterMode, indices: Option<&[usize]>) -> Result<Vec<f64>, AppError> {
        self.map_points(indices, |p| p.moment_err(center))
    }

    /// Fitted (free) or given (fixed) centers of the combined fits.
    pub fn centers(&self, center: CenterMode, indices: Option<&[usize]>) -> Result<Vec<f64>, AppError> {
        self.map_points(indices, |p| p.combined().center(center))
    }

    fn properties(&self, quantity: Quantity) -> Result<SampleProperties, AppError> {
        match self.metadata_file() {
            Some(file) => sample_properties(file, quantity),
            None => Ok(SampleProperties::default()),
        }
    }

    /// `quantity` for each selected point, optionally inverted (`1/y`).
    pub fn quantity(
        &self,
        quantity: Quantity,
        center: CenterMode,
        inverse: bool,
        indices: Option<&[usize]>,
    ) -> Result<Vec<f64>, AppError> {
        let props = self.properties(quantity)?;
        self.map_points(indices, |p| {
            let y = convert(quantity, p.moment(center), p.field(), &props);
            if inverse { 1.0 / y } else { y }
        })
    }

    /// One-sigma uncertainty of `quantity` (not inverted).
    pub fn quantity_errors(
        &self,
        quantity: Quantity,
        center: CenterMode,
        indices: Option<&[usize]>,
    ) -> Result<Vec<f64>, AppError> {
        let props = self.properties(quantity)?;
        self.map_points(indices, |p| convert(quantity, p.moment_err(center), p.field(), &props).abs())
    }

    /// Datapoint closest to `(x, y)` on the normalized curve.
    ///
    /// Both axes are min-max normalized over the candidates. Returns the
    /// position within `candidates` and the datapoint index.
    #[allow(clippy::too_many_arguments)]
    pub fn nearest_point(
        &self,
        x: f64,
        y: f64,
        axis: XAxis,
        quantity: Quantity,
        center: CenterMode,
        inverse: bool,
        candidates: Option<&[usize]>,
    ) -> Result<Option<(usize, usize)>, AppError> {
        let xs = self.x_values(axis, candidates)?;
        let ys = self.quantity(quantity, center, inverse, candidates)?;

        let Some(pos) = nearest_normalized(&xs, &ys, x, y) else {
            return Ok(None);
        };
        let index = candidates.map_or(pos, |c| c[pos]);
        Ok(Some((pos, index)))
    }
}

/// Argmin of the Euclidean distance after min-max normalizing each axis.
///
/// Zero-range axes use unit scale; NaN distances never win; ties keep the
/// first point.
pub fn nearest_normalized(xs: &[f64], ys: &[f64], x: f64, y: f64) -> Option<usize> {
    let (x_lo, x_scale) = axis_scale(xs);
    let (y_lo, y_scale) = axis_scale(ys);
    let tx = (x - x_lo) / x_scale;
    let ty = (y - y_lo) / y_scale;

    let mut best: Option<(usize, f64)> = None;
    for (i, (&px, &py)) in xs.iter().zip(ys).enumerate() {
        let dx = (px - x_lo) / x_scale - tx;
        let dy = (py - y_lo) / y_scale - ty;
        let d = (dx * dx + dy * dy).sqrt();
        if d.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

fn axis_scale(values: &[f64]) -> (f64, f64) {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let lo = finite.clone().fold(f64::INFINITY, f64::min);
    let hi = finite.fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let range = hi - lo;
    (lo, if range > 0.0 { range } else { 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::data::{MetadataKey, RawScanPoint, ScanInfo, ScanRow};
    use crate::domain::FitTarget;
    use crate::math::linspace;
    use crate::models::Gradiometer;

    fn scan(temp: f64, field: f64, amplitude: f64, offset: f64, down: bool) -> RawScanPoint {
        stepped_scan(temp, field, amplitude, offset, down, 0.0)
    }

    /// Like `scan`, with `step` volts added to the second half of the rows.
    fn stepped_scan(temp: f64, field: f64, amplitude: f64, offset: f64, down: bool, step: f64) -> RawScanPoint {
        let coil = Gradiometer::from_constants(&InstrumentConstants::default());
        let mut rows: Vec<ScanRow> = linspace(0.0, 70.0, 50)
            .into_iter()
            .enumerate()
            .map(|(i, z)| {
                let jump = if i >= 25 { step } else { 0.0 };
                let v = coil.voltage(z, amplitude, offset, 0.0, 35.0) + jump;
                ScanRow {
                    timestamp: 100.0 * temp + i as f64,
                    position: z,
                    voltage: v,
                    processed: v,
                }
            })
            .collect();
        if down {
            rows.reverse();
        }
        let info = ScanInfo {
            low_temp: temp,
            high_temp: temp,
            avg_temp: temp,
            low_field: field,
            high_field: field,
            drift: 0.0,
            slope: 0.0,
            squid_range: 1.0,
            given_center: 35.0,
            calculated_center: 35.0,
            amp_fixed: 0.0,
            amp_free: 0.0,
        };
        RawScanPoint::new(info, rows).unwrap()
    }

    fn file(name: &str, temps: &[f64], amplitude: f64, offset: f64, mass: Option<&str>) -> RawDataFile {
        let scans = temps
            .iter()
            .enumerate()
            .map(|(i, &t)| scan(t, 1000.0, amplitude / t, offset, i % 2 == 1))
            .collect();
        let mut meta = BTreeMap::new();
        if let Some(m) = mass {
            meta.insert(MetadataKey::SampleMass, m.to_string());
        }
        RawDataFile::from_parts(name, name, scans, meta).unwrap()
    }

    fn measurement(mode: MappingMode, bg_temps: &[f64]) -> Measurement {
        let sample = file("sample.rw.dat", &[2.0, 5.0, 10.0], 1.0, 0.01, Some("4.0"));
        let background = file("bg.rw.dat", bg_temps, 0.0, 0.01, None);
        Measurement::new(Some(sample), Some(background), mode, InstrumentConstants::default()).unwrap()
    }

    #[test]
    fn direct_measurement_pairs_every_scan() {
        let m = measurement(MappingMode::Direct, &[2.0, 5.0, 10.0]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.non_matching(), 0);
        assert!(m.fit_failures().is_empty());
        assert_eq!(m.name(), "sample.rw.dat");
        assert_eq!(m.temperatures(None).unwrap(), vec![2.0, 5.0, 10.0]);

        let constants = InstrumentConstants::default();
        let moments = m.moments(CenterMode::Fixed, None).unwrap();
        for (t, moment) in [2.0, 5.0, 10.0].iter().zip(&moments) {
            let expected = constants.amplitude_to_moment(1.0 / t);
            assert!((moment - expected).abs() < 1e-6 * expected.abs(), "{moment} vs {expected}");
        }
    }

    #[test]
    fn perturbed_background_drops_one_point() {
        let m = measurement(MappingMode::Direct, &[2.0, 6.0, 10.0]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.non_matching(), 1);
        assert_eq!(m.temperatures(None).unwrap(), vec![2.0, 10.0]);
    }

    fn sample_with_jump() -> RawDataFile {
        let scans = [2.0, 5.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let step = if i == 1 { 5.0 } else { 0.0 };
                stepped_scan(t, 1000.0, 1.0 / t, 0.01, i % 2 == 1, step)
            })
            .collect();
        let mut meta = BTreeMap::new();
        meta.insert(MetadataKey::SampleMass, "4.0".to_string());
        RawDataFile::from_parts("sample.rw.dat", "sample.rw.dat", scans, meta).unwrap()
    }

    #[test]
    fn unpaired_jump_corrected_scan_is_not_counted() {
        let sample = sample_with_jump();
        assert!(sample.scans()[1].is_jump_corrected());
        let background = file("bg.rw.dat", &[2.0, 6.0, 10.0], 0.0, 0.01, None);

        let m = Measurement::new(Some(sample), Some(background), MappingMode::Direct, InstrumentConstants::default())
            .unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.non_matching(), 1);
        assert_eq!(m.jump_corrected_count(), 0);
    }

    #[test]
    fn paired_jump_corrected_scan_is_counted_once() {
        let background = file("bg.rw.dat", &[2.0, 5.0, 10.0], 0.0, 0.01, None);
        let m = Measurement::new(
            Some(sample_with_jump()),
            Some(background),
            MappingMode::Direct,
            InstrumentConstants::default(),
        )
        .unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.jump_corrected_count(), 1);
        assert!(m.datapoint(1).unwrap().is_jump_corrected());
    }

    #[test]
    fn subset_accessors_and_bounds() {
        let m = measurement(MappingMode::Indirect, &[2.0, 5.0, 10.0]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.temperatures(Some(&[2, 0])).unwrap(), vec![10.0, 2.0]);
        assert!(matches!(
            m.fields(Some(&[3])),
            Err(AppError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert_eq!(m.jump_corrected_count(), 0);
    }

    #[test]
    fn quantities_need_their_metadata() {
        let m = measurement(MappingMode::Direct, &[2.0, 5.0, 10.0]);
        let moments = m.moments(CenterMode::Free, None).unwrap();
        let mass_mag = m
            .quantity(Quantity::MassMagnetization, CenterMode::Free, false, None)
            .unwrap();
        for (mm, moment) in mass_mag.iter().zip(&moments) {
            assert!((mm - 1000.0 * moment / 4.0).abs() < 1e-12);
        }
        let inverse = m.quantity(Quantity::Moment, CenterMode::Free, true, Some(&[0])).unwrap();
        assert!((inverse[0] * moments[0] - 1.0).abs() < 1e-12);

        assert!(matches!(
            m.quantity(Quantity::MolarSusceptibility, CenterMode::Free, false, None),
            Err(AppError::MissingMetadata { .. })
        ));
    }

    #[test]
    fn nearest_point_uses_normalized_axes() {
        let m = measurement(MappingMode::Direct, &[2.0, 5.0, 10.0]);
        let ys = m.moments(CenterMode::Free, None).unwrap();
        let hit = m
            .nearest_point(9.0, ys[2], XAxis::Temperature, Quantity::Moment, CenterMode::Free, false, None)
            .unwrap();
        assert_eq!(hit, Some((2, 2)));

        let hit = m
            .nearest_point(2.5, ys[0], XAxis::Temperature, Quantity::Moment, CenterMode::Free, false, Some(&[1, 0]))
            .unwrap();
        assert_eq!(hit, Some((1, 0)));
    }

    #[test]
    fn nearest_normalized_handles_flat_axes_and_nan() {
        let xs = [1.0, 1.0, 1.0];
        let ys = [f64::NAN, 2.0, 3.0];
        assert_eq!(nearest_normalized(&xs, &ys, 1.0, 2.9), Some(2));
        assert_eq!(nearest_normalized(&[], &[], 0.0, 0.0), None);
    }

    #[test]
    fn background_only_measurement_uses_background_scans() {
        let background = file("bg.rw.dat", &[3.0, 4.0], 0.5, 0.0, None);
        let mut m = Measurement::new(None, Some(background), MappingMode::Direct, InstrumentConstants::default())
            .unwrap();
        assert_eq!(m.name(), "bg.rw.dat");
        assert_eq!(m.temperatures(None).unwrap(), vec![3.0, 4.0]);
        assert!(m.datapoint(0).unwrap().fit(FitTarget::Sample).is_none());
        assert!(m.set_background(None).is_err());
    }

    #[test]
    fn replacing_the_background_refits() {
        let mut m = measurement(MappingMode::Direct, &[2.0, 6.0, 10.0]);
        assert_eq!(m.len(), 2);
        m.set_background(Some(file("bg2.rw.dat", &[2.0, 5.0, 10.0], 0.0, 0.01, None)))
            .unwrap();
        assert_eq!(m.len(), 3);
        m.set_background(None).unwrap();
        assert_eq!(m.len(), 3);
        assert!(m.datapoint(0).unwrap().background().is_none());
    }
}
