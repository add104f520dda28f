//! One measurement point: a sample scan, a background scan, or both.

use std::sync::Arc;

use thiserror::Error;

use crate::config::InstrumentConstants;
use crate::data::RawScanPoint;
use crate::domain::{CenterMode, FitTarget};
use crate::fit::{FitError, ScanFitResult, Signal, SubtractError, subtract_background};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DatapointError {
    #[error("datapoint needs a sample or a background scan")]
    NoScans,

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Subtract(#[from] SubtractError),
}

#[derive(Debug, Clone)]
pub struct MeasurementDataPoint {
    primary: Arc<RawScanPoint>,
    sample: Option<Arc<RawScanPoint>>,
    background: Option<Arc<RawScanPoint>>,
    sample_fit: Option<ScanFitResult>,
    background_fit: Option<ScanFitResult>,
    combined_fit: ScanFitResult,
}

impl MeasurementDataPoint {
    /// Fit every available signal.
    ///
    /// With both scans present the combined fit is of `sample − background`
    /// on their common grid, with the center fixed at the mean of the two
    /// given centers. With one scan the combined fit is that scan's fit.
    pub fn build(
        sample: Option<Arc<RawScanPoint>>,
        background: Option<Arc<RawScanPoint>>,
        constants: &InstrumentConstants,
    ) -> Result<Self, DatapointError> {
        let fit_one = |scan: &RawScanPoint| {
            ScanFitResult::compute(constants, &scan.positions(), &scan.raw_voltages(), scan.given_center())
        };

        let primary = sample
            .as_ref()
            .or(background.as_ref())
            .cloned()
            .ok_or(DatapointError::NoScans)?;
        let sample_fit = sample.as_deref().map(|s| fit_one(s)).transpose()?;
        let background_fit = background.as_deref().map(|b| fit_one(b)).transpose()?;

        let combined_fit = match (&sample, &background, &sample_fit, &background_fit) {
            (Some(s), Some(b), _, _) => {
                let (sp, sv) = (s.positions(), s.raw_voltages());
                let (bp, bv) = (b.positions(), b.raw_voltages());
                let (grid, diff) = subtract_background(Signal::new(&sp, &sv), Signal::new(&bp, &bv))?;
                let center = (s.given_center() + b.given_center()) / 2.0;
                ScanFitResult::compute(constants, &grid, &diff, center)?
            }
            (_, _, Some(fit), None) | (_, _, None, Some(fit)) => fit.clone(),
            _ => return Err(DatapointError::NoScans),
        };

        Ok(Self {
            primary,
            sample,
            background,
            sample_fit,
            background_fit,
            combined_fit,
        })
    }

    pub fn sample(&self) -> Option<&Arc<RawScanPoint>> {
        self.sample.as_ref()
    }

    pub fn background(&self) -> Option<&Arc<RawScanPoint>> {
        self.background.as_ref()
    }

    /// The scan that defines temperature, field and time of this point:
    /// the sample scan, or the background scan for background-only points.
    pub fn primary_scan(&self) -> &RawScanPoint {
        &self.primary
    }

    pub fn fit(&self, target: FitTarget) -> Option<&ScanFitResult> {
        match target {
            FitTarget::Sample => self.sample_fit.as_ref(),
            FitTarget::Background => self.background_fit.as_ref(),
            FitTarget::Combined => Some(&self.combined_fit),
        }
    }

    pub fn combined(&self) -> &ScanFitResult {
        &self.combined_fit
    }

    /// Positions and voltages that `fit(target)` was computed from.
    pub fn signal(&self, target: FitTarget) -> Result<Option<(Vec<f64>, Vec<f64>)>, DatapointError> {
        let raw = |scan: &RawScanPoint| (scan.positions(), scan.raw_voltages());
        match target {
            FitTarget::Sample => Ok(self.sample.as_deref().map(raw)),
            FitTarget::Background => Ok(self.background.as_deref().map(raw)),
            FitTarget::Combined => match (&self.sample, &self.background) {
                (Some(s), Some(b)) => {
                    let (sp, sv) = raw(s.as_ref());
                    let (bp, bv) = raw(b.as_ref());
                    Ok(Some(subtract_background(Signal::new(&sp, &sv), Signal::new(&bp, &bv))?))
                }
                _ => Ok(Some(raw(self.primary.as_ref()))),
            },
        }
    }

    pub fn temperature(&self) -> f64 {
        self.primary_scan().temperature()
    }

    pub fn field(&self) -> f64 {
        self.primary_scan().field()
    }

    pub fn timestamp(&self) -> f64 {
        self.primary_scan().last_timestamp()
    }

    pub fn moment(&self, center: CenterMode) -> f64 {
        self.combined_fit.moment(center)
    }

    pub fn moment_err(&self, center: CenterMode) -> f64 {
        self.combined_fit.moment_err(center)
    }

    pub fn is_jump_corrected(&self) -> bool {
        self.sample.as_ref().is_some_and(|s| s.is_jump_corrected())
            || self.background.as_ref().is_some_and(|b| b.is_jump_corrected())
    }
}
