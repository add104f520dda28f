//! Fitting a single voltage-vs-position scan to the gradiometer model.
//!
//! Given:
//! - positions `z_i` (mm)
//! - voltages `V_i` (V, already scaled by the SQUID range)
//! - an initial guess `[A, S, m, C]`
//!
//! we run Levenberg–Marquardt against either the free-center or the
//! fixed-center variant of the model and convert the fitted amplitude into a
//! magnetic moment using the instrument calibration.
//!
//! A failed fit is an ordinary outcome (`FitError`), not a crash: callers drop
//! the affected scan pair and carry on.

use nalgebra::DMatrix;
use thiserror::Error;

use crate::config::InstrumentConstants;
use crate::domain::CenterMode;
use crate::math::{LmOptions, levenberg_marquardt};
use crate::models::{Gradiometer, predict};

/// Default center guess (mm), roughly the middle of the instrument travel.
pub const DEFAULT_CENTER: f64 = 37.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FitError {
    #[error("no data points to fit")]
    EmptyInput,

    #[error("{positions} positions but {voltages} voltages")]
    LengthMismatch { positions: usize, voltages: usize },

    #[error("initial guess has {got} parameters, expected {expected}")]
    InitialGuess { expected: usize, got: usize },

    #[error("non-finite residuals or parameters")]
    NonFinite,

    #[error("no convergence after {evaluations} model evaluations")]
    NotConverged { evaluations: usize },
}

/// How the dipole center is treated during a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CenterFit {
    Free,
    Fixed(f64),
}

/// Raw least-squares output for one fit.
#[derive(Debug, Clone)]
pub struct SignalFit {
    /// `[A, S, m, C]` (free) or `[A, S, m]` (fixed).
    pub coefficients: Vec<f64>,
    pub covariance: DMatrix<f64>,
}

impl SignalFit {
    pub fn amplitude(&self) -> f64 {
        self.coefficients[0]
    }

    /// One-sigma uncertainty of the amplitude.
    pub fn amplitude_std(&self) -> f64 {
        self.covariance[(0, 0)].sqrt()
    }

    /// Standard deviations of all coefficients.
    pub fn std_errors(&self) -> Vec<f64> {
        (0..self.coefficients.len())
            .map(|i| self.covariance[(i, i)].sqrt())
            .collect()
    }
}

/// Default initial guess `[0, mean(V), 0, 37]`.
pub fn default_initial_params(voltage: &[f64], center: f64) -> Vec<f64> {
    let mean = if voltage.is_empty() {
        0.0
    } else {
        voltage.iter().sum::<f64>() / voltage.len() as f64
    };
    vec![0.0, mean, 0.0, center]
}

/// Fit one signal against the gradiometer model.
///
/// For `CenterFit::Fixed` only the first three entries of `p0` are used.
pub fn fit_signal(
    coil: &Gradiometer,
    position: &[f64],
    voltage: &[f64],
    p0: Option<&[f64]>,
    center: CenterFit,
) -> Result<SignalFit, FitError> {
    let default_p0;
    let p0 = match p0 {
        Some(p) => p,
        None => {
            default_p0 = default_initial_params(voltage, DEFAULT_CENTER);
            &default_p0
        }
    };

    let opts = LmOptions::default();
    let solution = match center {
        CenterFit::Free => levenberg_marquardt(&coil.free_center(), position, voltage, p0, &opts)?,
        CenterFit::Fixed(c) => {
            if p0.len() < 3 {
                return Err(FitError::InitialGuess {
                    expected: 3,
                    got: p0.len(),
                });
            }
            levenberg_marquardt(&coil.fixed_center(c), position, voltage, &p0[..3], &opts)?
        }
    };

    Ok(SignalFit {
        coefficients: solution.params,
        covariance: solution.covariance,
    })
}

/// Both fits of one signal plus the derived moments.
#[derive(Debug, Clone)]
pub struct ScanFitResult {
    pub initial_params: Vec<f64>,
    pub moment: f64,
    pub moment_err: f64,
    pub free: SignalFit,
    pub fixed_center: f64,
    pub moment_fixed: f64,
    pub moment_fixed_err: f64,
    pub fixed: SignalFit,
}

impl ScanFitResult {
    /// Run the free- and fixed-center fits with `p0 = [0, mean(V), 0, center]`.
    pub fn compute(
        constants: &InstrumentConstants,
        position: &[f64],
        voltage: &[f64],
        center: f64,
    ) -> Result<Self, FitError> {
        let coil = Gradiometer::from_constants(constants);
        let initial_params = default_initial_params(voltage, center);

        let free = fit_signal(&coil, position, voltage, Some(&initial_params), CenterFit::Free)?;
        let fixed = fit_signal(
            &coil,
            position,
            voltage,
            Some(&initial_params),
            CenterFit::Fixed(center),
        )?;

        Ok(Self {
            moment: constants.amplitude_to_moment(free.amplitude()),
            moment_err: constants.amplitude_to_moment(free.amplitude_std()).abs(),
            moment_fixed: constants.amplitude_to_moment(fixed.amplitude()),
            moment_fixed_err: constants.amplitude_to_moment(fixed.amplitude_std()).abs(),
            initial_params,
            free,
            fixed_center: center,
            fixed,
        })
    }

    pub fn moment(&self, center: CenterMode) -> f64 {
        match center {
            CenterMode::Free => self.moment,
            CenterMode::Fixed => self.moment_fixed,
        }
    }

    pub fn moment_err(&self, center: CenterMode) -> f64 {
        match center {
            CenterMode::Free => self.moment_err,
            CenterMode::Fixed => self.moment_fixed_err,
        }
    }

    pub fn signal_fit(&self, center: CenterMode) -> &SignalFit {
        match center {
            CenterMode::Free => &self.free,
            CenterMode::Fixed => &self.fixed,
        }
    }

    /// Fitted center in mm (the constant one for the fixed variant).
    pub fn center(&self, center: CenterMode) -> f64 {
        match center {
            CenterMode::Free => self.free.coefficients[3],
            CenterMode::Fixed => self.fixed_center,
        }
    }

    /// Evaluate the fitted curve, e.g. for overlays on a raw scan.
    pub fn predict(&self, coil: &Gradiometer, z: f64, center: CenterMode) -> f64 {
        match center {
            CenterMode::Free => predict(coil, z, &self.free.coefficients, None),
            CenterMode::Fixed => predict(coil, z, &self.fixed.coefficients, Some(self.fixed_center)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synth::{ScanParams, synthetic_voltages};

    fn positions(n: usize, lo: f64, hi: f64) -> Vec<f64> {
        crate::math::linspace(lo, hi, n)
    }

    #[test]
    fn noisy_synthetic_scan_recovers_amplitude_and_center() {
        let coil = Gradiometer::from_constants(&InstrumentConstants::default());
        let z = positions(50, 0.0, 60.0);
        let truth = ScanParams {
            amplitude: 1.0,
            shift: 0.0,
            slope: 0.0,
            center: 30.0,
        };
        let v = synthetic_voltages(&coil, &z, &truth, 0.002, 7).unwrap();

        let fit = fit_signal(&coil, &z, &v, None, CenterFit::Free).unwrap();
        let a = fit.coefficients[0];
        let c = fit.coefficients[3];
        assert!((a - 1.0).abs() < 0.05, "amplitude {a}");
        assert!((c - 30.0).abs() < 0.5, "center {c}");
    }

    #[test]
    fn fixed_center_fit_keeps_three_coefficients() {
        let coil = Gradiometer::from_constants(&InstrumentConstants::default());
        let z = positions(40, 10.0, 60.0);
        let v: Vec<f64> = z.iter().map(|&x| coil.voltage(x, -0.4, 0.02, 1e-4, 35.0)).collect();

        let fit = fit_signal(&coil, &z, &v, None, CenterFit::Fixed(35.0)).unwrap();
        assert_eq!(fit.coefficients.len(), 3);
        assert!((fit.coefficients[0] + 0.4).abs() < 1e-6);
        assert!((fit.coefficients[1] - 0.02).abs() < 1e-6);
        assert_eq!(fit.covariance.shape(), (3, 3));
    }

    #[test]
    fn scan_fit_result_converts_amplitude_to_moment() {
        let constants = InstrumentConstants::default();
        let coil = Gradiometer::from_constants(&constants);
        let z = positions(60, 5.0, 65.0);
        let v: Vec<f64> = z.iter().map(|&x| coil.voltage(x, 0.5, 0.0, 0.0, 36.0)).collect();

        let res = ScanFitResult::compute(&constants, &z, &v, 36.0).unwrap();
        let expected = constants.amplitude_to_moment(0.5);
        assert!((res.moment - expected).abs() < 1e-9 * expected.abs().max(1.0));
        assert!((res.moment_fixed - expected).abs() < 1e-9 * expected.abs().max(1.0));
        assert!(res.moment_err >= 0.0);
        assert_eq!(res.initial_params[3], 36.0);
        assert!((res.center(CenterMode::Free) - 36.0).abs() < 1e-6);
    }

    #[test]
    fn empty_scan_is_a_fit_error() {
        let coil = Gradiometer::new(9.7, 15.19);
        let err = fit_signal(&coil, &[], &[], None, CenterFit::Free).unwrap_err();
        assert_eq!(err, FitError::EmptyInput);
    }
}
