//! Low-degree polynomial fits.
//!
//! x is mapped onto `[-1, 1]` before building the Vandermonde matrix. Scan
//! positions are tens of millimetres with sub-millimetre spacing, so the raw
//! powers would be badly conditioned.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

/// A fitted polynomial in the scaled variable `u = (x - offset) * scale`.
#[derive(Debug, Clone)]
pub struct Polynomial {
    coefficients: Vec<f64>,
    offset: f64,
    scale: f64,
}

impl Polynomial {
    /// Least-squares fit of the given degree.
    ///
    /// Returns `None` for mismatched/empty input or a non-finite solution.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Option<Self> {
        if x.is_empty() || x.len() != y.len() {
            return None;
        }

        let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(lo.is_finite() && hi.is_finite()) {
            return None;
        }
        let offset = 0.5 * (lo + hi);
        let half_span = 0.5 * (hi - lo);
        let scale = if half_span > 0.0 { 1.0 / half_span } else { 1.0 };

        let cols = degree + 1;
        let mut design = DMatrix::<f64>::zeros(x.len(), cols);
        for (i, &xi) in x.iter().enumerate() {
            let u = (xi - offset) * scale;
            let mut power = 1.0;
            for j in 0..cols {
                design[(i, j)] = power;
                power *= u;
            }
        }
        let rhs = DVector::from_column_slice(y);

        let beta = solve_least_squares(&design, &rhs)?;
        Some(Self {
            coefficients: beta.iter().copied().collect(),
            offset,
            scale,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let u = (x - self.offset) * self.scale;
        // Horner
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * u + c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_is_reproduced_exactly() {
        let x: Vec<f64> = (0..10).map(|i| 30.0 + 0.4 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| 0.5 - 0.02 * v + 0.003 * v * v).collect();
        let p = Polynomial::fit(&x, &y, 2).unwrap();
        for x_new in [29.0, 34.0, 35.2] {
            let expected = 0.5 - 0.02 * x_new + 0.003 * x_new * x_new;
            assert!((p.eval(x_new) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(Polynomial::fit(&[1.0, 2.0], &[1.0], 1).is_none());
        assert!(Polynomial::fit(&[], &[], 2).is_none());
    }
}
