//! Response of a second-order gradiometer to a point dipole.
//!
//! A dipole at position `z` moving along the coil axis induces
//!
//! ```text
//! V(z) = S + A · g(z − C) + m·z
//! g(u) = 2h(u) − h(u + D) − h(u − D),   h(w) = R² (R² + w²)^(−3/2)
//! ```
//!
//! where `R` is the coil radius and `D` the coil separation. The free-center
//! variant fits `[A, S, m, C]`; the fixed-center variant fits `[A, S, m]` with
//! `C` supplied by the caller.

use crate::config::InstrumentConstants;
use crate::math::CurveModel;

/// Coil geometry of the pickup gradiometer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradiometer {
    pub radius: f64,
    pub distance: f64,
}

impl Gradiometer {
    pub fn new(radius: f64, distance: f64) -> Self {
        Self { radius, distance }
    }

    pub fn from_constants(constants: &InstrumentConstants) -> Self {
        Self::new(constants.coil_radius, constants.coil_distance)
    }

    fn lobe(&self, w: f64) -> f64 {
        let r2 = self.radius * self.radius;
        r2 * (r2 + w * w).powf(-1.5)
    }

    fn lobe_derivative(&self, w: f64) -> f64 {
        let r2 = self.radius * self.radius;
        -3.0 * r2 * w * (r2 + w * w).powf(-2.5)
    }

    /// Unit-amplitude coil response `g(u)` at offset `u = z − C`.
    pub fn shape(&self, u: f64) -> f64 {
        2.0 * self.lobe(u) - self.lobe(self.distance + u) - self.lobe(-self.distance + u)
    }

    /// `dg/du`
    pub fn shape_derivative(&self, u: f64) -> f64 {
        2.0 * self.lobe_derivative(u)
            - self.lobe_derivative(self.distance + u)
            - self.lobe_derivative(-self.distance + u)
    }

    /// Full model voltage.
    pub fn voltage(&self, z: f64, amplitude: f64, shift: f64, slope: f64, center: f64) -> f64 {
        shift + amplitude * self.shape(z - center) + slope * z
    }

    pub fn free_center(&self) -> FreeCenter {
        FreeCenter { coil: *self }
    }

    pub fn fixed_center(&self, center: f64) -> FixedCenter {
        FixedCenter {
            coil: *self,
            center,
        }
    }
}

/// Fit target with parameters `[A, S, m, C]`.
#[derive(Debug, Clone, Copy)]
pub struct FreeCenter {
    coil: Gradiometer,
}

impl CurveModel for FreeCenter {
    fn n_params(&self) -> usize {
        4
    }

    fn value(&self, z: f64, p: &[f64]) -> f64 {
        self.coil.voltage(z, p[0], p[1], p[2], p[3])
    }

    fn gradient(&self, z: f64, p: &[f64], out: &mut [f64]) {
        let u = z - p[3];
        out[0] = self.coil.shape(u);
        out[1] = 1.0;
        out[2] = z;
        out[3] = -p[0] * self.coil.shape_derivative(u);
    }
}

/// Fit target with parameters `[A, S, m]` and a constant center.
#[derive(Debug, Clone, Copy)]
pub struct FixedCenter {
    coil: Gradiometer,
    center: f64,
}

impl FixedCenter {
    pub fn center(&self) -> f64 {
        self.center
    }
}

impl CurveModel for FixedCenter {
    fn n_params(&self) -> usize {
        3
    }

    fn value(&self, z: f64, p: &[f64]) -> f64 {
        self.coil.voltage(z, p[0], p[1], p[2], self.center)
    }

    fn gradient(&self, z: f64, _p: &[f64], out: &mut [f64]) {
        out[0] = self.coil.shape(z - self.center);
        out[1] = 1.0;
        out[2] = z;
    }
}

/// Evaluate a coefficient vector from either fit variant at `z`.
///
/// Four coefficients are `[A, S, m, C]`; three are `[A, S, m]` and need the
/// fixed center.
pub fn predict(coil: &Gradiometer, z: f64, coefficients: &[f64], fixed_center: Option<f64>) -> f64 {
    match (coefficients, fixed_center) {
        ([a, s, m, c], _) => coil.voltage(z, *a, *s, *m, *c),
        ([a, s, m], Some(c)) => coil.voltage(z, *a, *s, *m, c),
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_axis_peak_matches_hand_computation() {
        // R = 1, D = 1: g(0) = 2 − 2·(1 + 1)^(−3/2) = 2 − 1/√2
        let coil = Gradiometer::new(1.0, 1.0);
        let v = coil.voltage(5.0, 1.0, 0.0, 0.0, 5.0);
        let expected = 2.0 - 2.0 / 8.0_f64.sqrt();
        assert!((v - expected).abs() < 1e-12, "{v} vs {expected}");
        assert!((v - 1.292_893_218_8).abs() < 1e-9);
    }

    #[test]
    fn response_is_symmetric_about_center() {
        let coil = Gradiometer::new(9.7, 15.19);
        for du in [0.5, 3.0, 12.0, 20.0] {
            let left = coil.voltage(30.0 - du, 1.0, 0.0, 0.0, 30.0);
            let right = coil.voltage(30.0 + du, 1.0, 0.0, 0.0, 30.0);
            assert!((left - right).abs() < 1e-14);
        }
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let model = Gradiometer::new(9.7, 15.19).free_center();
        let p = [0.8, 0.01, -0.002, 31.0];
        let mut grad = [0.0; 4];
        for z in [20.0, 28.5, 31.0, 40.0] {
            model.gradient(z, &p, &mut grad);
            for k in 0..4 {
                let h = 1e-6;
                let mut hi = p;
                let mut lo = p;
                hi[k] += h;
                lo[k] -= h;
                let fd = (model.value(z, &hi) - model.value(z, &lo)) / (2.0 * h);
                assert!((fd - grad[k]).abs() < 1e-6, "k={k} z={z}: {fd} vs {}", grad[k]);
            }
        }
    }

    #[test]
    fn predict_handles_both_variants() {
        let coil = Gradiometer::new(9.7, 15.19);
        let free = predict(&coil, 33.0, &[1.0, 0.1, 0.0, 30.0], None);
        let fixed = predict(&coil, 33.0, &[1.0, 0.1, 0.0], Some(30.0));
        assert_eq!(free, fixed);
        assert!(predict(&coil, 33.0, &[1.0, 0.1, 0.0], None).is_nan());
    }
}
