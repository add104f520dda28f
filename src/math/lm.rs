//! Levenberg–Marquardt nonlinear least squares.
//!
//! We minimise `Σ (y_i − f(x_i; p))²` for small parameter vectors (3–4
//! entries) and a few hundred observations, so the normal equations are formed
//! explicitly and solved by Cholesky at every trial step:
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀ r
//! ```
//!
//! λ shrinks by 10 after an accepted step and grows by 10 after a rejected one.
//! Termination mirrors MINPACK's defaults: relative SSE reduction below `ftol`
//! or relative step below `xtol`. Running out of evaluations is a fit failure.

use nalgebra::{DMatrix, DVector};

use crate::fit::FitError;
use crate::math::normal_pseudo_inverse;

const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;

/// A model `f(x; p)` with an analytic gradient with respect to `p`.
pub trait CurveModel {
    fn n_params(&self) -> usize;

    fn value(&self, x: f64, params: &[f64]) -> f64;

    /// Write `∂f/∂p_k` at `x` into `out` (length `n_params()`).
    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]);
}

#[derive(Debug, Clone)]
pub struct LmOptions {
    /// Maximum model evaluations; `0` means `200 · (p + 1)`.
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 0,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            initial_lambda: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// Parameter covariance: `pinv(JᵀJ) · SSE / (n − p)`; all `+∞` when `n ≤ p`.
    pub covariance: DMatrix<f64>,
    pub sse: f64,
    pub evaluations: usize,
}

/// Fit `model` to `(x, y)` starting from `p0`.
pub fn levenberg_marquardt<M>(
    model: &M,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    opts: &LmOptions,
) -> Result<LmSolution, FitError>
where
    M: CurveModel + ?Sized,
{
    let n = x.len();
    let p = model.n_params();
    if n == 0 {
        return Err(FitError::EmptyInput);
    }
    if y.len() != n {
        return Err(FitError::LengthMismatch {
            positions: n,
            voltages: y.len(),
        });
    }
    if p0.len() != p {
        return Err(FitError::InitialGuess {
            expected: p,
            got: p0.len(),
        });
    }

    let max_evaluations = if opts.max_evaluations == 0 {
        200 * (p + 1)
    } else {
        opts.max_evaluations
    };

    let mut params = p0.to_vec();
    let mut residuals = DVector::<f64>::zeros(n);
    let mut sse = residuals_into(model, x, y, &params, &mut residuals);
    let mut evaluations = 1usize;
    if !sse.is_finite() {
        return Err(FitError::NonFinite);
    }

    let mut jac = DMatrix::<f64>::zeros(n, p);
    let mut trial = vec![0.0; p];
    let mut trial_residuals = DVector::<f64>::zeros(n);
    let mut lambda = opts.initial_lambda;

    'outer: loop {
        jacobian_into(model, x, &params, &mut jac);
        let jtj = jac.transpose() * &jac;
        let g = jac.transpose() * &residuals;
        if g.iter().all(|v| *v == 0.0) {
            break;
        }

        let diag_max = (0..p).map(|i| jtj[(i, i)]).fold(0.0_f64, f64::max);
        let diag_floor = (diag_max * 1e-12).max(f64::MIN_POSITIVE);

        loop {
            if evaluations >= max_evaluations {
                return Err(FitError::NotConverged { evaluations });
            }

            let mut damped = jtj.clone();
            for i in 0..p {
                damped[(i, i)] += lambda * jtj[(i, i)].max(diag_floor);
            }

            let Some(chol) = damped.cholesky() else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    break 'outer;
                }
                continue;
            };
            let step = chol.solve(&g);

            for k in 0..p {
                trial[k] = params[k] + step[k];
            }
            let trial_sse = residuals_into(model, x, y, &trial, &mut trial_residuals);
            evaluations += 1;

            if trial_sse.is_finite() && trial_sse < sse {
                let reduction = sse - trial_sse;
                let step_norm = step.norm();
                let param_norm = params.iter().map(|v| v * v).sum::<f64>().sqrt();
                let previous = sse;

                params.copy_from_slice(&trial);
                std::mem::swap(&mut residuals, &mut trial_residuals);
                sse = trial_sse;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if sse == 0.0
                    || reduction <= opts.ftol * previous
                    || step_norm <= opts.xtol * (param_norm + opts.xtol)
                {
                    break 'outer;
                }
                break;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No direction decreases the SSE any more: numerically at a minimum.
                break 'outer;
            }
        }
    }

    if params.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    jacobian_into(model, x, &params, &mut jac);
    let covariance = if n > p {
        let scale = sse / (n - p) as f64;
        match normal_pseudo_inverse(&jac) {
            Some(pinv) => pinv * scale,
            None => DMatrix::from_element(p, p, f64::INFINITY),
        }
    } else {
        DMatrix::from_element(p, p, f64::INFINITY)
    };

    Ok(LmSolution {
        params,
        covariance,
        sse,
        evaluations,
    })
}

fn residuals_into<M>(model: &M, x: &[f64], y: &[f64], params: &[f64], out: &mut DVector<f64>) -> f64
where
    M: CurveModel + ?Sized,
{
    let mut sse = 0.0;
    for (i, (&xi, &yi)) in x.iter().zip(y.iter()).enumerate() {
        let r = yi - model.value(xi, params);
        out[i] = r;
        sse += r * r;
    }
    sse
}

fn jacobian_into<M>(model: &M, x: &[f64], params: &[f64], jac: &mut DMatrix<f64>)
where
    M: CurveModel + ?Sized,
{
    let mut row = vec![0.0; model.n_params()];
    for (i, &xi) in x.iter().enumerate() {
        model.gradient(xi, params, &mut row);
        for (k, &v) in row.iter().enumerate() {
            jac[(i, k)] = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `f(x) = a · exp(−b x)`
    struct Decay;

    impl CurveModel for Decay {
        fn n_params(&self) -> usize {
            2
        }

        fn value(&self, x: f64, p: &[f64]) -> f64 {
            p[0] * (-p[1] * x).exp()
        }

        fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
            let e = (-p[1] * x).exp();
            out[0] = e;
            out[1] = -p[0] * x * e;
        }
    }

    #[test]
    fn recovers_exponential_decay() {
        let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&v| 2.5 * (-1.3 * v).exp()).collect();

        let sol = levenberg_marquardt(&Decay, &x, &y, &[1.0, 0.5], &LmOptions::default()).unwrap();
        assert!((sol.params[0] - 2.5).abs() < 1e-6, "{:?}", sol.params);
        assert!((sol.params[1] - 1.3).abs() < 1e-6, "{:?}", sol.params);
        assert!(sol.sse < 1e-12);
    }

    #[test]
    fn tight_budget_reports_non_convergence() {
        let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&v| 2.5 * (-1.3 * v).exp()).collect();
        let opts = LmOptions {
            max_evaluations: 2,
            ..LmOptions::default()
        };

        let err = levenberg_marquardt(&Decay, &x, &y, &[1.0, 0.5], &opts).unwrap_err();
        assert!(matches!(err, FitError::NotConverged { .. }));
    }

    #[test]
    fn covariance_is_infinite_without_degrees_of_freedom() {
        let x = [0.0, 1.0];
        let y = [2.0, 1.0];
        let sol = levenberg_marquardt(&Decay, &x, &y, &[1.0, 0.1], &LmOptions::default()).unwrap();
        assert!(sol.covariance[(0, 0)].is_infinite());
    }

    #[test]
    fn rejects_empty_input() {
        let err = levenberg_marquardt(&Decay, &[], &[], &[1.0, 1.0], &LmOptions::default()).unwrap_err();
        assert!(matches!(err, FitError::EmptyInput));
    }
}
