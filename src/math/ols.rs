//! SVD-based linear least squares helpers.
//!
//! Two small problems show up repeatedly:
//!
//! - local polynomial fits used by jump correction (a tall 10×3 system)
//! - the parameter covariance of a converged nonlinear fit, which is the
//!   pseudo-inverse of `JᵀJ` built from the SVD of the Jacobian `J`
//!
//! Both go through SVD so rank-deficient inputs degrade gracefully instead of
//! panicking (nalgebra's `QR::solve` expects square systems).

use nalgebra::{DMatrix, DVector};

/// Solve `min ‖X β − y‖²` using SVD.
///
/// Returns `None` if no finite solution can be produced.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Pseudo-inverse of `JᵀJ` computed from the SVD of `J`.
///
/// Singular values below `eps · max(n, p) · s_max` are discarded, matching the
/// usual convention for least-squares covariance estimates.
pub fn normal_pseudo_inverse(jac: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let (n, p) = jac.shape();
    let svd = jac.clone().svd(false, true);
    let v_t = svd.v_t?;
    let s = &svd.singular_values;

    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    let threshold = f64::EPSILON * n.max(p) as f64 * s_max;

    let mut out = DMatrix::<f64>::zeros(p, p);
    for (k, &sk) in s.iter().enumerate() {
        if sk <= threshold {
            continue;
        }
        let inv = 1.0 / (sk * sk);
        let row = v_t.row(k);
        for i in 0..p {
            for j in 0..p {
                out[(i, j)] += row[i] * row[j] * inv;
            }
        }
    }

    out.iter().all(|v| v.is_finite()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn pseudo_inverse_matches_inverse_for_full_rank() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let jtj = j.transpose() * &j;
        let inv = jtj.try_inverse().unwrap();
        let pinv = normal_pseudo_inverse(&j).unwrap();
        for (a, b) in inv.iter().zip(pinv.iter()) {
            assert!((a - b).abs() < 1e-10, "{a} vs {b}");
        }
    }

    #[test]
    fn pseudo_inverse_tolerates_zero_column() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let pinv = normal_pseudo_inverse(&j).unwrap();
        assert!((pinv[(0, 0)] - 1.0 / 14.0).abs() < 1e-12);
        assert_eq!(pinv[(1, 1)], 0.0);
    }
}
