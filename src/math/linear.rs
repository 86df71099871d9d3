//! Dense linear solves for damped least-squares steps.
//!
//! Each trust-region iteration solves
//!
//! ```text
//! minimize ‖J δ + r‖² + δᵀ diag(d) δ
//! ```
//!
//! for the step `δ`, where `d` is the (already scaled) damping diagonal.
//! Three strategies are available:
//! - QR on the augmented system `[J; sqrt(diag(d))] δ = [-r; 0]`
//! - Cholesky on the normal equations `(JᵀJ + diag(d)) δ = -Jᵀr`
//! - SVD on the augmented system, retrying looser tolerances
//!
//! Nalgebra's `QR::solve` is intended for square systems, so the QR path
//! applies `Qᵀ` and back-substitutes against `R` itself.

use nalgebra::{DMatrix, DVector};

use crate::domain::LinearSolverKind;

/// Solve for the damped Gauss-Newton step.
///
/// Returns `None` if the factorization fails or produces non-finite values.
pub fn solve_damped_step(
    kind: LinearSolverKind,
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    damping: &DVector<f64>,
) -> Option<DVector<f64>> {
    let step = match kind {
        LinearSolverKind::DenseQr => {
            let (a, b) = augmented_system(jacobian, residuals, damping);
            solve_qr(a, &b)
        }
        LinearSolverKind::DenseNormalCholesky => solve_normal_cholesky(jacobian, residuals, damping),
        LinearSolverKind::DenseSvd => {
            let (a, b) = augmented_system(jacobian, residuals, damping);
            solve_least_squares(&a, &b)
        }
    }?;

    if step.iter().all(|v| v.is_finite()) {
        Some(step)
    } else {
        None
    }
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

fn augmented_system(
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    damping: &DVector<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let m = jacobian.nrows();
    let n = jacobian.ncols();

    let mut a = DMatrix::zeros(m + n, n);
    a.view_mut((0, 0), (m, n)).copy_from(jacobian);
    for i in 0..n {
        a[(m + i, i)] = damping[i].max(0.0).sqrt();
    }

    let mut b = DVector::zeros(m + n);
    b.rows_mut(0, m).copy_from(&(-residuals));

    (a, b)
}

fn solve_qr(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let qr = a.qr();
    let qtb = qr.q().tr_mul(b);
    qr.r().solve_upper_triangular(&qtb)
}

fn solve_normal_cholesky(
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    damping: &DVector<f64>,
) -> Option<DVector<f64>> {
    let mut normal = jacobian.tr_mul(jacobian);
    for i in 0..normal.nrows() {
        normal[(i, i)] += damping[i];
    }
    let rhs = -jacobian.tr_mul(residuals);
    normal.cholesky().map(|c| c.solve(&rhs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_fit() -> (DMatrix<f64>, DVector<f64>) {
        // Residuals of y = c0 + c1 x on x = [0,1,2], y = [2,5,8], evaluated at c = 0.
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let r = DVector::from_row_slice(&[-2.0, -5.0, -8.0]);
        (j, r)
    }

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
    fn undamped_step_is_gauss_newton() {
        let (j, r) = line_fit();
        let d = DVector::zeros(2);
        for kind in [
            LinearSolverKind::DenseQr,
            LinearSolverKind::DenseNormalCholesky,
            LinearSolverKind::DenseSvd,
        ] {
            let step = solve_damped_step(kind, &j, &r, &d).unwrap();
            assert!((step[0] - 2.0).abs() < 1e-9, "{kind:?}: {step}");
            assert!((step[1] - 3.0).abs() < 1e-9, "{kind:?}: {step}");
        }
    }

    #[test]
    fn strategies_agree_on_damped_step() {
        let (j, r) = line_fit();
        let d = DVector::from_row_slice(&[0.7, 2.5]);
        let qr = solve_damped_step(LinearSolverKind::DenseQr, &j, &r, &d).unwrap();
        let chol = solve_damped_step(LinearSolverKind::DenseNormalCholesky, &j, &r, &d).unwrap();
        let svd = solve_damped_step(LinearSolverKind::DenseSvd, &j, &r, &d).unwrap();
        assert!((&qr - &chol).norm() < 1e-9);
        assert!((&qr - &svd).norm() < 1e-9);

        // Damping shrinks the step relative to Gauss-Newton.
        let gn = solve_damped_step(LinearSolverKind::DenseQr, &j, &r, &DVector::zeros(2)).unwrap();
        assert!(qr.norm() < gn.norm());
    }
}
