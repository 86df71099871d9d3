//! Nonlinear least-squares problem definitions.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{Observation, PARAM_COUNT};
use crate::models::{ellipsoid_residual, residual_with_gradient};

/// Generic non-linear least squares problem with dense parameter/residual vectors.
pub trait NllsProblem: Sync {
    fn num_residuals(&self) -> usize;
    fn num_parameters(&self) -> usize;
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

/// One residual row per observation, all sharing the six-parameter block.
#[derive(Debug, Clone, Copy)]
pub struct EllipsoidProblem<'a> {
    observations: &'a [Observation],
    gravity: f64,
}

impl<'a> EllipsoidProblem<'a> {
    pub fn new(observations: &'a [Observation], gravity: f64) -> Self {
        Self { observations, gravity }
    }
}

impl NllsProblem for EllipsoidProblem<'_> {
    fn num_residuals(&self) -> usize {
        self.observations.len()
    }

    fn num_parameters(&self) -> usize {
        PARAM_COUNT
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let params = param_array(x);
        let values: Vec<f64> = self
            .observations
            .par_iter()
            .map(|obs| ellipsoid_residual(obs, &params, self.gravity))
            .collect();
        DVector::from_vec(values)
    }

    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let params = param_array(x);
        let rows: Vec<[f64; PARAM_COUNT]> = self
            .observations
            .par_iter()
            .map(|obs| residual_with_gradient(obs, &params, self.gravity).1)
            .collect();
        DMatrix::from_fn(rows.len(), PARAM_COUNT, |i, j| rows[i][j])
    }
}

fn param_array(x: &DVector<f64>) -> [f64; PARAM_COUNT] {
    std::array::from_fn(|i| x[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GRAVITY;

    #[test]
    fn jacobian_matches_finite_differences() {
        let obs = vec![
            Observation::new(9.5, 0.3, -0.4),
            Observation::new(-0.2, -9.9, 0.1),
            Observation::new(0.4, 0.6, 9.7),
        ];
        let problem = EllipsoidProblem::new(&obs, GRAVITY);
        let x = DVector::from_row_slice(&[1.01, 0.98, 1.03, 0.1, -0.05, 0.2]);

        let j = problem.jacobian(&x);
        assert_eq!(j.shape(), (3, PARAM_COUNT));

        let h = 1e-6;
        for col in 0..PARAM_COUNT {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[col] += h;
            minus[col] -= h;
            let fd = (problem.residuals(&plus) - problem.residuals(&minus)) / (2.0 * h);
            for row in 0..obs.len() {
                assert!(
                    (j[(row, col)] - fd[row]).abs() < 1e-4 * (1.0 + fd[row].abs()),
                    "row {row} col {col}: {} vs {}",
                    j[(row, col)],
                    fd[row]
                );
            }
        }
    }

    #[test]
    fn residuals_keep_input_order() {
        let g = GRAVITY;
        let obs = vec![Observation::new(g, 0.0, 0.0), Observation::new(0.0, 2.0 * g, 0.0)];
        let problem = EllipsoidProblem::new(&obs, g);
        let x = DVector::from_row_slice(&[1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        let r = problem.residuals(&x);
        assert!(r[0].abs() < 1e-9);
        assert!((r[1] - 3.0 * g * g).abs() < 1e-9);
    }
}
