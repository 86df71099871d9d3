//! Reporting utilities: residuals, rankings, and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{CalibrationParams, Observation, ObservationResidual};
use crate::error::AppError;
use crate::models::residual;

/// Compute corrected samples and residuals for each observation.
pub fn compute_residuals(
    observations: &[Observation],
    params: &CalibrationParams,
    gravity: f64,
) -> Result<Vec<ObservationResidual>, AppError> {
    let mut out = Vec::with_capacity(observations.len());
    for (index, raw) in observations.iter().enumerate() {
        let r = residual(raw, params, gravity);
        if !r.is_finite() {
            return Err(AppError::numeric(format!(
                "Non-finite residual for observation #{}.",
                index + 1
            )));
        }
        out.push(ObservationResidual {
            index,
            raw: *raw,
            corrected: params.correct(raw),
            residual: r,
        });
    }
    Ok(out)
}

/// The `top_n` observations with the largest absolute residual, worst first.
pub fn rank_worst(residuals: &[ObservationResidual], top_n: usize) -> Vec<ObservationResidual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| {
        b.residual
            .abs()
            .partial_cmp(&a.residual.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    sorted.truncate(top_n);
    sorted
}

/// Root-mean-square of the corrected-norm error `|a·raw + b| - g`.
pub fn norm_rmse(residuals: &[ObservationResidual], gravity: f64) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    let sse: f64 = residuals
        .iter()
        .map(|r| {
            let e = r.corrected_norm() - gravity;
            e * e
        })
        .sum();
    (sse / residuals.len() as f64).sqrt()
}
