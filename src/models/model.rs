//! Ellipsoid residual model.
//!
//! A stationary, correctly calibrated accelerometer reads exactly `g` in
//! magnitude. With per-axis scale `a` and bias `b`, the residual of one raw
//! sample `(x, y, z)` is
//!
//! ```text
//! r = (a1·x + b1)² + (a2·y + b2)² + (a3·z + b3)² − g²
//! ```
//!
//! The squared form is smooth everywhere, so the Jacobian comes straight from
//! dual-number evaluation of the same expression.

use crate::domain::{CalibrationParams, Observation, PARAM_COUNT};
use crate::math::{Dual, Scalar};

/// Residual of one observation against the sphere of radius `gravity`.
pub fn ellipsoid_residual<T: Scalar>(obs: &Observation, params: &[T; PARAM_COUNT], gravity: f64) -> T {
    let ex = params[0] * T::constant(obs.x) + params[3];
    let ey = params[1] * T::constant(obs.y) + params[4];
    let ez = params[2] * T::constant(obs.z) + params[5];
    ex * ex + ey * ey + ez * ez - T::constant(gravity * gravity)
}

/// Residual for concrete parameter values.
pub fn residual(obs: &Observation, params: &CalibrationParams, gravity: f64) -> f64 {
    ellipsoid_residual(obs, params.values(), gravity)
}

/// Residual and its gradient with respect to the six parameters.
pub fn residual_with_gradient(
    obs: &Observation,
    params: &[f64; PARAM_COUNT],
    gravity: f64,
) -> (f64, [f64; PARAM_COUNT]) {
    let vars = Dual::<PARAM_COUNT>::variables(params);
    let r = ellipsoid_residual(obs, &vars, gravity);
    (r.value, std::array::from_fn(|i| r.grad[i]))
}
