//! Levenberg-Marquardt trust-region minimizer.
//!
//! Given a residual vector `r(x)` and its Jacobian `J(x)`, each iteration solves
//!
//! ```text
//! (JᵀJ + D/μ) δ = -Jᵀr,    D = clamp(diag(JᵀJ), 1e-6, 1e32)
//! ```
//!
//! with the configured dense linear solver, then compares the actual cost
//! reduction against the reduction predicted by the linearization. Steps with
//! a ratio above `1e-3` are accepted and grow the trust radius `μ`; rejected
//! steps shrink it geometrically.
//!
//! The solve always yields a `SolverSummary` once it runs. Convergence quality
//! is reported through `TerminationKind`, not through the `Result`.

use std::time::{Duration, Instant};

use nalgebra::DVector;

use crate::domain::{CalibrationParams, MIN_OBSERVATIONS, Observation, SolverConfig};
use crate::error::AppError;
use crate::fit::problem::{EllipsoidProblem, NllsProblem};
use crate::fit::summary::{IterationSummary, SolverSummary, TerminationKind, fmt_sci};
use crate::math::solve_damped_step;

const INITIAL_TRUST_REGION_RADIUS: f64 = 1e4;
const MAX_TRUST_REGION_RADIUS: f64 = 1e16;
const MIN_TRUST_REGION_RADIUS: f64 = 1e-32;
const MIN_RELATIVE_DECREASE: f64 = 1e-3;
const MIN_DIAGONAL: f64 = 1e-6;
const MAX_DIAGONAL: f64 = 1e32;

/// Fit `params` to `observations` in place.
///
/// Refuses to run (and leaves `params` untouched) when there are fewer than
/// six observations or `params` was never initialized.
pub fn solve(
    config: &SolverConfig,
    observations: &[Observation],
    params: &mut CalibrationParams,
) -> Result<SolverSummary, AppError> {
    if observations.len() < MIN_OBSERVATIONS {
        return Err(AppError::precondition(format!(
            "Solver Failed! At least {MIN_OBSERVATIONS} observations are required, got {}.",
            observations.len()
        )));
    }
    if !params.is_initialized() {
        return Err(AppError::precondition(
            "Solver Failed! Calibration parameters were never initialized.",
        ));
    }
    validate_config(config)?;
    if let Some(idx) = observations.iter().position(|o| !o.is_finite()) {
        return Err(AppError::numeric(format!(
            "Observation #{} contains a non-finite value.",
            idx + 1
        )));
    }

    let problem = EllipsoidProblem::new(observations, config.gravity);
    let x0 = DVector::from_row_slice(params.values());
    let (x, summary) = minimize(&problem, x0, config);

    params.values_mut().copy_from_slice(x.as_slice());
    Ok(summary)
}

fn validate_config(config: &SolverConfig) -> Result<(), AppError> {
    if config.max_iterations == 0 {
        return Err(AppError::input("Max iterations must be > 0."));
    }
    if !(config.gravity.is_finite() && config.gravity > 0.0) {
        return Err(AppError::input("Gravity must be a positive, finite number."));
    }
    let tolerances = [
        config.function_tolerance,
        config.gradient_tolerance,
        config.parameter_tolerance,
    ];
    if tolerances.iter().any(|t| !t.is_finite() || *t < 0.0) {
        return Err(AppError::input("Solver tolerances must be finite and non-negative."));
    }
    Ok(())
}

#[derive(Default)]
struct Timings {
    residual: Duration,
    jacobian: Duration,
    linear: Duration,
}

/// Run Levenberg-Marquardt from `x0` and return the final point with its summary.
pub fn minimize<P: NllsProblem>(
    problem: &P,
    x0: DVector<f64>,
    config: &SolverConfig,
) -> (DVector<f64>, SolverSummary) {
    let start = Instant::now();
    let mut timings = Timings::default();

    let mut x = x0;

    let t = Instant::now();
    let mut r = problem.residuals(&x);
    timings.residual += t.elapsed();
    let mut cost = 0.5 * r.norm_squared();

    let mut summary = SolverSummary {
        linear_solver: config.linear_solver,
        num_residuals: problem.num_residuals(),
        num_parameters: problem.num_parameters(),
        num_threads: rayon::current_num_threads(),
        max_iterations: config.max_iterations,
        initial_cost: cost,
        final_cost: cost,
        iterations: Vec::new(),
        successful_steps: 0,
        unsuccessful_steps: 0,
        termination: TerminationKind::Failure,
        message: String::new(),
        residual_evaluation_time: Duration::ZERO,
        jacobian_evaluation_time: Duration::ZERO,
        linear_solver_time: Duration::ZERO,
        total_time: Duration::ZERO,
    };

    if !cost.is_finite() {
        summary.message = "Residual evaluation failed at the initial point.".to_string();
        return (x, finish(summary, cost, timings, start));
    }

    let t = Instant::now();
    let mut jacobian = problem.jacobian(&x);
    timings.jacobian += t.elapsed();
    let mut gradient = jacobian.tr_mul(&r);

    let mut radius = INITIAL_TRUST_REGION_RADIUS;
    let mut decrease_factor = 2.0;

    if config.progress_to_stdout {
        println!("{}", IterationSummary::HEADER);
    }
    record(
        &mut summary,
        config,
        IterationSummary {
            iteration: 0,
            cost,
            cost_change: 0.0,
            gradient_max_norm: gradient.amax(),
            step_norm: 0.0,
            relative_decrease: 0.0,
            trust_region_radius: radius,
            step_is_successful: true,
            iteration_time: start.elapsed(),
            cumulative_time: start.elapsed(),
        },
    );

    if gradient.amax() <= config.gradient_tolerance {
        summary.termination = TerminationKind::Convergence;
        summary.message = format!(
            "Gradient tolerance reached. Gradient max norm: {} <= {}",
            fmt_sci(gradient.amax(), 6),
            fmt_sci(config.gradient_tolerance, 6)
        );
        return (x, finish(summary, cost, timings, start));
    }

    let mut termination: Option<(TerminationKind, String)> = None;

    for iteration in 1..=config.max_iterations {
        let iter_start = Instant::now();

        let damping = DVector::from_iterator(
            jacobian.ncols(),
            jacobian
                .column_iter()
                .map(|c| c.norm_squared().clamp(MIN_DIAGONAL, MAX_DIAGONAL) / radius),
        );

        let t = Instant::now();
        let step = solve_damped_step(config.linear_solver, &jacobian, &r, &damping);
        timings.linear += t.elapsed();

        let mut entry = IterationSummary {
            iteration,
            cost,
            cost_change: 0.0,
            gradient_max_norm: gradient.amax(),
            step_norm: 0.0,
            relative_decrease: 0.0,
            trust_region_radius: radius,
            step_is_successful: false,
            iteration_time: Duration::ZERO,
            cumulative_time: Duration::ZERO,
        };

        let accepted = match step {
            None => None,
            Some(step) => {
                let step_norm = step.norm();
                entry.step_norm = step_norm;

                let threshold = config.parameter_tolerance * (x.norm() + config.parameter_tolerance);
                if step_norm <= threshold {
                    termination = Some((
                        TerminationKind::Convergence,
                        format!(
                            "Parameter tolerance reached. Relative step_norm: {} <= {}.",
                            fmt_sci(step_norm / (x.norm() + config.parameter_tolerance), 6),
                            fmt_sci(config.parameter_tolerance, 6)
                        ),
                    ));
                    break;
                }

                let candidate = &x + &step;
                let t = Instant::now();
                let candidate_r = problem.residuals(&candidate);
                timings.residual += t.elapsed();
                let candidate_cost = 0.5 * candidate_r.norm_squared();

                let model_r = &r + &jacobian * &step;
                let model_cost_change = cost - 0.5 * model_r.norm_squared();
                let rho = if candidate_cost.is_finite() && model_cost_change > 0.0 {
                    (cost - candidate_cost) / model_cost_change
                } else {
                    0.0
                };
                entry.relative_decrease = rho;

                if rho > MIN_RELATIVE_DECREASE {
                    Some((candidate, candidate_r, candidate_cost, rho))
                } else {
                    None
                }
            }
        };

        match accepted {
            Some((candidate, candidate_r, candidate_cost, rho)) => {
                summary.successful_steps += 1;
                let previous_cost = cost;
                let cost_change = previous_cost - candidate_cost;

                radius = (radius / (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3)))
                    .min(MAX_TRUST_REGION_RADIUS);
                decrease_factor = 2.0;

                x = candidate;
                r = candidate_r;
                cost = candidate_cost;

                let t = Instant::now();
                jacobian = problem.jacobian(&x);
                timings.jacobian += t.elapsed();
                gradient = jacobian.tr_mul(&r);

                entry.cost = cost;
                entry.cost_change = cost_change;
                entry.gradient_max_norm = gradient.amax();
                entry.step_is_successful = true;

                if cost_change <= config.function_tolerance * previous_cost {
                    termination = Some((
                        TerminationKind::Convergence,
                        format!(
                            "Function tolerance reached. |cost_change|/cost: {} <= {}",
                            fmt_sci(cost_change / previous_cost, 6),
                            fmt_sci(config.function_tolerance, 6)
                        ),
                    ));
                } else if gradient.amax() <= config.gradient_tolerance {
                    termination = Some((
                        TerminationKind::Convergence,
                        format!(
                            "Gradient tolerance reached. Gradient max norm: {} <= {}",
                            fmt_sci(gradient.amax(), 6),
                            fmt_sci(config.gradient_tolerance, 6)
                        ),
                    ));
                }
            }
            None => {
                summary.unsuccessful_steps += 1;
                radius /= decrease_factor;
                decrease_factor *= 2.0;

                if radius < MIN_TRUST_REGION_RADIUS {
                    termination = Some((
                        TerminationKind::Failure,
                        format!(
                            "Minimum trust region radius reached. Trust region radius: {} <= {}",
                            fmt_sci(radius, 6),
                            fmt_sci(MIN_TRUST_REGION_RADIUS, 6)
                        ),
                    ));
                }
            }
        }

        entry.trust_region_radius = radius;
        entry.iteration_time = iter_start.elapsed();
        entry.cumulative_time = start.elapsed();
        record(&mut summary, config, entry);

        if termination.is_some() {
            break;
        }
    }

    let (kind, message) = termination.unwrap_or_else(|| {
        (
            TerminationKind::NoConvergence,
            format!(
                "Maximum number of iterations reached. Number of iterations: {}.",
                config.max_iterations
            ),
        )
    });
    summary.termination = kind;
    summary.message = message;

    (x, finish(summary, cost, timings, start))
}

fn record(summary: &mut SolverSummary, config: &SolverConfig, entry: IterationSummary) {
    if config.progress_to_stdout {
        println!("{}", entry.progress_line());
    }
    summary.iterations.push(entry);
}

fn finish(mut summary: SolverSummary, final_cost: f64, timings: Timings, start: Instant) -> SolverSummary {
    summary.final_cost = final_cost;
    summary.residual_evaluation_time = timings.residual;
    summary.jacobian_evaluation_time = timings.jacobian;
    summary.linear_solver_time = timings.linear;
    summary.total_time = start.elapsed();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GRAVITY, LinearSolverKind};
    use crate::error::EXIT_PRECONDITION;

    fn quiet() -> SolverConfig {
        SolverConfig {
            progress_to_stdout: false,
            ..SolverConfig::default()
        }
    }

    fn axis_points() -> Vec<Observation> {
        let g = GRAVITY;
        vec![
            Observation::new(g, 0.0, 0.0),
            Observation::new(-g, 0.0, 0.0),
            Observation::new(0.0, g, 0.0),
            Observation::new(0.0, -g, 0.0),
            Observation::new(0.0, 0.0, g),
            Observation::new(0.0, 0.0, -g),
        ]
    }

    /// Raw readings that land exactly on the gravity sphere once `truth` is applied.
    fn distorted(truth: &CalibrationParams) -> Vec<Observation> {
        let dirs: [[f64; 3]; 12] = [
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, -1.0],
            [1.0, -1.0, 1.0],
            [-1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
        ];
        let a = truth.scale();
        let b = truth.bias();
        dirs.iter()
            .map(|d| {
                let n = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
                let raw: [f64; 3] = std::array::from_fn(|i| (GRAVITY * d[i] / n - b[i]) / a[i]);
                Observation::new(raw[0], raw[1], raw[2])
            })
            .collect()
    }

    #[test]
    fn too_few_observations_is_rejected() {
        let obs = &axis_points()[..5];
        let mut params = CalibrationParams::seed();
        let err = solve(&quiet(), obs, &mut params).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_PRECONDITION);
        assert!(err.message().starts_with("Solver Failed!"));
        assert_eq!(params, CalibrationParams::seed());
    }

    #[test]
    fn uninitialized_parameters_are_rejected() {
        let mut params = CalibrationParams::uninitialized();
        let err = solve(&quiet(), &axis_points(), &mut params).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_PRECONDITION);
        assert!(!params.is_initialized());
    }

    #[test]
    fn axis_points_recover_identity() {
        let mut params = CalibrationParams::seed();
        let summary = solve(&quiet(), &axis_points(), &mut params).unwrap();
        assert!(summary.is_converged(), "{}", summary.full_report());
        for a in params.scale() {
            assert!((a - 1.0).abs() < 1e-3, "scale {a}");
        }
        for b in params.bias() {
            assert!(b.abs() < 1e-3, "bias {b}");
        }
        assert!(summary.final_cost < summary.initial_cost);
        assert_eq!(summary.num_residuals, 6);
    }

    #[test]
    fn ground_truth_is_recovered_by_every_linear_solver() {
        let truth = CalibrationParams::from_scale_bias([1.02, 0.97, 1.05], [0.12, -0.2, 0.31]);
        let obs = distorted(&truth);

        for kind in [
            LinearSolverKind::DenseQr,
            LinearSolverKind::DenseNormalCholesky,
            LinearSolverKind::DenseSvd,
        ] {
            let config = SolverConfig {
                linear_solver: kind,
                ..quiet()
            };
            let mut params = CalibrationParams::seed();
            let summary = solve(&config, &obs, &mut params).unwrap();
            assert!(summary.is_converged(), "{kind:?}: {}", summary.full_report());
            for (got, want) in params.values().iter().zip(truth.values()) {
                assert!((got - want).abs() < 1e-6, "{kind:?}: {got} vs {want}");
            }
        }
    }

    #[test]
    fn iteration_cap_still_produces_a_summary() {
        let config = SolverConfig {
            max_iterations: 1,
            ..quiet()
        };
        let mut params = CalibrationParams::seed();
        let summary = solve(&config, &axis_points(), &mut params).unwrap();
        assert_eq!(summary.termination, TerminationKind::NoConvergence);
        assert_eq!(summary.num_iterations(), 1);
        assert_ne!(params, CalibrationParams::seed());
        assert!(summary.full_report().contains("Maximum number of iterations"));
    }

    #[test]
    fn exact_start_converges_immediately() {
        let mut params = CalibrationParams::from_scale_bias([1.0; 3], [0.0; 3]);
        let summary = solve(&quiet(), &axis_points(), &mut params).unwrap();
        assert!(summary.is_converged());
        assert_eq!(summary.num_iterations(), 0);
        assert_eq!(summary.iterations.len(), 1);
    }

    #[test]
    fn invalid_gravity_is_a_config_error() {
        let config = SolverConfig {
            gravity: -1.0,
            ..quiet()
        };
        let mut params = CalibrationParams::seed();
        let err = solve(&config, &axis_points(), &mut params).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
