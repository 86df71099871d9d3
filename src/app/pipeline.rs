//! Shared calibration pipeline used by the `calibrate` front-end and tests.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! seed -> ingest -> solve -> residuals -> rankings

use log::info;

use crate::domain::{CalibrationConfig, CalibrationParams, ObservationResidual};
use crate::error::AppError;
use crate::fit::{SolverSummary, solve};
use crate::io::ingest::{IngestedData, load_observations};
use crate::report::{compute_residuals, norm_rmse, rank_worst};

/// All computed outputs of a single `calibrate` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    /// Starting point the solve was seeded with.
    pub initial: CalibrationParams,
    pub params: CalibrationParams,
    pub summary: SolverSummary,
    pub residuals: Vec<ObservationResidual>,
    pub worst: Vec<ObservationResidual>,
    pub norm_rmse: f64,
}

/// Execute the full calibration pipeline and return the computed outputs.
pub fn run_calibration(config: &CalibrationConfig) -> Result<RunOutput, AppError> {
    // 1) Seed.
    let params = CalibrationParams::seed();

    // 2) Ingest.
    let ingest = load_observations(&config.input, config.partial)?;

    // 3) Solve.
    calibrate_ingested(config, ingest, params)
}

/// Solve and score already-ingested observations starting from `params`.
///
/// This is useful for front-ends that want to print ingest details before
/// the solver starts echoing progress.
pub fn calibrate_ingested(
    config: &CalibrationConfig,
    ingest: IngestedData,
    params: CalibrationParams,
) -> Result<RunOutput, AppError> {
    let initial = params;
    let mut params = params;

    info!(
        "Solving for 6 parameters over {} observations",
        ingest.observations.len()
    );
    let summary = solve(&config.solver, &ingest.observations, &mut params)?;
    info!("{}", summary.brief_report());

    let gravity = config.solver.gravity;
    let residuals = compute_residuals(&ingest.observations, &params, gravity)?;
    let worst = rank_worst(&residuals, config.top_n);
    let norm_rmse = norm_rmse(&residuals, gravity);

    Ok(RunOutput {
        ingest,
        initial,
        params,
        summary,
        residuals,
        worst,
        norm_rmse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::domain::{GRAVITY, PartialTriple, SolverConfig};
    use crate::error::{EXIT_INPUT, EXIT_PRECONDITION};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("accel_calib_{}_{name}", std::process::id()))
    }

    fn config(input: PathBuf) -> CalibrationConfig {
        CalibrationConfig {
            input,
            partial: PartialTriple::Reject,
            solver: SolverConfig {
                progress_to_stdout: false,
                ..SolverConfig::default()
            },
            top_n: 3,
            export_residuals: None,
            export_calibration: None,
            debug_bundle: false,
        }
    }

    #[test]
    fn eighteen_line_file_recovers_identity() {
        let g = GRAVITY;
        let triples = [
            [g, 0.0, 0.0],
            [-g, 0.0, 0.0],
            [0.0, g, 0.0],
            [0.0, -g, 0.0],
            [0.0, 0.0, g],
            [0.0, 0.0, -g],
        ];
        let text: String = triples.iter().flatten().map(|v| format!("{v}\n")).collect();
        let path = temp_path("e2e_18.txt");
        std::fs::write(&path, text).unwrap();

        let run = run_calibration(&config(path.clone()));
        std::fs::remove_file(&path).ok();
        let run = run.unwrap();

        assert_eq!(run.ingest.stats.lines, 18);
        assert_eq!(run.ingest.observations.len(), 6);
        assert_eq!(run.initial, CalibrationParams::seed());
        assert!(run.summary.is_converged(), "{}", run.summary.full_report());
        for a in run.params.scale() {
            assert!((a - 1.0).abs() < 1e-3, "scale {a}");
        }
        for b in run.params.bias() {
            assert!(b.abs() < 1e-3, "bias {b}");
        }
        assert_eq!(run.residuals.len(), 6);
        assert_eq!(run.worst.len(), 3);
        assert!(run.norm_rmse < 1e-3);
    }

    #[test]
    fn too_few_observations_fail_the_solve() {
        let path = temp_path("e2e_short.txt");
        std::fs::write(&path, "9.7 0 0\n0 9.8 0\n0 0 9.8\n").unwrap();
        let err = run_calibration(&config(path.clone())).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), EXIT_PRECONDITION);
        assert!(err.message().contains("Solver Failed!"));
    }

    #[test]
    fn missing_input_is_fatal() {
        let err = run_calibration(&config(temp_path("does_not_exist.txt"))).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
    }
}
