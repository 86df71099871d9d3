//! Read/write calibration JSON files.
//!
//! Calibration JSON is the "portable" result of a run:
//! - fitted scale and bias per axis
//! - the gravity magnitude the fit targeted
//! - how the solve ended (termination, costs, iteration count)
//!
//! `apply` reloads it to correct new raw samples.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{CalibrationParams, LinearSolverKind, SolverConfig};
use crate::error::AppError;
use crate::fit::{SolverSummary, TerminationKind};

/// How the solve that produced a calibration ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub linear_solver: LinearSolverKind,
    pub termination: TerminationKind,
    pub converged: bool,
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub n_observations: usize,
}

/// On-disk calibration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub tool: String,
    pub generated: DateTime<Local>,
    pub source: Option<PathBuf>,
    pub gravity: f64,
    pub scale: [f64; 3],
    pub bias: [f64; 3],
    pub solve: SolveOutcome,
}

impl CalibrationFile {
    pub fn new(
        params: &CalibrationParams,
        summary: &SolverSummary,
        config: &SolverConfig,
        source: Option<&Path>,
    ) -> Self {
        Self {
            tool: "accel-calib".to_string(),
            generated: Local::now(),
            source: source.map(Path::to_path_buf),
            gravity: config.gravity,
            scale: params.scale(),
            bias: params.bias(),
            solve: SolveOutcome {
                linear_solver: summary.linear_solver,
                termination: summary.termination,
                converged: summary.is_converged(),
                iterations: summary.num_iterations(),
                initial_cost: summary.initial_cost,
                final_cost: summary.final_cost,
                n_observations: summary.num_residuals,
            },
        }
    }

    pub fn params(&self) -> CalibrationParams {
        CalibrationParams::from_scale_bias(self.scale, self.bias)
    }
}

/// Write a calibration JSON file.
pub fn write_calibration_json(path: &Path, calibration: &CalibrationFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::input(format!(
            "Failed to create calibration JSON '{}': {e}",
            path.display()
        ))
    })?;

    serde_json::to_writer_pretty(file, calibration)
        .map_err(|e| AppError::input(format!("Failed to write calibration JSON: {e}")))?;

    Ok(())
}

/// Read a calibration JSON file.
pub fn read_calibration_json(path: &Path) -> Result<CalibrationFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!(
            "Failed to open calibration JSON '{}': {e}",
            path.display()
        ))
    })?;
    let calibration: CalibrationFile = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid calibration JSON: {e}")))?;

    if !calibration.params().is_initialized() {
        return Err(AppError::input(
            "Calibration JSON contains non-finite scale or bias values.",
        ));
    }
    Ok(calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn summary() -> SolverSummary {
        SolverSummary {
            linear_solver: LinearSolverKind::DenseSvd,
            num_residuals: 12,
            num_parameters: 6,
            num_threads: 1,
            max_iterations: 1000,
            initial_cost: 900.0,
            final_cost: 1e-12,
            iterations: Vec::new(),
            successful_steps: 4,
            unsuccessful_steps: 0,
            termination: TerminationKind::Convergence,
            message: String::new(),
            residual_evaluation_time: Duration::ZERO,
            jacobian_evaluation_time: Duration::ZERO,
            linear_solver_time: Duration::ZERO,
            total_time: Duration::ZERO,
        }
    }

    #[test]
    fn calibration_json_survives_write_and_read() {
        let params = CalibrationParams::from_scale_bias([1.01, 0.99, 1.02], [0.05, -0.1, 0.2]);
        let doc = CalibrationFile::new(&params, &summary(), &SolverConfig::default(), None);

        let path = std::env::temp_dir().join(format!("accel_calib_{}_cal.json", std::process::id()));
        write_calibration_json(&path, &doc).unwrap();
        let back = read_calibration_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.params(), params);
        assert_eq!(back.solve, doc.solve);
        assert!(back.solve.converged);
        assert!((back.gravity - crate::domain::GRAVITY).abs() < 1e-12);
    }

    #[test]
    fn garbage_json_is_an_input_error() {
        let path = std::env::temp_dir().join(format!("accel_calib_{}_bad.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_calibration_json(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
