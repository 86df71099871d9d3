//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{CalibrationConfig, CalibrationParams, ObservationResidual};
use crate::fit::SolverSummary;
use crate::io::ingest::IngestedData;

/// Dataset stats and solver settings printed before the solve.
pub fn format_run_summary(ingest: &IngestedData, config: &CalibrationConfig) -> String {
    let mut out = String::new();
    let stats = &ingest.stats;

    out.push_str("=== accel-calib - Ellipsoid Accelerometer Calibration ===\n");
    out.push_str(&format!("Input: {}\n", ingest.path.display()));
    out.push_str(&format!(
        "Lines: {} | numbers: {} | observations: {}\n",
        stats.lines, stats.tokens, stats.n_observations
    ));
    if stats.dropped_tokens > 0 {
        out.push_str(&format!(
            "Dropped {} trailing number(s) (incomplete triple)\n",
            stats.dropped_tokens
        ));
    }
    match &stats.norms {
        Some(n) => out.push_str(&format!(
            "Raw |a|: min={:.4} max={:.4} mean={:.4}\n",
            n.min, n.max, n.mean
        )),
        None => out.push_str("Raw |a|: -\n"),
    }
    out.push_str(&format!(
        "Gravity: {:.4} | linear solver: {} | max iterations: {}\n",
        config.solver.gravity,
        config.solver.linear_solver.report_name(),
        config.solver.max_iterations
    ));

    out
}

/// `a1=… a2=… a3=…` and `b1=… b2=… b3=…` lines.
pub fn format_parameters(params: &CalibrationParams) -> String {
    let [a1, a2, a3] = params.scale();
    let [b1, b2, b3] = params.bias();
    format!("a1={a1:.6} a2={a2:.6} a3={a3:.6}\nb1={b1:.6} b2={b2:.6} b3={b3:.6}\n")
}

/// Success banner, fitted parameters, and the full solver report.
pub fn format_solve_result(params: &CalibrationParams, summary: &SolverSummary) -> String {
    let mut out = String::new();
    out.push_str("Solver Success!\n");
    out.push_str(&format_parameters(params));
    out.push_str(&summary.full_report());
    out
}

/// Table of the observations with the largest residuals.
pub fn format_residual_table(rows: &[ObservationResidual], gravity: f64, rmse: f64) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Largest residuals (target |a| = {gravity:.4}, norm RMSE = {rmse:.6}):\n"
    ));
    out.push_str(
        format!(
            "{:>6} {:>12} {:>12} {:>12} {:>12} {:>14}\n",
            "#", "raw_x", "raw_y", "raw_z", "|corrected|", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:->6} {:->12} {:->12} {:->12} {:->12} {:->14}\n",
            "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        out.push_str(&format!(
            "{:>6} {:>12.5} {:>12.5} {:>12.5} {:>12.6} {:>14.6e}\n",
            r.index + 1,
            r.raw.x,
            r.raw.y,
            r.raw.z,
            r.corrected_norm(),
            r.residual,
        ));
    }

    out
}

/// Corrected samples produced by `apply`.
pub fn format_corrected(rows: &[ObservationResidual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>6} {:>12} {:>12} {:>12} {:>12}\n",
            "#", "x", "y", "z", "|a|"
        )
        .trim_end(),
    );
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{:>6} {:>12.6} {:>12.6} {:>12.6} {:>12.6}\n",
            r.index + 1,
            r.corrected.x,
            r.corrected.y,
            r.corrected.z,
            r.corrected_norm(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;

    #[test]
    fn parameters_use_six_decimals() {
        let p = CalibrationParams::from_scale_bias([1.0, 0.9999994, 1.25], [0.0, -0.5, 0.0001234]);
        let text = format_parameters(&p);
        assert_eq!(
            text,
            "a1=1.000000 a2=0.999999 a3=1.250000\nb1=0.000000 b2=-0.500000 b3=0.000123\n"
        );
    }

    #[test]
    fn residual_table_lists_rows_one_based() {
        let raw = Observation::new(1.0, 2.0, 2.0);
        let rows = vec![ObservationResidual {
            index: 4,
            raw,
            corrected: raw,
            residual: -0.25,
        }];
        let text = format_residual_table(&rows, 3.0, 0.0);
        let last = text.lines().last().unwrap();
        assert!(last.trim_start().starts_with("5 "), "{last}");
        assert!(last.contains("3.000000"), "{last}");
        assert_eq!(text.lines().count(), 4);
    }
}
