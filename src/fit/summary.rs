//! Solver summaries and their text reports.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::LinearSolverKind;

/// Why the minimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationKind {
    /// One of the function, gradient or parameter tolerances was met.
    Convergence,
    /// The iteration cap was reached first.
    NoConvergence,
    /// The problem could not be evaluated or the trust region collapsed.
    Failure,
}

impl TerminationKind {
    pub fn report_name(self) -> &'static str {
        match self {
            TerminationKind::Convergence => "CONVERGENCE",
            TerminationKind::NoConvergence => "NO_CONVERGENCE",
            TerminationKind::Failure => "FAILURE",
        }
    }
}

/// One row of the progress table.
#[derive(Debug, Clone, Serialize)]
pub struct IterationSummary {
    pub iteration: usize,
    pub cost: f64,
    pub cost_change: f64,
    pub gradient_max_norm: f64,
    pub step_norm: f64,
    pub relative_decrease: f64,
    pub trust_region_radius: f64,
    pub step_is_successful: bool,
    pub iteration_time: Duration,
    pub cumulative_time: Duration,
}

impl IterationSummary {
    pub const HEADER: &'static str =
        "iter      cost      cost_change  |gradient|   |step|    tr_ratio  tr_radius  iter_time  total_time";

    pub fn progress_line(&self) -> String {
        format!(
            "{:>4} {:>13} {:>11} {:>11} {:>10} {:>10} {:>10} {:>10} {:>11}",
            self.iteration,
            fmt_sci(self.cost, 6),
            fmt_sci(self.cost_change, 2),
            fmt_sci(self.gradient_max_norm, 2),
            fmt_sci(self.step_norm, 2),
            fmt_sci(self.relative_decrease, 2),
            fmt_sci(self.trust_region_radius, 2),
            fmt_sci(self.iteration_time.as_secs_f64(), 2),
            fmt_sci(self.cumulative_time.as_secs_f64(), 2),
        )
    }
}

/// Everything the minimizer reports about one solve.
#[derive(Debug, Clone, Serialize)]
pub struct SolverSummary {
    pub linear_solver: LinearSolverKind,
    pub num_residuals: usize,
    pub num_parameters: usize,
    pub num_threads: usize,
    pub max_iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub iterations: Vec<IterationSummary>,
    pub successful_steps: usize,
    pub unsuccessful_steps: usize,
    pub termination: TerminationKind,
    pub message: String,
    pub residual_evaluation_time: Duration,
    pub jacobian_evaluation_time: Duration,
    pub linear_solver_time: Duration,
    pub total_time: Duration,
}

impl SolverSummary {
    pub fn is_converged(&self) -> bool {
        self.termination == TerminationKind::Convergence
    }

    /// Number of minimizer iterations, excluding the initial evaluation.
    pub fn num_iterations(&self) -> usize {
        self.successful_steps + self.unsuccessful_steps
    }

    /// One-line summary.
    pub fn brief_report(&self) -> String {
        format!(
            "Levenberg-Marquardt, {}: {} -> {}, iterations: {}, initial cost: {}, final cost: {}, termination: {}",
            self.linear_solver.report_name(),
            self.num_parameters,
            self.num_residuals,
            self.num_iterations(),
            fmt_sci(self.initial_cost, 6),
            fmt_sci(self.final_cost, 6),
            self.termination.report_name(),
        )
    }

    /// Multi-line report, printed verbatim after a solve.
    pub fn full_report(&self) -> String {
        let mut out = String::new();

        out.push_str("\nSolver Summary\n\n");
        out.push_str(&row("Parameter blocks", "1"));
        out.push_str(&row("Parameters", &self.num_parameters.to_string()));
        out.push_str(&row("Residual blocks", &self.num_residuals.to_string()));
        out.push_str(&row("Residuals", &self.num_residuals.to_string()));
        out.push('\n');

        out.push_str(&row("Minimizer", "TRUST_REGION"));
        out.push_str(&row("Trust region strategy", "LEVENBERG_MARQUARDT"));
        out.push_str(&row("Linear solver", self.linear_solver.report_name()));
        out.push_str(&row("Threads", &self.num_threads.to_string()));
        out.push_str(&row("Max iterations", &self.max_iterations.to_string()));
        out.push('\n');

        out.push_str("Cost:\n");
        out.push_str(&row("Initial", &fmt_sci(self.initial_cost, 6)));
        out.push_str(&row("Final", &fmt_sci(self.final_cost, 6)));
        out.push_str(&row("Change", &fmt_sci(self.initial_cost - self.final_cost, 6)));
        out.push('\n');

        out.push_str(&row("Minimizer iterations", &self.num_iterations().to_string()));
        out.push_str(&row("Successful steps", &self.successful_steps.to_string()));
        out.push_str(&row("Unsuccessful steps", &self.unsuccessful_steps.to_string()));
        out.push('\n');

        out.push_str("Time (in seconds):\n");
        out.push_str(&row("Residual evaluation", &fmt_secs(self.residual_evaluation_time)));
        out.push_str(&row("Jacobian evaluation", &fmt_secs(self.jacobian_evaluation_time)));
        out.push_str(&row("Linear solver", &fmt_secs(self.linear_solver_time)));
        out.push_str(&row("Total", &fmt_secs(self.total_time)));
        out.push('\n');

        out.push_str(&format!(
            "Termination: {:>28} ({})\n",
            self.termination.report_name(),
            self.message
        ));

        out
    }
}

fn row(label: &str, value: &str) -> String {
    format!("{label:<28}{value:>20}\n")
}

fn fmt_secs(d: Duration) -> String {
    format!("{:.6}", d.as_secs_f64())
}

/// Scientific notation with a signed, two-digit exponent (`1.234560e+03`).
pub fn fmt_sci(v: f64, precision: usize) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    let s = format!("{v:.precision$e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}
