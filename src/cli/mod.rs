//! Command-line parsing for the accelerometer calibration tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{GRAVITY, LinearSolverKind, PartialTriple, SampleLayout};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "accel-calib",
    version,
    about = "Tri-axial accelerometer calibration by ellipsoid fitting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit scale and bias to a file of static samples and print the solver report.
    Calibrate(CalibrateArgs),
    /// Generate a synthetic raw dataset from a known calibration.
    Simulate(SimulateArgs),
    /// Correct raw samples with a previously exported calibration.
    Apply(ApplyArgs),
}

/// Options for `calibrate`.
#[derive(Debug, Parser, Clone)]
pub struct CalibrateArgs {
    /// Observation file: whitespace-separated numbers, grouped as (x, y, z).
    #[arg(value_name = "INPUT", env = "ACCEL_CALIB_INPUT")]
    pub input: PathBuf,

    /// Maximum number of minimizer iterations.
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: usize,

    /// Dense linear solver for each trust-region step.
    #[arg(long, value_enum, default_value_t = LinearSolverKind::DenseQr)]
    pub linear_solver: LinearSolverKind,

    /// Local gravity magnitude the corrected samples are fitted to.
    #[arg(long, default_value_t = GRAVITY)]
    pub gravity: f64,

    /// Relative cost change below which the solve stops.
    #[arg(long, default_value_t = 1e-6)]
    pub function_tolerance: f64,

    /// Gradient max-norm below which the solve stops.
    #[arg(long, default_value_t = 1e-10)]
    pub gradient_tolerance: f64,

    /// Relative step size below which the solve stops.
    #[arg(long, default_value_t = 1e-8)]
    pub parameter_tolerance: f64,

    /// Do not print the per-iteration progress table.
    #[arg(long)]
    pub quiet: bool,

    /// What to do with trailing numbers that do not complete a triple.
    #[arg(long, value_enum, default_value_t = PartialTriple::Reject)]
    pub partial: PartialTriple,

    /// Show the N observations with the largest residuals.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export per-observation residuals to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the fitted calibration to JSON.
    #[arg(long = "export-calibration", value_name = "JSON")]
    pub export_calibration: Option<PathBuf>,

    /// Write a markdown debug bundle under `debug/`.
    #[arg(long)]
    pub debug_bundle: bool,
}

/// Options for `simulate`.
#[derive(Debug, Parser)]
pub struct SimulateArgs {
    /// Number of static poses to generate.
    #[arg(short = 'n', long, default_value_t = 24)]
    pub count: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Ground-truth scale factors a1 a2 a3.
    #[arg(long, num_args = 3, value_names = ["A1", "A2", "A3"], default_values_t = [1.0, 1.0, 1.0])]
    pub scale: Vec<f64>,

    /// Ground-truth biases b1 b2 b3.
    #[arg(long, num_args = 3, value_names = ["B1", "B2", "B3"], default_values_t = [0.0, 0.0, 0.0], allow_negative_numbers = true)]
    pub bias: Vec<f64>,

    /// Standard deviation of Gaussian noise on raw readings.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Local gravity magnitude.
    #[arg(long, default_value_t = GRAVITY)]
    pub gravity: f64,

    /// Output layout.
    #[arg(long, value_enum, default_value_t = SampleLayout::Triple)]
    pub layout: SampleLayout,

    /// Output file (stdout when omitted).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Options for `apply`.
#[derive(Debug, Parser)]
pub struct ApplyArgs {
    /// Calibration JSON produced by `calibrate --export-calibration`.
    #[arg(long, value_name = "JSON")]
    pub calibration: PathBuf,

    /// Raw observation file to correct.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// What to do with trailing numbers that do not complete a triple.
    #[arg(long, value_enum, default_value_t = PartialTriple::Reject)]
    pub partial: PartialTriple,

    /// Write corrected samples to a file in this layout instead of printing a table.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Layout for `--output`.
    #[arg(long, value_enum, default_value_t = SampleLayout::Triple)]
    pub layout: SampleLayout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrate_defaults() {
        let cli = Cli::try_parse_from(["accel-calib", "calibrate", "data.txt"]).unwrap();
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        assert_eq!(args.input, PathBuf::from("data.txt"));
        assert_eq!(args.max_iterations, 1000);
        assert_eq!(args.linear_solver, LinearSolverKind::DenseQr);
        assert!(!args.quiet);
        assert!((args.gravity - GRAVITY).abs() < 1e-12);
    }

    #[test]
    fn simulate_takes_three_values_per_vector() {
        let cli = Cli::try_parse_from([
            "accel-calib",
            "simulate",
            "--scale",
            "1.01",
            "0.99",
            "1.0",
            "--bias",
            "-0.1",
            "0.2",
            "0",
            "--layout",
            "single",
        ])
        .unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.scale, vec![1.01, 0.99, 1.0]);
        assert_eq!(args.bias, vec![-0.1, 0.2, 0.0]);
        assert_eq!(args.layout, SampleLayout::Single);
    }

    #[test]
    fn linear_solver_names() {
        let cli = Cli::try_parse_from([
            "accel-calib",
            "calibrate",
            "in.txt",
            "--linear-solver",
            "dense-normal-cholesky",
        ])
        .unwrap();
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        assert_eq!(args.linear_solver, LinearSolverKind::DenseNormalCholesky);
    }
}
