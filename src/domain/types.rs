//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during ingest and solving
//! - exported to JSON/CSV
//! - reloaded later to correct new raw samples

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Local gravity magnitude (m/s²) the corrected samples are fitted to.
pub const GRAVITY: f64 = 9.7893;

/// Number of calibration parameters: three scales followed by three biases.
pub const PARAM_COUNT: usize = 6;

/// A solve needs at least as many observations as unknowns.
pub const MIN_OBSERVATIONS: usize = PARAM_COUNT;

/// One static accelerometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Observation {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Ellipsoid calibration parameters `[a1, a2, a3, b1, b2, b3]`.
///
/// A corrected sample is `a_i · raw_i + b_i` per axis. Any non-finite entry
/// marks the vector as not initialized; `solve` refuses to run on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    values: [f64; PARAM_COUNT],
}

impl CalibrationParams {
    /// Starting guess for every solve: unit scale, half-unit bias.
    pub const SEED: [f64; PARAM_COUNT] = [1.0, 1.0, 1.0, 0.5, 0.5, 0.5];

    pub fn seed() -> Self {
        Self { values: Self::SEED }
    }

    pub fn new(values: [f64; PARAM_COUNT]) -> Self {
        Self { values }
    }

    pub fn from_scale_bias(scale: [f64; 3], bias: [f64; 3]) -> Self {
        Self {
            values: [scale[0], scale[1], scale[2], bias[0], bias[1], bias[2]],
        }
    }

    /// A vector nobody has seeded yet.
    pub fn uninitialized() -> Self {
        Self {
            values: [f64::NAN; PARAM_COUNT],
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    pub fn values(&self) -> &[f64; PARAM_COUNT] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64; PARAM_COUNT] {
        &mut self.values
    }

    pub fn scale(&self) -> [f64; 3] {
        [self.values[0], self.values[1], self.values[2]]
    }

    pub fn bias(&self) -> [f64; 3] {
        [self.values[3], self.values[4], self.values[5]]
    }

    /// Apply scale and bias to a raw sample.
    pub fn correct(&self, raw: &Observation) -> Observation {
        let [a1, a2, a3] = self.scale();
        let [b1, b2, b3] = self.bias();
        Observation {
            x: a1 * raw.x + b1,
            y: a2 * raw.y + b2,
            z: a3 * raw.z + b3,
        }
    }
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self::seed()
    }
}

/// Dense linear solver used for each damped trust-region step.
///
/// The parameter block is six-dimensional, so every strategy is direct and dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LinearSolverKind {
    /// Householder QR of the augmented Jacobian `[J; sqrt(λD)]`.
    DenseQr,
    /// Cholesky factorization of the normal equations `JᵀJ + λD`.
    DenseNormalCholesky,
    /// SVD of the augmented Jacobian, tolerant of rank deficiency.
    DenseSvd,
}

impl LinearSolverKind {
    pub fn report_name(self) -> &'static str {
        match self {
            LinearSolverKind::DenseQr => "DENSE_QR",
            LinearSolverKind::DenseNormalCholesky => "DENSE_NORMAL_CHOLESKY",
            LinearSolverKind::DenseSvd => "DENSE_SVD",
        }
    }
}

/// What to do with a trailing group of fewer than three numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PartialTriple {
    /// Fail the ingest.
    Reject,
    /// Drop the leftover numbers and log a warning.
    Truncate,
}

/// How `simulate` lays numbers out in the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SampleLayout {
    /// `x y z` on each line.
    Triple,
    /// One number per line, three lines per observation.
    Single,
}

/// Options for the trust-region solve. Built once per run, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    pub max_iterations: usize,
    pub linear_solver: LinearSolverKind,
    /// Echo the per-iteration progress table to stdout.
    pub progress_to_stdout: bool,
    pub function_tolerance: f64,
    pub gradient_tolerance: f64,
    pub parameter_tolerance: f64,
    /// Radius of the sphere corrected samples should land on.
    pub gravity: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            linear_solver: LinearSolverKind::DenseQr,
            progress_to_stdout: true,
            function_tolerance: 1e-6,
            gradient_tolerance: 1e-10,
            parameter_tolerance: 1e-8,
            gravity: GRAVITY,
        }
    }
}

/// Configuration for one `calibrate` run.
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub input: PathBuf,
    pub partial: PartialTriple,
    pub solver: SolverConfig,
    /// Number of largest residuals to list.
    pub top_n: usize,
    pub export_residuals: Option<PathBuf>,
    pub export_calibration: Option<PathBuf>,
    pub debug_bundle: bool,
}

/// Per-observation fit diagnostics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ObservationResidual {
    /// Zero-based position in the input.
    pub index: usize,
    pub raw: Observation,
    pub corrected: Observation,
    pub residual: f64,
}

impl ObservationResidual {
    pub fn corrected_norm(&self) -> f64 {
        self.corrected.norm()
    }
}

/// Parameters for synthetic dataset generation.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub count: usize,
    pub seed: u64,
    /// Ground-truth calibration the raw samples are distorted from.
    pub truth: CalibrationParams,
    /// Standard deviation of additive Gaussian noise on raw readings.
    pub noise: f64,
    pub gravity: f64,
    pub layout: SampleLayout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_matches_starting_guess() {
        let p = CalibrationParams::seed();
        assert_eq!(p.scale(), [1.0, 1.0, 1.0]);
        assert_eq!(p.bias(), [0.5, 0.5, 0.5]);
        assert!(p.is_initialized());
    }

    #[test]
    fn uninitialized_is_detected() {
        assert!(!CalibrationParams::uninitialized().is_initialized());
        let mut p = CalibrationParams::seed();
        p.values_mut()[4] = f64::INFINITY;
        assert!(!p.is_initialized());
    }

    #[test]
    fn correct_applies_scale_then_bias() {
        let p = CalibrationParams::from_scale_bias([2.0, 0.5, 1.0], [0.1, -0.2, 0.3]);
        let c = p.correct(&Observation::new(1.0, 4.0, -3.0));
        assert!((c.x - 2.1).abs() < 1e-12);
        assert!((c.y - 1.8).abs() < 1e-12);
        assert!((c.z + 2.7).abs() < 1e-12);
    }

    #[test]
    fn default_solver_config() {
        let c = SolverConfig::default();
        assert_eq!(c.max_iterations, 1000);
        assert_eq!(c.linear_solver, LinearSolverKind::DenseQr);
        assert!(c.progress_to_stdout);
        assert!((c.gravity - 9.7893).abs() < 1e-12);
    }
}
