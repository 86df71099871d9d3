//! Synthetic accelerometer datasets.
//!
//! Each sample is a random static pose: a direction drawn uniformly on the unit
//! sphere, scaled to `g`, then pushed through the inverse of a ground-truth
//! calibration so that applying the truth maps it back onto the sphere.
//! Optional Gaussian noise is added to the raw reading.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, UnitSphere};

use crate::domain::{Observation, SimulationConfig};
use crate::error::AppError;

/// Generated raw samples plus the poses they were derived from.
#[derive(Debug, Clone)]
pub struct SampleData {
    pub observations: Vec<Observation>,
    /// Exact sphere points before distortion and noise.
    pub truth_points: Vec<Observation>,
}

pub fn generate_sample(config: &SimulationConfig) -> Result<SampleData, AppError> {
    if config.count == 0 {
        return Err(AppError::input("Sample count must be > 0."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::input("Noise must be a finite, non-negative standard deviation."));
    }
    if !(config.gravity.is_finite() && config.gravity > 0.0) {
        return Err(AppError::input("Gravity must be a positive, finite number."));
    }
    let scale = config.truth.scale();
    if !config.truth.is_initialized() || scale.iter().any(|a| a.abs() < 1e-9) {
        return Err(AppError::input("Ground-truth scale factors must be finite and non-zero."));
    }
    let bias = config.truth.bias();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::numeric(format!("Noise distribution error: {e}")))?;

    let mut observations = Vec::with_capacity(config.count);
    let mut truth_points = Vec::with_capacity(config.count);

    for _ in 0..config.count {
        let dir: [f64; 3] = UnitSphere.sample(&mut rng);
        let point: [f64; 3] = std::array::from_fn(|i| config.gravity * dir[i]);

        // Invert `a·raw + b = point` per axis, then perturb the raw reading.
        let raw: [f64; 3] = std::array::from_fn(|i| {
            let noise = if config.noise > 0.0 { normal.sample(&mut rng) } else { 0.0 };
            (point[i] - bias[i]) / scale[i] + noise
        });

        truth_points.push(Observation::new(point[0], point[1], point[2]));
        observations.push(Observation::new(raw[0], raw[1], raw[2]));
    }

    Ok(SampleData {
        observations,
        truth_points,
    })
}
