//! Synthetic data generation for `accel-calib simulate`.

pub mod sample;

pub use sample::*;
