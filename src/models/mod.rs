//! Accelerometer error model.
//!
//! The model is a small, pure function so that the solver can stay generic.

pub mod model;

pub use model::*;
