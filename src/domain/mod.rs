//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw samples and calibration parameters (`Observation`, `CalibrationParams`)
//! - solver/run configuration (`SolverConfig`, `CalibrationConfig`, `SimulationConfig`)
//! - CLI-facing enums (`LinearSolverKind`, `PartialTriple`, `SampleLayout`)

pub mod types;

pub use types::*;
