//! `accel-calib` library crate.
//!
//! The binary (`accel-calib`) is a thin wrapper around this library so that:
//!
//! - the residual model and solver are testable without spawning processes
//! - the solver can be driven from other tools with in-memory observations

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
