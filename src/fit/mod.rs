//! Least-squares calibration engine.
//!
//! Responsibilities:
//!
//! - describe the problem as residuals + Jacobian (`problem`)
//! - run the Levenberg-Marquardt trust-region loop (`solver`)
//! - summarize what happened (`summary`)

pub mod problem;
pub mod solver;
pub mod summary;

pub use problem::*;
pub use solver::*;
pub use summary::*;
