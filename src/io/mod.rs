//! Input/output helpers.
//!
//! - observation file ingest + validation (`ingest`)
//! - residual CSV and observation file exports (`export`)
//! - calibration JSON read/write (`calibration`)

pub mod calibration;
pub mod export;
pub mod ingest;

pub use calibration::*;
pub use export::*;
pub use ingest::*;
