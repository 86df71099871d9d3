//! Mathematical utilities: dual numbers and dense damped least squares.

pub mod dual;
pub mod linear;

pub use dual::*;
pub use linear::*;
