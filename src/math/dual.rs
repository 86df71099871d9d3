//! Forward-mode dual numbers for automatic differentiation.
//!
//! A `Dual<N>` carries a value and its gradient with respect to `N` inputs.
//! Residual functions written against [`Scalar`] evaluate on plain `f64`
//! for costs and on `Dual<N>` for one Jacobian row, from the same source.
//!
//! Only the operations the residual models need are implemented
//! (`+`, `-`, `*`, negation, constants).

use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::SVector;

/// Arithmetic a residual model may use.
pub trait Scalar: Copy + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Neg<Output = Self> {
    /// Lift a constant (zero derivative).
    fn constant(value: f64) -> Self;

    /// The real part.
    fn value(&self) -> f64;
}

impl Scalar for f64 {
    fn constant(value: f64) -> Self {
        value
    }

    fn value(&self) -> f64 {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<const N: usize> {
    pub value: f64,
    pub grad: SVector<f64, N>,
}

impl<const N: usize> Dual<N> {
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            grad: SVector::zeros(),
        }
    }

    /// Independent variable `index` of `N`.
    ///
    /// # Panics
    /// Panics if `index >= N`.
    pub fn variable(value: f64, index: usize) -> Self {
        let mut grad = SVector::zeros();
        grad[index] = 1.0;
        Self { value, grad }
    }

    /// Seed every entry of `values` as its own independent variable.
    pub fn variables(values: &[f64; N]) -> [Self; N] {
        std::array::from_fn(|i| Self::variable(values[i], i))
    }
}

impl<const N: usize> Add for Dual<N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
            grad: self.grad + rhs.grad,
        }
    }
}

impl<const N: usize> Sub for Dual<N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
            grad: self.grad - rhs.grad,
        }
    }
}

impl<const N: usize> Mul for Dual<N> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        // Product rule.
        Self {
            value: self.value * rhs.value,
            grad: self.grad * rhs.value + rhs.grad * self.value,
        }
    }
}

impl<const N: usize> Neg for Dual<N> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            value: -self.value,
            grad: -self.grad,
        }
    }
}

impl<const N: usize> Scalar for Dual<N> {
    fn constant(value: f64) -> Self {
        Dual::constant(value)
    }

    fn value(&self) -> f64 {
        self.value
    }
}
