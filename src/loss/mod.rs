//! Scalar losses over a parameterized function.
//!
//! Three capability levels, each a supertrait of the next:
//!
//! | Trait                    | Adds                                       |
//! |--------------------------|--------------------------------------------|
//! | [`Loss`]                 | cost, parameter access, shift              |
//! | [`DifferentiableLoss`]   | gradient `Σ c_i J_iᵀ e_i`                  |
//! | [`LocallyQuadraticLoss`] | Gauss-Newton matrix `Σ c_i J_iᵀ J_i`       |
//!
//! [`SampleLoss`] implements all three by aggregating a residual
//! function over a list of input samples. Plain, mean, target, weighted and
//! robust variants are one aggregation routine parameterized by a per-sample
//! [`Contribution`]; the resulting cost, gradient and Gauss-Newton matrix are
//! computed together in one pass and kept in a [`LossCache`] until the
//! parameters or inputs change.
//!
//! Getters take `&mut self` because a stale cache is refreshed on read.

mod blocks;
mod cache;
mod sample;


pub use blocks::ResidualBlocks;
pub use cache::{Evaluation, LossCache};
pub use sample::{Contribution, Reduction, SampleLoss};

use crate::dynmatrix::DynMatrix;
use crate::optim::OptimError;
use crate::traits::FloatScalar;

/// A scalar cost of a parameter vector.
pub trait Loss<T: FloatScalar> {
    /// Current parameter vector.
    fn parameters(&self) -> DynMatrix<T>;

    /// Replace the parameters. Invalidates any cached evaluation.
    fn set_parameters(&mut self, theta: &DynMatrix<T>) -> Result<(), OptimError>;

    /// Length of the increments accepted by [`Loss::shift`].
    fn degrees_of_freedom(&self) -> usize;

    /// `θ ← θ ⊞ Δ`. Invalidates any cached evaluation.
    fn shift(&mut self, delta: &DynMatrix<T>) -> Result<(), OptimError>;

    /// Cost at the current parameters.
    fn cost(&mut self) -> Result<T, OptimError>;
}

/// A [`Loss`] with a gradient (in the tangent coordinates of `shift`).
pub trait DifferentiableLoss<T: FloatScalar>: Loss<T> {
    fn gradient(&mut self) -> Result<DynMatrix<T>, OptimError>;
}

/// A [`DifferentiableLoss`] with a positive semi-definite local quadratic
/// model: `cost(θ ⊞ Δ) ≈ cost(θ) + 2 gᵀΔ + Δᵀ H Δ`.
pub trait LocallyQuadraticLoss<T: FloatScalar>: DifferentiableLoss<T> {
    fn gauss_newton_matrix(&mut self) -> Result<DynMatrix<T>, OptimError>;

    /// Cost, gradient and Gauss-Newton matrix at the current parameters.
    fn evaluate(&mut self) -> Result<Evaluation<T>, OptimError> {
        Ok(Evaluation {
            cost: self.cost()?,
            gradient: self.gradient()?,
            gauss_newton: self.gauss_newton_matrix()?,
        })
    }
}
