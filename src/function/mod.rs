//! Parameterized residual functions and the contracts the optimizers consume.
//!
//! - [`ModelFunction`] — evaluates a residual column vector and its Jacobian
//!   for one input sample at an internally held parameter vector.
//! - [`ErrorFunction`] — adds the shift operation `θ ← θ ⊞ Δ` and the number
//!   of degrees of freedom of `Δ`. The default is Euclidean (`θ + Δ`);
//!   [`ManifoldFunction`] injects any [`Manifold`] instead.
//! - [`RobustFunction`] — scalar shaping `g(s)` of the squared residual norm.
//!
//! # Example
//!
//! ```
//! use nlsq::DynMatrix;
//! use nlsq::function::{ErrorFunction, ModelFunction};
//!
//! /// `f(x, θ) = θ·x − y` for samples `(x, y)`.
//! struct Proportional {
//!     theta: f64,
//!     sample: (f64, f64),
//! }
//!
//! impl ModelFunction<f64> for Proportional {
//!     type Input = (f64, f64);
//!
//!     fn parameters(&self) -> DynMatrix<f64> {
//!         DynMatrix::column(&[self.theta])
//!     }
//!     fn set_parameters(&mut self, theta: &DynMatrix<f64>) {
//!         self.theta = theta[0];
//!     }
//!     fn set_input(&mut self, input: &(f64, f64)) {
//!         self.sample = *input;
//!     }
//!     fn output(&self) -> DynMatrix<f64> {
//!         DynMatrix::column(&[self.theta * self.sample.0 - self.sample.1])
//!     }
//!     fn jacobian(&self) -> DynMatrix<f64> {
//!         DynMatrix::column(&[self.sample.0])
//!     }
//! }
//!
//! impl ErrorFunction<f64> for Proportional {}
//!
//! let mut f = Proportional { theta: 1.0, sample: (0.0, 0.0) };
//! f.set_input(&(2.0, 4.0));
//! assert_eq!(f.output()[0], -2.0);
//! f.shift(&DynMatrix::column(&[1.0]));
//! assert_eq!(f.output()[0], 0.0);
//! ```

mod manifold;
mod robust;

pub use manifold::{Euclidean, Manifold, UnitQuaternion, UnitSphere};
pub use robust::{Cauchy, FnRobust, Huber, Identity, RobustFunction, SoftL1, Tukey};

use crate::dynmatrix::DynMatrix;
use crate::optim::OptimError;
use crate::traits::FloatScalar;

/// A vector-valued function of one input sample and a parameter vector.
///
/// The parameter vector θ is held by the function. `output` and `jacobian`
/// are evaluated at the point defined by the most recent `set_parameters` and
/// `set_input` calls; implementations may evaluate lazily.
///
/// Shape contract (checked by the callers, not here): `parameters()` is a
/// column vector, `output()` is a column vector, and `jacobian()` has one row
/// per output row and one column per degree of freedom.
pub trait ModelFunction<T: FloatScalar> {
    /// One input sample.
    type Input;

    /// Current parameter vector θ as a column vector.
    fn parameters(&self) -> DynMatrix<T>;

    /// Replace θ.
    fn set_parameters(&mut self, theta: &DynMatrix<T>);

    /// Select the input sample subsequent evaluations refer to.
    fn set_input(&mut self, input: &Self::Input);

    /// Residual column vector at the current input and parameters.
    fn output(&self) -> DynMatrix<T>;

    /// Jacobian of [`ModelFunction::output`] with respect to the parameters.
    fn jacobian(&self) -> DynMatrix<T>;
}

/// A [`ModelFunction`] whose parameters are updated by a shift along a
/// tangent space rather than by plain replacement.
///
/// An empty `impl ErrorFunction<T> for MyFunction {}` gives the Euclidean
/// update `θ ← θ + Δ` with `Δ` the same length as θ.
pub trait ErrorFunction<T: FloatScalar>: ModelFunction<T> {
    /// Length of the increments accepted by [`ErrorFunction::shift`], and the
    /// number of Jacobian columns.
    fn degrees_of_freedom(&self) -> usize {
        self.parameters().nrows()
    }

    /// Check that the current parameters are a valid point for
    /// [`ErrorFunction::shift`]. Called once before evaluation begins.
    fn check_parameters(&self) -> Result<(), OptimError> {
        Ok(())
    }

    /// Move the parameters along the increment `delta` (a `dof x 1` column).
    fn shift(&mut self, delta: &DynMatrix<T>) {
        let theta = Euclidean.retract(&self.parameters(), delta);
        self.set_parameters(&theta);
    }
}

impl<T: FloatScalar, F: ModelFunction<T> + ?Sized> ModelFunction<T> for &mut F {
    type Input = F::Input;

    fn parameters(&self) -> DynMatrix<T> {
        (**self).parameters()
    }
    fn set_parameters(&mut self, theta: &DynMatrix<T>) {
        (**self).set_parameters(theta)
    }
    fn set_input(&mut self, input: &Self::Input) {
        (**self).set_input(input)
    }
    fn output(&self) -> DynMatrix<T> {
        (**self).output()
    }
    fn jacobian(&self) -> DynMatrix<T> {
        (**self).jacobian()
    }
}

impl<T: FloatScalar, F: ErrorFunction<T> + ?Sized> ErrorFunction<T> for &mut F {
    fn degrees_of_freedom(&self) -> usize {
        (**self).degrees_of_freedom()
    }
    fn check_parameters(&self) -> Result<(), OptimError> {
        (**self).check_parameters()
    }
    fn shift(&mut self, delta: &DynMatrix<T>) {
        (**self).shift(delta)
    }
}

/// Pairs a [`ModelFunction`] with a [`Manifold`] chart to form an
/// [`ErrorFunction`].
///
/// The wrapped function's Jacobian must be expressed in the manifold's local
/// coordinates (`dof` columns), e.g. by multiplying the ambient Jacobian with
/// [`UnitSphere::tangent_basis`].
#[derive(Debug, Clone)]
pub struct ManifoldFunction<F, M> {
    function: F,
    manifold: M,
}

impl<F, M> ManifoldFunction<F, M> {
    pub fn new(function: F, manifold: M) -> Self {
        Self { function, manifold }
    }

    /// The wrapped function.
    pub fn function(&self) -> &F {
        &self.function
    }

    /// The manifold chart.
    pub fn manifold(&self) -> &M {
        &self.manifold
    }

    /// Unwrap into the function.
    pub fn into_inner(self) -> F {
        self.function
    }
}

impl<T: FloatScalar, F: ModelFunction<T>, M> ModelFunction<T> for ManifoldFunction<F, M> {
    type Input = F::Input;

    fn parameters(&self) -> DynMatrix<T> {
        self.function.parameters()
    }
    fn set_parameters(&mut self, theta: &DynMatrix<T>) {
        self.function.set_parameters(theta)
    }
    fn set_input(&mut self, input: &Self::Input) {
        self.function.set_input(input)
    }
    fn output(&self) -> DynMatrix<T> {
        self.function.output()
    }
    fn jacobian(&self) -> DynMatrix<T> {
        self.function.jacobian()
    }
}

impl<T: FloatScalar, F: ModelFunction<T>, M: Manifold<T>> ErrorFunction<T>
    for ManifoldFunction<F, M>
{
    fn degrees_of_freedom(&self) -> usize {
        self.manifold
            .degrees_of_freedom(&self.function.parameters())
    }

    fn check_parameters(&self) -> Result<(), OptimError> {
        self.manifold.check_point(&self.function.parameters())
    }

    fn shift(&mut self, delta: &DynMatrix<T>) {
        let theta = self.manifold.retract(&self.function.parameters(), delta);
        self.function.set_parameters(&theta);
    }
}
