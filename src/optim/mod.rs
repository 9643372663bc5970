//! Iterative nonlinear least-squares: step solvers, stopping criteria and the
//! algorithms that drive them.
//!
//! # Algorithms
//!
//! - [`LeastSquares`] — Gauss-Newton / Levenberg-Marquardt over a list of
//!   input samples. Keeps the stacked residual and Jacobian blocks of the
//!   current iterate and solves the normal equations `(JᵀWJ + λI) Δθ = −JᵀWf`.
//! - [`LossDescent`] — the same iteration driven by any
//!   [`LocallyQuadraticLoss`](crate::loss::LocallyQuadraticLoss) through its
//!   gradient and Gauss-Newton matrix.
//!
//! Both implement [`IterativeAlgorithm`]: `initialize()` once, then `step()`
//! or `iterate()` until the configured [`StoppingCriterion`] fires.
//!
//! # Step solver
//!
//! [`StepRule`] turns a Gauss-Newton matrix and gradient into an increment by
//! Cholesky (or LDLᵀ, see [`Factorization`]) factorization. A matrix that is
//! not positive definite is a hard error ([`OptimError::NotPositiveDefinite`]);
//! nothing is retried internally.
//!
//! # Example
//!
//! ```
//! use nlsq::DynMatrix;
//! use nlsq::function::{ErrorFunction, ModelFunction};
//! use nlsq::optim::{IterativeAlgorithm, LeastSquares};
//!
//! // y = a * x + b, residual a*x + b - y
//! struct Line { p: DynMatrix<f64>, xy: (f64, f64) }
//!
//! impl ModelFunction<f64> for Line {
//!     type Input = (f64, f64);
//!     fn parameters(&self) -> DynMatrix<f64> { self.p.clone() }
//!     fn set_parameters(&mut self, theta: &DynMatrix<f64>) { self.p = theta.clone(); }
//!     fn set_input(&mut self, input: &(f64, f64)) { self.xy = *input; }
//!     fn output(&self) -> DynMatrix<f64> {
//!         DynMatrix::column(&[self.p[0] * self.xy.0 + self.p[1] - self.xy.1])
//!     }
//!     fn jacobian(&self) -> DynMatrix<f64> {
//!         DynMatrix::from_rows(1, 2, &[self.xy.0, 1.0])
//!     }
//! }
//! impl ErrorFunction<f64> for Line {}
//!
//! let line = Line { p: DynMatrix::column(&[0.0, 0.0]), xy: (0.0, 0.0) };
//! let samples = vec![(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)];
//! let mut lsq = LeastSquares::gauss_newton(line, samples);
//! lsq.initialize().unwrap();
//! lsq.iterate().unwrap();
//!
//! let best = lsq.solution_best().unwrap();
//! assert!((best[0] - 2.0).abs() < 1e-10);
//! assert!((best[1] - 1.0).abs() < 1e-10);
//! ```

mod algorithm;
mod descent;
mod least_squares;
mod step;
mod stopping;

#[cfg(test)]
mod tests;

pub use algorithm::{AlgorithmState, IterativeAlgorithm, RunRecord};
pub use descent::LossDescent;
pub use least_squares::LeastSquares;
pub use step::{gauss_newton_step, levenberg_marquardt_step, Factorization, StepKind, StepRule};
pub use stopping::{
    default_criterion, And, CostBelow, IterationThreshold, NoImprovement, Or, StoppingCriterion,
    StoppingSettings,
};

/// Coarse classification of [`OptimError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inconsistent problem setup; fix the inputs and reconstruct.
    Configuration,
    /// The normal equations could not be solved at the current damping.
    Numerical,
    /// Operations called in the wrong order.
    Sequencing,
}

/// Errors from loss evaluation and the iterative algorithms.
///
/// Every error aborts the current run; nothing is clamped or retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimError {
    /// A per-sample list (targets, weights) does not match the number of inputs.
    SizeMismatch {
        what: &'static str,
        inputs: usize,
        got: usize,
    },
    /// A vector that must be `n x 1` is not.
    NotColumnVector {
        what: &'static str,
        rows: usize,
        cols: usize,
    },
    /// A sample's Jacobian row count differs from its output row count.
    JacobianRowMismatch {
        sample: usize,
        output_rows: usize,
        jacobian_rows: usize,
    },
    /// A sample's Jacobian column count differs from the degrees of freedom.
    JacobianColumnMismatch {
        sample: usize,
        expected: usize,
        got: usize,
    },
    /// A sample's target has a different length than its output.
    TargetMismatch {
        sample: usize,
        output_rows: usize,
        target_rows: usize,
    },
    /// A sample's output length changed after the residual storage was sized.
    OutputSizeChanged {
        sample: usize,
        expected: usize,
        got: usize,
    },
    /// The parameter (or increment) length differs from the one fixed when
    /// evaluation began.
    ParameterDimension { expected: usize, got: usize },
    /// The input list is empty.
    NoInputs,
    /// Levenberg-Marquardt damping factor is negative or NaN.
    InvalidDamping { damping: f64 },
    /// A robust function's scale or threshold is not strictly positive.
    InvalidRobustScale { function: &'static str, scale: f64 },
    /// The parameter vector does not fit the manifold chart.
    ManifoldDimension {
        manifold: &'static str,
        rows: usize,
        cols: usize,
    },
    /// The (damped) Gauss-Newton matrix is not positive definite.
    NotPositiveDefinite { rule: StepKind },
    /// `step()` or `iterate()` called before `initialize()`.
    NotInitialized,
    /// `initialize()` called on an algorithm that is already running.
    AlreadyInitialized,
}

impl OptimError {
    /// Which part of the error taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OptimError::NotPositiveDefinite { .. } => ErrorKind::Numerical,
            OptimError::NotInitialized | OptimError::AlreadyInitialized => ErrorKind::Sequencing,
            _ => ErrorKind::Configuration,
        }
    }
}

impl core::fmt::Display for OptimError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OptimError::SizeMismatch { what, inputs, got } => {
                write!(f, "{} {} given for {} inputs", got, what, inputs)
            }
            OptimError::NotColumnVector { what, rows, cols } => {
                write!(f, "{} must be a column vector, got {}x{}", what, rows, cols)
            }
            OptimError::JacobianRowMismatch {
                sample,
                output_rows,
                jacobian_rows,
            } => write!(
                f,
                "sample {}: jacobian has {} rows but output has {}",
                sample, jacobian_rows, output_rows
            ),
            OptimError::JacobianColumnMismatch {
                sample,
                expected,
                got,
            } => write!(
                f,
                "sample {}: jacobian has {} columns, expected {} degrees of freedom",
                sample, got, expected
            ),
            OptimError::TargetMismatch {
                sample,
                output_rows,
                target_rows,
            } => write!(
                f,
                "sample {}: target has {} rows but output has {}",
                sample, target_rows, output_rows
            ),
            OptimError::OutputSizeChanged {
                sample,
                expected,
                got,
            } => write!(
                f,
                "sample {}: output size changed from {} to {} rows",
                sample, expected, got
            ),
            OptimError::ParameterDimension { expected, got } => write!(
                f,
                "parameter dimension changed: expected {}, got {}",
                expected, got
            ),
            OptimError::NoInputs => write!(f, "no input samples"),
            OptimError::InvalidDamping { damping } => {
                write!(f, "damping factor must be non-negative, got {}", damping)
            }
            OptimError::InvalidRobustScale { function, scale } => {
                write!(f, "{} scale must be positive, got {}", function, scale)
            }
            OptimError::ManifoldDimension {
                manifold,
                rows,
                cols,
            } => write!(
                f,
                "{} parameters do not fit the chart: got {}x{}",
                manifold, rows, cols
            ),
            OptimError::NotPositiveDefinite { rule } => match rule {
                StepKind::GaussNewton => write!(
                    f,
                    "Gauss-Newton matrix is not positive definite; \
                     use Levenberg-Marquardt with a positive damping factor"
                ),
                StepKind::LevenbergMarquardt => write!(
                    f,
                    "damped Gauss-Newton matrix is not positive definite; \
                     increase the Levenberg-Marquardt damping factor"
                ),
            },
            OptimError::NotInitialized => write!(f, "initialize() must be called before step()"),
            OptimError::AlreadyInitialized => {
                write!(
                    f,
                    "algorithm already initialized; reset() before re-initializing"
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OptimError {}
