//! # nlsq
//!
//! Nonlinear least-squares fitting in pure Rust, `no_std` + `alloc`
//! compatible. Finds the parameter vector θ minimizing a (weighted, robust)
//! sum of squared residuals of a parameterized function over a list of input
//! samples, by Gauss-Newton or Levenberg-Marquardt iteration with Cholesky
//! solves of the normal equations.
//!
//! ## Quick start
//!
//! ```
//! use nlsq::DynMatrix;
//! use nlsq::function::{ErrorFunction, ModelFunction};
//! use nlsq::optim::{IterativeAlgorithm, LeastSquares};
//!
//! /// `r = k·x − y` for samples `(x, y)`.
//! struct Gain { k: f64, xy: (f64, f64) }
//!
//! impl ModelFunction<f64> for Gain {
//!     type Input = (f64, f64);
//!     fn parameters(&self) -> DynMatrix<f64> { DynMatrix::column(&[self.k]) }
//!     fn set_parameters(&mut self, theta: &DynMatrix<f64>) { self.k = theta[0]; }
//!     fn set_input(&mut self, xy: &(f64, f64)) { self.xy = *xy; }
//!     fn output(&self) -> DynMatrix<f64> {
//!         DynMatrix::column(&[self.k * self.xy.0 - self.xy.1])
//!     }
//!     fn jacobian(&self) -> DynMatrix<f64> { DynMatrix::column(&[self.xy.0]) }
//! }
//! impl ErrorFunction<f64> for Gain {}
//!
//! let mut fit = LeastSquares::levenberg_marquardt(Gain { k: 0.0, xy: (0.0, 0.0) },
//!     vec![(1.0, 3.0), (2.0, 6.0)])
//!     .with_damping_factor(1e-6)
//!     .unwrap();
//! fit.initialize().unwrap();
//! fit.iterate().unwrap();
//! assert!((fit.solution_best().unwrap()[0] - 3.0).abs() < 1e-4);
//! ```
//!
//! ## Modules
//!
//! - [`function`] — the contracts a model implements: [`function::ModelFunction`]
//!   (residual + Jacobian for one input at the held parameters),
//!   [`function::ErrorFunction`] (shift along a tangent space),
//!   [`function::Manifold`] charts (Euclidean, unit sphere, unit quaternion) and
//!   [`function::RobustFunction`] shaping (Huber, Cauchy, soft-L1, Tukey).
//!
//! - [`loss`] — `Loss` / `DifferentiableLoss` / `LocallyQuadraticLoss`, and
//!   [`loss::SampleLoss`], which aggregates a function over its inputs with
//!   optional targets, weights, robust function and mean reduction. Cost,
//!   gradient and Gauss-Newton matrix are computed in one pass and cached until
//!   the parameters or inputs change.
//!
//! - [`optim`] — step rules, stopping criteria, and the iterative algorithms
//!   [`optim::LeastSquares`] and [`optim::LossDescent`].
//!
//! - [`dynmatrix`] — heap-allocated, column-major [`DynMatrix<T>`] with the
//!   arithmetic the solvers use.
//!
//! - [`linalg`] — Cholesky and LDLᵀ factorizations with triangular solves.
//!   Free functions operate on `&mut impl MatrixMut<T>` in place; wrapper
//!   structs offer `solve()`.
//!
//! - [`quaternion`] — scalar-first `[w, x, y, z]` quaternion used by the
//!   rotation manifold.
//!
//! - [`traits`] — element traits [`Scalar`] and [`FloatScalar`], and
//!   [`MatrixRef`] / [`MatrixMut`] generic access.
//!
//! ## Logging
//!
//! Progress is reported through the [`log`](https://docs.rs/log) facade:
//! `debug` once per iteration, `trace` on every loss re-evaluation, `warn`
//! when the normal equations are not positive definite. Install any logger
//! to see it.
//!
//! ## Cargo features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std`   | yes     | `std::error::Error` impls, hardware float via system libm |
//!
//! Without `std` the crate needs `alloc` and uses the pure-Rust `libm`
//! fallback for float math.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod dynmatrix;
pub mod function;
pub mod linalg;
pub mod loss;
pub mod optim;
pub mod quaternion;
pub mod traits;

pub use dynmatrix::DynMatrix;
pub use quaternion::Quaternion;
pub use traits::{FloatScalar, MatrixMut, MatrixRef, Scalar};
