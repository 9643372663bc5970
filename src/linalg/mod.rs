//! Symmetric factorizations used to solve the normal equations.
//!
//! Free functions operate on `&mut impl MatrixMut<T>` for in-place use;
//! [`DynCholesky`] and [`DynLdlt`] own their factor and offer `solve()`.

pub(crate) mod cholesky;

pub use cholesky::{
    back_substitute_lt, cholesky_in_place, forward_substitute, ldlt_in_place, DynCholesky, DynLdlt,
};

/// Errors from linear algebra operations.
///
/// ```
/// use nlsq::DynMatrix;
/// use nlsq::linalg::LinalgError;
///
/// let not_pd = DynMatrix::from_rows(2, 2, &[1.0_f64, 5.0, 5.0, 1.0]);
/// assert_eq!(not_pd.cholesky().unwrap_err(), LinalgError::NotPositiveDefinite);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinalgError {
    /// Matrix is not positive definite (a pivot was zero, negative or NaN).
    NotPositiveDefinite,
    /// Matrix is not square.
    NotSquare,
}

impl core::fmt::Display for LinalgError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinalgError::NotPositiveDefinite => write!(f, "matrix is not positive definite"),
            LinalgError::NotSquare => write!(f, "matrix is not square"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinalgError {}
