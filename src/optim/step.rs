use super::OptimError;
use crate::dynmatrix::DynMatrix;
use crate::linalg::{DynCholesky, DynLdlt, LinalgError};
use crate::traits::FloatScalar;

/// Which step rule produced an increment (or failed to).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    GaussNewton,
    LevenbergMarquardt,
}

/// Factorization used to solve the normal equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Factorization {
    /// `A = L Lᵀ`
    #[default]
    Cholesky,
    /// `A = L D Lᵀ` with unit-diagonal `L`; no square roots.
    Ldlt,
}

/// Gauss-Newton or Levenberg-Marquardt increment from the normal equations.
///
/// ```text
/// Gauss-Newton         Δθ = −H⁻¹ g
/// Levenberg-Marquardt  Δθ = −(H + λI)⁻¹ g
/// ```
///
/// with `H = JᵀWJ` and `g = JᵀWf`. `λ = 0` gives exactly the Gauss-Newton
/// increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepRule<T> {
    GaussNewton,
    LevenbergMarquardt { damping: T },
}

impl<T: FloatScalar> StepRule<T> {
    /// Levenberg-Marquardt with damping `λ`. Fails with
    /// [`OptimError::InvalidDamping`] if `damping` is negative or NaN.
    pub fn levenberg_marquardt(damping: T) -> Result<Self, OptimError> {
        if !(damping >= T::zero()) {
            return Err(OptimError::InvalidDamping {
                damping: damping.to_report(),
            });
        }
        Ok(StepRule::LevenbergMarquardt { damping })
    }

    pub fn kind(&self) -> StepKind {
        match self {
            StepRule::GaussNewton => StepKind::GaussNewton,
            StepRule::LevenbergMarquardt { .. } => StepKind::LevenbergMarquardt,
        }
    }

    /// `λ`, zero for Gauss-Newton.
    pub fn damping(&self) -> T {
        match self {
            StepRule::GaussNewton => T::zero(),
            StepRule::LevenbergMarquardt { damping } => *damping,
        }
    }

    /// Solve for the increment. `h` is consumed as factorization storage.
    ///
    /// Fails with [`OptimError::NotPositiveDefinite`] if the (damped) matrix
    /// cannot be factored; this includes NaN entries.
    pub fn solve(
        &self,
        mut h: DynMatrix<T>,
        g: &DynMatrix<T>,
        factorization: Factorization,
    ) -> Result<DynMatrix<T>, OptimError> {
        if !h.is_square() {
            return Err(OptimError::ParameterDimension {
                expected: h.nrows(),
                got: h.ncols(),
            });
        }
        if !g.is_column() || g.nrows() != h.nrows() {
            return Err(OptimError::ParameterDimension {
                expected: h.nrows(),
                got: g.nrows(),
            });
        }
        if let StepRule::LevenbergMarquardt { damping } = *self {
            Self::levenberg_marquardt(damping)?;
            h.add_diagonal(damping);
        }

        let solved = match factorization {
            Factorization::Cholesky => DynCholesky::from_owned(h).map(|c| c.solve(g)),
            Factorization::Ldlt => DynLdlt::from_owned(h).map(|c| c.solve(g)),
        };
        match solved {
            Ok(x) => Ok(-x),
            Err(LinalgError::NotPositiveDefinite) => {
                log::warn!(
                    "{:?} step: normal-equation matrix not positive definite (damping {:?})",
                    self.kind(),
                    self.damping()
                );
                Err(OptimError::NotPositiveDefinite { rule: self.kind() })
            }
            Err(LinalgError::NotSquare) => Err(OptimError::ParameterDimension {
                expected: g.nrows(),
                got: g.nrows(),
            }),
        }
    }
}

/// `Δθ = −H⁻¹ g` by Cholesky.
pub fn gauss_newton_step<T: FloatScalar>(
    h: &DynMatrix<T>,
    g: &DynMatrix<T>,
) -> Result<DynMatrix<T>, OptimError> {
    StepRule::GaussNewton.solve(h.clone(), g, Factorization::Cholesky)
}

/// `Δθ = −(H + λI)⁻¹ g` by Cholesky.
pub fn levenberg_marquardt_step<T: FloatScalar>(
    h: &DynMatrix<T>,
    g: &DynMatrix<T>,
    damping: T,
) -> Result<DynMatrix<T>, OptimError> {
    StepRule::levenberg_marquardt(damping)?.solve(h.clone(), g, Factorization::Cholesky)
}
