use alloc::vec;

use crate::dynmatrix::DynMatrix;
use crate::linalg::LinalgError;
use crate::traits::{FloatScalar, MatrixMut, MatrixRef};

// ---------------------------------------------------------------------------
// In-place factorizations
// ---------------------------------------------------------------------------

/// Cholesky decomposition in place: A = L * Lᵀ.
///
/// On return, the lower triangle of `a` (including diagonal) contains L.
/// The upper triangle is left unchanged.
///
/// Returns an error if a pivot is not strictly positive. NaN pivots fail too,
/// so non-finite input never produces a factor.
#[inline]
pub fn cholesky_in_place<T: FloatScalar>(a: &mut impl MatrixMut<T>) -> Result<(), LinalgError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(LinalgError::NotSquare);
    }

    for j in 0..n {
        // col_j[j..] -= L[j,k] * col_k[j..] for every finished column k
        for k in 0..j {
            let ljk = *a.get(j, k);
            if ljk == T::zero() {
                continue;
            }
            for i in j..n {
                let v = *a.get(i, j) - ljk * *a.get(i, k);
                *a.get_mut(i, j) = v;
            }
        }

        let diag = *a.get(j, j);
        if !(diag > T::zero()) {
            return Err(LinalgError::NotPositiveDefinite);
        }
        let ljj = diag.sqrt();
        *a.get_mut(j, j) = ljj;

        let inv_ljj = T::one() / ljj;
        for x in a.col_as_mut_slice(j, j + 1).iter_mut() {
            *x = *x * inv_ljj;
        }
    }

    Ok(())
}

/// LDLᵀ decomposition in place, without pivoting: A = L * D * Lᵀ.
///
/// On return, the strict lower triangle of `a` holds the unit lower factor L
/// and the diagonal holds D. Requires every pivot `D[j]` to be strictly
/// positive, i.e. the same matrices Cholesky accepts, but avoids square roots.
pub fn ldlt_in_place<T: FloatScalar>(a: &mut impl MatrixMut<T>) -> Result<(), LinalgError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(LinalgError::NotSquare);
    }

    for j in 0..n {
        let mut dj = *a.get(j, j);
        for k in 0..j {
            let ljk = *a.get(j, k);
            dj = dj - ljk * ljk * *a.get(k, k);
        }
        if !(dj > T::zero()) {
            return Err(LinalgError::NotPositiveDefinite);
        }
        *a.get_mut(j, j) = dj;

        for i in (j + 1)..n {
            let mut v = *a.get(i, j);
            for k in 0..j {
                v = v - *a.get(i, k) * *a.get(j, k) * *a.get(k, k);
            }
            *a.get_mut(i, j) = v / dj;
        }
    }

    Ok(())
}

/// Solve L*x = b by forward substitution, where L is lower triangular.
#[inline]
pub fn forward_substitute<T: FloatScalar>(l: &impl MatrixRef<T>, b: &[T], x: &mut [T]) {
    let n = l.nrows();
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum = sum - *l.get(i, j) * x[j];
        }
        x[i] = sum / *l.get(i, i);
    }
}

/// Solve Lᵀ * x = b by back substitution, where L is lower triangular.
#[inline]
pub fn back_substitute_lt<T: FloatScalar>(l: &impl MatrixRef<T>, b: &[T], x: &mut [T]) {
    let n = l.nrows();
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum = sum - *l.get(j, i) * x[j];
        }
        x[i] = sum / *l.get(i, i);
    }
}

// ---------------------------------------------------------------------------
// Owning wrappers
// ---------------------------------------------------------------------------

/// Cholesky decomposition of a dynamically-sized positive-definite matrix.
///
/// Stores the lower triangular factor L where `A = L * Lᵀ`.
///
/// # Example
///
/// ```
/// use nlsq::DynMatrix;
///
/// let a = DynMatrix::from_rows(2, 2, &[4.0_f64, 2.0, 2.0, 3.0]);
/// let chol = a.cholesky().unwrap();
/// let x = chol.solve(&DynMatrix::column(&[8.0, 7.0]));
/// assert!((chol.det() - 8.0).abs() < 1e-12);
/// assert!((x[0] - 1.25).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct DynCholesky<T> {
    l: DynMatrix<T>,
}

impl<T: FloatScalar> DynCholesky<T> {
    /// Decompose a positive-definite matrix (copies it first).
    pub fn new(a: &DynMatrix<T>) -> Result<Self, LinalgError> {
        Self::from_owned(a.clone())
    }

    /// Decompose a positive-definite matrix, reusing its storage for the factor.
    pub fn from_owned(mut a: DynMatrix<T>) -> Result<Self, LinalgError> {
        cholesky_in_place(&mut a)?;
        Ok(Self { l: a })
    }

    /// Reference to the packed factor (upper triangle is stale input data).
    #[inline]
    pub fn l(&self) -> &DynMatrix<T> {
        &self.l
    }

    /// Extract the full lower triangular factor (zeros above diagonal).
    pub fn l_full(&self) -> DynMatrix<T> {
        let n = self.l.nrows();
        DynMatrix::from_fn(n, n, |i, j| if j <= i { self.l[(i, j)] } else { T::zero() })
    }

    /// Solve A*x = b for a column vector `b`.
    pub fn solve(&self, b: &DynMatrix<T>) -> DynMatrix<T> {
        let n = self.l.nrows();
        assert_eq!(
            (b.nrows(), b.ncols()),
            (n, 1),
            "rhs must be a {}x1 column vector",
            n
        );
        let mut y = vec![T::zero(); n];
        forward_substitute(&self.l, b.as_slice(), &mut y);
        let mut x = vec![T::zero(); n];
        back_substitute_lt(&self.l, &y, &mut x);
        DynMatrix::from_vec(n, 1, x)
    }

    /// Determinant: det(A) = product(L\[i\]\[i\])^2.
    pub fn det(&self) -> T {
        let n = self.l.nrows();
        let mut prod = T::one();
        for i in 0..n {
            prod = prod * self.l[(i, i)];
        }
        prod * prod
    }
}

/// LDLᵀ decomposition of a dynamically-sized positive-definite matrix.
///
/// ```
/// use nlsq::DynMatrix;
///
/// let a = DynMatrix::from_rows(2, 2, &[4.0_f64, 2.0, 2.0, 3.0]);
/// let ldlt = a.ldlt().unwrap();
/// let x = ldlt.solve(&DynMatrix::column(&[8.0, 7.0]));
/// assert!((x[1] - 1.5).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct DynLdlt<T> {
    packed: DynMatrix<T>,
}

impl<T: FloatScalar> DynLdlt<T> {
    /// Decompose a positive-definite matrix (copies it first).
    pub fn new(a: &DynMatrix<T>) -> Result<Self, LinalgError> {
        Self::from_owned(a.clone())
    }

    /// Decompose a positive-definite matrix, reusing its storage.
    pub fn from_owned(mut a: DynMatrix<T>) -> Result<Self, LinalgError> {
        ldlt_in_place(&mut a)?;
        Ok(Self { packed: a })
    }

    /// Diagonal factor D as a column vector.
    pub fn d(&self) -> DynMatrix<T> {
        let n = self.packed.nrows();
        DynMatrix::from_fn(n, 1, |i, _| self.packed[(i, i)])
    }

    /// Solve A*x = b for a column vector `b`.
    pub fn solve(&self, b: &DynMatrix<T>) -> DynMatrix<T> {
        let n = self.packed.nrows();
        assert_eq!(
            (b.nrows(), b.ncols()),
            (n, 1),
            "rhs must be a {}x1 column vector",
            n
        );
        let p = &self.packed;

        // L y = b (unit diagonal)
        let mut x = b.as_slice().to_vec();
        for i in 0..n {
            for j in 0..i {
                x[i] = x[i] - p[(i, j)] * x[j];
            }
        }
        // D z = y
        for i in 0..n {
            x[i] = x[i] / p[(i, i)];
        }
        // Lᵀ x = z
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] = x[i] - p[(j, i)] * x[j];
            }
        }
        DynMatrix::from_vec(n, 1, x)
    }
}

/// Convenience methods on square matrices.
impl<T: FloatScalar> DynMatrix<T> {
    /// Cholesky decomposition (`A = L * Lᵀ`).
    pub fn cholesky(&self) -> Result<DynCholesky<T>, LinalgError> {
        DynCholesky::new(self)
    }

    /// LDLᵀ decomposition (`A = L * D * Lᵀ`, unit L).
    pub fn ldlt(&self) -> Result<DynLdlt<T>, LinalgError> {
        DynLdlt::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd_3x3() -> DynMatrix<f64> {
        DynMatrix::from_rows(3, 3, &[4.0, 2.0, 1.0, 2.0, 10.0, 3.5, 1.0, 3.5, 4.5])
    }

    fn assert_solves(a: &DynMatrix<f64>, x: &DynMatrix<f64>, b: &DynMatrix<f64>) {
        let r = a * x - b;
        assert!(r.norm() < 1e-10, "residual {:?}", r.as_slice());
    }

    #[test]
    fn cholesky_reconstructs() {
        let a = spd_3x3();
        let l = a.cholesky().unwrap().l_full();
        let reconstructed = &l * &l.transpose();
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (reconstructed[(i, j)] - a[(i, j)]).abs() < 1e-12,
                    "mismatch at ({},{})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn cholesky_solve_3x3() {
        let a = spd_3x3();
        let b = DynMatrix::column(&[1.0, 2.0, 3.0]);
        let x = a.cholesky().unwrap().solve(&b);
        assert_solves(&a, &x, &b);
    }

    #[test]
    fn ldlt_matches_cholesky() {
        let a = spd_3x3();
        let b = DynMatrix::column(&[-1.0, 0.5, 2.0]);
        let x_chol = a.cholesky().unwrap().solve(&b);
        let x_ldlt = a.ldlt().unwrap().solve(&b);
        assert!((&x_chol - &x_ldlt).norm() < 1e-12);
        assert_solves(&a, &x_ldlt, &b);
    }

    #[test]
    fn ldlt_diagonal_is_squared_cholesky_diagonal() {
        let a = spd_3x3();
        let l = a.cholesky().unwrap().l_full();
        let d = a.ldlt().unwrap().d();
        for i in 0..3 {
            assert!((d[i] - l[(i, i)] * l[(i, i)]).abs() < 1e-12);
        }
    }

    #[test]
    fn not_positive_definite() {
        let a = DynMatrix::from_rows(2, 2, &[1.0_f64, 5.0, 5.0, 1.0]);
        assert_eq!(a.cholesky().unwrap_err(), LinalgError::NotPositiveDefinite);
        assert_eq!(a.ldlt().unwrap_err(), LinalgError::NotPositiveDefinite);
    }

    #[test]
    fn singular_zero_matrix_fails() {
        let a = DynMatrix::<f64>::zeros(2, 2);
        assert_eq!(a.cholesky().unwrap_err(), LinalgError::NotPositiveDefinite);
    }

    #[test]
    fn nan_fails() {
        let a = DynMatrix::from_rows(2, 2, &[f64::NAN, 0.0, 0.0, 1.0]);
        assert_eq!(a.cholesky().unwrap_err(), LinalgError::NotPositiveDefinite);
        assert_eq!(a.ldlt().unwrap_err(), LinalgError::NotPositiveDefinite);
    }

    #[test]
    fn not_square() {
        let mut a = DynMatrix::<f64>::zeros(2, 3);
        assert_eq!(
            cholesky_in_place(&mut a).unwrap_err(),
            LinalgError::NotSquare
        );
    }

    #[test]
    fn identity() {
        let id = DynMatrix::<f64>::eye(3);
        assert_eq!(id.cholesky().unwrap().l_full(), id);
    }
}
