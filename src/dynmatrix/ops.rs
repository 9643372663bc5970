use alloc::vec;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::traits::Scalar;

use super::DynMatrix;

// ── Element-wise addition / subtraction ─────────────────────────────

fn zip_with<T: Scalar>(
    lhs: &DynMatrix<T>,
    rhs: &DynMatrix<T>,
    op: &str,
    f: impl Fn(T, T) -> T,
) -> DynMatrix<T> {
    assert_eq!(
        (lhs.nrows, lhs.ncols),
        (rhs.nrows, rhs.ncols),
        "dimension mismatch: {}x{} {} {}x{}",
        lhs.nrows,
        lhs.ncols,
        op,
        rhs.nrows,
        rhs.ncols,
    );
    let data = lhs
        .data
        .iter()
        .zip(rhs.data.iter())
        .map(|(&a, &b)| f(a, b))
        .collect();
    DynMatrix {
        data,
        nrows: lhs.nrows,
        ncols: lhs.ncols,
    }
}

macro_rules! impl_elementwise {
    ($trait:ident, $method:ident, $sym:literal, $op:tt) => {
        impl<T: Scalar> $trait for DynMatrix<T> {
            type Output = DynMatrix<T>;
            fn $method(self, rhs: DynMatrix<T>) -> DynMatrix<T> {
                zip_with(&self, &rhs, $sym, |a, b| a $op b)
            }
        }

        impl<T: Scalar> $trait<&DynMatrix<T>> for DynMatrix<T> {
            type Output = DynMatrix<T>;
            fn $method(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
                zip_with(&self, rhs, $sym, |a, b| a $op b)
            }
        }

        impl<T: Scalar> $trait<DynMatrix<T>> for &DynMatrix<T> {
            type Output = DynMatrix<T>;
            fn $method(self, rhs: DynMatrix<T>) -> DynMatrix<T> {
                zip_with(self, &rhs, $sym, |a, b| a $op b)
            }
        }

        impl<T: Scalar> $trait<&DynMatrix<T>> for &DynMatrix<T> {
            type Output = DynMatrix<T>;
            fn $method(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
                zip_with(self, rhs, $sym, |a, b| a $op b)
            }
        }
    };
}

impl_elementwise!(Add, add, "+", +);
impl_elementwise!(Sub, sub, "-", -);

impl<T: Scalar> AddAssign<&DynMatrix<T>> for DynMatrix<T> {
    fn add_assign(&mut self, rhs: &DynMatrix<T>) {
        assert_eq!(
            (self.nrows, self.ncols),
            (rhs.nrows, rhs.ncols),
            "dimension mismatch: {}x{} += {}x{}",
            self.nrows,
            self.ncols,
            rhs.nrows,
            rhs.ncols,
        );
        for (a, &b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a = *a + b;
        }
    }
}

impl<T: Scalar> SubAssign<&DynMatrix<T>> for DynMatrix<T> {
    fn sub_assign(&mut self, rhs: &DynMatrix<T>) {
        assert_eq!(
            (self.nrows, self.ncols),
            (rhs.nrows, rhs.ncols),
            "dimension mismatch: {}x{} -= {}x{}",
            self.nrows,
            self.ncols,
            rhs.nrows,
            rhs.ncols,
        );
        for (a, &b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a = *a - b;
        }
    }
}

// ── Negation ────────────────────────────────────────────────────────

impl<T: Scalar + Neg<Output = T>> Neg for DynMatrix<T> {
    type Output = Self;

    fn neg(mut self) -> Self {
        for x in self.data.iter_mut() {
            *x = -*x;
        }
        self
    }
}

impl<T: Scalar + Neg<Output = T>> Neg for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn neg(self) -> DynMatrix<T> {
        -self.clone()
    }
}

// ── Scalar multiplication ───────────────────────────────────────────

impl<T: Scalar> Mul<T> for DynMatrix<T> {
    type Output = Self;

    fn mul(mut self, rhs: T) -> Self {
        self *= rhs;
        self
    }
}

impl<T: Scalar> Mul<T> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn mul(self, rhs: T) -> DynMatrix<T> {
        self.clone() * rhs
    }
}

impl<T: Scalar> MulAssign<T> for DynMatrix<T> {
    fn mul_assign(&mut self, rhs: T) {
        for x in self.data.iter_mut() {
            *x = *x * rhs;
        }
    }
}

// ── Matrix multiplication ───────────────────────────────────────────

impl<T: Scalar> Mul<&DynMatrix<T>> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    /// `(M x K) * (K x N) → (M x N)`.
    fn mul(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
        assert_eq!(
            self.ncols, rhs.nrows,
            "dimension mismatch: {}x{} * {}x{}",
            self.nrows, self.ncols, rhs.nrows, rhs.ncols,
        );
        let m = self.nrows;
        let n = rhs.ncols;
        let mut data = vec![T::zero(); m * n];
        // Column-major: out[:, j] += a[:, k] * b[k, j]
        for j in 0..n {
            let out_col = &mut data[j * m..(j + 1) * m];
            for k in 0..self.ncols {
                let b_kj = rhs.data[j * rhs.nrows + k];
                if b_kj == T::zero() {
                    continue;
                }
                let a_col = &self.data[k * m..(k + 1) * m];
                for (o, &a) in out_col.iter_mut().zip(a_col.iter()) {
                    *o = *o + a * b_kj;
                }
            }
        }
        DynMatrix {
            data,
            nrows: m,
            ncols: n,
        }
    }
}

impl<T: Scalar> Mul for DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn mul(self, rhs: DynMatrix<T>) -> DynMatrix<T> {
        &self * &rhs
    }
}

impl<T: Scalar> Mul<&DynMatrix<T>> for DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn mul(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
        &self * rhs
    }
}
