use alloc::vec;
use alloc::vec::Vec;

use crate::traits::{FloatScalar, Scalar};

use super::DynMatrix;

// ── Transpose and transposed products ───────────────────────────────

impl<T: Scalar> DynMatrix<T> {
    /// Transpose.
    pub fn transpose(&self) -> Self {
        DynMatrix::from_fn(self.ncols, self.nrows, |i, j| self[(j, i)])
    }

    /// `selfᵀ * rhs` without materializing the transpose.
    ///
    /// Both operands are stored column-major, so every output element is a
    /// dot product of two contiguous columns.
    ///
    /// ```
    /// use nlsq::DynMatrix;
    /// let j = DynMatrix::from_rows(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
    /// let jtj = j.tr_mul(&j);
    /// assert_eq!(jtj[(0, 0)], 3.0);
    /// assert_eq!(jtj[(0, 1)], 3.0);
    /// assert_eq!(jtj[(1, 1)], 5.0);
    /// ```
    pub fn tr_mul(&self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
        assert_eq!(
            self.nrows, rhs.nrows,
            "dimension mismatch: ({}x{})ᵀ * {}x{}",
            self.nrows, self.ncols, rhs.nrows, rhs.ncols,
        );
        let k = self.nrows;
        let mut data = vec![T::zero(); self.ncols * rhs.ncols];
        for j in 0..rhs.ncols {
            let b = &rhs.data[j * k..(j + 1) * k];
            for i in 0..self.ncols {
                let a = &self.data[i * k..(i + 1) * k];
                data[j * self.ncols + i] = dot_slices(a, b);
            }
        }
        DynMatrix {
            data,
            nrows: self.ncols,
            ncols: rhs.ncols,
        }
    }

    /// Dot product of two equally-shaped matrices (sum of element products).
    pub fn dot(&self, rhs: &DynMatrix<T>) -> T {
        assert_eq!(
            (self.nrows, self.ncols),
            (rhs.nrows, rhs.ncols),
            "dimension mismatch in dot product",
        );
        dot_slices(&self.data, &rhs.data)
    }

    /// Squared Frobenius norm (squared Euclidean norm for vectors).
    pub fn norm_squared(&self) -> T {
        dot_slices(&self.data, &self.data)
    }

    /// Add `value` to every diagonal element in place.
    pub fn add_diagonal(&mut self, value: T) {
        let n = self.nrows.min(self.ncols);
        for i in 0..n {
            self[(i, i)] = self[(i, i)] + value;
        }
    }

    /// Copy `rows` of `src` into `self`, starting at row `row_start`.
    ///
    /// Panics if the column counts differ or the block does not fit.
    pub fn set_rows(&mut self, row_start: usize, src: &DynMatrix<T>) {
        assert_eq!(self.ncols, src.ncols, "column count mismatch in set_rows");
        assert!(
            row_start + src.nrows <= self.nrows,
            "row block {}..{} out of range for {} rows",
            row_start,
            row_start + src.nrows,
            self.nrows,
        );
        for j in 0..self.ncols {
            let dst =
                &mut self.data[j * self.nrows + row_start..j * self.nrows + row_start + src.nrows];
            dst.copy_from_slice(&src.data[j * src.nrows..(j + 1) * src.nrows]);
        }
    }

    /// Extract the rows `row_start..row_start + count` as a new matrix.
    pub fn rows(&self, row_start: usize, count: usize) -> DynMatrix<T> {
        assert!(
            row_start + count <= self.nrows,
            "row block {}..{} out of range for {} rows",
            row_start,
            row_start + count,
            self.nrows,
        );
        DynMatrix::from_fn(count, self.ncols, |i, j| self[(row_start + i, j)])
    }

    /// Stack matrices vertically. All blocks must share a column count.
    ///
    /// ```
    /// use nlsq::DynMatrix;
    /// let a = DynMatrix::column(&[1.0, 2.0]);
    /// let b = DynMatrix::column(&[3.0]);
    /// let s = DynMatrix::vstack(&[&a, &b]);
    /// assert_eq!(s.as_slice(), &[1.0, 2.0, 3.0]);
    /// ```
    pub fn vstack(blocks: &[&DynMatrix<T>]) -> DynMatrix<T> {
        let ncols = blocks.first().map_or(0, |b| b.ncols);
        let nrows = blocks.iter().map(|b| b.nrows).sum();
        let mut out = DynMatrix::zeros(nrows, ncols);
        let mut row = 0;
        for block in blocks {
            out.set_rows(row, block);
            row += block.nrows;
        }
        out
    }

    /// Apply a function to every element, producing a new matrix.
    pub fn map(&self, f: impl Fn(T) -> T) -> DynMatrix<T> {
        let data: Vec<T> = self.data.iter().map(|&x| f(x)).collect();
        DynMatrix {
            data,
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }
}

impl<T: FloatScalar> DynMatrix<T> {
    /// Frobenius norm (Euclidean norm for vectors).
    ///
    /// ```
    /// use nlsq::DynMatrix;
    /// let v = DynMatrix::column(&[3.0_f64, 4.0]);
    /// assert!((v.norm() - 5.0).abs() < 1e-12);
    /// ```
    pub fn norm(&self) -> T {
        self.norm_squared().sqrt()
    }

    /// Whether every element is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

#[inline]
fn dot_slices<T: Scalar>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b.iter())
        .fold(T::zero(), |acc, (&x, &y)| acc + x * y)
}
