use alloc::vec;
use alloc::vec::Vec;

use crate::dynmatrix::DynMatrix;
use crate::traits::FloatScalar;

/// Stacked residual and Jacobian of every sample at one parameter point.
///
/// Sized once from the per-sample output lengths and overwritten in place on
/// every evaluation. Rows of sample `i` occupy `offset(i)..offset(i + 1)`;
/// every row of a sample carries that sample's weight `c_i` (target weight ×
/// robust weight × mean scaling), so `W` is diagonal.
#[derive(Debug, Clone)]
pub struct ResidualBlocks<T> {
    residuals: DynMatrix<T>,
    jacobian: DynMatrix<T>,
    row_weights: Vec<T>,
    offsets: Vec<usize>,
}

impl<T: FloatScalar> ResidualBlocks<T> {
    /// Allocate storage for samples with the given output row counts.
    pub fn new(rows_per_sample: &[usize], dof: usize) -> Self {
        let mut offsets = Vec::with_capacity(rows_per_sample.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for &rows in rows_per_sample {
            total += rows;
            offsets.push(total);
        }
        Self {
            residuals: DynMatrix::zeros(total, 1),
            jacobian: DynMatrix::zeros(total, dof),
            row_weights: vec![T::one(); total],
            offsets,
        }
    }

    /// Number of samples.
    #[inline]
    pub fn samples(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total residual length `Σ rows(output_i)`.
    #[inline]
    pub fn total_rows(&self) -> usize {
        self.residuals.nrows()
    }

    /// Degrees of freedom (Jacobian column count).
    #[inline]
    pub fn dof(&self) -> usize {
        self.jacobian.ncols()
    }

    /// First row of sample `i`.
    #[inline]
    pub fn offset(&self, i: usize) -> usize {
        self.offsets[i]
    }

    /// Row count of sample `i`.
    #[inline]
    pub fn sample_rows(&self, i: usize) -> usize {
        self.offsets[i + 1] - self.offsets[i]
    }

    /// Stacked residual `f`.
    #[inline]
    pub fn residuals(&self) -> &DynMatrix<T> {
        &self.residuals
    }

    /// Stacked Jacobian `J`.
    #[inline]
    pub fn jacobian(&self) -> &DynMatrix<T> {
        &self.jacobian
    }

    /// Diagonal of `W`, one entry per residual row.
    #[inline]
    pub fn row_weights(&self) -> &[T] {
        &self.row_weights
    }

    /// Overwrite sample `i`'s rows. Shapes are checked by the caller.
    pub(crate) fn write_sample(
        &mut self,
        i: usize,
        residual: &DynMatrix<T>,
        jacobian: &DynMatrix<T>,
        weight: T,
    ) {
        let start = self.offsets[i];
        let end = self.offsets[i + 1];
        self.residuals.set_rows(start, residual);
        self.jacobian.set_rows(start, jacobian);
        self.row_weights[start..end].fill(weight);
    }

    /// Normal equations `(JᵀWJ, JᵀWf)`.
    pub fn normal_equations(&self) -> (DynMatrix<T>, DynMatrix<T>) {
        let mut wj = self.jacobian.clone();
        for col in 0..wj.ncols() {
            for (row, &w) in self.row_weights.iter().enumerate() {
                wj[(row, col)] = wj[(row, col)] * w;
            }
        }
        (self.jacobian.tr_mul(&wj), wj.tr_mul(&self.residuals))
    }
}
