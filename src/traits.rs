use core::fmt::Debug;
use num_traits::{Float, Num, One, Zero};

/// Trait for types that can be used as matrix elements.
///
/// Blanket-implemented for all types satisfying the bounds.
/// Covers `f32`, `f64`, and all integer types.
pub trait Scalar: Copy + PartialEq + Debug + Zero + One + Num {}

impl<T: Copy + PartialEq + Debug + Zero + One + Num> Scalar for T {}

/// Trait for floating-point matrix elements.
///
/// Required by everything that needs `sqrt`, `abs`, ordered comparison
/// (factorizations, norms, losses, the iteration itself). `'static` so that
/// boxed robust functions and stopping criteria can be stored by value.
pub trait FloatScalar: Scalar + Float + 'static {
    /// Convert a sample count into `Self`.
    #[inline]
    fn from_count(n: usize) -> Self {
        <Self as num_traits::NumCast>::from(n).unwrap_or_else(Self::nan)
    }

    /// Lossy conversion for error reports.
    #[inline]
    fn to_report(self) -> f64 {
        num_traits::ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
    }
}

impl<T: Scalar + Float + 'static> FloatScalar for T {}

/// Read-only access to a matrix-like type.
///
/// Lets the factorization free functions operate on any column-major
/// storage without knowing the concrete type.
pub trait MatrixRef<T> {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
    fn get(&self, row: usize, col: usize) -> &T;

    /// Contiguous slice of column `col`, starting at `row_start`.
    fn col_as_slice(&self, col: usize, row_start: usize) -> &[T];
}

/// Mutable access to a matrix-like type.
///
/// Extends `MatrixRef` with mutable element access, enabling
/// in-place algorithms (Cholesky, LDLᵀ) to work generically.
pub trait MatrixMut<T>: MatrixRef<T> {
    fn get_mut(&mut self, row: usize, col: usize) -> &mut T;

    /// Mutable contiguous slice of column `col`, starting at `row_start`.
    fn col_as_mut_slice(&mut self, col: usize, row_start: usize) -> &mut [T];
}
