use crate::dynmatrix::DynMatrix;
use crate::traits::FloatScalar;

/// Cost, gradient and Gauss-Newton matrix computed together in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation<T> {
    pub cost: T,
    /// `dof x 1`.
    pub gradient: DynMatrix<T>,
    /// `dof x dof`, symmetric positive semi-definite.
    pub gauss_newton: DynMatrix<T>,
}

/// Explicit cache-invalidation wrapper around an [`Evaluation`].
///
/// Owners call [`LossCache::invalidate`] whenever parameters or inputs
/// change and read through [`LossCache::recompute_if_stale`], which runs the
/// supplied computation at most once per invalidation.
#[derive(Debug, Clone)]
pub struct LossCache<T> {
    valid: bool,
    cost: T,
    gradient: DynMatrix<T>,
    hessian: DynMatrix<T>,
    recomputations: usize,
}

impl<T: FloatScalar> Default for LossCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar> LossCache<T> {
    /// An empty, stale cache.
    pub fn new() -> Self {
        Self {
            valid: false,
            cost: T::nan(),
            gradient: DynMatrix::zeros(0, 1),
            hessian: DynMatrix::zeros(0, 0),
            recomputations: 0,
        }
    }

    /// Mark the cached values stale.
    #[inline]
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Whether the cached values describe the current parameters and inputs.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of times the cache has been filled.
    #[inline]
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Run `compute` if the cache is stale and store its result.
    ///
    /// On error the cache stays stale and the error is returned unchanged.
    pub fn recompute_if_stale<E>(
        &mut self,
        compute: impl FnOnce() -> Result<Evaluation<T>, E>,
    ) -> Result<(), E> {
        if self.valid {
            return Ok(());
        }
        let evaluation = compute()?;
        self.store(evaluation);
        Ok(())
    }

    /// Overwrite the cached values with an evaluation computed elsewhere.
    pub fn store(&mut self, evaluation: Evaluation<T>) {
        self.cost = evaluation.cost;
        self.gradient = evaluation.gradient;
        self.hessian = evaluation.gauss_newton;
        self.valid = true;
        self.recomputations += 1;
        log::trace!(
            "loss cache refreshed (#{}): cost {:?}",
            self.recomputations,
            self.cost
        );
    }

    /// Cached cost. Meaningful only while [`LossCache::is_valid`].
    #[inline]
    pub fn cost(&self) -> T {
        self.cost
    }

    /// Cached gradient.
    #[inline]
    pub fn gradient(&self) -> &DynMatrix<T> {
        &self.gradient
    }

    /// Cached Gauss-Newton matrix.
    #[inline]
    pub fn hessian(&self) -> &DynMatrix<T> {
        &self.hessian
    }
}
