use alloc::boxed::Box;

use super::AlgorithmState;
use crate::traits::FloatScalar;

/// Predicate over the run state deciding when iteration ends.
///
/// Criteria compose with [`or`](StoppingCriterion::or) and
/// [`and`](StoppingCriterion::and):
///
/// ```
/// use nlsq::optim::{CostBelow, IterationThreshold, NoImprovement, StoppingCriterion};
///
/// let stop = CostBelow(1e-12_f64)
///     .or(NoImprovement(5))
///     .or(IterationThreshold(200));
/// # let _ = stop;
/// ```
///
/// Any composite used with `iterate()` should contain an
/// [`IterationThreshold`], otherwise termination is not guaranteed.
pub trait StoppingCriterion<T: FloatScalar> {
    fn is_finished(&self, state: &dyn AlgorithmState<T>) -> bool;

    /// Finished when either criterion is.
    fn or<C: StoppingCriterion<T>>(self, other: C) -> Or<Self, C>
    where
        Self: Sized,
    {
        Or(self, other)
    }

    /// Finished when both criteria are.
    fn and<C: StoppingCriterion<T>>(self, other: C) -> And<Self, C>
    where
        Self: Sized,
    {
        And(self, other)
    }
}

impl<T: FloatScalar, C: StoppingCriterion<T> + ?Sized> StoppingCriterion<T> for Box<C> {
    fn is_finished(&self, state: &dyn AlgorithmState<T>) -> bool {
        (**self).is_finished(state)
    }
}

/// Finished once `iteration_last ≥ n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationThreshold(pub usize);

impl<T: FloatScalar> StoppingCriterion<T> for IterationThreshold {
    fn is_finished(&self, state: &dyn AlgorithmState<T>) -> bool {
        state.iteration_last() >= self.0
    }
}

/// Finished once the best cost has not improved for `k` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoImprovement(pub usize);

impl<T: FloatScalar> StoppingCriterion<T> for NoImprovement {
    fn is_finished(&self, state: &dyn AlgorithmState<T>) -> bool {
        state
            .iteration_last()
            .saturating_sub(state.iteration_best())
            >= self.0
    }
}

/// Finished once the best cost is at or below a tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBelow<T>(pub T);

impl<T: FloatScalar> StoppingCriterion<T> for CostBelow<T> {
    fn is_finished(&self, state: &dyn AlgorithmState<T>) -> bool {
        state.error_best() <= self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Or<A, B>(pub A, pub B);

impl<T: FloatScalar, A: StoppingCriterion<T>, B: StoppingCriterion<T>> StoppingCriterion<T>
    for Or<A, B>
{
    fn is_finished(&self, state: &dyn AlgorithmState<T>) -> bool {
        self.0.is_finished(state) || self.1.is_finished(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct And<A, B>(pub A, pub B);

impl<T: FloatScalar, A: StoppingCriterion<T>, B: StoppingCriterion<T>> StoppingCriterion<T>
    for And<A, B>
{
    fn is_finished(&self, state: &dyn AlgorithmState<T>) -> bool {
        self.0.is_finished(state) && self.1.is_finished(state)
    }
}

/// `Or(NoImprovement(20), IterationThreshold(1000))`.
pub fn default_criterion() -> Or<NoImprovement, IterationThreshold> {
    Or(NoImprovement(20), IterationThreshold(1000))
}

/// Settings for the default stopping policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingSettings<T> {
    /// Hard bound on the number of steps.
    pub max_iterations: usize,
    /// Steps without improving the best cost before giving up.
    pub max_stalled_iterations: usize,
    /// Stop as soon as the best cost reaches this value.
    pub cost_tolerance: Option<T>,
}

impl<T> Default for StoppingSettings<T> {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_stalled_iterations: 20,
            cost_tolerance: None,
        }
    }
}

impl<T: FloatScalar> StoppingSettings<T> {
    pub fn criterion(&self) -> Box<dyn StoppingCriterion<T>> {
        let base = Or(
            NoImprovement(self.max_stalled_iterations),
            IterationThreshold(self.max_iterations),
        );
        match self.cost_tolerance {
            Some(tol) => Box::new(Or(base, CostBelow(tol))),
            None => Box::new(base),
        }
    }
}
