use super::{OptimError, StoppingCriterion};
use crate::dynmatrix::DynMatrix;
use crate::traits::FloatScalar;

/// What a stopping criterion may look at.
pub trait AlgorithmState<T: FloatScalar> {
    /// Number of completed steps.
    fn iteration_last(&self) -> usize;
    /// Step at which the best cost so far was reached.
    fn iteration_best(&self) -> usize;
    /// Cost at the current iterate.
    fn error_last(&self) -> T;
    /// Lowest cost seen so far.
    fn error_best(&self) -> T;
}

/// Last and best iterates of one run.
///
/// A new point replaces the best only on a strict cost decrease, so a NaN
/// cost never becomes best.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord<T> {
    iteration: usize,
    last: DynMatrix<T>,
    error_last: T,
    iteration_best: usize,
    best: DynMatrix<T>,
    error_best: T,
}

impl<T: FloatScalar> RunRecord<T> {
    /// Record the initial point as both last and best.
    pub fn start(theta: DynMatrix<T>, cost: T) -> Self {
        Self {
            iteration: 0,
            best: theta.clone(),
            last: theta,
            error_last: cost,
            iteration_best: 0,
            error_best: cost,
        }
    }

    /// Record the point reached by one more step. Returns whether it improved
    /// on the best.
    pub fn advance(&mut self, theta: DynMatrix<T>, cost: T) -> bool {
        self.iteration += 1;
        self.error_last = cost;
        let improved = cost < self.error_best;
        if improved {
            self.best = theta.clone();
            self.error_best = cost;
            self.iteration_best = self.iteration;
        }
        self.last = theta;
        improved
    }

    pub fn solution_last(&self) -> &DynMatrix<T> {
        &self.last
    }

    pub fn solution_best(&self) -> &DynMatrix<T> {
        &self.best
    }
}

impl<T: FloatScalar> AlgorithmState<T> for RunRecord<T> {
    fn iteration_last(&self) -> usize {
        self.iteration
    }
    fn iteration_best(&self) -> usize {
        self.iteration_best
    }
    fn error_last(&self) -> T {
        self.error_last
    }
    fn error_best(&self) -> T {
        self.error_best
    }
}

/// An optimizer that advances one step at a time.
///
/// Lifecycle: configure, [`initialize`](IterativeAlgorithm::initialize) once,
/// then [`step`](IterativeAlgorithm::step) or
/// [`iterate`](IterativeAlgorithm::iterate). Before initialization the state
/// reports iteration 0 and NaN errors, and both solutions are `None`.
pub trait IterativeAlgorithm<T: FloatScalar>: AlgorithmState<T> {
    /// Evaluate the starting point and record it as best so far.
    fn initialize(&mut self) -> Result<(), OptimError>;

    fn is_initialized(&self) -> bool;

    /// One solve-shift-evaluate cycle.
    ///
    /// The increment is solved at the current iterate, applied, and the new
    /// point is evaluated. Its cost is recorded as `error_last()` and it
    /// replaces the best only on a strict decrease, so `iteration_best()` is
    /// the step that produced the best point (0 for the starting point).
    /// Recording the cost before the shift would report each point one
    /// iteration later. A failed solve leaves the run and the parameters
    /// untouched.
    fn step(&mut self) -> Result<(), OptimError>;

    fn stopping_criterion(&self) -> &dyn StoppingCriterion<T>;

    fn solution_last(&self) -> Option<&DynMatrix<T>>;

    fn solution_best(&self) -> Option<&DynMatrix<T>>;

    /// Step until the stopping criterion is met. Returns the number of steps
    /// taken by this call.
    fn iterate(&mut self) -> Result<usize, OptimError>
    where
        Self: Sized,
    {
        if !self.is_initialized() {
            return Err(OptimError::NotInitialized);
        }
        let mut steps = 0;
        while !self.stopping_criterion().is_finished(&*self) {
            self.step()?;
            steps += 1;
        }
        Ok(steps)
    }
}

/// `AlgorithmState` of an algorithm whose run may not have started.
pub(crate) fn state_of<T: FloatScalar>(record: Option<&RunRecord<T>>) -> RunView<'_, T> {
    RunView(record)
}

pub(crate) struct RunView<'a, T>(Option<&'a RunRecord<T>>);

impl<T: FloatScalar> RunView<'_, T> {
    pub(crate) fn iteration_last(&self) -> usize {
        self.0.map_or(0, |r| r.iteration)
    }
    pub(crate) fn iteration_best(&self) -> usize {
        self.0.map_or(0, |r| r.iteration_best)
    }
    pub(crate) fn error_last(&self) -> T {
        self.0.map_or(T::nan(), |r| r.error_last)
    }
    pub(crate) fn error_best(&self) -> T {
        self.0.map_or(T::nan(), |r| r.error_best)
    }
}
