use alloc::boxed::Box;

use super::algorithm::{state_of, AlgorithmState, IterativeAlgorithm, RunRecord};
use super::step::{Factorization, StepRule};
use super::stopping::{default_criterion, StoppingCriterion};
use super::OptimError;
use crate::dynmatrix::DynMatrix;
use crate::loss::{DifferentiableLoss, LocallyQuadraticLoss, Loss};
use crate::traits::FloatScalar;

/// Gauss-Newton / Levenberg-Marquardt on any [`LocallyQuadraticLoss`].
///
/// Unlike [`LeastSquares`](super::LeastSquares) this never sees residual
/// blocks; each step reads the loss's gradient and Gauss-Newton matrix,
/// solves for the increment and shifts the loss. With a caching loss such as
/// [`SampleLoss`](crate::loss::SampleLoss) every iterate costs exactly one
/// pass over the inputs.
pub struct LossDescent<T: FloatScalar, L: LocallyQuadraticLoss<T>> {
    loss: L,
    rule: StepRule<T>,
    factorization: Factorization,
    stopping: Box<dyn StoppingCriterion<T>>,
    record: Option<RunRecord<T>>,
}

impl<T: FloatScalar, L: LocallyQuadraticLoss<T>> LossDescent<T, L> {
    pub fn new(loss: L, rule: StepRule<T>) -> Self {
        Self {
            loss,
            rule,
            factorization: Factorization::default(),
            stopping: Box::new(default_criterion()),
            record: None,
        }
    }

    pub fn gauss_newton(loss: L) -> Self {
        Self::new(loss, StepRule::GaussNewton)
    }

    pub fn levenberg_marquardt(loss: L, damping: T) -> Result<Self, OptimError> {
        Ok(Self::new(loss, StepRule::levenberg_marquardt(damping)?))
    }

    pub fn with_stopping<C: StoppingCriterion<T> + 'static>(mut self, criterion: C) -> Self {
        self.stopping = Box::new(criterion);
        self
    }

    pub fn with_factorization(mut self, factorization: Factorization) -> Self {
        self.factorization = factorization;
        self
    }

    /// Switch to Levenberg-Marquardt with damping `λ`.
    pub fn set_damping_factor(&mut self, damping: T) -> Result<(), OptimError> {
        self.rule = StepRule::levenberg_marquardt(damping)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.record = None;
    }

    pub fn loss(&self) -> &L {
        &self.loss
    }

    /// Mutable access to the loss; discards the run.
    pub fn loss_mut(&mut self) -> &mut L {
        self.record = None;
        &mut self.loss
    }

    pub fn into_loss(self) -> L {
        self.loss
    }
}

impl<T: FloatScalar, L: LocallyQuadraticLoss<T>> AlgorithmState<T> for LossDescent<T, L> {
    fn iteration_last(&self) -> usize {
        state_of(self.record.as_ref()).iteration_last()
    }
    fn iteration_best(&self) -> usize {
        state_of(self.record.as_ref()).iteration_best()
    }
    fn error_last(&self) -> T {
        state_of(self.record.as_ref()).error_last()
    }
    fn error_best(&self) -> T {
        state_of(self.record.as_ref()).error_best()
    }
}

impl<T: FloatScalar, L: LocallyQuadraticLoss<T>> IterativeAlgorithm<T> for LossDescent<T, L> {
    fn initialize(&mut self) -> Result<(), OptimError> {
        if self.record.is_some() {
            return Err(OptimError::AlreadyInitialized);
        }
        let cost = self.loss.cost()?;
        self.record = Some(RunRecord::start(self.loss.parameters(), cost));
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.record.is_some()
    }

    fn step(&mut self) -> Result<(), OptimError> {
        let record = self.record.as_mut().ok_or(OptimError::NotInitialized)?;
        let gradient = self.loss.gradient()?;
        let hessian = self.loss.gauss_newton_matrix()?;
        let delta = self.rule.solve(hessian, &gradient, self.factorization)?;

        self.loss.shift(&delta)?;
        let cost = self.loss.cost()?;
        record.advance(self.loss.parameters(), cost);

        log::debug!(
            "iteration {}: cost {:?}, best {:?}, |Δθ| {:?}",
            record.iteration_last(),
            cost,
            record.error_best(),
            delta.norm()
        );
        Ok(())
    }

    fn stopping_criterion(&self) -> &dyn StoppingCriterion<T> {
        &*self.stopping
    }

    fn solution_last(&self) -> Option<&DynMatrix<T>> {
        self.record.as_ref().map(RunRecord::solution_last)
    }

    fn solution_best(&self) -> Option<&DynMatrix<T>> {
        self.record.as_ref().map(RunRecord::solution_best)
    }
}
