use alloc::boxed::Box;
use alloc::vec::Vec;

use super::algorithm::{state_of, AlgorithmState, IterativeAlgorithm, RunRecord};
use super::step::{Factorization, StepRule};
use super::stopping::{default_criterion, StoppingCriterion, StoppingSettings};
use super::OptimError;
use crate::dynmatrix::DynMatrix;
use crate::function::{ErrorFunction, RobustFunction};
use crate::loss::{DifferentiableLoss, LocallyQuadraticLoss, Loss, ResidualBlocks, SampleLoss};
use crate::traits::FloatScalar;

struct Run<T> {
    blocks: ResidualBlocks<T>,
    record: RunRecord<T>,
}

/// Gauss-Newton / Levenberg-Marquardt fit of an [`ErrorFunction`] over a
/// list of input samples.
///
/// `initialize()` validates every sample, sizes the stacked residual `f` and
/// Jacobian `J` once, and evaluates the starting point. Each `step()` solves
/// `(JᵀWJ + λI) Δθ = −JᵀWf`, shifts the function's parameters by `Δθ` and
/// re-evaluates `f`, `J` and the cost at the new point. The function owns
/// the parameters throughout; the algorithm only keeps copies of the last
/// and best iterates.
///
/// Changing the function, inputs, targets, weights, robust function or
/// reduction returns the algorithm to the unconfigured state.
pub struct LeastSquares<T: FloatScalar, F: ErrorFunction<T>> {
    loss: SampleLoss<T, F>,
    rule: StepRule<T>,
    factorization: Factorization,
    stopping: Box<dyn StoppingCriterion<T>>,
    run: Option<Run<T>>,
}

impl<T: FloatScalar, F: ErrorFunction<T>> LeastSquares<T, F> {
    /// Minimize `Σ ‖f_i‖²` with undamped Gauss-Newton steps.
    pub fn gauss_newton(function: F, inputs: Vec<F::Input>) -> Self {
        Self::from_loss(SampleLoss::new(function, inputs), StepRule::GaussNewton)
    }

    /// Minimize `Σ ‖f_i‖²` with Levenberg-Marquardt steps, damping 0 until
    /// set with [`set_damping_factor`](Self::set_damping_factor).
    pub fn levenberg_marquardt(function: F, inputs: Vec<F::Input>) -> Self {
        Self::from_loss(
            SampleLoss::new(function, inputs),
            StepRule::LevenbergMarquardt { damping: T::zero() },
        )
    }

    /// Any [`SampleLoss`] variant with the given step rule.
    pub fn from_loss(loss: SampleLoss<T, F>, rule: StepRule<T>) -> Self {
        Self {
            loss,
            rule,
            factorization: Factorization::default(),
            stopping: Box::new(default_criterion()),
            run: None,
        }
    }

    pub fn with_stopping<C: StoppingCriterion<T> + 'static>(mut self, criterion: C) -> Self {
        self.stopping = Box::new(criterion);
        self
    }

    pub fn with_stopping_settings(mut self, settings: StoppingSettings<T>) -> Self {
        self.stopping = settings.criterion();
        self
    }

    pub fn with_factorization(mut self, factorization: Factorization) -> Self {
        self.factorization = factorization;
        self
    }

    /// Set `λ` and switch to Levenberg-Marquardt steps. Takes effect on the
    /// next `step()`. A negative or NaN `damping` leaves the rule unchanged.
    pub fn set_damping_factor(&mut self, damping: T) -> Result<(), OptimError> {
        self.rule = StepRule::levenberg_marquardt(damping)?;
        Ok(())
    }

    pub fn with_damping_factor(mut self, damping: T) -> Result<Self, OptimError> {
        self.set_damping_factor(damping)?;
        Ok(self)
    }

    pub fn with_targets(mut self, targets: Vec<DynMatrix<T>>) -> Result<Self, OptimError> {
        self.loss = self.loss.with_targets(targets)?;
        self.run = None;
        Ok(self)
    }

    pub fn with_weights(mut self, weights: Vec<T>) -> Result<Self, OptimError> {
        self.loss = self.loss.with_weights(weights)?;
        self.run = None;
        Ok(self)
    }

    pub fn with_robust<R: RobustFunction<T> + 'static>(mut self, robust: R) -> Self {
        self.loss = self.loss.with_robust(robust);
        self.run = None;
        self
    }

    /// Use `1/N Σ` instead of `Σ`.
    pub fn mean(mut self) -> Self {
        self.loss = self.loss.mean();
        self.run = None;
        self
    }

    pub fn set_inputs(&mut self, inputs: Vec<F::Input>) -> Result<(), OptimError> {
        self.loss.set_inputs(inputs)?;
        self.run = None;
        Ok(())
    }

    pub fn set_function(&mut self, function: F) {
        self.loss.set_function(function);
        self.run = None;
    }

    /// Discard the run; `initialize()` starts again from the function's
    /// current parameters.
    pub fn reset(&mut self) {
        self.run = None;
    }

    pub fn rule(&self) -> StepRule<T> {
        self.rule
    }

    pub fn damping_factor(&self) -> T {
        self.rule.damping()
    }

    pub fn factorization(&self) -> Factorization {
        self.factorization
    }

    pub fn function(&self) -> &F {
        self.loss.function()
    }

    pub fn into_function(self) -> F {
        self.loss.into_function()
    }

    pub fn loss(&self) -> &SampleLoss<T, F> {
        &self.loss
    }

    /// Stacked residual at the last iterate.
    pub fn residuals(&self) -> Option<&DynMatrix<T>> {
        self.run.as_ref().map(|r| r.blocks.residuals())
    }

    /// Stacked Jacobian at the last iterate.
    pub fn jacobian(&self) -> Option<&DynMatrix<T>> {
        self.run.as_ref().map(|r| r.blocks.jacobian())
    }

    /// Full passes over the inputs so far, validation pass excluded.
    pub fn evaluations(&self) -> usize {
        self.loss.passes()
    }

    fn record(&self) -> Option<&RunRecord<T>> {
        self.run.as_ref().map(|r| &r.record)
    }
}

impl<T: FloatScalar, F: ErrorFunction<T>> AlgorithmState<T> for LeastSquares<T, F> {
    fn iteration_last(&self) -> usize {
        state_of(self.record()).iteration_last()
    }
    fn iteration_best(&self) -> usize {
        state_of(self.record()).iteration_best()
    }
    fn error_last(&self) -> T {
        state_of(self.record()).error_last()
    }
    fn error_best(&self) -> T {
        state_of(self.record()).error_best()
    }
}

impl<T: FloatScalar, F: ErrorFunction<T>> IterativeAlgorithm<T> for LeastSquares<T, F> {
    fn initialize(&mut self) -> Result<(), OptimError> {
        if self.run.is_some() {
            return Err(OptimError::AlreadyInitialized);
        }
        let mut blocks = self.loss.allocate_blocks()?;
        let cost = self.loss.evaluate_blocks(&mut blocks)?;
        log::debug!(
            "least squares ({:?}): {} residual rows, {} degrees of freedom, initial cost {:?}",
            self.rule.kind(),
            blocks.total_rows(),
            blocks.dof(),
            cost
        );
        self.run = Some(Run {
            blocks,
            record: RunRecord::start(self.loss.parameters(), cost),
        });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.run.is_some()
    }

    fn step(&mut self) -> Result<(), OptimError> {
        let run = self.run.as_mut().ok_or(OptimError::NotInitialized)?;
        let gradient = self.loss.gradient()?;
        let hessian = self.loss.gauss_newton_matrix()?;
        let delta = self.rule.solve(hessian, &gradient, self.factorization)?;

        self.loss.shift(&delta)?;
        let cost = self.loss.evaluate_blocks(&mut run.blocks)?;
        run.record.advance(self.loss.parameters(), cost);

        log::debug!(
            "iteration {}: cost {:?}, best {:?} (iteration {}), |Δθ| {:?}",
            run.record.iteration_last(),
            cost,
            run.record.error_best(),
            run.record.iteration_best(),
            delta.norm()
        );
        Ok(())
    }

    fn stopping_criterion(&self) -> &dyn StoppingCriterion<T> {
        &*self.stopping
    }

    fn solution_last(&self) -> Option<&DynMatrix<T>> {
        self.record().map(RunRecord::solution_last)
    }

    fn solution_best(&self) -> Option<&DynMatrix<T>> {
        self.record().map(RunRecord::solution_best)
    }
}
