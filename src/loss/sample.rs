use alloc::boxed::Box;
use alloc::vec::Vec;

use super::blocks::ResidualBlocks;
use super::cache::{Evaluation, LossCache};
use super::{DifferentiableLoss, LocallyQuadraticLoss, Loss};
use crate::dynmatrix::DynMatrix;
use crate::function::{ErrorFunction, Identity, ModelFunction, RobustFunction};
use crate::optim::OptimError;
use crate::traits::FloatScalar;

/// How per-sample terms are combined into the cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// `Σ term_i`
    #[default]
    Sum,
    /// `1/N Σ term_i`
    Mean,
}

/// Per-sample contribution strategy, composed once at construction.
///
/// For sample `i` with residual `e_i = f_i − y_i` (or `f_i` without targets)
/// and `s_i = ‖e_i‖²`:
///
/// ```text
/// cost term    w_i · g(s_i)  · r
/// coefficient  w_i · g'(s_i) · r      r = 1/N for Mean, 1 for Sum
/// ```
///
/// The coefficient scales both `J_iᵀ e_i` and `J_iᵀ J_i`. Without a robust
/// function `g` is the identity, so every variant runs the same arithmetic.
pub struct Contribution<T> {
    reduction: Reduction,
    targets: Option<Vec<DynMatrix<T>>>,
    weights: Option<Vec<T>>,
    robust: Box<dyn RobustFunction<T>>,
}

impl<T: FloatScalar> Default for Contribution<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar> Contribution<T> {
    /// Unweighted sum of squared residual norms.
    pub fn new() -> Self {
        Self {
            reduction: Reduction::Sum,
            targets: None,
            weights: None,
            robust: Box::new(Identity),
        }
    }

    pub fn mean(mut self) -> Self {
        self.reduction = Reduction::Mean;
        self
    }

    /// Subtract `targets[i]` from the output of sample `i`.
    pub fn with_targets(mut self, targets: Vec<DynMatrix<T>>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Scale sample `i` by `weights[i]`.
    pub fn with_weights(mut self, weights: Vec<T>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_robust<R: RobustFunction<T> + 'static>(mut self, robust: R) -> Self {
        self.robust = Box::new(robust);
        self
    }

    #[inline]
    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn targets(&self) -> Option<&[DynMatrix<T>]> {
        self.targets.as_deref()
    }

    pub fn weights(&self) -> Option<&[T]> {
        self.weights.as_deref()
    }

    /// Check the per-sample lists against the number of inputs.
    fn validate(&self, inputs: usize) -> Result<(), OptimError> {
        if let Some(targets) = &self.targets {
            if targets.len() != inputs {
                return Err(OptimError::SizeMismatch {
                    what: "targets",
                    inputs,
                    got: targets.len(),
                });
            }
            if let Some(bad) = targets.iter().find(|t| !t.is_column()) {
                return Err(OptimError::NotColumnVector {
                    what: "target",
                    rows: bad.nrows(),
                    cols: bad.ncols(),
                });
            }
        }
        if let Some(weights) = &self.weights {
            if weights.len() != inputs {
                return Err(OptimError::SizeMismatch {
                    what: "weights",
                    inputs,
                    got: weights.len(),
                });
            }
        }
        Ok(())
    }

    /// `(cost term, coefficient)` of sample `i` with squared norm `s`.
    fn weigh(&self, i: usize, s: T, scale: T) -> (T, T) {
        let w = self.weights.as_ref().map_or(T::one(), |w| w[i]);
        (
            w * self.robust.value(s) * scale,
            w * self.robust.derivative(s) * scale,
        )
    }
}

/// Dimensions fixed by the first pass over the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dims {
    parameters: usize,
    dof: usize,
}

/// A function, its inputs and the contribution strategy.
struct SampleSet<T: FloatScalar, F: ModelFunction<T>> {
    function: F,
    inputs: Vec<F::Input>,
    contribution: Contribution<T>,
    dims: Option<Dims>,
    passes: usize,
}

fn check_jacobian<T: FloatScalar>(
    sample: usize,
    output: &DynMatrix<T>,
    jacobian: &DynMatrix<T>,
    dof: usize,
) -> Result<(), OptimError> {
    if jacobian.nrows() != output.nrows() {
        return Err(OptimError::JacobianRowMismatch {
            sample,
            output_rows: output.nrows(),
            jacobian_rows: jacobian.nrows(),
        });
    }
    if jacobian.ncols() != dof {
        return Err(OptimError::JacobianColumnMismatch {
            sample,
            expected: dof,
            got: jacobian.ncols(),
        });
    }
    Ok(())
}

fn check_column<T>(what: &'static str, m: &DynMatrix<T>) -> Result<(), OptimError> {
    if m.is_column() {
        Ok(())
    } else {
        Err(OptimError::NotColumnVector {
            what,
            rows: m.nrows(),
            cols: m.ncols(),
        })
    }
}

impl<T: FloatScalar, F: ErrorFunction<T>> SampleSet<T, F> {
    fn check_parameters(&self, theta: &DynMatrix<T>) -> Result<(), OptimError> {
        check_column("parameters", theta)?;
        match self.dims {
            Some(dims) if dims.parameters != theta.nrows() => Err(OptimError::ParameterDimension {
                expected: dims.parameters,
                got: theta.nrows(),
            }),
            _ => Ok(()),
        }
    }

    fn dof(&self) -> usize {
        self.dims
            .map_or_else(|| self.function.degrees_of_freedom(), |d| d.dof)
    }

    /// Validate every sample's shapes and size the residual storage.
    fn layout(&mut self) -> Result<ResidualBlocks<T>, OptimError> {
        if self.inputs.is_empty() {
            return Err(OptimError::NoInputs);
        }
        let theta = self.function.parameters();
        self.check_parameters(&theta)?;
        self.function.check_parameters()?;
        let dof = self.function.degrees_of_freedom();

        let mut rows = Vec::with_capacity(self.inputs.len());
        for (i, input) in self.inputs.iter().enumerate() {
            self.function.set_input(input);
            let output = self.function.output();
            check_column("output", &output)?;
            check_jacobian(i, &output, &self.function.jacobian(), dof)?;
            if let Some(targets) = &self.contribution.targets {
                if targets[i].nrows() != output.nrows() {
                    return Err(OptimError::TargetMismatch {
                        sample: i,
                        output_rows: output.nrows(),
                        target_rows: targets[i].nrows(),
                    });
                }
            }
            rows.push(output.nrows());
        }

        self.dims = Some(Dims {
            parameters: theta.nrows(),
            dof,
        });
        let blocks = ResidualBlocks::new(&rows, dof);
        log::trace!(
            "sized residual blocks: {} samples, {} rows, {} degrees of freedom",
            blocks.samples(),
            blocks.total_rows(),
            dof
        );
        Ok(blocks)
    }

    /// One pass over the inputs: fill `blocks` and return the cost.
    fn evaluate_into(&mut self, blocks: &mut ResidualBlocks<T>) -> Result<T, OptimError> {
        let dims = self.dims.ok_or(OptimError::NotInitialized)?;
        let n = self.inputs.len();
        if blocks.samples() != n {
            return Err(OptimError::SizeMismatch {
                what: "residual blocks",
                inputs: n,
                got: blocks.samples(),
            });
        }
        let parameters = self.function.parameters().nrows();
        if parameters != dims.parameters {
            return Err(OptimError::ParameterDimension {
                expected: dims.parameters,
                got: parameters,
            });
        }
        let dof = self.function.degrees_of_freedom();
        if dof != dims.dof || blocks.dof() != dims.dof {
            return Err(OptimError::ParameterDimension {
                expected: dims.dof,
                got: dof,
            });
        }

        let scale = match self.contribution.reduction {
            Reduction::Sum => T::one(),
            Reduction::Mean => T::one() / T::from_count(n),
        };
        let mut cost = T::zero();
        for (i, input) in self.inputs.iter().enumerate() {
            self.function.set_input(input);
            let mut residual = self.function.output();
            check_column("output", &residual)?;
            if residual.nrows() != blocks.sample_rows(i) {
                return Err(OptimError::OutputSizeChanged {
                    sample: i,
                    expected: blocks.sample_rows(i),
                    got: residual.nrows(),
                });
            }
            let jacobian = self.function.jacobian();
            check_jacobian(i, &residual, &jacobian, dof)?;
            if let Some(targets) = &self.contribution.targets {
                residual -= &targets[i];
            }

            let (term, coefficient) = self.contribution.weigh(i, residual.norm_squared(), scale);
            cost = cost + term;
            blocks.write_sample(i, &residual, &jacobian, coefficient);
        }
        self.passes += 1;
        Ok(cost)
    }
}

/// Least-squares loss of an [`ErrorFunction`] over a list of input samples.
///
/// ```
/// use nlsq::DynMatrix;
/// use nlsq::function::{ErrorFunction, ModelFunction};
/// use nlsq::loss::{DifferentiableLoss, Loss, SampleLoss};
///
/// struct Scale { k: f64, x: f64 }
///
/// impl ModelFunction<f64> for Scale {
///     type Input = f64;
///     fn parameters(&self) -> DynMatrix<f64> { DynMatrix::column(&[self.k]) }
///     fn set_parameters(&mut self, theta: &DynMatrix<f64>) { self.k = theta[0]; }
///     fn set_input(&mut self, x: &f64) { self.x = *x; }
///     fn output(&self) -> DynMatrix<f64> { DynMatrix::column(&[self.k * self.x]) }
///     fn jacobian(&self) -> DynMatrix<f64> { DynMatrix::column(&[self.x]) }
/// }
/// impl ErrorFunction<f64> for Scale {}
///
/// let targets = vec![DynMatrix::column(&[2.0]), DynMatrix::column(&[4.0])];
/// let mut loss =
///     SampleLoss::from_targets(Scale { k: 1.0, x: 0.0 }, vec![1.0, 2.0], targets).unwrap();
/// assert_eq!(loss.cost().unwrap(), 1.0 + 4.0);
/// assert_eq!(loss.gradient().unwrap()[0], -1.0 - 4.0);
/// ```
pub struct SampleLoss<T: FloatScalar, F: ModelFunction<T>> {
    samples: SampleSet<T, F>,
    scratch: Option<ResidualBlocks<T>>,
    cache: LossCache<T>,
}

impl<T: FloatScalar, F: ErrorFunction<T>> SampleLoss<T, F> {
    /// `L = Σ ‖f_i‖²`.
    pub fn new(function: F, inputs: Vec<F::Input>) -> Self {
        Self {
            samples: SampleSet {
                function,
                inputs,
                contribution: Contribution::new(),
                dims: None,
                passes: 0,
            },
            scratch: None,
            cache: LossCache::new(),
        }
    }

    /// Any combination of targets, weights, robust function and reduction.
    pub fn with_contribution(
        function: F,
        inputs: Vec<F::Input>,
        contribution: Contribution<T>,
    ) -> Result<Self, OptimError> {
        contribution.validate(inputs.len())?;
        let mut loss = Self::new(function, inputs);
        loss.samples.contribution = contribution;
        Ok(loss)
    }

    /// `L = 1/N Σ ‖f_i‖²`.
    pub fn mean_squared(function: F, inputs: Vec<F::Input>) -> Self {
        Self::new(function, inputs).mean()
    }

    /// `L = Σ ‖f_i − y_i‖²`.
    pub fn from_targets(
        function: F,
        inputs: Vec<F::Input>,
        targets: Vec<DynMatrix<T>>,
    ) -> Result<Self, OptimError> {
        Self::new(function, inputs).with_targets(targets)
    }

    /// `L = Σ w_i ‖f_i‖²`. Weights are applied as given; no normalization.
    pub fn weighted(
        function: F,
        inputs: Vec<F::Input>,
        weights: Vec<T>,
    ) -> Result<Self, OptimError> {
        Self::new(function, inputs).with_weights(weights)
    }

    /// `L = Σ g(‖f_i‖²)`.
    pub fn robust<R: RobustFunction<T> + 'static>(
        function: F,
        inputs: Vec<F::Input>,
        robust: R,
    ) -> Self {
        Self::new(function, inputs).with_robust(robust)
    }

    pub fn with_targets(mut self, targets: Vec<DynMatrix<T>>) -> Result<Self, OptimError> {
        self.replace_contribution(|c| c.with_targets(targets))?;
        Ok(self)
    }

    pub fn with_weights(mut self, weights: Vec<T>) -> Result<Self, OptimError> {
        self.replace_contribution(|c| c.with_weights(weights))?;
        Ok(self)
    }

    pub fn with_robust<R: RobustFunction<T> + 'static>(mut self, robust: R) -> Self {
        self.samples.contribution.robust = Box::new(robust);
        self.reconfigure();
        self
    }

    /// Divide the cost (and derivatives) by the number of samples.
    pub fn mean(mut self) -> Self {
        self.samples.contribution.reduction = Reduction::Mean;
        self.reconfigure();
        self
    }

    fn replace_contribution(
        &mut self,
        f: impl FnOnce(Contribution<T>) -> Contribution<T>,
    ) -> Result<(), OptimError> {
        let current = core::mem::take(&mut self.samples.contribution);
        let updated = f(current);
        updated.validate(self.samples.inputs.len())?;
        self.samples.contribution = updated;
        self.reconfigure();
        Ok(())
    }

    /// Forget the layout and cached evaluation.
    fn reconfigure(&mut self) {
        self.samples.dims = None;
        self.scratch = None;
        self.cache.invalidate();
    }

    /// Replace the input list. Targets and weights must still match it.
    pub fn set_inputs(&mut self, inputs: Vec<F::Input>) -> Result<(), OptimError> {
        self.samples.contribution.validate(inputs.len())?;
        self.samples.inputs = inputs;
        self.reconfigure();
        Ok(())
    }

    /// Replace the function, keeping inputs and contribution.
    pub fn set_function(&mut self, function: F) {
        self.samples.function = function;
        self.reconfigure();
    }

    pub fn function(&self) -> &F {
        &self.samples.function
    }

    pub fn into_function(self) -> F {
        self.samples.function
    }

    pub fn inputs(&self) -> &[F::Input] {
        &self.samples.inputs
    }

    pub fn contribution(&self) -> &Contribution<T> {
        &self.samples.contribution
    }

    /// Number of full passes over the inputs performed so far.
    pub fn passes(&self) -> usize {
        self.samples.passes
    }

    pub fn cache(&self) -> &LossCache<T> {
        &self.cache
    }

    /// Validate the samples and allocate matching residual storage.
    pub(crate) fn allocate_blocks(&mut self) -> Result<ResidualBlocks<T>, OptimError> {
        self.samples.layout()
    }

    /// Evaluate into `blocks` and store the normal equations in the cache.
    pub(crate) fn evaluate_blocks(
        &mut self,
        blocks: &mut ResidualBlocks<T>,
    ) -> Result<T, OptimError> {
        self.cache.invalidate();
        let cost = self.samples.evaluate_into(blocks)?;
        let (gauss_newton, gradient) = blocks.normal_equations();
        self.cache.store(Evaluation {
            cost,
            gradient,
            gauss_newton,
        });
        Ok(cost)
    }

    fn refresh(&mut self) -> Result<(), OptimError> {
        let Self {
            samples,
            scratch,
            cache,
        } = self;
        cache.recompute_if_stale(|| {
            let mut blocks = match scratch.take() {
                Some(blocks) => blocks,
                None => samples.layout()?,
            };
            let cost = samples.evaluate_into(&mut blocks)?;
            let (gauss_newton, gradient) = blocks.normal_equations();
            *scratch = Some(blocks);
            Ok(Evaluation {
                cost,
                gradient,
                gauss_newton,
            })
        })
    }
}

impl<T: FloatScalar, F: ErrorFunction<T>> Loss<T> for SampleLoss<T, F> {
    fn parameters(&self) -> DynMatrix<T> {
        self.samples.function.parameters()
    }

    fn set_parameters(&mut self, theta: &DynMatrix<T>) -> Result<(), OptimError> {
        self.samples.check_parameters(theta)?;
        self.samples.function.set_parameters(theta);
        self.cache.invalidate();
        Ok(())
    }

    fn degrees_of_freedom(&self) -> usize {
        self.samples.dof()
    }

    fn shift(&mut self, delta: &DynMatrix<T>) -> Result<(), OptimError> {
        check_column("increment", delta)?;
        let dof = self.samples.dof();
        if delta.nrows() != dof {
            return Err(OptimError::ParameterDimension {
                expected: dof,
                got: delta.nrows(),
            });
        }
        self.samples.function.check_parameters()?;
        self.samples.function.shift(delta);
        self.cache.invalidate();
        Ok(())
    }

    fn cost(&mut self) -> Result<T, OptimError> {
        self.refresh()?;
        Ok(self.cache.cost())
    }
}

impl<T: FloatScalar, F: ErrorFunction<T>> DifferentiableLoss<T> for SampleLoss<T, F> {
    fn gradient(&mut self) -> Result<DynMatrix<T>, OptimError> {
        self.refresh()?;
        Ok(self.cache.gradient().clone())
    }
}

impl<T: FloatScalar, F: ErrorFunction<T>> LocallyQuadraticLoss<T> for SampleLoss<T, F> {
    fn gauss_newton_matrix(&mut self) -> Result<DynMatrix<T>, OptimError> {
        self.refresh()?;
        Ok(self.cache.hessian().clone())
    }
}
