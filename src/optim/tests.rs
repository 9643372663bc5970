use super::*;
use crate::dynmatrix::DynMatrix;
use crate::function::{
    ErrorFunction, Huber, ManifoldFunction, ModelFunction, UnitQuaternion, UnitSphere,
};
use crate::loss::{Loss, SampleLoss};
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

const TOL: f64 = 1e-10;
const LOOSE_TOL: f64 = 1e-6;

fn assert_near(a: f64, b: f64, tol: f64, msg: &str) {
    assert!(
        (a - b).abs() < tol,
        "{}: {} vs {} (diff {})",
        msg,
        a,
        b,
        (a - b).abs()
    );
}

// ═══════════════════════════════════════════════════════════════════
// Models
// ═══════════════════════════════════════════════════════════════════

/// `r = a·x + b − y`
struct Line {
    p: DynMatrix<f64>,
    xy: (f64, f64),
}

fn line(a: f64, b: f64) -> Line {
    Line {
        p: DynMatrix::column(&[a, b]),
        xy: (0.0, 0.0),
    }
}

impl ModelFunction<f64> for Line {
    type Input = (f64, f64);

    fn parameters(&self) -> DynMatrix<f64> {
        self.p.clone()
    }
    fn set_parameters(&mut self, theta: &DynMatrix<f64>) {
        self.p = theta.clone();
    }
    fn set_input(&mut self, input: &(f64, f64)) {
        self.xy = *input;
    }
    fn output(&self) -> DynMatrix<f64> {
        DynMatrix::column(&[self.p[0] * self.xy.0 + self.p[1] - self.xy.1])
    }
    fn jacobian(&self) -> DynMatrix<f64> {
        DynMatrix::from_rows(1, 2, &[self.xy.0, 1.0])
    }
}

impl ErrorFunction<f64> for Line {}

/// `r = θ·x − y`
struct Proportional {
    theta: f64,
    xy: (f64, f64),
}

impl ModelFunction<f64> for Proportional {
    type Input = (f64, f64);

    fn parameters(&self) -> DynMatrix<f64> {
        DynMatrix::column(&[self.theta])
    }
    fn set_parameters(&mut self, theta: &DynMatrix<f64>) {
        self.theta = theta[0];
    }
    fn set_input(&mut self, input: &(f64, f64)) {
        self.xy = *input;
    }
    fn output(&self) -> DynMatrix<f64> {
        DynMatrix::column(&[self.theta * self.xy.0 - self.xy.1])
    }
    fn jacobian(&self) -> DynMatrix<f64> {
        DynMatrix::column(&[self.xy.0])
    }
}

impl ErrorFunction<f64> for Proportional {}

fn proportional() -> Proportional {
    Proportional {
        theta: 0.0,
        xy: (0.0, 0.0),
    }
}

/// Constant residual, zero Jacobian: the normal equations are singular.
struct Flat {
    theta: f64,
}

impl ModelFunction<f64> for Flat {
    type Input = f64;

    fn parameters(&self) -> DynMatrix<f64> {
        DynMatrix::column(&[self.theta])
    }
    fn set_parameters(&mut self, theta: &DynMatrix<f64>) {
        self.theta = theta[0];
    }
    fn set_input(&mut self, _: &f64) {}
    fn output(&self) -> DynMatrix<f64> {
        DynMatrix::column(&[1.0])
    }
    fn jacobian(&self) -> DynMatrix<f64> {
        DynMatrix::column(&[0.0])
    }
}

impl ErrorFunction<f64> for Flat {}

/// `r = a·exp(b·x) − y`
struct Exponential {
    ab: (f64, f64),
    xy: (f64, f64),
}

impl ModelFunction<f64> for Exponential {
    type Input = (f64, f64);

    fn parameters(&self) -> DynMatrix<f64> {
        DynMatrix::column(&[self.ab.0, self.ab.1])
    }
    fn set_parameters(&mut self, theta: &DynMatrix<f64>) {
        self.ab = (theta[0], theta[1]);
    }
    fn set_input(&mut self, input: &(f64, f64)) {
        self.xy = *input;
    }
    fn output(&self) -> DynMatrix<f64> {
        let (a, b) = self.ab;
        DynMatrix::column(&[a * (b * self.xy.0).exp() - self.xy.1])
    }
    fn jacobian(&self) -> DynMatrix<f64> {
        let (a, b) = self.ab;
        let (x, _) = self.xy;
        let e = (b * x).exp();
        DynMatrix::from_rows(1, 2, &[e, a * x * e])
    }
}

impl ErrorFunction<f64> for Exponential {}

/// Unit vector `x` against observed directions `y`: `r = x − y`, Jacobian in
/// the sphere's tangent coordinates.
struct Direction {
    x: DynMatrix<f64>,
    y: DynMatrix<f64>,
}

impl ModelFunction<f64> for Direction {
    type Input = DynMatrix<f64>;

    fn parameters(&self) -> DynMatrix<f64> {
        self.x.clone()
    }
    fn set_parameters(&mut self, theta: &DynMatrix<f64>) {
        self.x = theta.clone();
    }
    fn set_input(&mut self, input: &DynMatrix<f64>) {
        self.y = input.clone();
    }
    fn output(&self) -> DynMatrix<f64> {
        &self.x - &self.y
    }
    fn jacobian(&self) -> DynMatrix<f64> {
        UnitSphere.tangent_basis(&self.x)
    }
}

fn line_samples() -> Vec<(f64, f64)> {
    vec![(0.0, 1.0), (1.0, 2.9), (2.0, 5.1), (3.0, 7.0)]
}

// ═══════════════════════════════════════════════════════════════════
// Step solver
// ═══════════════════════════════════════════════════════════════════

fn normal_equations() -> (DynMatrix<f64>, DynMatrix<f64>) {
    (
        DynMatrix::from_rows(2, 2, &[4.0, 1.0, 1.0, 3.0]),
        DynMatrix::column(&[1.0, 2.0]),
    )
}

#[test]
fn gauss_newton_step_solves_normal_equations() {
    let (h, g) = normal_equations();
    let delta = gauss_newton_step(&h, &g).unwrap();
    // H Δ = −g
    let check = &h * &delta;
    assert_near(check[0], -1.0, TOL, "row 0");
    assert_near(check[1], -2.0, TOL, "row 1");
}

#[test]
fn zero_damping_is_gauss_newton() {
    let (h, g) = normal_equations();
    assert_eq!(
        levenberg_marquardt_step(&h, &g, 0.0).unwrap(),
        gauss_newton_step(&h, &g).unwrap()
    );
    assert_eq!(StepRule::<f64>::GaussNewton.damping(), 0.0);
}

#[test]
fn damping_shrinks_the_step() {
    let (h, g) = normal_equations();
    let mut previous = f64::INFINITY;
    for lambda in [0.0, 0.01, 0.1, 1.0, 10.0, 100.0, 1e4] {
        let norm = levenberg_marquardt_step(&h, &g, lambda).unwrap().norm();
        assert!(
            norm < previous,
            "λ = {}: |Δ| = {} not below {}",
            lambda,
            norm,
            previous
        );
        previous = norm;
    }
    // large damping approaches a short gradient-descent step −g/λ
    let delta = levenberg_marquardt_step(&h, &g, 1e8).unwrap();
    assert_near(delta[1] * 1e8, -2.0, 1e-6, "−g/λ");
}

#[test]
fn ldlt_matches_cholesky() {
    let (h, g) = normal_equations();
    let rule = StepRule::levenberg_marquardt(0.5).unwrap();
    let a = rule.solve(h.clone(), &g, Factorization::Cholesky).unwrap();
    let b = rule.solve(h, &g, Factorization::Ldlt).unwrap();
    assert!((&a - &b).norm() < TOL);
}

#[test]
fn singular_matrix_names_the_remedy() {
    let h = DynMatrix::<f64>::zeros(2, 2);
    let g = DynMatrix::column(&[1.0, 1.0]);

    let gn = gauss_newton_step(&h, &g).unwrap_err();
    assert_eq!(
        gn,
        OptimError::NotPositiveDefinite {
            rule: StepKind::GaussNewton
        }
    );
    assert_eq!(gn.kind(), ErrorKind::Numerical);
    assert!(gn.to_string().contains("Levenberg-Marquardt"));

    let negative = DynMatrix::from_rows(2, 2, &[-1.0, 0.0, 0.0, -1.0]);
    let lm = levenberg_marquardt_step(&negative, &g, 0.5).unwrap_err();
    assert!(lm
        .to_string()
        .contains("increase the Levenberg-Marquardt damping"));

    // positive damping rescues the zero matrix
    assert!(levenberg_marquardt_step(&h, &g, 1e-3).is_ok());
}

#[test]
fn nan_matrix_is_not_positive_definite() {
    let h = DynMatrix::from_rows(1, 1, &[f64::NAN]);
    let g = DynMatrix::column(&[1.0]);
    for f in [Factorization::Cholesky, Factorization::Ldlt] {
        assert_eq!(
            StepRule::levenberg_marquardt(1.0)
                .unwrap()
                .solve(h.clone(), &g, f),
            Err(OptimError::NotPositiveDefinite {
                rule: StepKind::LevenbergMarquardt
            })
        );
    }
}

#[test]
fn step_shape_mismatch() {
    let (h, _) = normal_equations();
    assert_eq!(
        gauss_newton_step(&h, &DynMatrix::column(&[1.0, 2.0, 3.0])),
        Err(OptimError::ParameterDimension {
            expected: 2,
            got: 3
        })
    );
}

#[test]
fn invalid_damping_is_a_configuration_error() {
    let err = StepRule::levenberg_marquardt(-1.0_f64).unwrap_err();
    assert_eq!(err, OptimError::InvalidDamping { damping: -1.0 });
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(StepRule::levenberg_marquardt(f64::NAN).is_err());
    assert_eq!(
        StepRule::levenberg_marquardt(0.0_f64).unwrap().damping(),
        0.0
    );

    // a hand-built rule is checked when it is solved
    let (h, g) = normal_equations();
    let hand_built = StepRule::LevenbergMarquardt { damping: -0.5 };
    assert_eq!(
        hand_built.solve(h.clone(), &g, Factorization::Cholesky),
        Err(OptimError::InvalidDamping { damping: -0.5 })
    );
    assert!(levenberg_marquardt_step(&h, &g, -2.0).is_err());
}

// ═══════════════════════════════════════════════════════════════════
// Stopping criteria
// ═══════════════════════════════════════════════════════════════════

struct State {
    last: usize,
    best: usize,
    error_last: f64,
    error_best: f64,
}

fn state(last: usize, best: usize) -> State {
    State {
        last,
        best,
        error_last: 1.0,
        error_best: 1.0,
    }
}

impl AlgorithmState<f64> for State {
    fn iteration_last(&self) -> usize {
        self.last
    }
    fn iteration_best(&self) -> usize {
        self.best
    }
    fn error_last(&self) -> f64 {
        self.error_last
    }
    fn error_best(&self) -> f64 {
        self.error_best
    }
}

struct Fixed(bool);

impl StoppingCriterion<f64> for Fixed {
    fn is_finished(&self, _: &dyn AlgorithmState<f64>) -> bool {
        self.0
    }
}

#[test]
fn or_and_truth_tables() {
    let s = state(0, 0);
    for a in [false, true] {
        for b in [false, true] {
            assert_eq!(
                Or(Fixed(a), Fixed(b)).is_finished(&s),
                a || b,
                "{} OR {}",
                a,
                b
            );
            assert_eq!(Fixed(a).or(Fixed(b)).is_finished(&s), a || b);
            assert_eq!(
                And(Fixed(a), Fixed(b)).is_finished(&s),
                a && b,
                "{} AND {}",
                a,
                b
            );
            assert_eq!(Fixed(a).and(Fixed(b)).is_finished(&s), a && b);
        }
    }
}

#[test]
fn iteration_threshold() {
    let c = IterationThreshold(5);
    assert!(!StoppingCriterion::<f64>::is_finished(&c, &state(4, 4)));
    assert!(StoppingCriterion::<f64>::is_finished(&c, &state(5, 0)));
    assert!(StoppingCriterion::<f64>::is_finished(
        &IterationThreshold(0),
        &state(0, 0)
    ));
}

#[test]
fn no_improvement() {
    let c = NoImprovement(3);
    assert!(!StoppingCriterion::<f64>::is_finished(&c, &state(10, 8)));
    assert!(StoppingCriterion::<f64>::is_finished(&c, &state(10, 7)));
}

#[test]
fn cost_below() {
    let mut s = state(1, 1);
    s.error_best = 1e-9;
    assert!(CostBelow(1e-8).is_finished(&s));
    assert!(!CostBelow(1e-10).is_finished(&s));
    s.error_best = f64::NAN;
    assert!(!CostBelow(1.0).is_finished(&s));
}

#[test]
fn default_policy() {
    let c = default_criterion();
    let finished = |last, best| StoppingCriterion::<f64>::is_finished(&c, &state(last, best));
    assert!(!finished(19, 0));
    assert!(finished(20, 0));
    assert!(!finished(999, 990));
    assert!(finished(1000, 1000));

    let boxed = StoppingSettings::<f64>::default().criterion();
    assert!(!boxed.is_finished(&state(19, 0)));
    assert!(boxed.is_finished(&state(20, 0)));
    assert!(boxed.is_finished(&state(1000, 1000)));
}

#[test]
fn settings_with_tolerance() {
    let settings = StoppingSettings {
        max_iterations: 50,
        max_stalled_iterations: 5,
        cost_tolerance: Some(1e-6),
    };
    let c = settings.criterion();
    let mut s = state(1, 1);
    assert!(!c.is_finished(&s));
    s.error_best = 1e-7;
    assert!(c.is_finished(&s));
    assert!(c.is_finished(&state(50, 50)));
}

// ═══════════════════════════════════════════════════════════════════
// Sequencing
// ═══════════════════════════════════════════════════════════════════

#[test]
fn step_before_initialize() {
    let mut lsq = LeastSquares::gauss_newton(line(0.0, 0.0), line_samples());
    assert!(!lsq.is_initialized());
    assert_eq!(lsq.step(), Err(OptimError::NotInitialized));
    assert_eq!(lsq.iterate(), Err(OptimError::NotInitialized));
    assert_eq!(OptimError::NotInitialized.kind(), ErrorKind::Sequencing);
    assert!(lsq.solution_best().is_none());
    assert!(lsq.residuals().is_none());
    assert!(lsq.error_best().is_nan());
    assert_eq!(lsq.iteration_last(), 0);
}

#[test]
fn initialize_once_per_run() {
    let mut lsq = LeastSquares::gauss_newton(line(0.0, 0.0), line_samples());
    lsq.initialize().unwrap();
    assert_eq!(lsq.initialize(), Err(OptimError::AlreadyInitialized));

    lsq.step().unwrap();
    lsq.reset();
    assert!(!lsq.is_initialized());
    lsq.initialize().unwrap();
    // restarts from the function's current parameters
    assert_eq!(lsq.iteration_last(), 0);
    assert_near(lsq.solution_best().unwrap()[0], 2.02, TOL, "slope");
}

#[test]
fn reconfiguring_resets_the_run() {
    let mut lsq = LeastSquares::gauss_newton(line(0.0, 0.0), line_samples());
    lsq.initialize().unwrap();
    lsq.set_inputs(vec![(0.0, 0.0), (1.0, 1.0)]).unwrap();
    assert!(!lsq.is_initialized());
    lsq.initialize().unwrap();
    assert_eq!(lsq.residuals().unwrap().nrows(), 2);

    lsq.set_function(line(1.0, 0.0));
    assert!(!lsq.is_initialized());
    lsq.initialize().unwrap();
    assert_eq!(lsq.error_best(), 0.0);
}

#[test]
fn configuration_errors_surface_at_initialize() {
    let mut lsq = LeastSquares::gauss_newton(line(0.0, 0.0), Vec::new());
    assert_eq!(lsq.initialize(), Err(OptimError::NoInputs));
    assert_eq!(OptimError::NoInputs.kind(), ErrorKind::Configuration);

    let err = LeastSquares::gauss_newton(line(0.0, 0.0), line_samples())
        .with_weights(vec![1.0, 2.0])
        .err();
    assert_eq!(
        err,
        Some(OptimError::SizeMismatch {
            what: "weights",
            inputs: 4,
            got: 2
        })
    );
}

#[test]
fn manifold_chart_mismatch_surfaces_at_initialize() {
    let wrapped = ManifoldFunction::new(line(1.0, 0.0), UnitQuaternion);
    let mut lsq = LeastSquares::gauss_newton(wrapped, line_samples());
    let err = lsq.initialize().unwrap_err();
    assert_eq!(
        err,
        OptimError::ManifoldDimension {
            manifold: "unit quaternion",
            rows: 2,
            cols: 1
        }
    );
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!lsq.is_initialized());
    assert_eq!(lsq.step(), Err(OptimError::NotInitialized));

    let sphere = ManifoldFunction::new(proportional(), UnitSphere);
    let mut lsq = LeastSquares::gauss_newton(sphere, vec![(1.0, 2.0)]);
    assert!(matches!(
        lsq.initialize(),
        Err(OptimError::ManifoldDimension { rows: 1, .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════
// Least squares
// ═══════════════════════════════════════════════════════════════════

#[test]
fn one_gauss_newton_step_reaches_linear_minimum() {
    // closed form: slope = Σ(x−x̄)(y−ȳ) / Σ(x−x̄)² = 10.1 / 5, intercept = ȳ − slope·x̄
    let (slope, intercept) = (2.02, 4.0 - 2.02 * 1.5);
    let minimum: f64 = line_samples()
        .iter()
        .map(|&(x, y)| (slope * x + intercept - y).powi(2))
        .sum();

    for start in [(0.0, 0.0), (5.0, -3.0), (-100.0, 40.0)] {
        let mut lsq = LeastSquares::gauss_newton(line(start.0, start.1), line_samples());
        lsq.initialize().unwrap();
        lsq.step().unwrap();
        let theta = lsq.solution_last().unwrap();
        assert_near(theta[0], slope, TOL, "slope");
        assert_near(theta[1], intercept, TOL, "intercept");
        assert_near(lsq.error_last(), minimum, TOL, "cost");
        assert_eq!(lsq.iteration_best(), 1);
    }
}

#[test]
fn levenberg_marquardt_without_damping_matches_gauss_newton() {
    let mut gn = LeastSquares::gauss_newton(line(1.0, 1.0), line_samples());
    let mut lm = LeastSquares::levenberg_marquardt(line(1.0, 1.0), line_samples());
    assert_eq!(lm.damping_factor(), 0.0);
    assert_eq!(lm.rule().kind(), StepKind::LevenbergMarquardt);
    gn.initialize().unwrap();
    lm.initialize().unwrap();
    gn.step().unwrap();
    lm.step().unwrap();
    assert_eq!(gn.solution_last(), lm.solution_last());
}

#[test]
fn proportional_fit_end_to_end() {
    let samples = vec![(1.0, 2.0), (2.0, 4.0), (3.0, 6.1)];
    let mut lsq = LeastSquares::from_loss(
        SampleLoss::mean_squared(proportional(), samples),
        StepRule::GaussNewton,
    )
    .with_stopping(Or(NoImprovement(3), IterationThreshold(10)));
    lsq.initialize().unwrap();
    let steps = lsq.iterate().unwrap();

    assert!(steps <= 10);
    assert!(lsq.iteration_best() <= 10);
    let best = lsq.solution_best().unwrap();
    let last = lsq.solution_last().unwrap();
    assert_near(best[0], 2.0, 0.05, "θ");
    // least-squares slope Σxy / Σx²
    assert_near(best[0], 28.3 / 14.0, TOL, "θ exact");
    assert!(lsq.error_best() < 1e-2);
    assert_near(best[0], last[0], TOL, "best vs last");
    assert_near(
        lsq.error_best(),
        lsq.error_last(),
        TOL,
        "best vs last error",
    );

    // one pass at initialize, one per step
    assert_eq!(lsq.evaluations(), 1 + lsq.iteration_last());
}

#[test]
fn rank_deficient_jacobian() {
    let inputs = vec![1.0, 1.0];

    let mut gn = LeastSquares::gauss_newton(Flat { theta: 0.5 }, inputs.clone());
    gn.initialize().unwrap();
    assert_eq!(
        gn.step(),
        Err(OptimError::NotPositiveDefinite {
            rule: StepKind::GaussNewton
        })
    );
    // the failed step leaves the run untouched
    assert_eq!(gn.iteration_last(), 0);
    assert_eq!(gn.function().theta, 0.5);

    let mut lm = LeastSquares::levenberg_marquardt(Flat { theta: 0.5 }, inputs)
        .with_damping_factor(1e-3)
        .unwrap();
    lm.initialize().unwrap();
    lm.step().unwrap();
    assert_eq!(lm.iteration_last(), 1);
    assert_eq!(lm.error_last(), 2.0);
    assert_eq!(lm.solution_last().unwrap()[0], 0.5);
}

#[test]
fn damping_switches_rule() {
    let mut lsq = LeastSquares::gauss_newton(Flat { theta: 0.0 }, vec![0.0]);
    lsq.initialize().unwrap();
    assert!(lsq.step().is_err());
    lsq.set_damping_factor(1.0).unwrap();
    assert_eq!(lsq.rule(), StepRule::LevenbergMarquardt { damping: 1.0 });
    assert!(lsq.step().is_ok());

    // rejected values leave the rule and the run alone
    assert_eq!(
        lsq.set_damping_factor(-1.0),
        Err(OptimError::InvalidDamping { damping: -1.0 })
    );
    assert!(lsq.set_damping_factor(f64::NAN).is_err());
    assert_eq!(lsq.damping_factor(), 1.0);
    assert_eq!(lsq.iteration_last(), 1);
}

#[test]
fn exponential_fit_levenberg_marquardt() {
    let samples: Vec<(f64, f64)> = (0..7)
        .map(|i| {
            let x = 0.5 * i as f64;
            (x, 2.0 * (0.5 * x).exp())
        })
        .collect();
    let f = Exponential {
        ab: (1.5, 0.4),
        xy: (0.0, 0.0),
    };
    let mut lsq = LeastSquares::levenberg_marquardt(f, samples)
        .with_damping_factor(1e-3)
        .unwrap()
        .with_stopping(Or(NoImprovement(5), IterationThreshold(200)));
    lsq.initialize().unwrap();
    lsq.iterate().unwrap();

    let best = lsq.solution_best().unwrap();
    assert_near(best[0], 2.0, LOOSE_TOL, "a");
    assert_near(best[1], 0.5, LOOSE_TOL, "b");
    assert!(lsq.error_best() < 1e-12);
}

#[test]
fn ldlt_fit_matches_cholesky_fit() {
    let run = |factorization| {
        let mut lsq = LeastSquares::gauss_newton(line(3.0, 3.0), line_samples())
            .with_factorization(factorization)
            .with_stopping(IterationThreshold(2));
        lsq.initialize().unwrap();
        lsq.iterate().unwrap();
        lsq.solution_best().unwrap().clone()
    };
    let a = run(Factorization::Cholesky);
    let b = run(Factorization::Ldlt);
    assert!((&a - &b).norm() < TOL);
}

#[test]
fn huber_resists_outlier() {
    let mut samples: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
    samples[9].1 += 30.0;

    let stopping = || Or(NoImprovement(10), IterationThreshold(100));
    let mut plain =
        LeastSquares::gauss_newton(line(0.0, 0.0), samples.clone()).with_stopping(stopping());
    let mut robust = LeastSquares::levenberg_marquardt(line(0.0, 0.0), samples)
        .with_damping_factor(1e-9)
        .unwrap()
        .with_robust(Huber::new(1.0).unwrap())
        .with_stopping(stopping());
    plain.initialize().unwrap();
    plain.iterate().unwrap();
    robust.initialize().unwrap();
    robust.iterate().unwrap();

    let plain_slope = plain.solution_best().unwrap()[0];
    let robust_slope = robust.solution_best().unwrap()[0];
    assert!(
        (plain_slope - 2.0).abs() > 1.0,
        "plain slope {}",
        plain_slope
    );
    assert!(
        (robust_slope - 2.0).abs() < 0.2,
        "robust slope {}",
        robust_slope
    );
}

#[test]
fn targets_and_weights_through_builder() {
    // r = θ·x − 0, targets y: same problem as the proportional fit
    let inputs = vec![(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
    let targets = vec![
        DynMatrix::column(&[2.0]),
        DynMatrix::column(&[4.0]),
        DynMatrix::column(&[6.1]),
    ];
    let mut lsq = LeastSquares::gauss_newton(proportional(), inputs)
        .with_targets(targets)
        .unwrap()
        .with_weights(vec![1.0, 1.0, 0.0])
        .unwrap()
        .with_stopping(IterationThreshold(1));
    lsq.initialize().unwrap();
    lsq.iterate().unwrap();
    // the third sample carries no weight
    assert_near(lsq.solution_best().unwrap()[0], 2.0, TOL, "θ");
    assert_near(lsq.error_best(), 0.0, TOL, "cost");
    assert_eq!(lsq.residuals().unwrap().nrows(), 3);
    assert_eq!(lsq.jacobian().unwrap().ncols(), 1);
}

#[test]
fn sphere_constrained_fit() {
    let directions = vec![
        DynMatrix::column(&[1.0, 0.0, 0.0]),
        DynMatrix::column(&[0.0, 1.0, 0.0]),
        DynMatrix::column(&[0.0, 0.0, 1.0]),
    ];
    let f = ManifoldFunction::new(
        Direction {
            x: DynMatrix::column(&[0.0, 0.0, 1.0]),
            y: DynMatrix::zeros(3, 1),
        },
        UnitSphere,
    );
    let mut lsq = LeastSquares::gauss_newton(f, directions)
        .with_stopping(Or(NoImprovement(5), IterationThreshold(200)));
    lsq.initialize().unwrap();
    assert_eq!(lsq.jacobian().unwrap().ncols(), 2);
    lsq.iterate().unwrap();

    let x = lsq.solution_best().unwrap();
    let expected = 1.0 / 3.0_f64.sqrt();
    for i in 0..3 {
        assert_near(x[i], expected, LOOSE_TOL, "normalized mean");
    }
    assert_near(x.norm(), 1.0, TOL, "unit norm");
}

// ═══════════════════════════════════════════════════════════════════
// Loss descent
// ═══════════════════════════════════════════════════════════════════

#[test]
fn loss_descent_matches_least_squares() {
    let samples = vec![(1.0, 2.0), (2.0, 4.0), (3.0, 6.1)];
    let stop = || Or(NoImprovement(3), IterationThreshold(10));

    let mut lsq = LeastSquares::from_loss(
        SampleLoss::mean_squared(proportional(), samples.clone()),
        StepRule::GaussNewton,
    )
    .with_stopping(stop());
    let mut descent = LossDescent::gauss_newton(SampleLoss::mean_squared(proportional(), samples))
        .with_stopping(stop());

    lsq.initialize().unwrap();
    descent.initialize().unwrap();
    lsq.iterate().unwrap();
    descent.iterate().unwrap();

    assert_eq!(lsq.solution_best(), descent.solution_best());
    assert_eq!(lsq.error_best(), descent.error_best());
    assert_eq!(lsq.iteration_last(), descent.iteration_last());
    assert_eq!(descent.loss().passes(), 1 + descent.iteration_last());
    assert_eq!(
        descent.loss().parameters()[0],
        descent.solution_last().unwrap()[0]
    );
}

#[test]
fn loss_descent_sequencing() {
    let loss = SampleLoss::new(Flat { theta: 0.0 }, vec![0.0, 0.0]);
    let mut descent = LossDescent::levenberg_marquardt(loss, 1e-3).unwrap();
    assert_eq!(descent.step(), Err(OptimError::NotInitialized));
    descent.initialize().unwrap();
    assert_eq!(descent.initialize(), Err(OptimError::AlreadyInitialized));
    descent.step().unwrap();
    descent.loss_mut();
    assert!(!descent.is_initialized());
}
