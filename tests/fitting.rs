use approx::{assert_abs_diff_eq, assert_relative_eq};
use nlsq::function::{
    Cauchy, ErrorFunction, ManifoldFunction, ModelFunction, SoftL1, Tukey, UnitQuaternion,
};
use nlsq::loss::{Contribution, LocallyQuadraticLoss, Loss, SampleLoss};
use nlsq::optim::{
    AlgorithmState, ErrorKind, Factorization, IterationThreshold, IterativeAlgorithm, LeastSquares,
    LossDescent, NoImprovement, OptimError, Or, StepRule, StoppingSettings,
};
use nlsq::{DynMatrix, Quaternion};

// ── Models ───────────────────────────────────────────────────────────

/// Attitude `q` mapping body vectors onto observed reference vectors:
/// `r = R(q)·v − w`. The Jacobian is taken with respect to a body-frame
/// rotation vector, matching `q ⊞ δ = q ⊗ exp(δ)`.
struct Attitude {
    q: DynMatrix<f64>,
    pair: ([f64; 3], [f64; 3]),
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

impl Attitude {
    fn quaternion(&self) -> Quaternion<f64> {
        Quaternion::from_column(&self.q).unwrap()
    }
}

impl ModelFunction<f64> for Attitude {
    type Input = ([f64; 3], [f64; 3]);

    fn parameters(&self) -> DynMatrix<f64> {
        self.q.clone()
    }
    fn set_parameters(&mut self, theta: &DynMatrix<f64>) {
        self.q = theta.clone();
    }
    fn set_input(&mut self, input: &([f64; 3], [f64; 3])) {
        self.pair = *input;
    }
    fn output(&self) -> DynMatrix<f64> {
        let (v, w) = self.pair;
        let rv = self.quaternion().rotate(v);
        DynMatrix::column(&[rv[0] - w[0], rv[1] - w[1], rv[2] - w[2]])
    }
    fn jacobian(&self) -> DynMatrix<f64> {
        // d/dδ R(q)(v + δ × v): column k is R(q)(e_k × v)
        let q = self.quaternion();
        let v = self.pair.0;
        let mut j = DynMatrix::zeros(3, 3);
        for k in 0..3 {
            let mut e = [0.0; 3];
            e[k] = 1.0;
            let c = q.rotate(cross(e, v));
            for i in 0..3 {
                j[(i, k)] = c[i];
            }
        }
        j
    }
}

/// `r = a·x² + b·x + c − y`
struct Quadratic {
    abc: [f64; 3],
    xy: (f64, f64),
}

impl ModelFunction<f64> for Quadratic {
    type Input = (f64, f64);

    fn parameters(&self) -> DynMatrix<f64> {
        DynMatrix::column(&self.abc)
    }
    fn set_parameters(&mut self, theta: &DynMatrix<f64>) {
        self.abc.copy_from_slice(theta.as_slice());
    }
    fn set_input(&mut self, input: &(f64, f64)) {
        self.xy = *input;
    }
    fn output(&self) -> DynMatrix<f64> {
        let [a, b, c] = self.abc;
        let (x, y) = self.xy;
        DynMatrix::column(&[a * x * x + b * x + c - y])
    }
    fn jacobian(&self) -> DynMatrix<f64> {
        let x = self.xy.0;
        DynMatrix::from_rows(1, 3, &[x * x, x, 1.0])
    }
}

impl ErrorFunction<f64> for Quadratic {}

fn quadratic() -> Quadratic {
    Quadratic {
        abc: [0.0; 3],
        xy: (0.0, 0.0),
    }
}

/// Samples of `0.5x² − 2x + 3` on a grid, with gross errors at every
/// `outlier_every`-th point.
fn quadratic_samples(outlier_every: usize) -> Vec<(f64, f64)> {
    (0..30)
        .map(|i| {
            let x = -3.0 + 0.25 * i as f64;
            let mut y = 0.5 * x * x - 2.0 * x + 3.0;
            if outlier_every > 0 && i % outlier_every == 3 {
                y += 25.0;
            }
            (x, y)
        })
        .collect()
}

// ── Manifold fitting ─────────────────────────────────────────────────

#[test]
fn attitude_from_vector_pairs() {
    let truth = Quaternion::from_rotation_vector([0.3, -0.2, 0.5]);
    let body = [
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 1.0, 0.0],
    ];
    let pairs: Vec<_> = body.iter().map(|&v| (v, truth.rotate(v))).collect();

    let f = ManifoldFunction::new(
        Attitude {
            q: Quaternion::identity().to_column(),
            pair: ([0.0; 3], [0.0; 3]),
        },
        UnitQuaternion,
    );
    let mut fit = LeastSquares::gauss_newton(f, pairs)
        .with_stopping(Or(NoImprovement(5), IterationThreshold(50)));
    fit.initialize().unwrap();
    assert_eq!(fit.jacobian().unwrap().ncols(), 3);
    fit.iterate().unwrap();

    let q = Quaternion::from_column(fit.solution_best().unwrap()).unwrap();
    let dot = q.w * truth.w + q.x * truth.x + q.y * truth.y + q.z * truth.z;
    assert_abs_diff_eq!(dot.abs(), 1.0, epsilon = 1e-10);
    assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-12);
    assert!(fit.error_best() < 1e-20);
}

// ── Linear and robust fits ───────────────────────────────────────────

#[test]
fn quadratic_exact_in_one_step() {
    let mut fit = LeastSquares::gauss_newton(quadratic(), quadratic_samples(0))
        .with_stopping(IterationThreshold(1));
    fit.initialize().unwrap();
    assert_eq!(fit.iterate().unwrap(), 1);

    let theta = fit.solution_best().unwrap();
    assert_abs_diff_eq!(theta[0], 0.5, epsilon = 1e-10);
    assert_abs_diff_eq!(theta[1], -2.0, epsilon = 1e-10);
    assert_abs_diff_eq!(theta[2], 3.0, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.error_best(), 0.0, epsilon = 1e-18);
}

#[test]
fn redescending_and_soft_robust_functions() {
    let truth = [0.5, -2.0, 3.0];
    let plain = {
        let mut fit = LeastSquares::gauss_newton(quadratic(), quadratic_samples(7))
            .with_stopping(IterationThreshold(1));
        fit.initialize().unwrap();
        fit.iterate().unwrap();
        fit.solution_best().unwrap().clone()
    };
    let plain_error = (&plain - &DynMatrix::column(&truth)).norm();
    assert!(plain_error > 1.0, "plain fit error {}", plain_error);

    let settings = StoppingSettings {
        max_iterations: 200,
        max_stalled_iterations: 10,
        cost_tolerance: None,
    };

    // Cauchy and soft-L1 from the origin; Tukey rejects outliers entirely but
    // needs a start inside its basin, so it continues from the Cauchy fit.
    let mut cauchy = LeastSquares::levenberg_marquardt(quadratic(), quadratic_samples(7))
        .with_damping_factor(1e-8)
        .unwrap()
        .with_robust(Cauchy::new(0.5).unwrap())
        .with_stopping_settings(settings);
    cauchy.initialize().unwrap();
    cauchy.iterate().unwrap();
    let start = cauchy.solution_best().unwrap().clone();

    let mut soft = LeastSquares::levenberg_marquardt(quadratic(), quadratic_samples(7))
        .with_damping_factor(1e-8)
        .unwrap()
        .with_robust(SoftL1::new(0.5).unwrap())
        .with_stopping_settings(settings);
    soft.initialize().unwrap();
    soft.iterate().unwrap();

    let mut seeded = quadratic();
    seeded.set_parameters(&start);
    let mut tukey = LeastSquares::levenberg_marquardt(seeded, quadratic_samples(7))
        .with_damping_factor(1e-8)
        .unwrap()
        .with_robust(Tukey::new(2.0).unwrap())
        .with_stopping_settings(settings);
    tukey.initialize().unwrap();
    tukey.iterate().unwrap();

    for (name, theta) in [
        ("cauchy", cauchy.solution_best().unwrap()),
        ("soft-l1", soft.solution_best().unwrap()),
        ("tukey", tukey.solution_best().unwrap()),
    ] {
        let error = (theta - &DynMatrix::column(&truth)).norm();
        assert!(
            error < plain_error / 2.0,
            "{}: {} vs plain {}",
            name,
            error,
            plain_error
        );
    }
    // with every outlier beyond the cutoff the Tukey fit is exact
    let tukey_theta = tukey.solution_best().unwrap();
    for (k, &t) in truth.iter().enumerate() {
        assert_abs_diff_eq!(tukey_theta[k], t, epsilon = 1e-6);
    }
}

// ── Loss descent ─────────────────────────────────────────────────────

#[test]
fn loss_descent_with_ldlt_and_contribution() {
    let samples = quadratic_samples(0);
    let n = samples.len();
    let contribution = Contribution::new().mean().with_weights(vec![2.0; n]);
    let loss = SampleLoss::with_contribution(quadratic(), samples, contribution).unwrap();

    let mut descent = LossDescent::new(loss, StepRule::GaussNewton)
        .with_factorization(Factorization::Ldlt)
        .with_stopping(IterationThreshold(3));
    descent.initialize().unwrap();
    assert_eq!(descent.iterate().unwrap(), 3);

    let theta = descent.solution_best().unwrap().clone();
    assert_abs_diff_eq!(theta[0], 0.5, epsilon = 1e-10);
    assert_abs_diff_eq!(theta[2], 3.0, epsilon = 1e-10);

    let mut loss = descent.into_loss();
    assert_eq!(loss.parameters(), theta);
    let evaluation = loss.evaluate().unwrap();
    assert!(evaluation.gradient.norm() < 1e-10);
    // mean of weight 2 times x⁴: the (0, 0) entry of JᵀWJ
    let expected: f64 = quadratic_samples(0)
        .iter()
        .map(|&(x, _)| 2.0 * x.powi(4))
        .sum::<f64>()
        / n as f64;
    assert_relative_eq!(
        evaluation.gauss_newton[(0, 0)],
        expected,
        max_relative = 1e-12
    );
}

// ── Errors ───────────────────────────────────────────────────────────

#[test]
fn errors_are_std_errors() {
    let mut fit = LeastSquares::gauss_newton(quadratic(), Vec::new());
    let err = fit.initialize().unwrap_err();
    assert_eq!(err, OptimError::NoInputs);
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert_eq!(boxed.to_string(), "no input samples");

    let mismatch =
        SampleLoss::<f64, _>::from_targets(quadratic(), quadratic_samples(0), Vec::new())
            .err()
            .unwrap();
    assert_eq!(mismatch.to_string(), "0 targets given for 30 inputs");
}

#[test]
fn bad_settings_are_errors_not_panics() {
    let err = LeastSquares::levenberg_marquardt(quadratic(), quadratic_samples(0))
        .with_damping_factor(f64::NAN)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err, OptimError::InvalidDamping { damping } if damping.is_nan()));

    assert!(Cauchy::new(0.0_f64).is_err());
    assert!(Tukey::new(-1.0_f64).is_err());

    // a quaternion chart over three parameters is refused before any step
    let f = ManifoldFunction::new(quadratic(), UnitQuaternion);
    let mut fit = LeastSquares::gauss_newton(f, quadratic_samples(0));
    let err = fit.initialize().unwrap_err();
    assert_eq!(
        err.to_string(),
        "unit quaternion parameters do not fit the chart: got 3x1"
    );
    assert_eq!(fit.step(), Err(OptimError::NotInitialized));
}
