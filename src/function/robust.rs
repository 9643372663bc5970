use crate::optim::OptimError;
use crate::traits::FloatScalar;

fn positive<T: FloatScalar>(function: &'static str, scale: T) -> Result<T, OptimError> {
    if scale > T::zero() {
        Ok(scale)
    } else {
        Err(OptimError::InvalidRobustScale {
            function,
            scale: scale.to_report(),
        })
    }
}

/// Robust shaping of the squared residual norm `s = ‖e‖²`.
///
/// `value(s)` replaces `s` in the cost and `derivative(s)` is the weight
/// applied to the sample's gradient and Gauss-Newton contributions
/// (iteratively reweighted least squares). Implementations should satisfy
/// `value(0) = 0` and `derivative(0) = 1` so that small residuals behave like
/// ordinary least squares.
pub trait RobustFunction<T: FloatScalar> {
    /// Shaped cost `g(s)`.
    fn value(&self, s: T) -> T;

    /// Derivative `g'(s)`.
    fn derivative(&self, s: T) -> T;
}

impl<T: FloatScalar, R: RobustFunction<T> + ?Sized> RobustFunction<T> for alloc::boxed::Box<R> {
    fn value(&self, s: T) -> T {
        (**self).value(s)
    }
    fn derivative(&self, s: T) -> T {
        (**self).derivative(s)
    }
}

/// `g(s) = s`: ordinary least squares.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<T: FloatScalar> RobustFunction<T> for Identity {
    #[inline]
    fn value(&self, s: T) -> T {
        s
    }
    #[inline]
    fn derivative(&self, _s: T) -> T {
        T::one()
    }
}

/// Huber: quadratic up to `‖e‖ = delta`, linear beyond.
///
/// ```text
/// g(s)  = s               if s ≤ δ²
///         2δ√s − δ²       otherwise
/// g'(s) = 1               if s ≤ δ²
///         δ / √s          otherwise
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Huber<T> {
    delta: T,
}

impl<T: FloatScalar> Huber<T> {
    /// `delta` must be strictly positive.
    pub fn new(delta: T) -> Result<Self, OptimError> {
        Ok(Self {
            delta: positive("Huber", delta)?,
        })
    }
}

impl<T: FloatScalar> RobustFunction<T> for Huber<T> {
    fn value(&self, s: T) -> T {
        let d2 = self.delta * self.delta;
        if s <= d2 {
            s
        } else {
            (T::one() + T::one()) * self.delta * s.sqrt() - d2
        }
    }

    fn derivative(&self, s: T) -> T {
        if s <= self.delta * self.delta {
            T::one()
        } else {
            self.delta / s.sqrt()
        }
    }
}

/// Cauchy (Lorentzian): `g(s) = c² ln(1 + s/c²)`, `g'(s) = 1 / (1 + s/c²)`.
#[derive(Clone, Copy, Debug)]
pub struct Cauchy<T> {
    c2: T,
}

impl<T: FloatScalar> Cauchy<T> {
    pub fn new(scale: T) -> Result<Self, OptimError> {
        let c = positive("Cauchy", scale)?;
        Ok(Self { c2: c * c })
    }
}

impl<T: FloatScalar> RobustFunction<T> for Cauchy<T> {
    fn value(&self, s: T) -> T {
        self.c2 * (s / self.c2).ln_1p()
    }

    fn derivative(&self, s: T) -> T {
        T::one() / (T::one() + s / self.c2)
    }
}

/// Smooth L1: `g(s) = 2c² (√(1 + s/c²) − 1)`, `g'(s) = 1 / √(1 + s/c²)`.
#[derive(Clone, Copy, Debug)]
pub struct SoftL1<T> {
    c2: T,
}

impl<T: FloatScalar> SoftL1<T> {
    pub fn new(scale: T) -> Result<Self, OptimError> {
        let c = positive("soft-L1", scale)?;
        Ok(Self { c2: c * c })
    }
}

impl<T: FloatScalar> RobustFunction<T> for SoftL1<T> {
    fn value(&self, s: T) -> T {
        let two = T::one() + T::one();
        two * self.c2 * ((T::one() + s / self.c2).sqrt() - T::one())
    }

    fn derivative(&self, s: T) -> T {
        T::one() / (T::one() + s / self.c2).sqrt()
    }
}

/// Tukey biweight: redescending, samples beyond `‖e‖ = c` get zero weight.
///
/// ```text
/// g(s)  = c²/3 · (1 − (1 − s/c²)³)    if s ≤ c²
///         c²/3                        otherwise
/// g'(s) = (1 − s/c²)²                 if s ≤ c²
///         0                           otherwise
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Tukey<T> {
    c2: T,
}

impl<T: FloatScalar> Tukey<T> {
    /// `c` must be strictly positive.
    pub fn new(c: T) -> Result<Self, OptimError> {
        let c = positive("Tukey", c)?;
        Ok(Self { c2: c * c })
    }
}

impl<T: FloatScalar> RobustFunction<T> for Tukey<T> {
    fn value(&self, s: T) -> T {
        let three = T::one() + T::one() + T::one();
        if s <= self.c2 {
            let r = T::one() - s / self.c2;
            self.c2 / three * (T::one() - r * r * r)
        } else {
            self.c2 / three
        }
    }

    fn derivative(&self, s: T) -> T {
        if s <= self.c2 {
            let r = T::one() - s / self.c2;
            r * r
        } else {
            T::zero()
        }
    }
}

/// Robust function from a pair of closures `(g, g')`.
///
/// ```
/// use nlsq::function::{FnRobust, RobustFunction};
///
/// let sqrt_ish = FnRobust::new(|s: f64| (1.0 + s).ln(), |s: f64| 1.0 / (1.0 + s));
/// assert_eq!(sqrt_ish.derivative(0.0), 1.0);
/// ```
#[derive(Clone, Copy)]
pub struct FnRobust<G, D> {
    g: G,
    d: D,
}

impl<G, D> FnRobust<G, D> {
    pub fn new(g: G, d: D) -> Self {
        Self { g, d }
    }
}

impl<T: FloatScalar, G: Fn(T) -> T, D: Fn(T) -> T> RobustFunction<T> for FnRobust<G, D> {
    fn value(&self, s: T) -> T {
        (self.g)(s)
    }
    fn derivative(&self, s: T) -> T {
        (self.d)(s)
    }
}
