use crate::dynmatrix::DynMatrix;
use crate::optim::OptimError;
use crate::quaternion::Quaternion;
use crate::traits::FloatScalar;

/// A chart for shifting a parameter point along a local tangent increment.
///
/// Points are column vectors of the ambient length; increments are
/// `degrees_of_freedom x 1` columns in local coordinates, which is also the
/// column count of any Jacobian used with this chart.
pub trait Manifold<T: FloatScalar> {
    /// Dimension of the tangent space at `point`.
    fn degrees_of_freedom(&self, point: &DynMatrix<T>) -> usize;

    /// Fails with [`OptimError::ManifoldDimension`] if `point` does not have
    /// the shape this chart retracts. Any column is accepted by default.
    fn check_point(&self, point: &DynMatrix<T>) -> Result<(), OptimError> {
        let _ = point;
        Ok(())
    }

    /// `point ⊞ delta`. `point` must have passed
    /// [`check_point`](Manifold::check_point).
    fn retract(&self, point: &DynMatrix<T>, delta: &DynMatrix<T>) -> DynMatrix<T>;
}

/// Flat space: `θ ⊞ Δ = θ + Δ`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Euclidean;

impl<T: FloatScalar> Manifold<T> for Euclidean {
    fn degrees_of_freedom(&self, point: &DynMatrix<T>) -> usize {
        point.nrows()
    }

    fn retract(&self, point: &DynMatrix<T>, delta: &DynMatrix<T>) -> DynMatrix<T> {
        point + delta
    }
}

/// Unit-norm vectors in `Rⁿ` (the sphere `Sⁿ⁻¹`).
///
/// Local coordinates are taken in an orthonormal basis of the tangent plane
/// built from a Householder reflection that maps the point to a coordinate
/// axis; the shift follows the great circle (exponential map).
#[derive(Clone, Copy, Debug, Default)]
pub struct UnitSphere;

impl UnitSphere {
    /// Orthonormal basis of the tangent plane at unit vector `x`, as an
    /// `n x (n-1)` matrix whose columns are orthogonal to `x`.
    ///
    /// Panics unless `x` is `n x 1` with `n >= 2`.
    ///
    /// ```
    /// use nlsq::DynMatrix;
    /// use nlsq::function::UnitSphere;
    ///
    /// let x = DynMatrix::column(&[0.6_f64, 0.0, 0.8]);
    /// let b = UnitSphere.tangent_basis(&x);
    /// assert_eq!((b.nrows(), b.ncols()), (3, 2));
    /// assert!(b.tr_mul(&x).norm() < 1e-12);
    /// ```
    pub fn tangent_basis<T: FloatScalar>(&self, x: &DynMatrix<T>) -> DynMatrix<T> {
        let n = x.nrows();
        assert!(
            n >= 2 && x.is_column(),
            "unit sphere points are nx1 with n >= 2"
        );
        let two = T::one() + T::one();
        let last = x[n - 1];
        let sign = if last < T::zero() {
            -T::one()
        } else {
            T::one()
        };

        // v = x + sign * e_{n-1}; H = I - 2 v vᵀ / (vᵀ v) sends x to -sign * e_{n-1}
        let mut v = x.clone();
        v[n - 1] = last + sign;
        let vtv = v.norm_squared();

        DynMatrix::from_fn(n, n - 1, |i, k| {
            let e = if i == k { T::one() } else { T::zero() };
            e - two * v[i] * v[k] / vtv
        })
    }
}

impl<T: FloatScalar> Manifold<T> for UnitSphere {
    fn degrees_of_freedom(&self, point: &DynMatrix<T>) -> usize {
        point.nrows().saturating_sub(1)
    }

    fn check_point(&self, point: &DynMatrix<T>) -> Result<(), OptimError> {
        if point.is_column() && point.nrows() >= 2 {
            Ok(())
        } else {
            Err(OptimError::ManifoldDimension {
                manifold: "unit sphere",
                rows: point.nrows(),
                cols: point.ncols(),
            })
        }
    }

    fn retract(&self, point: &DynMatrix<T>, delta: &DynMatrix<T>) -> DynMatrix<T> {
        let t = &self.tangent_basis(point) * delta;
        let angle = t.norm();
        let moved = if angle < T::epsilon().sqrt() {
            point + &t
        } else {
            point * angle.cos() + t * (angle.sin() / angle)
        };
        let n = moved.norm();
        moved * (T::one() / n)
    }
}

/// Unit quaternions `[w, x, y, z]` with 3 rotational degrees of freedom.
///
/// `q ⊞ δ = q ⊗ exp(δ)`: the increment is a rotation vector in the body
/// frame of `q`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnitQuaternion;

impl<T: FloatScalar> Manifold<T> for UnitQuaternion {
    fn degrees_of_freedom(&self, _point: &DynMatrix<T>) -> usize {
        3
    }

    fn check_point(&self, point: &DynMatrix<T>) -> Result<(), OptimError> {
        if (point.nrows(), point.ncols()) == (4, 1) {
            Ok(())
        } else {
            Err(OptimError::ManifoldDimension {
                manifold: "unit quaternion",
                rows: point.nrows(),
                cols: point.ncols(),
            })
        }
    }

    fn retract(&self, point: &DynMatrix<T>, delta: &DynMatrix<T>) -> DynMatrix<T> {
        assert_eq!(
            (point.nrows(), point.ncols(), delta.nrows(), delta.ncols()),
            (4, 1, 3, 1),
            "unit quaternion retraction expects a 4x1 point and a 3x1 increment",
        );
        let q = Quaternion::new(point[0], point[1], point[2], point[3]);
        let dq = Quaternion::from_rotation_vector([delta[0], delta[1], delta[2]]);
        (q * dq).normalize().to_column()
    }
}
