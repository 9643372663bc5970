use core::ops::{Mul, Neg};

use crate::dynmatrix::DynMatrix;
use crate::traits::FloatScalar;

/// Unit quaternion for 3D rotations.
///
/// Scalar-first convention: `[w, x, y, z]` where `w` is the scalar part
/// and `(x, y, z)` is the vector part. As a parameter vector it is stored
/// as a 4x1 column in the same order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion<T> {
    pub w: T,
    pub x: T,
    pub y: T,
    pub z: T,
}

// ── Constructors ─────────────────────────────────────────────────────

impl<T: FloatScalar> Quaternion<T> {
    /// Create a quaternion from components.
    #[inline]
    pub fn new(w: T, x: T, y: T, z: T) -> Self {
        Self { w, x, y, z }
    }

    /// Identity quaternion (no rotation).
    #[inline]
    pub fn identity() -> Self {
        Self::new(T::one(), T::zero(), T::zero(), T::zero())
    }

    /// Exponential map from a rotation vector (axis * angle, radians).
    ///
    /// Falls back to the first-order expansion near zero, then renormalizes.
    pub fn from_rotation_vector(v: [T; 3]) -> Self {
        let two = T::one() + T::one();
        let angle = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if angle < T::epsilon().sqrt() {
            return Self::new(T::one(), v[0] / two, v[1] / two, v[2] / two).normalize();
        }
        let (s, c) = (angle / two).sin_cos();
        let k = s / angle;
        Self::new(c, v[0] * k, v[1] * k, v[2] * k)
    }

    /// Read a quaternion from a 4x1 column `[w, x, y, z]`.
    ///
    /// Returns `None` if the matrix is not 4x1.
    pub fn from_column(m: &DynMatrix<T>) -> Option<Self> {
        if m.nrows() != 4 || !m.is_column() {
            return None;
        }
        Some(Self::new(m[0], m[1], m[2], m[3]))
    }
}

// ── Algebra ──────────────────────────────────────────────────────────

impl<T: FloatScalar> Quaternion<T> {
    /// Conjugate: negates the vector part.
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Squared norm.
    #[inline]
    pub fn norm_squared(&self) -> T {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Norm.
    #[inline]
    pub fn norm(&self) -> T {
        self.norm_squared().sqrt()
    }

    /// Return the unit quaternion in the same direction.
    ///
    /// A zero quaternion normalizes to the identity.
    pub fn normalize(&self) -> Self {
        let n = self.norm();
        if n == T::zero() {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Logarithm map: the rotation vector (axis * angle) of a unit quaternion.
    ///
    /// Inverse of [`Quaternion::from_rotation_vector`] for angles in `[0, π]`.
    pub fn to_rotation_vector(&self) -> [T; 3] {
        let two = T::one() + T::one();
        // q and -q are the same rotation; pick the short way round.
        let q = if self.w < T::zero() { -*self } else { *self };
        let vn = (q.x * q.x + q.y * q.y + q.z * q.z).sqrt();
        if vn < T::epsilon() {
            return [q.x * two, q.y * two, q.z * two];
        }
        let angle = two * vn.atan2(q.w);
        let k = angle / vn;
        [q.x * k, q.y * k, q.z * k]
    }

    /// Rotate a 3-vector: `q * v * q⁻¹` for a unit quaternion.
    pub fn rotate(&self, v: [T; 3]) -> [T; 3] {
        let p = Self::new(T::zero(), v[0], v[1], v[2]);
        let r = *self * p * self.conjugate();
        [r.x, r.y, r.z]
    }

    /// Write as a 4x1 column `[w, x, y, z]`.
    pub fn to_column(&self) -> DynMatrix<T> {
        DynMatrix::column(&[self.w, self.x, self.y, self.z])
    }
}

// ── Operators ────────────────────────────────────────────────────────

// Hamilton product: q1 * q2
impl<T: FloatScalar> Mul for Quaternion<T> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

impl<T: FloatScalar> Neg for Quaternion<T> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.w, -self.x, -self.y, -self.z)
    }
}
