use nalgebra as na;

use crate::error::{GeometryError, Result};
use crate::features::{CoordinateFrame, FeatureSet};

const MIN_QUATERNION_NORM: f64 = 1e-12;
const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// Rotation followed by translation, mapping a local (object or camera) frame
/// into its parent (world) frame: `p_parent = R * p_local + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    rotation: na::Rotation3<f64>,
    translation: na::Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: na::Rotation3::identity(),
            translation: na::Vector3::zeros(),
        }
    }

    pub fn new(rotation: na::Rotation3<f64>, translation: na::Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Builds a transform from a quaternion stored as `[x, y, z, w]` and a translation.
    ///
    /// The quaternion does not need to be unit length; it is normalized first.
    pub fn from_quaternion(q: [f64; 4], t: [f64; 3]) -> Result<Self> {
        let quaternion = na::Quaternion::new(q[3], q[0], q[1], q[2]);
        let norm = quaternion.norm();
        if !norm.is_finite() || norm < MIN_QUATERNION_NORM {
            return Err(GeometryError::DegenerateRotation(format!(
                "quaternion {:?} has norm {}",
                q, norm
            )));
        }
        let unit = na::UnitQuaternion::new_unchecked(quaternion / norm);
        Ok(Self {
            rotation: unit.to_rotation_matrix(),
            translation: na::Vector3::from(t),
        })
    }

    /// Builds a transform from a 3x3 matrix, which must be orthonormal with determinant +1.
    pub fn from_rotation_matrix(m: na::Matrix3<f64>, t: na::Vector3<f64>) -> Result<Self> {
        let gram_error = (m.transpose() * m - na::Matrix3::identity()).abs().max();
        let det = m.determinant();
        if !gram_error.is_finite() || gram_error > ORTHONORMAL_TOLERANCE {
            return Err(GeometryError::DegenerateRotation(format!(
                "matrix is not orthonormal (|R^T R - I| = {:e})",
                gram_error
            )));
        }
        if (det - 1.0).abs() > ORTHONORMAL_TOLERANCE {
            return Err(GeometryError::DegenerateRotation(format!(
                "matrix determinant is {} instead of +1",
                det
            )));
        }
        Ok(Self {
            rotation: na::Rotation3::from_matrix_unchecked(m),
            translation: t,
        })
    }

    pub fn rotation(&self) -> &na::Rotation3<f64> {
        &self.rotation
    }

    pub fn rotation_matrix(&self) -> &na::Matrix3<f64> {
        self.rotation.matrix()
    }

    pub fn translation(&self) -> &na::Vector3<f64> {
        &self.translation
    }

    /// Rotation as `[x, y, z, w]` with a non-negative scalar part.
    pub fn to_quaternion(&self) -> [f64; 4] {
        let q = na::UnitQuaternion::from_rotation_matrix(&self.rotation).into_inner();
        if q.w < 0.0 {
            [-q.i, -q.j, -q.k, -q.w]
        } else {
            [q.i, q.j, q.k, q.w]
        }
    }

    pub fn to_isometry(&self) -> na::Isometry3<f64> {
        na::Isometry3::from_parts(
            na::Translation3::from(self.translation),
            na::UnitQuaternion::from_rotation_matrix(&self.rotation),
        )
    }

    pub fn to_homogeneous(&self) -> na::Matrix4<f64> {
        let mut m = na::Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(self.rotation.matrix());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    #[inline]
    pub fn apply_point(&self, p: &na::Point3<f64>) -> na::Point3<f64> {
        self.rotation * *p + self.translation
    }

    #[inline]
    pub fn apply_inverse_point(&self, p: &na::Point3<f64>) -> na::Point3<f64> {
        self.rotation.inverse() * (*p - self.translation)
    }

    /// Maps every point forward (`R p + t`) or, with `inverse`, backward (`R^T (p - t)`).
    pub fn apply(&self, points: &[na::Point3<f64>], inverse: bool) -> Vec<na::Point3<f64>> {
        if inverse {
            points.iter().map(|p| self.apply_inverse_point(p)).collect()
        } else {
            points.iter().map(|p| self.apply_point(p)).collect()
        }
    }

    /// The transform equivalent to applying `other` first and then `self`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn invert(&self) -> RigidTransform {
        let rotation = self.rotation.inverse();
        RigidTransform {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Expresses local-frame features in the parent frame.
    pub fn to_parent<S, D>(
        &self,
        features: &FeatureSet<S, na::Point3<f64>>,
    ) -> FeatureSet<D, na::Point3<f64>>
    where
        S: CoordinateFrame,
        D: CoordinateFrame,
    {
        features.map_points(|p| self.apply_point(p))
    }

    /// Expresses parent-frame features in the local frame.
    pub fn to_local<S, D>(
        &self,
        features: &FeatureSet<S, na::Point3<f64>>,
    ) -> FeatureSet<D, na::Point3<f64>>
    where
        S: CoordinateFrame,
        D: CoordinateFrame,
    {
        features.map_points(|p| self.apply_inverse_point(p))
    }

    /// Angle in radians of the rotation separating `self` from `other`.
    pub fn angular_distance(&self, other: &RigidTransform) -> f64 {
        let delta = self.rotation.inverse() * other.rotation;
        let q = na::UnitQuaternion::from_rotation_matrix(&delta).into_inner();
        2.0 * q.imag().norm().atan2(q.w.abs())
    }

    pub fn translation_distance(&self, other: &RigidTransform) -> f64 {
        (self.translation - other.translation).norm()
    }
}
