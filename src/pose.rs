//! Absolute orientation: the rigid transform that best maps one set of
//! corresponding 3D points onto another, in the least-squares sense.

use log::{debug, trace};
use nalgebra as na;

use crate::error::{GeometryError, Result};
use crate::features::{CoordinateFrame, FeatureSet};
use crate::transform::RigidTransform;

const MIN_CORRESPONDENCES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimator {
    /// Relative threshold on singular values of the cross-covariance below
    /// which they are considered zero (or equal to each other).
    pub degeneracy_tolerance: f64,
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self {
            degeneracy_tolerance: 1e-9,
        }
    }
}

impl PoseEstimator {
    pub fn new(degeneracy_tolerance: f64) -> Self {
        Self {
            degeneracy_tolerance,
        }
    }

    /// Finds `R`, `t` minimizing `sum |target_i - (R source_i + t)|^2`.
    pub fn estimate(
        &self,
        source: &[na::Point3<f64>],
        target: &[na::Point3<f64>],
    ) -> Result<RigidTransform> {
        if source.len() != target.len() {
            return Err(GeometryError::SizeMismatch {
                left: source.len(),
                right: target.len(),
            });
        }
        if source.len() < MIN_CORRESPONDENCES {
            return Err(GeometryError::InsufficientCorrespondences {
                required: MIN_CORRESPONDENCES,
                got: source.len(),
            });
        }

        let (source_centroid, target_centroid) = compute_centroids(source, target);

        // H = sum (a_i - a_mean) (b_i - b_mean)^T
        let h = source
            .iter()
            .zip(target)
            .fold(na::Matrix3::zeros(), |h, (a, b)| {
                h + (*a - source_centroid) * (*b - target_centroid).transpose()
            });

        let svd = h.svd(true, true);
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(GeometryError::DegenerateGeometry(
                "svd of the cross-covariance did not converge".to_string(),
            ));
        };
        let sigma = svd.singular_values;
        trace!("cross-covariance singular values {:?}", sigma.as_slice());

        let mut order = [0usize, 1, 2];
        order.sort_by(|&i, &j| sigma[j].total_cmp(&sigma[i]));
        let (largest, middle, smallest) = (sigma[order[0]], sigma[order[1]], sigma[order[2]]);
        let scale = largest.max(f64::MIN_POSITIVE);
        if middle <= self.degeneracy_tolerance * scale {
            return Err(GeometryError::DegenerateGeometry(format!(
                "points are collinear or coincident (singular values {:.3e}, {:.3e}, {:.3e})",
                largest, middle, smallest
            )));
        }

        let mut v = v_t.transpose();
        let mut r = v * u.transpose();
        if r.determinant() < 0.0 {
            if (middle - smallest) <= self.degeneracy_tolerance * scale {
                return Err(GeometryError::DegenerateGeometry(
                    "reflection correction is ambiguous: the two smallest singular values coincide"
                        .to_string(),
                ));
            }
            debug!("correcting reflection in absolute orientation");
            let flipped = -v.column(order[2]);
            v.set_column(order[2], &flipped);
            r = v * u.transpose();
        }

        let rotation = na::Rotation3::from_matrix_unchecked(r);
        let translation = target_centroid.coords - rotation * source_centroid.coords;
        Ok(RigidTransform::new(rotation, translation))
    }

    /// Estimates the transform from features matched by name.
    pub fn estimate_features<S, D>(
        &self,
        source: &FeatureSet<S, na::Point3<f64>>,
        target: &FeatureSet<D, na::Point3<f64>>,
    ) -> Result<RigidTransform>
    where
        S: CoordinateFrame,
        D: CoordinateFrame,
    {
        let (names, source_points, target_points) = source.matched_with(target);
        debug!(
            "estimating {} -> {} pose from {} named markers",
            S::NAME,
            D::NAME,
            names.len()
        );
        self.estimate(&source_points, &target_points)
    }
}

/// [`PoseEstimator::estimate`] with default tolerances.
pub fn estimate_rigid_transform(
    source: &[na::Point3<f64>],
    target: &[na::Point3<f64>],
) -> Result<RigidTransform> {
    PoseEstimator::default().estimate(source, target)
}

/// Compute the centroids of two sets of points.
pub(crate) fn compute_centroids(
    points1: &[na::Point3<f64>],
    points2: &[na::Point3<f64>],
) -> (na::Point3<f64>, na::Point3<f64>) {
    let mut centroid1 = na::Vector3::zeros();
    let mut centroid2 = na::Vector3::zeros();

    for (p1, p2) in points1.iter().zip(points2.iter()) {
        centroid1 += p1.coords;
        centroid2 += p2.coords;
    }

    centroid1 /= points1.len() as f64;
    centroid2 /= points2.len() as f64;

    (na::Point3::from(centroid1), na::Point3::from(centroid2))
}
