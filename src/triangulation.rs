//! Two-view linear triangulation.
//!
//! Results are expressed in the frame of the reference camera: the reference
//! camera projects with `K1 [I | 0]` and the secondary one with `K2 [R | t]`,
//! where `[R | t]` carries reference-camera points into the secondary camera.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace, warn};
use nalgebra as na;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::camera::CameraModel;
use crate::error::{GeometryError, Result};
use crate::features::{Camera, CameraFeatures, ImageObservations, WorldFeatures};
use crate::metrics::reprojection_error_2d;
use crate::transform::RigidTransform;

/// Relative size of the homogeneous coordinate below which a point is considered at infinity.
const MIN_HOMOGENEOUS_SCALE: f64 = 1e-12;

/// A feature observed in both images.
#[derive(Debug, Clone, PartialEq)]
pub struct Correspondence {
    pub name: String,
    pub reference: na::Point2<f64>,
    pub secondary: na::Point2<f64>,
}

/// Features seen by both cameras in the current frame, ordered by name.
///
/// A feature missing from either set, or not observed in either image, is left out.
pub fn filter_correspondences(
    reference: &ImageObservations,
    secondary: &ImageObservations,
) -> Vec<Correspondence> {
    reference
        .iter()
        .filter_map(|(name, p1)| {
            let p2 = secondary.get(name)?;
            match (p1, p2) {
                (Some(p1), Some(p2)) => Some(Correspondence {
                    name: name.to_string(),
                    reference: *p1,
                    secondary: *p2,
                }),
                _ => {
                    trace!("{} is occluded in one view", name);
                    None
                }
            }
        })
        .collect()
}

/// DLT triangulation of one point from two projection matrices.
///
/// Returns `None` when the solution lies at infinity.
pub fn triangulate_point(
    p1: &na::Matrix3x4<f64>,
    p2: &na::Matrix3x4<f64>,
    x1: &na::Point2<f64>,
    x2: &na::Point2<f64>,
) -> Option<na::Point3<f64>> {
    let mut a = na::Matrix4::<f64>::zeros();
    a.set_row(0, &(x1.x * p1.row(2) - p1.row(0)));
    a.set_row(1, &(x1.y * p1.row(2) - p1.row(1)));
    a.set_row(2, &(x2.x * p2.row(2) - p2.row(0)));
    a.set_row(3, &(x2.y * p2.row(2) - p2.row(1)));

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let x_h = v_t.row(idx);

    let w = x_h[3];
    let scale = x_h.norm();
    if !w.is_finite() || w.abs() <= MIN_HOMOGENEOUS_SCALE * scale {
        return None;
    }
    Some(na::Point3::new(x_h[0] / w, x_h[1] / w, x_h[2] / w))
}

/// Output of one frame of triangulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangulation {
    /// Triangulated features in reference-camera space.
    pub points: CameraFeatures,
    /// Features that were matched but could not be triangulated (solution at infinity)
    /// or whose reprojection error was above the accepted limit.
    pub rejected: Vec<String>,
}

impl Triangulation {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Moves every point whose reprojection error exceeds `limit` pixels in either image
    /// into `rejected`, returning how many were moved.
    pub fn reject_above(&mut self, errors: &ReprojectionErrors, limit: f64) -> usize {
        let too_far: BTreeSet<&str> = errors
            .reference
            .iter()
            .chain(errors.secondary.iter())
            .filter(|(name, e)| **e > limit && self.points.contains(name))
            .map(|(name, _)| name.as_str())
            .collect();
        if too_far.is_empty() {
            return 0;
        }
        debug!("rejecting {:?} above {} px", too_far, limit);
        self.points = self.points.without(too_far.iter().copied());
        self.rejected.extend(too_far.iter().map(|name| name.to_string()));
        too_far.len()
    }
}

/// Per-feature reprojection error of a triangulation in both images.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReprojectionErrors {
    pub reference: BTreeMap<String, f64>,
    pub secondary: BTreeMap<String, f64>,
}

/// Observations of both cameras for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FramePair {
    pub frame: u64,
    pub reference: ImageObservations,
    pub secondary: ImageObservations,
}

#[derive(Debug, Clone)]
pub struct Triangulator {
    reference: CameraModel,
    secondary: CameraModel,
    relative_pose: RigidTransform,
    projection_reference: na::Matrix3x4<f64>,
    projection_secondary: na::Matrix3x4<f64>,
}

impl Triangulator {
    pub fn new(reference: CameraModel, secondary: CameraModel) -> Self {
        // secondary camera space -> reference camera space
        let relative_pose = reference.extrinsic().invert().compose(secondary.extrinsic());
        let reference_to_secondary = relative_pose.invert();
        let projection_reference =
            reference.projection_matrix(&na::Rotation3::identity(), &na::Vector3::zeros());
        let projection_secondary = secondary.projection_matrix(
            reference_to_secondary.rotation(),
            reference_to_secondary.translation(),
        );
        debug!(
            "stereo pair {} / {}: baseline {:.3}",
            reference.id(),
            secondary.id(),
            relative_pose.translation().norm()
        );
        Triangulator {
            reference,
            secondary,
            relative_pose,
            projection_reference,
            projection_secondary,
        }
    }

    /// Takes the first camera as reference and the second as secondary.
    pub fn from_cameras(cameras: Vec<CameraModel>) -> Result<Self> {
        let count = cameras.len();
        let mut it = cameras.into_iter();
        match (it.next(), it.next(), it.next()) {
            (Some(reference), Some(secondary), None) => Ok(Self::new(reference, secondary)),
            _ => Err(GeometryError::UnsupportedCameraCount(count)),
        }
    }

    pub fn reference(&self) -> &CameraModel {
        &self.reference
    }

    pub fn secondary(&self) -> &CameraModel {
        &self.secondary
    }

    /// Maps secondary-camera space into reference-camera space.
    pub fn relative_pose(&self) -> &RigidTransform {
        &self.relative_pose
    }

    pub fn projection_matrices(&self) -> (&na::Matrix3x4<f64>, &na::Matrix3x4<f64>) {
        (&self.projection_reference, &self.projection_secondary)
    }

    /// Triangulates every feature observed by both cameras.
    pub fn triangulate(
        &self,
        reference: &ImageObservations,
        secondary: &ImageObservations,
    ) -> Triangulation {
        let correspondences = filter_correspondences(reference, secondary);
        let mut result = Triangulation::default();
        for c in &correspondences {
            let x1 = self.reference.undistort_point(&c.reference);
            let x2 = self.secondary.undistort_point(&c.secondary);
            match triangulate_point(
                &self.projection_reference,
                &self.projection_secondary,
                &x1,
                &x2,
            ) {
                Some(p) => {
                    result.points.insert(c.name.clone(), p);
                }
                None => {
                    warn!("{} could not be triangulated, rays are parallel", c.name);
                    result.rejected.push(c.name.clone());
                }
            }
        }
        debug!(
            "triangulated {} of {} matched features",
            result.points.len(),
            correspondences.len()
        );
        result
    }

    /// Positional variant: `views[0]` belongs to the reference camera, `views[1]` to the secondary.
    pub fn triangulate_views(&self, views: &[ImageObservations]) -> Result<Triangulation> {
        match views {
            [reference, secondary] => Ok(self.triangulate(reference, secondary)),
            _ => Err(GeometryError::UnsupportedCameraCount(views.len())),
        }
    }

    /// Triangulated features expressed in the world frame.
    pub fn world_points(&self, triangulation: &Triangulation) -> WorldFeatures {
        self.reference.to_world_space(&triangulation.points)
    }

    /// [`Triangulator::triangulate`] followed by [`Triangulator::world_points`].
    pub fn triangulate_world(
        &self,
        reference: &ImageObservations,
        secondary: &ImageObservations,
    ) -> WorldFeatures {
        self.world_points(&self.triangulate(reference, secondary))
    }

    /// Projects a triangulation back into both images and compares it with the observations.
    pub fn reprojection_errors(
        &self,
        triangulation: &Triangulation,
        reference: &ImageObservations,
        secondary: &ImageObservations,
    ) -> ReprojectionErrors {
        let in_secondary: CameraFeatures = self
            .relative_pose
            .to_local::<Camera, Camera>(&triangulation.points);
        ReprojectionErrors {
            reference: reprojection_error_2d(
                &reference.observed(),
                &self.reference.project_features(&triangulation.points),
            ),
            secondary: reprojection_error_2d(
                &secondary.observed(),
                &self.secondary.project_features(&in_secondary),
            ),
        }
    }

    /// Triangulates independent frames in parallel, keeping the input order.
    pub fn triangulate_frames(&self, frames: &[FramePair]) -> Vec<Triangulation> {
        frames
            .par_iter()
            .map(|f| {
                trace!("frame {}", f.frame);
                self.triangulate(&f.reference, &f.secondary)
            })
            .collect()
    }
}
