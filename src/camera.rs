use log::debug;
use nalgebra as na;

use crate::config::{CameraCalibration, Orientation};
use crate::error::{GeometryError, Result};
use crate::features::{CameraFeatures, ImageFeatures, WorldFeatures};
use crate::transform::RigidTransform;

/// Points closer to the image plane than this are not projected.
const MIN_DEPTH: f64 = 1e-9;
const UNDISTORT_MAX_ITERATIONS: usize = 20;
const UNDISTORT_TOLERANCE: f64 = 1e-12;

/// OpenCV style lens distortion: `k1 k2 p1 p2 [k3 [k4 k5 k6]]`.
///
/// With eight coefficients the radial term is the rational model
/// `(1 + k1 r^2 + k2 r^4 + k3 r^6) / (1 + k4 r^2 + k5 r^4 + k6 r^6)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Distortion {
    k: [f64; 6],
    p: [f64; 2],
    len: usize,
}

impl Default for Distortion {
    fn default() -> Self {
        Self::none()
    }
}

impl Distortion {
    pub fn none() -> Self {
        Distortion {
            k: [0.0; 6],
            p: [0.0; 2],
            len: 0,
        }
    }

    pub fn from_coefficients(coeffs: &[f64]) -> Result<Self> {
        if !matches!(coeffs.len(), 0 | 4 | 5 | 8) {
            return Err(GeometryError::InvalidCameraParameters(format!(
                "distortion must have 0, 4, 5 or 8 coefficients, got {}",
                coeffs.len()
            )));
        }
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(GeometryError::InvalidCameraParameters(
                "distortion coefficients must be finite".to_string(),
            ));
        }
        let mut d = Self::none();
        d.len = coeffs.len();
        let get = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        d.k[0] = get(0);
        d.k[1] = get(1);
        d.p[0] = get(2);
        d.p[1] = get(3);
        d.k[2] = get(4);
        d.k[3] = get(5);
        d.k[4] = get(6);
        d.k[5] = get(7);
        Ok(d)
    }

    /// Coefficients in the order they were given.
    pub fn coefficients(&self) -> Vec<f64> {
        let all = [
            self.k[0], self.k[1], self.p[0], self.p[1], self.k[2], self.k[3], self.k[4], self.k[5],
        ];
        all[..self.len].to_vec()
    }

    pub fn is_identity(&self) -> bool {
        self.k.iter().chain(self.p.iter()).all(|c| *c == 0.0)
    }

    fn radial(&self, r2: f64) -> f64 {
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let num = 1.0 + self.k[0] * r2 + self.k[1] * r4 + self.k[2] * r6;
        let den = 1.0 + self.k[3] * r2 + self.k[4] * r4 + self.k[5] * r6;
        num / den
    }

    fn tangential(&self, x: f64, y: f64, r2: f64) -> (f64, f64) {
        let [p1, p2] = self.p;
        (
            2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        )
    }

    /// Distorts a point on the normalized image plane.
    pub fn distort(&self, p: &na::Point2<f64>) -> na::Point2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = self.radial(r2);
        let (dx, dy) = self.tangential(x, y, r2);
        na::Point2::new(x * radial + dx, y * radial + dy)
    }

    /// Inverts [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, p: &na::Point2<f64>) -> na::Point2<f64> {
        if self.is_identity() {
            return *p;
        }
        let (xd, yd) = (p.x, p.y);
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_MAX_ITERATIONS {
            let r2 = x * x + y * y;
            let radial = self.radial(r2);
            if !radial.is_finite() || radial <= 0.0 {
                break;
            }
            let (dx, dy) = self.tangential(x, y, r2);
            let nx = (xd - dx) / radial;
            let ny = (yd - dy) / radial;
            let step = (nx - x).abs().max((ny - y).abs());
            x = nx;
            y = ny;
            if step < UNDISTORT_TOLERANCE {
                break;
            }
        }
        na::Point2::new(x, y)
    }
}

/// Calibrated camera: pinhole intrinsics, lens distortion and the camera-to-world extrinsic.
#[derive(Debug, Clone)]
pub struct CameraModel {
    id: String,
    intrinsic: na::Matrix3<f64>,
    intrinsic_inv: na::Matrix3<f64>,
    distortion: Distortion,
    extrinsic: RigidTransform,
    image_size: Option<(u32, u32)>,
}

impl CameraModel {
    pub fn new(
        id: impl Into<String>,
        intrinsic: na::Matrix3<f64>,
        distortion: &[f64],
        extrinsic: RigidTransform,
    ) -> Result<Self> {
        let intrinsic_inv = validate_intrinsic(&intrinsic)?;
        Ok(CameraModel {
            id: id.into(),
            intrinsic,
            intrinsic_inv,
            distortion: Distortion::from_coefficients(distortion)?,
            extrinsic,
            image_size: None,
        })
    }

    /// Same as [`CameraModel::new`] with the intrinsic matrix given as untyped rows.
    pub fn from_rows(
        id: impl Into<String>,
        intrinsic_rows: &[Vec<f64>],
        distortion: &[f64],
        extrinsic: RigidTransform,
    ) -> Result<Self> {
        if intrinsic_rows.len() != 3 || intrinsic_rows.iter().any(|r| r.len() != 3) {
            let shape: Vec<usize> = intrinsic_rows.iter().map(Vec::len).collect();
            return Err(GeometryError::InvalidCameraParameters(format!(
                "intrinsic matrix must be 3x3, got rows of lengths {:?}",
                shape
            )));
        }
        let k = na::Matrix3::from_fn(|r, c| intrinsic_rows[r][c]);
        Self::new(id, k, distortion, extrinsic)
    }

    pub fn from_calibration(calibration: &CameraCalibration) -> Result<Self> {
        let pose = RigidTransform::from_quaternion(calibration.rotation, calibration.translation)?;
        let extrinsic = match calibration.orientation {
            Orientation::CameraToWorld => pose,
            // the position stays in world coordinates, only the orientation is flipped
            Orientation::WorldToCamera => {
                RigidTransform::new(pose.rotation().inverse(), *pose.translation())
            }
        };
        let model = Self::from_rows(
            calibration.id.clone(),
            &calibration.intrinsic,
            &calibration.distortion,
            extrinsic,
        )?;
        Ok(match calibration.image_size {
            Some((w, h)) => model.with_image_size(w, h),
            None => model,
        })
    }

    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some((width, height));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn intrinsic(&self) -> &na::Matrix3<f64> {
        &self.intrinsic
    }

    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    pub fn extrinsic(&self) -> &RigidTransform {
        &self.extrinsic
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    /// Projects a camera-space point to pixels, `None` when it is not in front of the camera.
    pub fn project_point(&self, p: &na::Point3<f64>) -> Option<na::Point2<f64>> {
        if !(p.z > MIN_DEPTH) {
            return None;
        }
        let normalized = na::Point2::new(p.x / p.z, p.y / p.z);
        let distorted = self.distortion.distort(&normalized);
        Some(self.apply_intrinsic(&distorted))
    }

    pub fn project(&self, points: &[na::Point3<f64>]) -> Vec<Option<na::Point2<f64>>> {
        points.iter().map(|p| self.project_point(p)).collect()
    }

    /// Projects camera-space features; features behind the camera are left out.
    pub fn project_features(&self, features: &CameraFeatures) -> ImageFeatures {
        features
            .iter()
            .filter_map(|(name, p)| match self.project_point(p) {
                Some(uv) => Some((name.to_string(), uv)),
                None => {
                    debug!("cam {}: {} is behind the camera, skipped", self.id, name);
                    None
                }
            })
            .collect()
    }

    /// Removes lens distortion from a pixel, giving the pixel an ideal pinhole camera
    /// would observe.
    pub fn undistort_point(&self, uv: &na::Point2<f64>) -> na::Point2<f64> {
        if self.distortion.is_identity() {
            return *uv;
        }
        let h = self.intrinsic_inv * na::Vector3::new(uv.x, uv.y, 1.0);
        let normalized = self.distortion.undistort(&na::Point2::new(h.x / h.z, h.y / h.z));
        self.apply_intrinsic(&normalized)
    }

    /// `K * [R | t]`
    pub fn projection_matrix(
        &self,
        rotation: &na::Rotation3<f64>,
        translation: &na::Vector3<f64>,
    ) -> na::Matrix3x4<f64> {
        let mut rt = na::Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation.matrix());
        rt.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        self.intrinsic * rt
    }

    pub fn points_to_camera_space(&self, points: &[na::Point3<f64>]) -> Vec<na::Point3<f64>> {
        self.extrinsic.apply(points, true)
    }

    pub fn points_to_world_space(&self, points: &[na::Point3<f64>]) -> Vec<na::Point3<f64>> {
        self.extrinsic.apply(points, false)
    }

    pub fn to_camera_space(&self, features: &WorldFeatures) -> CameraFeatures {
        self.extrinsic.to_local(features)
    }

    pub fn to_world_space(&self, features: &CameraFeatures) -> WorldFeatures {
        self.extrinsic.to_parent(features)
    }

    fn apply_intrinsic(&self, normalized: &na::Point2<f64>) -> na::Point2<f64> {
        let uv = self.intrinsic * na::Vector3::new(normalized.x, normalized.y, 1.0);
        na::Point2::new(uv.x, uv.y)
    }
}

fn validate_intrinsic(k: &na::Matrix3<f64>) -> Result<na::Matrix3<f64>> {
    if k.iter().any(|v| !v.is_finite()) {
        return Err(GeometryError::InvalidCameraParameters(
            "intrinsic matrix must be finite".to_string(),
        ));
    }
    if k[(0, 0)] <= 0.0 || k[(1, 1)] <= 0.0 {
        return Err(GeometryError::InvalidCameraParameters(format!(
            "focal lengths must be positive, got fx={} fy={}",
            k[(0, 0)],
            k[(1, 1)]
        )));
    }
    if k[(1, 0)] != 0.0 || k[(2, 0)] != 0.0 || k[(2, 1)] != 0.0 || k[(2, 2)] != 1.0 {
        return Err(GeometryError::InvalidCameraParameters(format!(
            "intrinsic matrix must be upper triangular with k22 = 1, got {}",
            k
        )));
    }
    k.try_inverse().ok_or_else(|| {
        GeometryError::InvalidCameraParameters("intrinsic matrix is not invertible".to_string())
    })
}
