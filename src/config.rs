use serde::{Deserialize, Serialize};

use crate::camera::CameraModel;
use crate::error::Result;
use crate::io::{object_from_json, object_to_json};

/// Which way the stored calibration quaternion rotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// The quaternion rotates camera-space points into the world frame.
    #[default]
    CameraToWorld,
    /// The quaternion rotates world-space points into the camera frame, as in VICON `.xcp` files.
    WorldToCamera,
}

/// Calibration of a single camera as read from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub id: String,
    /// Row-major 3x3 intrinsic matrix.
    pub intrinsic: Vec<Vec<f64>>,
    #[serde(default)]
    pub distortion: Vec<f64>,
    /// `[x, y, z, w]`
    pub rotation: [f64; 4],
    /// Camera position in world coordinates.
    pub translation: [f64; 3],
    #[serde(default)]
    pub image_size: Option<(u32, u32)>,
    #[serde(default)]
    pub orientation: Orientation,
}

impl CameraCalibration {
    pub fn from_camera_model(camera: &CameraModel) -> CameraCalibration {
        let k = camera.intrinsic();
        CameraCalibration {
            id: camera.id().to_string(),
            intrinsic: (0..3).map(|r| (0..3).map(|c| k[(r, c)]).collect()).collect(),
            distortion: camera.distortion().coefficients(),
            rotation: camera.extrinsic().to_quaternion(),
            translation: (*camera.extrinsic().translation()).into(),
            image_size: camera.image_size(),
            orientation: Orientation::CameraToWorld,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub cameras: Vec<CameraCalibration>,
}

impl CalibrationConfig {
    pub fn load(path: &str) -> Result<CalibrationConfig> {
        let config: CalibrationConfig = object_from_json(path)?;
        log::debug!("loaded {} camera calibrations from {}", config.cameras.len(), path);
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        object_to_json(path, self)
    }

    /// Builds every camera model, failing on the first malformed calibration.
    pub fn camera_models(&self) -> Result<Vec<CameraModel>> {
        self.cameras.iter().map(CameraModel::from_calibration).collect()
    }

    pub fn camera(&self, id: &str) -> Option<&CameraCalibration> {
        self.cameras.iter().find(|c| c.id == id)
    }
}
