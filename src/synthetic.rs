//! Seeded synthetic stereo scenes: two toed-in cameras watching a rigid marker
//! cloud that moves from frame to frame.

use nalgebra as na;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::camera::CameraModel;
use crate::config::{CalibrationConfig, CameraCalibration};
use crate::error::Result;
use crate::features::{ImageObservations, ObjectFeatures, WorldFeatures};
use crate::transform::RigidTransform;
use crate::triangulation::FramePair;

pub const OBJECT_NAME: &str = "wand";

#[derive(Debug, Clone, PartialEq)]
pub struct SceneOptions {
    pub num_points: usize,
    pub num_frames: usize,
    /// Distance between both camera centers.
    pub baseline: f64,
    /// Distance from the cameras to the center of the marker cloud.
    pub distance: f64,
    /// Half extent of the marker cloud along each axis.
    pub spread: f64,
    pub focal_length: f64,
    pub image_size: (u32, u32),
    /// Uniform pixel noise amplitude added to every observation.
    pub pixel_noise: f64,
    /// Probability of an observation being dropped.
    pub occlusion: f64,
    /// OpenCV coefficients shared by both cameras.
    pub distortion: Vec<f64>,
}

impl Default for SceneOptions {
    fn default() -> Self {
        SceneOptions {
            num_points: 12,
            num_frames: 1,
            baseline: 0.6,
            distance: 4.0,
            spread: 0.5,
            focal_length: 1000.0,
            image_size: (1280, 1024),
            pixel_noise: 0.0,
            occlusion: 0.0,
            distortion: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StereoScene {
    pub reference: CameraModel,
    pub secondary: CameraModel,
    /// Marker model in object space.
    pub model: ObjectFeatures,
    /// Object -> world pose of each frame.
    pub poses: Vec<RigidTransform>,
    pub frames: Vec<FramePair>,
}

impl StereoScene {
    /// Builds a scene; the same options and seed always give the same scene.
    pub fn generate(options: &SceneOptions, seed: u64) -> Result<StereoScene> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let (width, height) = options.image_size;
        let k = na::Matrix3::new(
            options.focal_length,
            0.0,
            width as f64 / 2.0,
            0.0,
            options.focal_length,
            height as f64 / 2.0,
            0.0,
            0.0,
            1.0,
        );
        let half = options.baseline / 2.0;
        let toe_in = (half / options.distance).atan();
        let camera_pose = |x: f64, yaw: f64, rng: &mut ChaCha8Rng| {
            let roll = rng.random_range(-0.05..0.05);
            let rotation = na::Rotation3::from_axis_angle(&na::Vector3::y_axis(), yaw)
                * na::Rotation3::from_axis_angle(&na::Vector3::z_axis(), roll);
            RigidTransform::new(rotation, na::Vector3::new(x, 0.0, 0.0))
        };
        let reference = CameraModel::new(
            "cam_left",
            k,
            &options.distortion,
            camera_pose(-half, toe_in, &mut rng),
        )?
        .with_image_size(width, height);
        let secondary = CameraModel::new(
            "cam_right",
            k,
            &options.distortion,
            camera_pose(half, -toe_in, &mut rng),
        )?
        .with_image_size(width, height);

        let s = options.spread;
        let model: ObjectFeatures = (0..options.num_points)
            .map(|i| {
                let p = na::Point3::new(
                    rng.random_range(-s..s),
                    rng.random_range(-s..s),
                    rng.random_range(-s..s),
                );
                (format!("{}_m{:02}", OBJECT_NAME, i), p)
            })
            .collect();

        let mut poses = Vec::with_capacity(options.num_frames);
        let mut frames = Vec::with_capacity(options.num_frames);
        for frame in 0..options.num_frames {
            let axis_angle = na::Vector3::new(
                rng.random_range(-0.3..0.3),
                rng.random_range(-0.3..0.3),
                rng.random_range(-0.3..0.3),
            );
            let offset = na::Vector3::new(
                rng.random_range(-0.2..0.2) * s,
                rng.random_range(-0.2..0.2) * s,
                options.distance + rng.random_range(-0.2..0.2) * s,
            );
            let pose = RigidTransform::new(na::Rotation3::from_scaled_axis(axis_angle), offset);
            let world: WorldFeatures = pose.to_parent(&model);
            frames.push(FramePair {
                frame: frame as u64,
                reference: observe(&reference, &world, options, &mut rng),
                secondary: observe(&secondary, &world, options, &mut rng),
            });
            poses.push(pose);
        }

        Ok(StereoScene {
            reference,
            secondary,
            model,
            poses,
            frames,
        })
    }

    /// Ground-truth world positions of the markers at `frame`.
    pub fn world_points(&self, frame: usize) -> Option<WorldFeatures> {
        self.poses.get(frame).map(|pose| pose.to_parent(&self.model))
    }

    pub fn calibration(&self) -> CalibrationConfig {
        CalibrationConfig {
            cameras: vec![
                CameraCalibration::from_camera_model(&self.reference),
                CameraCalibration::from_camera_model(&self.secondary),
            ],
        }
    }
}

fn observe(
    camera: &CameraModel,
    world: &WorldFeatures,
    options: &SceneOptions,
    rng: &mut ChaCha8Rng,
) -> ImageObservations {
    let (width, height) = options.image_size;
    camera
        .to_camera_space(world)
        .iter()
        .map(|(name, p)| {
            let uv = camera.project_point(p).and_then(|uv| {
                if options.occlusion > 0.0 && rng.random_bool(options.occlusion.min(1.0)) {
                    return None;
                }
                let uv = if options.pixel_noise > 0.0 {
                    let n = options.pixel_noise;
                    na::Point2::new(
                        uv.x + rng.random_range(-n..n),
                        uv.y + rng.random_range(-n..n),
                    )
                } else {
                    uv
                };
                let inside = uv.x >= 0.0
                    && uv.y >= 0.0
                    && uv.x < width as f64
                    && uv.y < height as f64;
                inside.then_some(uv)
            });
            (name.to_string(), uv)
        })
        .collect()
}
