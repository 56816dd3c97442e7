pub mod camera;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod metrics;
pub mod pose;
pub mod synthetic;
pub mod tracking;
pub mod transform;
pub mod triangulation;

pub use camera::{CameraModel, Distortion};
pub use error::{GeometryError, Result};
pub use features::{
    CameraFeatures, FeatureSet, ImageFeatures, ImageObservations, ObjectFeatures, WorldFeatures,
};
pub use pose::{PoseEstimator, estimate_rigid_transform};
pub use transform::RigidTransform;
pub use triangulation::{Triangulation, Triangulator};
