//! Rigid bodies tracked by the capture system and the flow of their marker
//! features between object space and world space.

use log::{debug, warn};

use crate::error::Result;
use crate::features::{ObjectFeatures, WorldFeatures};
use crate::metrics;
use crate::pose::PoseEstimator;
use crate::transform::RigidTransform;

/// A rigid body with its marker model and, per frame, its pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedObject {
    name: String,
    /// Marker positions in the object's own frame.
    features: ObjectFeatures,
    /// Object -> world. `None` while the capture system reports the pose as invalid.
    pose: Option<RigidTransform>,
}

impl TrackedObject {
    pub fn new(name: impl Into<String>, features: ObjectFeatures) -> Self {
        TrackedObject {
            name: name.into(),
            features,
            pose: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &ObjectFeatures {
        &self.features
    }

    pub fn pose(&self) -> Option<&RigidTransform> {
        self.pose.as_ref()
    }

    pub fn set_pose(&mut self, pose: Option<RigidTransform>) {
        self.pose = pose;
    }

    /// Adds features to the marker model; a feature already present is overwritten.
    pub fn set_features(&mut self, features: &ObjectFeatures) {
        self.features = std::mem::take(&mut self.features).merge(features.clone());
        debug!("{}: {} model features", self.name, self.features.len());
    }

    /// Adds only the features labelled with this object's name, as read from a
    /// shared marker file.
    pub fn load_features(&mut self, features: &ObjectFeatures) {
        self.set_features(&features.belonging_to(&self.name));
    }

    pub fn remove_features<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        self.features = self.features.without(names);
    }

    /// World features labelled with this object's name.
    pub fn own_features(&self, features: &WorldFeatures) -> WorldFeatures {
        features.belonging_to(&self.name)
    }

    /// The marker model expressed in world space at the current pose.
    pub fn features_to_world(&self) -> WorldFeatures {
        self.model_to_world(&self.features)
    }

    /// Arbitrary object-space features expressed in world space at the current pose.
    pub fn model_to_world(&self, features: &ObjectFeatures) -> WorldFeatures {
        match &self.pose {
            Some(pose) => pose.to_parent(features),
            None => {
                warn!("{}: no valid pose, features not transferred", self.name);
                WorldFeatures::new()
            }
        }
    }

    /// World-space features expressed in this object's frame at the current pose.
    pub fn features_to_object(&self, features: &WorldFeatures) -> ObjectFeatures {
        match &self.pose {
            Some(pose) => pose.to_local(features),
            None => {
                warn!("{}: no valid pose, features not transferred", self.name);
                ObjectFeatures::new()
            }
        }
    }

    /// Recovers the pose from observed marker positions and stores it.
    ///
    /// Only markers present both in the model and in `observed` take part.
    pub fn estimate_pose(
        &mut self,
        observed: &WorldFeatures,
        estimator: &PoseEstimator,
    ) -> Result<RigidTransform> {
        let pose = estimator.estimate_features(&self.features, &self.own_features(observed))?;
        self.pose = Some(pose);
        Ok(pose)
    }

    /// RMS distance between the posed model and the observed markers it shares names with.
    ///
    /// `None` without a valid pose or when no observed marker matches the model.
    pub fn residual(&self, observed: &WorldFeatures) -> Option<f64> {
        self.pose?;
        let (names, model, seen) = self.features_to_world().matched_with(observed);
        if names.is_empty() {
            return None;
        }
        // both sides come from the same join, lengths always agree
        metrics::rms(&model, &seen).ok()
    }
}

/// World features of every object that currently has a valid pose.
pub fn world_features_from_objects(objects: &[TrackedObject]) -> WorldFeatures {
    objects
        .iter()
        .filter(|o| o.pose.is_some())
        .fold(WorldFeatures::new(), |acc, o| acc.merge(o.features_to_world()))
}
