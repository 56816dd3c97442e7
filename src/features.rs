use std::collections::BTreeMap;
use std::marker::PhantomData;

use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Marker for the coordinate frame a [`FeatureSet`] is expressed in.
pub trait CoordinateFrame: Clone + std::fmt::Debug + PartialEq + Send + Sync + 'static {
    const NAME: &'static str;
}

/// Local frame of a tracked rigid body (subject/segment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Object;

/// Global frame of the motion-capture system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct World;

/// Local frame of a camera, z pointing along the optical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Camera;

/// Pixel coordinates of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Image;

impl CoordinateFrame for Object {
    const NAME: &'static str = "object";
}
impl CoordinateFrame for World {
    const NAME: &'static str = "world";
}
impl CoordinateFrame for Camera {
    const NAME: &'static str = "camera";
}
impl CoordinateFrame for Image {
    const NAME: &'static str = "image";
}

/// Named points expressed in one coordinate frame `F`.
///
/// Feature names are the join key between sets. Iteration is ordered by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    transparent,
    bound(serialize = "P: Serialize", deserialize = "P: Deserialize<'de>")
)]
pub struct FeatureSet<F, P> {
    points: BTreeMap<String, P>,
    #[serde(skip)]
    frame: PhantomData<F>,
}

pub type ObjectFeatures = FeatureSet<Object, na::Point3<f64>>;
pub type WorldFeatures = FeatureSet<World, na::Point3<f64>>;
pub type CameraFeatures = FeatureSet<Camera, na::Point3<f64>>;
pub type ImageFeatures = FeatureSet<Image, na::Point2<f64>>;
/// Per-frame image observations; `None` marks a feature that was not observed.
pub type ImageObservations = FeatureSet<Image, Option<na::Point2<f64>>>;

impl<F, P> Default for FeatureSet<F, P> {
    fn default() -> Self {
        Self {
            points: BTreeMap::new(),
            frame: PhantomData,
        }
    }
}

impl<F: CoordinateFrame, P> FeatureSet<F, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_name(&self) -> &'static str {
        F::NAME
    }

    pub fn insert(&mut self, name: impl Into<String>, point: P) -> Option<P> {
        self.points.insert(name.into(), point)
    }

    pub fn get(&self, name: &str) -> Option<&P> {
        self.points.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<P> {
        self.points.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.points.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.points.keys().map(String::as_str)
    }

    pub fn points(&self) -> impl Iterator<Item = &P> {
        self.points.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &P)> {
        self.points.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Union of both sets; on a name clash the entry of `other` wins.
    pub fn merge(mut self, other: Self) -> Self {
        self.points.extend(other.points);
        self
    }

    /// Pairs the points of both sets sharing a name, ordered by name.
    pub fn matched_with<G, Q>(&self, other: &FeatureSet<G, Q>) -> (Vec<String>, Vec<P>, Vec<Q>)
    where
        P: Clone,
        Q: Clone,
    {
        let mut names = Vec::new();
        let mut left = Vec::new();
        let mut right = Vec::new();
        for (name, p) in &self.points {
            if let Some(q) = other.points.get(name) {
                names.push(name.clone());
                left.push(p.clone());
                right.push(q.clone());
            }
        }
        (names, left, right)
    }

    /// Re-tags the set into another frame while converting each point.
    pub(crate) fn map_points<G, Q>(&self, mut f: impl FnMut(&P) -> Q) -> FeatureSet<G, Q> {
        FeatureSet {
            points: self
                .points
                .iter()
                .map(|(name, p)| (name.clone(), f(p)))
                .collect(),
            frame: PhantomData,
        }
    }
}

impl<F: CoordinateFrame, P: Clone> FeatureSet<F, P> {
    /// Features whose name contains `object_name`, following the marker naming
    /// convention where each marker label embeds its subject name.
    pub fn belonging_to(&self, object_name: &str) -> Self {
        self.points
            .iter()
            .filter(|(name, _)| name.contains(object_name))
            .map(|(name, p)| (name.clone(), p.clone()))
            .collect()
    }

    /// Copy of the set without the given names.
    pub fn without<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = self.clone();
        for name in names {
            out.points.remove(name);
        }
        out
    }
}

impl<F: CoordinateFrame> FeatureSet<F, na::Point3<f64>> {
    pub fn centroid(&self) -> Option<na::Point3<f64>> {
        if self.is_empty() {
            return None;
        }
        let sum = self
            .points
            .values()
            .fold(na::Vector3::zeros(), |acc, p| acc + p.coords);
        Some(na::Point3::from(sum / self.len() as f64))
    }

    /// Per-feature average over several frames.
    ///
    /// A feature missing from a frame does not contribute to that feature's mean.
    pub fn mean_of(sets: &[Self]) -> Self {
        let mut sums: BTreeMap<&str, (na::Vector3<f64>, usize)> = BTreeMap::new();
        for set in sets {
            for (name, p) in set.iter() {
                let entry = sums.entry(name).or_insert((na::Vector3::zeros(), 0));
                entry.0 += p.coords;
                entry.1 += 1;
            }
        }
        sums.into_iter()
            .map(|(name, (sum, n))| (name.to_string(), na::Point3::from(sum / n as f64)))
            .collect()
    }
}

impl FeatureSet<Image, Option<na::Point2<f64>>> {
    /// Converts observations that use the `[0, 0]` "not observed" convention.
    pub fn from_legacy<S: Into<String>>(entries: impl IntoIterator<Item = (S, [f64; 2])>) -> Self {
        entries
            .into_iter()
            .map(|(name, [x, y])| {
                let point = if x == 0.0 && y == 0.0 {
                    None
                } else {
                    Some(na::Point2::new(x, y))
                };
                (name.into(), point)
            })
            .collect()
    }

    pub fn is_observed(&self, name: &str) -> bool {
        matches!(self.points.get(name), Some(Some(_)))
    }

    /// Only the features that were actually observed.
    pub fn observed(&self) -> ImageFeatures {
        self.points
            .iter()
            .filter_map(|(name, p)| p.map(|p| (name.clone(), p)))
            .collect()
    }

    pub fn occluded_names(&self) -> impl Iterator<Item = &str> {
        self.points
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(name, _)| name.as_str())
    }
}

impl From<ImageFeatures> for ImageObservations {
    fn from(features: ImageFeatures) -> Self {
        features.map_points(|p| Some(*p))
    }
}

impl<F, P> FromIterator<(String, P)> for FeatureSet<F, P> {
    fn from_iter<I: IntoIterator<Item = (String, P)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
            frame: PhantomData,
        }
    }
}

impl<F, P> Extend<(String, P)> for FeatureSet<F, P> {
    fn extend<I: IntoIterator<Item = (String, P)>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}

impl<F, P> IntoIterator for FeatureSet<F, P> {
    type Item = (String, P);
    type IntoIter = std::collections::btree_map::IntoIter<String, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}
