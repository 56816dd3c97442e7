use std::collections::BTreeMap;

use nalgebra as na;
use serde::Serialize;

use crate::error::{GeometryError, Result};
use crate::features::ImageFeatures;

fn check_sizes(a: usize, b: usize) -> Result<()> {
    if a != b {
        return Err(GeometryError::SizeMismatch { left: a, right: b });
    }
    Ok(())
}

/// Root mean squared distance between paired points. Zero for empty input.
pub fn rms(points_a: &[na::Point3<f64>], points_b: &[na::Point3<f64>]) -> Result<f64> {
    check_sizes(points_a.len(), points_b.len())?;
    if points_a.is_empty() {
        return Ok(0.0);
    }
    let sum_sq: f64 = points_a
        .iter()
        .zip(points_b)
        .map(|(a, b)| (*a - *b).norm_squared())
        .sum();
    Ok((sum_sq / points_a.len() as f64).sqrt())
}

/// Euclidean distance of each pair, in input order.
pub fn per_point(points_a: &[na::Point3<f64>], points_b: &[na::Point3<f64>]) -> Result<Vec<f64>> {
    check_sizes(points_a.len(), points_b.len())?;
    Ok(points_a
        .iter()
        .zip(points_b)
        .map(|(a, b)| (*a - *b).norm())
        .collect())
}

/// Pixel distance between observed and projected features sharing a name.
///
/// Features present on only one side are skipped.
pub fn reprojection_error_2d(
    observed: &ImageFeatures,
    projected: &ImageFeatures,
) -> BTreeMap<String, f64> {
    observed
        .iter()
        .filter_map(|(name, p)| projected.get(name).map(|q| (name.to_string(), (*p - *q).norm())))
        .collect()
}

/// Aggregate statistics over a list of error values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub rms: f64,
}

pub fn summarize(errors: &[f64]) -> ErrorSummary {
    if errors.is_empty() {
        return ErrorSummary::default();
    }
    let n = errors.len() as f64;
    let mut sorted = errors.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    ErrorSummary {
        count: errors.len(),
        mean: errors.iter().sum::<f64>() / n,
        median,
        max: sorted[sorted.len() - 1],
        rms: (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt(),
    }
}
