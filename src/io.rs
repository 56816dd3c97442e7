use std::collections::BTreeMap;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;
use crate::metrics::ErrorSummary;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &str, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    std::fs::write(output_path, j)?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[derive(Debug, Serialize)]
struct CameraReport<'a> {
    id: &'a str,
    reprojection_error: &'a ErrorSummary,
}

#[derive(Debug, Serialize)]
struct TriangulationReport<'a> {
    timestamp: String,
    frames: usize,
    triangulated_points: usize,
    rejected_points: usize,
    cameras: Vec<CameraReport<'a>>,
    /// Mean of each feature over all frames, in world coordinates.
    features: &'a BTreeMap<String, [f64; 3]>,
}

/// Summary numbers of a triangulation run, written by [`write_triangulation_report`].
#[derive(Debug, Clone, Default)]
pub struct TriangulationStats {
    pub frames: usize,
    pub triangulated_points: usize,
    pub rejected_points: usize,
    /// `(camera id, reprojection error summary)`
    pub cameras: Vec<(String, ErrorSummary)>,
    pub features: BTreeMap<String, [f64; 3]>,
}

fn local_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Writes a JSON report with per-camera reprojection statistics and the averaged features.
pub fn write_triangulation_report(output_path: &str, stats: &TriangulationStats) -> Result<()> {
    let report = TriangulationReport {
        timestamp: local_timestamp(),
        frames: stats.frames,
        triangulated_points: stats.triangulated_points,
        rejected_points: stats.rejected_points,
        cameras: stats
            .cameras
            .iter()
            .map(|(id, summary)| CameraReport {
                id,
                reprojection_error: summary,
            })
            .collect(),
        features: &stats.features,
    };
    object_to_json(output_path, &report)
}
