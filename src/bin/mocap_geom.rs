use std::path::Path;

use clap::{Parser, Subcommand};
use indicatif::ParallelProgressIterator;
use mocap_camera_geometry::config::CalibrationConfig;
use mocap_camera_geometry::features::{ObjectFeatures, WorldFeatures};
use mocap_camera_geometry::io::{
    TriangulationStats, object_from_json, object_to_json, write_triangulation_report,
};
use mocap_camera_geometry::metrics::{self, summarize};
use mocap_camera_geometry::synthetic::{SceneOptions, StereoScene};
use mocap_camera_geometry::triangulation::FramePair;
use mocap_camera_geometry::{PoseEstimator, Triangulator};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Parser)]
#[command(version, about, author)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triangulate named features observed by a calibrated camera pair
    Triangulate {
        /// Calibration JSON with exactly two cameras, the first one is the reference
        #[arg(short, long)]
        calibration: String,

        /// JSON list of frames with the observations of both cameras
        #[arg(short, long)]
        frames: String,

        /// Output JSON with the world-space features of every frame
        #[arg(short, long, default_value = "triangulated.json")]
        output: String,

        /// Optional JSON report with reprojection statistics
        #[arg(short, long)]
        report: Option<String>,

        /// Drop features whose reprojection error exceeds this many pixels in either camera
        #[arg(long)]
        max_error: Option<f64>,
    },
    /// Estimate the rigid transform mapping one named point set onto another
    Align {
        /// Object-space (model) points
        #[arg(short, long)]
        source: String,

        /// World-space (observed) points
        #[arg(short, long)]
        target: String,

        /// Output JSON for the estimated pose
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Generate a synthetic stereo dataset
    Generate {
        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Number of frames to generate
        #[arg(short = 'n', long, default_value = "20")]
        num_frames: usize,

        /// Number of markers on the synthetic object
        #[arg(short, long, default_value = "12")]
        points: usize,

        /// Uniform pixel noise amplitude
        #[arg(long, default_value = "0.0")]
        noise: f64,

        /// Probability of an observation being occluded
        #[arg(long, default_value = "0.0")]
        occlusion: f64,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

#[derive(Serialize)]
struct FrameOutput {
    frame: u64,
    points: WorldFeatures,
    rejected: Vec<String>,
}

#[derive(Serialize)]
struct PoseOutput {
    /// `[x, y, z, w]`
    rotation: [f64; 4],
    translation: [f64; 3],
    markers: usize,
    rms: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Triangulate {
            calibration,
            frames,
            output,
            report,
            max_error,
        } => triangulate(&calibration, &frames, &output, report.as_deref(), max_error)?,
        Commands::Align {
            source,
            target,
            output,
        } => align(&source, &target, output.as_deref())?,
        Commands::Generate {
            output,
            num_frames,
            points,
            noise,
            occlusion,
            seed,
        } => {
            let options = SceneOptions {
                num_points: points,
                num_frames,
                pixel_noise: noise,
                occlusion,
                ..Default::default()
            };
            generate(&output, &options, seed)?
        }
    }

    Ok(())
}

fn triangulate(
    calibration_path: &str,
    frames_path: &str,
    output_path: &str,
    report_path: Option<&str>,
    max_error: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let calibration = CalibrationConfig::load(calibration_path)?;
    let triangulator = Triangulator::from_cameras(calibration.camera_models()?)?;
    let frames: Vec<FramePair> = object_from_json(frames_path)?;
    log::info!(
        "triangulating {} frames with {} / {}",
        frames.len(),
        triangulator.reference().id(),
        triangulator.secondary().id()
    );

    let results: Vec<_> = frames
        .par_iter()
        .progress_count(frames.len() as u64)
        .map(|f| {
            let mut t = triangulator.triangulate(&f.reference, &f.secondary);
            let errors = triangulator.reprojection_errors(&t, &f.reference, &f.secondary);
            if let Some(limit) = max_error {
                let dropped = t.reject_above(&errors, limit);
                if dropped > 0 {
                    log::debug!("frame {}: {} features above {} px", f.frame, dropped, limit);
                }
            }
            (f.frame, t, errors)
        })
        .collect();

    let mut stats = TriangulationStats {
        frames: results.len(),
        ..Default::default()
    };
    let mut reference_errors = Vec::new();
    let mut secondary_errors = Vec::new();
    let mut outputs = Vec::with_capacity(results.len());
    for (frame, t, errors) in results {
        stats.triangulated_points += t.points.len();
        stats.rejected_points += t.rejected.len();
        reference_errors.extend(errors.reference.into_values());
        secondary_errors.extend(errors.secondary.into_values());
        outputs.push(FrameOutput {
            frame,
            points: triangulator.world_points(&t),
            rejected: t.rejected,
        });
    }

    let per_frame: Vec<WorldFeatures> = outputs.iter().map(|o| o.points.clone()).collect();
    stats.features = WorldFeatures::mean_of(&per_frame)
        .into_iter()
        .map(|(name, p)| (name, [p.x, p.y, p.z]))
        .collect();
    stats.cameras = vec![
        (
            triangulator.reference().id().to_string(),
            summarize(&reference_errors),
        ),
        (
            triangulator.secondary().id().to_string(),
            summarize(&secondary_errors),
        ),
    ];
    for (id, summary) in &stats.cameras {
        println!(
            "{}: reprojection error mean {:.4} px, median {:.4} px, max {:.4} px",
            id, summary.mean, summary.median, summary.max
        );
    }

    object_to_json(output_path, &outputs)?;
    if let Some(path) = report_path {
        write_triangulation_report(path, &stats)?;
    }
    println!(
        "{} points in {} frames written to {}",
        stats.triangulated_points, stats.frames, output_path
    );
    Ok(())
}

fn align(
    source_path: &str,
    target_path: &str,
    output_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source: ObjectFeatures = object_from_json(source_path)?;
    let target: WorldFeatures = object_from_json(target_path)?;
    let pose = PoseEstimator::default().estimate_features(&source, &target)?;

    let (names, model, observed) = source.matched_with(&target);
    let rms = metrics::rms(&pose.apply(&model, false), &observed)?;
    let q = pose.to_quaternion();
    let t = pose.translation();
    println!("markers: {}", names.len());
    println!(
        "rotation [x, y, z, w]: [{:.6}, {:.6}, {:.6}, {:.6}]",
        q[0], q[1], q[2], q[3]
    );
    println!("translation: [{:.6}, {:.6}, {:.6}]", t.x, t.y, t.z);
    println!("rms: {:.6}", rms);

    if let Some(path) = output_path {
        object_to_json(
            path,
            &PoseOutput {
                rotation: q,
                translation: [t.x, t.y, t.z],
                markers: names.len(),
                rms,
            },
        )?;
    }
    Ok(())
}

fn generate(
    output_dir: &str,
    options: &SceneOptions,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let scene = StereoScene::generate(options, seed)?;
    std::fs::create_dir_all(output_dir)?;
    let path = |name: &str| Path::new(output_dir).join(name).to_string_lossy().to_string();

    scene.calibration().save(&path("calibration.json"))?;
    object_to_json(&path("frames.json"), &scene.frames)?;
    object_to_json(&path("model.json"), &scene.model)?;
    let ground_truth: Vec<WorldFeatures> = (0..scene.poses.len())
        .filter_map(|i| scene.world_points(i))
        .collect();
    object_to_json(&path("ground_truth.json"), &ground_truth)?;

    println!(
        "Generated {} frames of {} markers in {}",
        scene.frames.len(),
        scene.model.len(),
        output_dir
    );
    Ok(())
}
