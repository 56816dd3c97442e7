use mocap_camera_geometry::config::{CalibrationConfig, CameraCalibration, Orientation};
use mocap_camera_geometry::io::{
    TriangulationStats, object_from_json, object_to_json, write_triangulation_report,
};
use mocap_camera_geometry::metrics::summarize;
use mocap_camera_geometry::synthetic::{SceneOptions, StereoScene};
use mocap_camera_geometry::triangulation::FramePair;
use mocap_camera_geometry::{CameraModel, GeometryError};
use nalgebra as na;
use tempfile::tempdir;

fn calibration(id: &str) -> CameraCalibration {
    CameraCalibration {
        id: id.to_string(),
        intrinsic: vec![
            vec![1000.0, 0.0, 640.0],
            vec![0.0, 1000.0, 512.0],
            vec![0.0, 0.0, 1.0],
        ],
        distortion: vec![-0.1, 0.02, 0.0, 0.0, 0.001],
        rotation: [0.0, 0.0, 0.0, 1.0],
        translation: [1.0, 2.0, 3.0],
        image_size: Some((1280, 1024)),
        orientation: Orientation::CameraToWorld,
    }
}

#[test]
fn test_parse_minimal_json() {
    let json = r#"{
        "cameras": [{
            "id": "2107343",
            "intrinsic": [[1000, 0, 640], [0, 1000, 512], [0, 0, 1]],
            "rotation": [0, 0, 0, 1],
            "translation": [100, 0, 0]
        }]
    }"#;
    let config: CalibrationConfig = serde_json::from_str(json).unwrap();
    let camera = &config.cameras[0];
    assert!(camera.distortion.is_empty());
    assert_eq!(camera.image_size, None);
    assert_eq!(camera.orientation, Orientation::CameraToWorld);

    let models = config.camera_models().unwrap();
    assert_eq!(models[0].id(), "2107343");
    assert!(config.camera("2107343").is_some());
    assert!(config.camera("missing").is_none());
}

#[test]
fn test_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let path = path.to_str().unwrap();

    let config = CalibrationConfig {
        cameras: vec![calibration("left"), calibration("right")],
    };
    config.save(path).unwrap();
    let loaded = CalibrationConfig::load(path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_model_round_trip() {
    let model = CameraModel::from_calibration(&calibration("cam")).unwrap();
    let back = CameraCalibration::from_camera_model(&model);
    assert_eq!(back.distortion, calibration("cam").distortion);
    assert_eq!(back.image_size, Some((1280, 1024)));
    assert_eq!(back.translation, [1.0, 2.0, 3.0]);
    assert!((back.rotation[3] - 1.0).abs() < 1e-12);
}

#[test]
fn test_malformed_intrinsic() {
    let mut c = calibration("bad");
    c.intrinsic.pop();
    let config = CalibrationConfig { cameras: vec![c] };
    assert!(matches!(
        config.camera_models(),
        Err(GeometryError::InvalidCameraParameters(_))
    ));

    let mut c = calibration("bad");
    c.distortion = vec![0.1, 0.2];
    assert!(CameraModel::from_calibration(&c).is_err());

    let mut c = calibration("bad");
    c.rotation = [0.0; 4];
    assert!(matches!(
        CameraModel::from_calibration(&c),
        Err(GeometryError::DegenerateRotation(_))
    ));
}

#[test]
fn test_world_to_camera_orientation() {
    let s = std::f64::consts::FRAC_1_SQRT_2;
    let mut c = calibration("vicon");
    c.distortion.clear();
    c.rotation = [0.0, 0.0, s, s];
    c.orientation = Orientation::WorldToCamera;
    let vicon = CameraModel::from_calibration(&c).unwrap();

    c.rotation = [0.0, 0.0, -s, s];
    c.orientation = Orientation::CameraToWorld;
    let plain = CameraModel::from_calibration(&c).unwrap();

    assert!(vicon.extrinsic().angular_distance(plain.extrinsic()) < 1e-12);
    assert!(vicon.extrinsic().translation_distance(plain.extrinsic()) < 1e-12);

    // the stored position is the camera center in both conventions
    let center = vicon.points_to_camera_space(&[na::Point3::new(1.0, 2.0, 3.0)]);
    assert!(center[0].coords.norm() < 1e-12);
}

#[test]
fn test_orientation_json_names() {
    let json = serde_json::to_string(&Orientation::WorldToCamera).unwrap();
    assert_eq!(json, "\"world_to_camera\"");
}

#[test]
fn test_missing_file() {
    let r = CalibrationConfig::load("/nonexistent/calibration.json");
    assert!(matches!(r, Err(GeometryError::Io(_))));
}

#[test]
fn test_frames_and_report_files() {
    let dir = tempdir().unwrap();
    let scene = StereoScene::generate(
        &SceneOptions {
            num_frames: 2,
            occlusion: 0.3,
            ..Default::default()
        },
        5,
    )
    .unwrap();

    let frames_path = dir.path().join("frames.json");
    let frames_path = frames_path.to_str().unwrap();
    object_to_json(frames_path, &scene.frames).unwrap();
    let frames: Vec<FramePair> = object_from_json(frames_path).unwrap();
    assert_eq!(frames, scene.frames);

    let report_path = dir.path().join("report.json");
    let report_path = report_path.to_str().unwrap();
    let stats = TriangulationStats {
        frames: 2,
        triangulated_points: 20,
        rejected_points: 1,
        cameras: vec![("cam_left".to_string(), summarize(&[0.1, 0.2]))],
        features: [("wand_m00".to_string(), [1.0, 2.0, 3.0])].into_iter().collect(),
    };
    write_triangulation_report(report_path, &stats).unwrap();
    let report: serde_json::Value = object_from_json(report_path).unwrap();
    assert_eq!(report["frames"], 2);
    assert_eq!(report["rejected_points"], 1);
    assert_eq!(report["cameras"][0]["id"], "cam_left");
    assert!(report["timestamp"].is_string());
    assert_eq!(report["features"]["wand_m00"][2], 3.0);
}
