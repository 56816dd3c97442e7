use mocap_camera_geometry::features::{ObjectFeatures, WorldFeatures};
use mocap_camera_geometry::synthetic::{OBJECT_NAME, SceneOptions, StereoScene};
use mocap_camera_geometry::tracking::{TrackedObject, world_features_from_objects};
use mocap_camera_geometry::{GeometryError, PoseEstimator, RigidTransform, Triangulator};
use nalgebra as na;

fn model(prefix: &str) -> ObjectFeatures {
    [
        (0.0, 0.0, 0.0),
        (0.1, 0.0, 0.0),
        (0.0, 0.2, 0.0),
        (0.0, 0.0, 0.3),
    ]
    .iter()
    .enumerate()
    .map(|(i, &(x, y, z))| (format!("{}_m{}", prefix, i), na::Point3::new(x, y, z)))
    .collect()
}

fn pose() -> RigidTransform {
    RigidTransform::from_quaternion([0.1, 0.2, -0.1, 0.95], [0.5, 1.0, 2.0]).unwrap()
}

#[test]
fn test_invalid_pose_gives_empty_sets() {
    let object = TrackedObject::new("wand", model("wand"));
    assert!(object.pose().is_none());
    assert!(object.features_to_world().is_empty());
    assert!(object.features_to_object(&WorldFeatures::new()).is_empty());
    assert!(object.residual(&WorldFeatures::new()).is_none());
}

#[test]
fn test_features_round_trip() {
    let mut object = TrackedObject::new("wand", model("wand"));
    object.set_pose(Some(pose()));
    let world = object.features_to_world();
    assert_eq!(world.len(), 4);
    let back = object.features_to_object(&world);
    for (name, p) in object.features().iter() {
        assert!((back.get(name).unwrap() - p).norm() < 1e-12);
    }
}

#[test]
fn test_load_features_keeps_own_markers() {
    let mut object = TrackedObject::new("wand", ObjectFeatures::new());
    let mixed = model("wand").merge(model("head"));
    object.load_features(&mixed);
    assert_eq!(object.features().len(), 4);
    assert!(object.features().names().all(|n| n.starts_with("wand")));

    object.remove_features(["wand_m0"]);
    assert_eq!(object.features().len(), 3);
}

#[test]
fn test_set_features_merges() {
    let mut object = TrackedObject::new("wand", model("wand"));
    let mut extra = ObjectFeatures::new();
    extra.insert("wand_m1", na::Point3::new(0.5, 0.5, 0.5));
    extra.insert("tip", na::Point3::new(0.0, 0.0, 1.0));
    object.set_features(&extra);

    assert_eq!(object.features().len(), 5);
    assert_eq!(object.features().get("wand_m1"), Some(&na::Point3::new(0.5, 0.5, 0.5)));
    assert!(object.features().contains("tip"));
    assert!(object.features().contains("wand_m0"));
}

#[test]
fn test_residual_without_matching_markers() {
    let mut object = TrackedObject::new("wand", model("wand"));
    object.set_pose(Some(RigidTransform::identity()));
    let mut observed = WorldFeatures::new();
    observed.insert("other_x", na::Point3::new(1.0, 2.0, 3.0));
    assert!(object.residual(&observed).is_none());

    observed.insert("wand_m1", na::Point3::new(0.1, 0.0, 0.0));
    assert!(object.residual(&observed).unwrap() < 1e-12);
}

#[test]
fn test_estimate_pose_from_markers() {
    let mut object = TrackedObject::new("wand", model("wand"));
    let truth = pose();
    let mut observed: WorldFeatures = truth.to_parent(&model("wand"));
    observed = observed.merge(truth.to_parent(&model("head")));
    observed.insert("wand_m9", na::Point3::new(9.0, 9.0, 9.0));

    let estimated = object
        .estimate_pose(&observed, &PoseEstimator::default())
        .unwrap();
    assert!(estimated.angular_distance(&truth) < 1e-9);
    assert!(estimated.translation_distance(&truth) < 1e-9);
    assert_eq!(object.pose(), Some(&estimated));
    assert!(object.residual(&observed).unwrap() < 1e-9);
}

#[test]
fn test_estimate_pose_needs_three_markers() {
    let mut object = TrackedObject::new("wand", model("wand"));
    let observed: WorldFeatures = pose().to_parent(&model("wand"));
    let observed = observed.without(["wand_m0", "wand_m1"]);
    let r = object.estimate_pose(&observed, &PoseEstimator::default());
    assert!(matches!(
        r,
        Err(GeometryError::InsufficientCorrespondences { got: 2, .. })
    ));
    assert!(object.pose().is_none());
}

#[test]
fn test_world_features_from_objects() {
    let mut wand = TrackedObject::new("wand", model("wand"));
    wand.set_pose(Some(pose()));
    let head = TrackedObject::new("head", model("head"));
    let world = world_features_from_objects(&[wand, head]);
    assert_eq!(world.len(), 4);
    assert!(world.names().all(|n| n.starts_with("wand")));
}

#[test]
fn test_pose_from_triangulated_markers() {
    let scene = StereoScene::generate(
        &SceneOptions {
            num_frames: 4,
            ..Default::default()
        },
        9,
    )
    .unwrap();
    let triangulator = Triangulator::new(scene.reference.clone(), scene.secondary.clone());
    let mut object = TrackedObject::new(OBJECT_NAME, scene.model.clone());
    for (frame, truth) in scene.frames.iter().zip(&scene.poses) {
        let observed = triangulator.triangulate_world(&frame.reference, &frame.secondary);
        let estimated = object
            .estimate_pose(&observed, &PoseEstimator::default())
            .unwrap();
        assert!(estimated.angular_distance(truth) < 1e-6);
        assert!(estimated.translation_distance(truth) < 1e-5);
    }
}

#[test]
fn test_scene_is_deterministic() {
    let options = SceneOptions {
        num_frames: 2,
        pixel_noise: 0.5,
        occlusion: 0.2,
        ..Default::default()
    };
    let a = StereoScene::generate(&options, 1234).unwrap();
    let b = StereoScene::generate(&options, 1234).unwrap();
    let c = StereoScene::generate(&options, 4321).unwrap();
    assert_eq!(a.frames, b.frames);
    assert_eq!(a.model, b.model);
    assert_ne!(a.model, c.model);

    let calibration = a.calibration();
    assert_eq!(calibration.cameras.len(), 2);
    let models = calibration.camera_models().unwrap();
    assert!(models[0].extrinsic().angular_distance(a.reference.extrinsic()) < 1e-9);
}
