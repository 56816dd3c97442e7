use mocap_camera_geometry::synthetic::{OBJECT_NAME, SceneOptions, StereoScene};
use mocap_camera_geometry::tracking::{TrackedObject, world_features_from_objects};
use mocap_camera_geometry::{PoseEstimator, Triangulator};

fn main() {
    env_logger::init();
    let options = SceneOptions {
        num_frames: 10,
        pixel_noise: 0.2,
        ..Default::default()
    };
    let scene = StereoScene::generate(&options, 42).unwrap();
    let triangulator = Triangulator::new(scene.reference.clone(), scene.secondary.clone());
    let estimator = PoseEstimator::default();

    let mut object = TrackedObject::new(OBJECT_NAME, scene.model.clone());
    for (i, frame) in scene.frames.iter().enumerate() {
        let observed = triangulator.triangulate_world(&frame.reference, &frame.secondary);
        let pose = match object.estimate_pose(&observed, &estimator) {
            Ok(pose) => pose,
            Err(e) => {
                println!("frame {}: {}", frame.frame, e);
                object.set_pose(None);
                continue;
            }
        };
        let truth = &scene.poses[i];
        println!(
            "frame {}: rotation error {:.4} deg, translation error {:.5} m, residual {:.5} m",
            frame.frame,
            pose.angular_distance(truth).to_degrees(),
            pose.translation_distance(truth),
            object.residual(&observed).unwrap_or(f64::NAN)
        );
    }
    println!(
        "{} features in world space at the last frame",
        world_features_from_objects(std::slice::from_ref(&object)).len()
    );
}
