use mocap_camera_geometry::Triangulator;
use mocap_camera_geometry::metrics;
use mocap_camera_geometry::synthetic::{SceneOptions, StereoScene};

fn main() {
    env_logger::init();
    let options = SceneOptions {
        num_frames: 5,
        pixel_noise: 0.3,
        occlusion: 0.1,
        distortion: vec![-0.12, 0.03, 0.0005, -0.0003, 0.0],
        ..Default::default()
    };
    let scene = StereoScene::generate(&options, 7).unwrap();
    let triangulator = Triangulator::new(scene.reference.clone(), scene.secondary.clone());
    println!(
        "baseline {:.3} m",
        triangulator.relative_pose().translation().norm()
    );

    for (i, frame) in scene.frames.iter().enumerate() {
        let t = triangulator.triangulate(&frame.reference, &frame.secondary);
        let world = triangulator.world_points(&t);
        let truth = scene.world_points(i).unwrap();
        let (_, estimated, expected) = world.matched_with(&truth);
        let errors = triangulator.reprojection_errors(&t, &frame.reference, &frame.secondary);
        let left = metrics::summarize(&errors.reference.values().copied().collect::<Vec<_>>());
        let right = metrics::summarize(&errors.secondary.values().copied().collect::<Vec<_>>());
        println!(
            "frame {}: {}/{} markers, 3d rms {:.5} m, reprojection mean {:.3} / {:.3} px",
            frame.frame,
            world.len(),
            truth.len(),
            metrics::rms(&estimated, &expected).unwrap(),
            left.mean,
            right.mean
        );
    }
}
