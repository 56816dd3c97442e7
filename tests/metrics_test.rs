use mocap_camera_geometry::GeometryError;
use mocap_camera_geometry::features::ImageFeatures;
use mocap_camera_geometry::metrics::{per_point, reprojection_error_2d, rms, summarize};
use nalgebra as na;

#[test]
fn test_rms() {
    let a = vec![na::Point3::new(0.0, 0.0, 0.0), na::Point3::new(1.0, 1.0, 1.0)];
    let b = vec![na::Point3::new(3.0, 4.0, 0.0), na::Point3::new(1.0, 1.0, 1.0)];
    // sqrt((25 + 0) / 2)
    assert!((rms(&a, &b).unwrap() - 12.5f64.sqrt()).abs() < 1e-12);
    assert_eq!(rms(&[], &[]).unwrap(), 0.0);
}

#[test]
fn test_per_point() {
    let a = vec![na::Point3::new(0.0, 0.0, 0.0), na::Point3::new(1.0, 2.0, 3.0)];
    let b = vec![na::Point3::new(0.0, 3.0, 4.0), na::Point3::new(1.0, 2.0, 3.0)];
    let d = per_point(&a, &b).unwrap();
    assert_eq!(d.len(), 2);
    assert!((d[0] - 5.0).abs() < 1e-12);
    assert!(d[1].abs() < 1e-12);
}

#[test]
fn test_size_mismatch() {
    let a = vec![na::Point3::origin(); 3];
    let b = vec![na::Point3::origin(); 2];
    assert!(matches!(
        rms(&a, &b),
        Err(GeometryError::SizeMismatch { left: 3, right: 2 })
    ));
    assert!(matches!(
        per_point(&b, &a),
        Err(GeometryError::SizeMismatch { left: 2, right: 3 })
    ));
}

#[test]
fn test_reprojection_error_2d() {
    let mut observed = ImageFeatures::new();
    observed.insert("a", na::Point2::new(10.0, 10.0));
    observed.insert("b", na::Point2::new(0.0, 0.0));
    observed.insert("only_observed", na::Point2::new(1.0, 1.0));
    let mut projected = ImageFeatures::new();
    projected.insert("a", na::Point2::new(13.0, 14.0));
    projected.insert("b", na::Point2::new(0.0, 0.0));
    projected.insert("only_projected", na::Point2::new(2.0, 2.0));

    let errors = reprojection_error_2d(&observed, &projected);
    assert_eq!(errors.len(), 2);
    assert!((errors["a"] - 5.0).abs() < 1e-12);
    assert!(errors["b"].abs() < 1e-12);
}

#[test]
fn test_summarize() {
    let s = summarize(&[3.0, 1.0, 4.0, 2.0]);
    assert_eq!(s.count, 4);
    assert!((s.mean - 2.5).abs() < 1e-12);
    assert!((s.median - 2.5).abs() < 1e-12);
    assert!((s.max - 4.0).abs() < 1e-12);
    assert!((s.rms - 7.5f64.sqrt()).abs() < 1e-12);

    let s = summarize(&[5.0, 1.0, 3.0]);
    assert!((s.median - 3.0).abs() < 1e-12);

    let s = summarize(&[]);
    assert_eq!(s.count, 0);
    assert_eq!(s.mean, 0.0);
}
