use super::*;

#[test]
fn mono_is_duplicated_to_stereo() {
    let f = Fragment::new(100, 1, vec![0.25, -0.5]);
    assert_eq!(f.conform(100, 2), vec![0.25, 0.25, -0.5, -0.5]);
}

#[test]
fn stereo_folds_to_mono_by_averaging() {
    let f = Fragment::new(100, 2, vec![1.0, 0.0, -1.0, -0.5]);
    assert_eq!(f.conform(100, 1), vec![0.5, -0.75]);
}

#[test]
fn upsampling_interpolates_between_frames() {
    let f = Fragment::new(100, 1, vec![0.0, 1.0]);
    let out = f.conform(200, 1);
    assert_eq!(out.len(), 4);
    assert_eq!(out[0], 0.0);
    assert!((out[1] - 0.5).abs() < 1e-6);
    assert_eq!(out[2], 1.0);
    assert_eq!(out[3], 1.0);
}

#[test]
fn duration_follows_frames_and_rate() {
    let f = Fragment::new(4, 2, vec![0.0; 16]);
    assert_eq!(f.frames(), 8);
    assert!((f.duration_secs() - 2.0).abs() < 1e-12);
}

#[test]
fn check_rejects_unusable_fragments() {
    assert!(Fragment::new(0, 1, vec![0.0]).check().is_err());
    assert!(Fragment::new(100, 0, vec![0.0]).check().is_err());
    assert!(Fragment::new(100, 2, vec![0.0; 3]).check().is_err());
    assert!(Fragment::new(100, 1, vec![]).check().is_err());
    assert!(Fragment::new(100, 1, vec![0.0, f32::NAN]).check().is_err());
    assert!(Fragment::new(100, 1, vec![0.0, 0.1]).check().is_ok());
}
