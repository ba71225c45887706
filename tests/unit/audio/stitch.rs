use super::*;

#[test]
fn short_fragment_fills_region_with_two_joins() {
    // A 10-frame fragment stretched over 25 frames with a 2-frame crossfade.
    let src: Vec<f32> = (0..10).map(|i| i as f32).collect();
    let out = loop_stitch(&src, 1, 25, 2);
    assert_eq!(out.samples.len(), 25);
    assert_eq!(out.joins, 2);
    // Untouched head, then the second repetition's body.
    assert_eq!(&out.samples[..8], &src[..8]);
    assert_eq!(out.samples[10], 2.0);
    // Inside the first join the old tail blends into the new head.
    let t = 1.0 / 3.0;
    assert!((out.samples[8] - (8.0 * (1.0 - t) + 0.0 * t)).abs() < 1e-5);
}

#[test]
fn seconds_scale_scenario() {
    let sr = 100;
    let src = vec![0.5f32; 10 * sr];
    let out = loop_stitch(&src, 1, 25 * sr, sr);
    assert_eq!(out.samples.len(), 25 * sr);
    assert_eq!(out.joins, 2);
    // Constant material stays constant through linear crossfades.
    assert!(out.samples.iter().all(|s| (s - 0.5).abs() < 1e-5));
}

#[test]
fn long_fragment_is_truncated_without_joins() {
    let src = vec![1.0f32, -1.0, 0.5, -0.5, 0.25, -0.25];
    let out = loop_stitch(&src, 2, 2, 4);
    assert_eq!(out.samples, vec![1.0, -1.0, 0.5, -0.5]);
    assert_eq!(out.joins, 0);
}

#[test]
fn crossfade_is_clamped_to_half_the_fragment() {
    let src = vec![1.0f32; 4];
    let out = loop_stitch(&src, 1, 10, 100);
    // Stride of two frames after clamping the crossfade to two.
    assert_eq!(out.joins, 3);
    assert!(out.samples.iter().all(|s| (s - 1.0).abs() < 1e-6));
}

#[test]
fn edge_fades_ramp_both_ends() {
    let mut s = vec![1.0f32; 8];
    apply_edge_fades(&mut s, 2, 2, 1);
    assert_eq!(s[0], 0.25);
    assert_eq!(s[1], 0.25);
    assert_eq!(s[2], 0.75);
    assert_eq!(s[6], 0.5);
    assert_eq!(s[4], 1.0);
}
