use super::*;

#[test]
fn empty_document_yields_defaults() {
    let cfg = PipelineConfig::from_reader("{}".as_bytes()).unwrap();
    assert_eq!(cfg, PipelineConfig::default());
}

#[test]
fn partial_sections_keep_other_defaults() {
    let json = r#"{ "identity": { "assign_threshold": 0.6 }, "mix": { "channels": 1 } }"#;
    let cfg = PipelineConfig::from_reader(json.as_bytes()).unwrap();
    assert_eq!(cfg.identity.assign_threshold, 0.6);
    assert_eq!(cfg.identity.merge_threshold, 0.9);
    assert_eq!(cfg.mix.channels, 1);
    assert_eq!(cfg.mix.sample_rate, 44_100);
}

#[test]
fn merge_threshold_below_assign_is_rejected() {
    let mut cfg = PipelineConfig::default();
    cfg.identity.merge_threshold = 0.5;
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("merge_threshold"));
}

#[test]
fn nest_overlap_outside_unit_interval_is_rejected() {
    let mut cfg = PipelineConfig::default();
    cfg.layout.nest_overlap = 1.5;
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("layout.nest_overlap"));
}

#[test]
fn more_than_one_retry_is_rejected() {
    let mut cfg = PipelineConfig::default();
    cfg.synthesis.retries = 2;
    assert!(cfg.validate().is_err());
}

#[test]
fn dwell_clamp_must_be_ordered() {
    let mut cfg = PipelineConfig::default();
    cfg.timeline.min_dwell_secs = 5.0;
    cfg.timeline.max_dwell_secs = 1.0;
    assert!(cfg.validate().is_err());
}

#[test]
fn clip_policy_uses_snake_case() {
    let json = r#"{ "mix": { "clip_policy": "clamp" }, "timeline": { "language_mode": "words" } }"#;
    let cfg = PipelineConfig::from_reader(json.as_bytes()).unwrap();
    assert_eq!(cfg.mix.clip_policy, ClipPolicy::Clamp);
    assert_eq!(cfg.timeline.language_mode, LanguageMode::Words);
}
