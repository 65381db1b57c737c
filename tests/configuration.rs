//! DetectionConfig builder and validation tests.

use std::path::Path;

use scenecut::{
    DEFAULT_CHANGE_THRESHOLD, DecodeErrorPolicy, DetectionConfig, KeyframeFormat,
    MIN_BOUNDARY_SPACING, PIXEL_DELTA_THRESHOLD, ScenecutError, VIDEO_EXTENSIONS,
    configuration::is_video_path,
};

// ── Defaults ──────────────────────────────────────────────────────

#[test]
fn config_defaults() {
    let config = DetectionConfig::new("movie.mp4", "shots");
    assert_eq!(config.input_path(), Path::new("movie.mp4"));
    assert_eq!(config.output_root(), Path::new("shots"));
    assert_eq!(config.change_threshold(), DEFAULT_CHANGE_THRESHOLD);
    assert_eq!(config.pixel_delta(), PIXEL_DELTA_THRESHOLD);
    assert_eq!(config.min_spacing(), MIN_BOUNDARY_SPACING);
    assert_eq!(config.keyframe_format(), KeyframeFormat::Jpeg);
    assert_eq!(config.decode_error_policy(), DecodeErrorPolicy::Truncate);
    assert!(config.validate().is_ok());
}

#[test]
fn tuning_constants() {
    assert_eq!(PIXEL_DELTA_THRESHOLD, 30);
    assert_eq!(MIN_BOUNDARY_SPACING, 10);
    assert_eq!(DEFAULT_CHANGE_THRESHOLD, 50.0);
}

#[test]
fn config_builders() {
    let config = DetectionConfig::new("movie.mp4", "shots")
        .with_change_threshold(12.5)
        .with_pixel_delta(40)
        .with_min_spacing(3)
        .with_keyframe_format(KeyframeFormat::WebP)
        .with_decode_error_policy(DecodeErrorPolicy::Fail);

    assert_eq!(config.change_threshold(), 12.5);
    assert_eq!(config.pixel_delta(), 40);
    assert_eq!(config.min_spacing(), 3);
    assert_eq!(config.keyframe_format(), KeyframeFormat::WebP);
    assert_eq!(config.decode_error_policy(), DecodeErrorPolicy::Fail);
}

// ── Validation ────────────────────────────────────────────────────

#[test]
fn empty_paths_are_rejected() {
    for config in [
        DetectionConfig::new("", "shots"),
        DetectionConfig::new("movie.mp4", ""),
    ] {
        match config.validate() {
            Err(ScenecutError::InvalidConfiguration(message)) => {
                assert!(message.contains("must not be empty"), "{message}");
            }
            other => panic!("Expected InvalidConfiguration, got: {other:?}"),
        }
    }
}

#[test]
fn threshold_bounds_are_inclusive() {
    for threshold in [0.0, 30.0, 100.0] {
        let config = DetectionConfig::new("movie.mp4", "shots").with_change_threshold(threshold);
        assert!(config.validate().is_ok(), "{threshold} should be accepted");
    }
}

#[test]
fn out_of_range_thresholds_are_rejected() {
    for threshold in [-0.1, 100.5, f64::NAN, f64::INFINITY] {
        let config = DetectionConfig::new("movie.mp4", "shots").with_change_threshold(threshold);
        assert!(
            matches!(config.validate(), Err(ScenecutError::InvalidConfiguration(_))),
            "{threshold} should be rejected"
        );
    }
}

// ── Video extensions ──────────────────────────────────────────────

#[test]
fn video_extensions_match_case_insensitively() {
    for extension in VIDEO_EXTENSIONS {
        assert!(is_video_path(Path::new(&format!("clip.{extension}"))));
        assert!(is_video_path(Path::new(&format!(
            "clip.{}",
            extension.to_ascii_uppercase()
        ))));
    }
    assert!(is_video_path(Path::new("dir/Holiday.Mp4")));
    assert!(!is_video_path(Path::new("notes.txt")));
    assert!(!is_video_path(Path::new("mp4")));
}
