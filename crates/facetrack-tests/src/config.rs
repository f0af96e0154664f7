//! Building trackers from configuration files.

use facetrack_condensation::TrackerConfig;
use facetrack_core::{GrayImage, TrackError};
use std::path::Path;
use std::sync::Arc;

const DEMO_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/config.json");

fn frame(x: i32, y: i32) -> Arc<GrayImage> {
    let mut image = GrayImage::new(160, 120);
    image.fill_rect(x, y, 32, 32, 1.0);
    Arc::new(image)
}

#[test]
fn test_demo_config_tracks() {
    let mut tracker = TrackerConfig::load_tracker(DEMO_CONFIG).unwrap();
    let mut found = 0;
    for i in 0..10 {
        if tracker.process(frame(60 + i, 40)).is_some() {
            found += 1;
        }
    }
    assert_eq!(tracker.report().frame, 10);
    assert_eq!(tracker.report().samples, 400);
    assert!(found > 0);
}

#[test]
fn test_demo_config_round_trips() {
    let config = TrackerConfig::load(DEMO_CONFIG).unwrap();
    let again = TrackerConfig::from_json(&config.to_json().unwrap()).unwrap();
    assert_eq!(again, config);
}

#[test]
fn test_unknown_sampler_is_rejected() {
    let err = TrackerConfig::from_json(r#"{ "sampler": { "mode": "spiral" } }"#).unwrap_err();
    assert!(
        matches!(err, TrackError::UnknownKind { kind: "sampler", ref name } if name == "spiral"),
        "{err}"
    );
}

#[test]
fn test_unknown_kernel_is_rejected() {
    let json = r#"{ "adaptive_model": { "classifier": { "kernel": { "type": "sigmoid" } } } }"#;
    let err = TrackerConfig::from_json(json).unwrap_err();
    assert!(
        matches!(err, TrackError::UnknownKind { kind: "kernel", .. }),
        "{err}"
    );
}

#[test]
fn test_patch_size_must_match_demo_models() {
    let mut config = TrackerConfig::load(DEMO_CONFIG).unwrap();
    config.static_model.patch_width = 20;
    config.static_model.patch_height = 20;
    let demos = Path::new(DEMO_CONFIG).parent().unwrap();
    let err = config.build(demos).err().expect("64-dim models with 400-dim patches");
    assert!(matches!(err, TrackError::ModelFormat(_)), "{err}");
}

#[test]
fn test_missing_model_file_fails_to_build() {
    let config = TrackerConfig::default();
    let err = config
        .build(Path::new("/nonexistent"))
        .err()
        .expect("models do not exist");
    assert!(matches!(err, TrackError::Io(_)), "{err}");
}
