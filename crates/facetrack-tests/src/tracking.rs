//! End-to-end runs of the tracker over the synthetic square scene.

use crate::support::*;
use facetrack_condensation::{
    AdaptiveState, BlendPolicy, PartiallyAdaptiveCondensationTracker, PositionDependentConfig,
    PositionDependentMeasurementModel, SelfLearningConfig, SelfLearningMeasurementModel,
};

fn self_learning() -> SelfLearningMeasurementModel {
    SelfLearningMeasurementModel::new(
        Box::new(ContextExtractor::new()),
        trainable_classifier(),
        SelfLearningConfig::default(),
    )
    .unwrap()
}

fn position_dependent() -> PositionDependentMeasurementModel {
    PositionDependentMeasurementModel::new(
        Box::new(ContextExtractor::new()),
        trainable_classifier(),
        PositionDependentConfig::default(),
    )
    .unwrap()
}

#[test]
fn test_self_learning_model_learns_from_static_estimates() {
    let mut config = tracker_config(11);
    config.adaptive_evaluation = false;
    let mut tracker =
        PartiallyAdaptiveCondensationTracker::new(&config, static_model(), self_learning())
            .unwrap();

    let mut estimate = None;
    for _ in 0..30 {
        estimate = tracker.process(square_scene());
    }
    let estimate = estimate.expect("square not found");
    assert!(distance_to_square(estimate) < 2.0, "{estimate:?}");
    assert_eq!(tracker.adaptive_state(), AdaptiveState::Usable);
    assert!(!tracker.report().adaptive_evaluation_used);
}

#[test]
fn test_position_dependent_model_becomes_usable() {
    let mut tracker = PartiallyAdaptiveCondensationTracker::new(
        &tracker_config(12),
        static_model(),
        position_dependent(),
    )
    .unwrap();

    let mut states = Vec::new();
    for _ in 0..25 {
        tracker.process(square_scene());
        states.push(tracker.adaptive_state());
    }
    assert_eq!(tracker.adaptive_state(), AdaptiveState::Usable);
    assert!(tracker.adaptive_model().frame_count() >= 3);
    // Learning precedes usability.
    let first_usable = states
        .iter()
        .position(|&s| s == AdaptiveState::Usable)
        .unwrap();
    assert!(states[..first_usable].contains(&AdaptiveState::Learning));
}

#[test]
fn test_multiply_policy_keeps_tracking() {
    let mut config = tracker_config(13);
    config.blend_policy = BlendPolicy::Multiply;
    let mut tracker =
        PartiallyAdaptiveCondensationTracker::new(&config, static_model(), position_dependent())
            .unwrap();

    let mut estimate = None;
    for _ in 0..30 {
        estimate = tracker.process(square_scene());
    }
    assert!(tracker.report().adaptive_evaluation_used);
    let estimate = estimate.expect("square lost under the blended models");
    assert!(distance_to_square(estimate) < 3.0, "{estimate:?}");
}

#[test]
fn test_no_estimate_without_evidence() {
    let mut tracker = PartiallyAdaptiveCondensationTracker::new(
        &tracker_config(14),
        static_model(),
        self_learning(),
    )
    .unwrap();

    for _ in 0..5 {
        assert!(tracker.process(empty_scene()).is_none());
    }
    assert_eq!(tracker.report().targets, 0);
    assert_eq!(tracker.report().samples, 400);
}
