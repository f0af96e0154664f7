//! The adaptive model must not drift onto the background when the target
//! disappears for a while.

use crate::support::*;
use facetrack_condensation::{
    AdaptiveState, BlendPolicy, MeasurementModel, PartiallyAdaptiveCondensationTracker,
    PositionDependentConfig, PositionDependentMeasurementModel,
};

#[test]
fn test_occlusion_does_not_corrupt_adaptive_model() {
    let mut config = tracker_config(21);
    config.blend_policy = BlendPolicy::Multiply;
    let adaptive = PositionDependentMeasurementModel::new(
        Box::new(ContextExtractor::new()),
        trainable_classifier(),
        PositionDependentConfig::default(),
    )
    .unwrap();
    let mut tracker =
        PartiallyAdaptiveCondensationTracker::new(&config, static_model(), adaptive).unwrap();

    for _ in 0..30 {
        tracker.process(square_scene());
    }
    assert_eq!(tracker.adaptive_state(), AdaptiveState::Usable);

    for _ in 0..10 {
        assert!(tracker.process(empty_scene()).is_none());
    }
    assert_eq!(tracker.adaptive_state(), AdaptiveState::Usable);

    let mut estimate = None;
    for _ in 0..15 {
        estimate = tracker.process(square_scene());
    }
    let estimate = estimate.expect("square not reacquired");
    assert!(distance_to_square(estimate) < 3.0, "{estimate:?}");

    let ctx = tracker.context().clone();
    let model = tracker.adaptive_model_mut();
    model.update(square_scene());
    let mut samples = on_and_off_target();
    model.evaluate(&ctx, &mut samples);
    assert!(samples[0].target, "{:?}", samples[0]);
    assert!(!samples[1].target, "{:?}", samples[1]);
    assert!(samples[0].weight > samples[1].weight);
}
