//! Cross-module tests for lift3d_core.

use approx::assert_relative_eq;
use lift3d_core::prelude::*;

#[test]
fn test_dreamfusion_orient_schedule() {
    // The usual orientation weight: 10 → 1000 over the first 5000 steps.
    let weights: LossWeights = serde_json::from_str(
        r#"{
            "lambda_sds": 1.0,
            "lambda_orient": [0, 10.0, 1000.0, 5000],
            "lambda_sparsity": 1.0,
            "lambda_opaque": 0.0
        }"#,
    )
    .unwrap();

    assert!(weights.validate().is_ok());
    assert_relative_eq!(weights.resolve("lambda_orient", 0, 0).unwrap(), 10.0);
    assert_relative_eq!(weights.resolve("lambda_orient", 0, 1000).unwrap(), 208.0);
    assert_relative_eq!(weights.resolve("lambda_orient", 0, 10_000).unwrap(), 1000.0);

    let names: Vec<&str> = weights.iter().map(|(name, _)| name).collect();
    assert_eq!(
        names,
        vec!["lambda_opaque", "lambda_orient", "lambda_sds", "lambda_sparsity"]
    );
}

#[test]
fn test_weights_serialize_back() {
    let weights = LossWeights::new()
        .with("lambda_sds", 1.0)
        .with("lambda_orient", ScheduleSpec::linear_steps(0, 10.0, 1000.0, 5000));
    let json = serde_json::to_string(&weights).unwrap();
    let parsed: LossWeights = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, weights);
    assert_relative_eq!(parsed.resolve("lambda_orient", 0, 2500).unwrap(), 505.0);
}

#[test]
fn test_orbit_rays_converge_on_origin() {
    for view in orbit_views(8, 15.0, 1.5, 60.0) {
        let rays = view.ray_directions(5, 5);
        let center = rays[12];
        let origin = view.pose().position;
        // The central ray passes the origin at distance `distance`.
        let closest = origin + center * view.distance;
        assert!(closest.length() < 1e-4, "{:?}", closest);
    }
}

#[test]
fn test_noise_schedule_step_range_from_schedule() {
    let schedule = NoiseSchedule::stable_diffusion();
    let min_pct = ScheduleSpec::constant(0.02).resolve(0, 0).unwrap();
    let max_pct = ScheduleSpec::linear_steps(0, 0.98, 0.5, 1000)
        .resolve(0, 1000)
        .unwrap();
    assert_eq!(schedule.step_range(min_pct, max_pct), (20, 500));
}
