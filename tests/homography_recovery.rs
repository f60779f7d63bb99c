use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use warpalign::lowlevel::{estimate_homography_points, fit_homography_dlt};
use warpalign::{
    estimate_homography, estimate_homography_with_cancel, AlignError, CancelToken,
    Correspondence, Homography, Keypoint, RansacConfig,
};

fn ground_truth() -> Homography {
    Homography::from_rows([
        [1.08, 0.06, 12.0],
        [-0.04, 0.95, 7.5],
        [1.5e-4, -1.0e-4, 1.0],
    ])
}

fn scattered_points(n: usize, seed: u64) -> Vec<[f64; 2]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| [rng.random_range(0.0..200.0), rng.random_range(0.0..200.0)])
        .collect()
}

fn project_all(h: &Homography, pts: &[[f64; 2]]) -> Vec<[f64; 2]> {
    pts.iter().map(|p| h.project(p[0], p[1]).unwrap()).collect()
}

fn to_keypoints(pts: &[[f64; 2]]) -> Vec<Keypoint> {
    pts.iter()
        .map(|p| Keypoint::new(p[0] as f32, p[1] as f32))
        .collect()
}

fn identity_matches(n: usize) -> Vec<Correspondence> {
    (0..n)
        .map(|i| Correspondence {
            query_idx: i,
            train_idx: i,
            distance: 0.0,
        })
        .collect()
}

#[test]
fn dlt_recovers_exact_homography_from_four_points() {
    let h = ground_truth();
    let src = [[0.0, 0.0], [100.0, 0.0], [100.0, 80.0], [0.0, 80.0]];
    let dst = project_all(&h, &src);
    let fitted = fit_homography_dlt(&src, &dst).unwrap();
    assert!(fitted.max_abs_diff(&h) < 1e-8);
}

#[test]
fn all_inliers_recover_the_homography() {
    let h = ground_truth();
    let src = scattered_points(40, 1);
    let dst = project_all(&h, &src);

    let est = estimate_homography_points(&src, &dst, &RansacConfig::default(), None).unwrap();
    assert_eq!(est.num_inliers, 40);
    assert!(est.mean_error < 1e-6);
    assert!(est.homography.max_abs_diff(&h) < 1e-6);
    for (s, d) in src.iter().zip(&dst) {
        assert!(est.homography.reprojection_error(*s, *d) < 1e-6);
    }
}

#[test]
fn forty_percent_outliers_are_rejected_across_seeds() {
    let h = ground_truth();
    let inliers = 60;
    let outliers = 40;
    for data_seed in 0..5u64 {
        let src = scattered_points(inliers + outliers, 100 + data_seed);
        let mut dst = project_all(&h, &src[..inliers]);
        let mut rng = StdRng::seed_from_u64(200 + data_seed);
        for _ in 0..outliers {
            dst.push([rng.random_range(0.0..220.0), rng.random_range(0.0..220.0)]);
        }

        for seed in 0..4u64 {
            let cfg = RansacConfig {
                seed,
                ..RansacConfig::default()
            };
            let est = estimate_homography_points(&src, &dst, &cfg, None).unwrap();
            assert!(est.num_inliers >= inliers, "seed {seed}: {}", est.num_inliers);
            assert!(est.inlier_mask[..inliers].iter().all(|&m| m));
            for i in 0..inliers {
                assert!(est.homography.reprojection_error(src[i], dst[i]) < 1.0);
            }
        }
    }
}

#[test]
fn keypoint_interface_uses_match_indices() {
    let h = ground_truth();
    let src = scattered_points(30, 7);
    let dst = project_all(&h, &src);
    let kps_a = to_keypoints(&src);
    // Store B's keypoints in reverse order so the indices must be followed.
    let kps_b: Vec<Keypoint> = to_keypoints(&dst).into_iter().rev().collect();
    let matches: Vec<Correspondence> = (0..30)
        .map(|i| Correspondence {
            query_idx: i,
            train_idx: 29 - i,
            distance: 0.0,
        })
        .collect();

    let est = estimate_homography(&kps_a, &kps_b, &matches, &RansacConfig::default()).unwrap();
    assert_eq!(est.num_inliers, 30);
    assert!(est.homography.max_abs_diff(&h) < 1e-3);
}

#[test]
fn fixed_seed_is_deterministic() {
    let h = ground_truth();
    let mut src = scattered_points(50, 3);
    let mut dst = project_all(&h, &src);
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..25 {
        src.push([rng.random_range(0.0..200.0), rng.random_range(0.0..200.0)]);
        dst.push([rng.random_range(0.0..200.0), rng.random_range(0.0..200.0)]);
    }
    let cfg = RansacConfig {
        seed: 42,
        ..RansacConfig::default()
    };

    let first = estimate_homography_points(&src, &dst, &cfg, None).unwrap();
    let second = estimate_homography_points(&src, &dst, &cfg, None).unwrap();
    assert_eq!(first.homography, second.homography);
    assert_eq!(first.inlier_mask, second.inlier_mask);
    assert_eq!(first.trials, second.trials);
}

#[test]
fn cancelled_token_stops_estimation() {
    let h = ground_truth();
    let src = scattered_points(20, 5);
    let dst = project_all(&h, &src);
    let token = CancelToken::new();
    token.cancel();

    let kps_a = to_keypoints(&src);
    let kps_b = to_keypoints(&dst);
    let err = estimate_homography_with_cancel(
        &kps_a,
        &kps_b,
        &identity_matches(20),
        &RansacConfig::default(),
        Some(&token),
    )
    .unwrap_err();
    assert_eq!(err, AlignError::Cancelled);
}

#[test]
fn fewer_than_four_matches_is_insufficient() {
    let src = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    let err = estimate_homography_points(&src, &src, &RansacConfig::default(), None).unwrap_err();
    assert_eq!(err, AlignError::InsufficientMatches { needed: 4, got: 3 });
}

#[test]
fn collinear_points_are_degenerate() {
    let src: Vec<[f64; 2]> = (0..10).map(|i| [i as f64 * 10.0, i as f64 * 5.0]).collect();
    let cfg = RansacConfig {
        max_iterations: 20,
        ..RansacConfig::default()
    };
    let err = estimate_homography_points(&src, &src, &cfg, None).unwrap_err();
    assert!(matches!(err, AlignError::DegenerateTransform { .. }));
}

#[test]
fn homography_with_horizon_inside_the_source_is_rejected() {
    // w = 1 - x / 100, so the line x = 100 maps to infinity.
    let h = Homography::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-0.01, 0.0, 1.0]]);
    let mut rng = StdRng::seed_from_u64(21);
    let src: Vec<[f64; 2]> = (0..30)
        .map(|_| [rng.random_range(0.0..60.0), rng.random_range(0.0..100.0)])
        .collect();
    let dst = project_all(&h, &src);

    let narrow = RansacConfig {
        source_bounds: Some((61, 101)),
        ..RansacConfig::default()
    };
    let est = estimate_homography_points(&src, &dst, &narrow, None).unwrap();
    assert_eq!(est.num_inliers, 30);

    let wide = RansacConfig {
        source_bounds: Some((200, 101)),
        ..RansacConfig::default()
    };
    let err = estimate_homography_points(&src, &dst, &wide, None).unwrap_err();
    assert!(matches!(err, AlignError::DegenerateTransform { .. }));
}

#[test]
fn out_of_range_match_index_is_reported() {
    let kps = to_keypoints(&scattered_points(4, 9));
    let mut matches = identity_matches(4);
    matches[2].train_idx = 17;
    let err = estimate_homography(&kps, &kps, &matches, &RansacConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        AlignError::IndexOutOfBounds { index: 17, len: 4, .. }
    ));
}

#[test]
fn invalid_configuration_is_rejected() {
    let src = scattered_points(8, 11);
    for cfg in [
        RansacConfig {
            reproj_threshold: 0.0,
            ..RansacConfig::default()
        },
        RansacConfig {
            max_iterations: 0,
            ..RansacConfig::default()
        },
        RansacConfig {
            min_match_count: 3,
            ..RansacConfig::default()
        },
        RansacConfig {
            confidence: 1.0,
            ..RansacConfig::default()
        },
    ] {
        let err = estimate_homography_points(&src, &src, &cfg, None).unwrap_err();
        assert!(matches!(err, AlignError::ConfigurationError { .. }));
    }
}
