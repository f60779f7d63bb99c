use warpalign::{match_descriptors, AlignError, Descriptors, DistanceMetric, MatchConfig};

fn table(rows: &[[f32; 2]]) -> Descriptors {
    Descriptors::from_rows(rows).unwrap()
}

#[test]
fn distinctive_matches_pass_and_ambiguous_ones_fail() {
    // Queries 0-3 have one clear neighbour, query 4 sits between two.
    let train = table(&[
        [0.0, 0.0],
        [10.0, 0.0],
        [0.0, 10.0],
        [10.0, 10.0],
        [20.0, 20.0],
        [22.0, 20.0],
    ]);
    let query = table(&[
        [0.1, 0.0],
        [10.0, 0.2],
        [0.0, 9.9],
        [10.1, 10.1],
        [21.0, 20.0],
    ]);

    let set = match_descriptors(&query, &train, &MatchConfig::default()).unwrap();
    assert!(!set.fallback);
    assert_eq!(set.ratio_passed, 4);
    let pairs: Vec<(usize, usize)> = set
        .matches
        .iter()
        .map(|m| (m.query_idx, m.train_idx))
        .collect();
    assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
}

#[test]
fn accepted_matches_satisfy_the_ratio_bound() {
    let train = table(&[[0.0, 0.0], [3.0, 0.0], [0.0, 5.0], [6.0, 6.0], [9.0, 1.0]]);
    let query = table(&[[0.5, 0.2], [2.8, 0.1], [0.1, 4.6], [5.7, 6.2], [8.9, 1.3]]);
    let cfg = MatchConfig {
        ratio_threshold: 0.6,
        ..MatchConfig::default()
    };

    let set = match_descriptors(&query, &train, &cfg).unwrap();
    assert!(!set.fallback);
    assert_eq!(set.len(), 5);
    for m in &set.matches {
        let q = query.row(m.query_idx).unwrap();
        let mut dists: Vec<f32> = train
            .rows()
            .map(|t| ((q[0] - t[0]).powi(2) + (q[1] - t[1]).powi(2)).sqrt())
            .collect();
        dists.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!(dists[0] < cfg.ratio_threshold * dists[1]);
        assert!((m.distance - dists[0]).abs() < 1e-4);
    }
}

#[test]
fn too_few_survivors_fall_back_to_raw_nearest_neighbours() {
    let train = table(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
    let query = table(&[[0.5, 0.5], [0.5, 0.4], [0.6, 0.5], [0.0, 0.05], [0.4, 0.6]]);

    let set = match_descriptors(&query, &train, &MatchConfig::default()).unwrap();
    assert!(set.fallback);
    assert!(set.ratio_passed < 4);
    assert_eq!(set.len(), 5);
    let queries: Vec<usize> = set.matches.iter().map(|m| m.query_idx).collect();
    assert_eq!(queries, vec![0, 1, 2, 3, 4]);
}

#[test]
fn strict_mode_reports_insufficient_matches() {
    let train = table(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
    let query = table(&[[0.5, 0.5], [0.5, 0.4], [0.0, 0.05]]);
    let cfg = MatchConfig {
        strict: true,
        ..MatchConfig::default()
    };

    let err = match_descriptors(&query, &train, &cfg).unwrap_err();
    assert_eq!(err, AlignError::InsufficientMatches { needed: 4, got: 1 });
}

#[test]
fn single_train_descriptor_never_passes_ratio_test() {
    let train = table(&[[0.0, 0.0]]);
    let query = table(&[[0.0, 0.0], [1.0, 1.0]]);

    let set = match_descriptors(&query, &train, &MatchConfig::default()).unwrap();
    assert!(set.fallback);
    assert_eq!(set.ratio_passed, 0);
    assert_eq!(set.len(), 2);
}

#[test]
fn hamming_metric_counts_differing_bits() {
    let train = Descriptors::from_rows(&[
        [0b0000_0000 as f32, 0.0],
        [0b1111_0000 as f32, 0.0],
        [0b0000_1111 as f32, 255.0],
        [0b1010_1010 as f32, 17.0],
    ])
    .unwrap();
    let query = Descriptors::from_rows(&[
        [0b0000_0001 as f32, 0.0],
        [0b1111_0001 as f32, 0.0],
        [0b0000_1111 as f32, 254.0],
        [0b1010_1010 as f32, 16.0],
    ])
    .unwrap();
    let cfg = MatchConfig {
        metric: DistanceMetric::Hamming,
        ..MatchConfig::default()
    };

    let set = match_descriptors(&query, &train, &cfg).unwrap();
    assert!(!set.fallback);
    for m in &set.matches {
        assert_eq!(m.query_idx, m.train_idx);
        assert_eq!(m.distance, 1.0);
    }
}

#[test]
fn mismatched_dimensions_are_rejected() {
    let train = Descriptors::new(vec![0.0; 6], 3).unwrap();
    let query = table(&[[0.0, 0.0]]);
    let err = match_descriptors(&query, &train, &MatchConfig::default()).unwrap_err();
    assert!(matches!(err, AlignError::InvalidInput { .. }));
}

#[test]
fn invalid_ratio_is_a_configuration_error() {
    let d = table(&[[0.0, 0.0]]);
    let cfg = MatchConfig {
        ratio_threshold: 1.5,
        ..MatchConfig::default()
    };
    let err = match_descriptors(&d, &d, &cfg).unwrap_err();
    assert!(matches!(err, AlignError::ConfigurationError { .. }));
}
