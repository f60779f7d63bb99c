//! Descriptor matching with Lowe's ratio test.
//!
//! For every query descriptor (image A) the two nearest train descriptors
//! (image B) are found by brute force. A match is kept only when the nearest
//! distance is clearly smaller than the runner-up:
//! `d(nearest) < ratio_threshold * d(second)`.
//!
//! When fewer than `min_match_count` matches survive, the matcher falls back
//! to the raw nearest-neighbour set and sets [`MatchSet::fallback`], unless
//! `strict` is enabled, in which case it fails with
//! [`AlignError::InsufficientMatches`].

pub mod knn;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
mod rayon;

use crate::features::Descriptors;
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{AlignError, AlignResult};
use knn::{two_nearest, TwoNearest};

/// Minimum number of correspondences needed to fit a homography.
pub const MIN_HOMOGRAPHY_MATCHES: usize = 4;

/// Descriptor distance metric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    /// L2 distance over float descriptors (SIFT-like).
    #[default]
    Euclidean,
    /// Bit distance over byte-packed binary descriptors (ORB-like).
    Hamming,
}

/// Matcher configuration.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Lowe ratio threshold in `(0, 1)`.
    pub ratio_threshold: f32,
    /// Matches needed before the ratio-filtered set is used.
    pub min_match_count: usize,
    /// Distance metric over descriptor vectors.
    pub metric: DistanceMetric,
    /// Fail instead of falling back to unfiltered matches.
    pub strict: bool,
    /// Search queries in parallel (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.7,
            min_match_count: MIN_HOMOGRAPHY_MATCHES,
            metric: DistanceMetric::Euclidean,
            strict: false,
            parallel: false,
        }
    }
}

impl MatchConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> AlignResult<()> {
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold < 1.0) {
            return Err(AlignError::ConfigurationError {
                reason: "ratio_threshold must be in (0, 1)",
            });
        }
        if self.min_match_count < MIN_HOMOGRAPHY_MATCHES {
            return Err(AlignError::ConfigurationError {
                reason: "min_match_count must be >= 4",
            });
        }
        Ok(())
    }
}

/// A correspondence between keypoint `query_idx` in image A and keypoint
/// `train_idx` in image B.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correspondence {
    /// Index into image A's keypoints.
    pub query_idx: usize,
    /// Index into image B's keypoints.
    pub train_idx: usize,
    /// Descriptor distance that produced the match.
    pub distance: f32,
}

/// Matcher output.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchSet {
    /// Correspondences ordered by query index.
    pub matches: Vec<Correspondence>,
    /// True when too few matches passed the ratio test and `matches` holds the
    /// unfiltered nearest neighbours instead.
    pub fallback: bool,
    /// Number of matches that passed the ratio test.
    pub ratio_passed: usize,
}

impl MatchSet {
    /// Returns the number of correspondences.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Returns true if there are no correspondences.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Ratio-test outcome for one query.
#[derive(Clone, Copy, Debug)]
pub(crate) struct QueryOutcome {
    pub(crate) nearest: Option<Correspondence>,
    pub(crate) passed: bool,
}

#[inline]
pub(crate) fn judge(query_idx: usize, nn: TwoNearest, ratio: f32) -> QueryOutcome {
    let nearest = nn.best.map(|(train_idx, distance)| Correspondence {
        query_idx,
        train_idx,
        distance,
    });
    let passed = match (nn.best, nn.second) {
        (Some((_, best)), Some(second)) => best < ratio * second,
        _ => false,
    };
    QueryOutcome { nearest, passed }
}

fn query_outcomes_seq(
    query: &Descriptors,
    train: &Descriptors,
    cfg: &MatchConfig,
) -> Vec<QueryOutcome> {
    query
        .rows()
        .enumerate()
        .map(|(idx, q)| judge(idx, two_nearest(q, train, cfg.metric), cfg.ratio_threshold))
        .collect()
}

/// Matches descriptors of image A (`query`) against image B (`train`).
pub fn match_descriptors(
    query: &Descriptors,
    train: &Descriptors,
    cfg: &MatchConfig,
) -> AlignResult<MatchSet> {
    cfg.validate()?;
    if query.dim() != train.dim() {
        return Err(AlignError::InvalidInput {
            reason: "descriptor dimensions differ between images",
        });
    }

    let _span = trace_span!(
        "match_descriptors",
        queries = query.len(),
        train = train.len()
    )
    .entered();

    #[cfg(feature = "rayon")]
    let outcomes = if cfg.parallel {
        self::rayon::query_outcomes_par(query, train, cfg)
    } else {
        query_outcomes_seq(query, train, cfg)
    };
    #[cfg(not(feature = "rayon"))]
    let outcomes = query_outcomes_seq(query, train, cfg);

    let good: Vec<Correspondence> = outcomes
        .iter()
        .filter(|o| o.passed)
        .filter_map(|o| o.nearest)
        .collect();
    let ratio_passed = good.len();
    trace_event!("ratio_test", passed = ratio_passed, queries = query.len());

    if ratio_passed >= cfg.min_match_count {
        return Ok(MatchSet {
            matches: good,
            fallback: false,
            ratio_passed,
        });
    }

    if cfg.strict {
        return Err(AlignError::InsufficientMatches {
            needed: cfg.min_match_count,
            got: ratio_passed,
        });
    }

    let raw: Vec<Correspondence> = outcomes.iter().filter_map(|o| o.nearest).collect();
    trace_warn!(
        "ratio_test_fallback",
        passed = ratio_passed,
        raw = raw.len()
    );
    Ok(MatchSet {
        matches: raw,
        fallback: true,
        ratio_passed,
    })
}
