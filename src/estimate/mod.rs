//! Robust homography estimation with RANSAC.
//!
//! Trials are evaluated in fixed-size batches. Trial `i` draws its minimal
//! sample from its own generator seeded with `(seed, i)`, so the outcome of a
//! trial never depends on which thread ran it, and the batch reduction
//! (most inliers, then lowest trial index) is order-independent. Sequential
//! and `rayon` execution therefore return identical estimates.
//!
//! After the search, the winning trial's inliers are refit with the
//! normalized DLT and polished with Levenberg-Marquardt before the final
//! inlier set is recomputed.

pub mod cancel;
pub mod dlt;
pub mod homography;
pub mod refine;
pub mod sample;

use crate::features::Keypoint;
use crate::matcher::{Correspondence, MIN_HOMOGRAPHY_MATCHES};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::math::mix_seed;
use crate::util::{AlignError, AlignResult};
use cancel::CancelToken;
use dlt::fit_homography_dlt;
use homography::Homography;
use rand::rngs::StdRng;
use rand::SeedableRng;
use refine::refine_homography;
use sample::{draw_sample, SAMPLE_SIZE};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// RANSAC configuration.
#[derive(Clone, Debug)]
pub struct RansacConfig {
    /// Inlier threshold on reprojection error, in pixels.
    pub reproj_threshold: f64,
    /// Upper bound on the number of trials.
    pub max_iterations: usize,
    /// Minimum inlier count for an accepted homography.
    pub min_match_count: usize,
    /// Probability of drawing at least one all-inlier sample, used to stop
    /// early once enough trials have run for the current inlier ratio.
    pub confidence: f64,
    /// Stop as soon as this fraction of correspondences are inliers.
    pub early_stop_inlier_ratio: f64,
    /// Seed for the per-trial generators.
    pub seed: u64,
    /// Trials evaluated between stopping checks.
    pub batch_size: usize,
    /// Levenberg-Marquardt iterations after the least-squares refit.
    pub refine_iterations: usize,
    /// Evaluate trials in parallel (requires the `rayon` feature).
    pub parallel: bool,
    /// Size of the source image. When set, a homography that sends any pixel
    /// of that rectangle to infinity is rejected.
    pub source_bounds: Option<(usize, usize)>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reproj_threshold: 1.0,
            max_iterations: 1000,
            min_match_count: MIN_HOMOGRAPHY_MATCHES,
            confidence: 0.995,
            early_stop_inlier_ratio: 0.99,
            seed: 0,
            batch_size: 64,
            refine_iterations: 10,
            parallel: false,
            source_bounds: None,
        }
    }
}

impl RansacConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> AlignResult<()> {
        if !(self.reproj_threshold.is_finite() && self.reproj_threshold > 0.0) {
            return Err(AlignError::ConfigurationError {
                reason: "reproj_threshold must be > 0",
            });
        }
        if self.max_iterations == 0 {
            return Err(AlignError::ConfigurationError {
                reason: "max_iterations must be > 0",
            });
        }
        if self.min_match_count < MIN_HOMOGRAPHY_MATCHES {
            return Err(AlignError::ConfigurationError {
                reason: "min_match_count must be >= 4",
            });
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(AlignError::ConfigurationError {
                reason: "confidence must be in (0, 1)",
            });
        }
        if !(self.early_stop_inlier_ratio > 0.0 && self.early_stop_inlier_ratio <= 1.0) {
            return Err(AlignError::ConfigurationError {
                reason: "early_stop_inlier_ratio must be in (0, 1]",
            });
        }
        if self.batch_size == 0 {
            return Err(AlignError::ConfigurationError {
                reason: "batch_size must be > 0",
            });
        }
        Ok(())
    }
}

/// Accepted homography with its supporting inliers.
#[derive(Clone, Debug, PartialEq)]
pub struct HomographyEstimate {
    /// Transform mapping image-A points to image-B points.
    pub homography: Homography,
    /// Inlier flag per input correspondence.
    pub inlier_mask: Vec<bool>,
    /// Number of `true` entries in `inlier_mask`.
    pub num_inliers: usize,
    /// Mean reprojection error over the inliers, in pixels.
    pub mean_error: f64,
    /// Number of RANSAC trials evaluated.
    pub trials: usize,
}

impl HomographyEstimate {
    /// Fraction of correspondences that are inliers.
    pub fn inlier_ratio(&self) -> f64 {
        if self.inlier_mask.is_empty() {
            return 0.0;
        }
        self.num_inliers as f64 / self.inlier_mask.len() as f64
    }

    /// Indices of the inlier correspondences.
    pub fn inlier_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.inlier_mask
            .iter()
            .enumerate()
            .filter_map(|(idx, &inlier)| inlier.then_some(idx))
    }
}

#[derive(Clone, Copy, Debug)]
struct Trial {
    index: usize,
    homography: Homography,
    inliers: usize,
}

fn better(a: Option<Trial>, b: Option<Trial>) -> Option<Trial> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if b.inliers > a.inliers || (b.inliers == a.inliers && b.index < a.index) {
                Some(b)
            } else {
                Some(a)
            }
        }
        (a, None) => a,
        (None, b) => b,
    }
}

fn count_inliers(h: &Homography, src: &[[f64; 2]], dst: &[[f64; 2]], threshold: f64) -> usize {
    src.iter()
        .zip(dst)
        .filter(|(s, d)| h.reprojection_error(**s, **d) < threshold)
        .count()
}

fn run_trial(index: usize, src: &[[f64; 2]], dst: &[[f64; 2]], cfg: &RansacConfig) -> Option<Trial> {
    let mut rng = StdRng::seed_from_u64(mix_seed(cfg.seed, index as u64));
    let idx = draw_sample(&mut rng, src, dst)?;
    let s = idx.map(|i| src[i]);
    let d = idx.map(|i| dst[i]);
    let homography = fit_homography_dlt(&s, &d).ok()?;
    if homography.is_singular() {
        return None;
    }
    let inliers = count_inliers(&homography, src, dst, cfg.reproj_threshold);
    Some(Trial {
        index,
        homography,
        inliers,
    })
}

/// Trials needed to draw one all-inlier sample with probability `confidence`.
fn required_trials(inlier_ratio: f64, confidence: f64, cap: usize) -> usize {
    let p_good = inlier_ratio.powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 {
        return 1;
    }
    let denom = (1.0 - p_good).ln();
    if !denom.is_finite() || denom >= 0.0 {
        return cap;
    }
    let n = ((1.0 - confidence).ln() / denom).ceil();
    if n.is_finite() && n >= 0.0 {
        (n as usize).clamp(1, cap)
    } else {
        cap
    }
}

fn run_batch(
    range: std::ops::Range<usize>,
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    cfg: &RansacConfig,
    cancel: Option<&CancelToken>,
) -> AlignResult<Option<Trial>> {
    #[cfg(feature = "rayon")]
    if cfg.parallel {
        let best = range
            .into_par_iter()
            .map(|index| run_trial(index, src, dst, cfg))
            .reduce(|| None, better);
        return Ok(best);
    }

    let mut best = None;
    for index in range {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(AlignError::Cancelled);
        }
        best = better(best, run_trial(index, src, dst, cfg));
    }
    Ok(best)
}

fn points(
    kps_a: &[Keypoint],
    kps_b: &[Keypoint],
    matches: &[Correspondence],
) -> AlignResult<(Vec<[f64; 2]>, Vec<[f64; 2]>)> {
    let mut src = Vec::with_capacity(matches.len());
    let mut dst = Vec::with_capacity(matches.len());
    for m in matches {
        let a = kps_a.get(m.query_idx).ok_or(AlignError::IndexOutOfBounds {
            index: m.query_idx,
            len: kps_a.len(),
            context: "query keypoint",
        })?;
        let b = kps_b.get(m.train_idx).ok_or(AlignError::IndexOutOfBounds {
            index: m.train_idx,
            len: kps_b.len(),
            context: "train keypoint",
        })?;
        src.push(a.to_f64());
        dst.push(b.to_f64());
    }
    Ok((src, dst))
}

/// Estimates the homography mapping image-A keypoints onto image-B keypoints
/// from (possibly contaminated) correspondences.
pub fn estimate_homography(
    kps_a: &[Keypoint],
    kps_b: &[Keypoint],
    matches: &[Correspondence],
    cfg: &RansacConfig,
) -> AlignResult<HomographyEstimate> {
    estimate_homography_with_cancel(kps_a, kps_b, matches, cfg, None)
}

/// Like [`estimate_homography`], checking `cancel` between trials.
pub fn estimate_homography_with_cancel(
    kps_a: &[Keypoint],
    kps_b: &[Keypoint],
    matches: &[Correspondence],
    cfg: &RansacConfig,
    cancel: Option<&CancelToken>,
) -> AlignResult<HomographyEstimate> {
    let (src, dst) = points(kps_a, kps_b, matches)?;
    estimate_homography_points(&src, &dst, cfg, cancel)
}

/// Point-level RANSAC: `src[i]` corresponds to `dst[i]`.
pub fn estimate_homography_points(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    cfg: &RansacConfig,
    cancel: Option<&CancelToken>,
) -> AlignResult<HomographyEstimate> {
    cfg.validate()?;
    if src.len() != dst.len() {
        return Err(AlignError::InvalidInput {
            reason: "src and dst must have the same length",
        });
    }
    let n = src.len();
    if n < cfg.min_match_count {
        return Err(AlignError::InsufficientMatches {
            needed: cfg.min_match_count,
            got: n,
        });
    }

    let _span = trace_span!("ransac", correspondences = n, seed = cfg.seed).entered();

    let mut best: Option<Trial> = None;
    let mut trials = 0usize;
    let mut limit = cfg.max_iterations;
    while trials < limit {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(AlignError::Cancelled);
        }
        let end = (trials + cfg.batch_size).min(limit);
        best = better(best, run_batch(trials..end, src, dst, cfg, cancel)?);
        trials = end;

        if let Some(trial) = best {
            let ratio = trial.inliers as f64 / n as f64;
            if ratio >= cfg.early_stop_inlier_ratio {
                break;
            }
            limit = required_trials(ratio, cfg.confidence, cfg.max_iterations);
        }
    }

    let best = best.ok_or(AlignError::DegenerateTransform {
        reason: "no non-degenerate sample found",
    })?;
    trace_event!("ransac_search", trials = trials, best_inliers = best.inliers);
    if best.inliers < cfg.min_match_count {
        return Err(AlignError::DegenerateTransform {
            reason: "no sample produced enough inliers",
        });
    }

    let homography = refit(&best, src, dst, cfg);
    if homography.is_singular() {
        return Err(AlignError::DegenerateTransform {
            reason: "estimated homography is singular",
        });
    }
    if let Some((width, height)) = cfg.source_bounds {
        if !homography.is_finite_over(width, height) {
            return Err(AlignError::DegenerateTransform {
                reason: "homography maps part of the source image to infinity",
            });
        }
    }

    let mut inlier_mask = vec![false; n];
    let mut num_inliers = 0usize;
    let mut error_sum = 0.0;
    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let err = homography.reprojection_error(*s, *d);
        if err < cfg.reproj_threshold {
            inlier_mask[i] = true;
            num_inliers += 1;
            error_sum += err;
        }
    }
    if num_inliers < cfg.min_match_count {
        return Err(AlignError::DegenerateTransform {
            reason: "refined homography lost its inliers",
        });
    }
    let mean_error = error_sum / num_inliers as f64;
    trace_event!(
        "ransac_result",
        inliers = num_inliers,
        mean_error = mean_error
    );

    Ok(HomographyEstimate {
        homography,
        inlier_mask,
        num_inliers,
        mean_error,
        trials,
    })
}

fn inliers_of(
    h: &Homography,
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    threshold: f64,
) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    src.iter()
        .zip(dst)
        .filter(|(s, d)| h.reprojection_error(**s, **d) < threshold)
        .map(|(s, d)| (*s, *d))
        .unzip()
}

/// Least-squares refit on the winning trial's inliers, then an LM polish on
/// the inliers of whichever model survived the refit.
///
/// Each stage is kept only if it supports at least as many inliers as the
/// one before it.
fn refit(best: &Trial, src: &[[f64; 2]], dst: &[[f64; 2]], cfg: &RansacConfig) -> Homography {
    let threshold = cfg.reproj_threshold;
    let (inlier_src, inlier_dst) = inliers_of(&best.homography, src, dst, threshold);

    let mut current = best.homography;
    let mut support = best.inliers;

    match fit_homography_dlt(&inlier_src, &inlier_dst) {
        Ok(ls) if !ls.is_singular() => {
            let count = count_inliers(&ls, src, dst, threshold);
            if count >= support {
                current = ls;
                support = count;
            } else {
                trace_warn!("refit_discarded", stage = "dlt", inliers = count);
            }
        }
        _ => {
            trace_warn!("refit_discarded", stage = "dlt", inliers = 0usize);
        }
    }

    let (inlier_src, inlier_dst) = inliers_of(&current, src, dst, threshold);
    let polished = refine_homography(&current, &inlier_src, &inlier_dst, cfg.refine_iterations);
    if !polished.is_singular() {
        let count = count_inliers(&polished, src, dst, threshold);
        if count >= support {
            current = polished;
        } else {
            trace_warn!("refit_discarded", stage = "lm", inliers = count);
        }
    }
    current
}
