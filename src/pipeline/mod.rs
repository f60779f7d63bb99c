//! End-to-end alignment of two images.
//!
//! The [`Aligner`] resizes image A to image B's size, pads both with a
//! constant border, obtains features for the prepared images, and then runs
//! matcher, estimator, warper, and blender in order. It performs no numerics
//! of its own; the first failing stage is returned wrapped in
//! [`AlignError::Stage`] with nothing retried.

use crate::blend::blend;
use crate::estimate::cancel::CancelToken;
use crate::estimate::homography::Homography;
use crate::estimate::{estimate_homography_with_cancel, HomographyEstimate, RansacConfig};
use crate::features::{Features, KeypointSource};
use crate::image::pad::pad_constant;
use crate::image::resize::{resize_bilinear, resize_to_match};
use crate::image::{ImageView, OwnedImage};
use crate::matcher::{match_descriptors, DistanceMetric, MatchConfig, MatchSet, MIN_HOMOGRAPHY_MATCHES};
use crate::trace::{trace_event, trace_span};
use crate::util::{AlignError, AlignResult, Stage};
use crate::warp::{warp_perspective, Interpolation, WarpConfig};

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct AlignConfig {
    /// Lowe ratio threshold in `(0, 1)`.
    pub ratio_threshold: f32,
    /// Minimum matches and inliers, at least 4.
    pub min_match_count: usize,
    /// RANSAC inlier threshold in pixels.
    pub reproj_threshold: f64,
    /// RANSAC trial cap.
    pub max_iterations: usize,
    /// Weight of the warped image in the composite, in `[0, 1]`.
    pub blend_alpha: f32,
    /// Constant border added around both images before matching.
    pub border_pad: usize,
    /// Resampling kernel for the warp.
    pub interpolation: Interpolation,
    /// Descriptor distance metric.
    pub metric: DistanceMetric,
    /// Fail the match stage instead of falling back to unfiltered matches.
    pub strict_matching: bool,
    /// RANSAC seed.
    pub seed: u64,
    /// RANSAC confidence for the adaptive trial count.
    pub confidence: f64,
    /// RANSAC early-stop inlier fraction.
    pub early_stop_inlier_ratio: f64,
    /// Fill value for padding and uncovered warp pixels.
    pub background: u8,
    /// Use rayon in the matcher, estimator, and warper.
    pub parallel: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        let ransac = RansacConfig::default();
        Self {
            ratio_threshold: 0.7,
            min_match_count: MIN_HOMOGRAPHY_MATCHES,
            reproj_threshold: ransac.reproj_threshold,
            max_iterations: ransac.max_iterations,
            blend_alpha: 0.5,
            border_pad: 65,
            interpolation: Interpolation::Bilinear,
            metric: DistanceMetric::Euclidean,
            strict_matching: false,
            seed: ransac.seed,
            confidence: ransac.confidence,
            early_stop_inlier_ratio: ransac.early_stop_inlier_ratio,
            background: 0,
            parallel: false,
        }
    }
}

impl AlignConfig {
    /// Matcher settings derived from this configuration.
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            ratio_threshold: self.ratio_threshold,
            min_match_count: self.min_match_count,
            metric: self.metric,
            strict: self.strict_matching,
            parallel: self.parallel,
        }
    }

    /// Estimator settings derived from this configuration.
    pub fn ransac_config(&self) -> RansacConfig {
        RansacConfig {
            reproj_threshold: self.reproj_threshold,
            max_iterations: self.max_iterations,
            min_match_count: self.min_match_count,
            confidence: self.confidence,
            early_stop_inlier_ratio: self.early_stop_inlier_ratio,
            seed: self.seed,
            parallel: self.parallel,
            ..RansacConfig::default()
        }
    }

    /// Warper settings derived from this configuration.
    pub fn warp_config(&self) -> WarpConfig {
        WarpConfig {
            interpolation: self.interpolation,
            background: self.background,
            parallel: self.parallel,
        }
    }

    /// Checks every parameter range.
    pub fn validate(&self) -> AlignResult<()> {
        self.match_config().validate()?;
        self.ransac_config().validate()?;
        if !(self.blend_alpha.is_finite() && (0.0..=1.0).contains(&self.blend_alpha)) {
            return Err(AlignError::ConfigurationError {
                reason: "blend_alpha must be in [0, 1]",
            });
        }
        Ok(())
    }
}

/// Result of a successful alignment.
#[derive(Clone, Debug)]
pub struct Alignment {
    /// Image A resized to B's size and padded.
    pub prepared_a: OwnedImage,
    /// Image B padded.
    pub prepared_b: OwnedImage,
    /// Features of the prepared image A.
    pub features_a: Features,
    /// Features of the prepared image B.
    pub features_b: Features,
    /// Correspondences used for estimation, with the fallback flag.
    pub matches: MatchSet,
    /// Homography between the prepared frames and its inliers.
    pub estimate: HomographyEstimate,
    /// Prepared A warped into prepared B's frame.
    pub warped: OwnedImage,
    /// Weighted blend of `warped` and `prepared_b`.
    pub composite: OwnedImage,
    /// Maps original image-A pixels into the prepared A frame.
    pub frame_a: Homography,
    /// Maps original image-B pixels into the prepared B frame.
    pub frame_b: Homography,
}

impl Alignment {
    /// Homography between the prepared frames.
    pub fn homography(&self) -> &Homography {
        &self.estimate.homography
    }

    /// Homography from original image-A pixels to original image-B pixels.
    pub fn original_homography(&self) -> Option<Homography> {
        let back_b = self.frame_b.try_inverse()?;
        Some(self.frame_a.then(&self.estimate.homography).then(&back_b))
    }
}

/// Affine map from an original frame into a resized and padded frame.
fn frame_transform(from: (usize, usize), to: (usize, usize), pad: usize) -> Homography {
    let sx = to.0 as f64 / from.0 as f64;
    let sy = to.1 as f64 / from.1 as f64;
    let pad = pad as f64;
    Homography::from_rows([
        [sx, 0.0, 0.5 * sx - 0.5 + pad],
        [0.0, sy, 0.5 * sy - 0.5 + pad],
        [0.0, 0.0, 1.0],
    ])
}

/// Two-image alignment pipeline.
#[derive(Clone, Debug)]
pub struct Aligner {
    cfg: AlignConfig,
    cancel: Option<CancelToken>,
}

impl Aligner {
    /// Creates an aligner after validating `cfg`.
    pub fn new(cfg: AlignConfig) -> AlignResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg, cancel: None })
    }

    /// Attaches a cancellation token forwarded to the estimator.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AlignConfig {
        &self.cfg
    }

    /// Resizes A to B's size and pads both images.
    pub fn prepare(
        &self,
        image_a: ImageView<'_, u8>,
        image_b: ImageView<'_, u8>,
    ) -> AlignResult<(OwnedImage, OwnedImage)> {
        let resized_a = resize_bilinear(image_a, image_b.width(), image_b.height())
            .map_err(|e| e.at(Stage::Prepare))?;
        let pad = self.cfg.border_pad;
        let prepared_a = pad_constant(resized_a.view(), pad, self.cfg.background)
            .map_err(|e| e.at(Stage::Prepare))?;
        let prepared_b =
            pad_constant(image_b, pad, self.cfg.background).map_err(|e| e.at(Stage::Prepare))?;
        Ok((prepared_a, prepared_b))
    }

    /// Aligns A onto B, extracting features from the prepared images with `source`.
    pub fn align<S: KeypointSource + ?Sized>(
        &self,
        image_a: ImageView<'_, u8>,
        image_b: ImageView<'_, u8>,
        source: &S,
    ) -> AlignResult<Alignment> {
        let _span = trace_span!("align", mode = "extract").entered();
        let (prepared_a, prepared_b) = self.prepare(image_a, image_b)?;
        let features_a = source
            .extract(prepared_a.view())
            .map_err(|e| e.at(Stage::Extract))?;
        let features_b = source
            .extract(prepared_b.view())
            .map_err(|e| e.at(Stage::Extract))?;
        self.run(
            (image_a.width(), image_a.height()),
            (image_b.width(), image_b.height()),
            prepared_a,
            features_a,
            prepared_b,
            features_b,
        )
    }

    /// Aligns A onto B using features extracted from the original images.
    ///
    /// Keypoints are mapped into the prepared frames before matching.
    pub fn align_features(
        &self,
        image_a: ImageView<'_, u8>,
        features_a: &Features,
        image_b: ImageView<'_, u8>,
        features_b: &Features,
    ) -> AlignResult<Alignment> {
        let _span = trace_span!("align", mode = "features").entered();
        let (prepared_a, prepared_b) = self.prepare(image_a, image_b)?;
        let size_a = (image_a.width(), image_a.height());
        let size_b = (image_b.width(), image_b.height());
        let pad = self.cfg.border_pad as f32;
        let features_a = features_a.reframed(size_a, size_b, pad);
        let features_b = features_b.reframed(size_b, size_b, pad);
        self.run(size_a, size_b, prepared_a, features_a, prepared_b, features_b)
    }

    fn run(
        &self,
        size_a: (usize, usize),
        size_b: (usize, usize),
        prepared_a: OwnedImage,
        features_a: Features,
        prepared_b: OwnedImage,
        features_b: Features,
    ) -> AlignResult<Alignment> {
        let matches = match_descriptors(
            features_a.descriptors(),
            features_b.descriptors(),
            &self.cfg.match_config(),
        )
        .map_err(|e| e.at(Stage::Match))?;
        trace_event!(
            "matched",
            matches = matches.len(),
            fallback = matches.fallback
        );

        let ransac = RansacConfig {
            source_bounds: Some((prepared_a.width(), prepared_a.height())),
            ..self.cfg.ransac_config()
        };
        let estimate = estimate_homography_with_cancel(
            features_a.keypoints(),
            features_b.keypoints(),
            &matches.matches,
            &ransac,
            self.cancel.as_ref(),
        )
        .map_err(|e| e.at(Stage::Estimate))?;

        let target = prepared_b.view();
        let warped = warp_perspective(
            prepared_a.view(),
            &estimate.homography,
            target.width(),
            target.height(),
            &self.cfg.warp_config(),
        )
        .and_then(|w| resize_to_match(w.view(), target))
        .map_err(|e| e.at(Stage::Warp))?;

        let composite =
            blend(warped.view(), target, self.cfg.blend_alpha).map_err(|e| e.at(Stage::Blend))?;

        let pad = self.cfg.border_pad;
        Ok(Alignment {
            frame_a: frame_transform(size_a, size_b, pad),
            frame_b: frame_transform(size_b, size_b, pad),
            prepared_a,
            prepared_b,
            features_a,
            features_b,
            matches,
            estimate,
            warped,
            composite,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{frame_transform, AlignConfig, Aligner};
    use crate::util::AlignError;

    #[test]
    fn default_config_is_valid() {
        assert!(AlignConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_ratio_is_a_configuration_error() {
        let cfg = AlignConfig {
            ratio_threshold: 1.0,
            ..AlignConfig::default()
        };
        let err = Aligner::new(cfg).unwrap_err();
        assert!(matches!(err, AlignError::ConfigurationError { .. }));
    }

    #[test]
    fn frame_transform_matches_reframed_keypoints() {
        let t = frame_transform((20, 10), (40, 20), 5);
        let p = t.project(9.5, 4.5).unwrap();
        assert!((p[0] - 24.5).abs() < 1e-9);
        assert!((p[1] - 14.5).abs() < 1e-9);
    }
}
