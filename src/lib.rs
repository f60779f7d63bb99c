//! WarpAlign aligns one image onto another from keypoint correspondences.
//!
//! Descriptors are paired with a Lowe ratio test, a homography is fitted with
//! seeded RANSAC and refined on the inliers, and the source image is warped
//! into the target frame and blended with it. Keypoint extraction is left to
//! the caller through [`KeypointSource`]. Parallel trials and per-row warping
//! are available via the `rayon` feature, and SIMD descriptor distances via
//! the `simd` feature.

pub mod blend;
pub mod estimate;
pub mod features;
pub mod image;
pub mod lowlevel;
pub mod matcher;
pub mod pipeline;
mod trace;
pub mod util;
pub mod viz;
pub mod warp;

pub use blend::blend;
pub use estimate::cancel::CancelToken;
pub use estimate::homography::Homography;
pub use estimate::{
    estimate_homography, estimate_homography_with_cancel, HomographyEstimate, RansacConfig,
};
pub use features::{Descriptors, Features, Keypoint, KeypointSource};
pub use image::{ImageView, OwnedImage};
pub use matcher::{match_descriptors, Correspondence, DistanceMetric, MatchConfig, MatchSet};
pub use pipeline::{AlignConfig, Aligner, Alignment};
pub use util::{AlignError, AlignResult, Stage};
pub use warp::sample::Border;
pub use warp::{warp_perspective, Interpolation, WarpConfig};
