//! Low-level building blocks for custom alignment pipelines.
//!
//! These expose the pieces the [`Aligner`](crate::Aligner) composes: nearest
//! neighbour search, minimal-sample fitting, refinement, and pixel sampling.
//! Most users should prefer the top-level stage functions.

pub use crate::estimate::dlt::fit_homography_dlt;
pub use crate::estimate::estimate_homography_points;
pub use crate::estimate::refine::refine_homography;
pub use crate::estimate::sample::{draw_sample, is_degenerate, SAMPLE_SIZE};
pub use crate::image::pad::pad_constant;
pub use crate::image::resize::{resize_bilinear, resize_to_match};
pub use crate::matcher::knn::{distance, euclidean, hamming, two_nearest, TwoNearest};
pub use crate::warp::sample::{sample_into, Border};
