//! Perspective warping.
//!
//! Every output pixel centre `(x, y)` is mapped back into the source through
//! the inverse homography and sampled there. The inverse is computed once up
//! front, so a singular transform is rejected before any pixel is touched.
//! Output pixels whose source lies outside the image, or whose homogeneous
//! coordinate vanishes, receive the background value.

pub mod sample;

use crate::estimate::homography::{Homography, W_EPSILON};
use crate::image::{contiguous_len, ImageView, OwnedImage};
use crate::trace::trace_span;
use crate::util::{AlignError, AlignResult};
use nalgebra::Matrix3;
use sample::{sample_into, Border};
pub use sample::Interpolation;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Warper configuration.
#[derive(Clone, Debug)]
pub struct WarpConfig {
    /// Resampling kernel.
    pub interpolation: Interpolation,
    /// Value written to pixels with no source coverage.
    pub background: u8,
    /// Process rows in parallel (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Bilinear,
            background: 0,
            parallel: false,
        }
    }
}

fn warp_row(
    src: &ImageView<'_, u8>,
    inv: &Matrix3<f64>,
    y: usize,
    row: &mut [u8],
    cfg: &WarpConfig,
) {
    let channels = src.channels();
    let yf = y as f64;
    // Row-constant parts of the inverse mapping.
    let bx = inv[(0, 1)] * yf + inv[(0, 2)];
    let by = inv[(1, 1)] * yf + inv[(1, 2)];
    let bw = inv[(2, 1)] * yf + inv[(2, 2)];

    for (x, px) in row.chunks_exact_mut(channels).enumerate() {
        let xf = x as f64;
        let w = inv[(2, 0)] * xf + bw;
        let covered = w.abs() > W_EPSILON && {
            let sx = (inv[(0, 0)] * xf + bx) / w;
            let sy = (inv[(1, 0)] * xf + by) / w;
            sample_into(
                src,
                sx as f32,
                sy as f32,
                cfg.interpolation,
                Border::Constant(cfg.background),
                px,
            )
        };
        if !covered {
            px.fill(cfg.background);
        }
    }
}

/// Resamples `src` through `h` into a new `width x height` image.
///
/// `h` maps source coordinates to output coordinates.
pub fn warp_perspective(
    src: ImageView<'_, u8>,
    h: &Homography,
    width: usize,
    height: usize,
    cfg: &WarpConfig,
) -> AlignResult<OwnedImage> {
    if width == 0 || height == 0 {
        return Err(AlignError::InvalidDimensions { width, height });
    }
    let inv = h.try_inverse().ok_or(AlignError::ConfigurationError {
        reason: "homography is not invertible",
    })?;
    let inv = *inv.matrix();

    let _span = trace_span!("warp_perspective", width = width, height = height).entered();

    let channels = src.channels();
    let len = contiguous_len(width, height, channels)?;
    let row_len = width * channels;
    let mut data = vec![cfg.background; len];

    #[cfg(feature = "rayon")]
    if cfg.parallel {
        data.par_chunks_exact_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| warp_row(&src, &inv, y, row, cfg));
        return Ok(OwnedImage::from_parts(data, width, height, channels));
    }

    for (y, row) in data.chunks_exact_mut(row_len).enumerate() {
        warp_row(&src, &inv, y, row, cfg);
    }
    Ok(OwnedImage::from_parts(data, width, height, channels))
}

#[cfg(test)]
mod tests {
    use super::{warp_perspective, WarpConfig};
    use crate::estimate::homography::Homography;
    use crate::image::ImageView;
    use crate::util::AlignError;

    #[test]
    fn identity_warp_copies_image() {
        let data: Vec<u8> = (0..48).map(|v| (v * 5) as u8).collect();
        let view = ImageView::from_slice(&data, 4, 4, 3).unwrap();
        let out = warp_perspective(view, &Homography::identity(), 4, 4, &WarpConfig::default())
            .unwrap();
        assert_eq!(out.data(), data.as_slice());
    }

    #[test]
    fn integer_translation_shifts_pixels() {
        let data: Vec<u8> = (1..=16).collect();
        let view = ImageView::gray(&data, 4, 4).unwrap();
        let h = Homography::translation(1.0, 2.0);
        let out = warp_perspective(view, &h, 4, 4, &WarpConfig::default()).unwrap();
        assert_eq!(out.pixel(1, 2), Some(&[1u8][..]));
        assert_eq!(out.pixel(3, 3), Some(&[7u8][..]));
        assert_eq!(out.pixel(0, 0), Some(&[0u8][..]));
    }

    #[test]
    fn overflowing_output_size_is_rejected() {
        let data = [0u8; 4];
        let view = ImageView::gray(&data, 2, 2).unwrap();
        let size = 1usize << 40;
        let err = warp_perspective(
            view,
            &Homography::identity(),
            size,
            size,
            &WarpConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AlignError::InvalidDimensions {
                width: size,
                height: size,
            }
        );
    }

    #[test]
    fn singular_homography_is_rejected() {
        let data = [0u8; 4];
        let view = ImageView::gray(&data, 2, 2).unwrap();
        let h = Homography::from_rows([[1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let err = warp_perspective(view, &h, 2, 2, &WarpConfig::default()).unwrap_err();
        assert!(matches!(err, AlignError::ConfigurationError { .. }));
    }
}
