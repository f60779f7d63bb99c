//! Bilinear resizing for interleaved `u8` images.
//!
//! Pixel centres are aligned: destination pixel `x` samples source coordinate
//! `(x + 0.5) * src_w / dst_w - 0.5`, with edge replication at the borders.
//! Resizing to the same size returns an exact copy.

use crate::image::{contiguous_len, ImageView, OwnedImage};
use crate::util::{AlignError, AlignResult};
use crate::warp::sample::{sample_into, Border, Interpolation};

/// Resizes `src` to `width x height` using bilinear interpolation.
pub fn resize_bilinear(
    src: ImageView<'_, u8>,
    width: usize,
    height: usize,
) -> AlignResult<OwnedImage> {
    if width == 0 || height == 0 {
        return Err(AlignError::InvalidDimensions { width, height });
    }
    if src.width() == width && src.height() == height {
        return OwnedImage::from_view(src);
    }

    let channels = src.channels();
    let scale_x = src.width() as f32 / width as f32;
    let scale_y = src.height() as f32 / height as f32;
    let mut data = vec![0u8; contiguous_len(width, height, channels)?];

    for (y, row) in data.chunks_exact_mut(width * channels).enumerate() {
        let sy = (y as f32 + 0.5) * scale_y - 0.5;
        for (x, px) in row.chunks_exact_mut(channels).enumerate() {
            let sx = (x as f32 + 0.5) * scale_x - 0.5;
            sample_into(
                &src,
                sx,
                sy,
                Interpolation::Bilinear,
                Border::Replicate,
                px,
            );
        }
    }

    Ok(OwnedImage::from_parts(data, width, height, channels))
}

/// Resizes `src` to the dimensions of `like`.
pub fn resize_to_match(
    src: ImageView<'_, u8>,
    like: ImageView<'_, u8>,
) -> AlignResult<OwnedImage> {
    resize_bilinear(src, like.width(), like.height())
}
