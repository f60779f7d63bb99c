//! Weighted-average blending of two same-shaped images.

use crate::image::{ImageView, OwnedImage};
use crate::util::math::round_to_u8;
use crate::util::{AlignError, AlignResult};

/// Computes `alpha * a + (1 - alpha) * b` per element, rounded to `u8`.
///
/// Both images must agree in width, height, and channel count; the caller is
/// responsible for resizing or padding beforehand.
pub fn blend(a: ImageView<'_, u8>, b: ImageView<'_, u8>, alpha: f32) -> AlignResult<OwnedImage> {
    if !(alpha.is_finite() && (0.0..=1.0).contains(&alpha)) {
        return Err(AlignError::ConfigurationError {
            reason: "blend alpha must be in [0, 1]",
        });
    }
    if a.shape() != b.shape() {
        return Err(AlignError::ShapeMismatch {
            expected: a.shape(),
            got: b.shape(),
        });
    }

    let (width, height, channels) = a.shape();
    let beta = 1.0 - alpha;
    let mut data = Vec::with_capacity(width * height * channels);
    for y in 0..height {
        let (Some(row_a), Some(row_b)) = (a.row(y), b.row(y)) else {
            return Err(AlignError::IndexOutOfBounds {
                index: y,
                len: height,
                context: "row",
            });
        };
        data.extend(
            row_a
                .iter()
                .zip(row_b)
                .map(|(&va, &vb)| round_to_u8(alpha * va as f32 + beta * vb as f32)),
        );
    }
    Ok(OwnedImage::from_parts(data, width, height, channels))
}
