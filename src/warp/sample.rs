//! Sub-pixel sampling of interleaved `u8` images.
//!
//! Integer coordinates address pixel centres. Bilinear sampling blends the
//! four neighbouring taps; taps outside the image are resolved by the
//! [`Border`] policy so partially covered pixels fade into the background
//! instead of producing a hard edge.

use crate::image::ImageView;
use crate::util::math::round_to_u8;

/// Interpolation used when resampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Four-tap bilinear interpolation.
    #[default]
    Bilinear,
    /// Nearest pixel centre.
    Nearest,
}

/// Policy for taps that fall outside the source image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Border {
    /// Use a constant value for every channel.
    Constant(u8),
    /// Clamp to the closest edge pixel.
    Replicate,
}

#[inline]
fn tap(src: &ImageView<'_, u8>, x: isize, y: isize, c: usize, border: Border) -> f32 {
    let w = src.width() as isize;
    let h = src.height() as isize;
    let (x, y) = match border {
        Border::Constant(value) => {
            if x < 0 || y < 0 || x >= w || y >= h {
                return value as f32;
            }
            (x, y)
        }
        Border::Replicate => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
    };
    let idx = y as usize * src.stride() + x as usize * src.channels() + c;
    src.as_slice()[idx] as f32
}

/// Samples every channel at `(x, y)` into `out`.
///
/// Returns `false` without touching `out` when the point is entirely outside
/// the image under a constant border (or is not finite); callers fill those
/// pixels with their background value.
#[inline]
pub fn sample_into(
    src: &ImageView<'_, u8>,
    x: f32,
    y: f32,
    interpolation: Interpolation,
    border: Border,
    out: &mut [u8],
) -> bool {
    if !x.is_finite() || !y.is_finite() {
        return false;
    }
    let w = src.width() as f32;
    let h = src.height() as f32;
    match interpolation {
        Interpolation::Nearest => {
            let xi = x.round();
            let yi = y.round();
            if matches!(border, Border::Constant(_))
                && (xi < 0.0 || yi < 0.0 || xi > w - 1.0 || yi > h - 1.0)
            {
                return false;
            }
            for (c, value) in out.iter_mut().enumerate() {
                *value = tap(src, xi as isize, yi as isize, c, border) as u8;
            }
            true
        }
        Interpolation::Bilinear => {
            if matches!(border, Border::Constant(_))
                && (x <= -1.0 || y <= -1.0 || x >= w || y >= h)
            {
                return false;
            }
            let x0f = x.floor();
            let y0f = y.floor();
            let fx = x - x0f;
            let fy = y - y0f;
            let x0 = x0f as isize;
            let y0 = y0f as isize;

            let w00 = (1.0 - fx) * (1.0 - fy);
            let w10 = fx * (1.0 - fy);
            let w01 = (1.0 - fx) * fy;
            let w11 = fx * fy;
            for (c, value) in out.iter_mut().enumerate() {
                let a = tap(src, x0, y0, c, border);
                let b = tap(src, x0 + 1, y0, c, border);
                let d = tap(src, x0, y0 + 1, c, border);
                let e = tap(src, x0 + 1, y0 + 1, c, border);
                *value = round_to_u8(a * w00 + b * w10 + d * w01 + e * w11);
            }
            true
        }
    }
}
