//! Constant-border padding.

use crate::image::{ImageView, OwnedImage};
use crate::util::{AlignError, AlignResult};

/// Pads `src` symmetrically with `border` pixels of `value` on every side.
pub fn pad_constant(src: ImageView<'_, u8>, border: usize, value: u8) -> AlignResult<OwnedImage> {
    let (width, height) = border
        .checked_mul(2)
        .and_then(|grow| Some((src.width().checked_add(grow)?, src.height().checked_add(grow)?)))
        .ok_or(AlignError::InvalidDimensions {
            width: src.width(),
            height: src.height(),
        })?;
    let channels = src.channels();
    let mut out = OwnedImage::filled(width, height, channels, value)?.into_vec();

    let row_len = src.width() * channels;
    for y in 0..src.height() {
        let row = src.row(y).ok_or(AlignError::IndexOutOfBounds {
            index: y,
            len: src.height(),
            context: "row",
        })?;
        let start = ((y + border) * width + border) * channels;
        out[start..start + row_len].copy_from_slice(row);
    }

    Ok(OwnedImage::from_parts(out, width, height, channels))
}

#[cfg(test)]
mod tests {
    use super::pad_constant;
    use crate::image::ImageView;

    #[test]
    fn pad_places_source_in_centre() {
        let data = [1u8, 2, 3, 4];
        let view = ImageView::gray(&data, 2, 2).unwrap();
        let out = pad_constant(view, 1, 0).unwrap();
        assert_eq!(out.shape(), (4, 4, 1));
        #[rustfmt::skip]
        let expected = [
            0, 0, 0, 0,
            0, 1, 2, 0,
            0, 3, 4, 0,
            0, 0, 0, 0,
        ];
        assert_eq!(out.data(), &expected);
    }

    #[test]
    fn zero_border_copies_input() {
        let data = [5u8, 6, 7];
        let view = ImageView::from_slice(&data, 1, 1, 3).unwrap();
        let out = pad_constant(view, 0, 9).unwrap();
        assert_eq!(out.data(), &data);
    }
}
