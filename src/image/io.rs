//! Convenience helpers for loading and saving images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::{ImageView, OwnedImage};
use crate::util::{AlignError, AlignResult};
use std::path::Path;

/// Creates a borrowed view from a grayscale image buffer.
pub fn view_from_gray_image(img: &image::GrayImage) -> AlignResult<ImageView<'_, u8>> {
    ImageView::gray(img.as_raw(), img.width() as usize, img.height() as usize)
}

/// Creates an owned image from a dynamic image, keeping gray, RGB, or RGBA layout.
pub fn owned_from_dynamic_image(img: &image::DynamicImage) -> AlignResult<OwnedImage> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    match img {
        image::DynamicImage::ImageLuma8(gray) => OwnedImage::gray(gray.as_raw().clone(), width, height),
        image::DynamicImage::ImageRgba8(rgba) => {
            OwnedImage::new(rgba.as_raw().clone(), width, height, 4)
        }
        other => OwnedImage::new(other.to_rgb8().into_raw(), width, height, 3),
    }
}

/// Loads an image from disk and converts it to a grayscale owned image.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> AlignResult<OwnedImage> {
    let img = image::open(path).map_err(|err| AlignError::ImageIo {
        reason: err.to_string(),
    })?;
    let gray = img.to_luma8();
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    OwnedImage::gray(gray.into_raw(), width, height)
}

/// Loads an image from disk keeping its color layout.
pub fn load_image<P: AsRef<Path>>(path: P) -> AlignResult<OwnedImage> {
    let img = image::open(path).map_err(|err| AlignError::ImageIo {
        reason: err.to_string(),
    })?;
    owned_from_dynamic_image(&img)
}

/// Saves an image to disk; the format is inferred from the file extension.
pub fn save_image<P: AsRef<Path>>(img: &OwnedImage, path: P) -> AlignResult<()> {
    let color = match img.channels() {
        1 => image::ExtendedColorType::L8,
        2 => image::ExtendedColorType::La8,
        3 => image::ExtendedColorType::Rgb8,
        4 => image::ExtendedColorType::Rgba8,
        channels => return Err(AlignError::InvalidChannels { channels }),
    };
    image::save_buffer(
        path,
        img.data(),
        img.width() as u32,
        img.height() as u32,
        color,
    )
    .map_err(|err| AlignError::ImageIo {
        reason: err.to_string(),
    })
}
