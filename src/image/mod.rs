//! Image views and owned buffers.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! Pixels are interleaved: a pixel at `(x, y)` occupies `channels` consecutive
//! elements starting at `y * stride + x * channels`. The stride counts
//! elements between the starts of consecutive rows, so a stride larger than
//! `width * channels` represents padded rows.
//!
//! `OwnedImage` is the contiguous `u8` buffer produced by every operation in
//! this crate. The core never mutates an image it was given; resizing, padding,
//! warping, and blending all return new images.

use crate::util::{AlignError, AlignResult};

#[cfg(feature = "image-io")]
pub mod io;
pub mod pad;
pub mod resize;

/// Largest supported channel count.
pub const MAX_CHANNELS: usize = 4;

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    channels: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width * channels`.
    pub fn from_slice(
        data: &'a [T],
        width: usize,
        height: usize,
        channels: usize,
    ) -> AlignResult<Self> {
        let row_len = width
            .checked_mul(channels)
            .ok_or(AlignError::InvalidDimensions { width, height })?;
        Self::new(data, width, height, channels, row_len)
    }

    /// Creates a single-channel contiguous view.
    pub fn gray(data: &'a [T], width: usize, height: usize) -> AlignResult<Self> {
        Self::from_slice(data, width, height, 1)
    }

    /// Creates a view with an explicit stride.
    pub fn new(
        data: &'a [T],
        width: usize,
        height: usize,
        channels: usize,
        stride: usize,
    ) -> AlignResult<Self> {
        let needed = required_len(width, height, channels, stride)?;
        if data.len() < needed {
            return Err(AlignError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns `(width, height, channels)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.channels)
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the channel values of the pixel at `(x, y)` if it is within bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&'a [T]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = y
            .checked_mul(self.stride)?
            .checked_add(x.checked_mul(self.channels)?)?;
        self.data.get(start..start + self.channels)
    }

    /// Returns a contiguous slice for row `y` with length `width * channels`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width * self.channels)?;
        self.data.get(start..end)
    }
}

fn required_len(
    width: usize,
    height: usize,
    channels: usize,
    stride: usize,
) -> AlignResult<usize> {
    if width == 0 || height == 0 {
        return Err(AlignError::InvalidDimensions { width, height });
    }
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(AlignError::InvalidChannels { channels });
    }
    let row_len = width
        .checked_mul(channels)
        .ok_or(AlignError::InvalidDimensions { width, height })?;
    if stride < row_len {
        return Err(AlignError::InvalidStride { row_len, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(row_len))
        .ok_or(AlignError::InvalidDimensions { width, height })
}

/// Element count of a contiguous `width x height x channels` buffer.
pub(crate) fn contiguous_len(width: usize, height: usize, channels: usize) -> AlignResult<usize> {
    let row_len = width
        .checked_mul(channels)
        .ok_or(AlignError::InvalidDimensions { width, height })?;
    required_len(width, height, channels, row_len)
}

/// Owned contiguous `u8` image buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

impl OwnedImage {
    /// Creates an image from a contiguous interleaved buffer.
    pub fn new(data: Vec<u8>, width: usize, height: usize, channels: usize) -> AlignResult<Self> {
        let needed = contiguous_len(width, height, channels)?;
        if data.len() < needed {
            return Err(AlignError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(AlignError::InvalidInput {
                reason: "buffer larger than width * height * channels",
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Creates a single-channel image from a contiguous buffer.
    pub fn gray(data: Vec<u8>, width: usize, height: usize) -> AlignResult<Self> {
        Self::new(data, width, height, 1)
    }

    /// Creates an image with every element set to `value`.
    pub fn filled(width: usize, height: usize, channels: usize, value: u8) -> AlignResult<Self> {
        let needed = contiguous_len(width, height, channels)?;
        Ok(Self {
            data: vec![value; needed],
            width,
            height,
            channels,
        })
    }

    /// Copies a (possibly strided) view into a contiguous image.
    pub fn from_view(view: ImageView<'_, u8>) -> AlignResult<Self> {
        let row_len = view.width() * view.channels();
        let mut data = Vec::with_capacity(row_len * view.height());
        for y in 0..view.height() {
            let row = view.row(y).ok_or(AlignError::BufferTooSmall {
                needed: y * view.stride() + row_len,
                got: view.as_slice().len(),
            })?;
            data.extend_from_slice(row);
        }
        Self::new(data, view.width(), view.height(), view.channels())
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, u8> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            channels: self.channels,
            stride: self.width * self.channels,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns `(width, height, channels)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.channels)
    }

    /// Returns the contiguous pixel buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the image and returns its buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Returns the channel values of the pixel at `(x, y)` if it is within bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * self.channels;
        self.data.get(start..start + self.channels)
    }

    /// Builds an image directly from parts already validated by the caller.
    pub(crate) fn from_parts(data: Vec<u8>, width: usize, height: usize, channels: usize) -> Self {
        debug_assert_eq!(data.len(), width * height * channels);
        Self {
            data,
            width,
            height,
            channels,
        }
    }
}
