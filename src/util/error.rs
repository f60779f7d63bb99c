//! Error types for warpalign.

use std::fmt;
use thiserror::Error;

/// Result alias for warpalign operations.
pub type AlignResult<T> = std::result::Result<T, AlignError>;

/// Pipeline stage that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Resizing and padding the input images.
    Prepare,
    /// Running the keypoint source on the prepared images.
    Extract,
    /// Descriptor matching and ratio filtering.
    Match,
    /// Robust homography estimation.
    Estimate,
    /// Perspective warping (including the final resize).
    Warp,
    /// Weighted blending of the warped and target images.
    Blend,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prepare => "prepare",
            Stage::Extract => "extract",
            Stage::Match => "match",
            Stage::Estimate => "estimate",
            Stage::Warp => "warp",
            Stage::Blend => "blend",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when running warpalign algorithms.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AlignError {
    /// Width or height is zero or the total size overflows.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Channel count is outside the supported range (1..=4).
    #[error("invalid channel count: {channels}")]
    InvalidChannels { channels: usize },
    /// Stride is smaller than a packed row.
    #[error("invalid stride: row needs {row_len} elements, stride is {stride}")]
    InvalidStride { row_len: usize, stride: usize },
    /// Backing buffer is smaller than the view requires.
    #[error("buffer too small: need {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// An index does not address an existing element.
    #[error("{context} index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        context: &'static str,
    },
    /// The input data is malformed.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: &'static str },
    /// Fewer correspondences than required survived.
    #[error("insufficient matches: need {needed}, got {got}")]
    InsufficientMatches { needed: usize, got: usize },
    /// No usable homography could be found.
    #[error("degenerate transform: {reason}")]
    DegenerateTransform { reason: &'static str },
    /// Parameters are out of range or inconsistent.
    #[error("configuration error: {reason}")]
    ConfigurationError { reason: &'static str },
    /// Two images that must agree in shape do not.
    #[error("shape mismatch: expected {expected:?} (w, h, c), got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },
    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,
    /// Image decoding or encoding failed.
    #[cfg(feature = "image-io")]
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
    /// A pipeline stage failed.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<AlignError>,
    },
}

impl AlignError {
    /// Wraps the error with the pipeline stage that produced it.
    pub fn at(self, stage: Stage) -> Self {
        AlignError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping stage annotations.
    pub fn root(&self) -> &AlignError {
        let mut err = self;
        while let AlignError::Stage { source, .. } = err {
            err = source;
        }
        err
    }

    /// Returns the stage annotation, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AlignError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
