//! Keypoints, descriptors, and the keypoint-source boundary.
//!
//! Feature detection is not part of this crate. Any detector that yields
//! index-aligned keypoints and fixed-length descriptors (SIFT, ORB, learned
//! features) plugs in through [`KeypointSource`].

use crate::image::ImageView;
use crate::util::{AlignError, AlignResult};

/// Sub-pixel keypoint location in an image's coordinate frame.
///
/// Integer coordinates address pixel centres.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    /// Column coordinate.
    pub x: f32,
    /// Row coordinate.
    pub y: f32,
}

impl Keypoint {
    /// Creates a keypoint at `(x, y)`.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub(crate) fn to_f64(self) -> [f64; 2] {
        [self.x as f64, self.y as f64]
    }
}

/// Row-major table of fixed-length descriptors.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptors {
    dim: usize,
    data: Vec<f32>,
}

impl Descriptors {
    /// Creates a table from a flat buffer holding `data.len() / dim` rows.
    pub fn new(data: Vec<f32>, dim: usize) -> AlignResult<Self> {
        if dim == 0 {
            return Err(AlignError::InvalidInput {
                reason: "descriptor dimension must be > 0",
            });
        }
        if data.len() % dim != 0 {
            return Err(AlignError::InvalidInput {
                reason: "descriptor buffer length is not a multiple of the dimension",
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(AlignError::InvalidInput {
                reason: "descriptor values must be finite",
            });
        }
        Ok(Self { dim, data })
    }

    /// Creates a table from individual rows; every row must have the same length.
    ///
    /// The dimension is taken from the first row, so `rows` must not be
    /// empty. Use [`Descriptors::from_rows_with_dim`] when it may be.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> AlignResult<Self> {
        let dim = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        Self::from_rows_with_dim(rows, dim)
    }

    /// Creates a table of `dim`-length rows. An empty `rows` gives an empty table.
    pub fn from_rows_with_dim<R: AsRef<[f32]>>(rows: &[R], dim: usize) -> AlignResult<Self> {
        let mut data = Vec::with_capacity(dim.saturating_mul(rows.len()));
        for row in rows {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(AlignError::InvalidInput {
                    reason: "descriptor rows differ in length",
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(data, dim)
    }

    /// Returns the descriptor dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the number of descriptors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Returns true if the table holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns descriptor `idx`.
    pub fn row(&self, idx: usize) -> Option<&[f32]> {
        let start = idx.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Iterates over descriptors in index order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        self.data.chunks_exact(self.dim)
    }

    /// Returns the flat row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Keypoints with their index-aligned descriptors for one image.
#[derive(Clone, Debug, PartialEq)]
pub struct Features {
    keypoints: Vec<Keypoint>,
    descriptors: Descriptors,
}

impl Features {
    /// Pairs keypoints with descriptors; both must have the same length.
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Descriptors) -> AlignResult<Self> {
        if keypoints.len() != descriptors.len() {
            return Err(AlignError::InvalidInput {
                reason: "keypoint and descriptor counts differ",
            });
        }
        if keypoints
            .iter()
            .any(|kp| !kp.x.is_finite() || !kp.y.is_finite())
        {
            return Err(AlignError::InvalidInput {
                reason: "keypoint coordinates must be finite",
            });
        }
        Ok(Self {
            keypoints,
            descriptors,
        })
    }

    /// Returns the keypoints.
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Returns the descriptor table.
    pub fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    /// Returns the number of features.
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Returns true if there are no features.
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Maps keypoints from a `from` sized frame into a resized `to` frame and
    /// then shifts them by `offset` pixels on both axes.
    ///
    /// Uses the same pixel-centre convention as
    /// [`resize_bilinear`](crate::image::resize::resize_bilinear).
    pub fn reframed(&self, from: (usize, usize), to: (usize, usize), offset: f32) -> Self {
        let sx = to.0 as f32 / from.0 as f32;
        let sy = to.1 as f32 / from.1 as f32;
        let keypoints = self
            .keypoints
            .iter()
            .map(|kp| {
                Keypoint::new(
                    (kp.x + 0.5) * sx - 0.5 + offset,
                    (kp.y + 0.5) * sy - 0.5 + offset,
                )
            })
            .collect();
        Self {
            keypoints,
            descriptors: self.descriptors.clone(),
        }
    }
}

/// Capability that produces features for an image.
///
/// Any closure `Fn(ImageView<'_, u8>) -> AlignResult<Features>` is a source.
pub trait KeypointSource {
    /// Detects keypoints and computes their descriptors.
    fn extract(&self, image: ImageView<'_, u8>) -> AlignResult<Features>;
}

impl<F> KeypointSource for F
where
    F: Fn(ImageView<'_, u8>) -> AlignResult<Features>,
{
    fn extract(&self, image: ImageView<'_, u8>) -> AlignResult<Features> {
        self(image)
    }
}

#[cfg(test)]
mod tests {
    use super::{Descriptors, Features, Keypoint};
    use crate::util::AlignError;

    #[test]
    fn descriptors_reject_ragged_rows() {
        let rows = vec![vec![1.0f32, 2.0], vec![3.0]];
        let err = Descriptors::from_rows(&rows).unwrap_err();
        assert!(matches!(err, AlignError::InvalidInput { .. }));
    }

    #[test]
    fn empty_rows_with_explicit_dim_give_an_empty_table() {
        let desc = Descriptors::from_rows_with_dim(&Vec::<Vec<f32>>::new(), 128).unwrap();
        assert!(desc.is_empty());
        assert_eq!(desc.len(), 0);
        assert_eq!(desc.dim(), 128);
        let feats = Features::new(Vec::new(), desc).unwrap();
        assert!(feats.keypoints().is_empty());
    }

    #[test]
    fn rows_must_match_the_explicit_dim() {
        let err = Descriptors::from_rows_with_dim(&[[1.0f32, 2.0]], 3).unwrap_err();
        assert!(matches!(err, AlignError::InvalidInput { .. }));
    }

    #[test]
    fn features_require_matching_counts() {
        let desc = Descriptors::new(vec![0.0; 6], 3).unwrap();
        assert_eq!(desc.len(), 2);
        let err = Features::new(vec![Keypoint::new(0.0, 0.0)], desc).unwrap_err();
        assert!(matches!(err, AlignError::InvalidInput { .. }));
    }

    #[test]
    fn reframed_applies_scale_and_offset() {
        let desc = Descriptors::new(vec![1.0], 1).unwrap();
        let feats = Features::new(vec![Keypoint::new(9.5, 4.5)], desc).unwrap();
        let moved = feats.reframed((20, 10), (40, 20), 5.0);
        let kp = moved.keypoints()[0];
        assert!((kp.x - 24.5).abs() < 1e-6);
        assert!((kp.y - 14.5).abs() < 1e-6);
    }
}
