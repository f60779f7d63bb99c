//! 3x3 projective transform between two image planes.

use nalgebra::{Matrix3, Vector3};

/// Homogeneous coordinates with `|w|` below this are treated as infinity.
pub const W_EPSILON: f64 = 1e-12;

/// Determinants with a magnitude below this are treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-12;

/// Projective transform mapping image-A pixels to image-B pixels.
///
/// Stored normalized so that `h[(2, 2)] == 1` whenever that entry is not
/// (numerically) zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    h: Matrix3<f64>,
}

impl Homography {
    /// Wraps a matrix, rescaling it so the bottom-right entry is 1.
    pub fn new(h: Matrix3<f64>) -> Self {
        let scale = h[(2, 2)];
        if scale.abs() > W_EPSILON {
            Self { h: h / scale }
        } else {
            Self { h }
        }
    }

    /// Builds a homography from row-major entries.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ))
    }

    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            h: Matrix3::identity(),
        }
    }

    /// Pure translation by `(tx, ty)`.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::from_rows([[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]])
    }

    /// Rotation by `angle_deg` about `(cx, cy)` followed by a translation.
    pub fn rigid(angle_deg: f64, cx: f64, cy: f64, tx: f64, ty: f64) -> Self {
        let (s, c) = angle_deg.to_radians().sin_cos();
        Self::from_rows([
            [c, -s, cx - c * cx + s * cy + tx],
            [s, c, cy - s * cx - c * cy + ty],
            [0.0, 0.0, 1.0],
        ])
    }

    /// Returns the underlying matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.h
    }

    /// Returns the matrix as row-major entries.
    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let h = &self.h;
        [
            [h[(0, 0)], h[(0, 1)], h[(0, 2)]],
            [h[(1, 0)], h[(1, 1)], h[(1, 2)]],
            [h[(2, 0)], h[(2, 1)], h[(2, 2)]],
        ]
    }

    /// Returns the determinant.
    pub fn determinant(&self) -> f64 {
        self.h.determinant()
    }

    /// True if the matrix is not finite or numerically singular.
    pub fn is_singular(&self) -> bool {
        let det = self.determinant();
        !det.is_finite() || det.abs() < SINGULAR_EPSILON
    }

    /// Returns the inverse transform, or `None` if the matrix is singular.
    pub fn try_inverse(&self) -> Option<Homography> {
        if self.is_singular() {
            return None;
        }
        self.h.try_inverse().map(Homography::new)
    }

    /// Composes two transforms: the result applies `self` first, then `next`.
    pub fn then(&self, next: &Homography) -> Homography {
        Homography::new(next.h * self.h)
    }

    /// Projects `(x, y)`; returns `None` when the point maps to infinity.
    #[inline]
    pub fn project(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = self.h * Vector3::new(x, y, 1.0);
        if p[2].abs() < W_EPSILON || !p[2].is_finite() {
            return None;
        }
        Some([p[0] / p[2], p[1] / p[2]])
    }

    /// Euclidean distance between `project(src)` and `dst`; infinite if the
    /// source maps to infinity.
    #[inline]
    pub fn reprojection_error(&self, src: [f64; 2], dst: [f64; 2]) -> f64 {
        match self.project(src[0], src[1]) {
            Some(p) => {
                let dx = p[0] - dst[0];
                let dy = p[1] - dst[1];
                (dx * dx + dy * dy).sqrt()
            }
            None => f64::INFINITY,
        }
    }

    /// True if no point of the `width x height` source rectangle maps to infinity.
    ///
    /// The homogeneous `w` is affine in `(x, y)`, so it keeps one sign over the
    /// rectangle exactly when it has that sign at all four corners.
    pub fn is_finite_over(&self, width: usize, height: usize) -> bool {
        if self.is_singular() {
            return false;
        }
        let max_x = width.saturating_sub(1) as f64;
        let max_y = height.saturating_sub(1) as f64;
        let w = |x: f64, y: f64| self.h[(2, 0)] * x + self.h[(2, 1)] * y + self.h[(2, 2)];
        let corners = [w(0.0, 0.0), w(max_x, 0.0), w(0.0, max_y), w(max_x, max_y)];
        corners.iter().all(|&v| v > W_EPSILON) || corners.iter().all(|&v| v < -W_EPSILON)
    }

    /// Largest absolute entry-wise difference to `other` after both are
    /// normalized.
    pub fn max_abs_diff(&self, other: &Homography) -> f64 {
        (self.h - other.h).amax()
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}
