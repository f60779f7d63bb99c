//! Direct linear transform with Hartley normalization.
//!
//! Points are translated to their centroid and scaled so their mean distance
//! from the origin is `sqrt(2)` before the `2n x 9` system is built; the
//! solution is the right singular vector of the smallest singular value. With
//! exactly four pairs this is the unique interpolating homography; with more
//! it is the algebraic least-squares fit.

use crate::estimate::homography::Homography;
use crate::util::{AlignError, AlignResult};
use nalgebra::{DMatrix, Matrix3};

/// Similarity transform moving the centroid to the origin with mean radius sqrt(2).
pub(crate) fn normalizing_transform(pts: &[[f64; 2]]) -> Matrix3<f64> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

#[inline]
pub(crate) fn apply(t: &Matrix3<f64>, p: [f64; 2]) -> [f64; 2] {
    // Normalizing transforms are affine.
    [
        t[(0, 0)] * p[0] + t[(0, 2)],
        t[(1, 1)] * p[1] + t[(1, 2)],
    ]
}

/// Fits the homography mapping `src[i]` to `dst[i]` for `n >= 4` pairs.
pub fn fit_homography_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> AlignResult<Homography> {
    if src.len() != dst.len() {
        return Err(AlignError::InvalidInput {
            reason: "src and dst must have the same length",
        });
    }
    let n = src.len();
    if n < 4 {
        return Err(AlignError::InsufficientMatches { needed: 4, got: n });
    }

    let t_src = normalizing_transform(src);
    let t_dst = normalizing_transform(dst);

    // Thin SVD of a matrix with fewer than 9 rows drops the null vector, so
    // the minimal case gets a zero row appended.
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for i in 0..n {
        let [sx, sy] = apply(&t_src, src[i]);
        let [dx, dy] = apply(&t_dst, dst[i]);

        a[(2 * i, 0)] = sx;
        a[(2 * i, 1)] = sy;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i, 6)] = -dx * sx;
        a[(2 * i, 7)] = -dx * sy;
        a[(2 * i, 8)] = -dx;

        a[(2 * i + 1, 3)] = sx;
        a[(2 * i + 1, 4)] = sy;
        a[(2 * i + 1, 5)] = 1.0;
        a[(2 * i + 1, 6)] = -dy * sx;
        a[(2 * i + 1, 7)] = -dy * sy;
        a[(2 * i + 1, 8)] = -dy;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(AlignError::DegenerateTransform {
        reason: "svd did not converge",
    })?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(AlignError::DegenerateTransform {
            reason: "empty singular value set",
        })?;
    let h = v_t.row(min_idx);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse().ok_or(AlignError::DegenerateTransform {
        reason: "normalizing transform not invertible",
    })?;
    let h = t_dst_inv * h_norm * t_src;
    if h.iter().any(|v| !v.is_finite()) {
        return Err(AlignError::DegenerateTransform {
            reason: "non-finite homography",
        });
    }
    Ok(Homography::new(h))
}

#[cfg(test)]
mod tests {
    use super::fit_homography_dlt;
    use crate::estimate::homography::Homography;

    fn truth() -> Homography {
        Homography::from_rows([
            [0.9, -0.2, 30.0],
            [0.15, 1.1, -12.0],
            [2e-4, 1e-4, 1.0],
        ])
    }

    #[test]
    fn four_points_are_interpolated_exactly() {
        let h = truth();
        let src = [[0.0, 0.0], [120.0, 5.0], [110.0, 90.0], [-8.0, 100.0]];
        let dst: Vec<[f64; 2]> = src.iter().map(|p| h.project(p[0], p[1]).unwrap()).collect();
        let fit = fit_homography_dlt(&src, &dst).unwrap();
        assert!(fit.max_abs_diff(&h) < 1e-8, "{:?}", fit);
    }

    #[test]
    fn overdetermined_grid_recovers_transform() {
        let h = truth();
        let mut src = Vec::new();
        for j in 0..6 {
            for i in 0..6 {
                src.push([i as f64 * 37.0, j as f64 * 29.0]);
            }
        }
        let dst: Vec<[f64; 2]> = src.iter().map(|p| h.project(p[0], p[1]).unwrap()).collect();
        let fit = fit_homography_dlt(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert!(fit.reprojection_error(*s, *d) < 1e-6);
        }
    }

    #[test]
    fn too_few_points_fail() {
        let pts = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert!(fit_homography_dlt(&pts, &pts).is_err());
    }
}
