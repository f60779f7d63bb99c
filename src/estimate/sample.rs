//! Minimal-sample drawing with degeneracy rejection.

use crate::util::math::cross2;
use rand::Rng;

/// Size of a minimal homography sample.
pub const SAMPLE_SIZE: usize = 4;

/// Redraws allowed per trial before the trial is abandoned.
pub const MAX_RESAMPLE_ATTEMPTS: usize = 100;

/// Relative area below which three points count as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-6;

/// True if the four points contain a duplicate or a collinear triple.
///
/// The tolerance scales with the squared extent of the points so the test is
/// independent of the coordinate units.
pub fn is_degenerate(pts: &[[f64; 2]; SAMPLE_SIZE]) -> bool {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in pts {
        min_x = min_x.min(p[0]);
        min_y = min_y.min(p[1]);
        max_x = max_x.max(p[0]);
        max_y = max_y.max(p[1]);
    }
    let extent = (max_x - min_x).max(max_y - min_y);
    if !extent.is_finite() || extent <= 0.0 {
        return true;
    }
    let tol = COLLINEAR_TOLERANCE * extent * extent;

    for i in 0..SAMPLE_SIZE {
        for j in (i + 1)..SAMPLE_SIZE {
            if pts[i] == pts[j] {
                return true;
            }
            for k in (j + 1)..SAMPLE_SIZE {
                if cross2(pts[i], pts[j], pts[k]).abs() <= tol {
                    return true;
                }
            }
        }
    }
    false
}

/// Draws four distinct correspondence indices whose points are non-degenerate
/// in both images. Returns `None` after [`MAX_RESAMPLE_ATTEMPTS`] failed draws.
pub fn draw_sample<R: Rng + ?Sized>(
    rng: &mut R,
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Option<[usize; SAMPLE_SIZE]> {
    let n = src.len().min(dst.len());
    if n < SAMPLE_SIZE {
        return None;
    }
    for _ in 0..MAX_RESAMPLE_ATTEMPTS {
        let drawn = rand::seq::index::sample(rng, n, SAMPLE_SIZE);
        let mut idx = [0usize; SAMPLE_SIZE];
        for (slot, i) in idx.iter_mut().zip(drawn.iter()) {
            *slot = i;
        }
        let s = idx.map(|i| src[i]);
        let d = idx.map(|i| dst[i]);
        if !is_degenerate(&s) && !is_degenerate(&d) {
            return Some(idx);
        }
    }
    None
}
