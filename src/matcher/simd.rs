//! SIMD descriptor distances using the `wide` crate.
//!
//! Processes 8 descriptor components at a time with `f32x8`; SIFT's
//! 128-dimensional descriptors split evenly into 16 lanes-wide steps.

use wide::f32x8;

const LANES: usize = 8;

#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

#[inline]
fn hsum(v: f32x8) -> f32 {
    v.to_array().iter().sum()
}

/// Squared Euclidean distance between two equal-length vectors.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let simd_end = len / LANES * LANES;

    let mut acc = f32x8::ZERO;
    let mut i = 0;
    while i < simd_end {
        let d = load_f32x8(&a[i..]) - load_f32x8(&b[i..]);
        acc += d * d;
        i += LANES;
    }

    let mut tail = 0.0f32;
    while i < len {
        let d = a[i] - b[i];
        tail += d * d;
        i += 1;
    }

    hsum(acc) + tail
}

#[cfg(test)]
mod tests {
    use super::squared_l2;
    use crate::matcher::knn::squared_l2_scalar;

    #[test]
    fn simd_matches_scalar() {
        let a: Vec<f32> = (0..37).map(|i| (i as f32 * 0.37).sin()).collect();
        let b: Vec<f32> = (0..37).map(|i| (i as f32 * 0.11).cos()).collect();
        let simd = squared_l2(&a, &b);
        let scalar = squared_l2_scalar(&a, &b);
        assert!((simd - scalar).abs() < 1e-4);
    }
}
