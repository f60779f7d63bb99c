//! Brute-force two-nearest-neighbour search.

use crate::features::Descriptors;
use crate::matcher::DistanceMetric;

/// Nearest and second-nearest train descriptors for one query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoNearest {
    /// Index and distance of the closest train descriptor.
    pub best: Option<(usize, f32)>,
    /// Distance of the runner-up, if the train set has at least two entries.
    pub second: Option<f32>,
}

impl TwoNearest {
    const EMPTY: Self = Self {
        best: None,
        second: None,
    };

    #[inline]
    fn offer(&mut self, idx: usize, dist: f32) {
        match self.best {
            Some((_, best)) if dist >= best => {
                if self.second.map_or(true, |second| dist < second) {
                    self.second = Some(dist);
                }
            }
            Some((_, best)) => {
                self.second = Some(best);
                self.best = Some((idx, dist));
            }
            None => self.best = Some((idx, dist)),
        }
    }
}

/// Euclidean distance between two equal-length vectors.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(feature = "simd")]
    {
        crate::matcher::simd::squared_l2(a, b).sqrt()
    }
    #[cfg(not(feature = "simd"))]
    {
        squared_l2_scalar(a, b).sqrt()
    }
}

#[cfg(any(test, not(feature = "simd")))]
#[inline]
pub(crate) fn squared_l2_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Bit-level Hamming distance, treating each component as one packed byte.
#[inline]
pub fn hamming(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| ((x as u8) ^ (y as u8)).count_ones())
        .sum::<u32>() as f32
}

/// Distance between two descriptors under `metric`.
#[inline]
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Euclidean => euclidean(a, b),
        DistanceMetric::Hamming => hamming(a, b),
    }
}

/// Finds the two nearest train descriptors for `query`.
///
/// Ties keep the lowest train index as the nearest neighbour.
pub fn two_nearest(query: &[f32], train: &Descriptors, metric: DistanceMetric) -> TwoNearest {
    let mut result = TwoNearest::EMPTY;
    for (idx, candidate) in train.rows().enumerate() {
        result.offer(idx, distance(metric, query, candidate));
    }
    result
}
