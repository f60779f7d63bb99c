//! Diagnostic rendering: side-by-side views and match overlays.
//!
//! These helpers produce ordinary images for a display or file sink; they
//! play no part in the alignment result.

use crate::features::Keypoint;
use crate::image::{ImageView, OwnedImage};
use crate::matcher::Correspondence;
use crate::util::{AlignError, AlignResult};

/// Marker colour for keypoints.
pub const KEYPOINT_COLOR: [u8; 3] = [255, 0, 0];
/// Line colour for correspondences.
pub const MATCH_COLOR: [u8; 3] = [0, 255, 0];

const MARKER_RADIUS: f32 = 6.0;

/// Places `a` and `b` side by side. Both must share height and channel count.
pub fn hconcat(a: ImageView<'_, u8>, b: ImageView<'_, u8>) -> AlignResult<OwnedImage> {
    if a.height() != b.height() || a.channels() != b.channels() {
        return Err(AlignError::ShapeMismatch {
            expected: (b.width(), a.height(), a.channels()),
            got: b.shape(),
        });
    }
    let width = a.width() + b.width();
    let height = a.height();
    let channels = a.channels();
    let mut data = Vec::with_capacity(width * height * channels);
    for y in 0..height {
        let (Some(row_a), Some(row_b)) = (a.row(y), b.row(y)) else {
            return Err(AlignError::IndexOutOfBounds {
                index: y,
                len: height,
                context: "row",
            });
        };
        data.extend_from_slice(row_a);
        data.extend_from_slice(row_b);
    }
    OwnedImage::new(data, width, height, channels)
}

fn to_rgb(src: &OwnedImage) -> OwnedImage {
    let channels = src.channels();
    let rgb: Vec<u8> = match channels {
        3 => src.data().to_vec(),
        1 | 2 => src
            .data()
            .chunks_exact(channels)
            .flat_map(|px| [px[0], px[0], px[0]])
            .collect(),
        _ => src
            .data()
            .chunks_exact(channels)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
    };
    OwnedImage::from_parts(rgb, src.width(), src.height(), 3)
}

struct Canvas {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Canvas {
    fn put(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as usize * self.width + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&color);
    }

    fn ring(&mut self, cx: f32, cy: f32, radius: f32, color: [u8; 3]) {
        let r = radius.ceil() + 1.0;
        if cx < -r || cy < -r || cx > self.width as f32 + r || cy > self.height as f32 + r {
            return;
        }
        let r = r as i64;
        let (icx, icy) = (cx.round() as i64, cy.round() as i64);
        for dy in -r..=r {
            for dx in -r..=r {
                let dist = ((dx * dx + dy * dy) as f32).sqrt();
                if (dist - radius).abs() <= 1.0 {
                    self.put(icx + dx, icy + dy, color);
                }
            }
        }
    }

    /// Liang-Barsky clip of the segment to the pixel area; `None` if it misses.
    fn clip(&self, from: (f32, f32), to: (f32, f32)) -> Option<((f32, f32), (f32, f32))> {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        if !(dx.is_finite() && dy.is_finite()) {
            return None;
        }
        let (max_x, max_y) = (self.width as f32 - 0.5, self.height as f32 - 0.5);
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;
        for (p, q) in [
            (-dx, from.0 + 0.5),
            (dx, max_x - from.0),
            (-dy, from.1 + 0.5),
            (dy, max_y - from.1),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                t0 = t0.max(t);
            } else {
                t1 = t1.min(t);
            }
            if t0 > t1 {
                return None;
            }
        }
        Some((
            (from.0 + t0 * dx, from.1 + t0 * dy),
            (from.0 + t1 * dx, from.1 + t1 * dy),
        ))
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: [u8; 3]) {
        let Some((from, to)) = self.clip(from, to) else {
            return;
        };
        let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
        let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

/// Renders `a` and `b` side by side as RGB, circling every matched keypoint
/// and joining each correspondence with a line.
pub fn draw_matches(
    a: ImageView<'_, u8>,
    b: ImageView<'_, u8>,
    kps_a: &[Keypoint],
    kps_b: &[Keypoint],
    matches: &[Correspondence],
) -> AlignResult<OwnedImage> {
    let side = hconcat(a, b)?;
    let rgb = to_rgb(&side);
    let offset = a.width() as f32;
    let mut canvas = Canvas {
        width: rgb.width(),
        height: rgb.height(),
        data: rgb.into_vec(),
    };

    for m in matches {
        let pa = kps_a.get(m.query_idx).ok_or(AlignError::IndexOutOfBounds {
            index: m.query_idx,
            len: kps_a.len(),
            context: "query keypoint",
        })?;
        let pb = kps_b.get(m.train_idx).ok_or(AlignError::IndexOutOfBounds {
            index: m.train_idx,
            len: kps_b.len(),
            context: "train keypoint",
        })?;
        let right = (pb.x + offset, pb.y);
        canvas.ring(pa.x, pa.y, MARKER_RADIUS, KEYPOINT_COLOR);
        canvas.ring(right.0, right.1, MARKER_RADIUS, KEYPOINT_COLOR);
        canvas.line((pa.x, pa.y), right, MATCH_COLOR);
    }

    Ok(OwnedImage::from_parts(
        canvas.data,
        canvas.width,
        canvas.height,
        3,
    ))
}
