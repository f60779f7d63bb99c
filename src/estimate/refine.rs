//! Levenberg-Marquardt refinement of a homography over its inliers.
//!
//! Minimizes the sum of squared reprojection errors in the destination image.
//! Both point sets are Hartley-normalized first; the destination
//! normalization is an isotropic scaling, so the normalized cost is the pixel
//! cost times a constant and the minimizer is unchanged.

use crate::estimate::dlt::{apply, normalizing_transform};
use crate::estimate::homography::{Homography, W_EPSILON};
use nalgebra::{Matrix3, SMatrix, SVector};

type Params = SVector<f64, 8>;

fn to_params(h: &Matrix3<f64>) -> Params {
    Params::from_column_slice(&[
        h[(0, 0)],
        h[(0, 1)],
        h[(0, 2)],
        h[(1, 0)],
        h[(1, 1)],
        h[(1, 2)],
        h[(2, 0)],
        h[(2, 1)],
    ])
}

fn from_params(p: &Params) -> Matrix3<f64> {
    Matrix3::new(p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], 1.0)
}

fn cost(p: &Params, src: &[[f64; 2]], dst: &[[f64; 2]]) -> f64 {
    let mut total = 0.0;
    for (s, d) in src.iter().zip(dst) {
        let w = p[6] * s[0] + p[7] * s[1] + 1.0;
        if w.abs() < W_EPSILON {
            return f64::INFINITY;
        }
        let u = (p[0] * s[0] + p[1] * s[1] + p[2]) / w;
        let v = (p[3] * s[0] + p[4] * s[1] + p[5]) / w;
        total += (u - d[0]).powi(2) + (v - d[1]).powi(2);
    }
    total
}

/// Accumulates `J^T J` and `J^T r` for the current parameters.
fn normal_equations(
    p: &Params,
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> (SMatrix<f64, 8, 8>, Params) {
    let mut jtj = SMatrix::<f64, 8, 8>::zeros();
    let mut jtr = Params::zeros();
    for (s, d) in src.iter().zip(dst) {
        let (x, y) = (s[0], s[1]);
        let w = p[6] * x + p[7] * y + 1.0;
        let inv_w = 1.0 / w;
        let u = (p[0] * x + p[1] * y + p[2]) * inv_w;
        let v = (p[3] * x + p[4] * y + p[5]) * inv_w;

        let ju = Params::from_column_slice(&[
            x * inv_w,
            y * inv_w,
            inv_w,
            0.0,
            0.0,
            0.0,
            -u * x * inv_w,
            -u * y * inv_w,
        ]);
        let jv = Params::from_column_slice(&[
            0.0,
            0.0,
            0.0,
            x * inv_w,
            y * inv_w,
            inv_w,
            -v * x * inv_w,
            -v * y * inv_w,
        ]);

        jtj += ju * ju.transpose() + jv * jv.transpose();
        jtr += ju * (u - d[0]) + jv * (v - d[1]);
    }
    (jtj, jtr)
}

/// Refines `h` so that it better maps `src` onto `dst`.
///
/// Returns `h` unchanged when fewer than four pairs are given or when no step
/// reduces the cost.
pub fn refine_homography(
    h: &Homography,
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    max_iterations: usize,
) -> Homography {
    if src.len() < 4 || src.len() != dst.len() || max_iterations == 0 {
        return *h;
    }

    let t_src = normalizing_transform(src);
    let t_dst = normalizing_transform(dst);
    let (Some(t_src_inv), Some(t_dst_inv)) = (t_src.try_inverse(), t_dst.try_inverse()) else {
        return *h;
    };
    let src_n: Vec<[f64; 2]> = src.iter().map(|&p| apply(&t_src, p)).collect();
    let dst_n: Vec<[f64; 2]> = dst.iter().map(|&p| apply(&t_dst, p)).collect();

    let h_n = t_dst * h.matrix() * t_src_inv;
    if h_n[(2, 2)].abs() < W_EPSILON {
        return *h;
    }
    let mut params = to_params(&(h_n / h_n[(2, 2)]));
    let mut current = cost(&params, &src_n, &dst_n);
    if !current.is_finite() {
        return *h;
    }

    let mut lambda = 1e-3;
    for _ in 0..max_iterations {
        let (jtj, jtr) = normal_equations(&params, &src_n, &dst_n);
        let mut improved = false;
        while lambda < 1e10 {
            let mut damped = jtj;
            for i in 0..8 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }
            let Some(step) = damped.lu().solve(&(-jtr)) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = params + step;
            let candidate_cost = cost(&candidate, &src_n, &dst_n);
            if candidate_cost < current {
                let gain = current - candidate_cost;
                params = candidate;
                current = candidate_cost;
                lambda = (lambda * 0.1).max(1e-12);
                improved = gain > 1e-15 * (1.0 + current);
                break;
            }
            lambda *= 10.0;
        }
        if !improved {
            break;
        }
    }

    Homography::new(t_dst_inv * from_params(&params) * t_src)
}

#[cfg(test)]
mod tests {
    use super::refine_homography;
    use crate::estimate::homography::Homography;

    #[test]
    fn refinement_reduces_reprojection_error() {
        let truth = Homography::from_rows([
            [1.05, 0.08, 12.0],
            [-0.06, 0.97, 7.0],
            [1e-4, -5e-5, 1.0],
        ]);
        let mut src = Vec::new();
        for j in 0..5 {
            for i in 0..5 {
                src.push([i as f64 * 40.0, j as f64 * 35.0]);
            }
        }
        let dst: Vec<[f64; 2]> = src
            .iter()
            .map(|p| truth.project(p[0], p[1]).unwrap())
            .collect();

        let rows = truth.to_rows();
        let start = Homography::from_rows([
            [rows[0][0] + 0.01, rows[0][1], rows[0][2] + 1.5],
            [rows[1][0], rows[1][1] - 0.01, rows[1][2] - 1.0],
            [rows[2][0], rows[2][1], 1.0],
        ]);
        let err = |h: &Homography| -> f64 {
            src.iter()
                .zip(&dst)
                .map(|(s, d)| h.reprojection_error(*s, *d))
                .sum::<f64>()
        };

        let refined = refine_homography(&start, &src, &dst, 20);
        assert!(err(&refined) < err(&start) * 1e-3);
        assert!(err(&refined) < 1e-4);
    }
}
