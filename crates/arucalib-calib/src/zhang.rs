//! Zhang's closed-form intrinsics from plane homographies.
//!
//! Homographies are first mapped into a normalized pixel frame (origin at the
//! image centre, unit ~ half the image size) so the linear system is well
//! scaled; the recovered matrix is mapped back afterwards.

use crate::UnderdeterminedReason;
use arucalib_core::CameraIntrinsics;
use nalgebra::{DMatrix, Matrix3, SVector};

/// `v_ij(H)` from Zhang's paper, for columns `i`, `j` of `H`.
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Pixel normalization for an image of `size`: `p_n = T p`.
pub(crate) fn normalization(size: (u32, u32)) -> Matrix3<f64> {
    let (w, h) = (size.0 as f64, size.1 as f64);
    let s = 0.5 * (w + h);
    Matrix3::new(
        1.0 / s, 0.0, -0.5 * w / s, //
        0.0, 1.0 / s, -0.5 * h / s, //
        0.0, 0.0, 1.0,
    )
}

/// Solution of the closed-form step.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ZhangEstimate {
    pub intrinsics: CameraIntrinsics,
    /// Second-smallest over largest singular value of the constraint matrix.
    pub singular_ratio: f64,
}

/// Estimate intrinsics from plane-to-image homographies.
///
/// With `fix_skew` the image axes are assumed orthogonal (`B12 = 0`), which
/// leaves five unknowns and makes two views sufficient; otherwise three
/// views are needed.
pub(crate) fn intrinsics_from_homographies(
    homographies: &[Matrix3<f64>],
    image_size: (u32, u32),
    fix_skew: bool,
    min_singular_ratio: f64,
) -> Result<ZhangEstimate, UnderdeterminedReason> {
    let t = normalization(image_size);
    let t_inv = t.try_inverse().ok_or(UnderdeterminedReason::NonPhysical)?;

    // Columns of the full 6-vector kept in the system.
    let cols: &[usize] = if fix_skew {
        &[0, 2, 3, 4, 5]
    } else {
        &[0, 1, 2, 3, 4, 5]
    };
    let n = cols.len();
    let rows = (2 * homographies.len()).max(n);
    let mut v = DMatrix::<f64>::zeros(rows, n);

    for (k, h) in homographies.iter().enumerate() {
        let hn = t * h;
        let hn = hn / hn.column(2).norm().max(f64::MIN_POSITIVE);
        let v12 = v_ij(&hn, 0, 1);
        let d = v_ij(&hn, 0, 0) - v_ij(&hn, 1, 1);
        for (c, &src) in cols.iter().enumerate() {
            v[(2 * k, c)] = v12[src];
            v[(2 * k + 1, c)] = d[src];
        }
    }

    let svd = v.svd(false, true);
    let v_t = svd.v_t.ok_or(UnderdeterminedReason::NonPhysical)?;
    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[a].total_cmp(&svd.singular_values[b]));

    let largest = svd.singular_values[order[order.len() - 1]];
    let second = svd.singular_values[order[1]];
    let singular_ratio = if largest > 0.0 { second / largest } else { 0.0 };
    if !singular_ratio.is_finite() || singular_ratio < min_singular_ratio {
        return Err(UnderdeterminedReason::DegeneratePoses { singular_ratio });
    }

    let null = v_t.row(order[0]);
    let mut b = [0.0f64; 6];
    for (c, &dst) in cols.iter().enumerate() {
        b[dst] = null[c];
    }
    // B = K^-T K^-1 is positive definite; fix the sign of the null vector.
    if b[0] < 0.0 {
        b.iter_mut().for_each(|x| *x = -*x);
    }
    let [b11, b12, b22, b13, b23, b33] = b;

    let denom = b11 * b22 - b12 * b12;
    if b11 <= 0.0 || denom <= 0.0 {
        return Err(UnderdeterminedReason::NonPhysical);
    }
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda <= 0.0 {
        return Err(UnderdeterminedReason::NonPhysical);
    }
    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    let kn = Matrix3::new(
        alpha, gamma, u0, //
        0.0, beta, v0, //
        0.0, 0.0, 1.0,
    );
    let k = t_inv * kn;
    let intrinsics = CameraIntrinsics {
        fx: k[(0, 0)],
        fy: k[(1, 1)],
        cx: k[(0, 2)],
        cy: k[(1, 2)],
        skew: if fix_skew { 0.0 } else { k[(0, 1)] },
    };
    if !intrinsics.is_physical() {
        return Err(UnderdeterminedReason::NonPhysical);
    }

    Ok(ZhangEstimate {
        intrinsics,
        singular_ratio,
    })
}
