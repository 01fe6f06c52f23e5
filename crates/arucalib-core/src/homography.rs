use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

/// Plane projective transform, `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.apply_f64(Point2::new(p.x as f64, p.y as f64));
        Point2::new(q.x as f32, q.y as f32)
    }

    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Hartley conditioning: move the centroid to the origin and scale the mean
/// distance to sqrt(2).
fn conditioning_transform<'a>(pts: impl Iterator<Item = &'a Point2<f64>> + Clone) -> Matrix3<f64> {
    let mut n = 0.0;
    let (mut cx, mut cy) = (0.0, 0.0);
    for p in pts.clone() {
        cx += p.x;
        cy += p.y;
        n += 1.0;
    }
    cx /= n;
    cy /= n;

    let mean_dist = pts
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

#[inline]
fn transform(t: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    let v = t * Vector3::new(p.x, p.y, 1.0);
    Point2::new(v[0], v[1])
}

/// Undo conditioning and scale so that `H[2,2] = 1`.
fn finish(hn: Matrix3<f64>, t_src: &Matrix3<f64>, t_dst: &Matrix3<f64>) -> Option<Homography> {
    let h = t_dst.try_inverse()? * hn * t_src;
    let s = h[(2, 2)];
    if s.abs() < 1e-12 || !h.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(Homography::new(h / s))
}

/// Estimate `H` with `dst ~ H * src` from four or more correspondences.
///
/// Uses the normalized DLT (smallest right singular vector of the stacked
/// constraint matrix). Returns `None` for mismatched inputs, fewer than four
/// points or a degenerate configuration.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    let n = src.len();
    if n != dst.len() || n < 4 {
        return None;
    }

    let t_src = conditioning_transform(src.iter());
    let t_dst = conditioning_transform(dst.iter());

    // At least 9 rows so that SVD exposes the full right null space.
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let p = transform(&t_src, s);
        let q = transform(&t_dst, d);
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);

        let r = 2 * k;
        a[(r, 0)] = -x;
        a[(r, 1)] = -y;
        a[(r, 2)] = -1.0;
        a[(r, 6)] = u * x;
        a[(r, 7)] = u * y;
        a[(r, 8)] = u;

        a[(r + 1, 3)] = -x;
        a[(r + 1, 4)] = -y;
        a[(r + 1, 5)] = -1.0;
        a[(r + 1, 6)] = v * x;
        a[(r + 1, 7)] = v * y;
        a[(r + 1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let vt = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = vt.row(min_idx);
    let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    finish(hn, &t_src, &t_dst)
}

/// Compute `H` with `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. This is the
/// cheap path used per marker candidate: an 8x8 linear solve with `h33 = 1`.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let src = src.map(|p| Point2::new(p.x as f64, p.y as f64));
    let dst = dst.map(|p| Point2::new(p.x as f64, p.y as f64));
    let t_src = conditioning_transform(src.iter());
    let t_dst = conditioning_transform(dst.iter());

    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for k in 0..4 {
        let p = transform(&t_src, &src[k]);
        let q = transform(&t_dst, &dst[k]);

        let r0 = 2 * k;
        a[(r0, 0)] = p.x;
        a[(r0, 1)] = p.y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -q.x * p.x;
        a[(r0, 7)] = -q.x * p.y;
        b[r0] = q.x;

        let r1 = r0 + 1;
        a[(r1, 3)] = p.x;
        a[(r1, 4)] = p.y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -q.y * p.x;
        a[(r1, 7)] = -q.y * p.y;
        b[r1] = q.y;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    finish(hn, &t_src, &t_dst)
}
