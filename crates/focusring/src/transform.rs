//! Eye-to-screen affine estimation via normalized linear least squares.
//!
//! Provides:
//! - [`AffineTransform`]: the 6-coefficient map fitted by calibration.
//! - [`fit_affine_lsq`]: per-axis 3-parameter least-squares fit from point
//!   correspondences.
//! - Inversion and determinant helpers used by the degeneracy gates.

use nalgebra::{Matrix3, Vector3};

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AffineFitError {
    TooFewPoints { needed: usize, got: usize },
    MismatchedLengths { src: usize, dst: usize },
    NumericalFailure(String),
}

impl std::fmt::Display for AffineFitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few correspondences: need {}, got {}", needed, got)
            }
            Self::MismatchedLengths { src, dst } => {
                write!(f, "mismatched correspondence lists: {} vs {}", src, dst)
            }
            Self::NumericalFailure(msg) => write!(f, "numerical failure: {}", msg),
        }
    }
}

impl std::error::Error for AffineFitError {}

// ── Transform ────────────────────────────────────────────────────────────

/// 2D affine map `(px, py) -> (a·px + b·py + c, d·px + e·py + f)`.
///
/// Fitted once per calibration and immutable afterwards; recalibration
/// replaces the whole value.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    /// Identity map. Only used as a building block; calibration never falls
    /// back to it silently.
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 0.0,
            e: 1.0,
            f: 0.0,
        }
    }

    /// Apply the map to a point.
    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        [
            self.a * p[0] + self.b * p[1] + self.c,
            self.d * p[0] + self.e * p[1] + self.f,
        ]
    }

    /// Determinant of the linear 2x2 part. Near-zero means the fit collapsed
    /// onto a line or point and must be rejected.
    pub fn linear_det(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Inverse map, if the linear part is invertible.
    pub fn invert(&self) -> Option<AffineTransform> {
        let det = self.linear_det();
        if det.abs() < 1e-12 {
            return None;
        }
        let ia = self.e / det;
        let ib = -self.b / det;
        let id = -self.d / det;
        let ie = self.a / det;
        Some(AffineTransform {
            a: ia,
            b: ib,
            c: -(ia * self.c + ib * self.f),
            d: id,
            e: ie,
            f: -(id * self.c + ie * self.f),
        })
    }

    fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self {
            a: m[(0, 0)],
            b: m[(0, 1)],
            c: m[(0, 2)],
            d: m[(1, 0)],
            e: m[(1, 1)],
            f: m[(1, 2)],
        }
    }
}

// ── Normalization ────────────────────────────────────────────────────────

/// Compute a normalizing transform: translate centroid to origin, scale so
/// mean distance from origin is sqrt(2). Conditions the normal equations
/// when pupil coordinates span a few pixels and screen coordinates span
/// thousands.
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let normalized: Vec<[f64; 2]> = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

// ── Least-squares fit ────────────────────────────────────────────────────

/// Fit an affine map from >= 3 point correspondences.
///
/// `src`: pupil coordinates (eye-image pixels).
/// `dst`: screen coordinates the user was fixating.
///
/// Each output axis is an independent 3-parameter linear model over the
/// basis `[x, y, 1]`, solved through its normal equations. With exactly 3
/// non-collinear points the solution is exact; with 5 calibration targets
/// it is the least-squares optimum.
pub fn fit_affine_lsq(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<AffineTransform, AffineFitError> {
    let n = src.len();
    if src.len() != dst.len() {
        return Err(AffineFitError::MismatchedLengths {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if n < 3 {
        return Err(AffineFitError::TooFewPoints { needed: 3, got: n });
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    // Normal equations over the [x, y, 1] basis, shared by both axes:
    //   M = sum(phi * phi^T),  rhs_u = sum(phi * u),  rhs_v = sum(phi * v)
    let mut m = Matrix3::<f64>::zeros();
    let mut rhs_u = Vector3::<f64>::zeros();
    let mut rhs_v = Vector3::<f64>::zeros();
    for i in 0..n {
        let phi = Vector3::new(src_n[i][0], src_n[i][1], 1.0);
        m += phi * phi.transpose();
        rhs_u += phi * dst_n[i][0];
        rhs_v += phi * dst_n[i][1];
    }

    // In normalized coordinates a healthy point spread gives a determinant
    // of order 1; collinear or coincident points collapse it.
    if m.determinant().abs() < 1e-10 {
        return Err(AffineFitError::NumericalFailure(
            "ill-conditioned normal matrix".into(),
        ));
    }

    let lu = m.lu();
    let row_u = lu
        .solve(&rhs_u)
        .ok_or_else(|| AffineFitError::NumericalFailure("singular normal matrix".into()))?;
    let row_v = lu
        .solve(&rhs_v)
        .ok_or_else(|| AffineFitError::NumericalFailure("singular normal matrix".into()))?;

    let a_norm = Matrix3::new(
        row_u[0], row_u[1], row_u[2],
        row_v[0], row_v[1], row_v[2],
        0.0, 0.0, 1.0,
    );

    // Denormalize: A = T_dst^-1 * A_norm * T_src
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| AffineFitError::NumericalFailure("T_dst not invertible".into()))?;
    let a = t_dst_inv * a_norm * t_src;

    if a.iter().any(|v| !v.is_finite()) {
        return Err(AffineFitError::NumericalFailure(
            "non-finite coefficients".into(),
        ));
    }

    Ok(AffineTransform::from_matrix(&a))
}

/// RMS residual of a fitted transform over a correspondence set.
pub fn rms_residual(t: &AffineTransform, src: &[[f64; 2]], dst: &[[f64; 2]]) -> f64 {
    if src.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = src
        .iter()
        .zip(dst.iter())
        .map(|(s, d)| {
            let p = t.apply(*s);
            let dx = p[0] - d[0];
            let dy = p[1] - d[1];
            dx * dx + dy * dy
        })
        .sum();
    (sum_sq / src.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ground_truth() -> AffineTransform {
        AffineTransform {
            a: 24.0,
            b: -1.5,
            c: 120.0,
            d: 0.8,
            e: 18.0,
            f: -40.0,
        }
    }

    fn well_separated_pupils() -> Vec<[f64; 2]> {
        // Center plus four corners of a plausible pupil excursion range.
        vec![
            [60.0, 40.0],
            [20.0, 12.0],
            [100.0, 14.0],
            [98.0, 66.0],
            [22.0, 64.0],
        ]
    }

    #[test]
    fn fit_recovers_ground_truth_exactly() {
        let t = ground_truth();
        let src = well_separated_pupils();
        let dst: Vec<[f64; 2]> = src.iter().map(|p| t.apply(*p)).collect();

        let fitted = fit_affine_lsq(&src, &dst).expect("fit should succeed");
        assert_relative_eq!(fitted.a, t.a, epsilon = 1e-9);
        assert_relative_eq!(fitted.b, t.b, epsilon = 1e-9);
        assert_relative_eq!(fitted.c, t.c, epsilon = 1e-6);
        assert_relative_eq!(fitted.d, t.d, epsilon = 1e-9);
        assert_relative_eq!(fitted.e, t.e, epsilon = 1e-9);
        assert_relative_eq!(fitted.f, t.f, epsilon = 1e-6);
    }

    #[test]
    fn fit_is_least_squares_under_noise() {
        let t = ground_truth();
        let src = well_separated_pupils();
        // Perturb destinations by a fixed pattern; the fit should stay close.
        let dst: Vec<[f64; 2]> = src
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let q = t.apply(*p);
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                [q[0] + sign * 2.0, q[1] - sign * 2.0]
            })
            .collect();

        let fitted = fit_affine_lsq(&src, &dst).expect("fit should succeed");
        for (s, d) in src.iter().zip(dst.iter()) {
            let p = fitted.apply(*s);
            assert!((p[0] - d[0]).abs() < 5.0);
            assert!((p[1] - d[1]).abs() < 5.0);
        }
        assert!(rms_residual(&fitted, &src, &dst) < 3.0);
    }

    #[test]
    fn too_few_points_rejected() {
        let src = vec![[0.0, 0.0], [1.0, 1.0]];
        let dst = src.clone();
        assert_eq!(
            fit_affine_lsq(&src, &dst),
            Err(AffineFitError::TooFewPoints { needed: 3, got: 2 })
        );
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let src = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]];
        let dst = vec![[0.0, 0.0], [1.0, 1.0]];
        assert!(matches!(
            fit_affine_lsq(&src, &dst),
            Err(AffineFitError::MismatchedLengths { .. })
        ));
    }

    #[test]
    fn collinear_points_fail() {
        // All pupils on a line: the normal matrix is singular.
        let src: Vec<[f64; 2]> = (0..5).map(|i| [i as f64, 2.0 * i as f64]).collect();
        let dst: Vec<[f64; 2]> = (0..5).map(|i| [10.0 * i as f64, 5.0]).collect();
        assert!(matches!(
            fit_affine_lsq(&src, &dst),
            Err(AffineFitError::NumericalFailure(_))
        ));
    }

    #[test]
    fn coincident_points_fail() {
        let src = vec![[4.0, 4.0]; 5];
        let dst = vec![[100.0, 100.0]; 5];
        assert!(matches!(
            fit_affine_lsq(&src, &dst),
            Err(AffineFitError::NumericalFailure(_))
        ));
    }

    #[test]
    fn invert_round_trips() {
        let t = ground_truth();
        let inv = t.invert().expect("invertible");
        let p = [37.0, 21.0];
        let back = inv.apply(t.apply(p));
        assert_relative_eq!(back[0], p[0], epsilon = 1e-9);
        assert_relative_eq!(back[1], p[1], epsilon = 1e-9);
    }

    #[test]
    fn identity_behaves() {
        let id = AffineTransform::identity();
        assert_eq!(id.apply([3.0, 4.0]), [3.0, 4.0]);
        assert_relative_eq!(id.linear_det(), 1.0);
    }
}
