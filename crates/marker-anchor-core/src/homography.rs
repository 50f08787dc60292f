use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::PoseError;

/// Pivots smaller than this are treated as structurally zero and the column is skipped.
const PIVOT_EPS: f64 = 1e-8;
/// Row-elimination factors smaller than this are not applied.
const ELIMINATION_EPS: f64 = 1e-10;
/// Smallest magnitude accepted as a row's leading entry during read-back.
const LEAD_EPS: f64 = 1e-6;

/// Plane-to-image projective map, `p_img ~ H * p_plane`, with `h33 = 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    /// Column `i` of `H` (`h1`, `h2`, `h3` for `i = 0, 1, 2`).
    #[inline]
    pub fn column(&self, i: usize) -> Vector3<f64> {
        self.h.column(i).into_owned()
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Corners of an axis-aligned square of side `side` with its origin at corner 0:
/// `(0,0), (S,0), (S,S), (0,S)`.
pub fn square_plane_points(side: f64) -> [Point2<f64>; 4] {
    [
        Point2::new(0.0, 0.0),
        Point2::new(side, 0.0),
        Point2::new(side, side),
        Point2::new(0.0, side),
    ]
}

/// Estimate `H` such that `image ~ H * plane` from the first 4 correspondences.
///
/// Unknowns are `[h11 h12 h13 h21 h22 h23 h31 h32]` with `h33 = 1`. Each
/// correspondence `(X, Y) -> (u, v)` contributes:
///
/// ```text
/// h11 X + h12 Y + h13 - u h31 X - u h32 Y = u
/// h21 X + h22 Y + h23 - v h31 X - v h32 Y = v
/// ```
///
/// Near-singular columns are skipped rather than reported, so marginal
/// geometry still yields a best-effort matrix. `SingularSystem` is returned
/// only when fewer than 4 correspondences are supplied, the slices disagree
/// in length, or the result is not finite.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "trace", skip(plane, image), fields(n = plane.len()))
)]
pub fn estimate_homography(
    plane: &[Point2<f64>],
    image: &[Point2<f64>],
) -> Result<Homography, PoseError> {
    if plane.len() != image.len() || plane.len() < 4 {
        return Err(PoseError::SingularSystem);
    }

    // Augmented [A | b].
    let mut m = SMatrix::<f64, 8, 9>::zeros();
    for k in 0..4 {
        let (x, y) = (plane[k].x, plane[k].y);
        let (u, v) = (image[k].x, image[k].y);

        let r0 = 2 * k;
        m[(r0, 0)] = x;
        m[(r0, 1)] = y;
        m[(r0, 2)] = 1.0;
        m[(r0, 6)] = -u * x;
        m[(r0, 7)] = -u * y;
        m[(r0, 8)] = u;

        let r1 = 2 * k + 1;
        m[(r1, 3)] = x;
        m[(r1, 4)] = y;
        m[(r1, 5)] = 1.0;
        m[(r1, 6)] = -v * x;
        m[(r1, 7)] = -v * y;
        m[(r1, 8)] = v;
    }

    let x = gauss_jordan(&mut m);
    if !x.iter().all(|v| v.is_finite()) {
        return Err(PoseError::SingularSystem);
    }

    Ok(Homography::new(Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    )))
}

/// Reduce `[A | b]` in place with partial pivoting and read the solution back
/// from each row's leading entry. Unresolved unknowns stay at zero.
fn gauss_jordan(m: &mut SMatrix<f64, 8, 9>) -> SVector<f64, 8> {
    const ROWS: usize = 8;
    const COLS: usize = 9;

    let mut r = 0;
    for c in 0..COLS - 1 {
        if r >= ROWS {
            break;
        }

        let mut pivot = r;
        for i in r + 1..ROWS {
            if m[(i, c)].abs() > m[(pivot, c)].abs() {
                pivot = i;
            }
        }
        if m[(pivot, c)].abs() < PIVOT_EPS {
            continue;
        }
        if pivot != r {
            m.swap_rows(pivot, r);
        }

        let val = m[(r, c)];
        for j in c..COLS {
            m[(r, j)] /= val;
        }

        for i in 0..ROWS {
            if i == r {
                continue;
            }
            let f = m[(i, c)];
            if f.abs() < ELIMINATION_EPS {
                continue;
            }
            for j in c..COLS {
                m[(i, j)] -= f * m[(r, j)];
            }
        }
        r += 1;
    }

    let mut x = SVector::<f64, 8>::zeros();
    for i in 0..ROWS {
        if let Some(lead) = (0..COLS - 1).find(|&j| m[(i, j)].abs() > LEAD_EPS) {
            x[lead] = m[(i, COLS - 1)];
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(320.0, 200.0),
        ] {
            assert_close(inv.apply(h.apply(p)), p, 1e-9);
        }
    }

    #[test]
    fn recovers_ground_truth_from_square_corners() {
        let ground_truth = Homography::new(Matrix3::new(
            520.0, 35.0, 300.0, //
            -20.0, 560.0, 210.0, //
            0.05, -0.08, 1.0,
        ));
        let plane = square_plane_points(0.12);
        let image = plane.map(|p| ground_truth.apply(p));

        let recovered = estimate_homography(&plane, &image).expect("recoverable");
        assert_abs_diff_eq!(recovered.h, ground_truth.h, epsilon = 1e-4);
    }

    #[test]
    fn recovers_strong_perspective() {
        let ground_truth = Homography::from_array([
            [1500.0, -400.0, 120.0],
            [300.0, 1100.0, 80.0],
            [2.5, -1.75, 1.0],
        ]);
        let plane = square_plane_points(0.2);
        let image = plane.map(|p| ground_truth.apply(p));

        let recovered = estimate_homography(&plane, &image).expect("recoverable");
        assert_abs_diff_eq!(recovered.h, ground_truth.h, epsilon = 1e-4);
        assert_eq!(recovered.to_array()[2][2], 1.0);
    }

    #[test]
    fn too_few_or_mismatched_points_fail() {
        let plane = square_plane_points(1.0);
        let image = [Point2::new(1.0, 1.0); 3];
        assert_eq!(
            estimate_homography(&plane, &image),
            Err(PoseError::SingularSystem)
        );
        assert_eq!(
            estimate_homography(&plane[..3], &image),
            Err(PoseError::SingularSystem)
        );
    }

    #[test]
    fn collapsed_plane_is_best_effort() {
        let plane = [Point2::new(0.0, 0.0); 4];
        let image = [
            Point2::new(10.0, 20.0),
            Point2::new(30.0, 20.0),
            Point2::new(30.0, 40.0),
            Point2::new(10.0, 40.0),
        ];
        let h = estimate_homography(&plane, &image).expect("skips singular columns");
        assert!(h.h.iter().all(|v| v.is_finite()));
        assert_eq!(h.h[(2, 2)], 1.0);
        assert_eq!(h.h[(0, 0)], 0.0);
    }
}
