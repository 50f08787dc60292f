//! Canonical ordering of raw detector corners.

use nalgebra::Point2;

use crate::PoseError;

/// Cross product of the edges `0 -> 1` and `0 -> 3`.
///
/// Positive for the winding produced by [`order_corners`] on a convex quad
/// in y-down image coordinates.
#[inline]
pub fn signed_corner_area(c: &[Point2<f64>; 4]) -> f64 {
    let e1 = c[1] - c[0];
    let e3 = c[3] - c[0];
    e1.x * e3.y - e1.y * e3.x
}

/// Put an unordered set of at least 4 points into a consistent winding.
///
/// Points are sorted by angle around their centroid, the point with the
/// smallest `x + y` (top-left in a y-down image) becomes index 0, and the
/// traversal is flipped around that start point if the signed area at it is
/// negative. Only the first 4 points of the result are returned.
///
/// Duplicate or collinear inputs are accepted as-is.
pub fn order_corners(raw: &[Point2<f64>]) -> Result<[Point2<f64>; 4], PoseError> {
    if raw.len() < 4 {
        return Err(PoseError::InsufficientCorners { got: raw.len() });
    }

    let n = raw.len() as f64;
    let (sx, sy) = raw
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);

    let mut pts = raw.to_vec();
    pts.sort_by(|a, b| {
        let ta = (a.y - cy).atan2(a.x - cx);
        let tb = (b.y - cy).atan2(b.x - cx);
        ta.total_cmp(&tb)
    });

    let start = pts
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.x + a.y).total_cmp(&(b.x + b.y)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    pts.rotate_left(start);

    // Judged on the full traversal, so with extra points index 3 need not be
    // the neighbour of index 0.
    let e1 = pts[1] - pts[0];
    let e3 = pts[3] - pts[0];
    if e1.x * e3.y - e1.y * e3.x < 0.0 {
        pts[1..].reverse();
    }
    let out = [pts[0], pts[1], pts[2], pts[3]];
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sorted(mut v: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
        v.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        v
    }

    fn collinear(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> bool {
        let e1 = b - a;
        let e2 = c - a;
        (e1.x * e2.y - e1.y * e2.x).abs() < 1e-6
    }

    #[test]
    fn axis_aligned_square_starts_top_left() {
        let raw = [
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 0.0),
        ];
        let ordered = order_corners(&raw).expect("ordered");
        assert_eq!(
            ordered,
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ]
        );
        assert!(signed_corner_area(&ordered) > 0.0);
    }

    #[test]
    fn fewer_than_four_points_fail() {
        let raw = [Point2::new(0.0, 0.0); 3];
        assert_eq!(
            order_corners(&raw),
            Err(PoseError::InsufficientCorners { got: 3 })
        );
    }

    #[test]
    fn duplicate_points_are_accepted() {
        let raw = [
            Point2::new(5.0, 5.0),
            Point2::new(5.0, 5.0),
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
        ];
        let ordered = order_corners(&raw).expect("degenerate input is still ordered");
        assert_eq!(ordered[0], Point2::new(0.0, 0.0));
        assert_eq!(sorted(ordered.to_vec()), sorted(raw.to_vec()));
    }

    #[test]
    fn random_quads_are_permuted_wound_and_idempotent() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut checked = 0;
        while checked < 500 {
            let raw: Vec<Point2<f64>> = (0..4)
                .map(|_| Point2::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)))
                .collect();
            let any_collinear = (0..4).any(|skip| {
                let rest: Vec<_> = (0..4).filter(|&i| i != skip).map(|i| raw[i]).collect();
                collinear(rest[0], rest[1], rest[2])
            });
            if any_collinear {
                continue;
            }

            let ordered = order_corners(&raw).expect("ordered");
            assert_eq!(sorted(ordered.to_vec()), sorted(raw.clone()));
            assert!(
                signed_corner_area(&ordered) >= 0.0,
                "negative winding for {raw:?} -> {ordered:?}"
            );
            assert_eq!(order_corners(&ordered).expect("reordered"), ordered);
            checked += 1;
        }
    }

    #[test]
    fn extra_points_are_truncated_to_four() {
        let raw = [
            Point2::new(0.0, 0.0),
            Point2::new(5.0, -1.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        let ordered = order_corners(&raw).expect("ordered");
        assert_eq!(ordered[0], Point2::new(0.0, 0.0));
        assert_eq!(ordered[1], Point2::new(5.0, -1.0));
        assert_eq!(ordered[2], Point2::new(10.0, 0.0));
    }
}
