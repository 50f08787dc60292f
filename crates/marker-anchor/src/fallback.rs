//! Approximate placement when no corner pose is available.
//!
//! The region heuristic judges distance from apparent size only; it does not
//! agree with the metric corner pose and is not meant to.

use marker_anchor_core::Viewport;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::color::identifier_hash_abs;
use crate::detection::BoundingRegion;

/// Tuning of the fallback heuristics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackParams {
    /// Closest distance along the view ray.
    pub min_distance: f64,
    /// Farthest distance along the view ray.
    pub max_distance: f64,
    /// `distance = size_scale / size_ratio` before clamping.
    pub size_scale: f64,
    /// Extent of the hashed placement grid in x and y.
    pub hash_spread: f64,
    /// Depth in front of the camera for hashed placement.
    pub hash_depth: f64,
}

impl Default for FallbackParams {
    fn default() -> Self {
        Self {
            min_distance: 0.4,
            max_distance: 3.0,
            size_scale: 0.9,
            hash_spread: 1.2,
            hash_depth: 1.2,
        }
    }
}

/// Distance to a marker judged from how much of the viewport its region covers.
pub fn region_distance(
    region: &BoundingRegion,
    viewport: Viewport,
    params: &FallbackParams,
) -> f64 {
    let screen = viewport.mean_extent().max(1.0);
    let size_ratio = (region.mean_extent() / screen).max(0.001);
    (params.size_scale / size_ratio).clamp(params.min_distance, params.max_distance)
}

/// Unit view ray (rendering convention) through a viewport pixel for a camera
/// at the origin looking down `-z`.
pub fn view_ray(pixel_x: f64, pixel_y: f64, viewport: Viewport, fov_y_deg: f64) -> Vector3<f64> {
    let ndc_x = (pixel_x / viewport.width) * 2.0 - 1.0;
    let ndc_y = -((pixel_y / viewport.height) * 2.0 - 1.0);
    let tan_half = (fov_y_deg.to_radians() * 0.5).tan();
    Vector3::new(ndc_x * tan_half * viewport.aspect(), ndc_y * tan_half, -1.0).normalize()
}

/// Camera-space position for a bounding-region-only detection.
pub fn region_position(
    region: &BoundingRegion,
    viewport: Viewport,
    fov_y_deg: f64,
    params: &FallbackParams,
) -> Point3<f64> {
    let center = region.center();
    let dir = view_ray(center.x, center.y, viewport, fov_y_deg);
    Point3::from(dir * region_distance(region, viewport, params))
}

/// Placeholder position spread on a fixed-depth grid by identifier hash.
pub fn hashed_position(identifier: &str, params: &FallbackParams) -> Point3<f64> {
    let h = identifier_hash_abs(identifier);
    let cell = |v: u32| ((f64::from(v % 200) - 100.0) / 200.0) * params.hash_spread;
    Point3::new(cell(h), cell(h / 200), -params.hash_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn small_region_clamps_to_max_distance() {
        let vp = Viewport::new(1280.0, 720.0);
        let region = BoundingRegion::new(600.0, 340.0, 8.0, 8.0);
        let params = FallbackParams::default();
        assert_eq!(region_distance(&region, vp, &params), 3.0);
        assert_abs_diff_eq!(
            region_position(&region, vp, 60.0, &params).coords.norm(),
            3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn large_region_clamps_to_min_distance() {
        let vp = Viewport::new(1000.0, 1000.0);
        let region = BoundingRegion::new(0.0, 0.0, 1000.0, 1000.0);
        assert_eq!(
            region_distance(&region, vp, &FallbackParams::default()),
            0.4
        );
    }

    #[test]
    fn mid_region_uses_inverse_size() {
        let vp = Viewport::new(1000.0, 1000.0);
        let region = BoundingRegion::new(400.0, 400.0, 500.0, 500.0);
        // ratio 0.5 -> 0.9 / 0.5
        assert_abs_diff_eq!(
            region_distance(&region, vp, &FallbackParams::default()),
            1.8,
            epsilon = 1e-12
        );
    }

    #[test]
    fn centered_region_lies_on_the_view_axis() {
        let vp = Viewport::new(800.0, 600.0);
        let region = BoundingRegion::new(350.0, 250.0, 100.0, 100.0);
        let p = region_position(&region, vp, 60.0, &FallbackParams::default());
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-12);
        assert!(p.z < 0.0);
    }

    #[test]
    fn upper_left_region_points_up_and_left() {
        let vp = Viewport::new(800.0, 600.0);
        let ray = view_ray(0.0, 0.0, vp, 60.0);
        assert!(ray.x < 0.0 && ray.y > 0.0 && ray.z < 0.0);
        let tan_half = 30f64.to_radians().tan();
        assert_abs_diff_eq!(ray.y / -ray.z, tan_half, epsilon = 1e-12);
    }

    #[test]
    fn hashed_position_is_deterministic() {
        let params = FallbackParams::default();
        let p = hashed_position("QR-A", &params);
        assert_abs_diff_eq!(p.x, 0.198, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, -0.204, epsilon = 1e-12);
        assert_eq!(p.z, -1.2);
        assert_eq!(hashed_position("QR-A", &params), p);

        let empty = hashed_position("", &params);
        assert_abs_diff_eq!(empty.x, -0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(empty.y, -0.6, epsilon = 1e-12);
    }
}
