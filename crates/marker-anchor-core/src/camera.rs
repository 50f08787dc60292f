use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Size of the rendering viewport in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Build a viewport only if both dimensions are finite and strictly positive.
    pub fn try_new(width: f64, height: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        (valid(width) && valid(height)).then_some(Self { width, height })
    }

    #[inline]
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    #[inline]
    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Average of width and height, used as the "screen size" scale.
    #[inline]
    pub fn mean_extent(&self) -> f64 {
        (self.width + self.height) * 0.5
    }
}

/// Pinhole intrinsics derived analytically from a vertical field of view.
///
/// These are recomputed from the current viewport whenever they are needed,
/// so a resize takes effect on the next pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// `fy = (h/2) / tan(fov/2)`, `fx = fy * aspect`, principal point at the viewport center.
    pub fn from_viewport(viewport: Viewport, fov_y_deg: f64) -> Self {
        let half_fov = fov_y_deg.to_radians() * 0.5;
        let fy = (viewport.height * 0.5) / half_fov.tan();
        let fx = fy * viewport.aspect();
        let c = viewport.center();
        Self {
            fx,
            fy,
            cx: c.x,
            cy: c.y,
        }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Closed-form `K^-1` (no skew).
    pub fn inverse_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            1.0 / self.fx,
            0.0,
            -self.cx / self.fx,
            0.0,
            1.0 / self.fy,
            -self.cy / self.fy,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Project a camera-space point (vision convention, z forward) to pixels.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        Some(Point2::new(
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        ))
    }

    /// Ray through a pixel on the `z = 1` plane.
    pub fn back_project(&self, p: Point2<f64>) -> Vector3<f64> {
        self.inverse_matrix() * Vector3::new(p.x, p.y, 1.0)
    }
}

/// Maps capture-frame pixel coordinates into viewport coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureMapping {
    /// Capture and viewport share one pixel frame.
    #[default]
    Identity,
    /// Capture frame has its own resolution and is stretched onto the viewport.
    Scaled {
        capture_width: f64,
        capture_height: f64,
    },
}

impl CaptureMapping {
    pub fn map(&self, p: Point2<f64>, viewport: Viewport) -> Point2<f64> {
        match *self {
            CaptureMapping::Identity => p,
            CaptureMapping::Scaled {
                capture_width,
                capture_height,
            } => {
                if capture_width <= 0.0 || capture_height <= 0.0 {
                    return p;
                }
                Point2::new(
                    p.x * viewport.width / capture_width,
                    p.y * viewport.height / capture_height,
                )
            }
        }
    }

    /// Scale factors applied to lengths (widths and heights) by [`Self::map`].
    pub fn scale(&self, viewport: Viewport) -> (f64, f64) {
        match *self {
            CaptureMapping::Scaled {
                capture_width,
                capture_height,
            } if capture_width > 0.0 && capture_height > 0.0 => (
                viewport.width / capture_width,
                viewport.height / capture_height,
            ),
            _ => (1.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn intrinsics_follow_vertical_fov() {
        let vp = Viewport::new(640.0, 480.0);
        let k = CameraIntrinsics::from_viewport(vp, 60.0);
        let expected_fy = 240.0 / 30f64.to_radians().tan();
        assert_relative_eq!(k.fy, expected_fy, epsilon = 1e-9);
        assert_relative_eq!(k.fx, expected_fy * 640.0 / 480.0, epsilon = 1e-9);
        assert_relative_eq!(k.cx, 320.0);
        assert_relative_eq!(k.cy, 240.0);
    }

    #[test]
    fn inverse_matrix_matches_numeric_inverse() {
        let k = CameraIntrinsics::from_viewport(Viewport::new(1280.0, 720.0), 45.0);
        let numeric = k.matrix().try_inverse().expect("invertible");
        assert_relative_eq!(k.inverse_matrix(), numeric, epsilon = 1e-12);
    }

    #[test]
    fn project_then_back_project_returns_ray() {
        let k = CameraIntrinsics::from_viewport(Viewport::new(800.0, 600.0), 60.0);
        let p = Point3::new(0.2, -0.1, 2.0);
        let px = k.project(&p).expect("in front");
        let ray = k.back_project(px);
        assert_relative_eq!(ray * 2.0, p.coords, epsilon = 1e-9);
        assert!(k.project(&Point3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn viewport_rejects_non_positive_dimensions() {
        assert!(Viewport::try_new(0.0, 10.0).is_none());
        assert!(Viewport::try_new(10.0, -1.0).is_none());
        assert!(Viewport::try_new(f64::NAN, 10.0).is_none());
        assert_eq!(
            Viewport::try_new(10.0, 20.0),
            Some(Viewport::new(10.0, 20.0))
        );
    }

    #[test]
    fn scaled_mapping_stretches_to_viewport() {
        let vp = Viewport::new(800.0, 600.0);
        let mapping = CaptureMapping::Scaled {
            capture_width: 400.0,
            capture_height: 300.0,
        };
        assert_eq!(
            mapping.map(Point2::new(10.0, 20.0), vp),
            Point2::new(20.0, 40.0)
        );
        assert_eq!(mapping.scale(vp), (2.0, 2.0));
        let p = Point2::new(3.0, 4.0);
        assert_eq!(CaptureMapping::Identity.map(p, vp), p);
    }
}
