//! Planar pose from a plane-to-image homography.
//!
//! For a marker lying on `Z = 0` in its own frame, `H ~ K [r1 r2 t]`. The
//! decomposition is single-pass and closed form; no reprojection error is
//! checked, so callers must be ready for a `None`.

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    estimate_homography, order_corners, square_plane_points, CameraIntrinsics, Homography,
    PoseError, Viewport,
};

/// Norms below this make a back-projected column unusable.
const DEGENERATE_NORM: f64 = 1e-12;

/// Rotation plus translation mapping marker-plane coordinates into camera space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl RigidTransform {
    /// Build from three orthonormal basis columns and a translation.
    pub fn from_basis(
        r1: Vector3<f64>,
        r2: Vector3<f64>,
        r3: Vector3<f64>,
        translation: Vector3<f64>,
    ) -> Self {
        Self {
            rotation: Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[r1, r2, r3])),
            translation,
        }
    }

    /// Rotation column `i` (the marker's x, y or z axis in camera space).
    #[inline]
    pub fn axis(&self, i: usize) -> Vector3<f64> {
        self.rotation.matrix().column(i).into_owned()
    }

    #[inline]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation * p + self.translation
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&self.rotation)
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.quaternion())
    }

    /// 4x4 homogeneous form.
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut m = self.rotation.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }
}

/// Camera-space pose in the vision convention: x right, y down, z forward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisionPose(RigidTransform);

impl VisionPose {
    pub fn new(transform: RigidTransform) -> Self {
        Self(transform)
    }

    #[inline]
    pub fn transform(&self) -> &RigidTransform {
        &self.0
    }
}

/// Camera-space pose in the rendering convention: x right, y up, z backward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPose(RigidTransform);

impl RenderPose {
    /// Pre-multiply by the fixed axis flip `diag(1, -1, -1)`.
    ///
    /// This is the only conversion path, so the flip is applied exactly once.
    pub fn from_vision(pose: VisionPose) -> Self {
        let flip = Rotation3::from_matrix_unchecked(Matrix3::from_diagonal(&Vector3::new(
            1.0, -1.0, -1.0,
        )));
        let v = pose.0;
        Self(RigidTransform {
            rotation: flip * v.rotation,
            translation: flip * v.translation,
        })
    }

    #[inline]
    pub fn transform(&self) -> &RigidTransform {
        &self.0
    }

    /// Camera-space position of the center of a square marker of side `marker_size`.
    pub fn marker_center(&self, marker_size: f64) -> Point3<f64> {
        let half = marker_size * 0.5;
        self.0.transform_point(&Point3::new(half, half, 0.0))
    }
}

/// Decompose `H` into a vision-convention pose given intrinsics `K`.
///
/// `lambda = 1 / |K^-1 h1|`, `r1 = lambda K^-1 h1`, `r2 = lambda K^-1 h2`,
/// then `r3 = normalize(r1 x r2)` and `r2 = normalize(r3 x r1)` restore an
/// orthonormal basis. `t = lambda K^-1 h3`.
///
/// Returns `None` when the leading column is (near) zero or the basis collapses.
#[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
pub fn decompose_homography(h: &Homography, k: &CameraIntrinsics) -> Option<VisionPose> {
    let k_inv = k.inverse_matrix();
    let h1 = k_inv * h.column(0);
    let h2 = k_inv * h.column(1);
    let h3 = k_inv * h.column(2);

    let n1 = h1.norm();
    if !n1.is_finite() || n1 < DEGENERATE_NORM {
        return None;
    }
    let lambda = 1.0 / n1;

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2).try_normalize(DEGENERATE_NORM)?;
    let r2 = r3.cross(&r1).try_normalize(DEGENERATE_NORM)?;
    let t = h3 * lambda;

    Some(VisionPose::new(RigidTransform::from_basis(r1, r2, r3, t)))
}

/// Full corner pipeline: order corners, solve the homography of a square of
/// side `marker_size` meters, decompose with intrinsics from the current
/// viewport, and convert to the rendering convention.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(corners),
        fields(n = corners.len(), width = viewport.width, height = viewport.height)
    )
)]
pub fn estimate_marker_pose(
    corners: &[Point2<f64>],
    viewport: Viewport,
    fov_y_deg: f64,
    marker_size: f64,
) -> Result<RenderPose, PoseError> {
    let ordered = order_corners(corners)?;
    let plane = square_plane_points(marker_size);
    let h = estimate_homography(&plane, &ordered)?;

    let k = CameraIntrinsics::from_viewport(viewport, fov_y_deg);
    let vision = decompose_homography(&h, &k).ok_or(PoseError::DegeneratePose)?;
    log::trace!(
        "marker pose: t=({:.3}, {:.3}, {:.3})",
        vision.transform().translation.x,
        vision.transform().translation.y,
        vision.transform().translation.z
    );
    Ok(RenderPose::from_vision(vision))
}
