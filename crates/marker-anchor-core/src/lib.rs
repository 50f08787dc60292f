//! Core geometry for planar marker anchoring.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! know about scenes, anchors or timing; it turns four image corners of a
//! square marker of known size into a camera-space rigid transform.
//!
//! Pipeline:
//! 1. [`order_corners`] puts raw detector corners into a canonical winding.
//! 2. [`estimate_homography`] solves the plane-to-image DLT system.
//! 3. [`decompose_homography`] back-projects through [`CameraIntrinsics`]
//!    into a [`VisionPose`].
//! 4. [`RenderPose::from_vision`] adapts the axes to a y-up, z-backward
//!    rendering convention.
//!
//! [`estimate_marker_pose`] chains all four steps.
//!
//! ```
//! use marker_anchor_core::{estimate_marker_pose, Viewport};
//! use nalgebra::Point2;
//!
//! let viewport = Viewport::new(640.0, 640.0);
//! let corners = [
//!     Point2::new(287.0, 287.0),
//!     Point2::new(353.0, 287.0),
//!     Point2::new(353.0, 353.0),
//!     Point2::new(287.0, 353.0),
//! ];
//! let pose = estimate_marker_pose(&corners, viewport, 60.0, 0.12).expect("pose");
//! assert!(pose.transform().translation.z < 0.0);
//! ```

mod camera;
mod corners;
mod error;
mod homography;
mod logger;
mod pose;

pub use camera::{CameraIntrinsics, CaptureMapping, Viewport};
pub use corners::{order_corners, signed_corner_area};
pub use error::PoseError;
pub use homography::{estimate_homography, square_plane_points, Homography};
pub use pose::{
    decompose_homography, estimate_marker_pose, RenderPose, RigidTransform, VisionPose,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
