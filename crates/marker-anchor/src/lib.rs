//! Persistent scene anchors for identified square markers.
//!
//! Feed each frame's detections to an [`AnchorTracker`]. For every distinct
//! identifier the tracker keeps one node in a [`SceneBackend`], moving it to
//! the marker's camera-space pose when four corners are available and to a
//! heuristic position otherwise. Updates are smoothed and throttled per
//! identifier.
//!
//! ## Quickstart
//!
//! ```
//! use marker_anchor::{AnchorTracker, Detection, MemoryScene, Placement, TrackerConfig};
//! use nalgebra::Point2;
//!
//! let mut tracker = AnchorTracker::new(TrackerConfig::default(), MemoryScene::new())
//!     .expect("default config is valid");
//! let detection = Detection::new("QR-A").with_corners(vec![
//!     Point2::new(600.0, 320.0),
//!     Point2::new(680.0, 320.0),
//!     Point2::new(680.0, 400.0),
//!     Point2::new(600.0, 400.0),
//! ]);
//! assert!(matches!(
//!     tracker.place_object_at_identifier(&detection),
//!     Placement::Applied { created: true, .. }
//! ));
//! tracker.clear_all();
//! assert!(tracker.registry().is_empty());
//! ```
//!
//! ## API map
//! - `marker_anchor::core`: corner ordering, homography and pose decomposition.
//! - [`registry`]: per-identifier nodes, smoothing and cooldowns.
//! - [`fallback`]: placement from a bounding region or the identifier hash.
//! - [`replay`]: offline runs over recorded detection scripts.

pub use marker_anchor_core as core;

mod color;
mod config;
mod detection;
pub mod fallback;
pub mod registry;
pub mod replay;
mod scene;
mod tracker;

pub use color::{identifier_color, identifier_hash, identifier_hue};
pub use config::{
    AnchorPoint, ConfigError, NodeConfig, SpinConfig, TrackerConfig, TrackerIoError, ViewportConfig,
};
pub use detection::{BoundingRegion, Detection, MarkerGeometry, RegionSize};
pub use registry::{Anchor, AnchorRegistry, AnchorTarget, RegistryParams, UpsertOutcome};
pub use replay::{run_replay, ReplayReport, ReplayScript};
pub use scene::{
    MaterialColor, MemoryNode, MemoryNodeId, MemoryScene, NodeGeometry, NodeMaterial, NodeTransform,
    SceneBackend,
};
pub use tracker::{AnchorTracker, Placement, PlacementSource};
