//! Frame-driven facade tying detections to scene anchors.

use std::time::Instant;

use marker_anchor_core::{estimate_marker_pose, PoseError, Viewport};
use nalgebra::{Point2, Point3};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::{AnchorPoint, SpinConfig, TrackerConfig};
use crate::detection::{BoundingRegion, Detection, MarkerGeometry, RegionSize};
use crate::fallback::{hashed_position, region_position};
use crate::registry::{AnchorRegistry, AnchorTarget, UpsertOutcome};
use crate::scene::SceneBackend;

/// How a placement target was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementSource {
    /// Full pose from the marker corners.
    Pose,
    /// Ray through the bounding region center.
    Region,
    /// Identifier hash, no geometry available.
    Hashed,
}

/// What [`AnchorTracker::place_object_at_identifier`] did with a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Empty identifier.
    Ignored,
    /// Identifier still inside its cooldown window.
    Throttled,
    Applied {
        source: PlacementSource,
        /// A new node was created for this identifier.
        created: bool,
    },
}

/// Owns the scene backend and the anchor registry.
///
/// The tracker is single-threaded: every operation takes `&mut self` and
/// completes before returning.
pub struct AnchorTracker<S: SceneBackend> {
    config: TrackerConfig,
    viewport: Viewport,
    scene: S,
    registry: AnchorRegistry<S::NodeRef>,
}

impl<S: SceneBackend> AnchorTracker<S> {
    /// Fails only if `config` does not validate.
    pub fn new(config: TrackerConfig, scene: S) -> Result<Self, crate::ConfigError> {
        config.validate()?;
        let viewport = config.initial_viewport()?;
        Ok(Self {
            registry: AnchorRegistry::new(config.registry_params()),
            config,
            viewport,
            scene,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Record new viewport dimensions. Zero, negative or non-finite sizes are
    /// ignored and `false` is returned.
    pub fn update_viewport(&mut self, width: f64, height: f64) -> bool {
        match Viewport::try_new(width, height) {
            Some(viewport) => {
                self.viewport = viewport;
                true
            }
            None => {
                log::debug!("ignoring invalid viewport {width}x{height}");
                false
            }
        }
    }

    /// [`Self::place_object_at_identifier_at`] with the current time.
    pub fn place_object_at_identifier(&mut self, detection: &Detection) -> Placement {
        self.place_object_at_identifier_at(detection, Instant::now())
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, detection),
            fields(id = %detection.identifier.trim())
        )
    )]
    pub fn place_object_at_identifier_at(
        &mut self,
        detection: &Detection,
        now: Instant,
    ) -> Placement {
        let Some(key) = detection.key() else {
            return Placement::Ignored;
        };
        if self.registry.is_cooling_down(key, now) {
            return Placement::Throttled;
        }

        let (source, target) = self.resolve_target(key, detection.geometry());
        match self.registry.upsert(&mut self.scene, key, target, now) {
            UpsertOutcome::Throttled => Placement::Throttled,
            outcome => Placement::Applied {
                source,
                created: outcome == UpsertOutcome::Created,
            },
        }
    }

    fn resolve_target(
        &self,
        key: &str,
        geometry: MarkerGeometry<'_>,
    ) -> (PlacementSource, AnchorTarget) {
        let region = match geometry {
            MarkerGeometry::Corners {
                corners,
                fallback_region,
            } => {
                match self.pose_target(corners) {
                    Ok(target) => return (PlacementSource::Pose, target),
                    Err(err) => log::debug!("'{key}': corner pose failed ({err}), falling back"),
                }
                fallback_region
            }
            MarkerGeometry::Region(region) => Some(region),
            MarkerGeometry::Unlocated => None,
        };

        match region {
            Some(region) => {
                let region = self.map_region(region);
                let fov = self.config.fov_y_deg;
                let position = region_position(&region, self.viewport, fov, &self.config.fallback);
                (PlacementSource::Region, AnchorTarget::Position(position))
            }
            None => (
                PlacementSource::Hashed,
                AnchorTarget::Position(hashed_position(key, &self.config.fallback)),
            ),
        }
    }

    fn pose_target(&self, corners: &[Point2<f64>]) -> Result<AnchorTarget, PoseError> {
        let mapping = self.config.capture_mapping;
        let mapped: Vec<Point2<f64>> = corners
            .iter()
            .map(|p| mapping.map(*p, self.viewport))
            .collect();
        let pose = estimate_marker_pose(
            &mapped,
            self.viewport,
            self.config.fov_y_deg,
            self.config.marker_size_m,
        )?;
        let position = match self.config.anchor_point {
            AnchorPoint::MarkerOrigin => Point3::from(pose.transform().translation),
            AnchorPoint::MarkerCenter => pose.marker_center(self.config.marker_size_m),
        };
        log::trace!("pose position {position:?}");
        Ok(AnchorTarget::Pose {
            position,
            orientation: pose.transform().quaternion(),
        })
    }

    fn map_region(&self, region: BoundingRegion) -> BoundingRegion {
        let mapping = self.config.capture_mapping;
        let (sx, sy) = mapping.scale(self.viewport);
        BoundingRegion {
            origin: mapping.map(region.origin, self.viewport),
            size: RegionSize {
                width: region.size.width * sx,
                height: region.size.height * sy,
            },
        }
    }

    /// Dispose every anchor node and reset all cooldowns.
    pub fn clear_all(&mut self) {
        self.registry.clear(&mut self.scene);
    }

    /// One idle-animation step for every anchor.
    pub fn tick(&mut self) {
        let SpinConfig {
            yaw_step,
            pitch_step,
        } = self.config.spin;
        self.registry.spin(&mut self.scene, yaw_step, pitch_step);
    }

    pub fn registry(&self) -> &AnchorRegistry<S::NodeRef> {
        &self.registry
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn into_scene(self) -> S {
        self.scene
    }
}
