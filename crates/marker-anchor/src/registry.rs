//! Per-identifier anchor bookkeeping.
//!
//! The registry maps a trimmed identifier to exactly one scene node, blends
//! new targets into the node's current transform and throttles updates that
//! arrive faster than the cooldown window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use nalgebra::{Point3, UnitQuaternion, Vector3};

use crate::color::identifier_color;
use crate::scene::{MaterialColor, NodeGeometry, NodeMaterial, NodeTransform, SceneBackend};

/// Behavior of an [`AnchorRegistry`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegistryParams {
    /// Minimum time between two applied updates of the same identifier.
    pub cooldown: Duration,
    /// Blend factor towards the target, `0` keeps the current transform.
    pub smoothing: f64,
    pub geometry: NodeGeometry,
    pub opacity: f64,
    pub saturation: f64,
    pub lightness: f64,
}

impl Default for RegistryParams {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(16),
            smoothing: 0.5,
            geometry: NodeGeometry::cube(0.15),
            opacity: 0.9,
            saturation: 0.7,
            lightness: 0.6,
        }
    }
}

/// Where an anchor should move to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnchorTarget {
    /// Full pose from corners; position and orientation are both blended.
    Pose {
        position: Point3<f64>,
        orientation: UnitQuaternion<f64>,
    },
    /// Heuristic placement; orientation is left alone.
    Position(Point3<f64>),
}

impl AnchorTarget {
    pub fn position(&self) -> Point3<f64> {
        match *self {
            AnchorTarget::Pose { position, .. } | AnchorTarget::Position(position) => position,
        }
    }
}

/// Result of [`AnchorRegistry::upsert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Dropped because the identifier is still cooling down.
    Throttled,
}

/// One tracked identifier and the node that represents it.
#[derive(Clone, Debug)]
pub struct Anchor<N> {
    pub identifier: String,
    pub node: N,
    /// Transform last written to the node.
    pub transform: NodeTransform,
    pub color: MaterialColor,
    pub last_update: Instant,
    /// Number of applied (not throttled) updates.
    pub updates: usize,
}

#[derive(Debug)]
pub struct AnchorRegistry<N> {
    params: RegistryParams,
    anchors: HashMap<String, Anchor<N>>,
    cooldowns: HashMap<String, Instant>,
}

impl<N> AnchorRegistry<N> {
    pub fn new(params: RegistryParams) -> Self {
        Self {
            params,
            anchors: HashMap::new(),
            cooldowns: HashMap::new(),
        }
    }

    pub fn params(&self) -> &RegistryParams {
        &self.params
    }

    /// `true` if an update for `identifier` at `now` would be throttled.
    pub fn is_cooling_down(&self, identifier: &str, now: Instant) -> bool {
        self.cooldowns
            .get(identifier)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.params.cooldown)
    }

    /// Create the anchor if needed and blend `target` into its transform.
    ///
    /// New nodes start at the origin with identity orientation, so the first
    /// update already lands halfway (with the default smoothing).
    pub fn upsert<S>(
        &mut self,
        scene: &mut S,
        identifier: &str,
        target: AnchorTarget,
        now: Instant,
    ) -> UpsertOutcome
    where
        S: SceneBackend<NodeRef = N>,
    {
        if self.is_cooling_down(identifier, now) {
            log::trace!("'{identifier}' throttled");
            return UpsertOutcome::Throttled;
        }

        let params = self.params;
        let mut outcome = UpsertOutcome::Updated;
        let anchor = self
            .anchors
            .entry(identifier.to_owned())
            .or_insert_with(|| {
                outcome = UpsertOutcome::Created;
                let color = identifier_color(identifier, params.saturation, params.lightness);
                let material = NodeMaterial {
                    color,
                    opacity: params.opacity,
                };
                let node = scene.create_node(&params.geometry, &material);
                let hex = color.to_hex_string();
                log::debug!("created anchor '{identifier}' with color {hex}");
                Anchor {
                    identifier: identifier.to_owned(),
                    node,
                    transform: NodeTransform::default(),
                    color,
                    last_update: now,
                    updates: 0,
                }
            });

        let t = params.smoothing;
        let current = anchor.transform;
        let position = current.position.coords.lerp(&target.position().coords, t);
        let orientation = match target {
            AnchorTarget::Pose { orientation, .. } => current
                .orientation
                .try_slerp(&orientation, t, 1e-9)
                .unwrap_or(orientation),
            AnchorTarget::Position(_) => current.orientation,
        };

        anchor.transform = NodeTransform {
            position: Point3::from(position),
            orientation,
        };
        anchor.last_update = now;
        anchor.updates += 1;
        scene.set_transform(&anchor.node, &anchor.transform);
        self.cooldowns.insert(identifier.to_owned(), now);

        outcome
    }

    /// Dispose every node and forget all identifiers and cooldowns.
    pub fn clear<S>(&mut self, scene: &mut S)
    where
        S: SceneBackend<NodeRef = N>,
    {
        let count = self.anchors.len();
        for (_, anchor) in self.anchors.drain() {
            scene.dispose_node(anchor.node);
        }
        self.cooldowns.clear();
        log::info!("cleared {count} anchors");
    }

    /// Idle rotation increment on the node's XYZ Euler angles: `yaw` is added
    /// to the y angle and `pitch` to the x angle, z is kept.
    pub fn spin<S>(&mut self, scene: &mut S, yaw: f64, pitch: f64)
    where
        S: SceneBackend<NodeRef = N>,
    {
        for anchor in self.anchors.values_mut() {
            let [x, y, z] = xyz_euler(&anchor.transform.orientation);
            anchor.transform.orientation = from_xyz_euler(x + pitch, y + yaw, z);
            scene.set_transform(&anchor.node, &anchor.transform);
        }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Number of identifiers with a recorded last-update time.
    pub fn cooldown_len(&self) -> usize {
        self.cooldowns.len()
    }

    pub fn get(&self, identifier: &str) -> Option<&Anchor<N>> {
        self.anchors.get(identifier)
    }

    /// Anchors in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Anchor<N>> {
        self.anchors.values()
    }
}

/// Rotation `Rx(x) * Ry(y) * Rz(z)`.
fn from_xyz_euler(x: f64, y: f64, z: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), y)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z)
}

/// Inverse of [`from_xyz_euler`], with `z = 0` at gimbal lock.
fn xyz_euler(q: &UnitQuaternion<f64>) -> [f64; 3] {
    let m = q.to_rotation_matrix().into_inner();
    let y = m[(0, 2)].clamp(-1.0, 1.0).asin();
    if m[(0, 2)].abs() < 0.999_999_9 {
        [
            (-m[(1, 2)]).atan2(m[(2, 2)]),
            y,
            (-m[(0, 1)]).atan2(m[(0, 0)]),
        ]
    } else {
        [m[(2, 1)].atan2(m[(1, 1)]), y, 0.0]
    }
}

impl<N> Default for AnchorRegistry<N> {
    fn default() -> Self {
        Self::new(RegistryParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn two_updates_inside_cooldown_apply_once() {
        let mut scene = MemoryScene::new();
        let mut reg = AnchorRegistry::default();
        let t0 = Instant::now();
        let target = AnchorTarget::Position(Point3::new(1.0, 0.0, -1.0));

        assert_eq!(
            reg.upsert(&mut scene, "a", target, t0),
            UpsertOutcome::Created
        );
        assert_eq!(
            reg.upsert(&mut scene, "a", target, t0 + ms(5)),
            UpsertOutcome::Throttled
        );

        let anchor = reg.get("a").expect("anchor");
        assert_eq!(anchor.updates, 1);
        assert_eq!(
            scene.node(anchor.node).map(|n| n.transform_updates),
            Some(1)
        );

        assert_eq!(
            reg.upsert(&mut scene, "a", target, t0 + ms(16)),
            UpsertOutcome::Updated
        );
        assert_eq!(reg.get("a").map(|a| a.updates), Some(2));
    }

    #[test]
    fn cooldown_is_per_identifier() {
        let mut scene = MemoryScene::new();
        let mut reg = AnchorRegistry::default();
        let t0 = Instant::now();
        let target = AnchorTarget::Position(Point3::origin());
        reg.upsert(&mut scene, "a", target, t0);
        assert_eq!(
            reg.upsert(&mut scene, "b", target, t0),
            UpsertOutcome::Created
        );
        assert_eq!(reg.len(), 2);
        assert_eq!(scene.live_nodes(), 2);
    }

    #[test]
    fn position_is_smoothed_from_origin() {
        let mut scene = MemoryScene::new();
        let mut reg = AnchorRegistry::default();
        let t0 = Instant::now();
        let target = AnchorTarget::Position(Point3::new(2.0, -2.0, -4.0));

        reg.upsert(&mut scene, "a", target, t0);
        let p1 = reg.get("a").map(|a| a.transform.position).expect("anchor");
        assert_abs_diff_eq!(p1, Point3::new(1.0, -1.0, -2.0), epsilon = 1e-12);

        reg.upsert(&mut scene, "a", target, t0 + ms(20));
        let p2 = reg.get("a").map(|a| a.transform.position).expect("anchor");
        assert_abs_diff_eq!(p2, Point3::new(1.5, -1.5, -3.0), epsilon = 1e-12);
    }

    #[test]
    fn orientation_slerps_only_for_poses() {
        let mut scene = MemoryScene::new();
        let mut reg = AnchorRegistry::default();
        let t0 = Instant::now();
        let quarter = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);

        reg.upsert(
            &mut scene,
            "a",
            AnchorTarget::Pose {
                position: Point3::origin(),
                orientation: quarter,
            },
            t0,
        );
        let q = reg.get("a").expect("anchor").transform.orientation;
        assert_abs_diff_eq!(q.angle(), std::f64::consts::FRAC_PI_4, epsilon = 1e-9);

        reg.upsert(
            &mut scene,
            "a",
            AnchorTarget::Position(Point3::origin()),
            t0 + ms(20),
        );
        let q2 = reg.get("a").expect("anchor").transform.orientation;
        assert_abs_diff_eq!(q2.angle(), std::f64::consts::FRAC_PI_4, epsilon = 1e-9);
    }

    #[test]
    fn clear_disposes_everything() {
        let mut scene = MemoryScene::new();
        let mut reg = AnchorRegistry::default();
        let t0 = Instant::now();
        let origin = AnchorTarget::Position(Point3::origin());
        for id in ["a", "b", "c"] {
            reg.upsert(&mut scene, id, origin, t0);
        }
        reg.clear(&mut scene);
        assert!(reg.is_empty());
        assert_eq!(reg.cooldown_len(), 0);
        assert_eq!(scene.live_nodes(), 0);
        assert_eq!(scene.disposed_count(), 3);

        // no cooldown survives a clear
        assert_eq!(
            reg.upsert(&mut scene, "a", origin, t0),
            UpsertOutcome::Created
        );
    }

    #[test]
    fn spin_rotates_every_node() {
        let mut scene = MemoryScene::new();
        let mut reg = AnchorRegistry::default();
        let t0 = Instant::now();
        let origin = AnchorTarget::Position(Point3::origin());
        reg.upsert(&mut scene, "a", origin, t0);
        for _ in 0..10 {
            reg.spin(&mut scene, 0.01, 0.0);
        }
        let anchor = reg.get("a").expect("anchor");
        assert_abs_diff_eq!(anchor.transform.orientation.angle(), 0.1, epsilon = 1e-9);
        assert_eq!(
            scene.node(anchor.node).map(|n| n.transform_updates),
            Some(11)
        );
    }

    #[test]
    fn spin_steps_euler_angles_of_a_rolled_anchor() {
        let mut scene = MemoryScene::new();
        let mut reg = AnchorRegistry::new(RegistryParams {
            smoothing: 1.0,
            ..RegistryParams::default()
        });
        let t0 = Instant::now();
        let target = AnchorTarget::Pose {
            position: Point3::origin(),
            orientation: from_xyz_euler(0.0, 0.0, FRAC_PI_2),
        };
        reg.upsert(&mut scene, "a", target, t0);

        reg.spin(&mut scene, 0.01, 0.005);
        reg.spin(&mut scene, 0.01, 0.005);

        let q = reg.get("a").expect("anchor").transform.orientation;
        let expected = from_xyz_euler(0.01, 0.02, FRAC_PI_2);
        assert_abs_diff_eq!(q.angle_to(&expected), 0.0, epsilon = 1e-9);
        let [x, y, z] = xyz_euler(&q);
        assert_abs_diff_eq!(x, 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 0.02, epsilon = 1e-9);
        assert_abs_diff_eq!(z, FRAC_PI_2, epsilon = 1e-9);

        // a body-frame step would tilt a rolled anchor differently
        let local = from_xyz_euler(0.0, 0.0, FRAC_PI_2)
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.02)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.01);
        assert!(q.angle_to(&local) > 1e-3);
    }

    #[test]
    fn euler_decomposition_at_gimbal_lock_keeps_z_zero() {
        let q = from_xyz_euler(0.3, FRAC_PI_2, 0.0);
        let [x, y, z] = xyz_euler(&q);
        assert_abs_diff_eq!(y, FRAC_PI_2, epsilon = 1e-6);
        assert_eq!(z, 0.0);
        assert_abs_diff_eq!(from_xyz_euler(x, y, z).angle_to(&q), 0.0, epsilon = 1e-6);
    }
}
