//! Seam towards the rendering collaborator.
//!
//! The tracker never owns a scene graph; it creates, moves and disposes
//! nodes through [`SceneBackend`]. [`MemoryScene`] is an in-process
//! implementation used for replays and tests.

use std::collections::BTreeMap;

use nalgebra::{Point3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Box geometry of an anchor node, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeGeometry {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl NodeGeometry {
    pub fn cube(edge: f64) -> Self {
        Self {
            width: edge,
            height: edge,
            depth: edge,
        }
    }
}

/// 8-bit sRGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl MaterialColor {
    /// HSL to RGB with `hue`, `saturation` and `lightness` all in `[0, 1]`.
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let h = hue.rem_euclid(1.0);
        let s = saturation.clamp(0.0, 1.0);
        let l = lightness.clamp(0.0, 1.0);

        let (r, g, b) = if s == 0.0 {
            (l, l, l)
        } else {
            let hi = if l <= 0.5 {
                l * (1.0 + s)
            } else {
                l + s - l * s
            };
            let lo = 2.0 * l - hi;
            (
                hue_channel(lo, hi, h + 1.0 / 3.0),
                hue_channel(lo, hi, h),
                hue_channel(lo, hi, h - 1.0 / 3.0),
            )
        };
        let to_u8 = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self {
            r: to_u8(r),
            g: to_u8(g),
            b: to_u8(b),
        }
    }

    /// `0xRRGGBB`.
    pub fn to_hex(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    /// `#rrggbb`.
    pub fn to_hex_string(self) -> String {
        format!("#{:06x}", self.to_hex())
    }
}

fn hue_channel(lo: f64, hi: f64, t: f64) -> f64 {
    let t = if t < 0.0 {
        t + 1.0
    } else if t > 1.0 {
        t - 1.0
    } else {
        t
    };
    if t < 1.0 / 6.0 {
        lo + (hi - lo) * 6.0 * t
    } else if t < 0.5 {
        hi
    } else if t < 2.0 / 3.0 {
        lo + (hi - lo) * 6.0 * (2.0 / 3.0 - t)
    } else {
        lo
    }
}

/// Material of an anchor node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeMaterial {
    pub color: MaterialColor,
    pub opacity: f64,
}

/// Camera-space placement written onto a node (rendering convention).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeTransform {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

/// Node-management interface of the rendering surface.
pub trait SceneBackend {
    type NodeRef;

    /// Add a node to the scene at the origin.
    fn create_node(&mut self, geometry: &NodeGeometry, material: &NodeMaterial) -> Self::NodeRef;

    fn set_transform(&mut self, node: &Self::NodeRef, transform: &NodeTransform);

    /// Remove the node from the scene and release its geometry and material.
    ///
    /// Must complete before returning.
    fn dispose_node(&mut self, node: Self::NodeRef);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryNodeId(u64);

/// State of one live node in a [`MemoryScene`].
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryNode {
    pub geometry: NodeGeometry,
    pub material: NodeMaterial,
    pub transform: NodeTransform,
    /// Number of `set_transform` calls received.
    pub transform_updates: usize,
}

/// Scene backend that keeps nodes in memory and counts what happens to them.
#[derive(Debug, Default)]
pub struct MemoryScene {
    nodes: BTreeMap<MemoryNodeId, MemoryNode>,
    next_id: u64,
    created: usize,
    disposed: usize,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: MemoryNodeId) -> Option<&MemoryNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (MemoryNodeId, &MemoryNode)> {
        self.nodes.iter().map(|(id, n)| (*id, n))
    }

    pub fn live_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn created_count(&self) -> usize {
        self.created
    }

    pub fn disposed_count(&self) -> usize {
        self.disposed
    }
}

impl SceneBackend for MemoryScene {
    type NodeRef = MemoryNodeId;

    fn create_node(&mut self, geometry: &NodeGeometry, material: &NodeMaterial) -> MemoryNodeId {
        let id = MemoryNodeId(self.next_id);
        self.next_id += 1;
        self.created += 1;
        self.nodes.insert(
            id,
            MemoryNode {
                geometry: *geometry,
                material: *material,
                transform: NodeTransform::default(),
                transform_updates: 0,
            },
        );
        id
    }

    fn set_transform(&mut self, node: &MemoryNodeId, transform: &NodeTransform) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.transform = *transform;
            n.transform_updates += 1;
        } else {
            log::warn!("set_transform on unknown node {node:?}");
        }
    }

    fn dispose_node(&mut self, node: MemoryNodeId) {
        if self.nodes.remove(&node).is_some() {
            self.disposed += 1;
        }
    }
}
