use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Width and height of a bounding region, in capture pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionSize {
    pub width: f64,
    pub height: f64,
}

/// Axis-aligned rectangle reported by detectors that do not expose corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub origin: Point2<f64>,
    pub size: RegionSize,
}

impl BoundingRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point2::new(x, y),
            size: RegionSize { width, height },
        }
    }

    #[inline]
    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            self.origin.x + self.size.width * 0.5,
            self.origin.y + self.size.height * 0.5,
        )
    }

    /// Average of width and height.
    #[inline]
    pub fn mean_extent(&self) -> f64 {
        (self.size.width + self.size.height) * 0.5
    }
}

/// One recognized marker in one capture frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Decoded payload; surrounding whitespace is ignored.
    pub identifier: String,
    /// Unordered corner points, if the detector reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<Vec<Point2<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_region: Option<BoundingRegion>,
}

impl Detection {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            corners: None,
            bounding_region: None,
        }
    }

    pub fn with_corners(mut self, corners: impl Into<Vec<Point2<f64>>>) -> Self {
        self.corners = Some(corners.into());
        self
    }

    pub fn with_bounding_region(mut self, region: BoundingRegion) -> Self {
        self.bounding_region = Some(region);
        self
    }

    /// Trimmed identifier, or `None` if nothing is left after trimming.
    pub fn key(&self) -> Option<&str> {
        let key = self.identifier.trim();
        (!key.is_empty()).then_some(key)
    }

    pub fn geometry(&self) -> MarkerGeometry<'_> {
        match (self.corners.as_deref(), self.bounding_region) {
            (Some(corners), fallback_region) if !corners.is_empty() => MarkerGeometry::Corners {
                corners,
                fallback_region,
            },
            (_, Some(region)) => MarkerGeometry::Region(region),
            _ => MarkerGeometry::Unlocated,
        }
    }
}

/// What a detection tells us about where the marker is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerGeometry<'a> {
    /// Corner points for a full pose; the region is used if the pose fails.
    Corners {
        corners: &'a [Point2<f64>],
        fallback_region: Option<BoundingRegion>,
    },
    /// Only a bounding rectangle.
    Region(BoundingRegion),
    /// Nothing but the identifier.
    Unlocated,
}
