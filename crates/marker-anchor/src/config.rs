//! Tracker configuration and JSON helpers.

use std::fs;
use std::path::Path;
use std::time::Duration;

use marker_anchor_core::{CaptureMapping, Viewport};
use serde::{Deserialize, Serialize};

use crate::fallback::FallbackParams;
use crate::registry::RegistryParams;
use crate::scene::NodeGeometry;

#[derive(thiserror::Error, Debug)]
pub enum TrackerIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("marker size must be positive, got {0}")]
    MarkerSize(f64),
    #[error("vertical field of view must be in (0, 180) degrees, got {0}")]
    FieldOfView(f64),
    #[error("smoothing must be in [0, 1], got {0}")]
    Smoothing(f64),
    #[error("invalid viewport {width}x{height}")]
    Viewport { width: f64, height: f64 },
    #[error("node size must be positive, got {0}")]
    NodeSize(f64),
    #[error("fallback distances out of order: min {min}, max {max}")]
    FallbackDistance { min: f64, max: f64 },
}

/// Which point of the marker an anchor is attached to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPoint {
    /// Corner of the marker that becomes index 0 after ordering.
    #[default]
    MarkerOrigin,
    MarkerCenter,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Cube edge in meters.
    pub size: f64,
    pub opacity: f64,
    pub saturation: f64,
    pub lightness: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            size: 0.15,
            opacity: 0.9,
            saturation: 0.7,
            lightness: 0.6,
        }
    }
}

/// Idle rotation applied on every `tick`, in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinConfig {
    pub yaw_step: f64,
    pub pitch_step: f64,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            yaw_step: 0.01,
            pitch_step: 0.005,
        }
    }
}

/// Everything an [`crate::AnchorTracker`] can be tuned with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Physical side length of the square marker, meters.
    pub marker_size_m: f64,
    /// Vertical field of view of the virtual camera, degrees.
    pub fov_y_deg: f64,
    pub cooldown_ms: u64,
    pub smoothing: f64,
    pub anchor_point: AnchorPoint,
    pub capture_mapping: CaptureMapping,
    pub viewport: ViewportConfig,
    pub node: NodeConfig,
    pub fallback: FallbackParams,
    pub spin: SpinConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            marker_size_m: 0.12,
            fov_y_deg: 60.0,
            cooldown_ms: 16,
            smoothing: 0.5,
            anchor_point: AnchorPoint::default(),
            capture_mapping: CaptureMapping::default(),
            viewport: ViewportConfig::default(),
            node: NodeConfig::default(),
            fallback: FallbackParams::default(),
            spin: SpinConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.marker_size_m.is_finite() && self.marker_size_m > 0.0) {
            return Err(ConfigError::MarkerSize(self.marker_size_m));
        }
        if !(self.fov_y_deg > 0.0 && self.fov_y_deg < 180.0) {
            return Err(ConfigError::FieldOfView(self.fov_y_deg));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(ConfigError::Smoothing(self.smoothing));
        }
        self.initial_viewport()?;
        if !(self.node.size.is_finite() && self.node.size > 0.0) {
            return Err(ConfigError::NodeSize(self.node.size));
        }
        let FallbackParams {
            min_distance: min,
            max_distance: max,
            ..
        } = self.fallback;
        if !(min > 0.0 && min <= max) {
            return Err(ConfigError::FallbackDistance { min, max });
        }
        Ok(())
    }

    pub fn initial_viewport(&self) -> Result<Viewport, ConfigError> {
        let ViewportConfig { width, height } = self.viewport;
        Viewport::try_new(width, height).ok_or(ConfigError::Viewport { width, height })
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn registry_params(&self) -> RegistryParams {
        RegistryParams {
            cooldown: self.cooldown(),
            smoothing: self.smoothing,
            geometry: NodeGeometry::cube(self.node.size),
            opacity: self.node.opacity,
            saturation: self.node.saturation,
            lightness: self.node.lightness,
        }
    }

    /// Load and validate a JSON config. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TrackerIoError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TrackerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
