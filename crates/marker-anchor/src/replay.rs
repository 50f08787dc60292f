//! Offline replay of recorded detection streams.
//!
//! A script is a list of timestamped events. Timestamps are milliseconds
//! relative to the start of the replay, so cooldowns behave the same on every
//! run regardless of wall-clock speed.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::{TrackerConfig, TrackerIoError, ViewportConfig};
use crate::detection::Detection;
use crate::scene::MemoryScene;
use crate::tracker::{AnchorTracker, Placement, PlacementSource};

fn default_tick_count() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    Detection(Detection),
    Viewport {
        width: f64,
        height: f64,
    },
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },
    Clear,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub t_ms: u64,
    #[serde(flatten)]
    pub event: ReplayEvent,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Overrides the configured initial viewport.
    #[serde(default)]
    pub viewport: Option<ViewportConfig>,
    pub events: Vec<TimedEvent>,
}

impl ReplayScript {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TrackerIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Final state of one anchor after a replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorReport {
    pub identifier: String,
    pub position: [f64; 3],
    /// `[x, y, z, w]`.
    pub orientation: [f64; 4],
    pub color: String,
    pub updates: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStats {
    pub detections: usize,
    pub ignored: usize,
    pub throttled: usize,
    pub pose_placements: usize,
    pub region_placements: usize,
    pub hashed_placements: usize,
    pub viewport_updates: usize,
    pub rejected_viewports: usize,
    pub ticks: usize,
    pub clears: usize,
    pub nodes_created: usize,
    pub nodes_disposed: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub viewport: ViewportConfig,
    /// Sorted by identifier.
    pub anchors: Vec<AnchorReport>,
    pub stats: ReplayStats,
}

impl ReplayReport {
    pub fn anchor(&self, identifier: &str) -> Option<&AnchorReport> {
        self.anchors.iter().find(|a| a.identifier == identifier)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TrackerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Drive an [`AnchorTracker`] over a [`MemoryScene`] through `script`.
pub fn run_replay(
    script: &ReplayScript,
    mut config: TrackerConfig,
) -> Result<ReplayReport, TrackerIoError> {
    if let Some(viewport) = script.viewport {
        config.viewport = viewport;
    }
    let mut tracker = AnchorTracker::new(config, MemoryScene::new())?;
    let mut stats = ReplayStats::default();
    let start = Instant::now();

    for timed in &script.events {
        let now = start + Duration::from_millis(timed.t_ms);
        match &timed.event {
            ReplayEvent::Detection(detection) => {
                stats.detections += 1;
                match tracker.place_object_at_identifier_at(detection, now) {
                    Placement::Ignored => stats.ignored += 1,
                    Placement::Throttled => stats.throttled += 1,
                    Placement::Applied { source, .. } => match source {
                        PlacementSource::Pose => stats.pose_placements += 1,
                        PlacementSource::Region => stats.region_placements += 1,
                        PlacementSource::Hashed => stats.hashed_placements += 1,
                    },
                }
            }
            ReplayEvent::Viewport { width, height } => {
                if tracker.update_viewport(*width, *height) {
                    stats.viewport_updates += 1;
                } else {
                    stats.rejected_viewports += 1;
                }
            }
            ReplayEvent::Tick { count } => {
                for _ in 0..*count {
                    tracker.tick();
                }
                stats.ticks += *count as usize;
            }
            ReplayEvent::Clear => {
                tracker.clear_all();
                stats.clears += 1;
            }
        }
    }

    let mut anchors: Vec<AnchorReport> = tracker
        .registry()
        .iter()
        .map(|a| {
            let q = a.transform.orientation;
            AnchorReport {
                identifier: a.identifier.clone(),
                position: a.transform.position.coords.into(),
                orientation: [q.i, q.j, q.k, q.w],
                color: a.color.to_hex_string(),
                updates: a.updates,
            }
        })
        .collect();
    anchors.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    stats.nodes_created = tracker.scene().created_count();
    stats.nodes_disposed = tracker.scene().disposed_count();
    let viewport = tracker.viewport();
    log::info!(
        "replayed {} events, {} anchors live",
        script.events.len(),
        anchors.len()
    );

    Ok(ReplayReport {
        viewport: ViewportConfig {
            width: viewport.width,
            height: viewport.height,
        },
        anchors,
        stats,
    })
}
