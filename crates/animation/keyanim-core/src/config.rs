//! Core configuration for keyanim-core.

use serde::{Deserialize, Serialize};

use crate::curve::CurveType;
use crate::error::Result;

/// Engine-wide settings. Every field has a default, so partial JSON documents
/// are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reduce: ReduceSettings,
    pub scrub: ScrubSettings,
    pub scheduler: SchedulerSettings,
    /// Smallest length a clip may be resized to, in seconds.
    pub min_clip_length: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reduce: ReduceSettings::default(),
            scrub: ScrubSettings::default(),
            scheduler: SchedulerSettings::default(),
            min_clip_length: crate::time::MIN_CLIP_LENGTH,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Keyframe reduction settings. The three phases toggle independently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceSettings {
    /// Phase 1: average interior samples onto a `1 / target_fps` grid.
    pub average_to_grid: bool,
    pub target_fps: f32,
    /// Averaging only runs when `target_fps` does not exceed this cap.
    pub max_average_fps: f32,

    /// Phase 2: collapse stable runs into a held plateau.
    pub flatten_runs: bool,
    /// A run must hold more than this many samples.
    pub min_run_samples: usize,
    /// A run must span more than this many seconds.
    pub min_run_duration: f32,

    /// Phase 3: greedy adaptive simplification.
    pub adaptive: bool,
    /// Position deviation (scene units) that counts as meaningful.
    pub min_meaningful_distance: f32,
    /// Rotation deviation (degrees) that counts as meaningful.
    pub min_meaningful_rotation: f32,
    /// Float parameter deviation that counts as meaningful.
    pub min_meaningful_float: f32,
    /// Position deviations are divided by this before comparing with rotation.
    pub distance_unit: f32,
    /// Rotation deviations (degrees) are divided by this before comparing with position.
    pub angle_unit: f32,
    /// Safety cap: at most `samples * iteration_factor` iterations.
    pub iteration_factor: usize,

    /// Curve type written on kept keyframes.
    pub output_curve_type: CurveType,
}

impl Default for ReduceSettings {
    fn default() -> Self {
        Self {
            average_to_grid: false,
            target_fps: 30.0,
            max_average_fps: 30.0,
            flatten_runs: true,
            min_run_samples: 3,
            min_run_duration: 0.5,
            adaptive: true,
            min_meaningful_distance: 0.01,
            min_meaningful_rotation: 1.0,
            min_meaningful_float: 0.01,
            distance_unit: 0.4,
            angle_unit: 180.0,
            iteration_factor: 10,
            output_curve_type: CurveType::Smooth,
        }
    }
}

/// Post-scrub catch-up limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubSettings {
    /// Max position change per second while catching up.
    pub max_distance_delta: f32,
    /// Max rotation change per second while catching up, in degrees.
    pub max_angle_delta: f32,
    pub position_tolerance: f32,
    /// Degrees.
    pub angle_tolerance: f32,
    /// Wall-clock seconds after which catch-up snaps to the target pose.
    pub timeout: f64,
}

impl Default for ScrubSettings {
    fn default() -> Self {
        Self {
            max_distance_delta: 1.0,
            max_angle_delta: 180.0,
            position_tolerance: 0.0005,
            angle_tolerance: 0.1,
            timeout: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Blend duration given to clips created blank.
    pub default_blend_duration: f32,
    /// Seed for random next-clip selection; drawn from a fresh v4 UUID when unset.
    pub random_seed: Option<u64>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            default_blend_duration: 1.0,
            random_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_takes_defaults() {
        let cfg = Config::from_json(r#"{ "reduce": { "distance_unit": 0.8 } }"#).unwrap();
        assert_eq!(cfg.reduce.distance_unit, 0.8);
        assert_eq!(cfg.reduce.angle_unit, 180.0);
        assert_eq!(cfg.scrub, ScrubSettings::default());
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = Config::default();
        let back = Config::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{").unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
