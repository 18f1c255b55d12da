// src/config.rs - Runtime-tunable tracker settings
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::calibration::CalibrationConfig;
use crate::landmarks::FingerJoints;
use crate::occlusion::OcclusionConfig;
use crate::pose::UserOffsets;
use crate::scale::ScaleConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("smoothing factor must be in (0, 1], got {0}")]
    SmoothingOutOfRange(f64),
    #[error("scale bounds are inverted or non-positive: min {min}, max {max}")]
    ScaleBounds { min: f64, max: f64 },
    #[error("calibration multiplier range is invalid: min {min}, max {max}")]
    MultiplierRange { min: f64, max: f64 },
    #[error("calibration needs at least one sample per session")]
    EmptyCalibration,
    #[error("{0} must be finite")]
    NotFinite(&'static str),
}

/// Rendering-only settings forwarded to the scene; the pose pipeline never reads them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub env_intensity: f64,
    pub light_intensity: f64,
    pub force_gold: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            env_intensity: 1.2,
            light_intensity: 1.2,
            force_gold: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub smoothing_alpha: f64,
    /// Anchor position between MCP (0) and PIP (1)
    pub anchor_t: f64,
    pub finger: FingerJoints,
    pub offsets: UserOffsets,
    pub scale: ScaleConfig,
    pub occlusion: OcclusionConfig,
    pub calibration: CalibrationConfig,
    pub render: RenderSettings,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.22,
            anchor_t: 0.35,
            finger: FingerJoints::RING,
            offsets: UserOffsets::default(),
            scale: ScaleConfig::default(),
            occlusion: OcclusionConfig::default(),
            calibration: CalibrationConfig::default(),
            render: RenderSettings::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = self.smoothing_alpha;
        if !(a > 0.0 && a <= 1.0) {
            return Err(ConfigError::SmoothingOutOfRange(a));
        }
        if !self.anchor_t.is_finite() {
            return Err(ConfigError::NotFinite("anchor_t"));
        }

        let s = &self.scale;
        if !(s.min_scale > 0.0 && s.min_scale <= s.max_scale) {
            return Err(ConfigError::ScaleBounds {
                min: s.min_scale,
                max: s.max_scale,
            });
        }
        if !s.scale_factor.is_finite() || !s.default_target.is_finite() {
            return Err(ConfigError::NotFinite("scale"));
        }

        let c = &self.calibration;
        if !(c.multiplier_min > 0.0 && c.multiplier_min <= c.multiplier_max) {
            return Err(ConfigError::MultiplierRange {
                min: c.multiplier_min,
                max: c.multiplier_max,
            });
        }
        if c.sample_count == 0 {
            return Err(ConfigError::EmptyCalibration);
        }

        let o = &self.offsets;
        if ![o.pitch_deg, o.yaw_deg, o.roll_deg, o.scale_multiplier]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ConfigError::NotFinite("offsets"));
        }
        Ok(())
    }

    /// Restores every user-tunable parameter; tracked joints and scale constants are kept.
    pub fn reset_user_params(&mut self) {
        let defaults = TrackerConfig::default();
        self.smoothing_alpha = defaults.smoothing_alpha;
        self.anchor_t = defaults.anchor_t;
        self.offsets = defaults.offsets;
        self.occlusion = defaults.occlusion;
        self.render = defaults.render;
    }
}

/// Returns the config directory, e.g. ~/.config/ring-tracker on Linux
pub fn config_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "ringtracker", "ring-tracker")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().to_path_buf())
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Loads the given file, or the default location; missing files yield defaults.
pub fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        info!(?path, "No config found, using defaults");
        return Ok(TrackerConfig::default());
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: TrackerConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    config.validate()?;
    info!(?path, "Loaded config");
    Ok(config)
}

pub fn save_config(config: &TrackerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(config)?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    info!(?path, "Saved config");
    Ok(())
}
