// src/occlusion.rs - Depth-only finger mask sizing
use nalgebra::{UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    pub enabled: bool,
    pub width_mult: f64,
    pub height_mult: f64,
    /// Z placement of the mask in scene units
    pub depth: f64,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width_mult: 1.0,
            height_mult: 0.9,
            depth: 0.08,
        }
    }
}

/// What the mask height is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightBasis {
    FingerWidth,
    SmoothedScale,
}

/// Gains and clamp ranges for one sizing path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccluderProfile {
    pub width_gain: f64,
    pub height_gain: f64,
    pub height_basis: HeightBasis,
    pub width_range: (f64, f64),
    pub height_range: (f64, f64),
    /// Finger width used before any has been observed
    pub fallback_width: f64,
    /// Scale used when the smoothed scale is zero
    pub fallback_scale: f64,
}

impl OccluderProfile {
    /// Sizing on a fresh detection.
    pub const LIVE: OccluderProfile = OccluderProfile {
        width_gain: 1.0,
        height_gain: 0.6,
        height_basis: HeightBasis::FingerWidth,
        width_range: (6.0, 100.0),
        height_range: (4.0, 80.0),
        fallback_width: 30.0,
        fallback_scale: 60.0,
    };

    /// Sizing when re-rendering from cached state. Provisional: narrower width
    /// clamp and a height driven by the smoothed scale instead of the finger width.
    pub const CACHED: OccluderProfile = OccluderProfile {
        width_gain: 0.9,
        height_gain: 0.9,
        height_basis: HeightBasis::SmoothedScale,
        width_range: (8.0, 80.0),
        height_range: (6.0, 140.0),
        fallback_width: 30.0,
        fallback_scale: 60.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccluderTransform {
    pub width: f64,
    pub height: f64,
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

fn clamp_range(v: f64, (lo, hi): (f64, f64)) -> f64 {
    v.max(lo).min(hi)
}

/// Returns `None` when occlusion is disabled.
pub fn size_occluder(
    profile: &OccluderProfile,
    config: &OcclusionConfig,
    finger_width: Option<f64>,
    smoothed_scale: f64,
    anchor: &Vector2<f64>,
    rotation: &UnitQuaternion<f64>,
) -> Option<OccluderTransform> {
    if !config.enabled {
        return None;
    }

    let finger_width = finger_width.unwrap_or(profile.fallback_width);
    let height_source = match profile.height_basis {
        HeightBasis::FingerWidth => finger_width,
        HeightBasis::SmoothedScale if smoothed_scale == 0.0 => profile.fallback_scale,
        HeightBasis::SmoothedScale => smoothed_scale,
    };

    let width = finger_width * profile.width_gain * config.width_mult;
    let height = height_source * profile.height_gain * config.height_mult;

    Some(OccluderTransform {
        width: clamp_range(width, profile.width_range),
        height: clamp_range(height, profile.height_range),
        position: Vector3::new(anchor.x, anchor.y, config.depth),
        rotation: *rotation,
    })
}
