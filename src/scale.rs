// src/scale.rs
use serde::{Deserialize, Serialize};

use crate::landmarks::{FingerJoints, LandmarkFrame, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Multiplier from finger segment length (px) to target size
    pub scale_factor: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Used when the segment length gives zero or NaN
    pub default_target: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            scale_factor: 3.0,
            min_scale: 18.0,
            max_scale: 140.0,
            default_target: 60.0,
        }
    }
}

/// Depth-augmented pixel length of the tracked finger segment.
pub fn segment_length(
    frame: &LandmarkFrame,
    viewport: &Viewport,
    joints: &FingerJoints,
) -> Option<f64> {
    let mcp = viewport.to_pixel_depth(frame.get(joints.mcp)?);
    let pip = viewport.to_pixel_depth(frame.get(joints.pip)?);
    Some((pip - mcp).norm())
}

/// Target size before clamping. Zero and NaN fall back to the default target.
pub fn raw_target(distance: f64, config: &ScaleConfig) -> f64 {
    let target = distance * config.scale_factor;
    if target.is_nan() || target == 0.0 {
        config.default_target
    } else {
        target
    }
}

pub fn clamp_target(target: f64, config: &ScaleConfig) -> f64 {
    // f64::clamp panics on inverted bounds
    target.max(config.min_scale).min(config.max_scale)
}

pub fn estimate_target(distance: f64, config: &ScaleConfig) -> f64 {
    clamp_target(raw_target(distance, config), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, RING_MCP, RING_PIP};

    #[test]
    fn output_stays_within_bounds() {
        let cfg = ScaleConfig::default();
        for &d in &[-1e9, -50.0, -0.0, 0.0, 1e-12, 3.0, 20.0, 46.0, 1e6, f64::MAX] {
            let t = estimate_target(d, &cfg);
            assert!(t >= cfg.min_scale && t <= cfg.max_scale, "{} -> {}", d, t);
        }
    }

    #[test]
    fn zero_and_nan_use_default_target() {
        let cfg = ScaleConfig::default();
        assert_eq!(estimate_target(0.0, &cfg), 60.0);
        assert_eq!(estimate_target(f64::NAN, &cfg), 60.0);
        assert_eq!(raw_target(0.0, &cfg), 60.0);
    }

    #[test]
    fn in_range_distance_scales_linearly() {
        let cfg = ScaleConfig::default();
        assert_eq!(estimate_target(20.0, &cfg), 60.0);
        assert_eq!(estimate_target(50.0, &cfg), 140.0);
        assert_eq!(raw_target(50.0, &cfg), 150.0);
        assert_eq!(estimate_target(2.0, &cfg), 18.0);
    }

    #[test]
    fn segment_length_includes_depth() {
        let mut lms = vec![Landmark::default(); 17];
        lms[RING_MCP] = Landmark::new(0.0, 0.0, 0.0);
        lms[RING_PIP] = Landmark::new(0.03, 0.0, 0.04);
        let frame = LandmarkFrame::new(lms);
        let d = segment_length(&frame, &Viewport::new(100.0, 100.0), &FingerJoints::RING).unwrap();
        assert!((d - 5.0).abs() < 1e-9);
    }
}
