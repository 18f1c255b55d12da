// src/pose.rs - Final object transform from smoothed state, offsets and object metadata
use nalgebra::{UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Reference size assumed when an object reports none.
pub const DEFAULT_TARGET_SIZE_PX: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserOffsets {
    pub pitch_deg: f64,
    pub yaw_deg: f64,
    pub roll_deg: f64,
    pub scale_multiplier: f64,
}

impl Default for UserOffsets {
    fn default() -> Self {
        Self {
            pitch_deg: 0.0,
            yaw_deg: 0.0,
            roll_deg: 0.0,
            scale_multiplier: 1.0,
        }
    }
}

impl UserOffsets {
    /// Intrinsic X-Y-Z Euler rotation: pitch about X, then yaw about Y, then roll about Z.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let qx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.pitch_deg.to_radians());
        let qy = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.yaw_deg.to_radians());
        let qz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.roll_deg.to_radians());
        qx * qy * qz
    }
}

/// Facts about the loaded object, fixed at load time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectMetadata {
    pub base_scale: f64,
    pub target_size_px: f64,
    /// Center of the functional axis (the band) in base-scaled object units
    pub center_offset: Vector3<f64>,
}

impl ObjectMetadata {
    pub fn new(base_scale: f64, target_size_px: f64, center_offset: Vector3<f64>) -> Self {
        let base_scale = if base_scale.is_finite() && base_scale > 0.0 { base_scale } else { 1.0 };
        let target_size_px = if target_size_px.is_finite() && target_size_px > 0.0 {
            target_size_px
        } else {
            DEFAULT_TARGET_SIZE_PX
        };
        Self {
            base_scale,
            target_size_px,
            center_offset,
        }
    }
}

impl Default for ObjectMetadata {
    fn default() -> Self {
        Self::new(1.0, DEFAULT_TARGET_SIZE_PX, Vector3::zeros())
    }
}

/// The subset of smoothed state the composer reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseInputs {
    pub anchor: Vector2<f64>,
    pub scale: f64,
    /// Last valid finger basis; identity until one has been built
    pub basis: Option<UnitQuaternion<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTransform {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: f64,
}

/// Smoothed size relative to the object's reference size, including the user multiplier.
pub fn size_ratio(inputs: &PoseInputs, meta: &ObjectMetadata, offsets: &UserOffsets) -> f64 {
    (inputs.scale / meta.target_size_px) * offsets.scale_multiplier
}

pub fn final_rotation(inputs: &PoseInputs, offsets: &UserOffsets) -> UnitQuaternion<f64> {
    inputs.basis.unwrap_or_else(UnitQuaternion::identity) * offsets.rotation()
}

pub fn compose_pose(
    inputs: &PoseInputs,
    meta: &ObjectMetadata,
    offsets: &UserOffsets,
) -> RenderTransform {
    let rotation = final_rotation(inputs, offsets);
    let ratio = size_ratio(inputs, meta, offsets);

    let mut position = Vector3::new(inputs.anchor.x, inputs.anchor.y, 0.0);
    if meta.center_offset != Vector3::zeros() {
        // Put the band's center, not the model origin, on the anchor
        let rotated = rotation * (meta.center_offset * ratio);
        position.x -= rotated.x;
        position.y -= rotated.y;
    }

    RenderTransform {
        position,
        rotation,
        scale: meta.base_scale * ratio,
    }
}
